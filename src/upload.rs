// SPDX-License-Identifier: MIT

//! Spooling of uploaded files to temporary storage
//!
//! Every file part of a multipart request is written to its own file in the
//! upload directory before the form result is built. File names combine:
//! - a per-process counter
//! - the process id
//! - a clock sample in nanoseconds
//! - the sanitized field name and original filename
//!
//! Files are opened with `create_new`, so an existing file is never reused
//! even if two names collide.
//!
//! Spooled files are not removed afterwards; whoever consumes the upload (or
//! the host's tmp cleaner) owns them.

use crate::config::Config;
use crate::multipart::Part;
use log::{debug, error, info};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default file name prefix for spooled uploads
pub const DEFAULT_TEMP_PREFIX: &str = "ironform_post_";

/// Longest sanitized field name or filename kept in a temp file name
const MAX_NAME_COMPONENT: usize = 64;

/// How many fresh names to try when a temp file already exists
const CREATE_ATTEMPTS: usize = 8;

static FILE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Per-file upload outcome. The numeric codes follow PHP's `UPLOAD_ERR_*`
/// values, which consumers of the files record already understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadStatus {
    #[default]
    Ok,
    /// The part carried an empty filename
    NoFile,
    /// The temp file could not be created
    NoTmpDir,
    /// The body could not be written completely
    FailedWrite,
}

impl UploadStatus {
    pub fn code(self) -> u8 {
        match self {
            UploadStatus::Ok => 0,
            UploadStatus::NoFile => 4,
            UploadStatus::NoTmpDir => 5,
            UploadStatus::FailedWrite => 6,
        }
    }
}

/// Writes file part bodies into the upload directory
#[derive(Debug, Clone)]
pub struct UploadWriter {
    dir: PathBuf,
    prefix: String,
}

impl UploadWriter {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(dir: P, prefix: S) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Create a writer for the configured upload directory and prefix
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.upload_dir.clone(), config.temp_prefix.clone())
    }

    /// Spool the body of a file part and record the outcome on the part.
    ///
    /// Parts without a filename are left untouched.
    pub fn write(&self, part: &mut Part<'_>) {
        self.write_via(part, |file| file);
    }

    /// Like [`UploadWriter::write`], with every opened temp file wrapped by `wrap`
    fn write_via<S, F>(&self, part: &mut Part<'_>, wrap: F)
    where
        S: Spool,
        F: FnOnce(File) -> S,
    {
        let Some(file_name) = part.file_name.as_deref() else {
            return;
        };

        match self.write_body(&part.name, file_name, part.body, wrap) {
            Ok(path) => {
                info!(
                    "Spooled upload '{}' ({} bytes) to {path:?}",
                    file_name,
                    part.body.len()
                );
                part.upload = UploadStatus::Ok;
                part.tmp_path = Some(path);
            }
            Err(status) => {
                part.upload = status;
                part.tmp_path = None;
            }
        }
    }

    fn write_body<S, F>(
        &self,
        name: &str,
        file_name: &str,
        body: &[u8],
        wrap: F,
    ) -> Result<PathBuf, UploadStatus>
    where
        S: Spool,
        F: FnOnce(File) -> S,
    {
        if file_name.is_empty() {
            debug!("File field '{name}' submitted without a file");
            return Err(UploadStatus::NoFile);
        }

        let (path, file) = self.create_unique(name, file_name).map_err(|e| {
            error!("Failed to create temporary file in {:?}: {e}", self.dir);
            UploadStatus::NoTmpDir
        })?;

        let mut spool = wrap(file);
        if let Err(e) = copy_body(&mut spool, body) {
            error!("Failed to write temporary file {path:?}: {e}");
            drop(spool);
            let _ = fs::remove_file(&path); // Cleanup on error
            return Err(UploadStatus::FailedWrite);
        }

        Ok(path)
    }

    fn create_unique(&self, name: &str, file_name: &str) -> io::Result<(PathBuf, File)> {
        let name = sanitize_component(name);
        let file_name = sanitize_component(file_name);
        let mut last_err = None;

        for _ in 0..CREATE_ATTEMPTS {
            let path = self.dir.join(self.temp_file_name(&name, &file_name));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Temporary file {path:?} already exists, trying another name");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| io::Error::other("no temporary file name available")))
    }

    fn temp_file_name(&self, name: &str, file_name: &str) -> String {
        let count = FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        format!(
            "{}{count:04}{:06}{nanos}_{name}_{file_name}",
            self.prefix,
            std::process::id()
        )
    }
}

/// Where a part body is written: a temp file that can be flushed to disk
trait Spool: Write {
    fn sync(&mut self) -> io::Result<()>;
}

impl Spool for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

fn copy_body<S: Spool>(spool: &mut S, body: &[u8]) -> io::Result<()> {
    let mut reader = body;
    let written = io::copy(&mut reader, spool)?;
    if written != body.len() as u64 {
        return Err(io::Error::new(
            ErrorKind::WriteZero,
            format!("wrote {written} of {} bytes", body.len()),
        ));
    }
    spool.sync()
}

/// Reduce a client-supplied name to a safe file name fragment
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_COMPONENT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{PartHeaders, PartKind};
    use tempfile::TempDir;

    fn file_part<'a>(name: &str, file_name: Option<&str>, body: &'a [u8]) -> Part<'a> {
        Part::new(
            PartHeaders {
                kind: PartKind::OctetStream,
                name: name.to_string(),
                file_name: file_name.map(str::to_string),
                content_type: Some("application/octet-stream".to_string()),
            },
            body,
        )
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(UploadStatus::Ok.code(), 0);
        assert_eq!(UploadStatus::NoFile.code(), 4);
        assert_eq!(UploadStatus::NoTmpDir.code(), 5);
        assert_eq!(UploadStatus::FailedWrite.code(), 6);
    }

    #[test]
    fn test_successful_write() {
        let temp_dir = TempDir::new().unwrap();
        let writer = UploadWriter::new(temp_dir.path(), DEFAULT_TEMP_PREFIX);
        let mut part = file_part("f", Some("x.bin"), &[0xb0, 0xb1, 0xb2]);

        writer.write(&mut part);

        assert_eq!(part.upload, UploadStatus::Ok);
        let path = part.tmp_path.expect("tmp path recorded");
        assert!(path.starts_with(temp_dir.path()));
        assert_eq!(fs::read(&path).unwrap(), vec![0xb0, 0xb1, 0xb2]);

        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with(DEFAULT_TEMP_PREFIX));
        assert!(file_name.ends_with("_f_x.bin"));
    }

    #[test]
    fn test_empty_filename_is_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let writer = UploadWriter::new(temp_dir.path(), DEFAULT_TEMP_PREFIX);
        let mut part = file_part("f", Some(""), b"ignored");

        writer.write(&mut part);

        assert_eq!(part.upload, UploadStatus::NoFile);
        assert!(part.tmp_path.is_none());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory_is_no_tmp_dir() {
        let temp_dir = TempDir::new().unwrap();
        let writer = UploadWriter::new(temp_dir.path().join("missing"), DEFAULT_TEMP_PREFIX);
        let mut part = file_part("f", Some("a.txt"), b"data");

        writer.write(&mut part);

        assert_eq!(part.upload, UploadStatus::NoTmpDir);
        assert!(part.tmp_path.is_none());
    }

    #[test]
    fn test_text_field_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let writer = UploadWriter::new(temp_dir.path(), DEFAULT_TEMP_PREFIX);
        let mut part = file_part("plain", None, b"value");

        writer.write(&mut part);

        assert_eq!(part.upload, UploadStatus::Ok);
        assert!(part.tmp_path.is_none());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_same_names_get_distinct_files() {
        let temp_dir = TempDir::new().unwrap();
        let writer = UploadWriter::new(temp_dir.path(), "t_");
        let mut first = file_part("f", Some("same.txt"), b"one");
        let mut second = file_part("f", Some("same.txt"), b"two");

        writer.write(&mut first);
        writer.write(&mut second);

        let first_path = first.tmp_path.unwrap();
        let second_path = second.tmp_path.unwrap();
        assert_ne!(first_path, second_path);
        assert_eq!(fs::read(first_path).unwrap(), b"one");
        assert_eq!(fs::read(second_path).unwrap(), b"two");
    }

    /// Temp file wrapper that fails after `limit` bytes, or at sync time
    struct FailingSpool {
        file: File,
        limit: usize,
        fail_sync: bool,
    }

    impl Write for FailingSpool {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.limit == 0 {
                return Err(io::Error::other("no space left on device"));
            }
            let n = buf.len().min(self.limit);
            self.limit -= n;
            self.file.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    impl Spool for FailingSpool {
        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                return Err(io::Error::other("sync failed"));
            }
            self.file.sync_all()
        }
    }

    #[test]
    fn test_short_write_is_failed_write() {
        let temp_dir = TempDir::new().unwrap();
        let writer = UploadWriter::new(temp_dir.path(), DEFAULT_TEMP_PREFIX);
        let mut part = file_part("f", Some("big.bin"), b"0123456789");

        writer.write_via(&mut part, |file| FailingSpool {
            file,
            limit: 4,
            fail_sync: false,
        });

        assert_eq!(part.upload, UploadStatus::FailedWrite);
        assert!(part.tmp_path.is_none());
        // Partial file removed
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);

        let records = crate::form::serialize_files(&[part]).unwrap();
        assert_eq!(
            records,
            "id=f&name=big.bin&type=application/octet-stream&size=10&tmp_name=&error=6"
        );
    }

    #[test]
    fn test_failed_sync_is_failed_write() {
        let temp_dir = TempDir::new().unwrap();
        let writer = UploadWriter::new(temp_dir.path(), DEFAULT_TEMP_PREFIX);
        let mut part = file_part("f", Some("a.txt"), b"abc");

        writer.write_via(&mut part, |file| FailingSpool {
            file,
            limit: usize::MAX,
            fail_sync: true,
        });

        assert_eq!(part.upload, UploadStatus::FailedWrite);
        assert!(part.tmp_path.is_none());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("report-2024.pdf"), "report-2024.pdf");
        assert_eq!(sanitize_component("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_component("a b\\c"), "a_b_c");
        assert_eq!(sanitize_component("résumé.txt"), "r_sum_.txt");
        assert_eq!(sanitize_component(&"x".repeat(200)).len(), MAX_NAME_COMPONENT);
    }
}
