// SPDX-License-Identifier: MIT

//! Form result assembly.
//!
//! A request produces two outputs, built eagerly when the body is parsed:
//!
//! - post data: `name=value` pairs joined by `&`, or the raw body when the
//!   request is not multipart
//! - files data: one `id=..&name=..&type=..&size=..&tmp_name=..&error=N`
//!   record per uploaded file, joined by `;`
//!
//! Each output can be taken once. Later calls see `None`, which is an
//! ordinary outcome for the embedding layer.

use crate::config::Config;
use crate::content_type::{Encoding, classify};
use crate::multipart::{Part, parse_parts};
use crate::request::RequestContext;
use crate::upload::UploadWriter;
use log::{debug, error, info, warn};
use std::io::Read;
use std::str::FromStr;

/// What to do with NUL bytes in text field values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum NulPolicy {
    /// Cut each value at its first NUL, as C-string consumers would see it
    #[default]
    Truncate,
    /// Keep every byte of the value
    Preserve,
}

impl FromStr for NulPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "truncate" => Ok(NulPolicy::Truncate),
            "preserve" => Ok(NulPolicy::Preserve),
            other => Err(format!(
                "unknown NUL policy '{other}' (expected 'truncate' or 'preserve')"
            )),
        }
    }
}

impl NulPolicy {
    fn apply(self, value: &[u8]) -> &[u8] {
        match self {
            NulPolicy::Truncate => match memchr::memchr(0, value) {
                Some(nul) => &value[..nul],
                None => value,
            },
            NulPolicy::Preserve => value,
        }
    }
}

/// A value that can be handed out exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumable<T> {
    value: Option<T>,
    consumed: bool,
}

impl<T> Consumable<T> {
    pub fn new(value: Option<T>) -> Self {
        Self {
            value,
            consumed: false,
        }
    }

    /// Move the value out. Every call after the first returns `None`.
    pub fn take(&mut self) -> Option<T> {
        if self.consumed {
            return None;
        }
        self.consumed = true;
        self.value.take()
    }

    pub fn peek(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}

/// The two outputs of a parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormResult {
    post: Consumable<Vec<u8>>,
    files: Consumable<String>,
}

impl FormResult {
    pub fn new(post: Option<Vec<u8>>, files: Option<String>) -> Self {
        Self {
            post: Consumable::new(post),
            files: Consumable::new(files),
        }
    }

    /// Neither output present
    pub fn empty() -> Self {
        Self::new(None, None)
    }

    /// Raw body passed through as post data
    pub fn plain(body: Vec<u8>) -> Self {
        Self::new(Some(body), None)
    }

    pub fn take_post(&mut self) -> Option<Vec<u8>> {
        self.post.take()
    }

    pub fn take_files(&mut self) -> Option<String> {
        self.files.take()
    }

    pub fn post(&self) -> Option<&[u8]> {
        self.post.peek().map(Vec::as_slice)
    }

    pub fn files(&self) -> Option<&str> {
        self.files.peek().map(String::as_str)
    }

    pub fn post_consumed(&self) -> bool {
        self.post.is_consumed()
    }

    pub fn files_consumed(&self) -> bool {
        self.files.is_consumed()
    }
}

/// Serialize the non-file parts as `name=value` pairs joined by `&`.
///
/// `None` when there are no such parts.
pub fn serialize_fields(parts: &[Part<'_>], nul_policy: NulPolicy) -> Option<Vec<u8>> {
    let mut fields = parts.iter().filter(|part| !part.is_file()).peekable();
    fields.peek()?;

    let mut post = Vec::new();
    for (i, part) in fields.enumerate() {
        if i > 0 {
            post.push(b'&');
        }
        post.extend_from_slice(part.name.as_bytes());
        post.push(b'=');
        post.extend_from_slice(nul_policy.apply(part.body));
    }
    Some(post)
}

/// Serialize the file parts as records joined by `;`.
///
/// `None` when there are no file parts.
pub fn serialize_files(parts: &[Part<'_>]) -> Option<String> {
    let mut files = parts.iter().filter(|part| part.is_file()).peekable();
    files.peek()?;

    let mut records = String::new();
    for (i, part) in files.enumerate() {
        if i > 0 {
            records.push(';');
        }
        let tmp_name = part
            .tmp_path
            .as_ref()
            .map(|path| path.to_string_lossy())
            .unwrap_or_default();
        records.push_str(&format!(
            "id={}&name={}&type={}&size={}&tmp_name={}&error={}",
            part.name,
            part.file_name.as_deref().unwrap_or_default(),
            part.media_type(),
            part.body.len(),
            tmp_name,
            part.upload.code()
        ));
    }
    Some(records)
}

/// Turns request bodies into form results
#[derive(Debug, Clone)]
pub struct FormParser {
    writer: UploadWriter,
    nul_policy: NulPolicy,
    max_body_size: u64,
}

impl FormParser {
    pub fn new(config: &Config) -> Self {
        Self {
            writer: UploadWriter::from_config(config),
            nul_policy: config.nul_policy,
            max_body_size: config.max_body_size,
        }
    }

    pub fn with_writer(writer: UploadWriter, nul_policy: NulPolicy) -> Self {
        Self {
            writer,
            nul_policy,
            max_body_size: u64::MAX,
        }
    }

    /// Read the request body announced by `context` and parse it.
    ///
    /// Requests without a positive `CONTENT_LENGTH`, or whose body cannot be
    /// read, produce an empty result.
    pub fn process<R: Read>(&self, context: &RequestContext, reader: R) -> FormResult {
        match context.read_body(reader, self.max_body_size) {
            Ok(Some(body)) => self.parse(context.content_type(), body),
            Ok(None) => {
                debug!("No request body to process");
                FormResult::empty()
            }
            Err(e) => {
                error!("Failed to read request body: {e}");
                FormResult::empty()
            }
        }
    }

    /// Parse a complete request body.
    ///
    /// A body that cannot be classified is kept verbatim as post data.
    pub fn parse(&self, content_type: Option<&str>, body: Vec<u8>) -> FormResult {
        match classify(content_type) {
            Ok(Encoding::PlainText) => FormResult::plain(body),
            Ok(Encoding::Multipart(boundary)) => {
                let mut parts = parse_parts(&body, &boundary);
                for part in parts.iter_mut().filter(|part| part.is_file()) {
                    self.writer.write(part);
                }

                let post = serialize_fields(&parts, self.nul_policy);
                let files = serialize_files(&parts);
                info!(
                    "Form parsed: post data {} bytes, files data {} bytes",
                    post.as_ref().map_or(0, Vec::len),
                    files.as_ref().map_or(0, String::len)
                );
                FormResult::new(post, files)
            }
            Err(e) => {
                warn!("Failed to parse content type header ({e}), keeping raw body");
                FormResult::plain(body)
            }
        }
    }
}
