// SPDX-License-Identifier: MIT

//! multipart/form-data body splitting (RFC 1867 / RFC 2046)
//!
//! The whole request body is held in memory, so parts are plain slices into
//! it. Parsing is forgiving: a part that cannot be understood is reported and
//! skipped, and the scan carries on with the next boundary.
//!
//! # Example
//! ```rust
//! use ironform::content_type::Boundary;
//! use ironform::multipart::parse_parts;
//!
//! let boundary = Boundary::from_token("B").unwrap();
//! let body = b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nhello\r\n--B--\r\n";
//! let parts = parse_parts(body, &boundary);
//! assert_eq!(parts.len(), 1);
//! assert_eq!(parts[0].name, "a");
//! assert_eq!(parts[0].body, b"hello");
//! ```

use crate::content_type::Boundary;
use crate::error::FormError;
use crate::headers::{PartHeaders, PartKind};
use crate::upload::UploadStatus;
use log::{debug, error, info, warn};
use memchr::memmem;
use std::path::PathBuf;

/// Media type reported for parts that declare none
pub const DEFAULT_MEDIA_TYPE: &str = "text/plain";

/// A single field of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part<'a> {
    pub kind: PartKind,
    /// Form field name, never empty
    pub name: String,
    /// Original filename for file uploads
    pub file_name: Option<String>,
    /// Declared media type
    pub content_type: Option<String>,
    /// Raw part payload, binary-safe
    pub body: &'a [u8],
    /// Outcome of spooling the body; only meaningful for file parts
    pub upload: UploadStatus,
    /// Where the body was spooled, set only when `upload` is `Ok`
    pub tmp_path: Option<PathBuf>,
}

impl<'a> Part<'a> {
    pub fn new(headers: PartHeaders, body: &'a [u8]) -> Self {
        Self {
            kind: headers.kind,
            name: headers.name,
            file_name: headers.file_name,
            content_type: headers.content_type,
            body,
            upload: UploadStatus::Ok,
            tmp_path: None,
        }
    }

    /// Check if this part is a file upload
    pub fn is_file(&self) -> bool {
        self.file_name.is_some()
    }

    /// Media type to report for this part
    pub fn media_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_MEDIA_TYPE)
    }
}

/// The raw bytes between two boundary occurrences: part headers plus body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub bytes: &'a [u8],
    /// False when the body ended before another boundary appeared
    pub terminated: bool,
}

/// Iterator over the part segments of a multipart body.
///
/// Scanning starts at the first boundary occurrence, so any preamble is
/// skipped. A boundary followed by `--` ends the stream; so does running out
/// of body, without error.
pub struct MultipartScanner<'a> {
    body: &'a [u8],
    finder: memmem::Finder<'a>,
    boundary_len: usize,
    pos: usize,
    finished: bool,
}

impl<'a> MultipartScanner<'a> {
    pub fn new(body: &'a [u8], boundary: &'a Boundary) -> Self {
        Self {
            body,
            finder: memmem::Finder::new(boundary.as_bytes()),
            boundary_len: boundary.len(),
            pos: 0,
            finished: false,
        }
    }

    fn finish(&mut self) -> Option<Segment<'a>> {
        self.finished = true;
        None
    }
}

impl<'a> Iterator for MultipartScanner<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let Some(found) = self.finder.find(&self.body[self.pos..]) else {
            debug!("No further boundary after offset {}", self.pos);
            return self.finish();
        };
        let start = self.pos + found + self.boundary_len;

        if start >= self.body.len() {
            debug!("Body ends directly after a boundary");
            return self.finish();
        }
        if self.body[start..].starts_with(b"--") {
            debug!("End-of-stream boundary at offset {}", self.pos + found);
            return self.finish();
        }

        match self.finder.find(&self.body[start..]) {
            Some(len) => {
                self.pos = start + len;
                Some(Segment {
                    bytes: &self.body[start..start + len],
                    terminated: true,
                })
            }
            None => {
                self.finished = true;
                Some(Segment {
                    bytes: &self.body[start..],
                    terminated: false,
                })
            }
        }
    }
}

/// Turn one segment into a part.
///
/// The body starts after the blank line ending the headers and stops two
/// bytes short of the next boundary, dropping the line break that precedes
/// it. A segment with no closing boundary keeps its headers but gets an empty
/// body.
pub fn parse_part(segment: Segment<'_>) -> Result<Part<'_>, FormError> {
    let (headers, body_start) = PartHeaders::parse(segment.bytes)?;

    let body = if segment.terminated {
        let body_end = segment.bytes.len().saturating_sub(2);
        segment
            .bytes
            .get(body_start..body_end)
            .unwrap_or_default()
    } else {
        warn!(
            "Part '{}' has no closing boundary, treating its body as empty",
            headers.name
        );
        &[]
    };

    Ok(Part::new(headers, body))
}

/// Iterator over parsed parts, yielding an error for each part that is dropped
pub struct MultipartParser<'a> {
    scanner: MultipartScanner<'a>,
}

impl<'a> MultipartParser<'a> {
    pub fn new(body: &'a [u8], boundary: &'a Boundary) -> Self {
        Self {
            scanner: MultipartScanner::new(body, boundary),
        }
    }
}

impl<'a> Iterator for MultipartParser<'a> {
    type Item = Result<Part<'a>, FormError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scanner.next().map(parse_part)
    }
}

/// Parse every well-formed part of `body`, in order, logging the ones dropped
pub fn parse_parts<'a>(body: &'a [u8], boundary: &'a Boundary) -> Vec<Part<'a>> {
    let mut parts = Vec::new();
    let mut dropped = 0usize;

    for result in MultipartParser::new(body, boundary) {
        match result {
            Ok(part) => {
                debug!(
                    "Part name={} filename={:?} kind={:?} body_len={}",
                    part.name,
                    part.file_name,
                    part.kind,
                    part.body.len()
                );
                parts.push(part);
            }
            Err(e) if e.is_structural() => {
                dropped += 1;
                warn!("Dropping multipart part: {e}");
            }
            Err(e) => {
                dropped += 1;
                error!("Failed to parse multipart part: {e}");
            }
        }
    }

    info!("Got {} parts ({} dropped)", parts.len(), dropped);
    parts
}
