// SPDX-License-Identifier: MIT

//! Part header parsing for multipart/form-data.
//!
//! Only two headers matter to a form part: `Content-Disposition`, which names
//! the field (and the file, for uploads), and `Content-Type`, which classifies
//! the payload. Everything else in the header block is skipped.
//!
//! Parameters inside a header line use a small grammar shared by both:
//! `name=value` or `name="value"`, separated by `;`.

use crate::error::FormError;
use crate::lines::next_line;
use log::{debug, warn};
use memchr::{memchr, memmem};

const CONTENT_DISPOSITION: &[u8] = b"Content-Disposition";
const CONTENT_TYPE: &[u8] = b"Content-Type";

/// Payload classification from a part's `Content-Type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartKind {
    /// `text/plain`, also assumed when the part declares no type
    #[default]
    TextPlain,
    /// `application/octet-stream`
    OctetStream,
    /// Any other declared type
    Unclassified,
}

/// The parameters of a `Content-Disposition: form-data` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// The name of the form field, never empty
    pub name: String,
    /// Original filename; `Some` marks the part as a file upload
    pub file_name: Option<String>,
}

/// Parsed headers of a single part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeaders {
    pub kind: PartKind,
    pub name: String,
    pub file_name: Option<String>,
    /// Declared media type as written, when one was given
    pub content_type: Option<String>,
}

impl PartHeaders {
    /// Parse the header block at the start of a part segment.
    ///
    /// Returns the headers and the offset where the part body begins, just
    /// past the blank line. A block that is not closed by a blank line, or
    /// that never names the field, is an error and the part is dropped.
    pub fn parse(segment: &[u8]) -> Result<(Self, usize), FormError> {
        let mut kind = PartKind::default();
        let mut content_type = None;
        let mut disposition = None;
        let mut cursor = 0;

        let body_start = loop {
            let line = next_line(segment, cursor).ok_or_else(|| {
                FormError::malformed_part("header block not terminated by a blank line")
            })?;
            if line.is_empty() {
                break line.start + 2;
            }

            let text = &segment[line.clone()];
            if starts_with_ignore_case(text, CONTENT_DISPOSITION) {
                disposition = match parse_content_disposition(text) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!("Ignoring Content-Disposition: {e}");
                        None
                    }
                };
            } else if starts_with_ignore_case(text, CONTENT_TYPE) {
                (kind, content_type) = parse_content_type(text);
            } else {
                debug!("Skipping part header: {}", String::from_utf8_lossy(text));
            }
            cursor = line.end;
        };

        let ContentDisposition { name, file_name } = disposition.ok_or(FormError::MissingName)?;

        Ok((
            Self {
                kind,
                name,
                file_name,
                content_type,
            },
            body_start,
        ))
    }
}

/// Parse a `Content-Disposition` header line.
///
/// Examples:
/// ```text
/// Content-Disposition: form-data; name="file"; filename="savedconfig.CF2"
/// Content-Disposition: form-data; name="VerifyPassword"
/// ```
pub fn parse_content_disposition(line: &[u8]) -> Result<ContentDisposition, FormError> {
    let form_data = memmem::find(line, b"form-data")
        .ok_or_else(|| FormError::malformed_part("Content-Disposition is not form-data"))?;
    let params = memchr(b';', &line[form_data..])
        .map(|semi| form_data + semi + 1)
        .ok_or(FormError::MissingName)?;

    let mut name = None;
    let mut file_name = None;

    for pair in PairCursor::new(&line[params..]) {
        let (key, value) = match pair {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Dropping Content-Disposition parameter: {e}");
                break;
            }
        };

        if key.eq_ignore_ascii_case(b"name") {
            name = Some(lossy(value));
        } else if key.eq_ignore_ascii_case(b"filename") {
            file_name = Some(lossy(value));
        } else {
            debug!("Unknown Content-Disposition parameter '{}'", lossy(key));
        }
    }

    match name {
        Some(name) if !name.is_empty() => Ok(ContentDisposition { name, file_name }),
        _ => Err(FormError::MissingName),
    }
}

/// Parse a `Content-Type` header line into a classification and the declared type.
///
/// Classification is a case-sensitive prefix match; unknown types are kept as
/// `Unclassified` and the part survives.
pub fn parse_content_type(line: &[u8]) -> (PartKind, Option<String>) {
    let Some(colon) = memchr(b':', line) else {
        debug!("Content-Type header without ':'");
        return (PartKind::Unclassified, None);
    };

    let value = line[colon + 1..].trim_ascii();
    if value.is_empty() {
        debug!("Content-Type header without a value");
        return (PartKind::Unclassified, None);
    }

    let kind = if value.starts_with(b"text/plain") {
        PartKind::TextPlain
    } else if value.starts_with(b"application/octet-stream") {
        PartKind::OctetStream
    } else {
        debug!("Unclassified part Content-Type '{}'", lossy(value));
        PartKind::Unclassified
    };

    (kind, Some(lossy(value)))
}

/// Walks the `name=value` pairs of a single header line.
///
/// A quoted value runs to the next unescaped `"`; an unquoted one to the next
/// `;` or whitespace. A quoted value with no closing quote yields one error and
/// ends the walk.
pub struct PairCursor<'a> {
    line: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> PairCursor<'a> {
    pub fn new(line: &'a [u8]) -> Self {
        Self {
            line,
            pos: 0,
            done: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.pos = self.line.len();
    }
}

impl<'a> Iterator for PairCursor<'a> {
    type Item = Result<(&'a [u8], &'a [u8]), FormError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let line = self.line;
        let start = skip_whitespace(line, self.pos);
        let Some(eq) = memchr(b'=', &line[start..]).map(|offset| start + offset) else {
            self.finish();
            return None;
        };
        let name = line[start..eq].trim_ascii_end();

        let mut p = skip_whitespace(line, eq + 1);
        let value = if p < line.len() && line[p] == b'"' {
            let Some(close) = closing_quote(line, p + 1) else {
                self.finish();
                return Some(Err(FormError::unterminated_quote(lossy(name))));
            };
            let quoted = &line[p + 1..close];
            p = close + 1;
            quoted
        } else {
            let end = line[p..]
                .iter()
                .position(|&b| b == b';' || b.is_ascii_whitespace())
                .map_or(line.len(), |offset| p + offset);
            let bare = &line[p..end];
            p = end;
            bare
        };

        match memchr(b';', &line[p..]) {
            Some(offset) => self.pos = p + offset + 1,
            None => self.finish(),
        }

        Some(Ok((name, value)))
    }
}

fn closing_quote(line: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < line.len() {
        match line[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn skip_whitespace(line: &[u8], from: usize) -> usize {
    line[from.min(line.len())..]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(line.len(), |offset| from + offset)
}

fn starts_with_ignore_case(text: &[u8], prefix: &[u8]) -> bool {
    text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
