// SPDX-License-Identifier: MIT

//! Request-level Content-Type classification.
//!
//! Decides whether a request body is passed through untouched or split as
//! `multipart/form-data`, and extracts the boundary used for scanning.

use crate::error::FormError;
use log::debug;

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Scanning delimiter for a multipart body: the declared token prefixed with `--`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    delimiter: Vec<u8>,
}

impl Boundary {
    /// Build the scanning boundary from the token declared in the Content-Type
    pub fn from_token(token: &str) -> Result<Self, FormError> {
        if token.is_empty() {
            return Err(FormError::EmptyBoundary);
        }
        let mut delimiter = Vec::with_capacity(token.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(token.as_bytes());
        Ok(Self { delimiter })
    }

    /// The delimiter bytes (`--` + token)
    pub fn as_bytes(&self) -> &[u8] {
        &self.delimiter
    }

    pub fn len(&self) -> usize {
        self.delimiter.len()
    }

    /// Always false; an empty token never produces a `Boundary`
    pub fn is_empty(&self) -> bool {
        self.delimiter.is_empty()
    }
}

/// How the request body is encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    /// Stored verbatim as the field data
    PlainText,
    /// Split into parts on the boundary
    Multipart(Boundary),
}

/// Classify a request by its Content-Type declaration.
///
/// Anything that does not mention `multipart/form-data` is plain text. A
/// multipart declaration must carry a usable `boundary` attribute, quoted or
/// not; an unquoted value ends at `,`, `;` or the end of the string.
pub fn classify(content_type: Option<&str>) -> Result<Encoding, FormError> {
    let content_type = content_type.ok_or(FormError::MissingContentType)?;

    if !content_type.contains(MULTIPART_FORM_DATA) {
        debug!("Content-Type '{content_type}' is not multipart, passing body through");
        return Ok(Encoding::PlainText);
    }

    let token = boundary_token(content_type)?;
    debug!("multipart/form-data boundary token: {token:?}");
    Ok(Encoding::Multipart(Boundary::from_token(token)?))
}

fn boundary_token(content_type: &str) -> Result<&str, FormError> {
    let attr = content_type
        .find("boundary")
        .ok_or(FormError::MissingBoundary)?;
    let after_attr = &content_type[attr..];
    let eq = after_attr.find('=').ok_or(FormError::MissingBoundary)?;
    let value = &after_attr[eq + 1..];

    if let Some(quoted) = value.strip_prefix('"') {
        let end = quoted.find('"').ok_or(FormError::UnterminatedBoundary)?;
        return Ok(&quoted[..end]);
    }

    let end = value.find([',', ';']).unwrap_or(value.len());
    Ok(&value[..end])
}
