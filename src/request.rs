// SPDX-License-Identifier: MIT

//! CGI request context: the declared body length and type, and the body itself.

use crate::error::FormError;
use log::{debug, warn};
use std::env;
use std::io::Read;

pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";

/// Upper bound on the up-front allocation for a body; larger bodies grow as read
const MAX_PREALLOCATION: usize = 8 * 1024 * 1024;

/// Request metadata as handed over by the web server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    content_length: Option<String>,
    content_type: Option<String>,
}

impl RequestContext {
    pub fn new(content_length: Option<String>, content_type: Option<String>) -> Self {
        Self {
            content_length,
            content_type,
        }
    }

    /// Read `CONTENT_LENGTH` and `CONTENT_TYPE` from the process environment
    pub fn from_env() -> Self {
        Self::new(env::var(CONTENT_LENGTH).ok(), env::var(CONTENT_TYPE).ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The declared body length, when it is a positive decimal number
    pub fn declared_length(&self) -> Option<usize> {
        let raw = self.content_length.as_deref()?.trim();
        match raw.parse::<i64>() {
            Ok(len) if len > 0 => usize::try_from(len).ok(),
            Ok(_) => None,
            Err(_) => {
                debug!("Ignoring unparsable {CONTENT_LENGTH} '{raw}'");
                None
            }
        }
    }

    /// Read the body from `reader`, at most the declared length.
    ///
    /// Returns `Ok(None)` when no body is declared. A body shorter than
    /// declared is logged and returned as read.
    pub fn read_body<R: Read>(
        &self,
        reader: R,
        max_body_size: u64,
    ) -> Result<Option<Vec<u8>>, FormError> {
        let Some(declared) = self.declared_length() else {
            return Ok(None);
        };

        if declared as u64 > max_body_size {
            return Err(FormError::PayloadTooLarge(max_body_size));
        }

        let mut body = Vec::with_capacity(declared.min(MAX_PREALLOCATION));
        reader.take(declared as u64).read_to_end(&mut body)?;

        if body.len() != declared {
            warn!(
                "{}",
                FormError::TruncatedBody {
                    declared,
                    read: body.len(),
                }
            );
        }

        debug!("Read request body: {} bytes", body.len());
        Ok(Some(body))
    }
}
