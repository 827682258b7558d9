// SPDX-License-Identifier: MIT

use std::fmt;

#[derive(Debug)]
pub enum FormError {
    Io(std::io::Error),
    // Content-Type classification
    MissingContentType,
    MissingBoundary,
    EmptyBoundary,
    UnterminatedBoundary,
    // Part structure
    MalformedPart(String),     // Contains what was missing or broken
    MissingName,
    UnterminatedQuote(String), // Contains the parameter name
    // Request intake
    TruncatedBody { declared: usize, read: usize },
    PayloadTooLarge(u64), // Contains the maximum allowed size
    InvalidConfiguration(String),
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::Io(err) => write!(f, "IO error: {err}"),
            FormError::MissingContentType => write!(f, "Missing CONTENT_TYPE"),
            FormError::MissingBoundary => {
                write!(f, "multipart/form-data without a boundary attribute")
            }
            FormError::EmptyBoundary => write!(f, "Empty multipart boundary"),
            FormError::UnterminatedBoundary => {
                write!(f, "Quoted multipart boundary is missing its closing quote")
            }
            FormError::MalformedPart(reason) => write!(f, "Malformed part: {reason}"),
            FormError::MissingName => write!(f, "Content-Disposition without a 'name'"),
            FormError::UnterminatedQuote(param) => {
                write!(f, "Missing closing quote for parameter '{param}'")
            }
            FormError::TruncatedBody { declared, read } => {
                write!(
                    f,
                    "Request body shorter than declared: read {read} of {declared} bytes"
                )
            }
            FormError::PayloadTooLarge(max_size) => {
                write!(
                    f,
                    "Request body too large. Maximum allowed size: {max_size} bytes"
                )
            }
            FormError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl From<std::io::Error> for FormError {
    fn from(err: std::io::Error) -> Self {
        FormError::Io(err)
    }
}

impl std::error::Error for FormError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl FormError {
    /// Creates a MalformedPart error
    pub fn malformed_part<S: Into<String>>(reason: S) -> Self {
        FormError::MalformedPart(reason.into())
    }

    /// Creates an UnterminatedQuote error for the named parameter
    pub fn unterminated_quote<S: Into<String>>(param: S) -> Self {
        FormError::UnterminatedQuote(param.into())
    }

    /// Creates an InvalidConfiguration error
    pub fn invalid_configuration<S: Into<String>>(msg: S) -> Self {
        FormError::InvalidConfiguration(msg.into())
    }

    /// Checks if the error only drops a unit (header attribute or part) of the request
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FormError::MissingContentType
                | FormError::MissingBoundary
                | FormError::EmptyBoundary
                | FormError::UnterminatedBoundary
                | FormError::MalformedPart(_)
                | FormError::MissingName
                | FormError::UnterminatedQuote(_)
        )
    }
}
