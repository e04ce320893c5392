//! Request/response shapes shared by the HTTP API and the bot.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on input length, in characters after trimming.
pub const MAX_TEXT_CHARS: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Empty,
    TooLong { len: usize, max: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "text must not be empty"),
            Self::TooLong { len, max } => {
                write!(f, "text is too long ({len} characters, at most {max} allowed)")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Inbound payload. Construct through [`ClassificationRequest::new`] to get a
/// trimmed, length-checked text.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationRequest {
    pub text: String,
}

impl ClassificationRequest {
    pub fn new(text: &str) -> Result<Self, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::Empty);
        }
        let len = text.chars().count();
        if len > MAX_TEXT_CHARS {
            return Err(ValidationError::TooLong { len, max: MAX_TEXT_CHARS });
        }
        Ok(Self { text: text.to_string() })
    }

    /// Re-check a deserialized payload.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Self::new(&self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub class_id: u32,
}
