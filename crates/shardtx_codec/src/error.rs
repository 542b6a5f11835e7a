//! Error types for the wire codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input ended before a complete field could be read.
    #[error("unexpected end of input: needed {needed} more bytes")]
    UnexpectedEof {
        /// Number of bytes missing.
        needed: usize,
    },

    /// A field did not have the expected structure.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// Description of the structural problem.
        message: String,
    },

    /// A length prefix exceeded the supported maximum.
    #[error("length {length} exceeds maximum {max}")]
    LengthOverflow {
        /// The declared length.
        length: u64,
        /// The maximum allowed.
        max: u64,
    },

    /// A text field was not valid UTF-8.
    #[error("invalid UTF-8 in text field")]
    InvalidUtf8,

    /// An unknown type tag was encountered.
    #[error("unknown value tag: {tag:#04x}")]
    UnknownTag {
        /// The unrecognized tag byte.
        tag: u8,
    },

    /// Trailing bytes remained after decoding a complete structure.
    #[error("trailing bytes after decode: {remaining} left")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        remaining: usize,
    },
}

impl CodecError {
    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CodecError::UnexpectedEof { needed: 4 };
        assert!(err.to_string().contains("4"));

        let err = CodecError::UnknownTag { tag: 0x7f };
        assert!(err.to_string().contains("0x7f"));
    }
}
