use thiserror::Error;

/// Result type for decoding operations
pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("response truncated: need {needed} bytes of {context}, got {actual}")]
    Truncated {
        needed: usize,
        actual: usize,
        context: &'static str,
    },

    #[error("unexpected opcode {actual:#x}, expected {expected:#x}")]
    UnexpectedOpcode { expected: u8, actual: u8 },
}

impl CodecError {
    pub fn truncated(needed: usize, actual: usize, context: &'static str) -> Self {
        CodecError::Truncated {
            needed,
            actual,
            context,
        }
    }

    pub fn unexpected_opcode(expected: u8, actual: u8) -> Self {
        CodecError::UnexpectedOpcode { expected, actual }
    }
}
