use thiserror::Error;

/// A malformed source line.
///
/// `line` is 1-based. The reader reports the error and moves on, so one bad
/// line never hides the rest of the module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}: {message}")]
pub struct ReaderError {
    pub message: String,
    pub line: usize,
}

impl ReaderError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}
