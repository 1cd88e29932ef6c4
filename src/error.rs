//! Error types for encoding and decoding sessions.

use thiserror::Error;

/// Result type for huffpack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building trees, encoding or decoding.
///
/// Any error aborts the current call. When it is returned from a decode,
/// output flushed before the error was detected must be treated as unreliable.
#[derive(Error, Debug)]
pub enum Error {
    /// A tree was requested for a histogram with no counted symbols.
    #[error("histogram is empty, tree cannot be built")]
    EmptyHistogram,

    /// The encoder was used out of protocol order:
    /// - a symbol was counted after compilation
    /// - a byte that was never counted was passed to encode
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// The compressed stream failed structural validation.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The byte source or sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Error::PreconditionViolation(msg.into())
    }

    /// Returns true if the compressed input was rejected.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedInput(_))
    }

    /// Returns true if the caller broke the encoder protocol.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::PreconditionViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(Error::malformed("bad").is_malformed());
        assert!(!Error::malformed("bad").is_precondition());
        assert!(Error::precondition("late").is_precondition());
        assert!(!Error::EmptyHistogram.is_malformed());
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
