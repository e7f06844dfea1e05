use thiserror::Error;
use std::io;

/// Unified error type for the strata library.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed schema text, unknown type names, unresolvable length
    /// references and inline values that do not fit their leaf.
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// A path segment or object member does not exist.
    #[error("Path Not Found: {0}")]
    PathNotFound(String),

    /// The operation requires a different schema state (object, list, leaf)
    /// or a different element type.
    #[error("Invalid State: {0}")]
    InvalidState(String),

    /// An index or byte range falls outside what a schema or buffer holds.
    #[error("Out Of Range: {0}")]
    OutOfRange(String),

    /// File open/read/write failure.
    #[error("IO Error: {0}")]
    IOError(String),
}

/// A specialized `Result` type for strata operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IOError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        // serde_json already appends "at line L column C" to its message
        Error::ParseError(format!("invalid schema text: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_prefixes() {
        assert_eq!(
            Error::PathNotFound("a/b".to_string()).to_string(),
            "Path Not Found: a/b"
        );
        assert_eq!(
            Error::InvalidState("not an object".to_string()).to_string(),
            "Invalid State: not an object"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "missing.json").into();
        assert!(matches!(err, Error::IOError(_)));
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_json_error_carries_location() {
        let json_err = serde_json::from_str::<serde_json::Value>("{\"a\": ").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::ParseError(_)));
        assert!(err.to_string().contains("line 1"));
    }
}
