//! Error type for reader and configuration failures
//!
//! Protocol outcomes (authentication, block reads and writes) are reported as
//! [`StatusCode`](crate::StatusCode) values and never surface here. This type only
//! covers failures that stop the workflow from running at all: reader bring-up,
//! transport plumbing and invalid configuration.

/// Result type used across the crate
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Core error type
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The reader could not be brought up
    #[error("PCD initialisation failed: {0}")]
    Init(String),

    /// The transport to the reader failed outside of a card operation
    #[error("Transport error: {0}")]
    Transport(String),

    /// A key could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(&'static str),

    /// The session configuration is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a new initialisation error
    pub fn init<S: Into<String>>(message: S) -> Self {
        Self::Init(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Whether this error (or the error it wraps) is an initialisation failure
    pub fn is_init(&self) -> bool {
        match self {
            Self::Init(_) => true,
            Self::Context { source, .. } => source.is_init(),
            _ => false,
        }
    }
}

/// Extension trait for results carrying an [`Error`]
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_source() {
        let result: Result<()> = Err(Error::init("no reader"));
        let err = result.context("Bringing up reader").unwrap_err();

        assert_eq!(
            err.to_string(),
            "Bringing up reader: PCD initialisation failed: no reader"
        );
        assert!(err.is_init());
    }

    #[test]
    fn test_non_init_errors() {
        assert!(!Error::InvalidKey("bad length").is_init());
        assert!(!Error::transport("gone").with_context("x").is_init());
    }
}
