//! Common error type.
//!

use std::ffi::NulError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A named message queue could not be opened, read, or written.
    #[error("message queue {name}: {source}")]
    Queue {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("child process: {0}")]
    ProcessError(String),

    /// Writing a command line to the child's stdin failed.
    #[error("child input: {0}")]
    ChildInput(#[source] std::io::Error),

    #[error("config: {0}")]
    Config(String),

    /// The log subscriber could not be installed.
    #[error("tracing: {0}")]
    Tracing(String),
}

impl BridgeError {
    pub(crate) fn queue<E: Into<std::io::Error>>(name: &str, source: E) -> Self {
        BridgeError::Queue {
            name: name.to_string(),
            source: source.into(),
        }
    }
}

impl From<which::Error> for BridgeError {
    fn from(e: which::Error) -> Self {
        BridgeError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, e))
    }
}

impl From<NulError> for BridgeError {
    fn from(e: NulError) -> Self {
        BridgeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    }
}

#[cfg(target_os = "linux")]
impl From<nix::Error> for BridgeError {
    fn from(e: nix::Error) -> Self {
        BridgeError::Io(e.into())
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(e: toml::de::Error) -> Self {
        BridgeError::Config(format!("invalid config: {e}"))
    }
}

impl From<BridgeError> for std::io::Error {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Io(e) => e,
            BridgeError::Queue { source, .. } => source,
            BridgeError::ChildInput(e) => e,
            BridgeError::ProcessError(e) => std::io::Error::other(e),
            BridgeError::Config(e) => std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            BridgeError::Tracing(e) => std::io::Error::other(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_error_keeps_name_and_kind() {
        let err = BridgeError::queue(
            "/command_queue",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("/command_queue"));
        let io: std::io::Error = err.into();
        assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn child_input_converts_back_to_broken_pipe() {
        let err = BridgeError::ChildInput(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        let io: std::io::Error = err.into();
        assert_eq!(io.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
