// file: src/error.rs
// version: 1.2.0
// guid: 7c41d9e2-5a38-4f06-b1c7-9d20e86f3a54

use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, DvmError>;

/// Error types for the DockerVM CLI
#[derive(Error, Debug)]
pub enum DvmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command execution error: {0}")]
    Execution(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Refusing unsafe operation: {0}")]
    Unsafe(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("System error: {0}")]
    System(String),
}

impl DvmError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new unsafe-operation error
    pub fn unsafe_op(msg: impl Into<String>) -> Self {
        Self::Unsafe(msg.into())
    }

    /// Create a new system error
    pub fn system(msg: impl Into<String>) -> Self {
        Self::System(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DvmError::execution("mkfs.ext4 exited with status 1");
        assert_eq!(
            err.to_string(),
            "Command execution error: mkfs.ext4 exited with status 1"
        );

        let err = DvmError::unsafe_op("/var/lib/docker is protected");
        assert!(err.to_string().starts_with("Refusing unsafe operation"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DvmError = io.into();
        assert!(matches!(err, DvmError::Io(_)));
    }
}
