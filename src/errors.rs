use thiserror::Error;

/// Crate-wide infrastructure error type.
///
/// Use at module boundaries (config load, cache open, transport bind).
/// This is distinct from [`crate::tool::ToolError`]: a single tool call
/// failing never produces an `EngineError` — it becomes a dual-format
/// result instead. `EngineError` is for failures that are not any one
/// call's fault.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("mcp error: {0}")]
    Mcp(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn config_error_displays_message() {
        let err = EngineError::Config("bad host".to_string());
        assert_eq!(err.to_string(), "configuration error: bad host");
    }
}
