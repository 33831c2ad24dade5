use thiserror::Error;

/// Application-wide error taxonomy. The UI matches on these one by one, the
/// CLI prints them through `anyhow` context.
#[derive(Error, Debug)]
pub enum SabiaError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SabiaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_wrapped_message() {
        let err = SabiaError::Generation("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));

        let err = SabiaError::Validation("empty key".to_string());
        assert_eq!(err.to_string(), "Validation error: empty key");
    }

    #[test]
    fn io_errors_convert() {
        fn read_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/definitely/not/here")?)
        }
        assert!(matches!(read_missing(), Err(SabiaError::Io(_))));
    }
}
