use thiserror::Error;

/// Main error type for azgraph
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Job-state snapshot database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Azure management / Graph API errors
    #[error("Azure API error: {0}")]
    Api(String),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A graph object with the same `_key` was already added in this run
    #[error("Duplicate key in job state: {0}")]
    DuplicateKey(String),

    /// A source record is missing a required field or has the wrong shape
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Step dependency table is inconsistent (unknown step or cycle)
    #[error("Step graph error: {0}")]
    StepGraph(String),
}

/// Convenient Result type using ConnectorError
pub type Result<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectorError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: ConnectorError = rusqlite_err.into();
        assert!(matches!(err, ConnectorError::Database(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ConnectorError = json_err.into();
        assert!(matches!(err, ConnectorError::Serialization(_)));
    }

    #[test]
    fn test_duplicate_key_message() {
        let err = ConnectorError::DuplicateKey("azure_user_1".to_string());
        assert_eq!(err.to_string(), "Duplicate key in job state: azure_user_1");
    }
}
