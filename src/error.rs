use thiserror::Error;

use crate::model::ItemId;

/// Main error type for relmap
#[derive(Error, Debug)]
pub enum RelmapError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fixture or value parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Item not present in the store
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// Content store failures that are not database errors
    #[error("Store error: {0}")]
    Store(String),

    /// Task join failures, poisoned locks
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenient Result type using RelmapError
pub type Result<T> = std::result::Result<T, RelmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelmapError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: RelmapError = rusqlite_err.into();
        assert!(matches!(err, RelmapError::Database(_)));
    }

    #[test]
    fn test_item_not_found_mentions_id() {
        let err = RelmapError::ItemNotFound(ItemId(42));
        assert_eq!(err.to_string(), "Item not found: 42");
    }
}
