//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for BotError {
    fn from(e: rusqlite::Error) -> Self {
        BotError::Storage(StoreError::from(e))
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Statement rejected: {0}")]
    Rejected(String),
}

/// Failures reported by the chat platform
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Action {action} failed: {message}")]
    ActionFailed { action: String, message: String },
}

impl PlatformError {
    pub fn action_failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        PlatformError::ActionFailed {
            action: action.into(),
            message: message.into(),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_lookup() -> Result<(), BotError> {
        Err(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(())
    }

    #[test]
    fn test_sqlite_error_becomes_storage_error() {
        let err = failing_lookup().unwrap_err();
        assert!(matches!(err, BotError::Storage(StoreError::Sqlite(_))));
        assert!(err.to_string().starts_with("Storage error: SQLite error"));
    }

    #[test]
    fn test_action_failed_message() {
        let err = PlatformError::action_failed("set_group_add_request", "retcode 100");
        assert_eq!(err.to_string(), "Action set_group_add_request failed: retcode 100");
    }
}
