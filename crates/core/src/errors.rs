//! Error types for promptdock
//!
//! This module defines the error taxonomy shared by every surface, with
//! helpers that turn errors into short user-facing messages.

use thiserror::Error;

/// Result type alias for promptdock operations
pub type Result<T> = std::result::Result<T, PromptError>;

/// Main error type for promptdock
#[derive(Debug, Error)]
pub enum PromptError {
    /// Command not found in registry
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Invalid command arguments
    #[error("Invalid arguments for command '{command}': {reason}")]
    InvalidArgs { command: String, reason: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// SQLite backend error
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Storage backend failure (quota, poisoned lock, failed write)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No editable field could be located on the page
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// The receiving context (page script, surface) is unavailable
    #[error("Messaging error: {0}")]
    MessagingError(String),

    /// Generic error (catch-all)
    #[error("{0}")]
    Other(String),
}

impl From<String> for PromptError {
    fn from(err: String) -> Self {
        PromptError::Other(err)
    }
}

impl From<&str> for PromptError {
    fn from(err: &str) -> Self {
        PromptError::Other(err.to_string())
    }
}

impl PromptError {
    /// Get user-friendly error message for display in a surface
    pub fn user_message(&self) -> String {
        match self {
            PromptError::CommandNotFound(cmd) => {
                format!("Command '{}' not found.", cmd)
            },
            PromptError::InvalidArgs { command, reason } => {
                format!("Invalid arguments for '{}': {}", command, reason)
            },
            PromptError::ValidationError(msg) => msg.clone(),
            PromptError::TargetNotFound(_) => {
                "No suitable text field found on this page.".to_string()
            },
            PromptError::MessagingError(_) => {
                "The page is not ready. Reload it and try again.".to_string()
            },
            PromptError::DatabaseError(err) => {
                format!("Database error: {}", err)
            },
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            PromptError::CommandNotFound(_) => "command",
            PromptError::InvalidArgs { .. } => "arguments",
            PromptError::SerdeError(_) => "serialization",
            PromptError::DatabaseError(_) => "database",
            PromptError::StorageError(_) => "storage",
            PromptError::IoError(_) => "io",
            PromptError::ConfigError(_) => "config",
            PromptError::ValidationError(_) => "validation",
            PromptError::TargetNotFound(_) => "target",
            PromptError::MessagingError(_) => "messaging",
            PromptError::Other(_) => "other",
        }
    }

    /// Whether the error came from user input rather than the platform
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            PromptError::InvalidArgs { .. } | PromptError::ValidationError(_)
        )
    }
}
