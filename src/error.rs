//! Error types for the generation pipeline.

use crate::notify::Notice;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Operation bounded by a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedOperation {
    Upload,
    Generation,
}

impl fmt::Display for TimedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimedOperation::Upload => f.write_str("Upload"),
            TimedOperation::Generation => f.write_str("Generation"),
        }
    }
}

/// User-facing failure category. Drives which remediation message is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Authorization,
    Transient,
    ContentPolicy,
    Timeout,
    Other,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("A generation is already in progress")]
    AlreadyInFlight,

    #[error("Free tier exhausted: {remaining} remaining, resets {resets_in}")]
    FreeTierExhausted {
        remaining: u32,
        reset_at: DateTime<Utc>,
        resets_in: String,
    },

    #[error("Provider request failed: {message}")]
    ProviderTransient { status: Option<u16>, message: String },

    #[error("Content policy violation: {0}")]
    ContentPolicy(String),

    #[error("Provider request rejected: {message}")]
    ProviderRejected { status: Option<u16>, message: String },

    #[error("Provider returned no artifacts")]
    EmptyResult,

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: TimedOperation,
        after: Duration,
    },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Invalid pipeline plan: {0}")]
    InvalidPlan(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl From<config::ConfigError> for GenerationError {
    fn from(err: config::ConfigError) -> Self {
        GenerationError::ConfigError(err.to_string())
    }
}

impl GenerationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GenerationError::Validation(_) | GenerationError::InvalidPlan(_) => {
                ErrorCategory::Validation
            }
            GenerationError::FreeTierExhausted { .. } => ErrorCategory::Authorization,
            GenerationError::ProviderTransient { .. } | GenerationError::EmptyResult => {
                ErrorCategory::Transient
            }
            GenerationError::ContentPolicy(_) => ErrorCategory::ContentPolicy,
            GenerationError::Timeout { .. } => ErrorCategory::Timeout,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether invoking the same action again may succeed. Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::Timeout
        )
    }

    /// User-facing notice for this failure.
    pub fn notice(&self) -> Notice {
        match self {
            GenerationError::Validation(msg) => Notice::error("Missing input", msg.clone()),
            GenerationError::AlreadyInFlight => Notice::info(
                "Generation in progress",
                "Wait for the current generation to finish.",
            ),
            GenerationError::FreeTierExhausted {
                remaining,
                resets_in,
                ..
            } => Notice::error(
                "Free generations used up",
                format!(
                    "You have {} free generations remaining. Your allowance resets {}. Sign in to keep generating.",
                    remaining, resets_in
                ),
            ),
            GenerationError::ProviderTransient { .. } | GenerationError::EmptyResult => {
                Notice::error(
                    "Generation failed",
                    "The generation service is temporarily unavailable. Please try again.",
                )
            }
            GenerationError::ContentPolicy(_) => Notice::error(
                "Prompt not allowed",
                "Your prompt was flagged by the content policy. Rephrase it and try again; retrying unchanged will not help.",
            ),
            GenerationError::Timeout { operation, after } => Notice::error(
                format!("{} timed out", operation),
                format!(
                    "The request took longer than {}s and was abandoned. Please try again.",
                    after.as_secs()
                ),
            ),
            other => Notice::error("Generation failed", other.to_string()),
        }
    }
}
