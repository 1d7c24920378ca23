//! Error types for the WebAudit engine

use thiserror::Error;

/// Result type alias using WebAudit Error
pub type Result<T> = std::result::Result<T, Error>;

/// WebAudit error types
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    #[error("Invalid request field `{field}`: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // === Engine Lifecycle Errors ===
    #[error("Scanning engine could not be started: {0}")]
    EngineStart(String),

    #[error("Scanning engine did not become ready after {attempts} attempts")]
    EngineStartTimeout { attempts: u32 },

    #[error("Engine session is closed")]
    SessionClosed,

    // === Engine Control Surface Errors ===
    #[error("Engine API error ({status}) on {endpoint}: {message}")]
    EngineApi {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    // === Scan Errors ===
    #[error("Scan of {url} failed: {message}")]
    UrlScanFailed { url: String, message: String },

    #[error("Batch {batch} failed: {message}")]
    BatchFailed { batch: usize, message: String },

    #[error("All {total} batches failed; last error: {last_error}")]
    AllBatchesFailed { total: usize, last_error: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a validation failure on a named request field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Check if this error means the engine itself is unavailable
    pub fn is_engine_start(&self) -> bool {
        matches!(
            self,
            Error::EngineStart(_) | Error::EngineStartTimeout { .. }
        )
    }

    /// Check if this error is fatal (should stop the whole run)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. }
                | Error::InvalidUrl(_)
                | Error::EngineStart(_)
                | Error::EngineStartTimeout { .. }
                | Error::AllBatchesFailed { .. }
                | Error::Configuration(_)
        )
    }

    /// Check if this error is worth retrying against the engine
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::EngineApi { status: 500..=599, .. })
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::EngineStart(_) => "ENGINE_START_FAILED",
            Error::EngineStartTimeout { .. } => "ENGINE_START_TIMEOUT",
            Error::SessionClosed => "SESSION_CLOSED",
            Error::EngineApi { .. } => "ENGINE_API_ERROR",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::UrlScanFailed { .. } => "URL_SCAN_FAILED",
            Error::BatchFailed { .. } => "BATCH_FAILED",
            Error::AllBatchesFailed { .. } => "ALL_BATCHES_FAILED",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_start_classification() {
        assert!(Error::EngineStart("spawn failed".into()).is_engine_start());
        assert!(Error::EngineStartTimeout { attempts: 30 }.is_engine_start());
        assert!(!Error::SessionClosed.is_engine_start());
    }

    #[test]
    fn test_retryable() {
        let server_error = Error::EngineApi {
            endpoint: "ascan/view/status".into(),
            status: 502,
            message: "bad gateway".into(),
        };
        let client_error = Error::EngineApi {
            endpoint: "ascan/view/status".into(),
            status: 400,
            message: "does_not_exist".into(),
        };
        assert!(server_error.is_retryable());
        assert!(!client_error.is_retryable());
        assert!(Error::Transport("reset".into()).is_retryable());
    }

    #[test]
    fn test_validation_message() {
        let err = Error::validation("options.batchSize", "must be between 1 and 20");
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Invalid request field `options.batchSize`: must be between 1 and 20"
        );
    }
}
