//! # Engine Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌──────────────────────┐  ┌──────────────────────┐  ┌──────────────┐  │
//! │  │  Recoverable         │  │  Fatal               │  │ Configuration│  │
//! │  │                      │  │                      │  │              │  │
//! │  │  Core(CoreError)     │  │  Invariant           │  │ ConfigLoad   │  │
//! │  │  stock, payments,    │  │  lost reservation,   │  │ ConfigSave   │  │
//! │  │  status, not found   │  │  failed compensation │  │ InvalidConfig│  │
//! │  └──────────────────────┘  └──────────────────────┘  └──────────────┘  │
//! │                                                                         │
//! │  Recoverable: caller fixes input and retries.                          │
//! │  Fatal: surfaced, logged at ERROR, never retried.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cantina_core::{CoreError, ErrorCode};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Internal state was found inconsistent.
    ///
    /// ## When This Occurs
    /// - A cart's reservation is gone when its sale is committed
    /// - Stock could not be restored after a failed ledger write
    #[error("Invariant violated during {operation}: {detail}")]
    Invariant {
        operation: &'static str,
        detail: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

impl From<cantina_core::ValidationError> for EngineError {
    fn from(err: cantina_core::ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    pub(crate) fn invariant(operation: &'static str, detail: impl Into<String>) -> Self {
        EngineError::Invariant {
            operation,
            detail: detail.into(),
        }
    }

    /// True for invariant violations. These must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Invariant { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_)
                | EngineError::ConfigLoadFailed(_)
                | EngineError::ConfigSaveFailed(_)
        )
    }

    /// The wrapped business error, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            EngineError::Core(e) => Some(e),
            _ => None,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Core(e) => e.code(),
            EngineError::Invariant { .. } => ErrorCode::InvariantViolation,
            EngineError::InvalidConfig(_)
            | EngineError::ConfigLoadFailed(_)
            | EngineError::ConfigSaveFailed(_) => ErrorCode::Config,
        }
    }

    /// Serializable form for the handler layer.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// What the handler layer sends back when an operation fails.
///
/// ```json
/// { "code": "ERR_PAYMENT_MISMATCH", "message": "Payments total 9.00 but order total is 10.00" }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&EngineError> for ErrorBody {
    fn from(err: &EngineError) -> Self {
        err.to_body()
    }
}
