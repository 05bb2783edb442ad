//! Unified error handling for relaybot.
//!
//! Module lifecycle failures are values, never panics: every lifecycle
//! operation returns [`ModuleResult`], and the control surface flattens it
//! into an [`Outcome`] pair for remote callers.

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Module Errors (lifecycle operations)
// ============================================================================

/// Errors returned by module lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("no module named '{0}' is available")]
    UnknownModule(String),

    #[error("module '{0}' is already imported")]
    AlreadyImported(String),

    #[error("module '{0}' is not imported")]
    NotImported(String),

    #[error("module '{0}' is already enabled")]
    AlreadyEnabled(String),

    #[error("module '{0}' is not enabled")]
    NotEnabled(String),

    #[error("module '{name}' failed to load: {reason}")]
    LoadFailed { name: String, reason: String },

    #[error("module '{name}' failed to start: {reason}")]
    EnableFailed { name: String, reason: String },

    #[error("engine is not running")]
    EngineStopped,
}

impl ModuleError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownModule(_) => "unknown_module",
            Self::AlreadyImported(_) => "already_imported",
            Self::NotImported(_) => "not_imported",
            Self::AlreadyEnabled(_) => "already_enabled",
            Self::NotEnabled(_) => "not_enabled",
            Self::LoadFailed { .. } => "load_failed",
            Self::EnableFailed { .. } => "enable_failed",
            Self::EngineStopped => "engine_stopped",
        }
    }
}

/// Result type for lifecycle operations.
pub type ModuleResult = Result<(), ModuleError>;

// ============================================================================
// Outcome (control surface)
// ============================================================================

/// `(success, reason)` pair reported to external control callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub reason: Option<String>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

impl From<ModuleResult> for Outcome {
    fn from(result: ModuleResult) -> Self {
        match result {
            Ok(()) => Outcome::ok(),
            Err(e) => Outcome::failed(e.to_string()),
        }
    }
}
