//! Structured error types shared across msc crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`MscError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (identifiers, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the msc toolkit.
///
/// Every failure is fatal to the enclosing proposal or run. There are no
/// retry or degraded-mode semantics anywhere in the toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MscError {
    /// Invalid or contradictory component configuration.
    #[error("configuration error: {0}")]
    Config(ErrorInfo),
    /// A state node was claimed by more than one initializer.
    #[error("duplicate initialization: {0}")]
    DuplicateInit(ErrorInfo),
    /// An operation was requested in a lifecycle phase that forbids it.
    #[error("invalid state: {0}")]
    InvalidState(ErrorInfo),
    /// Inconsistent gene tree kernel bookkeeping.
    #[error("kernel error: {0}")]
    Kernel(ErrorInfo),
    /// Tree structural errors.
    #[error("tree error: {0}")]
    Tree(ErrorInfo),
    /// Randomness and seeding errors.
    #[error("rng error: {0}")]
    Rng(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Filesystem and stream errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl MscError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MscError::Config(info)
            | MscError::DuplicateInit(info)
            | MscError::InvalidState(info)
            | MscError::Kernel(info)
            | MscError::Tree(info)
            | MscError::Rng(info)
            | MscError::Serde(info)
            | MscError::Io(info) => info,
        }
    }

    /// Wraps an I/O failure with the standard payload shape.
    pub fn from_io(code: impl Into<String>, err: &std::io::Error) -> Self {
        MscError::Io(ErrorInfo::new(code, err.to_string()))
    }
}
