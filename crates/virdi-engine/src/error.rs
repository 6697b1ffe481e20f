//! Error types for engine operations.

use thiserror::Error;

/// Errors raised by registry lookups and consumer lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The referenced resource does not exist.
    #[error("resource not found: {0}")]
    UnknownResource(String),

    /// The referenced consumer does not exist.
    #[error("consumer not found: {0}")]
    UnknownConsumer(String),

    /// A consumer with this id already exists somewhere in the process.
    #[error("consumer already exists: {0}")]
    DuplicateConsumer(String),

    /// Notifier-backed consumers only drain through their notifier.
    #[error("consumer {0} has a notifier and cannot be consumed manually")]
    ManualConsumeForbidden(String),
}

impl EngineError {
    /// Returns `true` for errors caused by the caller's reference being
    /// wrong rather than by engine state.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownResource(_) | Self::UnknownConsumer(_))
    }

    /// Returns `true` if the operation conflicted with existing state.
    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateConsumer(_))
    }
}
