//! Error types for stream handler termination.

use thiserror::Error;
use virdi_engine::EngineError;

/// Terminal outcomes of a stream handler.
///
/// A transport adapter maps these onto its status vocabulary: every
/// precondition error becomes `FAILED_PRECONDITION`, exhaustion becomes
/// `RESOURCE_EXHAUSTED`. Errors are terminal for the offending stream only;
/// other streams are unaffected, and peers are expected to reconnect rather
/// than wait for a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The transport metadata carried no `client-id`.
    #[error("client id not given")]
    MissingClientId,

    /// The referenced resource does not exist.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// A consumer with the requested id already exists.
    #[error("consumer already exists: {0}")]
    DuplicateConsumer(String),

    /// A production stream did not start with its init frame.
    #[error("first production frame must carry the init info")]
    MissingInit,

    /// The request itself is unusable (e.g. a zero rate).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The resource buffer is saturated; the producer should back off and
    /// reconnect later.
    #[error("resource buffer full: {0}")]
    ResourceExhausted(String),

    /// An engine failure with no dedicated mapping.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Returns `true` for errors the peer caused by referencing something
    /// that does not exist (or already exists).
    #[inline]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingClientId
                | Self::UnknownResource(_)
                | Self::DuplicateConsumer(_)
                | Self::MissingInit
                | Self::InvalidRequest(_)
        )
    }

    /// Returns `true` when the broker stopped the stream because the
    /// resource buffer is full.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }
}

impl From<EngineError> for HandlerError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::UnknownResource(id) => Self::UnknownResource(id),
            EngineError::DuplicateConsumer(id) => Self::DuplicateConsumer(id),
            other => Self::Internal(other.to_string()),
        }
    }
}
