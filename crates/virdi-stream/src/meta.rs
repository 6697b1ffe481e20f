//! The transport-metadata seam.

use crate::error::HandlerError;

/// Metadata a transport adapter extracted from the underlying stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMeta {
    /// The peer's `client-id` metadata entry, if present.
    pub client_id: Option<String>,
}

impl StreamMeta {
    /// Metadata carrying the given client id.
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
        }
    }

    /// The client id, or the precondition failure every handler answers
    /// when it is missing.
    pub fn require_client_id(&self) -> Result<&str, HandlerError> {
        self.client_id
            .as_deref()
            .ok_or(HandlerError::MissingClientId)
    }
}
