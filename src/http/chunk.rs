//! Streamed response chunks.
//!
//! A response body is delivered as a sequence of [`Chunk`]s: exactly one
//! `First` once headers are known, any number of `Data` fragments (plus
//! transient `Timeout` and 1xx `Informational` notifications), and one
//! terminal `Last` or `Error`.

use crate::base::clienterror::ClientError;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// One unit of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// Headers have been received. Carries no body bytes.
    First,
    /// A provisional 1xx response.
    Informational { status: StatusCode, headers: HeaderMap },
    /// A fragment of the body starting at `offset`.
    Data { offset: u64, content: Bytes },
    /// No activity for the configured idle timeout. Not terminal.
    Timeout { offset: u64 },
    /// The response failed at `offset`. Terminal.
    Error { offset: u64, error: ClientError },
    /// The body is complete. Terminal.
    Last { offset: u64 },
}

impl Chunk {
    pub fn data(offset: u64, content: impl Into<Bytes>) -> Self {
        Chunk::Data { offset, content: content.into() }
    }

    pub fn last(offset: u64) -> Self {
        Chunk::Last { offset }
    }

    pub fn timeout(offset: u64) -> Self {
        Chunk::Timeout { offset }
    }

    pub fn failure(offset: u64, error: ClientError) -> Self {
        Chunk::Error { offset, error }
    }

    pub fn is_first(&self) -> bool {
        matches!(self, Chunk::First)
    }

    /// True for `Last` and for `Error`, which truncates the sequence.
    pub fn is_last(&self) -> bool {
        matches!(self, Chunk::Last { .. } | Chunk::Error { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Chunk::Timeout { .. })
    }

    /// Body bytes carried by this chunk; empty for control chunks.
    pub fn content(&self) -> Bytes {
        match self {
            Chunk::Data { content, .. } => content.clone(),
            _ => Bytes::new(),
        }
    }

    pub fn error(&self) -> Option<&ClientError> {
        match self {
            Chunk::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn informational_status(&self) -> Option<(StatusCode, &HeaderMap)> {
        match self {
            Chunk::Informational { status, headers } => Some((*status, headers)),
            _ => None,
        }
    }

    /// Byte position of this chunk within the full body.
    pub fn offset(&self) -> u64 {
        match self {
            Chunk::First | Chunk::Informational { .. } => 0,
            Chunk::Data { offset, .. }
            | Chunk::Timeout { offset }
            | Chunk::Error { offset, .. }
            | Chunk::Last { offset } => *offset,
        }
    }

    /// Turn an error chunk into `Err`, passing every other chunk through.
    pub fn into_result(self) -> Result<Chunk, ClientError> {
        match self {
            Chunk::Error { error, .. } => Err(error),
            other => Ok(other),
        }
    }

    /// Same chunk, moved to `offset`. Control chunks without an offset are
    /// returned unchanged.
    pub(crate) fn at_offset(self, offset: u64) -> Self {
        match self {
            Chunk::Data { content, .. } => Chunk::Data { offset, content },
            Chunk::Timeout { .. } => Chunk::Timeout { offset },
            Chunk::Error { error, .. } => Chunk::Error { offset, error },
            Chunk::Last { .. } => Chunk::Last { offset },
            other => other,
        }
    }
}
