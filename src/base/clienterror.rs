//! Crate-level error type.

use crate::base::neterror::NetError;
use thiserror::Error;

/// Errors surfaced by clients, responses and chunk filters.
///
/// Errors are `Clone` because a terminal error is re-raised on every later
/// access to the response that produced it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// Network or protocol failure reported by a transport.
    #[error("{message}")]
    Transport { code: NetError, message: String },

    /// An idle timeout surfaced to a caller that was not streaming.
    #[error("Idle timeout reached for \"{url}\".")]
    Timeout { url: String },

    /// A chunk filter failed. `cause` is the error carried by the chunk
    /// that was being filtered, if any.
    #[error("{message}")]
    Filter {
        message: String,
        #[source]
        cause: Option<Box<ClientError>>,
    },

    /// Response metadata was requested before it was available.
    #[error("{0}")]
    InvalidState(String),

    /// A request option failed validation.
    #[error("{0}")]
    InvalidArgument(String),
}

impl ClientError {
    pub fn transport(code: NetError, message: impl Into<String>) -> Self {
        ClientError::Transport { code, message: message.into() }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        ClientError::Timeout { url: url.into() }
    }

    pub fn filter(message: impl Into<String>, cause: Option<ClientError>) -> Self {
        ClientError::Filter { message: message.into(), cause: cause.map(Box::new) }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ClientError::InvalidState(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ClientError::InvalidArgument(message.into())
    }

    /// Error reported when a response was canceled before completing.
    pub fn canceled() -> Self {
        ClientError::transport(NetError::Aborted, "Response has been canceled.")
    }

    /// The network error code, for transport failures and timeouts.
    pub fn net_error(&self) -> Option<NetError> {
        match self {
            ClientError::Transport { code, .. } => Some(*code),
            ClientError::Timeout { .. } => Some(NetError::TimedOut),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }
}

impl From<NetError> for ClientError {
    fn from(code: NetError) -> Self {
        ClientError::Transport { code, message: code.to_string() }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        ClientError::transport(NetError::InvalidUrl, format!("Invalid URL: {}", e))
    }
}
