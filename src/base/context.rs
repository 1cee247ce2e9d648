//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting IO errors into context-rich `ClientError` values.

use crate::base::clienterror::ClientError;
use crate::base::neterror::NetError;
use std::io;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add connection context to an IO error.
    ///
    /// # Example
    /// ```ignore
    /// use asyncnet::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect((host, port)).await
    ///     .connection_context("example.com", 80)?;
    /// // Error: "Failed to connect to example.com:80: connection refused"
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, ClientError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, ClientError> {
        self.map_err(|e| {
            ClientError::transport(
                net_error_from_io(&e),
                format!("Failed to connect to {}:{}: {}", host, port, e),
            )
        })
    }
}

/// Map an IO error kind to the closest network error code.
pub fn net_error_from_io(error: &io::Error) -> NetError {
    match error.kind() {
        io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
        io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
        io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
        io::ErrorKind::NotConnected => NetError::SocketNotConnected,
        io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
        io::ErrorKind::AddrNotAvailable => NetError::AddressUnreachable,
        io::ErrorKind::NotFound => NetError::NameNotResolved,
        io::ErrorKind::UnexpectedEof => NetError::ConnectionClosed,
        _ => NetError::ConnectionFailed,
    }
}
