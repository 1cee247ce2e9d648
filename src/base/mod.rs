//! Base types and error handling.
//!
//! Provides foundational types:
//! - [`NetError`](neterror::NetError): Network error codes matching `net_error_list.h`
//! - [`ClientError`](clienterror::ClientError): The error type returned by the crate
//! - [`LoadState`](loadstate::LoadState): Lifecycle states of a logical response

pub mod clienterror;
pub mod context;
pub mod loadstate;
pub mod neterror;
