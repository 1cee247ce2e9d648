//! Logical responses built from filtered chunk streams.
//!
//! An [`AsyncResponse`] wraps an underlying transport response. Each raw
//! chunk goes through an optional [`ChunkFilter`], which can reshape the
//! chunk sequence, retry the request, or inject content through its
//! [`AsyncContext`].

pub mod context;
pub mod filter;
pub mod response;
mod state;

pub use context::AsyncContext;
pub use filter::{filter_fn, ChunkFilter};
pub use response::AsyncResponse;
