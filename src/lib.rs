//! # asyncnet
//!
//! An asynchronous, chunk-streaming HTTP client.
//!
//! Every response is a sequence of [`Chunk`]s: one `First` when headers
//! arrive, body `Data`, transient `Timeout` notifications, and a terminal
//! `Last` or `Error`. Responses can be decorated with a [`ChunkFilter`] that
//! sees each raw chunk exactly once and may reshape the sequence, retry the
//! request, or inject content, while callers keep seeing one well-formed
//! response.
//!
//! ## Features
//!
//! - **Streaming**: multiplex any number of responses from one task with
//!   [`ResponseStream`], round-robin and without head-of-line blocking
//! - **Decoration**: [`AsyncDecoratorClient`] and the [`AsyncContext`]
//!   control surface (replace, cancel, passthrough, pause)
//! - **Retries**: [`RetryingClient`] with exponential backoff and
//!   `Retry-After` support
//! - **Testing**: [`MockHttpClient`] with scripted responses
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use asyncnet::{Client, HttpClient, RetryingClient};
//! use asyncnet::http::retry::RetryConfig;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), asyncnet::ClientError> {
//!     let client = RetryingClient::new(Client::new(), RetryConfig::default());
//!     let a = client.request(Method::GET, "http://localhost:8080/a", Default::default())?;
//!     let b = client.request(Method::GET, "http://localhost:8080/b", Default::default())?;
//!
//!     let mut stream = client.stream(&[a, b]);
//!     while let Some((response, chunk)) = stream.next().await {
//!         println!("{}: {:?}", response.id(), chunk?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error types and load states
//! - [`http`] - Chunks, options, info and the network transport
//! - [`async_response`] - Logical responses, chunk filters and their context
//! - [`decorator`] - Decorating and retrying clients
//! - [`mock`] - Scripted responses

pub mod async_response;
pub mod base;
pub mod client;
pub mod decorator;
pub mod http;
pub mod mock;
pub mod stream;

pub use crate::async_response::{filter_fn, AsyncContext, AsyncResponse, ChunkFilter};
pub use crate::base::clienterror::ClientError;
pub use crate::base::loadstate::LoadState;
pub use crate::base::neterror::NetError;
pub use crate::client::{Client, ClientBuilder, HttpClient, RequestBuilder};
pub use crate::decorator::{AsyncDecoratorClient, RetryingClient};
pub use crate::http::{Chunk, RequestOptions, ResponseInfo};
pub use crate::mock::{MockHttpClient, MockResponse};
pub use crate::stream::ResponseStream;
