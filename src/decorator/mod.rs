//! Clients that decorate the responses of an inner client.

pub mod retrying;

pub use retrying::RetryingClient;

use crate::async_response::{AsyncResponse, ChunkFilter};
use crate::base::clienterror::ClientError;
use crate::client::HttpClient;
use crate::http::options::RequestOptions;
use http::Method;
use std::sync::Arc;
use url::Url;

/// Builds the chunk filter of one request. `None` forwards the inner
/// response unchanged.
pub type FilterFactory =
    Arc<dyn Fn(&Method, &Url, &RequestOptions) -> Option<Box<dyn ChunkFilter>> + Send + Sync>;

/// Wraps an inner client and runs every response through a chunk filter.
///
/// Requests replaced by a filter are issued through the inner client, so
/// they are not filtered twice.
#[derive(Clone)]
pub struct AsyncDecoratorClient {
    inner: Arc<dyn HttpClient>,
    factory: FilterFactory,
}

impl AsyncDecoratorClient {
    pub fn new<C, F>(inner: C, factory: F) -> Self
    where
        C: HttpClient + 'static,
        F: Fn(&Method, &Url, &RequestOptions) -> Option<Box<dyn ChunkFilter>>
            + Send
            + Sync
            + 'static,
    {
        Self { inner: Arc::new(inner), factory: Arc::new(factory) }
    }

    pub fn inner(&self) -> &Arc<dyn HttpClient> {
        &self.inner
    }
}

impl HttpClient for AsyncDecoratorClient {
    fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<AsyncResponse, ClientError> {
        let parsed = Url::parse(url)?;
        let filter = (self.factory)(&method, &parsed, &options);
        AsyncResponse::decorate(self.inner.clone(), method, url, options, filter)
    }
}
