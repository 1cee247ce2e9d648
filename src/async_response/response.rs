use crate::async_response::filter::ChunkFilter;
use crate::async_response::state::ResponseCore;
use crate::base::clienterror::ClientError;
use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::client::HttpClient;
use crate::http::chunk::Chunk;
use crate::http::info::ResponseInfo;
use crate::http::options::RequestOptions;
use crate::http::transport::TransportResponse;
use crate::stream::ResponseStream;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::future::poll_fn;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use url::Url;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A logical HTTP response.
///
/// Handles are cheap to clone and all clones share the same state, so a
/// response can be streamed from several places while its chunks are
/// consumed once. Dropping the last handle cancels the underlying request.
///
/// Nothing happens until the response is driven through [`status`],
/// [`content`] or a [`ResponseStream`].
///
/// [`status`]: AsyncResponse::status
/// [`content`]: AsyncResponse::content
#[derive(Clone)]
pub struct AsyncResponse {
    id: u64,
    core: Arc<Mutex<ResponseCore>>,
}

impl AsyncResponse {
    /// Expose a transport response as-is.
    pub fn from_transport<R>(response: R, method: Method, url: Url, options: RequestOptions) -> Self
    where
        R: TransportResponse + 'static,
    {
        Self::from_core(ResponseCore::new(Box::new(response), None, method, url, options, None))
    }

    /// Issue a request through `client` and run its chunks through `filter`.
    ///
    /// Without a filter the inner chunks are forwarded unchanged. The filter
    /// can replace the request; replacements are issued through `client`.
    pub fn decorate(
        client: Arc<dyn HttpClient>,
        method: Method,
        url: &str,
        options: RequestOptions,
        filter: Option<Box<dyn ChunkFilter>>,
    ) -> Result<Self, ClientError> {
        options.validate()?;
        let parsed = Url::parse(url)?;
        let inner = client.request(method.clone(), url, options.for_inner_request())?;
        Ok(Self::from_core(ResponseCore::new(
            Box::new(inner),
            Some(client),
            method,
            parsed,
            options,
            filter,
        )))
    }

    fn from_core(core: ResponseCore) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            core: Arc::new(Mutex::new(core)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResponseCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Process-unique identity of this logical response.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the headers and return the status code.
    ///
    /// An idle timeout while waiting fails the response.
    pub async fn status(&self) -> Result<StatusCode, ClientError> {
        poll_fn(|cx| self.lock().poll_headers(cx)).await?;
        self.lock()
            .status()
            .ok_or_else(|| ClientError::invalid_state("The status code is not known."))
    }

    pub async fn headers(&self) -> Result<HeaderMap, ClientError> {
        poll_fn(|cx| self.lock().poll_headers(cx)).await?;
        self.lock()
            .headers()
            .ok_or_else(|| ClientError::invalid_state("The headers are not known."))
    }

    /// Wait for the whole body.
    ///
    /// Terminal errors are re-raised on every call.
    pub async fn content(&self) -> Result<Bytes, ClientError> {
        poll_fn(|cx| self.lock().poll_content(cx)).await
    }

    pub async fn text(&self) -> Result<String, ClientError> {
        let content = self.content().await?;
        String::from_utf8(content.to_vec()).map_err(|e| {
            let message = format!("Response body is not UTF-8: {}", e);
            ClientError::transport(NetError::InvalidUtf8, message)
        })
    }

    #[cfg(feature = "json")]
    pub async fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ClientError> {
        let content = self.content().await?;
        serde_json::from_slice(&content).map_err(|e| {
            ClientError::transport(NetError::JsonParseError, format!("Invalid JSON body: {}", e))
        })
    }

    /// Cancel the response. Later reads fail with a canceled error.
    pub fn cancel(&self) {
        self.lock().cancel();
    }

    pub fn info(&self) -> ResponseInfo {
        self.lock().merged_info()
    }

    pub fn info_value(&self, key: &str) -> Option<Value> {
        self.lock().merged_info().get(key).cloned()
    }

    pub fn load_state(&self) -> LoadState {
        self.lock().load_state()
    }

    /// How many raw chunks have gone through the filter.
    pub fn filter_calls(&self) -> u64 {
        self.lock().filter_calls()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().is_finished()
    }

    /// Stream the chunks of this response alone.
    pub fn stream(&self) -> ResponseStream {
        ResponseStream::new([self.clone()])
    }

    pub(crate) fn poll_stream_item(
        &self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Chunk, ClientError>> {
        self.lock().poll_stream_item(cx)
    }
}

impl TransportResponse for AsyncResponse {
    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        self.lock().poll_next_chunk(cx)
    }

    fn status(&self) -> Option<StatusCode> {
        self.lock().status()
    }

    fn headers(&self) -> Option<HeaderMap> {
        self.lock().headers()
    }

    fn info(&self) -> ResponseInfo {
        self.lock().merged_info()
    }

    fn cancel(&mut self) {
        self.lock().cancel();
    }
}

impl PartialEq for AsyncResponse {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AsyncResponse {}

impl Hash for AsyncResponse {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for AsyncResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResponse").field("id", &self.id).finish()
    }
}
