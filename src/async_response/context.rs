//! The control surface handed to chunk filters.

use crate::async_response::filter::ChunkFilter;
use crate::async_response::state::ResponseCore;
use crate::base::clienterror::ClientError;
use crate::base::neterror::NetError;
use crate::http::chunk::Chunk;
use crate::http::info::ResponseInfo;
use crate::http::options::RequestOptions;
use crate::http::transport::TransportResponse;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Mutable view of a logical response, valid for one filter call.
///
/// Through the context a filter can inspect the active underlying response,
/// abandon it, replace it with a new request, switch to passthrough, or
/// attach info to the logical response.
pub struct AsyncContext<'a> {
    core: &'a mut ResponseCore,
    raw_error: Option<ClientError>,
    // Some(None) is passthrough, Some(Some(f)) a replacement filter.
    next_filter: Option<Option<Box<dyn ChunkFilter>>>,
}

impl<'a> AsyncContext<'a> {
    pub(crate) fn new(core: &'a mut ResponseCore, raw_error: Option<ClientError>) -> Self {
        Self { core, raw_error, next_filter: None }
    }

    pub(crate) fn into_next_filter(self) -> Option<Option<Box<dyn ChunkFilter>>> {
        self.next_filter
    }

    /// Status code of the active underlying response.
    ///
    /// Fails with `InvalidState` before headers arrived. If the chunk being
    /// filtered is a transport error, that error is returned instead.
    pub fn status(&self) -> Result<StatusCode, ClientError> {
        match self.core.active.status() {
            Some(status) => Ok(status),
            None => Err(self.unavailable("status code")),
        }
    }

    pub fn headers(&self) -> Result<HeaderMap, ClientError> {
        match self.core.active.headers() {
            Some(headers) => Ok(headers),
            None => Err(self.unavailable("headers")),
        }
    }

    fn unavailable(&self, what: &str) -> ClientError {
        match &self.raw_error {
            Some(error) => error.clone(),
            None => ClientError::invalid_state(format!(
                "The {} of \"{}\" is not known yet.",
                what, self.core.url
            )),
        }
    }

    /// One info entry; logical values override the underlying response's.
    pub fn info(&self, key: &str) -> Option<Value> {
        self.core.merged_info().get(key).cloned()
    }

    pub fn info_all(&self) -> ResponseInfo {
        self.core.merged_info()
    }

    /// Attach info to the logical response.
    pub fn set_info(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.core.info.set(key, value);
    }

    pub fn method(&self) -> &Method {
        &self.core.method
    }

    pub fn url(&self) -> &Url {
        &self.core.url
    }

    /// Options of the logical request.
    pub fn options(&self) -> &RequestOptions {
        &self.core.options
    }

    /// Number of content bytes exposed so far.
    pub fn offset(&self) -> u64 {
        self.core.offset
    }

    /// Abandon the active underlying response. Idempotent.
    ///
    /// Unless a replacement is installed before the filter returns, the
    /// logical response ends: with `Last` if headers were already exposed,
    /// with a canceled error otherwise.
    pub fn cancel(&mut self) {
        tracing::debug!(url = %self.core.url, "filter canceled the active response");
        self.core.cancel_active();
    }

    /// Issue a new request through the inner client and make its response
    /// the active one.
    ///
    /// The current response is canceled and its info is appended to
    /// `previous_info`. `user_data` and the remaining `max_duration` of the
    /// logical request carry over.
    pub fn replace_request(
        &mut self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<(), ClientError> {
        let client = self.core.client.clone().ok_or_else(|| {
            ClientError::invalid_state("Only decorated responses can replace their request.")
        })?;
        let parsed = Url::parse(url)?;

        let mut options = options;
        if options.get_user_data().is_none() {
            options.set_user_data(self.core.options.get_user_data().cloned());
        }
        if let Some(limit) = self.core.options.get_max_duration() {
            let remaining = limit
                .checked_sub(self.core.elapsed())
                .filter(|remaining| !remaining.is_zero())
                .ok_or_else(|| {
                    ClientError::transport(
                        NetError::MaxDurationReached,
                        format!("Max duration was reached for \"{}\".", self.core.url),
                    )
                })?;
            let bounded = options
                .get_max_duration()
                .map_or(remaining, |own| own.min(remaining));
            options.set_max_duration(Some(bounded));
        }

        let response = client.request(method.clone(), url, options.for_inner_request())?;
        tracing::debug!(from = %self.core.url, to = %parsed, "replacing request");

        let previous = self.core.active.info();
        self.core.method = method;
        self.core.url = parsed;
        self.core.swap_active(Box::new(response), previous);
        Ok(())
    }

    /// Make an existing response the active one.
    pub fn replace_response<R>(&mut self, response: R)
    where
        R: TransportResponse + 'static,
    {
        let previous = self.core.active.info();
        self.core.swap_active(Box::new(response), previous);
    }

    /// Forward every later raw chunk unchanged.
    pub fn passthru(&mut self) {
        tracing::debug!(url = %self.core.url, "switching to passthrough");
        self.next_filter = Some(None);
    }

    /// Hand every later raw chunk to `filter` instead of the current one.
    pub fn passthru_with<F>(&mut self, filter: F)
    where
        F: FnMut(Chunk, &mut AsyncContext<'_>) -> Result<Vec<Chunk>, ClientError> + Send + 'static,
    {
        self.next_filter = Some(Some(Box::new(filter)));
    }

    /// A data chunk positioned at the current logical offset.
    pub fn create_chunk(&self, content: impl Into<Bytes>) -> Chunk {
        Chunk::data(self.core.offset, content)
    }

    /// Delay the next read of the active response.
    pub fn pause(&mut self, duration: Duration) {
        self.core.pause_for(duration);
    }
}
