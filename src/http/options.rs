//! Typed request options.
//!
//! Options are validated once when the request is created. Options left
//! unset fall back to the client defaults through [`RequestOptions::with_defaults`].

use crate::base::clienterror::ClientError;
use crate::http::info::ResponseInfo;
use crate::http::requestbody::RequestBody;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Progress callback: `(bytes_downloaded, expected_total, info)`.
///
/// Invoked while the response is being driven; it must not call back into
/// the response it reports on.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>, &ResponseInfo) + Send + Sync>;

/// Default number of redirects followed (Chromium's limit).
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Options of a single request.
#[derive(Clone, Default)]
pub struct RequestOptions {
    headers: HeaderMap,
    body: RequestBody,
    timeout: Option<Duration>,
    max_duration: Option<Duration>,
    max_redirects: Option<usize>,
    buffer: Option<bool>,
    on_progress: Option<ProgressCallback>,
    user_data: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        if let (Ok(k), Ok(v)) = (key.try_into(), value.try_into()) {
            self.headers.insert(k, v);
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body<B: Into<RequestBody>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Idle timeout: a timeout chunk is produced each time no data arrives
    /// for this long.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Hard limit on the total duration of the request.
    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = Some(max_redirects);
        self
    }

    /// Whether content is accumulated for later `content()` calls.
    pub fn buffer(mut self, buffer: bool) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, Option<u64>, &ResponseInfo) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn user_data(mut self, user_data: impl Into<Value>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn get_body(&self) -> &RequestBody {
        &self.body
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn get_max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    pub fn get_max_redirects(&self) -> usize {
        self.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS)
    }

    pub fn is_buffered(&self) -> bool {
        self.buffer.unwrap_or(true)
    }

    pub fn get_on_progress(&self) -> Option<&ProgressCallback> {
        self.on_progress.as_ref()
    }

    pub fn get_user_data(&self) -> Option<&Value> {
        self.user_data.as_ref()
    }

    /// Reject option values that cannot be honored.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.timeout == Some(Duration::ZERO) {
            return Err(ClientError::invalid_argument(
                "Option \"timeout\" must be greater than zero.",
            ));
        }
        if self.max_duration == Some(Duration::ZERO) {
            return Err(ClientError::invalid_argument(
                "Option \"max_duration\" must be greater than zero.",
            ));
        }
        Ok(())
    }

    /// Fill every unset option from `defaults`. Default headers are kept
    /// unless overridden by a header of the same name.
    pub fn with_defaults(mut self, defaults: &RequestOptions) -> Self {
        let mut headers = defaults.headers.clone();
        for (name, value) in self.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        self.headers = headers;
        if self.body.is_empty() {
            self.body = defaults.body.clone();
        }
        self.timeout = self.timeout.or(defaults.timeout);
        self.max_duration = self.max_duration.or(defaults.max_duration);
        self.max_redirects = self.max_redirects.or(defaults.max_redirects);
        self.buffer = self.buffer.or(defaults.buffer);
        if self.on_progress.is_none() {
            self.on_progress = defaults.on_progress.clone();
        }
        if self.user_data.is_none() {
            self.user_data = defaults.user_data.clone();
        }
        self
    }

    pub(crate) fn set_max_duration(&mut self, max_duration: Option<Duration>) {
        self.max_duration = max_duration;
    }

    pub(crate) fn set_user_data(&mut self, user_data: Option<Value>) {
        self.user_data = user_data;
    }

    /// Copy for a request read only through a wrapping response, which
    /// reports progress and buffers content itself.
    pub(crate) fn for_inner_request(&self) -> Self {
        Self {
            on_progress: None,
            buffer: Some(false),
            ..self.clone()
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("timeout", &self.timeout)
            .field("max_duration", &self.max_duration)
            .field("max_redirects", &self.max_redirects)
            .field("buffer", &self.buffer)
            .field("on_progress", &self.on_progress.is_some())
            .field("user_data", &self.user_data)
            .finish()
    }
}
