//! Scripted transport for tests and offline use.
//!
//! ```rust,ignore
//! use asyncnet::mock::{MockHttpClient, MockResponse};
//!
//! let client = MockHttpClient::from_responses([
//!     MockResponse::new(["Hello ", "world"]).with_status(StatusCode::OK),
//! ]);
//! ```

use crate::async_response::AsyncResponse;
use crate::base::clienterror::ClientError;
use crate::client::HttpClient;
use crate::http::chunk::Chunk;
use crate::http::info::ResponseInfo;
use crate::http::options::RequestOptions;
use crate::http::transport::TransportResponse;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Headers,
    Body,
    Done,
}

#[derive(Debug, Clone)]
enum Failure {
    BeforeHeaders(ClientError),
    AfterBody(ClientError),
}

/// A response whose chunks are scripted up front.
///
/// Body parts are delivered one per poll. An empty part stands for an idle
/// timeout and is delivered as a `Timeout` chunk.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: VecDeque<Bytes>,
    failure: Option<Failure>,
    stalled: bool,
    phase: Phase,
    info: ResponseInfo,
    offset: u64,
}

impl MockResponse {
    pub fn new<I, B>(body: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.into_iter().map(Into::into).collect(),
            failure: None,
            stalled: false,
            phase: Phase::Headers,
            info: ResponseInfo::new(),
            offset: 0,
        }
    }

    /// A response that fails before any header arrives.
    pub fn failing(error: ClientError) -> Self {
        Self {
            failure: Some(Failure::BeforeHeaders(error)),
            ..Self::new(Vec::<Bytes>::new())
        }
    }

    /// A response that never produces anything.
    pub fn stalled() -> Self {
        Self { stalled: true, ..Self::new(Vec::<Bytes>::new()) }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        if let (Ok(k), Ok(v)) = (key.try_into(), value.try_into()) {
            self.headers.append(k, v);
        }
        self
    }

    /// End with `error` instead of `Last` once the body is delivered.
    pub fn fail_after_body(mut self, error: ClientError) -> Self {
        self.failure = Some(Failure::AfterBody(error));
        self
    }

    fn prepare(mut self, method: &Method, url: &Url, options: &RequestOptions) -> Self {
        self.info.set("http_method", method.as_str());
        self.info.set("url", url.as_str());
        self.info.set("original_url", url.as_str());
        self.info.set("redirect_count", 0);
        self.info.set("size_download", 0);
        self.info.set("canceled", false);
        if let Some(user_data) = options.get_user_data() {
            self.info.set("user_data", user_data.clone());
        }
        self
    }

    fn fail(&mut self, error: ClientError) -> Chunk {
        self.phase = Phase::Done;
        self.info.set("error", error.to_string());
        Chunk::failure(self.offset, error)
    }
}

impl TransportResponse for MockResponse {
    fn poll_chunk(&mut self, _cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        if self.stalled {
            return Poll::Pending;
        }
        let chunk = match self.phase {
            Phase::Done => return Poll::Ready(None),
            Phase::Headers => match self.failure.clone() {
                Some(Failure::BeforeHeaders(error)) => self.fail(error),
                _ => {
                    self.info.record_status(self.status, &self.headers);
                    self.phase = Phase::Body;
                    Chunk::First
                }
            },
            Phase::Body => match self.body.pop_front() {
                Some(part) if part.is_empty() => Chunk::timeout(self.offset),
                Some(part) => {
                    let chunk = Chunk::data(self.offset, part.clone());
                    self.offset += part.len() as u64;
                    self.info.set("size_download", self.offset);
                    chunk
                }
                None => match self.failure.take() {
                    Some(Failure::AfterBody(error)) => self.fail(error),
                    _ => {
                        self.phase = Phase::Done;
                        Chunk::last(self.offset)
                    }
                },
            },
        };
        Poll::Ready(Some(chunk))
    }

    fn status(&self) -> Option<StatusCode> {
        (self.phase != Phase::Headers).then_some(self.status)
    }

    fn headers(&self) -> Option<HeaderMap> {
        (self.phase != Phase::Headers).then(|| self.headers.clone())
    }

    fn info(&self) -> ResponseInfo {
        self.info.clone()
    }

    fn cancel(&mut self) {
        if self.phase != Phase::Done {
            self.phase = Phase::Done;
            self.stalled = false;
            self.info.set("canceled", true);
        }
    }
}

type ResponseFactory =
    dyn Fn(&Method, &Url, &RequestOptions) -> Result<MockResponse, ClientError> + Send + Sync;

/// Client answering every request with a [`MockResponse`].
pub struct MockHttpClient {
    factory: Box<ResponseFactory>,
    requests: AtomicUsize,
}

impl MockHttpClient {
    /// Build each response with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&Method, &Url, &RequestOptions) -> MockResponse + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(move |method, url, options| Ok(factory(method, url, options))),
            requests: AtomicUsize::new(0),
        }
    }

    /// Answer requests with `responses`, in order. Requests beyond the last
    /// response fail.
    pub fn from_responses<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = MockResponse>,
    {
        let queue = Mutex::new(responses.into_iter().collect::<VecDeque<_>>());
        Self {
            factory: Box::new(move |_, _, _| {
                queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front()
                    .ok_or_else(|| ClientError::invalid_state("No more mock responses."))
            }),
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of requests issued so far.
    pub fn requests_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl HttpClient for MockHttpClient {
    fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<AsyncResponse, ClientError> {
        options.validate()?;
        let url = Url::parse(url)?;
        self.requests.fetch_add(1, Ordering::SeqCst);
        let response = (self.factory)(&method, &url, &options)?.prepare(&method, &url, &options);
        Ok(AsyncResponse::from_transport(response, method, url, options))
    }
}
