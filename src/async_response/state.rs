//! Orchestration state of a logical response.
//!
//! `ResponseCore` pulls raw chunks from the active underlying response,
//! runs each one through the chunk filter exactly once and queues the
//! filter's output for consumers. It owns every ordering rule of the
//! downstream sequence: a single `First`, rewritten offsets, nothing after
//! the terminal chunk.

use crate::async_response::context::AsyncContext;
use crate::async_response::filter::ChunkFilter;
use crate::base::clienterror::ClientError;
use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::client::HttpClient;
use crate::http::chunk::Chunk;
use crate::http::info::ResponseInfo;
use crate::http::options::RequestOptions;
use crate::http::transport::{BoxedResponse, TransportResponse};
use bytes::{Bytes, BytesMut};
use futures::task::{waker, ArcWake};
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Method, StatusCode};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll, Waker};
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use url::Url;

/// Tasks waiting on one response.
///
/// Clones of a response can be driven from several tasks at once, but a
/// transport keeps only the waker of its latest poll. The transport is
/// therefore polled with a single waker that wakes every registered task.
#[derive(Default)]
struct WakerSet {
    wakers: Mutex<Vec<Waker>>,
}

impl WakerSet {
    fn register(&self, waker: &Waker) {
        let mut wakers = self.wakers.lock().unwrap_or_else(PoisonError::into_inner);
        if !wakers.iter().any(|registered| registered.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    fn take(&self) -> Vec<Waker> {
        std::mem::take(&mut *self.wakers.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Wake every task except `current`, which is already running.
    fn wake_others(&self, current: &Waker) {
        for waker in self.take() {
            if !waker.will_wake(current) {
                waker.wake();
            }
        }
    }
}

impl ArcWake for WakerSet {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        for waker in arc_self.take() {
            waker.wake();
        }
    }
}

pub(crate) struct ResponseCore {
    pub(crate) client: Option<Arc<dyn HttpClient>>,
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) options: RequestOptions,
    pub(crate) active: BoxedResponse,
    active_done: bool,
    active_canceled: bool,
    filter: Option<Box<dyn ChunkFilter>>,
    pub(crate) info: ResponseInfo,
    status: Option<StatusCode>,
    headers: Option<HeaderMap>,
    queue: VecDeque<Chunk>,
    content: BytesMut,
    pub(crate) offset: u64,
    yielded_first: bool,
    finished: bool,
    error: Option<ClientError>,
    error_observed: bool,
    delivered_data: bool,
    pause: Option<Pin<Box<Sleep>>>,
    state: LoadState,
    filter_calls: u64,
    started: Instant,
    waiters: Arc<WakerSet>,
    shared_waker: Waker,
}

impl ResponseCore {
    pub(crate) fn new(
        active: BoxedResponse,
        client: Option<Arc<dyn HttpClient>>,
        method: Method,
        url: Url,
        options: RequestOptions,
        filter: Option<Box<dyn ChunkFilter>>,
    ) -> Self {
        let waiters = Arc::new(WakerSet::default());
        let shared_waker = waker(waiters.clone());
        Self {
            client,
            method,
            url,
            options,
            active,
            active_done: false,
            active_canceled: false,
            filter,
            info: ResponseInfo::new(),
            status: None,
            headers: None,
            queue: VecDeque::new(),
            content: BytesMut::new(),
            offset: 0,
            yielded_first: false,
            finished: false,
            error: None,
            error_observed: false,
            delivered_data: false,
            pause: None,
            state: LoadState::Pending,
            filter_calls: 0,
            started: Instant::now(),
            waiters,
            shared_waker,
        }
    }

    pub(crate) fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub(crate) fn headers(&self) -> Option<HeaderMap> {
        self.headers.clone()
    }

    pub(crate) fn load_state(&self) -> LoadState {
        self.state
    }

    pub(crate) fn filter_calls(&self) -> u64 {
        self.filter_calls
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Logical info layered over the active response's info.
    pub(crate) fn merged_info(&self) -> ResponseInfo {
        self.info.merged_over(&self.active.info())
    }

    pub(crate) fn pause_for(&mut self, duration: Duration) {
        self.pause = if duration.is_zero() {
            None
        } else {
            Some(Box::pin(tokio::time::sleep(duration)))
        };
    }

    pub(crate) fn cancel_active(&mut self) {
        if !self.active_done {
            self.active.cancel();
            self.active_done = true;
            self.active_canceled = true;
        }
    }

    pub(crate) fn swap_active(&mut self, response: BoxedResponse, previous: ResponseInfo) {
        self.cancel_active();
        self.info.push_previous(previous);
        self.active = response;
        self.active_done = false;
        self.active_canceled = false;
        self.state = LoadState::Replaced;
    }

    /// Cancel the logical response from outside. Idempotent.
    pub(crate) fn cancel(&mut self) {
        if self.finished {
            return;
        }
        tracing::debug!(url = %self.url, "response canceled");
        let error = ClientError::canceled();
        self.info.set("canceled", true);
        self.info.set("error", error.to_string());
        self.queue.clear();
        self.cancel_active();
        self.error = Some(error);
        self.error_observed = true;
        self.finish();
        self.shared_waker.wake_by_ref();
    }

    /// Read and process one raw chunk, honoring a pending pause.
    ///
    /// Every task that reaches this point is woken on progress, whichever
    /// of them polled the transport last.
    fn poll_step(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if self.finished {
            return Poll::Ready(());
        }
        self.waiters.register(cx.waker());
        let shared = self.shared_waker.clone();
        let mut shared_cx = Context::from_waker(&shared);
        ready!(self.poll_raw(&mut shared_cx));
        self.waiters.wake_others(cx.waker());
        Poll::Ready(())
    }

    fn poll_raw(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(pause) = self.pause.as_mut() {
            ready!(pause.as_mut().poll(cx));
            self.pause = None;
        }
        if self.active_done {
            self.finish_exhausted(None);
            return Poll::Ready(());
        }
        let raw = match ready!(self.active.poll_chunk(cx)) {
            Some(chunk) => chunk,
            None => Chunk::failure(
                self.offset,
                ClientError::transport(
                    NetError::EmptyResponse,
                    format!("Response of \"{}\" ended without a terminal chunk.", self.url),
                ),
            ),
        };
        self.process(raw);
        Poll::Ready(())
    }

    fn process(&mut self, raw: Chunk) {
        self.filter_calls += 1;
        self.state = LoadState::Active;
        if raw.is_last() {
            self.active_done = true;
        }
        let raw_error = raw.error().cloned();
        self.report_progress(&raw);

        let Some(mut filter) = self.filter.take() else {
            self.emit(raw);
            self.finish_exhausted(raw_error);
            return;
        };

        let (result, next_filter) = {
            let mut context = AsyncContext::new(self, raw_error.clone());
            let result = filter.filter(raw, &mut context);
            (result, context.into_next_filter())
        };
        self.filter = match next_filter {
            Some(next) => next,
            None => Some(filter),
        };

        match result {
            Ok(chunks) => {
                for chunk in chunks {
                    self.emit(chunk);
                }
            }
            Err(error) => {
                tracing::debug!(url = %self.url, error = %error, "chunk filter failed");
                let fault = match error {
                    ClientError::Filter { .. } => error,
                    // Re-raising the raw chunk's own error leaves it untouched.
                    error if raw_error.as_ref() == Some(&error) => error,
                    error => {
                        let message = error.to_string();
                        ClientError::filter(message, raw_error.clone().or(Some(error)))
                    }
                };
                self.fail(fault);
            }
        }
        self.finish_exhausted(raw_error);
    }

    fn emit(&mut self, chunk: Chunk) {
        if self.finished {
            tracing::warn!(url = %self.url, "dropping chunk yielded after the terminal chunk");
            return;
        }
        match chunk {
            Chunk::First => {
                if self.yielded_first {
                    tracing::debug!(url = %self.url, "dropping duplicate first chunk");
                    return;
                }
                self.establish_headers();
                self.queue.push_back(Chunk::First);
            }
            Chunk::Data { content, .. } => {
                if !self.yielded_first {
                    self.emit(Chunk::First);
                }
                if content.is_empty() {
                    return;
                }
                let offset = self.offset;
                self.offset += content.len() as u64;
                if self.options.is_buffered() {
                    self.content.extend_from_slice(&content);
                }
                self.queue.push_back(Chunk::Data { offset, content });
            }
            Chunk::Error { error, .. } => self.fail(error),
            Chunk::Last { .. } => {
                if !self.yielded_first {
                    self.emit(Chunk::First);
                }
                self.queue.push_back(Chunk::last(self.offset));
                self.finish();
            }
            other => {
                let offset = self.offset;
                self.queue.push_back(other.at_offset(offset));
            }
        }
    }

    fn establish_headers(&mut self) {
        self.yielded_first = true;
        self.status = self.active.status();
        self.headers = self.active.headers();
        if let (Some(status), Some(headers)) = (self.status, self.headers.as_ref()) {
            self.info.record_status(status, headers);
        }
    }

    pub(crate) fn fail(&mut self, error: ClientError) {
        if self.finished {
            return;
        }
        tracing::debug!(url = %self.url, error = %error, "response failed");
        self.info.set("error", error.to_string());
        self.queue.push_back(Chunk::failure(self.offset, error.clone()));
        self.error = Some(error);
        self.finish();
    }

    fn finish(&mut self) {
        self.finished = true;
        self.state = LoadState::Terminal;
        self.pause = None;
        self.filter = None;
        self.cancel_active();
        self.info.set("total_time", self.started.elapsed().as_secs_f64());
    }

    /// End the logical response once the active response is exhausted and
    /// the filter installed no replacement.
    fn finish_exhausted(&mut self, raw_error: Option<ClientError>) {
        if self.finished || !self.active_done {
            return;
        }
        if self.active_canceled {
            self.info.set("canceled", true);
            if self.yielded_first {
                self.emit(Chunk::last(self.offset));
            } else {
                self.fail(ClientError::canceled());
            }
            return;
        }
        match raw_error {
            Some(error) => self.fail(error),
            None => self.emit(Chunk::last(self.offset)),
        }
    }

    fn report_progress(&self, raw: &Chunk) {
        let Some(callback) = self.options.get_on_progress() else {
            return;
        };
        let downloaded = match raw {
            Chunk::Data { offset, content } => offset + content.len() as u64,
            other => other.offset(),
        };
        let total = self.active.headers().and_then(|headers| {
            headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse::<u64>().ok()
        });
        callback(downloaded, total, &self.merged_info());
    }

    /// Next downstream chunk, or `None` once the queue is drained after the
    /// terminal chunk.
    pub(crate) fn poll_next_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        loop {
            if let Some(chunk) = self.queue.pop_front() {
                if matches!(chunk, Chunk::Data { .. }) {
                    self.delivered_data = true;
                }
                return Poll::Ready(Some(chunk));
            }
            if self.finished {
                return Poll::Ready(None);
            }
            ready!(self.poll_step(cx));
        }
    }

    /// Next item for a stream consumer.
    ///
    /// A terminal error is raised as `Err` the first time it is observed
    /// and reported as an error chunk afterwards. An exhausted response
    /// yields its terminal chunk again.
    pub(crate) fn poll_stream_item(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Chunk, ClientError>> {
        match ready!(self.poll_next_chunk(cx)) {
            Some(Chunk::Error { offset, error }) => {
                if self.error_observed {
                    Poll::Ready(Ok(Chunk::Error { offset, error }))
                } else {
                    self.error_observed = true;
                    Poll::Ready(Err(error))
                }
            }
            Some(chunk) => Poll::Ready(Ok(chunk)),
            None => Poll::Ready(self.terminal_replay()),
        }
    }

    fn terminal_replay(&mut self) -> Result<Chunk, ClientError> {
        match &self.error {
            Some(error) if !self.error_observed => {
                self.error_observed = true;
                Err(error.clone())
            }
            Some(error) => Ok(Chunk::failure(self.offset, error.clone())),
            None => Ok(Chunk::last(self.offset)),
        }
    }

    /// Drive the response until headers are known.
    pub(crate) fn poll_headers(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), ClientError>> {
        loop {
            if self.yielded_first {
                return Poll::Ready(Ok(()));
            }
            if self.finished {
                return Poll::Ready(Err(self.error.clone().unwrap_or_else(|| {
                    ClientError::invalid_state("The response ended without headers.")
                })));
            }
            ready!(self.poll_step(cx));
            self.fail_on_timeout();
        }
    }

    fn fail_on_timeout(&mut self) {
        if self.queue.iter().any(Chunk::is_timeout) {
            self.queue.retain(|chunk| !chunk.is_timeout());
            let error = ClientError::timeout(self.url.to_string());
            self.fail(error);
        }
    }

    /// Drive the response to completion and return the full body.
    pub(crate) fn poll_content(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Bytes, ClientError>> {
        let buffered = self.options.is_buffered();
        if !buffered && self.delivered_data {
            return Poll::Ready(Err(ClientError::invalid_state(
                "Cannot get the content of the response twice: buffering is disabled.",
            )));
        }
        loop {
            while let Some(chunk) = self.queue.pop_front() {
                match chunk {
                    Chunk::Timeout { .. } => {
                        let error = ClientError::timeout(self.url.to_string());
                        self.fail(error);
                    }
                    Chunk::Data { content, .. } if !buffered => {
                        self.content.extend_from_slice(&content);
                    }
                    Chunk::Error { error, .. } => {
                        self.error_observed = true;
                        return Poll::Ready(Err(error));
                    }
                    _ => {}
                }
            }
            if self.finished {
                return Poll::Ready(match &self.error {
                    Some(error) => Err(error.clone()),
                    None => Ok(Bytes::copy_from_slice(&self.content)),
                });
            }
            ready!(self.poll_step(cx));
        }
    }
}
