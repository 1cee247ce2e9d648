//! Transport response backed by a network transaction.

use crate::base::clienterror::ClientError;
use crate::base::neterror::NetError;
use crate::http::chunk::Chunk;
use crate::http::info::ResponseInfo;
use crate::http::options::RequestOptions;
use crate::http::streamfactory::HttpStreamFactory;
use crate::http::transaction::{HttpNetworkTransaction, TransactionEvent};
use crate::http::transport::TransportResponse;
use http::{HeaderMap, Method, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use url::Url;

/// One HTTP/1.1 request running on a spawned task.
///
/// The task is spawned on first poll. An idle timer produces a `Timeout`
/// chunk each time `timeout` elapses without progress, and `max_duration`
/// ends the response with an error. Cancelling or dropping the response
/// aborts the task, which closes the connection.
pub struct NetResponse {
    transaction: Option<HttpNetworkTransaction>,
    events: UnboundedReceiver<TransactionEvent>,
    task: Option<JoinHandle<()>>,
    url: Url,
    status: Option<StatusCode>,
    headers: Option<HeaderMap>,
    info: ResponseInfo,
    offset: u64,
    idle_timeout: Option<Duration>,
    idle: Option<Pin<Box<Sleep>>>,
    max_duration: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    started: Option<Instant>,
    finished: bool,
}

impl NetResponse {
    pub fn new(
        factory: HttpStreamFactory,
        method: Method,
        url: Url,
        options: &RequestOptions,
    ) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        let transaction =
            HttpNetworkTransaction::new(factory, method.clone(), url.clone(), options, sender);

        let mut info = ResponseInfo::new();
        info.set("http_method", method.as_str());
        info.set("url", url.as_str());
        info.set("original_url", url.as_str());
        info.set("redirect_count", 0);
        info.set("size_download", 0);
        info.set("canceled", false);
        if let Some(user_data) = options.get_user_data() {
            info.set("user_data", user_data.clone());
        }
        if let Some(max_duration) = options.get_max_duration() {
            info.set("max_duration", max_duration.as_secs_f64());
        }

        Self {
            transaction: Some(transaction),
            events,
            task: None,
            url,
            status: None,
            headers: None,
            info,
            offset: 0,
            idle_timeout: options.get_timeout(),
            idle: None,
            max_duration: options.get_max_duration(),
            deadline: None,
            started: None,
            finished: false,
        }
    }

    fn start(&mut self) {
        let Some(transaction) = self.transaction.take() else {
            return;
        };
        tracing::debug!(url = %self.url, "starting transaction");
        let now = Instant::now();
        self.started = Some(now);
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();
        self.info.set("start_time", start_time);
        self.idle = self.idle_timeout.map(|limit| Box::pin(tokio::time::sleep_until(now + limit)));
        self.deadline = self
            .max_duration
            .map(|limit| Box::pin(tokio::time::sleep_until(now + limit)));
        self.task = Some(tokio::spawn(transaction.run()));
    }

    fn finish(&mut self) {
        self.finished = true;
        self.transaction = None;
        self.idle = None;
        self.deadline = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(started) = self.started {
            self.info.set("total_time", started.elapsed().as_secs_f64());
        }
    }

    fn fail(&mut self, error: ClientError) -> Chunk {
        self.info.set("error", error.to_string());
        self.finish();
        Chunk::failure(self.offset, error)
    }

    fn on_event(&mut self, event: TransactionEvent) -> Chunk {
        match event {
            TransactionEvent::Headers { status, headers, url, redirect_count } => {
                self.info.record_status(status, &headers);
                self.info.set("url", url.as_str());
                self.info.set("redirect_count", redirect_count);
                self.status = Some(status);
                self.headers = Some(headers);
                Chunk::First
            }
            TransactionEvent::Data(content) => {
                let chunk = Chunk::data(self.offset, content.clone());
                self.offset += content.len() as u64;
                self.info.set("size_download", self.offset);
                chunk
            }
            TransactionEvent::Done => {
                self.finish();
                Chunk::last(self.offset)
            }
            TransactionEvent::Failed(error) => self.fail(error),
        }
    }
}

impl TransportResponse for NetResponse {
    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        if self.finished {
            return Poll::Ready(None);
        }
        self.start();

        if let Some(deadline) = self.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                let error = ClientError::transport(
                    NetError::MaxDurationReached,
                    format!("Max duration was reached for \"{}\".", self.url),
                );
                return Poll::Ready(Some(self.fail(error)));
            }
        }

        match self.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if let (Some(idle), Some(limit)) = (self.idle.as_mut(), self.idle_timeout) {
                    idle.as_mut().reset(Instant::now() + limit);
                }
                Poll::Ready(Some(self.on_event(event)))
            }
            Poll::Ready(None) => {
                let error = ClientError::transport(
                    NetError::ConnectionClosed,
                    format!("Transaction for \"{}\" ended unexpectedly.", self.url),
                );
                Poll::Ready(Some(self.fail(error)))
            }
            Poll::Pending => {
                if let (Some(idle), Some(limit)) = (self.idle.as_mut(), self.idle_timeout) {
                    if idle.as_mut().poll(cx).is_ready() {
                        idle.as_mut().reset(Instant::now() + limit);
                        tracing::debug!(url = %self.url, "idle timeout reached");
                        return Poll::Ready(Some(Chunk::timeout(self.offset)));
                    }
                }
                Poll::Pending
            }
        }
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }

    fn headers(&self) -> Option<HeaderMap> {
        self.headers.clone()
    }

    fn info(&self) -> ResponseInfo {
        self.info.clone()
    }

    fn cancel(&mut self) {
        if self.finished {
            return;
        }
        tracing::debug!(url = %self.url, "transaction canceled");
        self.info.set("canceled", true);
        self.finish();
    }
}

impl Drop for NetResponse {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
