//! The transport seam.
//!
//! A transport response produces the raw chunk sequence of one request.
//! Backends implement [`TransportResponse`]; responses are polled so that a
//! single task can multiplex any number of them.

use crate::http::chunk::Chunk;
use crate::http::info::ResponseInfo;
use http::{HeaderMap, StatusCode};
use std::task::{Context, Poll};

/// One in-flight request as seen from the transport.
///
/// `poll_chunk` yields a `First` chunk once headers are known, then data,
/// timeout and informational chunks, then one `Last` or `Error`. After the
/// terminal chunk it returns `Ready(None)`.
pub trait TransportResponse: Send {
    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Chunk>>;

    /// Status code, once headers have been received.
    fn status(&self) -> Option<StatusCode>;

    /// Response headers, once received.
    fn headers(&self) -> Option<HeaderMap>;

    fn info(&self) -> ResponseInfo;

    /// Abort the request. Must be idempotent and a no-op once finished.
    fn cancel(&mut self);
}

pub type BoxedResponse = Box<dyn TransportResponse>;

impl<T: TransportResponse + ?Sized> TransportResponse for Box<T> {
    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        (**self).poll_chunk(cx)
    }

    fn status(&self) -> Option<StatusCode> {
        (**self).status()
    }

    fn headers(&self) -> Option<HeaderMap> {
        (**self).headers()
    }

    fn info(&self) -> ResponseInfo {
        (**self).info()
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }
}
