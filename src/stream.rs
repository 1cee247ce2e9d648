//! Multiplexed chunk streaming over several responses.

use crate::async_response::AsyncResponse;
use crate::base::clienterror::ClientError;
use crate::http::chunk::Chunk;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream of `(response, chunk)` pairs across a set of responses.
///
/// Responses are polled round-robin, starting after the one that produced
/// the previous item, so a busy response cannot starve the others and a
/// stalled one never blocks them. A response leaves the set after its
/// terminal item: a `Last` or `Error` chunk, or an `Err`.
///
/// Chunks are consumed from the responses themselves: two streams over the
/// same response share one read position.
pub struct ResponseStream {
    entries: Vec<Entry>,
    cursor: usize,
}

struct Entry {
    response: AsyncResponse,
    done: bool,
}

impl ResponseStream {
    /// Build a stream over `responses`, ignoring duplicates.
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = AsyncResponse>,
    {
        let mut entries: Vec<Entry> = Vec::new();
        for response in responses {
            if !entries.iter().any(|entry| entry.response == response) {
                entries.push(Entry { response, done: false });
            }
        }
        Self { entries, cursor: 0 }
    }

    /// Responses that have not produced their terminal item yet.
    pub fn remaining(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.done).count()
    }
}

impl Stream for ResponseStream {
    type Item = (AsyncResponse, Result<Chunk, ClientError>);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let count = this.entries.len();
        let mut pending = false;

        for step in 0..count {
            let index = (this.cursor + step) % count;
            let entry = &mut this.entries[index];
            if entry.done {
                continue;
            }
            match entry.response.poll_stream_item(cx) {
                Poll::Ready(item) => {
                    entry.done = match &item {
                        Ok(chunk) => chunk.is_last(),
                        Err(_) => true,
                    };
                    this.cursor = (index + 1) % count;
                    return Poll::Ready(Some((entry.response.clone(), item)));
                }
                Poll::Pending => pending = true,
            }
        }

        if pending {
            Poll::Pending
        } else {
            Poll::Ready(None)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), None)
    }
}
