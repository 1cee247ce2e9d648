//! Chunk filters.

use crate::async_response::context::AsyncContext;
use crate::base::clienterror::ClientError;
use crate::http::chunk::Chunk;

/// Transforms the raw chunks of a response into the chunks callers see.
///
/// A filter is advanced exactly once per raw chunk and returns the chunks to
/// expose for it, in order. Returning an empty vector hides the raw chunk.
/// Returning `Err` fails the response.
pub trait ChunkFilter: Send {
    fn filter(
        &mut self,
        chunk: Chunk,
        context: &mut AsyncContext<'_>,
    ) -> Result<Vec<Chunk>, ClientError>;
}

impl<F> ChunkFilter for F
where
    F: FnMut(Chunk, &mut AsyncContext<'_>) -> Result<Vec<Chunk>, ClientError> + Send,
{
    fn filter(
        &mut self,
        chunk: Chunk,
        context: &mut AsyncContext<'_>,
    ) -> Result<Vec<Chunk>, ClientError> {
        self(chunk, context)
    }
}

/// Box a closure as a [`ChunkFilter`].
///
/// Going through this function lets the compiler infer the closure's
/// argument types.
pub fn filter_fn<F>(filter: F) -> Box<dyn ChunkFilter>
where
    F: FnMut(Chunk, &mut AsyncContext<'_>) -> Result<Vec<Chunk>, ClientError> + Send + 'static,
{
    Box::new(filter)
}
