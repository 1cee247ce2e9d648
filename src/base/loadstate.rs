/// The lifecycle state of a logical response.
///
/// A response starts `Pending`, becomes `Active` once the first raw chunk has
/// been filtered, moves to `Replaced` whenever a filter swaps the underlying
/// response and back to `Active` on the replacement's first chunk, and ends
/// `Terminal` once its last (or error) chunk has been produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// No chunk processed yet.
    #[default]
    Pending,

    /// Receiving and filtering chunks.
    Active,

    /// The underlying response was swapped and the new one has not
    /// delivered a chunk yet.
    Replaced,

    /// The terminal chunk has been produced. Nothing else will be read.
    Terminal,
}
