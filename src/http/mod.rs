pub mod chunk;
pub mod info;
pub mod netresponse;
pub mod options;
pub mod requestbody;
pub mod retry;
pub mod streamfactory;
pub(crate) mod transaction;
pub mod transport;

// Re-exports for convenience
pub use chunk::Chunk;
pub use info::ResponseInfo;
pub use netresponse::NetResponse;
pub use options::RequestOptions;
pub use requestbody::RequestBody;
pub use transport::{BoxedResponse, TransportResponse};
