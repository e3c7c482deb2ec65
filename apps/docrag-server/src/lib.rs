//! HTTP surface of the RAG service. Routing is transport-independent so it can be
//! exercised without a socket; `main.rs` feeds it from a `tiny_http` listener.

pub mod router;

pub use router::{handle, ApiResponse};
