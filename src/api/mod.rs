//! HTTP API layer.
//!
//! Exposes the generation pipeline over HTTP: the chat relay, the
//! progress push stream, and report retrieval. The router is
//! composable and the server runs as a background task with a
//! graceful shutdown handle.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer, ApiSession};
pub use types::ApiContext;
