//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → live snapshot: Host → server block, path → location
//!     → upstream service address → hyper client
//!     → response streamed back to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
