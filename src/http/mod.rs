//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → admission middleware (slot acquired, back-off when saturated)
//!     → relay handler (race upstream call vs deadline)
//!     → 200 with re-encoded payload, or 502/504 per failure class
//!
//! GET /healthz bypasses admission and the relay entirely
//! ```

pub mod server;

pub use server::{AppState, HttpServer, ServerError};
