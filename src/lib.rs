//! Single-endpoint HTTP relay.
//!
//! Accepts inbound requests, forwards one fixed outbound call to a remote
//! API, reshapes the JSON response, and returns it. Concurrent outbound work
//! is bounded by a soft admission gate, and every relay races a per-request
//! deadline so the caller always gets a definitive answer.

// Core subsystems
pub mod config;
pub mod http;
pub mod relay;

// Traffic management
pub mod admission;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
