//! Upstream relay subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator spawns relay task
//!     → upstream.rs (one outbound GET with deadline)
//!     → records.rs (decode JSON array of repository records)
//!     → Ok(records) re-encoded by the HTTP layer, or RelayError → 502
//! ```

pub mod records;
pub mod upstream;

pub use records::Repository;
pub use upstream::{RelayError, UpstreamRelay};
