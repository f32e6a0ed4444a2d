//! Setu - serial-to-cloud JSON event bridge
//!
//! Reads a byte stream from a device on a serial line, cuts it into
//! brace-balanced JSON frames, routes each frame by its first key and PATCHes
//! the payload to a cloud key-value store over HTTPS, but only while the
//! network link is up.
//!
//! ## Modules
//!
//! - [`framing`]: bounded reassembly and frame extraction
//! - [`routing`]: category/payload split
//! - [`uplink`]: authenticated HTTPS dispatch
//! - [`link`]: connectivity state machine and readiness cell
//! - [`pipeline`]: ingest and dispatch threads joined by a bounded queue
//! - [`status`]: status sink and link indicator
//! - [`transport`]: serial (and mock) byte sources

pub mod config;
pub mod error;
pub mod framing;
pub mod link;
pub mod pipeline;
pub mod routing;
pub mod status;
pub mod transport;
pub mod uplink;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
