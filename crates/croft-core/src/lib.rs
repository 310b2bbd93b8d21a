//! Cross-service plumbing shared by all Croft services.
//!
//! Keep this crate thin: health endpoints, tracing bootstrap, request-id
//! middleware, and serde helpers. Domain types belong in `croft-domain`.

pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
