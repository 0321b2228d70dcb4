//! Job event types and in-process pub/sub.
//!
//! - [`EventBus`] — publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`JobEvent`] — one notification about one download job; its payload is
//!   exactly what goes over the wire to the job's room.

pub mod bus;

pub use bus::{EventBus, JobEvent, JobPayload, StatusUpdate};
