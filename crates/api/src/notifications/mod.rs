//! Event-to-room notification routing.

mod router;

pub use router::NotificationRouter;
