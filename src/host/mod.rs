//! Host-side collaborators the driver core is written against.
//!
//! Models of the subsystems a real host provides:
//! - [`bus`] — driver registration, peripheral attach/detach, probe/remove
//!   dispatch.
//! - [`registry`] — the input subsystem: device allocation, registration,
//!   event injection.
//! - [`mem`] — scoped memory accounting backing both.
//!
//! The models keep the ordering guarantees a driver is allowed to assume:
//! probe/remove for one client never overlap, registration is the visibility
//! barrier for event injection, and memory charged through a grant comes
//! back exactly when its owner is destroyed.

pub mod bus;
pub mod mem;
pub mod registry;
