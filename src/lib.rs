//! padbind — lifecycle core binding an I2C touch peripheral to a host input
//! stack as a virtual HID device.
//!
//! The driver side ([`TouchpadDriver`], [`DriverModule`]) implements the
//! probe/remove state machine and the capability-registration contract; the
//! [`host`] module models the bus and input subsystems the driver is written
//! against. Reading raw touch samples off the wire is a separate protocol
//! layer that would feed [`host::registry::InputRegistry::inject`]; nothing
//! in this crate produces samples.

pub mod caps;
pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod host;
pub mod module;

pub use caps::*;
pub use channel::*;
pub use config::*;
pub use driver::*;
pub use error::*;
pub use event::*;
pub use module::*;
