//! Event triples and the dispatch surface.
//!
//! The input stack moves data as small `(type, code, value)` triples, the
//! same shape the evdev protocol uses. [`RawEvent`] is one such triple;
//! [`EventHandler`] is the callback surface a registered device exposes to
//! consume them.
//!
//! ## Code conventions
//! - `BTN_*` codes belong to the [`EventType::Key`] family and carry 0/1
//!   press state.
//! - `ABS_MT_*` codes belong to the [`EventType::Abs`] family and carry
//!   absolute axis values in device units.
//! - [`EventType::Syn`] frames a batch of triples; it carries no per-code
//!   declarations.
//!
//! The numeric values mirror the evdev constants so that captures from a
//! real peripheral can be replayed against this stack unchanged.

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Bus classification for an I2C-attached peripheral.
pub const BUS_I2C: u16 = 0x18;

/// Event family of a triple. Raw values follow the evdev numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Batch framing, no declarable codes.
    Syn,
    /// Buttons and keys.
    Key,
    /// Relative axes.
    Rel,
    /// Absolute axes (multitouch lives here).
    Abs,
}

impl EventType {
    /// Raw evdev type number.
    #[inline]
    pub fn raw(self) -> u16 {
        match self {
            EventType::Syn => 0x00,
            EventType::Key => 0x01,
            EventType::Rel => 0x02,
            EventType::Abs => 0x03,
        }
    }

    /// Maps a raw evdev type number back to a family, if it is one this
    /// stack models.
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0x00 => Some(EventType::Syn),
            0x01 => Some(EventType::Key),
            0x02 => Some(EventType::Rel),
            0x03 => Some(EventType::Abs),
            _ => None,
        }
    }
}

// Button codes (Key family).
pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;
pub const BTN_TOOL_FINGER: u16 = 0x145;
pub const BTN_TOUCH: u16 = 0x14a;
pub const BTN_TOOL_DOUBLETAP: u16 = 0x14d;

// Multitouch axis codes (Abs family).
pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_TOUCH_MAJOR: u16 = 0x30;
pub const ABS_MT_TOUCH_MINOR: u16 = 0x31;
pub const ABS_MT_ORIENTATION: u16 = 0x34;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TOOL_TYPE: u16 = 0x37;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;
pub const ABS_MT_PRESSURE: u16 = 0x3a;
pub const ABS_MT_DISTANCE: u16 = 0x3b;

/// One injected input change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event family.
    pub event_type: EventType,
    /// Family-local code (button number, axis number).
    pub code: u16,
    /// New value: 0/1 for buttons, device units for axes.
    pub value: i32,
}

impl RawEvent {
    pub fn new(event_type: EventType, code: u16, value: i32) -> Self {
        Self { event_type, code, value }
    }
}

/// Callback surface a registered device exposes to the input stack.
///
/// Invoked once per injected triple, never before the device's registration
/// completes and never after its unregistration completes.
pub trait EventHandler: Send {
    fn handle(&mut self, event: &RawEvent) -> Result<(), DriverError>;
}
