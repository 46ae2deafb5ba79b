//! Capability declaration for a virtual input device.
//!
//! Before registration a device declares every `(event family, code)` pair it
//! may ever report, plus a coarse family bitmask. The two must agree: a code
//! whose family is missing from the mask is an untestable configuration the
//! input stack refuses to register. [`CapabilitySet::declare`] keeps the mask
//! in step with every declared code, so a set built through this API is
//! consistent by construction.
//!
//! Two stock variants exist. [`CapabilityVariant::Minimal`] publishes a plain
//! two-button device; [`CapabilityVariant::Full`] adds the middle button, the
//! touch and tool-presence buttons, and the absolute multitouch axes, which
//! is what downstream gesture layers need to adopt the device.

use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::event::{
    EventType, ABS_MT_DISTANCE, ABS_MT_ORIENTATION, ABS_MT_POSITION_X, ABS_MT_POSITION_Y,
    ABS_MT_PRESSURE, ABS_MT_SLOT, ABS_MT_TOOL_TYPE, ABS_MT_TOUCH_MAJOR, ABS_MT_TOUCH_MINOR,
    ABS_MT_TRACKING_ID, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, BTN_TOOL_DOUBLETAP, BTN_TOOL_FINGER,
    BTN_TOUCH,
};

bitflags! {
    /// Coarse event-family bitmask of a device (its `evbit` line).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EventTypeMask: u8 {
        const SYN = 1 << 0;
        const KEY = 1 << 1;
        const REL = 1 << 2;
        const ABS = 1 << 3;
    }
}

fn family_bit(ty: EventType) -> EventTypeMask {
    match ty {
        EventType::Syn => EventTypeMask::SYN,
        EventType::Key => EventTypeMask::KEY,
        EventType::Rel => EventTypeMask::REL,
        EventType::Abs => EventTypeMask::ABS,
    }
}

/// Which capability set a driver instance publishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityVariant {
    /// Left/right button press events only.
    Minimal,
    /// Buttons, tool-presence buttons, and absolute multitouch axes.
    #[default]
    Full,
}

/// Declared `(family, code)` pairs and the matching family mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilitySet {
    mask: EventTypeMask,
    codes: BTreeMap<EventType, BTreeSet<u16>>,
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilitySet {
    /// An empty set. The mask starts with `SYN`: batch framing is always
    /// active and never carries per-code declarations.
    pub fn new() -> Self {
        Self {
            mask: EventTypeMask::SYN,
            codes: BTreeMap::new(),
        }
    }

    /// Builds the declared set for `variant`.
    pub fn for_variant(variant: CapabilityVariant) -> Self {
        let mut set = Self::new();
        set.declare(EventType::Key, BTN_LEFT);
        set.declare(EventType::Key, BTN_RIGHT);

        if variant == CapabilityVariant::Full {
            set.declare(EventType::Key, BTN_MIDDLE);
            set.declare(EventType::Key, BTN_TOUCH);
            set.declare(EventType::Key, BTN_TOOL_FINGER);
            set.declare(EventType::Key, BTN_TOOL_DOUBLETAP);

            for code in [
                ABS_MT_SLOT,
                ABS_MT_TOUCH_MAJOR,
                ABS_MT_TOUCH_MINOR,
                ABS_MT_ORIENTATION,
                ABS_MT_POSITION_X,
                ABS_MT_POSITION_Y,
                ABS_MT_TOOL_TYPE,
                ABS_MT_TRACKING_ID,
                ABS_MT_PRESSURE,
                ABS_MT_DISTANCE,
            ] {
                set.declare(EventType::Abs, code);
            }
        }

        set
    }

    /// Declares one `(family, code)` pair and enables the family in the mask.
    /// Declaring a pair twice is a no-op.
    pub fn declare(&mut self, ty: EventType, code: u16) {
        self.mask |= family_bit(ty);
        self.codes.entry(ty).or_default().insert(code);
    }

    #[inline]
    pub fn mask(&self) -> EventTypeMask {
        self.mask
    }

    #[inline]
    pub fn contains(&self, ty: EventType, code: u16) -> bool {
        self.codes.get(&ty).is_some_and(|set| set.contains(&code))
    }

    /// Number of declared pairs.
    pub fn len(&self) -> usize {
        self.codes.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Iterates declared pairs in `(family, code)` order.
    pub fn iter(&self) -> impl Iterator<Item = (EventType, u16)> + '_ {
        self.codes
            .iter()
            .flat_map(|(ty, codes)| codes.iter().map(move |code| (*ty, *code)))
    }

    /// True when every declared code's family is enabled in the mask.
    /// Holds for any set built through [`declare`](Self::declare); the input
    /// stack re-checks it at registration.
    pub fn covers_declared(&self) -> bool {
        self.codes.keys().all(|ty| self.mask.contains(family_bit(*ty)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_variant_is_exactly_two_buttons() {
        let set = CapabilitySet::for_variant(CapabilityVariant::Minimal);
        let pairs: Vec<_> = set.iter().collect();
        assert_eq!(
            pairs,
            vec![(EventType::Key, BTN_LEFT), (EventType::Key, BTN_RIGHT)]
        );
        assert_eq!(set.mask(), EventTypeMask::SYN | EventTypeMask::KEY);
    }

    #[test]
    fn full_variant_declares_buttons_tools_and_mt_axes() {
        let set = CapabilitySet::for_variant(CapabilityVariant::Full);
        assert_eq!(set.len(), 16);
        for code in [BTN_LEFT, BTN_RIGHT, BTN_MIDDLE, BTN_TOUCH, BTN_TOOL_FINGER, BTN_TOOL_DOUBLETAP] {
            assert!(set.contains(EventType::Key, code));
        }
        for code in [
            ABS_MT_SLOT,
            ABS_MT_TOUCH_MAJOR,
            ABS_MT_TOUCH_MINOR,
            ABS_MT_ORIENTATION,
            ABS_MT_POSITION_X,
            ABS_MT_POSITION_Y,
            ABS_MT_TOOL_TYPE,
            ABS_MT_TRACKING_ID,
            ABS_MT_PRESSURE,
            ABS_MT_DISTANCE,
        ] {
            assert!(set.contains(EventType::Abs, code));
        }
        assert_eq!(
            set.mask(),
            EventTypeMask::SYN | EventTypeMask::KEY | EventTypeMask::ABS
        );
    }

    #[test]
    fn declare_is_idempotent() {
        let mut set = CapabilitySet::new();
        set.declare(EventType::Key, BTN_LEFT);
        set.declare(EventType::Key, BTN_LEFT);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn mask_covers_every_declared_family() {
        for variant in [CapabilityVariant::Minimal, CapabilityVariant::Full] {
            assert!(CapabilitySet::for_variant(variant).covers_declared());
        }
    }
}
