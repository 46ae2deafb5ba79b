//! In-process model of the host input subsystem.
//!
//! A device moves through three stages: allocated ([`InputDevice`], private
//! to its driver), registered (visible under a [`DeviceId`], reachable by
//! [`InputRegistry::inject`]), and unregistered (gone). Registration is the
//! visibility barrier — nothing can reach a device's handler before
//! [`InputRegistry::register`] returns, and nothing can reach it after
//! [`InputRegistry::unregister`] returns, except injections that already
//! resolved the device and are draining.
//!
//! A device that fails registration is consumed and freed on the spot; it
//! never becomes visible and must not be torn down through the unregister
//! path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::caps::CapabilitySet;
use crate::error::DriverError;
use crate::event::{EventHandler, RawEvent};
use crate::host::bus::ClientKey;
use crate::host::mem::{MemoryBudget, MemoryGrant, DEVICE_UNITS};

/// Handle to a registered virtual input device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(u64);

/// Identity snapshot of a virtual input device.
///
/// `parent` links the device back to the bus client it represents, for
/// device-tree placement and lifetime coupling.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub bus_type: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
    pub parent: Option<ClientKey>,
}

/// A virtual input device between allocation and registration.
///
/// The owning driver populates identity, capabilities, and the event handler,
/// then hands the device to [`InputRegistry::register`]. Capabilities
/// declared after registration have no effect, which the move-based API makes
/// unrepresentable.
pub struct InputDevice {
    descriptor: DeviceDescriptor,
    caps: CapabilitySet,
    handler: Option<Box<dyn EventHandler>>,
    grant: MemoryGrant,
}

impl InputDevice {
    pub fn set_identity(
        &mut self,
        name: &str,
        bus_type: u16,
        vendor_id: u16,
        product_id: u16,
        version: u16,
    ) {
        self.descriptor.name = name.to_string();
        self.descriptor.bus_type = bus_type;
        self.descriptor.vendor_id = vendor_id;
        self.descriptor.product_id = product_id;
        self.descriptor.version = version;
    }

    pub fn set_parent(&mut self, parent: ClientKey) {
        self.descriptor.parent = Some(parent);
    }

    pub fn set_capabilities(&mut self, caps: CapabilitySet) {
        self.caps = caps;
    }

    pub fn set_handler(&mut self, handler: Box<dyn EventHandler>) {
        self.handler = Some(handler);
    }

    #[inline]
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    #[inline]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.caps
    }
}

struct RegisteredDevice {
    descriptor: DeviceDescriptor,
    caps: CapabilitySet,
    handler: Option<Mutex<Box<dyn EventHandler>>>,
    _grant: MemoryGrant,
}

/// The input subsystem: allocates, registers, and routes events to devices.
pub struct InputRegistry {
    budget: MemoryBudget,
    devices: RwLock<HashMap<DeviceId, Arc<RegisteredDevice>>>,
    next_id: AtomicU64,
    refuse_register: AtomicBool,
}

impl InputRegistry {
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            budget,
            devices: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            refuse_register: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn budget(&self) -> &MemoryBudget {
        &self.budget
    }

    /// Allocates an unpopulated device, charging the memory budget.
    pub fn allocate_device(&self) -> Result<InputDevice, DriverError> {
        let grant = self.budget.charge(DEVICE_UNITS)?;
        Ok(InputDevice {
            descriptor: DeviceDescriptor::default(),
            caps: CapabilitySet::new(),
            handler: None,
            grant,
        })
    }

    /// Registers `device`, making it visible to event injection.
    ///
    /// Rejects a device with no declared capabilities or a family mask that
    /// does not cover them. On any failure the device is dropped and its
    /// memory returned.
    pub fn register(&self, device: InputDevice) -> Result<DeviceId, DriverError> {
        if self.refuse_register.swap(false, Ordering::SeqCst) {
            return Err(DriverError::RegistrationFailed);
        }
        if device.caps.is_empty() || !device.caps.covers_declared() {
            return Err(DriverError::RegistrationFailed);
        }

        let id = DeviceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let InputDevice {
            descriptor,
            caps,
            handler,
            grant,
        } = device;
        let entry = Arc::new(RegisteredDevice {
            descriptor,
            caps,
            handler: handler.map(Mutex::new),
            _grant: grant,
        });
        debug!("input: registered '{}' as {:?}", entry.descriptor.name, id);
        self.devices.write().insert(id, entry);
        Ok(id)
    }

    /// Removes `id` from the registry. Pending injections that already
    /// resolved the device drain; later ones fail. Unregistering an unknown
    /// id is an error, never a silent no-op.
    pub fn unregister(&self, id: DeviceId) -> Result<(), DriverError> {
        match self.devices.write().remove(&id) {
            Some(entry) => {
                debug!("input: unregistered '{}' ({:?})", entry.descriptor.name, id);
                Ok(())
            }
            None => Err(DriverError::NoSuchDevice),
        }
    }

    /// Routes one event triple to the device's handler.
    ///
    /// The registry lock is released before the handler runs, so injection
    /// never blocks registration of other devices.
    pub fn inject(&self, id: DeviceId, event: RawEvent) -> Result<(), DriverError> {
        let entry = {
            let devices = self.devices.read();
            devices.get(&id).cloned()
        };
        let entry = entry.ok_or(DriverError::NoSuchDevice)?;
        match &entry.handler {
            Some(handler) => handler.lock().handle(&event),
            None => Ok(()),
        }
    }

    /// Arms a one-shot registration refusal for the next [`register`](Self::register) call.
    pub fn refuse_next_register(&self) {
        self.refuse_register.store(true, Ordering::SeqCst);
    }

    pub fn registered_count(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_registered(&self, id: DeviceId) -> bool {
        self.devices.read().contains_key(&id)
    }

    pub fn descriptor(&self, id: DeviceId) -> Option<DeviceDescriptor> {
        self.devices.read().get(&id).map(|d| d.descriptor.clone())
    }

    pub fn capabilities(&self, id: DeviceId) -> Option<CapabilitySet> {
        self.devices.read().get(&id).map(|d| d.caps.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::CapabilityVariant;
    use crate::event::{EventType, BTN_LEFT};

    struct CountingHandler {
        seen: Arc<AtomicU64>,
    }

    impl EventHandler for CountingHandler {
        fn handle(&mut self, _event: &RawEvent) -> Result<(), DriverError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn populated_device(registry: &InputRegistry) -> (InputDevice, Arc<AtomicU64>) {
        let seen = Arc::new(AtomicU64::new(0));
        let mut device = registry.allocate_device().unwrap();
        device.set_identity("test touchpad", 0x18, 0x04f3, 0x30bc, 0x0100);
        device.set_capabilities(CapabilitySet::for_variant(CapabilityVariant::Minimal));
        device.set_handler(Box::new(CountingHandler { seen: seen.clone() }));
        (device, seen)
    }

    #[test]
    fn register_then_unregister_frees_the_device() {
        let registry = InputRegistry::new(MemoryBudget::unlimited());
        let (device, _) = populated_device(&registry);
        let id = registry.register(device).unwrap();
        assert_eq!(registry.registered_count(), 1);
        assert!(registry.is_registered(id));
        registry.unregister(id).unwrap();
        assert_eq!(registry.registered_count(), 0);
        assert_eq!(registry.budget().in_use(), 0);
    }

    #[test]
    fn registration_rejects_an_undeclared_device() {
        let registry = InputRegistry::new(MemoryBudget::unlimited());
        let device = registry.allocate_device().unwrap();
        assert!(matches!(
            registry.register(device),
            Err(DriverError::RegistrationFailed)
        ));
        assert_eq!(registry.budget().in_use(), 0);
    }

    #[test]
    fn refusal_is_one_shot() {
        let registry = InputRegistry::new(MemoryBudget::unlimited());
        registry.refuse_next_register();
        let (device, _) = populated_device(&registry);
        assert!(matches!(
            registry.register(device),
            Err(DriverError::RegistrationFailed)
        ));
        let (device, _) = populated_device(&registry);
        registry.register(device).unwrap();
    }

    #[test]
    fn injection_respects_the_registration_barrier() {
        let registry = InputRegistry::new(MemoryBudget::unlimited());
        let (device, seen) = populated_device(&registry);
        let id = registry.register(device).unwrap();
        registry
            .inject(id, RawEvent::new(EventType::Key, BTN_LEFT, 1))
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        registry.unregister(id).unwrap();
        assert!(matches!(
            registry.inject(id, RawEvent::new(EventType::Key, BTN_LEFT, 0)),
            Err(DriverError::NoSuchDevice)
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregistering_twice_is_an_error() {
        let registry = InputRegistry::new(MemoryBudget::unlimited());
        let (device, _) = populated_device(&registry);
        let id = registry.register(device).unwrap();
        registry.unregister(id).unwrap();
        assert!(matches!(
            registry.unregister(id),
            Err(DriverError::NoSuchDevice)
        ));
    }
}
