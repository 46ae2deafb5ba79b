//! In-process model of the bus subsystem.
//!
//! Drivers register a [`DriverSpec`] naming the peripheral identities they
//! serve. Attaching a peripheral whose identity matches a registered spec
//! creates a [`BusClient`] and invokes the driver's probe; detaching invokes
//! remove and drops the client. Probe and remove for one client never
//! overlap — the controller retires a key before remove runs and never
//! reuses it — while clients with distinct keys come and go independently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::host::mem::MemoryBudget;

/// Opaque identity of one attached peripheral instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientKey(u64);

impl ClientKey {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Handle to a registered driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DriverId(u64);

/// Borrowed handle for one attached peripheral, valid from probe to remove.
///
/// The client carries the peripheral's bus identity and a handle to the
/// host's memory budget; allocations a driver charges through it are scoped
/// to the binding and come back when their grants drop.
pub struct BusClient {
    key: ClientKey,
    id: String,
    memory: MemoryBudget,
}

impl BusClient {
    pub(crate) fn new(key: ClientKey, id: &str, memory: MemoryBudget) -> Self {
        Self {
            key,
            id: id.to_string(),
            memory,
        }
    }

    #[inline]
    pub fn key(&self) -> ClientKey {
        self.key
    }

    /// Bus identity string, e.g. `"ELAN0662:00"`.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn memory(&self) -> &MemoryBudget {
        &self.memory
    }
}

/// Lifecycle callbacks a bus driver implements.
///
/// The controller calls `probe` when a matching peripheral attaches and
/// `remove` when it detaches. A probe error leaves the peripheral unbound
/// and must leave no published state behind; it never unloads the driver.
pub trait BusDriver: Send + Sync {
    fn probe(&self, client: &BusClient) -> Result<(), DriverError>;
    fn remove(&self, client: &BusClient) -> Result<(), DriverError>;
}

/// Immutable registration record for one driver: a display name plus the
/// peripheral identities it matches. Built once at load time and handed to
/// [`BusController::register_driver`]; there is no global driver table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverSpec {
    name: String,
    id_table: Vec<String>,
}

impl DriverSpec {
    pub fn new(name: impl Into<String>, id_table: Vec<String>) -> Self {
        Self {
            name: name.into(),
            id_table,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, peripheral_id: &str) -> bool {
        self.id_table.iter().any(|id| id == peripheral_id)
    }

    fn is_valid(&self) -> bool {
        !self.id_table.is_empty()
    }
}

struct DriverEntry {
    spec: DriverSpec,
    driver: Arc<dyn BusDriver>,
}

struct AttachedClient {
    client: Arc<BusClient>,
    driver_id: DriverId,
    driver: Arc<dyn BusDriver>,
}

/// The bus subsystem: driver registration and peripheral attach/detach.
pub struct BusController {
    budget: MemoryBudget,
    // Vec keeps registration order; attach matches first registered first.
    drivers: Mutex<Vec<(DriverId, DriverEntry)>>,
    clients: Mutex<HashMap<ClientKey, AttachedClient>>,
    next_driver: AtomicU64,
    next_client: AtomicU64,
    refuse_driver: AtomicBool,
}

impl BusController {
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            budget,
            drivers: Mutex::new(Vec::new()),
            clients: Mutex::new(HashMap::new()),
            next_driver: AtomicU64::new(1),
            next_client: AtomicU64::new(1),
            refuse_driver: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn budget(&self) -> &MemoryBudget {
        &self.budget
    }

    /// Registers a driver under its identity-match table.
    ///
    /// A spec with an empty table is rejected: a driver that matches nothing
    /// can never probe and its registration is a configuration error.
    pub fn register_driver(
        &self,
        spec: DriverSpec,
        driver: Arc<dyn BusDriver>,
    ) -> Result<DriverId, DriverError> {
        if !spec.is_valid() || self.refuse_driver.swap(false, Ordering::SeqCst) {
            return Err(DriverError::BusRegistrationFailed);
        }
        let id = DriverId(self.next_driver.fetch_add(1, Ordering::SeqCst));
        info!("bus: driver '{}' registered", spec.name());
        self.drivers.lock().push((id, DriverEntry { spec, driver }));
        Ok(id)
    }

    /// Deregisters a driver, detaching any peripherals still bound to it.
    /// Safe to call with an unknown id and with zero ever-bound peripherals.
    pub fn deregister_driver(&self, id: DriverId) {
        let entry = {
            let mut drivers = self.drivers.lock();
            match drivers.iter().position(|(did, _)| *did == id) {
                Some(pos) => Some(drivers.remove(pos).1),
                None => None,
            }
        };
        let Some(entry) = entry else { return };

        let bound: Vec<Arc<BusClient>> = {
            let mut clients = self.clients.lock();
            let keys: Vec<ClientKey> = clients
                .iter()
                .filter(|(_, c)| c.driver_id == id)
                .map(|(key, _)| *key)
                .collect();
            keys.into_iter()
                .filter_map(|key| clients.remove(&key).map(|c| c.client))
                .collect()
        };
        for client in bound {
            if let Err(err) = entry.driver.remove(&client) {
                warn!(
                    "bus: remove for {} failed during driver deregistration: {err}",
                    client.id()
                );
            }
        }
        info!("bus: driver '{}' deregistered", entry.spec.name());
    }

    /// Attaches a peripheral, probing the first registered driver whose
    /// table matches `peripheral_id`.
    ///
    /// A probe error propagates to the caller and leaves the peripheral
    /// unbound; the driver stays registered and may probe later peripherals.
    pub fn attach(&self, peripheral_id: &str) -> Result<ClientKey, DriverError> {
        let matched = {
            let drivers = self.drivers.lock();
            drivers
                .iter()
                .find(|(_, entry)| entry.spec.matches(peripheral_id))
                .map(|(id, entry)| (*id, Arc::clone(&entry.driver)))
        };
        let Some((driver_id, driver)) = matched else {
            return Err(DriverError::NoSuchDevice);
        };

        let key = ClientKey::from_raw(self.next_client.fetch_add(1, Ordering::SeqCst));
        let client = Arc::new(BusClient::new(key, peripheral_id, self.budget.clone()));
        if let Err(err) = driver.probe(&client) {
            warn!("bus: probe for {peripheral_id} failed: {err}");
            return Err(err);
        }
        self.clients.lock().insert(
            key,
            AttachedClient {
                client,
                driver_id,
                driver,
            },
        );
        Ok(key)
    }

    /// Detaches a peripheral, invoking the owning driver's remove.
    pub fn detach(&self, key: ClientKey) -> Result<(), DriverError> {
        let entry = self
            .clients
            .lock()
            .remove(&key)
            .ok_or(DriverError::NoSuchDevice)?;
        entry.driver.remove(&entry.client)
    }

    /// Arms a one-shot refusal for the next [`register_driver`](Self::register_driver) call.
    pub fn refuse_next_driver(&self) {
        self.refuse_driver.store(true, Ordering::SeqCst);
    }

    pub fn attached_count(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_attached(&self, key: ClientKey) -> bool {
        self.clients.lock().contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingDriver {
        probes: AtomicUsize,
        removes: AtomicUsize,
    }

    impl BusDriver for RecordingDriver {
        fn probe(&self, _client: &BusClient) -> Result<(), DriverError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn remove(&self, _client: &BusClient) -> Result<(), DriverError> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn spec() -> DriverSpec {
        DriverSpec::new("recording driver", vec!["TEST0001:00".to_string()])
    }

    #[test]
    fn empty_id_table_is_rejected() {
        let bus = BusController::new(MemoryBudget::unlimited());
        let result = bus.register_driver(
            DriverSpec::new("no matches", Vec::new()),
            Arc::new(RecordingDriver::default()),
        );
        assert!(matches!(result, Err(DriverError::BusRegistrationFailed)));
    }

    #[test]
    fn attach_requires_a_matching_driver() {
        let bus = BusController::new(MemoryBudget::unlimited());
        bus.register_driver(spec(), Arc::new(RecordingDriver::default()))
            .unwrap();
        assert!(matches!(
            bus.attach("OTHER0001:00"),
            Err(DriverError::NoSuchDevice)
        ));
        assert_eq!(bus.attached_count(), 0);
    }

    #[test]
    fn attach_and_detach_invoke_the_driver_once_each() {
        let bus = BusController::new(MemoryBudget::unlimited());
        let driver = Arc::new(RecordingDriver::default());
        bus.register_driver(spec(), driver.clone()).unwrap();

        let key = bus.attach("TEST0001:00").unwrap();
        assert!(bus.is_attached(key));
        bus.detach(key).unwrap();
        assert!(!bus.is_attached(key));

        assert_eq!(driver.probes.load(Ordering::SeqCst), 1);
        assert_eq!(driver.removes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detaching_an_unknown_key_is_an_error() {
        let bus = BusController::new(MemoryBudget::unlimited());
        let driver = Arc::new(RecordingDriver::default());
        bus.register_driver(spec(), driver.clone()).unwrap();
        let key = bus.attach("TEST0001:00").unwrap();
        bus.detach(key).unwrap();
        assert!(matches!(bus.detach(key), Err(DriverError::NoSuchDevice)));
        assert_eq!(driver.removes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deregistration_detaches_bound_clients() {
        let bus = BusController::new(MemoryBudget::unlimited());
        let driver = Arc::new(RecordingDriver::default());
        let id = bus.register_driver(spec(), driver.clone()).unwrap();
        bus.attach("TEST0001:00").unwrap();

        bus.deregister_driver(id);
        assert_eq!(bus.attached_count(), 0);
        assert_eq!(driver.removes.load(Ordering::SeqCst), 1);

        // Deregistering again, or with nothing ever bound, stays safe.
        bus.deregister_driver(id);
    }
}
