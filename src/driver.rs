//! Probe/remove lifecycle for the touch peripheral.
//!
//! [`TouchpadDriver`] owns one [`DeviceContext`] per bound peripheral, keyed
//! by the client handle in a side-table. A context exists exactly while its
//! peripheral is attached and its input device registered: probe publishes
//! the context only after registration succeeds, and remove retires it in
//! the same step that unregisters the device.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info};
use parking_lot::Mutex;

use crate::caps::CapabilitySet;
use crate::channel::UserChannel;
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::event::{EventHandler, RawEvent};
use crate::host::bus::{BusClient, BusDriver, ClientKey};
use crate::host::mem::{MemoryGrant, CONTEXT_UNITS};
use crate::host::registry::{DeviceId, InputRegistry};

/// Per-peripheral record linking a bus client to its published input device.
struct DeviceContext {
    client: ClientKey,
    device: DeviceId,
    channel: Option<Arc<UserChannel>>,
    _memory: MemoryGrant,
}

/// Acknowledges injected events on behalf of one bound peripheral.
///
/// Interpretation of the triples (slot tracking, coordinate decoding) belongs
/// to the protocol layer feeding the injection side, not here.
struct AckHandler {
    device_name: String,
}

impl EventHandler for AckHandler {
    fn handle(&mut self, event: &RawEvent) -> Result<(), DriverError> {
        debug!(
            "{}: input event type={} code={} value={}",
            self.device_name,
            event.event_type.raw(),
            event.code,
            event.value
        );
        Ok(())
    }
}

/// Lifecycle controller for the touch peripheral driver.
pub struct TouchpadDriver {
    config: DriverConfig,
    registry: Arc<InputRegistry>,
    contexts: Mutex<HashMap<ClientKey, DeviceContext>>,
}

impl TouchpadDriver {
    pub fn new(registry: Arc<InputRegistry>, config: DriverConfig) -> Self {
        Self {
            config,
            registry,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Number of currently bound peripherals.
    pub fn bound_count(&self) -> usize {
        self.contexts.lock().len()
    }

    pub fn is_bound(&self, key: ClientKey) -> bool {
        self.contexts.lock().contains_key(&key)
    }

    /// The input device published for a bound peripheral.
    pub fn device_for(&self, key: ClientKey) -> Option<DeviceId> {
        self.contexts.lock().get(&key).map(|ctx| ctx.device)
    }

    /// The user channel attached to a bound peripheral, when configured.
    pub fn user_channel(&self, key: ClientKey) -> Option<Arc<UserChannel>> {
        self.contexts.lock().get(&key).and_then(|ctx| ctx.channel.clone())
    }
}

impl BusDriver for TouchpadDriver {
    fn probe(&self, client: &BusClient) -> Result<(), DriverError> {
        info!("{}: touch peripheral found", client.id());

        // Context memory is scoped to the client; any early return below
        // releases it through the grant.
        let memory = client.memory().charge(CONTEXT_UNITS)?;

        let mut input = self.registry.allocate_device()?;
        input.set_identity(
            &self.config.device_name,
            self.config.bus_type,
            self.config.vendor_id,
            self.config.product_id,
            self.config.version,
        );
        input.set_parent(client.key());
        input.set_capabilities(CapabilitySet::for_variant(self.config.variant));
        input.set_handler(Box::new(AckHandler {
            device_name: self.config.device_name.clone(),
        }));

        let device = match self.registry.register(input) {
            Ok(id) => id,
            Err(err) => {
                error!("{}: failed to register input device", client.id());
                return Err(err);
            }
        };

        let channel = self
            .config
            .user_channel
            .then(|| Arc::new(UserChannel::new()));
        self.contexts.lock().insert(
            client.key(),
            DeviceContext {
                client: client.key(),
                device,
                channel,
                _memory: memory,
            },
        );
        Ok(())
    }

    fn remove(&self, client: &BusClient) -> Result<(), DriverError> {
        let Some(ctx) = self.contexts.lock().remove(&client.key()) else {
            error!("{}: remove without a bound context", client.id());
            return Err(DriverError::NoSuchDevice);
        };
        self.registry.unregister(ctx.device)?;
        info!("{}: touch peripheral unbound", client.id());
        debug!("released context for {:?}", ctx.client);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mem::MemoryBudget;

    fn client(raw: u64, budget: &MemoryBudget) -> BusClient {
        BusClient::new(ClientKey::from_raw(raw), "ELAN0662:00", budget.clone())
    }

    fn driver(budget: &MemoryBudget, config: DriverConfig) -> TouchpadDriver {
        TouchpadDriver::new(Arc::new(InputRegistry::new(budget.clone())), config)
    }

    #[test]
    fn probe_binds_and_remove_unbinds() {
        let budget = MemoryBudget::unlimited();
        let driver = driver(&budget, DriverConfig::default());
        let client = client(1, &budget);

        driver.probe(&client).unwrap();
        assert_eq!(driver.bound_count(), 1);
        assert!(driver.is_bound(client.key()));

        driver.remove(&client).unwrap();
        assert_eq!(driver.bound_count(), 0);
        assert_eq!(budget.in_use(), 0);
    }

    #[test]
    fn remove_without_a_bound_context_is_a_contract_violation() {
        let budget = MemoryBudget::unlimited();
        let driver = driver(&budget, DriverConfig::default());
        let client = client(7, &budget);

        assert!(matches!(
            driver.remove(&client),
            Err(DriverError::NoSuchDevice)
        ));
    }

    #[test]
    fn user_channel_is_attached_only_when_configured() {
        let budget = MemoryBudget::unlimited();
        let config = DriverConfig {
            user_channel: true,
            ..DriverConfig::default()
        };
        let driver = driver(&budget, config);
        let client = client(2, &budget);

        driver.probe(&client).unwrap();
        let channel = driver.user_channel(client.key()).expect("channel attached");
        channel.open().unwrap();
        assert!(matches!(
            channel.read(&mut [0u8; 4]),
            Err(DriverError::InvalidOperation)
        ));
        channel.close().unwrap();
        driver.remove(&client).unwrap();
        assert!(driver.user_channel(client.key()).is_none());
    }
}
