//! Process-wide driver registration.

use std::sync::Arc;

use log::{error, info};

use crate::config::DriverConfig;
use crate::driver::TouchpadDriver;
use crate::error::DriverError;
use crate::host::bus::{BusController, DriverId, DriverSpec};
use crate::host::registry::InputRegistry;

/// A loaded driver module, registered with the bus subsystem.
pub struct DriverModule {
    bus: Arc<BusController>,
    driver: Arc<TouchpadDriver>,
    driver_id: DriverId,
}

impl DriverModule {
    /// Builds the driver from `config` and registers it with the bus.
    ///
    /// Registration failure is fatal to the load: the error propagates and
    /// nothing is left registered.
    pub fn load(
        bus: Arc<BusController>,
        registry: Arc<InputRegistry>,
        config: DriverConfig,
    ) -> Result<Self, DriverError> {
        let spec = DriverSpec::new(
            config.device_name.clone(),
            vec![config.peripheral_id.clone()],
        );
        let driver = Arc::new(TouchpadDriver::new(registry, config));
        let driver_id = match bus.register_driver(spec, driver.clone()) {
            Ok(id) => id,
            Err(err) => {
                error!("failed to register with bus subsystem: {err}");
                return Err(err);
            }
        };
        info!("touch peripheral driver initialized");
        Ok(Self {
            bus,
            driver,
            driver_id,
        })
    }

    #[inline]
    pub fn driver(&self) -> &Arc<TouchpadDriver> {
        &self.driver
    }

    /// Deregisters from the bus subsystem. Safe with zero ever-bound
    /// peripherals; any still-bound peripheral is detached by the bus first.
    pub fn unload(self) {
        self.bus.deregister_driver(self.driver_id);
        info!("touch peripheral driver removed");
    }
}
