use std::sync::Arc;

use padbind::host::bus::BusController;
use padbind::host::mem::MemoryBudget;
use padbind::host::registry::InputRegistry;
use padbind::{
    CapabilityVariant, DriverConfig, DriverModule, EventType, RawEvent, ABS_MT_POSITION_X,
    ABS_MT_POSITION_Y, BTN_LEFT,
};

fn main() {
    env_logger::init();

    let budget = MemoryBudget::unlimited();
    let bus = Arc::new(BusController::new(budget.clone()));
    let registry = Arc::new(InputRegistry::new(budget.clone()));

    let config = DriverConfig {
        variant: CapabilityVariant::Full,
        ..DriverConfig::default()
    };
    let module =
        DriverModule::load(bus.clone(), registry.clone(), config).expect("load driver module");

    let key = bus.attach("ELAN0662:00").expect("attach peripheral");
    let id = module.driver().device_for(key).expect("bound device");

    // Replay a tiny tap: position, press, release. Run with
    // RUST_LOG=debug to see the driver acknowledge each triple.
    for event in [
        RawEvent::new(EventType::Abs, ABS_MT_POSITION_X, 1210),
        RawEvent::new(EventType::Abs, ABS_MT_POSITION_Y, 644),
        RawEvent::new(EventType::Key, BTN_LEFT, 1),
        RawEvent::new(EventType::Key, BTN_LEFT, 0),
    ] {
        registry.inject(id, event).expect("inject event");
    }

    bus.detach(key).expect("detach peripheral");
    module.unload();
}
