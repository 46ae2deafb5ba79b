use std::sync::Arc;

use padbind::host::bus::BusController;
use padbind::host::mem::MemoryBudget;
use padbind::host::registry::InputRegistry;
use padbind::{DriverConfig, DriverModule};

fn main() {
    env_logger::init();

    let budget = MemoryBudget::unlimited();
    let bus = Arc::new(BusController::new(budget.clone()));
    let registry = Arc::new(InputRegistry::new(budget.clone()));

    let module = DriverModule::load(bus.clone(), registry.clone(), DriverConfig::default())
        .expect("load driver module");

    let key = bus.attach("ELAN0662:00").expect("attach peripheral");
    let id = module.driver().device_for(key).expect("bound device");
    let descriptor = registry.descriptor(id).expect("registered descriptor");
    println!(
        "registered '{}' ({:04x}:{:04x}), {} declared capabilities",
        descriptor.name,
        descriptor.vendor_id,
        descriptor.product_id,
        registry.capabilities(id).expect("caps").len()
    );

    bus.detach(key).expect("detach peripheral");
    module.unload();
    println!("budget in use after teardown: {}", budget.in_use());
}
