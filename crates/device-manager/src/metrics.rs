use crate::error::{DeviceError, Result};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct DeviceMetrics {
    pub installed: IntCounter,
    pub uninstalled: IntCounter,
    pub updates_accepted: IntCounter,
    pub updates_rejected: IntCounter,
    pub enumerated: IntCounter,
    pub installed_now: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub dev: DeviceMetrics,
}

fn counter(name: &str, help: &str) -> Result<IntCounter> {
    IntCounter::new(name, help).map_err(|e| DeviceError::Metrics(format!("metrics init error: {e}")))
}

impl MetricsHub {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let installed = counter("fc_devices_installed", "Device instances bound to a control target")?;
        let uninstalled = counter("fc_devices_uninstalled", "Device instances released from a control target")?;
        let updates_accepted = counter("fc_updates_accepted", "Device definition updates committed")?;
        let updates_rejected = counter("fc_updates_rejected", "Device definition updates refused by validation")?;
        let enumerated = counter("fc_hardware_enumerated", "Hardware candidates reported by enumeration")?;
        let installed_now = IntGauge::new("fc_devices_bound", "Control targets currently holding a device")
            .map_err(|e| DeviceError::Metrics(format!("metrics init error: {e}")))?;
        let dev = DeviceMetrics {
            installed,
            uninstalled,
            updates_accepted,
            updates_rejected,
            enumerated,
            installed_now,
        };
        let _ = registry.register(Box::new(dev.installed.clone()));
        let _ = registry.register(Box::new(dev.uninstalled.clone()));
        let _ = registry.register(Box::new(dev.updates_accepted.clone()));
        let _ = registry.register(Box::new(dev.updates_rejected.clone()));
        let _ = registry.register(Box::new(dev.enumerated.clone()));
        let _ = registry.register(Box::new(dev.installed_now.clone()));
        Ok(Self { registry, dev })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
