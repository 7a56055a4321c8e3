//! Device lifecycle: create, install and uninstall instances, and commit definition updates.

use crate::board::Board;
use crate::control::{device_target, TempControl, Target};
use crate::devices::{
    DeviceInstance, DigitalPinActuator, DigitalPinSensor, OneWireActuator, OneWireSwitchSensor,
    OneWireTempSensor,
};
use crate::error::{DeviceError, Result, ValidationError};
use crate::fixed::Temperature;
use crate::metrics::{DeviceMetrics, MetricsHub};
use crate::store::{all_devices, DeviceStore};
use crate::types::{DeviceConfig, DeviceFunction, DeviceOwner, DeviceType, Hardware};
use crate::update::{merge, DeviceUpdate};
use crate::validate::{is_device_valid, ManagerConfig, ValidationPolicy};
use tracing::{debug, error, info, warn};

/// Result of a definition update that reached validation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub slot: usize,
    /// The committed record, or the untouched original when rejected.
    pub config: DeviceConfig,
    pub rejection: Option<ValidationError>,
}

impl UpdateOutcome {
    pub fn accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Owns the board, the slot table and the control loop's binding points.
pub struct DeviceManager<S: DeviceStore> {
    pub(crate) board: Board,
    pub(crate) store: S,
    pub(crate) control: TempControl,
    policy: ValidationPolicy,
    pub(crate) metrics: Option<DeviceMetrics>,
}

impl<S: DeviceStore> DeviceManager<S> {
    pub fn new(board: Board, store: S) -> Self {
        Self::with_config(board, store, ManagerConfig::default())
    }

    pub fn with_config(board: Board, store: S, config: ManagerConfig) -> Self {
        Self {
            board,
            store,
            control: TempControl::new(),
            policy: config.validation,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, hub: &MetricsHub) -> Self {
        self.metrics = Some(hub.dev.clone());
        self
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn control(&self) -> &TempControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut TempControl {
        &mut self.control
    }

    fn refresh_gauge(&self) {
        if let Some(m) = &self.metrics {
            m.installed_now.set(self.control.installed_count() as i64);
        }
    }

    /// Return every single-chamber target to its default instance.
    pub fn setup_unconfigured_devices(&mut self) {
        for function in DeviceFunction::ALL {
            let owner = function.owner();
            let config = DeviceConfig {
                chamber: u8::from(owner != DeviceOwner::None),
                beer: u8::from(owner == DeviceOwner::Beer),
                function,
                ..DeviceConfig::default()
            };
            self.uninstall_device(&config);
        }
    }

    /// Bind every stored slot to its target, starting from a clean control loop.
    pub fn install_configured_devices(&mut self) -> usize {
        self.setup_unconfigured_devices();
        let configs: Vec<(usize, DeviceConfig)> =
            all_devices(&self.store).filter(|(_, c)| !c.is_empty()).collect();
        let mut installed = 0;
        for (slot, config) in configs {
            debug!(slot, function = ?config.function, "installing stored device");
            if self.install_device(&config) {
                installed += 1;
            }
        }
        info!(installed, "configured devices installed");
        installed
    }

    /// Clear every slot and release every installed device.
    pub fn reset_store(&mut self) -> Result<()> {
        self.store.clear()?;
        self.setup_unconfigured_devices();
        info!("device slots reset");
        Ok(())
    }

    /// Release whatever the config's target owns. Returns whether anything was released.
    pub fn uninstall_device(&mut self, config: &DeviceConfig) -> bool {
        let Some(target) = device_target(config) else {
            return false;
        };
        let released = match config.device_type() {
            DeviceType::TempSensor => self.control.release_sensor(target).is_some(),
            DeviceType::SwitchActuator => self
                .control
                .actuator_binding(target)
                .and_then(|b| b.release())
                .is_some(),
            DeviceType::SwitchSensor => self
                .control
                .switch_binding(target)
                .and_then(|b| b.release())
                .is_some(),
            DeviceType::None => false,
        };
        if released {
            debug!(function = ?config.function, ?target, "device uninstalled");
            if let Some(m) = &self.metrics {
                m.uninstalled.inc();
            }
            self.refresh_gauge();
        }
        released
    }

    /// Construct the instance described by `config`, viewed as a device of `device_type`.
    pub fn create_device(&self, config: &DeviceConfig, device_type: DeviceType) -> Option<DeviceInstance> {
        match (config.hardware, device_type) {
            (Hardware::Pin { pin, invert }, DeviceType::SwitchActuator) => {
                match DigitalPinActuator::new(self.board.pins(), pin, invert) {
                    Ok(a) => Some(DeviceInstance::Actuator(Box::new(a))),
                    Err(e) => {
                        warn!(pin, "cannot configure output pin: {e}");
                        None
                    }
                }
            }
            (Hardware::Pin { pin, invert }, DeviceType::SwitchSensor) => {
                match DigitalPinSensor::new(self.board.pins(), pin, invert) {
                    Ok(s) => Some(DeviceInstance::SwitchSensor(Box::new(s))),
                    Err(e) => {
                        warn!(pin, "cannot configure input pin: {e}");
                        None
                    }
                }
            }
            (
                Hardware::OneWireTemp {
                    pin,
                    address,
                    calibration,
                },
                DeviceType::TempSensor,
            ) => {
                let bus = self.board.one_wire_bus(pin)?;
                Some(DeviceInstance::TempSensor(Box::new(OneWireTempSensor::new(
                    bus,
                    address,
                    calibration,
                ))))
            }
            (
                Hardware::OneWireIo {
                    pin,
                    address,
                    channel,
                    invert,
                },
                DeviceType::SwitchActuator,
            ) => {
                let bus = self.board.one_wire_bus(pin)?;
                Some(DeviceInstance::Actuator(Box::new(OneWireActuator::new(
                    bus, address, channel, invert,
                ))))
            }
            (
                Hardware::OneWireIo {
                    pin,
                    address,
                    channel,
                    invert,
                },
                DeviceType::SwitchSensor,
            ) => {
                let bus = self.board.one_wire_bus(pin)?;
                Some(DeviceInstance::SwitchSensor(Box::new(OneWireSwitchSensor::new(
                    bus, address, channel, invert,
                ))))
            }
            _ => None,
        }
    }

    /// Create and bind the device for `config`. Callers uninstall first; a device still
    /// bound to the target is dropped. If creation fails the target stays at its default.
    pub fn install_device(&mut self, config: &DeviceConfig) -> bool {
        let Some(target) = device_target(config) else {
            return false;
        };
        if config.deactivated {
            debug!(function = ?config.function, "device deactivated, not installing");
            return false;
        }
        let Some(instance) = self.create_device(config, config.device_type()) else {
            error!(function = ?config.function, pin = config.hardware.pin(), "unable to create device");
            self.uninstall_device(config);
            return false;
        };

        let replaced = match instance {
            DeviceInstance::TempSensor(sensor) => match self.control.bind_sensor(target, sensor) {
                Ok(()) => false,
                Err(_) => return self.misbound(target),
            },
            DeviceInstance::Actuator(actuator) => match self.control.actuator_binding(target) {
                Some(binding) => binding.bind(actuator).is_some(),
                None => return self.misbound(target),
            },
            DeviceInstance::SwitchSensor(sensor) => match self.control.switch_binding(target) {
                Some(binding) => binding.bind(sensor).is_some(),
                None => return self.misbound(target),
            },
        };
        if replaced {
            warn!(?target, "installed over a bound device without uninstalling it");
        }
        debug!(function = ?config.function, ?target, pin = config.hardware.pin(), "device installed");
        if let Some(m) = &self.metrics {
            m.installed.inc();
        }
        self.refresh_gauge();
        true
    }

    fn misbound(&self, target: Target) -> bool {
        error!(?target, "device capability does not match its target");
        false
    }

    /// Merge `patch` into its slot, validate, then commit to the store and the control loop.
    pub fn update_device(&mut self, patch: &DeviceUpdate) -> Result<UpdateOutcome> {
        let slot = patch
            .slot
            .ok_or_else(|| DeviceError::Request("device update without a slot index".to_string()))?;
        let original = self.store.fetch(slot).ok_or(DeviceError::SlotOutOfRange(slot))?;

        let candidate = merge(&original, patch).and_then(|target| {
            is_device_valid(&target, &original, slot, &self.board, &self.store, &self.policy)
                .map(|()| target)
        });
        let target = match candidate {
            Ok(target) => target,
            Err(rejection) => {
                warn!(slot, "device definition rejected: {rejection}");
                if let Some(m) = &self.metrics {
                    m.updates_rejected.inc();
                }
                return Ok(UpdateOutcome {
                    slot,
                    config: original,
                    rejection: Some(rejection),
                });
            }
        };

        self.store.store(slot, &target)?;
        self.uninstall_device(&original);
        self.uninstall_device(&target);
        self.install_device(&target);
        info!(slot, function = ?target.function, "device definition updated");
        if let Some(m) = &self.metrics {
            m.updates_accepted.inc();
        }
        Ok(UpdateOutcome {
            slot,
            config: target,
            rejection: None,
        })
    }

    /// First slot whose hardware sits at the same physical location as `hardware`.
    pub fn find_hardware_device(&self, hardware: &Hardware) -> Option<usize> {
        all_devices(&self.store)
            .find(|(_, c)| c.hardware.kind() == hardware.kind() && c.hardware.same_location(hardware))
            .map(|(slot, _)| slot)
    }

    /// Read the temperature sensor bound for `config`, through its adapter if it has one.
    pub fn read_temperature(&mut self, config: &DeviceConfig) -> Option<Temperature> {
        let target = device_target(config)?;
        match self.control.adapter_mut(target) {
            Some(adapter) => adapter.read(),
            None => self.control.sensor_binding(target)?.read(),
        }
    }

    pub fn sense_switch(&mut self, config: &DeviceConfig) -> Option<bool> {
        let target = device_target(config)?;
        Some(self.control.switch_binding(target)?.sense())
    }

    pub fn set_actuator(&mut self, config: &DeviceConfig, active: bool) -> bool {
        let Some(target) = device_target(config) else {
            return false;
        };
        let Some(binding) = self.control.actuator_binding(target) else {
            return false;
        };
        debug!(function = ?config.function, active, "setting actuator state");
        binding.set_active(active);
        true
    }
}
