//! Control-loop binding points and the resolver mapping a device config onto them.

use crate::devices::{Actuator, BasicTempSensor, Binding, SwitchSensor};
use crate::fixed::Temperature;
use crate::types::{DeviceConfig, DeviceFunction};
use tracing::warn;

/// Holds a replaceable raw sensor and tracks whether it is currently answering.
/// The adapter itself outlives any number of sensor swaps.
#[derive(Debug, Default)]
pub struct TempSensorAdapter {
    sensor: Binding<dyn BasicTempSensor>,
    connected: bool,
    last: Option<Temperature>,
}

impl TempSensorAdapter {
    pub fn sensor(&self) -> &Binding<dyn BasicTempSensor> {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut Binding<dyn BasicTempSensor> {
        &mut self.sensor
    }

    /// Swap in a new raw sensor; fault state starts over.
    pub fn set_sensor(&mut self, sensor: Box<dyn BasicTempSensor>) -> Option<Box<dyn BasicTempSensor>> {
        self.connected = false;
        self.last = None;
        self.sensor.bind(sensor)
    }

    pub fn release_sensor(&mut self) -> Option<Box<dyn BasicTempSensor>> {
        self.connected = false;
        self.last = None;
        self.sensor.release()
    }

    /// First read after a sensor swap.
    pub fn init(&mut self) {
        self.last = self.sensor.init();
        self.connected = self.last.is_some();
    }

    pub fn read(&mut self) -> Option<Temperature> {
        match self.sensor.read() {
            Some(t) => {
                self.connected = true;
                self.last = Some(t);
                Some(t)
            }
            None => {
                if self.connected {
                    warn!("temperature sensor lost");
                }
                self.connected = false;
                None
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Most recent good reading, kept across disconnects.
    pub fn last_reading(&self) -> Option<Temperature> {
        self.last
    }
}

/// The single-chamber control loop's device slots. The device manager is the only
/// writer; the loop reads whatever happens to be bound on each cycle.
#[derive(Debug, Default)]
pub struct TempControl {
    pub ambient_sensor: Binding<dyn BasicTempSensor>,
    pub door: Binding<dyn SwitchSensor>,
    pub light: Binding<dyn Actuator>,
    pub heater: Binding<dyn Actuator>,
    pub cooler: Binding<dyn Actuator>,
    pub fridge_sensor: TempSensorAdapter,
    pub beer_sensor: TempSensorAdapter,
}

/// A binding point in [`TempControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    AmbientSensor,
    Door,
    Light,
    Heater,
    Cooler,
    FridgeSensor,
    BeerSensor,
}

/// Which binding point a config controls. Only chamber 1 / beer 1 is resolvable.
pub fn device_target(config: &DeviceConfig) -> Option<Target> {
    if config.chamber > 1 || config.beer > 1 {
        return None;
    }
    match config.function {
        DeviceFunction::ChamberRoomTemp => Some(Target::AmbientSensor),
        DeviceFunction::ChamberDoor => Some(Target::Door),
        DeviceFunction::ChamberLight => Some(Target::Light),
        DeviceFunction::ChamberHeat => Some(Target::Heater),
        DeviceFunction::ChamberCool => Some(Target::Cooler),
        DeviceFunction::ChamberTemp => Some(Target::FridgeSensor),
        DeviceFunction::BeerTemp => Some(Target::BeerSensor),
        _ => None,
    }
}

impl TempControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw sensor binding behind a temperature target, looking through adapters.
    pub fn sensor_binding(&mut self, target: Target) -> Option<&mut Binding<dyn BasicTempSensor>> {
        match target {
            Target::AmbientSensor => Some(&mut self.ambient_sensor),
            Target::FridgeSensor => Some(self.fridge_sensor.sensor_mut()),
            Target::BeerSensor => Some(self.beer_sensor.sensor_mut()),
            _ => None,
        }
    }

    /// Bind a raw sensor to a temperature target and take its first reading. Returns the
    /// sensor back if the target does not hold temperature sensors.
    pub fn bind_sensor(
        &mut self,
        target: Target,
        mut sensor: Box<dyn BasicTempSensor>,
    ) -> Result<(), Box<dyn BasicTempSensor>> {
        match target {
            Target::AmbientSensor => {
                let _ = sensor.init();
                let _ = self.ambient_sensor.bind(sensor);
            }
            Target::FridgeSensor | Target::BeerSensor => {
                let adapter = if target == Target::FridgeSensor {
                    &mut self.fridge_sensor
                } else {
                    &mut self.beer_sensor
                };
                let _ = adapter.set_sensor(sensor);
                adapter.init();
            }
            _ => return Err(sensor),
        }
        Ok(())
    }

    /// Return a temperature target's raw sensor to the default, if one is owned.
    pub fn release_sensor(&mut self, target: Target) -> Option<Box<dyn BasicTempSensor>> {
        match target {
            Target::AmbientSensor => self.ambient_sensor.release(),
            Target::FridgeSensor => self.fridge_sensor.release_sensor(),
            Target::BeerSensor => self.beer_sensor.release_sensor(),
            _ => None,
        }
    }

    pub fn adapter_mut(&mut self, target: Target) -> Option<&mut TempSensorAdapter> {
        match target {
            Target::FridgeSensor => Some(&mut self.fridge_sensor),
            Target::BeerSensor => Some(&mut self.beer_sensor),
            _ => None,
        }
    }

    pub fn actuator_binding(&mut self, target: Target) -> Option<&mut Binding<dyn Actuator>> {
        match target {
            Target::Light => Some(&mut self.light),
            Target::Heater => Some(&mut self.heater),
            Target::Cooler => Some(&mut self.cooler),
            _ => None,
        }
    }

    pub fn switch_binding(&mut self, target: Target) -> Option<&mut Binding<dyn SwitchSensor>> {
        match target {
            Target::Door => Some(&mut self.door),
            _ => None,
        }
    }

    /// Whether the target currently holds its default instance.
    pub fn is_default(&self, target: Target) -> bool {
        match target {
            Target::AmbientSensor => self.ambient_sensor.is_default(),
            Target::Door => self.door.is_default(),
            Target::Light => self.light.is_default(),
            Target::Heater => self.heater.is_default(),
            Target::Cooler => self.cooler.is_default(),
            Target::FridgeSensor => self.fridge_sensor.sensor().is_default(),
            Target::BeerSensor => self.beer_sensor.sensor().is_default(),
        }
    }

    /// Number of targets holding an owned instance.
    pub fn installed_count(&self) -> usize {
        [
            Target::AmbientSensor,
            Target::Door,
            Target::Light,
            Target::Heater,
            Target::Cooler,
            Target::FridgeSensor,
            Target::BeerSensor,
        ]
        .into_iter()
        .filter(|t| !self.is_default(*t))
        .count()
    }
}
