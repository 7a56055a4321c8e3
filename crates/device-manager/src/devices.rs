//! Capability traits for installed devices and their hardware-backed implementations.

use crate::fixed::{TempOffset, Temperature};
use io_transport::{
    with_bus, with_pins, DeviceAddress, PinMode, Result as TransportResult, SharedBus, SharedPins,
};
use std::fmt;
use tracing::{debug, warn};

/// A raw temperature source.
pub trait BasicTempSensor {
    /// Prepare the sensor and take a first measurement.
    fn init(&mut self) -> Option<Temperature> {
        self.read()
    }

    /// Current calibrated temperature, `None` if the sensor did not answer.
    fn read(&mut self) -> Option<Temperature>;

    fn is_connected(&self) -> bool;
}

/// An on/off output.
pub trait Actuator {
    fn set_active(&mut self, active: bool);

    fn is_active(&self) -> bool;
}

/// An on/off input.
pub trait SwitchSensor {
    fn sense(&mut self) -> bool;
}

/// What a control-loop target is bound to: the shared no-op default, or an instance
/// owned exclusively by that target. Rebinding or releasing drops the owned instance.
pub enum Binding<T: ?Sized> {
    Default,
    Owned(Box<T>),
}

impl<T: ?Sized> Default for Binding<T> {
    fn default() -> Self {
        Binding::Default
    }
}

impl<T: ?Sized> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Default => f.write_str("Binding::Default"),
            Binding::Owned(_) => f.write_str("Binding::Owned(..)"),
        }
    }
}

impl<T: ?Sized> Binding<T> {
    pub fn is_default(&self) -> bool {
        matches!(self, Binding::Default)
    }

    /// Take ownership of `instance`, handing back whatever was owned before.
    pub fn bind(&mut self, instance: Box<T>) -> Option<Box<T>> {
        match std::mem::replace(self, Binding::Owned(instance)) {
            Binding::Owned(previous) => Some(previous),
            Binding::Default => None,
        }
    }

    /// Return to the default, handing back the owned instance if there was one.
    pub fn release(&mut self) -> Option<Box<T>> {
        match std::mem::take(self) {
            Binding::Owned(previous) => Some(previous),
            Binding::Default => None,
        }
    }

    pub fn owned(&self) -> Option<&T> {
        match self {
            Binding::Owned(b) => Some(&**b),
            Binding::Default => None,
        }
    }

    pub fn owned_mut(&mut self) -> Option<&mut T> {
        match self {
            Binding::Owned(b) => Some(&mut **b),
            Binding::Default => None,
        }
    }
}

// The default temperature sensor is permanently disconnected.
impl Binding<dyn BasicTempSensor> {
    pub fn init(&mut self) -> Option<Temperature> {
        self.owned_mut().and_then(|s| s.init())
    }

    pub fn read(&mut self) -> Option<Temperature> {
        self.owned_mut().and_then(|s| s.read())
    }

    pub fn is_connected(&self) -> bool {
        self.owned().map_or(false, |s| s.is_connected())
    }
}

// The default actuator swallows writes and stays off.
impl Binding<dyn Actuator> {
    pub fn set_active(&mut self, active: bool) {
        if let Some(a) = self.owned_mut() {
            a.set_active(active);
        }
    }

    pub fn is_active(&self) -> bool {
        self.owned().map_or(false, |a| a.is_active())
    }
}

// The default switch sensor always reads off.
impl Binding<dyn SwitchSensor> {
    pub fn sense(&mut self) -> bool {
        self.owned_mut().map_or(false, |s| s.sense())
    }
}

/// A freshly constructed device, tagged by capability.
pub enum DeviceInstance {
    TempSensor(Box<dyn BasicTempSensor>),
    Actuator(Box<dyn Actuator>),
    SwitchSensor(Box<dyn SwitchSensor>),
}

impl fmt::Debug for DeviceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceInstance::TempSensor(_) => f.write_str("DeviceInstance::TempSensor"),
            DeviceInstance::Actuator(_) => f.write_str("DeviceInstance::Actuator"),
            DeviceInstance::SwitchSensor(_) => f.write_str("DeviceInstance::SwitchSensor"),
        }
    }
}

/// DS18B20-style probe on a shared single-wire bus.
pub struct OneWireTempSensor {
    bus: SharedBus,
    address: DeviceAddress,
    calibration: TempOffset,
    connected: bool,
}

impl OneWireTempSensor {
    pub fn new(bus: SharedBus, address: DeviceAddress, calibration: TempOffset) -> Self {
        Self {
            bus,
            address,
            calibration,
            connected: false,
        }
    }
}

impl BasicTempSensor for OneWireTempSensor {
    fn read(&mut self) -> Option<Temperature> {
        let address = self.address;
        match with_bus(&self.bus, |b| b.read_temperature(&address)) {
            Ok(raw) => {
                if !self.connected {
                    debug!(address = %address, "temperature probe connected");
                }
                self.connected = true;
                Some(Temperature::from_sixteenths(raw).offset(self.calibration))
            }
            Err(e) => {
                if self.connected {
                    warn!(address = %address, "temperature probe disconnected: {e}");
                }
                self.connected = false;
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// One channel of a multi-channel single-wire switch driven as an output.
pub struct OneWireActuator {
    bus: SharedBus,
    address: DeviceAddress,
    channel: u8,
    invert: bool,
    active: bool,
}

impl OneWireActuator {
    pub fn new(bus: SharedBus, address: DeviceAddress, channel: u8, invert: bool) -> Self {
        Self {
            bus,
            address,
            channel,
            invert,
            active: false,
        }
    }
}

impl Actuator for OneWireActuator {
    fn set_active(&mut self, active: bool) {
        let (address, channel, level) = (self.address, self.channel, active != self.invert);
        match with_bus(&self.bus, |b| b.write_channel(&address, channel, level)) {
            Ok(()) => self.active = active,
            Err(e) => warn!(address = %address, channel, "switch write failed: {e}"),
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// One channel of a multi-channel single-wire switch read as an input.
pub struct OneWireSwitchSensor {
    bus: SharedBus,
    address: DeviceAddress,
    channel: u8,
    invert: bool,
}

impl OneWireSwitchSensor {
    pub fn new(bus: SharedBus, address: DeviceAddress, channel: u8, invert: bool) -> Self {
        Self {
            bus,
            address,
            channel,
            invert,
        }
    }
}

impl SwitchSensor for OneWireSwitchSensor {
    fn sense(&mut self) -> bool {
        let (address, channel) = (self.address, self.channel);
        match with_bus(&self.bus, |b| b.read_channel(&address, channel)) {
            Ok(level) => level != self.invert,
            Err(e) => {
                warn!(address = %address, channel, "switch read failed: {e}");
                false
            }
        }
    }
}

/// Output on a plain digital pin.
pub struct DigitalPinActuator {
    pins: SharedPins,
    pin: u8,
    invert: bool,
    active: bool,
}

impl DigitalPinActuator {
    /// Configures the pin as an output and drives it inactive.
    pub fn new(pins: SharedPins, pin: u8, invert: bool) -> TransportResult<Self> {
        with_pins(&pins, |p| {
            p.set_mode(pin, PinMode::Output)?;
            p.write(pin, invert)
        })?;
        Ok(Self {
            pins,
            pin,
            invert,
            active: false,
        })
    }
}

impl Actuator for DigitalPinActuator {
    fn set_active(&mut self, active: bool) {
        let (pin, level) = (self.pin, active != self.invert);
        match with_pins(&self.pins, |p| p.write(pin, level)) {
            Ok(()) => self.active = active,
            Err(e) => warn!(pin, "pin write failed: {e}"),
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Input on a plain digital pin, with the internal pull-up enabled.
pub struct DigitalPinSensor {
    pins: SharedPins,
    pin: u8,
    invert: bool,
}

impl DigitalPinSensor {
    pub fn new(pins: SharedPins, pin: u8, invert: bool) -> TransportResult<Self> {
        with_pins(&pins, |p| p.set_mode(pin, PinMode::InputPullUp))?;
        Ok(Self { pins, pin, invert })
    }
}

impl SwitchSensor for DigitalPinSensor {
    fn sense(&mut self) -> bool {
        let pin = self.pin;
        match with_pins(&self.pins, |p| p.read(pin)) {
            Ok(level) => level != self.invert,
            Err(e) => {
                warn!(pin, "pin read failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use io_transport::{MockBus, MockPins};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct Counted(Rc<Cell<u32>>);

    impl Actuator for Counted {
        fn set_active(&mut self, _active: bool) {}
        fn is_active(&self) -> bool {
            true
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn rebinding_drops_the_previous_owned_instance() {
        let drops = Rc::new(Cell::new(0));
        let mut binding: Binding<dyn Actuator> = Binding::default();
        assert!(binding.is_default());
        assert!(!binding.is_active());

        let _ = binding.bind(Box::new(Counted(drops.clone())));
        assert!(binding.is_active());
        let _ = binding.bind(Box::new(Counted(drops.clone())));
        assert_eq!(drops.get(), 1);

        let _ = binding.release();
        assert_eq!(drops.get(), 2);
        assert!(binding.release().is_none());
        assert_eq!(drops.get(), 2);
        assert!(binding.is_default());
    }

    #[test]
    fn defaults_are_inert() {
        let mut t: Binding<dyn BasicTempSensor> = Binding::default();
        let mut s: Binding<dyn SwitchSensor> = Binding::default();
        assert_eq!(t.read(), None);
        assert!(!t.is_connected());
        assert!(!s.sense());
    }

    #[test]
    fn probe_applies_calibration_and_tracks_connection() {
        let addr = DeviceAddress::new([0x28, 1, 2, 3, 4, 5, 6, 7]);
        let mock = Rc::new(RefCell::new(MockBus::new(4).with_probe(addr, 320)));
        let bus: SharedBus = mock.clone();
        let mut probe = OneWireTempSensor::new(bus, addr, TempOffset::from_sixteenths(8));
        assert_eq!(probe.init().map(|t| t.to_string()), Some("20.500".to_string()));
        assert!(probe.is_connected());

        mock.borrow_mut().set_present(&addr, false);
        assert_eq!(probe.read(), None);
        assert!(!probe.is_connected());
    }

    #[test]
    fn pin_actuator_honours_invert() -> anyhow::Result<()> {
        let mock = Rc::new(RefCell::new(MockPins::new()));
        let pins: SharedPins = mock.clone();
        let mut heater = DigitalPinActuator::new(pins, 5, true)?;
        assert!(mock.borrow().level(5));
        heater.set_active(true);
        assert!(!mock.borrow().level(5));
        assert!(heater.is_active());
        Ok(())
    }

    #[test]
    fn switch_channel_drives_only_its_latch() {
        let addr = DeviceAddress::new([0x3A, 1, 2, 3, 4, 5, 6, 7]);
        let mock = Rc::new(RefCell::new(MockBus::new(4).with_switch(addr)));
        let bus: SharedBus = mock.clone();
        let mut cooler = OneWireActuator::new(bus.clone(), addr, 1, false);
        cooler.set_active(true);
        assert_eq!(mock.borrow().latch(&addr, 1), Some(true));
        assert_eq!(mock.borrow().latch(&addr, 0), Some(false));

        mock.borrow_mut().set_sensed(&addr, 0, true);
        let mut door = OneWireSwitchSensor::new(bus, addr, 0, true);
        assert!(!door.sense());
    }
}
