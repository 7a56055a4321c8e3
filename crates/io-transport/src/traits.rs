use crate::{BusInfo, DeviceAddress, PinMode, Result, TransportError};
use std::cell::RefCell;
use std::rc::Rc;

/// A blocking single-wire bus master bound to one board pin.
///
/// Searches are stateful: call [`OneWireBus::reset_search`] and then
/// [`OneWireBus::search`] until it returns `None`.
pub trait OneWireBus {
    /// Board pin the bus is wired to.
    fn pin(&self) -> u8;

    /// Descriptive information for listings.
    fn info(&self) -> BusInfo {
        BusInfo {
            pin: self.pin(),
            driver: "unknown".to_string(),
        }
    }

    /// Restart the ROM search from the beginning.
    fn reset_search(&mut self);

    /// Next device address found on the bus, or `None` once the search is exhausted.
    fn search(&mut self) -> Option<DeviceAddress>;

    /// Trigger a conversion and read the raw temperature in 1/16 °C.
    fn read_temperature(&mut self, address: &DeviceAddress) -> Result<i16>;

    /// Sensed level of one channel on a multi-channel switch.
    fn read_channel(&mut self, _address: &DeviceAddress, _channel: u8) -> Result<bool> {
        Err(TransportError::Unsupported("channel reads not supported"))
    }

    /// Drive the output latch of one channel on a multi-channel switch.
    fn write_channel(&mut self, _address: &DeviceAddress, _channel: u8, _on: bool) -> Result<()> {
        Err(TransportError::Unsupported("channel writes not supported"))
    }
}

/// The board's directly wired digital pins.
pub trait DigitalPins {
    fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<()>;

    fn write(&mut self, pin: u8, high: bool) -> Result<()>;

    fn read(&mut self, pin: u8) -> Result<bool>;
}

/// Bus handle shared by every device instance on the same wire.
pub type SharedBus = Rc<RefCell<dyn OneWireBus>>;

/// Pin handle shared by every pin-backed device instance.
pub type SharedPins = Rc<RefCell<dyn DigitalPins>>;

/// Run `f` with exclusive access to a shared bus.
pub fn with_bus<R>(bus: &SharedBus, f: impl FnOnce(&mut dyn OneWireBus) -> Result<R>) -> Result<R> {
    let mut guard = bus.try_borrow_mut().map_err(|_| TransportError::Busy)?;
    f(&mut *guard)
}

/// Run `f` with exclusive access to the shared pin handle.
pub fn with_pins<R>(
    pins: &SharedPins,
    f: impl FnOnce(&mut dyn DigitalPins) -> Result<R>,
) -> Result<R> {
    let mut guard = pins.try_borrow_mut().map_err(|_| TransportError::Busy)?;
    f(&mut *guard)
}
