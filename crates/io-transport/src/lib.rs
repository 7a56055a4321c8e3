//! io-transport: single-wire bus and digital pin abstractions
//!
//! This crate provides traits and types for talking to the hardware a fermentation
//! controller hangs off: shared single-wire buses carrying temperature probes and
//! multi-channel switches, and the board's plain digital pins. Backends are feature-gated;
//! the default build enables an in-process `mock` backend so that binaries and tests run on
//! any host, and a Linux `w1-sysfs` backend for real probes and GPIO lines.

mod types;
pub use types::{
    crc8, BusInfo, DeviceAddress, PinMode, DS18B20_FAMILY_ID, DS2413_CHANNELS, DS2413_FAMILY_ID,
};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::{with_bus, with_pins, DigitalPins, OneWireBus, SharedBus, SharedPins};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBus, MockPins};

#[cfg(feature = "w1-sysfs")]
mod sysfs;

#[cfg(feature = "w1-sysfs")]
pub use sysfs::{SysfsPins, W1SysfsBus, GPIO_CLASS_DIR, W1_DEVICES_DIR};
