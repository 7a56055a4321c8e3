use crate::{
    BusInfo, DeviceAddress, DigitalPins, OneWireBus, PinMode, Result, TransportError,
    DS2413_CHANNELS,
};
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum MockDevice {
    Probe {
        address: DeviceAddress,
        raw: i16,
        present: bool,
    },
    Switch {
        address: DeviceAddress,
        latches: [bool; DS2413_CHANNELS as usize],
        sensed: [bool; DS2413_CHANNELS as usize],
    },
    Other {
        address: DeviceAddress,
    },
}

impl MockDevice {
    fn address(&self) -> &DeviceAddress {
        match self {
            MockDevice::Probe { address, .. }
            | MockDevice::Switch { address, .. }
            | MockDevice::Other { address } => address,
        }
    }
}

/// A simple in-process single-wire bus. Devices are found in insertion order.
#[derive(Clone, Debug)]
pub struct MockBus {
    pin: u8,
    devices: Vec<MockDevice>,
    cursor: usize,
}

impl MockBus {
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            devices: Vec::new(),
            cursor: 0,
        }
    }

    /// Attach a temperature probe reporting `raw` (1/16 °C).
    pub fn with_probe(mut self, address: DeviceAddress, raw: i16) -> Self {
        self.devices.push(MockDevice::Probe {
            address,
            raw,
            present: true,
        });
        self
    }

    /// Attach a dual-channel switch with all latches off.
    pub fn with_switch(mut self, address: DeviceAddress) -> Self {
        self.devices.push(MockDevice::Switch {
            address,
            latches: [false; DS2413_CHANNELS as usize],
            sensed: [false; DS2413_CHANNELS as usize],
        });
        self
    }

    /// Attach a device of a family nothing understands.
    pub fn with_unknown(mut self, address: DeviceAddress) -> Self {
        self.devices.push(MockDevice::Other { address });
        self
    }

    pub fn set_temperature(&mut self, address: &DeviceAddress, value: i16) {
        for d in &mut self.devices {
            if let MockDevice::Probe { address: a, raw, .. } = d {
                if a == address {
                    *raw = value;
                }
            }
        }
    }

    /// Simulate a probe dropping off (or returning to) the wire.
    pub fn set_present(&mut self, address: &DeviceAddress, on_wire: bool) {
        for d in &mut self.devices {
            if let MockDevice::Probe {
                address: a,
                present,
                ..
            } = d
            {
                if a == address {
                    *present = on_wire;
                }
            }
        }
    }

    pub fn set_sensed(&mut self, address: &DeviceAddress, channel: u8, level: bool) {
        if let Some(MockDevice::Switch { sensed, .. }) = self.find_mut(address) {
            if let Some(s) = sensed.get_mut(usize::from(channel)) {
                *s = level;
            }
        }
    }

    /// Current output latch of a switch channel, if such a channel exists.
    pub fn latch(&self, address: &DeviceAddress, channel: u8) -> Option<bool> {
        self.devices.iter().find_map(|d| match d {
            MockDevice::Switch {
                address: a,
                latches,
                ..
            } if a == address => latches.get(usize::from(channel)).copied(),
            _ => None,
        })
    }

    fn find_mut(&mut self, address: &DeviceAddress) -> Option<&mut MockDevice> {
        self.devices.iter_mut().find(|d| d.address() == address)
    }
}

impl OneWireBus for MockBus {
    fn pin(&self) -> u8 {
        self.pin
    }

    fn info(&self) -> BusInfo {
        BusInfo {
            pin: self.pin,
            driver: "mock".to_string(),
        }
    }

    fn reset_search(&mut self) {
        self.cursor = 0;
    }

    fn search(&mut self) -> Option<DeviceAddress> {
        while let Some(d) = self.devices.get(self.cursor) {
            self.cursor += 1;
            match d {
                MockDevice::Probe { present: false, .. } => continue,
                other => return Some(*other.address()),
            }
        }
        None
    }

    fn read_temperature(&mut self, address: &DeviceAddress) -> Result<i16> {
        match self.find_mut(address) {
            Some(MockDevice::Probe {
                raw, present: true, ..
            }) => Ok(*raw),
            _ => Err(TransportError::NotPresent(address.to_string())),
        }
    }

    fn read_channel(&mut self, address: &DeviceAddress, channel: u8) -> Result<bool> {
        match self.find_mut(address) {
            Some(MockDevice::Switch { sensed, .. }) => sensed
                .get(usize::from(channel))
                .copied()
                .ok_or(TransportError::InvalidReading(format!("channel {channel}"))),
            _ => Err(TransportError::NotPresent(address.to_string())),
        }
    }

    fn write_channel(&mut self, address: &DeviceAddress, channel: u8, on: bool) -> Result<()> {
        match self.find_mut(address) {
            Some(MockDevice::Switch { latches, .. }) => {
                let latch = latches
                    .get_mut(usize::from(channel))
                    .ok_or(TransportError::InvalidReading(format!("channel {channel}")))?;
                *latch = on;
                Ok(())
            }
            _ => Err(TransportError::NotPresent(address.to_string())),
        }
    }
}

/// In-memory digital pins. Unwritten pins read low.
#[derive(Clone, Debug, Default)]
pub struct MockPins {
    levels: HashMap<u8, bool>,
    modes: HashMap<u8, PinMode>,
}

impl MockPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self, pin: u8) -> bool {
        self.levels.get(&pin).copied().unwrap_or(false)
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.modes.get(&pin).copied()
    }

    /// Drive an input pin from the outside world.
    pub fn set_level(&mut self, pin: u8, high: bool) {
        self.levels.insert(pin, high);
    }
}

impl DigitalPins for MockPins {
    fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        if mode == PinMode::InputPullUp {
            self.levels.entry(pin).or_insert(true);
        }
        self.modes.insert(pin, mode);
        Ok(())
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<()> {
        self.levels.insert(pin, high);
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<bool> {
        Ok(self.level(pin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(last: u8) -> DeviceAddress {
        DeviceAddress::new([0x28, 1, 2, 3, 4, 5, 6, last])
    }

    #[test]
    fn search_visits_every_device_once_and_restarts() {
        let mut bus = MockBus::new(4)
            .with_probe(probe(1), 320)
            .with_switch(DeviceAddress::new([0x3A, 0, 0, 0, 0, 0, 0, 9]));
        assert_eq!(bus.search(), Some(probe(1)));
        assert!(bus.search().is_some());
        assert_eq!(bus.search(), None);
        bus.reset_search();
        assert_eq!(bus.search(), Some(probe(1)));
    }

    #[test]
    fn absent_probe_is_skipped_and_unreadable() {
        let mut bus = MockBus::new(4).with_probe(probe(1), 320);
        bus.set_present(&probe(1), false);
        bus.reset_search();
        assert_eq!(bus.search(), None);
        assert!(bus.read_temperature(&probe(1)).is_err());
    }

    #[test]
    fn switch_latches_are_per_channel() -> anyhow::Result<()> {
        let sw = DeviceAddress::new([0x3A, 0, 0, 0, 0, 0, 0, 9]);
        let mut bus = MockBus::new(4).with_switch(sw);
        bus.write_channel(&sw, 1, true)?;
        assert_eq!(bus.latch(&sw, 0), Some(false));
        assert_eq!(bus.latch(&sw, 1), Some(true));
        assert!(bus.write_channel(&sw, 2, true).is_err());
        Ok(())
    }

    #[test]
    fn pins_remember_levels() -> anyhow::Result<()> {
        let mut pins = MockPins::new();
        pins.set_mode(5, PinMode::Output)?;
        pins.write(5, true)?;
        assert!(pins.read(5)?);
        assert!(!pins.read(6)?);
        assert_eq!(pins.mode(5), Some(PinMode::Output));
        pins.set_mode(7, PinMode::InputPullUp)?;
        assert!(pins.read(7)?);
        Ok(())
    }
}
