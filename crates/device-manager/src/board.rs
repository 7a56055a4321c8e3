//! Board pin maps and the bus table resolving a pin to its single-wire bus.

use crate::error::{DeviceError, Result};
use io_transport::{BusInfo, SharedBus, SharedPins};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Static description of a controller board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub name: String,
    /// Pins that can drive outputs, in enumeration order.
    #[serde(default)]
    pub actuator_pins: Vec<u8>,
    /// Pins wired as switch inputs, in enumeration order.
    #[serde(default)]
    pub sensor_pins: Vec<u8>,
    /// Pins carrying a single-wire bus.
    #[serde(default)]
    pub one_wire_pins: Vec<u8>,
    /// Simulated bus devices for the mock backend.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mock: Vec<MockDeviceSpec>,
}

impl BoardConfig {
    /// Shield revision A: separate beer and fridge probe buses.
    pub fn shield_rev_a() -> Self {
        Self {
            name: "shield-rev-a".to_string(),
            actuator_pins: vec![5, 6],
            sensor_pins: vec![4],
            one_wire_pins: vec![10, 11],
            mock: Vec::new(),
        }
    }

    /// Shield revision C: one shared bus and four outputs.
    pub fn shield_rev_c() -> Self {
        Self {
            name: "shield-rev-c".to_string(),
            actuator_pins: vec![2, 5, 6, 7],
            sensor_pins: vec![4],
            one_wire_pins: vec![18],
            mock: Vec::new(),
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "rev-a" | "shield-rev-a" => Some(Self::shield_rev_a()),
            "rev-c" | "shield-rev-c" => Some(Self::shield_rev_c()),
            _ => None,
        }
    }
}

/// A device the mock backend should pretend to find.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MockDeviceSpec {
    Probe {
        pin: u8,
        address: String,
        celsius: f64,
    },
    Switch {
        pin: u8,
        address: String,
    },
}

/// Runtime board: the pin map plus live handles for pins and buses.
pub struct Board {
    config: BoardConfig,
    pins: SharedPins,
    buses: Vec<(u8, SharedBus)>,
}

impl Board {
    pub fn new(config: BoardConfig, pins: SharedPins) -> Self {
        Self {
            config,
            pins,
            buses: Vec::new(),
        }
    }

    /// Register the bus wired to `pin`, replacing any earlier registration.
    pub fn attach_bus(&mut self, pin: u8, bus: SharedBus) {
        self.buses.retain(|(p, _)| *p != pin);
        self.buses.push((pin, bus));
    }

    /// The bus configured on `pin`, if any.
    pub fn one_wire_bus(&self, pin: u8) -> Option<SharedBus> {
        self.buses
            .iter()
            .find(|(p, _)| *p == pin)
            .map(|(_, bus)| Rc::clone(bus))
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn actuator_pins(&self) -> &[u8] {
        &self.config.actuator_pins
    }

    pub fn sensor_pins(&self) -> &[u8] {
        &self.config.sensor_pins
    }

    /// Bus pins in enumeration order; only pins with an attached bus are listed.
    pub fn one_wire_pins(&self) -> Vec<u8> {
        self.buses.iter().map(|(p, _)| *p).collect()
    }

    pub fn pins(&self) -> SharedPins {
        Rc::clone(&self.pins)
    }

    pub fn bus_info(&self) -> Vec<BusInfo> {
        self.buses
            .iter()
            .filter_map(|(_, bus)| bus.try_borrow().ok().map(|b| b.info()))
            .collect()
    }

    /// Board wired to in-process mock pins and buses populated from `config.mock`.
    #[cfg(feature = "mock")]
    pub fn mock(config: BoardConfig) -> Result<Self> {
        use io_transport::{DeviceAddress, MockBus, MockPins};

        let pins: SharedPins = Rc::new(RefCell::new(MockPins::new()));
        let mut buses = Vec::new();
        for &pin in &config.one_wire_pins {
            let mut bus = MockBus::new(pin);
            for spec in &config.mock {
                match spec {
                    MockDeviceSpec::Probe {
                        pin: p,
                        address,
                        celsius,
                    } if *p == pin => {
                        let addr = DeviceAddress::parse_hex(address)
                            .ok_or_else(|| DeviceError::Format(format!("bad address {address}")))?;
                        let raw = (celsius * 16.0).round().clamp(-880.0, 2000.0) as i16;
                        bus = bus.with_probe(addr, raw);
                    }
                    MockDeviceSpec::Switch { pin: p, address } if *p == pin => {
                        let addr = DeviceAddress::parse_hex(address)
                            .ok_or_else(|| DeviceError::Format(format!("bad address {address}")))?;
                        bus = bus.with_switch(addr);
                    }
                    _ => {}
                }
            }
            let shared: SharedBus = Rc::new(RefCell::new(bus));
            buses.push((pin, shared));
        }
        Ok(Self {
            config,
            pins,
            buses,
        })
    }

    /// Board wired to the Linux sysfs GPIO and w1 interfaces. Every configured bus pin
    /// shares the kernel's single w1 device directory.
    #[cfg(feature = "w1-sysfs")]
    pub fn sysfs(config: BoardConfig) -> Self {
        use io_transport::{SysfsPins, W1SysfsBus};

        let pins: SharedPins = Rc::new(RefCell::new(SysfsPins::open()));
        let buses = config
            .one_wire_pins
            .iter()
            .map(|&pin| {
                let bus: SharedBus = Rc::new(RefCell::new(W1SysfsBus::open(pin)));
                (pin, bus)
            })
            .collect();
        Self {
            config,
            pins,
            buses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_pins_have_no_bus() -> anyhow::Result<()> {
        let mut config = BoardConfig::shield_rev_c();
        config.mock.push(MockDeviceSpec::Probe {
            pin: 18,
            address: "28AABBCCDDEEFF00".to_string(),
            celsius: 20.5,
        });
        let board = Board::mock(config)?;
        assert!(board.one_wire_bus(18).is_some());
        assert!(board.one_wire_bus(4).is_none());
        assert_eq!(board.one_wire_pins(), vec![18]);
        assert_eq!(board.bus_info().len(), 1);
        Ok(())
    }

    #[test]
    fn mock_rejects_bad_addresses() {
        let mut config = BoardConfig::shield_rev_a();
        config.mock.push(MockDeviceSpec::Switch {
            pin: 10,
            address: "3A".to_string(),
        });
        assert!(Board::mock(config).is_err());
    }

    #[test]
    fn attaching_a_bus_replaces_the_previous_one() -> anyhow::Result<()> {
        use io_transport::{MockBus, MockPins};

        let pins: SharedPins = Rc::new(RefCell::new(MockPins::new()));
        let mut board = Board::new(BoardConfig::shield_rev_a(), pins);
        assert!(board.one_wire_pins().is_empty());
        board.attach_bus(10, Rc::new(RefCell::new(MockBus::new(10))));
        board.attach_bus(11, Rc::new(RefCell::new(MockBus::new(11))));
        board.attach_bus(10, Rc::new(RefCell::new(MockBus::new(10))));
        assert_eq!(board.one_wire_pins(), vec![11, 10]);
        Ok(())
    }

    #[test]
    fn presets_by_name() {
        assert_eq!(BoardConfig::preset("rev-a"), Some(BoardConfig::shield_rev_a()));
        assert!(BoardConfig::preset("rev-z").is_none());
    }
}
