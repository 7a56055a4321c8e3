//! Hardware discovery: scan buses and pins, match candidates back to stored slots.

use crate::devices::{BasicTempSensor, OneWireTempSensor};
use crate::encode::{DeviceRecord, DeviceSink};
use crate::error::Result;
use crate::fixed::TempOffset;
use crate::manager::DeviceManager;
use crate::store::DeviceStore;
use crate::types::{is_assignable, DeviceConfig, DeviceFunction, DeviceHardware, Hardware};
use io_transport::{with_bus, DeviceAddress, DS18B20_FAMILY_ID, DS2413_CHANNELS, DS2413_FAMILY_ID};
use tracing::{debug, warn};

/// Filters for a hardware enumeration request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareQuery {
    /// Only this hardware kind.
    pub hardware: Option<DeviceHardware>,
    /// Only this pin.
    pub pin: Option<u8>,
    /// Attach a live reading where one can be taken.
    pub values: bool,
    /// Skip hardware already referenced by a slot.
    pub unused_only: bool,
    /// Only hardware that can serve this function.
    pub function: Option<DeviceFunction>,
}

fn parse_int(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

impl HardwareQuery {
    /// Keys: `h` hardware, `p` pin, `v` values, `u` unused only, `f` function.
    /// Negative numbers mean "any"; unknown keys are ignored.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let Some(n) = parse_int(value.as_ref()) else {
                continue;
            };
            let code = u8::try_from(n).ok();
            match key.as_ref() {
                "h" => query.hardware = code.and_then(DeviceHardware::from_code),
                "p" => query.pin = code,
                "v" => query.values = n > 0,
                "u" => query.unused_only = n > 0,
                "f" => {
                    query.function = code
                        .and_then(DeviceFunction::from_code)
                        .filter(|f| *f != DeviceFunction::None)
                }
                _ => {}
            }
        }
        query
    }

    fn wants(&self, kind: DeviceHardware) -> bool {
        self.hardware.map_or(true, |h| h == kind)
    }

    fn wants_pin(&self, pin: u8) -> bool {
        self.pin.map_or(true, |p| p == pin)
    }
}

/// Candidates for one discovered bus address, by family id. Unknown families yield none.
pub fn classify(pin: u8, address: DeviceAddress) -> Vec<Hardware> {
    match address.family() {
        DS2413_FAMILY_ID => (0..DS2413_CHANNELS)
            .map(|channel| Hardware::OneWireIo {
                pin,
                address,
                channel,
                invert: false,
            })
            .collect(),
        DS18B20_FAMILY_ID => vec![Hardware::OneWireTemp {
            pin,
            address,
            calibration: TempOffset::ZERO,
        }],
        _ => Vec::new(),
    }
}

impl<S: DeviceStore> DeviceManager<S> {
    /// Report every piece of attached hardware matching `query` to `sink`, single-wire
    /// buses first, then actuator pins and sensor pins. Returns the number reported.
    pub fn enumerate_devices(&mut self, query: &HardwareQuery, sink: &mut dyn DeviceSink) -> Result<usize> {
        debug!(?query, "enumerating hardware");
        let mut candidates = Vec::new();

        if query.hardware.map_or(true, |h| h.is_one_wire()) {
            for pin in self.board.one_wire_pins() {
                if !query.wants_pin(pin) {
                    continue;
                }
                let Some(bus) = self.board.one_wire_bus(pin) else {
                    continue;
                };
                let found = with_bus(&bus, |b| {
                    b.reset_search();
                    Ok(std::iter::from_fn(|| b.search()).collect::<Vec<_>>())
                });
                match found {
                    Ok(addresses) => {
                        debug!(pin, n = addresses.len(), "bus search complete");
                        for address in addresses {
                            let kinds = classify(pin, address);
                            if kinds.is_empty() {
                                debug!(pin, %address, "skipping unrecognised device family");
                            }
                            candidates.extend(kinds.into_iter().filter(|h| query.wants(h.kind())));
                        }
                    }
                    Err(e) => warn!(pin, "bus search failed: {e}"),
                }
            }
        }

        if query.hardware.map_or(true, |h| h.is_digital_pin()) {
            let pins = self.board.actuator_pins().iter().chain(self.board.sensor_pins());
            candidates.extend(
                pins.filter(|p| query.wants_pin(**p))
                    .map(|&pin| Hardware::Pin { pin, invert: false }),
            );
        }

        let mut reported = 0;
        for hardware in candidates {
            if let Some(function) = query.function {
                if !is_assignable(function.device_type(), hardware.kind()) {
                    continue;
                }
            }
            let slot = self.find_hardware_device(&hardware);
            if slot.is_some() && query.unused_only {
                continue;
            }
            let config = slot
                .and_then(|s| self.store.fetch(s))
                .unwrap_or(DeviceConfig {
                    hardware,
                    ..DeviceConfig::default()
                });
            let value = if query.values {
                self.probe_value(&config.hardware)
            } else {
                None
            };
            sink.emit(&DeviceRecord {
                slot,
                config,
                value,
            })?;
            reported += 1;
        }

        if let Some(m) = &self.metrics {
            m.enumerated.inc_by(reported as u64);
        }
        debug!(reported, "enumeration complete");
        Ok(reported)
    }

    /// One uncalibrated reading from a probe through a throwaway reader. Other kinds have
    /// no defined direction until assigned a function, so they report nothing.
    fn probe_value(&self, hardware: &Hardware) -> Option<String> {
        let Hardware::OneWireTemp { pin, address, .. } = *hardware else {
            return None;
        };
        let bus = self.board.one_wire_bus(pin)?;
        let mut reader = OneWireTempSensor::new(bus, address, TempOffset::ZERO);
        reader.init().map(|t| t.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, BoardConfig, MockDeviceSpec};
    use crate::store::MemoryStore;
    use crate::update::DeviceUpdate;
    use io_transport::MockBus;
    use std::cell::RefCell;
    use std::rc::Rc;

    const PROBE: &str = "28AABBCCDDEEFF00";
    const SWITCH: &str = "3A00112233445566";

    fn manager() -> anyhow::Result<DeviceManager<MemoryStore>> {
        let mut config = BoardConfig::shield_rev_c();
        config.mock = vec![
            MockDeviceSpec::Probe {
                pin: 18,
                address: PROBE.to_string(),
                celsius: 18.25,
            },
            MockDeviceSpec::Switch {
                pin: 18,
                address: SWITCH.to_string(),
            },
        ];
        Ok(DeviceManager::new(Board::mock(config)?, MemoryStore::new()))
    }

    fn run(m: &mut DeviceManager<MemoryStore>, pairs: &[(&str, &str)]) -> anyhow::Result<Vec<DeviceRecord>> {
        let mut out = Vec::new();
        m.enumerate_devices(&HardwareQuery::from_pairs(pairs.iter().copied()), &mut out)?;
        Ok(out)
    }

    #[test]
    fn families_classify_by_first_byte() {
        let probe = DeviceAddress::new([0x28, 1, 2, 3, 4, 5, 6, 7]);
        let switch = DeviceAddress::new([0x3A, 1, 2, 3, 4, 5, 6, 7]);
        let other = DeviceAddress::new([0x10, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(
            classify(4, probe).iter().map(|h| h.kind()).collect::<Vec<_>>(),
            vec![DeviceHardware::OneWireTemp]
        );
        let channels: Vec<_> = classify(4, switch).iter().filter_map(|h| h.channel()).collect();
        assert_eq!(channels, vec![0, 1]);
        assert!(classify(4, other).is_empty());
    }

    #[test]
    fn buses_come_before_pins() -> anyhow::Result<()> {
        let mut m = manager()?;
        let out = run(&mut m, &[])?;
        let kinds: Vec<_> = out.iter().map(|r| r.config.hardware.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                DeviceHardware::OneWireTemp,
                DeviceHardware::OneWireIo,
                DeviceHardware::OneWireIo,
                DeviceHardware::Pin,
                DeviceHardware::Pin,
                DeviceHardware::Pin,
                DeviceHardware::Pin,
                DeviceHardware::Pin,
            ]
        );
        assert!(out.iter().all(|r| r.slot.is_none() && r.value.is_none()));
        let pins: Vec<_> = out[3..].iter().map(|r| r.config.hardware.pin()).collect();
        assert_eq!(pins, vec![2, 5, 6, 7, 4]);
        Ok(())
    }

    #[test]
    fn filters_by_kind_pin_and_function() -> anyhow::Result<()> {
        let mut m = manager()?;
        assert_eq!(run(&mut m, &[("h", "3")])?.len(), 2);
        assert_eq!(run(&mut m, &[("h", "1"), ("p", "6")])?.len(), 1);
        let temps = run(&mut m, &[("f", "9")])?;
        assert_eq!(temps.len(), 1);
        assert_eq!(temps[0].config.hardware.kind(), DeviceHardware::OneWireTemp);
        // actuators fit pins and switch channels
        assert_eq!(run(&mut m, &[("f", "2")])?.len(), 7);
        Ok(())
    }

    #[test]
    fn matched_hardware_reports_the_stored_record() -> anyhow::Result<()> {
        let mut m = manager()?;
        let outcome = m.update_device(&DeviceUpdate::from_pairs([
            ("i", "4"),
            ("c", "1"),
            ("b", "1"),
            ("f", "9"),
            ("h", "2"),
            ("p", "18"),
            ("a", PROBE),
            ("j", "0.5"),
        ]))?;
        assert!(outcome.accepted());

        let out = run(&mut m, &[("h", "2"), ("v", "1")])?;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].slot, Some(4));
        assert_eq!(out[0].config, outcome.config);
        // enumeration reads are uncalibrated
        assert_eq!(out[0].value.as_deref(), Some("18.250"));

        assert!(run(&mut m, &[("h", "2"), ("u", "1")])?.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_families_are_skipped_on_the_wire() -> anyhow::Result<()> {
        let probe = DeviceAddress::new([0x28, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        let unknown = DeviceAddress::new([0x10, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        let bus = Rc::new(RefCell::new(
            MockBus::new(18).with_unknown(unknown).with_probe(probe, 292),
        ));
        let mut board = Board::mock(BoardConfig::shield_rev_c())?;
        board.attach_bus(18, bus.clone());
        let mut m = DeviceManager::new(board, MemoryStore::new());

        let out = run(&mut m, &[("h", "2"), ("v", "1")])?;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].config.hardware.address(), Some(probe));
        assert_eq!(out[0].value.as_deref(), Some("18.250"));

        let all = run(&mut m, &[])?;
        assert!(all.iter().all(|r| r.config.hardware.address() != Some(unknown)));
        assert_eq!(all.len(), 1 + 5);

        bus.borrow_mut().set_temperature(&probe, 328);
        let out = run(&mut m, &[("h", "2"), ("v", "1")])?;
        assert_eq!(out[0].value.as_deref(), Some("20.500"));
        Ok(())
    }
}
