//! Slot listing with optional live reads and actuator writes.

use crate::encode::{DeviceRecord, DeviceSink};
use crate::error::Result;
use crate::manager::DeviceManager;
use crate::store::{all_devices, DeviceStore};
use crate::types::{DeviceConfig, DeviceType};

/// Which slots to list and what to do with their live instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayQuery {
    /// A single slot, or every slot.
    pub slot: Option<usize>,
    /// Attach live readings for sensors.
    pub read: bool,
    /// Drive selected actuators to this state.
    pub write: Option<bool>,
    /// Include empty slots when listing every slot.
    pub include_empty: bool,
}

impl DisplayQuery {
    /// Keys: `i` slot (negative for all), `r` read, `w` write, `e` include empty.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let Ok(n) = value.as_ref().trim().parse::<i64>() else {
                continue;
            };
            match key.as_ref() {
                "i" => query.slot = usize::try_from(n).ok(),
                "r" => query.read = n == 1,
                "w" => query.write = (n >= 0).then_some(n != 0),
                "e" => query.include_empty = n > 0,
                _ => {}
            }
        }
        query
    }

    pub fn selects(&self, slot: usize, config: &DeviceConfig) -> bool {
        match self.slot {
            Some(wanted) => wanted == slot,
            None => self.include_empty || !config.is_empty(),
        }
    }
}

impl<S: DeviceStore> DeviceManager<S> {
    /// Report the selected slots to `sink`, applying writes and reads to their live
    /// instances on the way. Returns the number of records reported.
    pub fn list_devices(&mut self, query: &DisplayQuery, sink: &mut dyn DeviceSink) -> Result<usize> {
        let selected: Vec<(usize, DeviceConfig)> = all_devices(&self.store)
            .filter(|(slot, config)| query.selects(*slot, config))
            .collect();
        let mut reported = 0;
        for (slot, config) in selected {
            let value = self.live_state(query, &config);
            sink.emit(&DeviceRecord {
                slot: Some(slot),
                config,
                value,
            })?;
            reported += 1;
        }
        Ok(reported)
    }

    fn live_state(&mut self, query: &DisplayQuery, config: &DeviceConfig) -> Option<String> {
        let device_type = config.device_type();
        match (query.write, device_type) {
            (Some(active), DeviceType::SwitchActuator) => {
                self.set_actuator(config, active);
                None
            }
            _ if query.read => match device_type {
                DeviceType::SwitchSensor => self.sense_switch(config).map(|on| u8::from(on).to_string()),
                DeviceType::TempSensor => self.read_temperature(config).map(|t| t.to_string()),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, BoardConfig, MockDeviceSpec};
    use crate::store::MemoryStore;
    use crate::update::DeviceUpdate;
    use io_transport::{with_pins, MockPins};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn manager() -> anyhow::Result<DeviceManager<MemoryStore>> {
        let mut config = BoardConfig::shield_rev_c();
        config.mock.push(MockDeviceSpec::Probe {
            pin: 18,
            address: "28AABBCCDDEEFF00".to_string(),
            celsius: 20.0,
        });
        let mut m = DeviceManager::new(Board::mock(config)?, MemoryStore::new());
        for patch in [
            vec![("i", "0"), ("c", "1"), ("b", "1"), ("f", "9"), ("h", "2"), ("p", "18"), ("a", "28AABBCCDDEEFF00"), ("j", "-0.5")],
            vec![("i", "2"), ("c", "1"), ("f", "2"), ("h", "1"), ("p", "5")],
            vec![("i", "3"), ("c", "1"), ("f", "1"), ("h", "1"), ("p", "4"), ("x", "1")],
        ] {
            anyhow::ensure!(m.update_device(&DeviceUpdate::from_pairs(patch))?.accepted());
        }
        Ok(m)
    }

    fn list(m: &mut DeviceManager<MemoryStore>, pairs: &[(&str, &str)]) -> anyhow::Result<Vec<DeviceRecord>> {
        let mut out = Vec::new();
        m.list_devices(&DisplayQuery::from_pairs(pairs.iter().copied()), &mut out)?;
        Ok(out)
    }

    #[test]
    fn lists_defined_slots_by_default() -> anyhow::Result<()> {
        let mut m = manager()?;
        let slots: Vec<_> = list(&mut m, &[])?.iter().filter_map(|r| r.slot).collect();
        assert_eq!(slots, vec![0, 2, 3]);
        assert_eq!(list(&mut m, &[("e", "1")])?.len(), 16);
        let one = list(&mut m, &[("i", "1")])?;
        assert_eq!(one.len(), 1);
        assert!(one[0].config.is_empty());
        Ok(())
    }

    #[test]
    fn reads_report_calibrated_values() -> anyhow::Result<()> {
        let mut m = manager()?;
        let out = list(&mut m, &[("i", "0"), ("r", "1")])?;
        assert_eq!(out[0].value.as_deref(), Some("19.500"));

        // pull-up input reads high, inverted to "off"
        let out = list(&mut m, &[("i", "3"), ("r", "1")])?;
        assert_eq!(out[0].value.as_deref(), Some("0"));
        let pins = m.board().pins();
        with_pins(&pins, |p| p.write(4, false))?;
        let out = list(&mut m, &[("i", "3"), ("r", "1")])?;
        assert_eq!(out[0].value.as_deref(), Some("1"));
        Ok(())
    }

    #[test]
    fn writes_drive_actuators_only() -> anyhow::Result<()> {
        let mut m = manager()?;
        let out = list(&mut m, &[("w", "1")])?;
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.value.is_none()));
        assert!(m.control().heater.is_active());
        let pins = m.board().pins();
        assert!(with_pins(&pins, |p| p.read(5))?);
        Ok(())
    }

    #[test]
    fn switch_reads_follow_the_input_level() -> anyhow::Result<()> {
        let pins = Rc::new(RefCell::new(MockPins::new()));
        let board = Board::new(BoardConfig::shield_rev_c(), pins.clone());
        let mut m = DeviceManager::new(board, MemoryStore::new());
        let patch = [("i", "1"), ("c", "1"), ("f", "1"), ("h", "1"), ("p", "4")];
        anyhow::ensure!(m.update_device(&DeviceUpdate::from_pairs(patch))?.accepted());

        let out = list(&mut m, &[("i", "1"), ("r", "1")])?;
        assert_eq!(out[0].value.as_deref(), Some("1"));
        pins.borrow_mut().set_level(4, false);
        let out = list(&mut m, &[("i", "1"), ("r", "1")])?;
        assert_eq!(out[0].value.as_deref(), Some("0"));
        Ok(())
    }
}
