//! The persisted slot table.

use crate::error::{DeviceError, Result};
use crate::types::{DeviceConfig, MAX_DEVICE_SLOT};

/// Fixed-size table of device records addressed by slot index.
pub trait DeviceStore {
    fn capacity(&self) -> usize {
        MAX_DEVICE_SLOT
    }

    /// The record in `slot`, or `None` past the end of the table.
    fn fetch(&self, slot: usize) -> Option<DeviceConfig>;

    /// Overwrite the record in `slot`.
    fn store(&mut self, slot: usize, config: &DeviceConfig) -> Result<()>;

    /// Reset every slot to the empty record.
    fn clear(&mut self) -> Result<()> {
        for slot in 0..self.capacity() {
            self.store(slot, &DeviceConfig::default())?;
        }
        Ok(())
    }
}

/// Every `(slot, record)` in table order; stops at the first slot `fetch` refuses.
pub fn all_devices<S: DeviceStore + ?Sized>(store: &S) -> impl Iterator<Item = (usize, DeviceConfig)> + '_ {
    (0..).map_while(move |slot| store.fetch(slot).map(|c| (slot, c)))
}

/// Slot table held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStore {
    slots: Vec<DeviceConfig>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_DEVICE_SLOT)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![DeviceConfig::default(); capacity],
        }
    }

    /// Build from existing records, padding to the full table size.
    pub fn from_slots(mut slots: Vec<DeviceConfig>) -> Result<Self> {
        if slots.len() > MAX_DEVICE_SLOT {
            return Err(DeviceError::Format(format!(
                "{} slots exceeds the table size {MAX_DEVICE_SLOT}",
                slots.len()
            )));
        }
        slots.resize(MAX_DEVICE_SLOT, DeviceConfig::default());
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[DeviceConfig] {
        &self.slots
    }
}

impl DeviceStore for MemoryStore {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn fetch(&self, slot: usize) -> Option<DeviceConfig> {
        self.slots.get(slot).copied()
    }

    fn store(&mut self, slot: usize, config: &DeviceConfig) -> Result<()> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(DeviceError::SlotOutOfRange(slot))?;
        *entry = *config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::TempOffset;
    use crate::types::{DeviceFunction, Hardware};
    use io_transport::DeviceAddress;

    fn probe() -> DeviceConfig {
        DeviceConfig {
            chamber: 1,
            beer: 1,
            function: DeviceFunction::BeerTemp,
            hardware: Hardware::OneWireTemp {
                pin: 4,
                address: DeviceAddress::new([0x28, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00]),
                calibration: TempOffset::from_sixteenths(3),
            },
            deactivated: true,
        }
    }

    #[test]
    fn stored_records_fetch_back_unchanged() -> anyhow::Result<()> {
        let mut store = MemoryStore::new();
        for slot in [0, 7, MAX_DEVICE_SLOT - 1] {
            store.store(slot, &probe())?;
            assert_eq!(store.fetch(slot), Some(probe()));
        }
        Ok(())
    }

    #[test]
    fn out_of_range_slots_are_refused() {
        let mut store = MemoryStore::new();
        assert!(store.fetch(MAX_DEVICE_SLOT).is_none());
        assert!(matches!(
            store.store(MAX_DEVICE_SLOT, &probe()),
            Err(DeviceError::SlotOutOfRange(_))
        ));
    }

    #[test]
    fn iteration_terminates_at_table_end() -> anyhow::Result<()> {
        let mut store = MemoryStore::new();
        store.store(2, &probe())?;
        let all: Vec<_> = all_devices(&store).collect();
        assert_eq!(all.len(), MAX_DEVICE_SLOT);
        assert_eq!(all[2].1, probe());
        store.clear()?;
        assert!(all_devices(&store).all(|(_, c)| c.is_empty()));
        Ok(())
    }

    #[test]
    fn oversized_tables_are_rejected() {
        let slots = vec![DeviceConfig::default(); MAX_DEVICE_SLOT + 1];
        assert!(MemoryStore::from_slots(slots).is_err());
    }
}
