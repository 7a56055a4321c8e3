//! Structural and hardware-compatibility checks for a candidate slot record.

use crate::board::Board;
use crate::error::ValidationError;
use crate::store::{all_devices, DeviceStore};
use crate::types::{is_assignable, DeviceConfig, DeviceOwner, Hardware, MAX_BEERS, MAX_CHAMBERS};
use io_transport::DS2413_CHANNELS;
use serde::{Deserialize, Serialize};

/// Cross-slot uniqueness rules. Turning both off accepts any number of slots sharing a
/// function or a physical location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Reject a second active slot with the same chamber, beer and function.
    pub unique_function: bool,
    /// Reject a second slot on the same pin, probe or switch channel.
    pub unique_location: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            unique_function: true,
            unique_location: true,
        }
    }
}

impl ValidationPolicy {
    pub fn permissive() -> Self {
        Self {
            unique_function: false,
            unique_location: false,
        }
    }
}

/// Device manager settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub validation: ValidationPolicy,
}

/// Check `config` as the new content of `slot`, which currently holds `original`.
///
/// Uniqueness rules only run for the properties the edit actually changes, so records
/// that already clash (written under a permissive policy) can still be edited in other
/// ways.
pub fn is_device_valid<S: DeviceStore + ?Sized>(
    config: &DeviceConfig,
    original: &DeviceConfig,
    slot: usize,
    board: &Board,
    store: &S,
    policy: &ValidationPolicy,
) -> Result<(), ValidationError> {
    if config.chamber > MAX_CHAMBERS {
        return Err(ValidationError::InvalidChamber(config.chamber));
    }
    if config.beer > MAX_BEERS {
        return Err(ValidationError::InvalidBeer(config.beer));
    }

    let owner_ok = match config.function.owner() {
        DeviceOwner::None => config.chamber == 0 && config.beer == 0,
        DeviceOwner::Chamber => config.chamber != 0,
        DeviceOwner::Beer => config.beer != 0,
    };
    if !owner_ok {
        return Err(ValidationError::OwnerMismatch {
            function: config.function,
            chamber: config.chamber,
            beer: config.beer,
        });
    }

    let device_type = config.device_type();
    let hardware = config.hardware.kind();
    if !is_assignable(device_type, hardware) {
        return Err(ValidationError::NotAssignable {
            device_type,
            hardware,
        });
    }

    if let Hardware::OneWireIo { channel, .. } = config.hardware {
        if channel >= DS2413_CHANNELS {
            return Err(ValidationError::InvalidChannel(channel));
        }
    }

    if hardware.is_one_wire() && board.one_wire_bus(config.hardware.pin()).is_none() {
        return Err(ValidationError::NoBusOnPin(config.hardware.pin()));
    }

    if config.is_empty() {
        return Ok(());
    }

    let others = all_devices(store).filter(|(s, c)| *s != slot && !c.is_empty());

    let role_changed = (config.chamber, config.beer, config.function)
        != (original.chamber, original.beer, original.function)
        || (original.deactivated && !config.deactivated);
    // records without hardware have no location to share
    let location_changed = config.hardware != Hardware::None
        && !config.hardware.same_location(&original.hardware);

    for (other_slot, other) in others {
        if policy.unique_function
            && role_changed
            && !config.deactivated
            && !other.deactivated
            && (other.chamber, other.beer, other.function)
                == (config.chamber, config.beer, config.function)
        {
            return Err(ValidationError::DuplicateFunction {
                function: config.function,
                slot: other_slot,
            });
        }
        if policy.unique_location && location_changed && other.hardware.same_location(&config.hardware)
        {
            return Err(match config.hardware.address() {
                Some(address) => ValidationError::DuplicateAddress {
                    address,
                    slot: other_slot,
                },
                None => ValidationError::DuplicatePin {
                    pin: config.hardware.pin(),
                    slot: other_slot,
                },
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardConfig;
    use crate::fixed::TempOffset;
    use crate::store::MemoryStore;
    use crate::types::DeviceFunction;
    use io_transport::DeviceAddress;

    const PROBE: DeviceAddress = DeviceAddress::new([0x28, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00]);

    fn board() -> anyhow::Result<Board> {
        Ok(Board::mock(BoardConfig::shield_rev_c())?)
    }

    fn beer_probe(pin: u8) -> DeviceConfig {
        DeviceConfig {
            chamber: 1,
            beer: 1,
            function: DeviceFunction::BeerTemp,
            hardware: Hardware::OneWireTemp {
                pin,
                address: PROBE,
                calibration: TempOffset::ZERO,
            },
            deactivated: false,
        }
    }

    fn heater(pin: u8) -> DeviceConfig {
        DeviceConfig {
            chamber: 1,
            beer: 0,
            function: DeviceFunction::ChamberHeat,
            hardware: Hardware::Pin { pin, invert: false },
            deactivated: false,
        }
    }

    fn check(config: &DeviceConfig, store: &MemoryStore, policy: ValidationPolicy) -> anyhow::Result<Result<(), ValidationError>> {
        Ok(is_device_valid(
            config,
            &DeviceConfig::default(),
            0,
            &board()?,
            store,
            &policy,
        ))
    }

    #[test]
    fn accepts_well_formed_records() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        assert_eq!(check(&beer_probe(18), &store, ValidationPolicy::default())?, Ok(()));
        assert_eq!(check(&heater(5), &store, ValidationPolicy::default())?, Ok(()));
        assert_eq!(check(&DeviceConfig::default(), &store, ValidationPolicy::default())?, Ok(()));
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_scopes() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let mut c = beer_probe(18);
        c.chamber = MAX_CHAMBERS + 1;
        assert_eq!(
            check(&c, &store, ValidationPolicy::default())?,
            Err(ValidationError::InvalidChamber(MAX_CHAMBERS + 1))
        );
        let mut c = beer_probe(18);
        c.beer = MAX_BEERS + 1;
        assert_eq!(
            check(&c, &store, ValidationPolicy::default())?,
            Err(ValidationError::InvalidBeer(MAX_BEERS + 1))
        );
        Ok(())
    }

    #[test]
    fn rejects_owner_mismatch() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let mut c = beer_probe(18);
        c.beer = 0;
        assert!(matches!(
            check(&c, &store, ValidationPolicy::default())?,
            Err(ValidationError::OwnerMismatch { .. })
        ));
        let mut c = heater(5);
        c.chamber = 0;
        assert!(matches!(
            check(&c, &store, ValidationPolicy::default())?,
            Err(ValidationError::OwnerMismatch { .. })
        ));
        let c = DeviceConfig {
            chamber: 1,
            ..DeviceConfig::default()
        };
        assert!(matches!(
            check(&c, &store, ValidationPolicy::default())?,
            Err(ValidationError::OwnerMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_type_hardware_mismatch() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let mut c = beer_probe(18);
        c.function = DeviceFunction::ChamberHeat;
        c.beer = 0;
        assert!(matches!(
            check(&c, &store, ValidationPolicy::default())?,
            Err(ValidationError::NotAssignable { .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_one_wire_pin_without_bus() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        assert_eq!(
            check(&beer_probe(4), &store, ValidationPolicy::default())?,
            Err(ValidationError::NoBusOnPin(4))
        );
        let mut c = heater(5);
        c.hardware = Hardware::OneWireIo {
            pin: 18,
            address: DeviceAddress::new([0x3A, 1, 2, 3, 4, 5, 6, 7]),
            channel: 2,
            invert: false,
        };
        assert_eq!(
            check(&c, &store, ValidationPolicy::default())?,
            Err(ValidationError::InvalidChannel(2))
        );
        Ok(())
    }

    #[test]
    fn duplicates_depend_on_policy() -> anyhow::Result<()> {
        let mut store = MemoryStore::new();
        store.store(3, &heater(5))?;

        assert_eq!(
            check(&heater(6), &store, ValidationPolicy::default())?,
            Err(ValidationError::DuplicateFunction {
                function: DeviceFunction::ChamberHeat,
                slot: 3
            })
        );
        let mut cooler = heater(5);
        cooler.function = DeviceFunction::ChamberCool;
        assert_eq!(
            check(&cooler, &store, ValidationPolicy::default())?,
            Err(ValidationError::DuplicatePin { pin: 5, slot: 3 })
        );
        assert_eq!(check(&heater(5), &store, ValidationPolicy::permissive())?, Ok(()));
        Ok(())
    }

    #[test]
    fn records_without_hardware_never_clash_on_location() -> anyhow::Result<()> {
        let board = board()?;
        let mut store = MemoryStore::new();
        let gravity = DeviceConfig {
            chamber: 0,
            beer: 1,
            function: DeviceFunction::BeerGravity,
            hardware: Hardware::None,
            deactivated: false,
        };
        store.store(0, &gravity)?;
        store.store(1, &heater(5))?;

        let reserved = DeviceConfig {
            chamber: 1,
            beer: 0,
            function: DeviceFunction::ChamberReserved,
            hardware: Hardware::None,
            deactivated: false,
        };
        let policy = ValidationPolicy::default();
        assert_eq!(is_device_valid(&reserved, &heater(5), 1, &board, &store, &policy), Ok(()));
        Ok(())
    }

    #[test]
    fn the_edited_slot_and_deactivated_slots_do_not_clash() -> anyhow::Result<()> {
        let board = board()?;
        let mut store = MemoryStore::new();
        store.store(3, &heater(5))?;
        let mut edited = heater(5);
        edited.hardware = Hardware::Pin {
            pin: 5,
            invert: true,
        };
        let policy = ValidationPolicy::default();
        assert_eq!(is_device_valid(&edited, &heater(5), 3, &board, &store, &policy), Ok(()));

        let mut parked = heater(6);
        parked.deactivated = true;
        store.store(4, &parked)?;
        assert_eq!(
            is_device_valid(&heater(7), &DeviceConfig::default(), 0, &board, &store, &policy),
            Err(ValidationError::DuplicateFunction {
                function: DeviceFunction::ChamberHeat,
                slot: 3
            })
        );
        store.store(3, &DeviceConfig::default())?;
        assert_eq!(
            is_device_valid(&heater(7), &DeviceConfig::default(), 0, &board, &store, &policy),
            Ok(())
        );
        Ok(())
    }
}
