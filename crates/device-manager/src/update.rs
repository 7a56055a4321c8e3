//! Sparse device definition patches and their merge onto a stored record.

use crate::error::ValidationError;
use crate::fixed::TempOffset;
use crate::types::{DeviceConfig, DeviceFunction, DeviceHardware, Hardware};
use io_transport::DeviceAddress;
use tracing::debug;

/// A partial update of one slot; `None` leaves the stored field as it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    pub slot: Option<usize>,
    pub chamber: Option<u8>,
    pub beer: Option<u8>,
    /// Raw function code, checked during merge.
    pub function: Option<u8>,
    /// Raw hardware code, checked during merge.
    pub hardware: Option<u8>,
    pub pin: Option<u8>,
    pub invert: Option<bool>,
    pub channel: Option<u8>,
    pub deactivated: Option<bool>,
    pub calibration: Option<TempOffset>,
    pub address: Option<DeviceAddress>,
}

/// Non-negative integer value, saturated to `u8`. Negative means "unchanged".
fn parse_code(value: &str) -> Option<u8> {
    let n: i64 = value.trim().parse().ok()?;
    (n >= 0).then(|| u8::try_from(n).unwrap_or(u8::MAX))
}

fn parse_flag(value: &str) -> Option<bool> {
    parse_code(value).map(|n| n != 0)
}

/// 16 hex digits; a 0xFF family byte is the "unchanged" marker.
fn parse_address(value: &str) -> Option<DeviceAddress> {
    DeviceAddress::parse_hex(value.trim()).filter(|a| a.family() != 0xFF)
}

impl DeviceUpdate {
    /// Build a patch from single-letter wire keys. Unknown keys and unparsable values
    /// are dropped.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut update = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "i" => {
                    update.slot = value
                        .trim()
                        .parse::<i64>()
                        .ok()
                        .and_then(|n| usize::try_from(n).ok())
                }
                "c" => update.chamber = parse_code(value),
                "b" => update.beer = parse_code(value),
                "f" => update.function = parse_code(value),
                "h" => update.hardware = parse_code(value),
                "p" => update.pin = parse_code(value),
                "x" => update.invert = parse_flag(value),
                "n" => update.channel = parse_code(value),
                "d" => update.deactivated = parse_flag(value),
                "j" => update.calibration = TempOffset::parse(value),
                "a" => update.address = parse_address(value),
                other => debug!(key = other, "ignoring unknown device key"),
            }
        }
        update
    }
}

/// Apply `patch` to `original`. A function of `none` clears the whole record.
pub fn merge(original: &DeviceConfig, patch: &DeviceUpdate) -> Result<DeviceConfig, ValidationError> {
    let function = match patch.function {
        Some(code) => DeviceFunction::from_code(code).ok_or(ValidationError::InvalidFunction(code))?,
        None => original.function,
    };
    if function == DeviceFunction::None {
        return Ok(DeviceConfig::default());
    }

    let kind = match patch.hardware {
        Some(code) => DeviceHardware::from_code(code).ok_or(ValidationError::InvalidHardware(code))?,
        None => original.hardware.kind(),
    };
    let old = &original.hardware;
    let pin = patch.pin.unwrap_or_else(|| old.pin());
    let invert = patch.invert.or_else(|| old.invert()).unwrap_or(false);
    let address = patch.address.or_else(|| old.address()).unwrap_or_default();
    let hardware = match kind {
        DeviceHardware::None => Hardware::None,
        DeviceHardware::Pin => Hardware::Pin { pin, invert },
        DeviceHardware::OneWireTemp => Hardware::OneWireTemp {
            pin,
            address,
            calibration: patch
                .calibration
                .or_else(|| old.calibration())
                .unwrap_or(TempOffset::ZERO),
        },
        DeviceHardware::OneWireIo => Hardware::OneWireIo {
            pin,
            address,
            channel: patch.channel.or_else(|| old.channel()).unwrap_or(0),
            invert,
        },
    };

    Ok(DeviceConfig {
        chamber: patch.chamber.unwrap_or(original.chamber),
        beer: patch.beer.unwrap_or(original.beer),
        function,
        hardware,
        deactivated: patch.deactivated.unwrap_or(original.deactivated),
    })
}
