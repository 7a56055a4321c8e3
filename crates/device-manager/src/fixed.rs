//! Fixed-point temperatures.
//!
//! Readings are carried with 9 fractional bits (1/512 °C). Probes report 1/16 °C and
//! calibration offsets are stored in the same 1/16 °C steps, so both widen losslessly.

use core::fmt;
use serde::{Deserialize, Serialize};

const FRACTION_BITS: u32 = 9;
const SIXTEENTHS_SHIFT: u32 = FRACTION_BITS - 4;

/// A temperature (or temperature difference) in 1/512 °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature(i32);

impl Temperature {
    pub const fn from_fixed(raw: i32) -> Self {
        Self(raw)
    }

    /// Convert a probe's raw 1/16 °C reading.
    pub fn from_sixteenths(raw: i16) -> Self {
        Self(i32::from(raw) << SIXTEENTHS_SHIFT)
    }

    pub fn fixed(self) -> i32 {
        self.0
    }

    pub fn offset(self, by: TempOffset) -> Self {
        Self(self.0 + Temperature::from(by).0)
    }
}

/// Three decimals, rounded half up on the magnitude.
impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        let mut whole = magnitude >> FRACTION_BITS;
        let mask = (1u32 << FRACTION_BITS) - 1;
        let mut thousandths = ((magnitude & mask) * 1000 + (1 << (FRACTION_BITS - 1))) >> FRACTION_BITS;
        if thousandths >= 1000 {
            whole += 1;
            thousandths -= 1000;
        }
        let sign = if self.0 < 0 && (whole > 0 || thousandths > 0) {
            "-"
        } else {
            ""
        };
        write!(f, "{sign}{whole}.{thousandths:03}")
    }
}

/// Calibration offset for a probe, in 1/16 °C (−8.0 … +7.9375).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempOffset(i8);

impl TempOffset {
    pub const ZERO: TempOffset = TempOffset(0);

    pub const fn from_sixteenths(v: i8) -> Self {
        Self(v)
    }

    pub fn sixteenths(self) -> i8 {
        self.0
    }

    /// Parse a decimal °C string such as `-0.25`. Values outside the representable range
    /// saturate.
    pub fn parse(s: &str) -> Option<Self> {
        let value: f64 = s.trim().parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        let steps = (value * 16.0).round().clamp(f64::from(i8::MIN), f64::from(i8::MAX));
        Some(Self(steps as i8))
    }
}

impl From<TempOffset> for Temperature {
    fn from(o: TempOffset) -> Self {
        Temperature(i32::from(o.0) << SIXTEENTHS_SHIFT)
    }
}

impl fmt::Display for TempOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Temperature::from(*self), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_three_decimals() {
        assert_eq!(Temperature::from_sixteenths(370).to_string(), "23.125");
        assert_eq!(Temperature::from_sixteenths(344).to_string(), "21.500");
        assert_eq!(Temperature::from_sixteenths(0).to_string(), "0.000");
        assert_eq!(Temperature::from_sixteenths(-162).to_string(), "-10.125");
        // 1/512 rounds to two thousandths
        assert_eq!(Temperature::from_fixed(1).to_string(), "0.002");
        assert_eq!(Temperature::from_fixed(-511).to_string(), "-0.998");
    }

    #[test]
    fn offsets_parse_and_render() {
        assert_eq!(TempOffset::parse("-0.25"), Some(TempOffset::from_sixteenths(-4)));
        assert_eq!(TempOffset::parse("1"), Some(TempOffset::from_sixteenths(16)));
        assert_eq!(TempOffset::parse("100"), Some(TempOffset::from_sixteenths(127)));
        assert_eq!(TempOffset::parse("warm"), None);
        assert_eq!(TempOffset::from_sixteenths(-4).to_string(), "-0.250");
        assert_eq!(TempOffset::ZERO.to_string(), "0.000");
    }

    #[test]
    fn calibration_is_added_to_readings() {
        let t = Temperature::from_sixteenths(320).offset(TempOffset::from_sixteenths(-8));
        assert_eq!(t.to_string(), "19.500");
    }
}
