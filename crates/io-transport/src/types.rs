use core::fmt;
use core::str::FromStr;

/// Family id of DS18B20 temperature probes.
pub const DS18B20_FAMILY_ID: u8 = 0x28;
/// Family id of DS2413 dual-channel addressable switches.
pub const DS2413_FAMILY_ID: u8 = 0x3A;
/// Number of independently addressable channels on a DS2413.
pub const DS2413_CHANNELS: u8 = 2;

/// 64-bit single-wire ROM address: family id, 48-bit serial, CRC-8.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct DeviceAddress(pub [u8; 8]);

impl DeviceAddress {
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// First byte, identifying the hardware sub-kind.
    pub fn family(&self) -> u8 {
        self.0[0]
    }

    pub fn bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// True when the last byte is the Dallas CRC-8 of the first seven.
    pub fn crc_valid(&self) -> bool {
        crc8(&self.0[..7]) == self.0[7]
    }

    /// Parse 16 hex digits (either case). Returns `None` on any other input.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let t = s.trim();
        if t.len() != 16 || !t.is_ascii() {
            return None;
        }
        let mut out = [0u8; 8];
        for (i, b) in out.iter_mut().enumerate() {
            *b = u8::from_str_radix(&t[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(out))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl FromStr for DeviceAddress {
    type Err = crate::TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
            .ok_or_else(|| crate::TransportError::InvalidReading(format!("bad address: {s}")))
    }
}

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for byte in data {
        let mut b = *byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PinMode {
    Input,
    InputPullUp,
    Output,
}

#[derive(Clone, Debug)]
pub struct BusInfo {
    pub pin: u8,
    pub driver: String,
}
