use crate::fixed::TempOffset;
use io_transport::DeviceAddress;
use serde::{Deserialize, Serialize};

/// Number of persisted device slots.
pub const MAX_DEVICE_SLOT: usize = 16;
/// Highest chamber id accepted by validation.
pub const MAX_CHAMBERS: u8 = 4;
/// Highest beer id accepted by validation.
pub const MAX_BEERS: u8 = 6;

/// Logical role a device plays in the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeviceFunction {
    #[default]
    None = 0,
    ChamberDoor = 1,
    ChamberHeat = 2,
    ChamberCool = 3,
    ChamberLight = 4,
    ChamberTemp = 5,
    ChamberRoomTemp = 6,
    ChamberFan = 7,
    ChamberReserved = 8,
    BeerTemp = 9,
    BeerTemp2 = 10,
    BeerHeat = 11,
    BeerCool = 12,
    BeerGravity = 13,
    BeerReserved1 = 14,
    BeerReserved2 = 15,
}

impl DeviceFunction {
    pub const ALL: [DeviceFunction; 16] = [
        DeviceFunction::None,
        DeviceFunction::ChamberDoor,
        DeviceFunction::ChamberHeat,
        DeviceFunction::ChamberCool,
        DeviceFunction::ChamberLight,
        DeviceFunction::ChamberTemp,
        DeviceFunction::ChamberRoomTemp,
        DeviceFunction::ChamberFan,
        DeviceFunction::ChamberReserved,
        DeviceFunction::BeerTemp,
        DeviceFunction::BeerTemp2,
        DeviceFunction::BeerHeat,
        DeviceFunction::BeerCool,
        DeviceFunction::BeerGravity,
        DeviceFunction::BeerReserved1,
        DeviceFunction::BeerReserved2,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub fn device_type(self) -> DeviceType {
        device_type(self)
    }

    pub fn owner(self) -> DeviceOwner {
        device_owner(self)
    }
}

/// Coarse capability category derived from a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceType {
    None = 0,
    TempSensor = 1,
    SwitchSensor = 2,
    SwitchActuator = 3,
}

impl DeviceType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Which scope a function belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOwner {
    None,
    Chamber,
    Beer,
}

/// Physical connection technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeviceHardware {
    #[default]
    None = 0,
    Pin = 1,
    OneWireTemp = 2,
    OneWireIo = 3,
}

impl DeviceHardware {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DeviceHardware::None),
            1 => Some(DeviceHardware::Pin),
            2 => Some(DeviceHardware::OneWireTemp),
            3 => Some(DeviceHardware::OneWireIo),
            _ => None,
        }
    }

    pub fn is_one_wire(self) -> bool {
        matches!(self, DeviceHardware::OneWireTemp | DeviceHardware::OneWireIo)
    }

    pub fn is_digital_pin(self) -> bool {
        self == DeviceHardware::Pin
    }
}

pub fn device_type(function: DeviceFunction) -> DeviceType {
    use DeviceFunction::*;
    match function {
        ChamberDoor => DeviceType::SwitchSensor,
        ChamberHeat | ChamberCool | ChamberLight | ChamberFan | BeerHeat | BeerCool => {
            DeviceType::SwitchActuator
        }
        ChamberTemp | ChamberRoomTemp | BeerTemp | BeerTemp2 => DeviceType::TempSensor,
        None | ChamberReserved | BeerGravity | BeerReserved1 | BeerReserved2 => DeviceType::None,
    }
}

pub fn device_owner(function: DeviceFunction) -> DeviceOwner {
    match function.code() {
        0 => DeviceOwner::None,
        1..=8 => DeviceOwner::Chamber,
        _ => DeviceOwner::Beer,
    }
}

/// Whether hardware of kind `hardware` can serve a device of type `device_type`.
pub fn is_assignable(device_type: DeviceType, hardware: DeviceHardware) -> bool {
    use DeviceHardware as H;
    match device_type {
        DeviceType::None => hardware == H::None,
        DeviceType::TempSensor => hardware == H::OneWireTemp,
        DeviceType::SwitchActuator | DeviceType::SwitchSensor => {
            matches!(hardware, H::Pin | H::OneWireIo)
        }
    }
}

/// Hardware descriptor; each kind carries only the fields meaningful to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hardware {
    #[default]
    None,
    Pin {
        pin: u8,
        #[serde(default)]
        invert: bool,
    },
    OneWireTemp {
        pin: u8,
        #[serde(with = "address_hex")]
        address: DeviceAddress,
        #[serde(default)]
        calibration: TempOffset,
    },
    OneWireIo {
        pin: u8,
        #[serde(with = "address_hex")]
        address: DeviceAddress,
        channel: u8,
        #[serde(default)]
        invert: bool,
    },
}

impl Hardware {
    pub fn kind(&self) -> DeviceHardware {
        match self {
            Hardware::None => DeviceHardware::None,
            Hardware::Pin { .. } => DeviceHardware::Pin,
            Hardware::OneWireTemp { .. } => DeviceHardware::OneWireTemp,
            Hardware::OneWireIo { .. } => DeviceHardware::OneWireIo,
        }
    }

    pub fn pin(&self) -> u8 {
        match self {
            Hardware::None => 0,
            Hardware::Pin { pin, .. }
            | Hardware::OneWireTemp { pin, .. }
            | Hardware::OneWireIo { pin, .. } => *pin,
        }
    }

    pub fn invert(&self) -> Option<bool> {
        match self {
            Hardware::Pin { invert, .. } | Hardware::OneWireIo { invert, .. } => Some(*invert),
            _ => None,
        }
    }

    pub fn address(&self) -> Option<DeviceAddress> {
        match self {
            Hardware::OneWireTemp { address, .. } | Hardware::OneWireIo { address, .. } => {
                Some(*address)
            }
            _ => None,
        }
    }

    pub fn channel(&self) -> Option<u8> {
        match self {
            Hardware::OneWireIo { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    pub fn calibration(&self) -> Option<TempOffset> {
        match self {
            Hardware::OneWireTemp { calibration, .. } => Some(*calibration),
            _ => None,
        }
    }

    /// Whether two descriptors name the same physical location: pin for plain pins,
    /// pin and address for probes, pin, address and channel for multi-channel switches.
    pub fn same_location(&self, other: &Hardware) -> bool {
        match (self, other) {
            (Hardware::Pin { pin: a, .. }, Hardware::Pin { pin: b, .. }) => a == b,
            (
                Hardware::OneWireTemp {
                    pin: a,
                    address: x,
                    ..
                },
                Hardware::OneWireTemp {
                    pin: b,
                    address: y,
                    ..
                },
            ) => a == b && x == y,
            (
                Hardware::OneWireIo {
                    pin: a,
                    address: x,
                    channel: m,
                    ..
                },
                Hardware::OneWireIo {
                    pin: b,
                    address: y,
                    channel: n,
                    ..
                },
            ) => a == b && x == y && m == n,
            (Hardware::None, Hardware::None) => true,
            _ => false,
        }
    }
}

/// A persisted device slot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub chamber: u8,
    #[serde(default)]
    pub beer: u8,
    #[serde(default)]
    pub function: DeviceFunction,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub deactivated: bool,
}

impl DeviceConfig {
    pub fn device_type(&self) -> DeviceType {
        device_type(self.function)
    }

    pub fn is_empty(&self) -> bool {
        self.function == DeviceFunction::None
    }
}

mod address_hex {
    use io_transport::DeviceAddress;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(addr: &DeviceAddress, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(addr)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DeviceAddress, D::Error> {
        let raw = String::deserialize(d)?;
        DeviceAddress::parse_hex(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid device address: {raw}")))
    }
}
