use crate::types::{DeviceFunction, DeviceHardware, DeviceType};
use io_transport::{DeviceAddress, TransportError};
use thiserror::Error;

pub type Result<T, E = DeviceError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("slot {0} is out of range")]
    SlotOutOfRange(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("malformed request: {0}")]
    Request(String),
    #[error("unsupported slot table: {0}")]
    Format(String),
    #[error("metrics: {0}")]
    Metrics(String),
}

/// Why a candidate device definition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid chamber id {0}")]
    InvalidChamber(u8),
    #[error("invalid beer id {0}")]
    InvalidBeer(u8),
    #[error("invalid device function {0}")]
    InvalidFunction(u8),
    #[error("invalid device hardware {0}")]
    InvalidHardware(u8),
    #[error("function {function:?} does not fit chamber={chamber} beer={beer}")]
    OwnerMismatch {
        function: DeviceFunction,
        chamber: u8,
        beer: u8,
    },
    #[error("cannot assign device type {device_type:?} to hardware {hardware:?}")]
    NotAssignable {
        device_type: DeviceType,
        hardware: DeviceHardware,
    },
    #[error("channel {0} does not exist on the switch")]
    InvalidChannel(u8),
    #[error("pin {0} is not configured as a one-wire bus")]
    NoBusOnPin(u8),
    #[error("function {function:?} is already defined in slot {slot}")]
    DuplicateFunction { function: DeviceFunction, slot: usize },
    #[error("pin {pin} is already used by slot {slot}")]
    DuplicatePin { pin: u8, slot: usize },
    #[error("device {address} is already used by slot {slot}")]
    DuplicateAddress { address: DeviceAddress, slot: usize },
}
