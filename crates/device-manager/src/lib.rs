//! device-manager: persisted mapping of fermentation controller hardware to control-loop roles
//!
//! Slots in a fixed-size table describe which physical device (a digital pin, a
//! single-wire temperature probe, or one channel of a single-wire switch) serves which
//! logical function. The manager validates and commits sparse updates to that table,
//! creates and binds device instances into the control loop's targets, discovers attached
//! hardware, and renders all of it in the letter-keyed line protocol.

mod types;
pub use types::*;

mod fixed;
pub use fixed::{TempOffset, Temperature};

mod error;
pub use error::{DeviceError, Result, ValidationError};

mod devices;
pub use devices::{
    Actuator, BasicTempSensor, Binding, DeviceInstance, DigitalPinActuator, DigitalPinSensor,
    OneWireActuator, OneWireSwitchSensor, OneWireTempSensor, SwitchSensor,
};

mod control;
pub use control::{device_target, TempControl, TempSensorAdapter, Target};

mod board;
pub use board::{Board, BoardConfig, MockDeviceSpec};

mod store;
pub use store::{all_devices, DeviceStore, MemoryStore};

mod loader;
pub use loader::{load_board_file, load_manager_config, FileStore};

mod validate;
pub use validate::{is_device_valid, ManagerConfig, ValidationPolicy};

mod update;
pub use update::{merge, DeviceUpdate};

mod manager;
pub use manager::{DeviceManager, UpdateOutcome};

mod enumerate;
pub use enumerate::{classify, HardwareQuery};

mod listing;
pub use listing::DisplayQuery;

mod encode;
pub use encode::{format_record, DeviceRecord, DeviceSink, DeviceWriter};

mod decode;
pub use decode::{parse_command, request_pairs, Command};

mod metrics;
pub use metrics::{DeviceMetrics, MetricsHub};
