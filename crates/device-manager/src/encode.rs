//! Streaming encoder for the letter-keyed device record format.

use crate::error::Result;
use crate::types::{DeviceConfig, Hardware};
use std::fmt::Write as _;
use std::io::Write;

/// One device as reported by listing or enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// Slot holding the device; `None` for discovered hardware no slot refers to.
    pub slot: Option<usize>,
    pub config: DeviceConfig,
    /// Live reading or state, already formatted.
    pub value: Option<String>,
}

/// Receives records one at a time as they are produced.
pub trait DeviceSink {
    fn emit(&mut self, record: &DeviceRecord) -> Result<()>;
}

impl DeviceSink for Vec<DeviceRecord> {
    fn emit(&mut self, record: &DeviceRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Render a single record, e.g. `{i:0,t:1,c:1,b:1,f:9,h:2,d:0,p:4,a:"28AABBCCDDEEFF00",j:0.000}`.
pub fn format_record(record: &DeviceRecord) -> String {
    let c = &record.config;
    let slot = record.slot.map_or(-1, |s| s as i64);
    let mut out = format!(
        "{{i:{slot},t:{},c:{},b:{},f:{},h:{},d:{},p:{}",
        c.device_type().code(),
        c.chamber,
        c.beer,
        c.function.code(),
        c.hardware.kind().code(),
        u8::from(c.deactivated),
        c.hardware.pin(),
    );
    if let Some(value) = record.value.as_deref().filter(|v| !v.is_empty()) {
        let _ = write!(out, ",v:{value}");
    }
    if let Some(invert) = c.hardware.invert() {
        let _ = write!(out, ",x:{}", u8::from(invert));
    }
    if let Some(address) = c.hardware.address() {
        let _ = write!(out, ",a:\"{address}\"");
    }
    match c.hardware {
        Hardware::OneWireIo { channel, .. } => {
            let _ = write!(out, ",n:{channel}");
        }
        Hardware::OneWireTemp { calibration, .. } => {
            let _ = write!(out, ",j:{calibration}");
        }
        _ => {}
    }
    out.push('}');
    out
}

/// Writes records separated by a newline and comma, framed as `[` … `]` per response.
pub struct DeviceWriter<W: Write> {
    out: W,
    first: bool,
}

impl<W: Write> DeviceWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, first: true }
    }

    /// Start a response.
    pub fn open(&mut self) -> Result<()> {
        self.first = true;
        self.out.write_all(b"[")?;
        Ok(())
    }

    /// End a response and flush it.
    pub fn close(&mut self) -> Result<()> {
        self.out.write_all(b"]\n")?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DeviceSink for DeviceWriter<W> {
    fn emit(&mut self, record: &DeviceRecord) -> Result<()> {
        if !self.first {
            self.out.write_all(b"\n,")?;
        }
        self.first = false;
        self.out.write_all(format_record(record).as_bytes())?;
        Ok(())
    }
}
