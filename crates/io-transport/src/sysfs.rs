use crate::{crc8, BusInfo, DeviceAddress, DigitalPins, OneWireBus, PinMode, Result, TransportError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where the Linux w1 subsystem exposes slave devices.
pub const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";
/// Legacy sysfs GPIO class directory.
pub const GPIO_CLASS_DIR: &str = "/sys/class/gpio";

/// Single-wire bus backed by the Linux `w1` kernel drivers (`w1-gpio`, `w1_therm`,
/// `w1_ds2413`). Each slave shows up as a `<family>-<serial>` directory.
pub struct W1SysfsBus {
    pin: u8,
    root: PathBuf,
    found: Vec<DeviceAddress>,
    cursor: usize,
}

impl W1SysfsBus {
    pub fn open(pin: u8) -> Self {
        Self::with_root(pin, W1_DEVICES_DIR)
    }

    /// Use an alternative devices directory (useful for fixtures).
    pub fn with_root(pin: u8, root: impl AsRef<Path>) -> Self {
        Self {
            pin,
            root: root.as_ref().to_path_buf(),
            found: Vec::new(),
            cursor: 0,
        }
    }

    fn scan(&self) -> Result<Vec<DeviceAddress>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(addr) = name.to_str().and_then(address_from_slave_name) {
                out.push(addr);
            }
        }
        out.sort_by_key(|a| a.0);
        Ok(out)
    }

    fn slave_dir(&self, address: &DeviceAddress) -> PathBuf {
        self.root.join(slave_name(address))
    }
}

impl OneWireBus for W1SysfsBus {
    fn pin(&self) -> u8 {
        self.pin
    }

    fn info(&self) -> BusInfo {
        BusInfo {
            pin: self.pin,
            driver: format!("w1-sysfs:{}", self.root.display()),
        }
    }

    fn reset_search(&mut self) {
        self.cursor = 0;
        self.found = match self.scan() {
            Ok(found) => found,
            Err(e) => {
                warn!(pin = self.pin, root = %self.root.display(), "w1 scan failed: {e}");
                Vec::new()
            }
        };
        debug!(pin = self.pin, n = self.found.len(), "w1 scan");
    }

    fn search(&mut self) -> Option<DeviceAddress> {
        let next = self.found.get(self.cursor).copied();
        if next.is_some() {
            self.cursor += 1;
        }
        next
    }

    fn read_temperature(&mut self, address: &DeviceAddress) -> Result<i16> {
        let path = self.slave_dir(address).join("w1_slave");
        let raw = fs::read_to_string(&path)
            .map_err(|_| TransportError::NotPresent(address.to_string()))?;
        parse_w1_slave(&raw).ok_or_else(|| TransportError::Crc(address.to_string()))
    }

    fn read_channel(&mut self, address: &DeviceAddress, channel: u8) -> Result<bool> {
        if channel > 1 {
            return Err(TransportError::InvalidReading(format!("channel {channel}")));
        }
        let state = read_state(&self.slave_dir(address))?;
        Ok(state & (1 << (channel * 2)) != 0)
    }

    fn write_channel(&mut self, address: &DeviceAddress, channel: u8, on: bool) -> Result<()> {
        if channel > 1 {
            return Err(TransportError::InvalidReading(format!("channel {channel}")));
        }
        let dir = self.slave_dir(address);
        let state = read_state(&dir)?;
        // latch bits read back at 1 and 3; a cleared latch bit switches the output on
        let mut latches = ((state >> 1) & 0x01) | ((state >> 2) & 0x02);
        if on {
            latches &= !(1 << channel);
        } else {
            latches |= 1 << channel;
        }
        fs::write(dir.join("output"), [0xFC | latches])?;
        Ok(())
    }
}

/// Digital pins through the legacy `/sys/class/gpio` interface. Board pin numbers are
/// used as GPIO line numbers.
pub struct SysfsPins {
    root: PathBuf,
}

impl SysfsPins {
    pub fn open() -> Self {
        Self::with_root(GPIO_CLASS_DIR)
    }

    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn line_dir(&self, pin: u8) -> Result<PathBuf> {
        let dir = self.root.join(format!("gpio{pin}"));
        if !dir.exists() {
            fs::write(self.root.join("export"), pin.to_string())?;
        }
        Ok(dir)
    }
}

impl DigitalPins for SysfsPins {
    fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        let dir = self.line_dir(pin)?;
        let direction = match mode {
            PinMode::Output => "out",
            // pull-ups are configured in the device tree, not through sysfs
            PinMode::Input | PinMode::InputPullUp => "in",
        };
        fs::write(dir.join("direction"), direction)?;
        Ok(())
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<()> {
        let dir = self.line_dir(pin)?;
        fs::write(dir.join("value"), if high { "1" } else { "0" })?;
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<bool> {
        let dir = self.line_dir(pin)?;
        let raw = fs::read_to_string(dir.join("value"))?;
        Ok(raw.trim() == "1")
    }
}

fn read_state(dir: &Path) -> Result<u8> {
    let bytes = fs::read(dir.join("state"))?;
    bytes
        .first()
        .copied()
        .ok_or_else(|| TransportError::InvalidReading("empty state".to_string()))
}

/// `28-0000075e1b2f` -> full ROM with computed CRC.
fn address_from_slave_name(name: &str) -> Option<DeviceAddress> {
    let (family, serial) = name.split_once('-')?;
    if family.len() != 2 || serial.len() != 12 {
        return None;
    }
    let family = u8::from_str_radix(family, 16).ok()?;
    let serial = u64::from_str_radix(serial, 16).ok()?;
    let mut rom = [0u8; 8];
    rom[0] = family;
    rom[1..7].copy_from_slice(&serial.to_le_bytes()[..6]);
    rom[7] = crc8(&rom[..7]);
    Some(DeviceAddress::new(rom))
}

fn slave_name(address: &DeviceAddress) -> String {
    let b = address.bytes();
    let mut serial = [0u8; 8];
    serial[..6].copy_from_slice(&b[1..7]);
    format!("{:02x}-{:012x}", b[0], u64::from_le_bytes(serial))
}

/// Raw 1/16 °C from a `w1_slave` dump, `None` unless the CRC line says `YES`.
fn parse_w1_slave(raw: &str) -> Option<i16> {
    let mut lines = raw.lines();
    if !lines.next()?.trim_end().ends_with("YES") {
        return None;
    }
    let milli: i64 = lines.next()?.rsplit_once("t=")?.1.trim().parse().ok()?;
    let sixteenths = (milli * 16 + milli.signum() * 500) / 1000;
    i16::try_from(sixteenths).ok()
}
