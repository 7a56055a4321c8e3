use crate::board::BoardConfig;
use crate::error::{DeviceError, Result};
use crate::store::{DeviceStore, MemoryStore};
use crate::types::DeviceConfig;
use crate::validate::ManagerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, info};

const SLOT_TABLE_FORMAT: &str = "fc-slots";
const SLOT_TABLE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SlotTableFile {
    format: String,
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<String>,
    #[serde(default)]
    slots: Vec<DeviceConfig>,
}

/// Slot table persisted as a YAML file; every store rewrites the file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: MemoryStore,
}

impl FileStore {
    /// Open `path`, starting from an empty table if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let table = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let file: SlotTableFile = serde_yaml::from_str(&raw)?;
            if file.format != SLOT_TABLE_FORMAT || file.version != SLOT_TABLE_VERSION {
                return Err(DeviceError::Format(format!(
                    "{}: expected {SLOT_TABLE_FORMAT} v{SLOT_TABLE_VERSION}, found {} v{}",
                    path.display(),
                    file.format,
                    file.version
                )));
            }
            debug!(path = %path.display(), n = file.slots.len(), "loaded slot table");
            MemoryStore::from_slots(file.slots)?
        } else {
            info!(path = %path.display(), "no slot table yet, starting empty");
            MemoryStore::new()
        };
        Ok(Self { path, table })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        let saved_at = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .ok();
        let file = SlotTableFile {
            format: SLOT_TABLE_FORMAT.to_string(),
            version: SLOT_TABLE_VERSION,
            saved_at,
            slots: self.table.slots().to_vec(),
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_yaml::to_string(&file)?)?;
        Ok(())
    }
}

impl DeviceStore for FileStore {
    fn capacity(&self) -> usize {
        self.table.capacity()
    }

    fn fetch(&self, slot: usize) -> Option<DeviceConfig> {
        self.table.fetch(slot)
    }

    fn store(&mut self, slot: usize, config: &DeviceConfig) -> Result<()> {
        self.table.store(slot, config)?;
        self.save()
    }

    fn clear(&mut self) -> Result<()> {
        self.table = MemoryStore::new();
        self.save()
    }
}

pub fn load_board_file(path: impl AsRef<Path>) -> Result<BoardConfig> {
    let raw = fs::read_to_string(path.as_ref())?;
    Ok(serde_yaml::from_str(&raw)?)
}

pub fn load_manager_config(path: impl AsRef<Path>) -> Result<ManagerConfig> {
    let raw = fs::read_to_string(path.as_ref())?;
    Ok(serde_yaml::from_str(&raw)?)
}
