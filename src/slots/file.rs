//! Directory-backed slot storage.
//!
//! Each slot lives in `<dir>/<key>.slot`: one header line
//! `SLOT <version> <crc32>` followed by the raw value. Writes go through a
//! temporary file and a rename so a crash never leaves a torn slot.

use super::SlotStore;
use crate::error::{CaptureError, Result};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic word opening every slot file.
const SLOT_MAGIC: &str = "SLOT";

/// Current slot file format version.
const SLOT_VERSION: u8 = 1;

/// File slot configuration.
#[derive(Clone, Debug)]
pub struct FileSlotsConfig {
    /// Directory holding the slot files.
    pub path: PathBuf,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileSlotsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./capture-data"),
            create_if_missing: true,
        }
    }
}

/// Slots stored as checksummed files in a locked directory.
pub struct FileSlots {
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FileSlots {
    /// Open (or create) the slot directory and take its lock.
    pub fn open(config: FileSlotsConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(CaptureError::NotInitialized);
            }
            fs::create_dir_all(&config.path)?;
        }

        let lock_file = Self::acquire_lock(&config.path)?;
        debug!(path = %config.path.display(), "opened slot directory");

        Ok(Self {
            path: config.path,
            _lock_file: lock_file,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the slot files.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| CaptureError::Locked)?;

        Ok(lock_file)
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(CaptureError::InvalidFormat(format!(
                "invalid slot key: {:?}",
                key
            )));
        }
        Ok(self.path.join(format!("{}.slot", key)))
    }

    fn encode_slot(value: &str) -> String {
        let checksum = crc32fast::hash(value.as_bytes());
        format!(
            "{} {} {}\n{}",
            SLOT_MAGIC,
            SLOT_VERSION,
            hex::encode(checksum.to_be_bytes()),
            value
        )
    }

    fn decode_slot(contents: &str) -> Result<String> {
        let (header, value) = contents
            .split_once('\n')
            .ok_or_else(|| CaptureError::InvalidFormat("missing slot header".into()))?;

        let mut fields = header.split(' ');
        if fields.next() != Some(SLOT_MAGIC) {
            return Err(CaptureError::InvalidFormat("invalid slot magic".into()));
        }

        let version = fields.next().unwrap_or_default();
        if version != SLOT_VERSION.to_string() {
            return Err(CaptureError::InvalidFormat(format!(
                "unsupported slot version: {}",
                version
            )));
        }

        let expected = fields
            .next()
            .and_then(|h| hex::decode(h).ok())
            .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
            .map(u32::from_be_bytes)
            .ok_or_else(|| CaptureError::InvalidFormat("invalid slot checksum".into()))?;

        let got = crc32fast::hash(value.as_bytes());
        if got != expected {
            return Err(CaptureError::ChecksumMismatch { expected, got });
        }

        Ok(value.to_string())
    }
}

impl SlotStore for FileSlots {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::decode_slot(&contents).map(Some)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.slot_path(key)?;
        let tmp_path = path.with_extension("slot.tmp");
        let _guard = self.write_lock.lock();

        let mut file = File::create(&tmp_path)?;
        file.write_all(Self::encode_slot(value).as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.slot_path(key)?;
        let _guard = self.write_lock.lock();

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_slots(dir: &TempDir) -> FileSlots {
        FileSlots::open(FileSlotsConfig {
            path: dir.path().join("slots"),
            create_if_missing: true,
        })
        .unwrap()
    }

    #[test]
    fn test_set_get_remove() {
        let dir = TempDir::new().unwrap();
        let slots = open_slots(&dir);

        assert_eq!(slots.get("capture.records.v1").unwrap(), None);
        slots.set("capture.records.v1", "[]").unwrap();
        assert_eq!(
            slots.get("capture.records.v1").unwrap().as_deref(),
            Some("[]")
        );

        slots.remove("capture.records.v1").unwrap();
        assert_eq!(slots.get("capture.records.v1").unwrap(), None);
        slots.remove("capture.records.v1").unwrap();
    }

    #[test]
    fn test_value_with_newlines_survives() {
        let dir = TempDir::new().unwrap();
        let slots = open_slots(&dir);

        let value = "line one\nline two\n\nSLOT 1 deadbeef\n";
        slots.set("k", value).unwrap();
        assert_eq!(slots.get("k").unwrap().as_deref(), Some(value));
    }

    #[test]
    fn test_values_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let slots = open_slots(&dir);
            slots.set("k", "kept").unwrap();
        }
        let slots = open_slots(&dir);
        assert_eq!(slots.get("k").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _first = open_slots(&dir);

        let second = FileSlots::open(FileSlotsConfig {
            path: dir.path().join("slots"),
            create_if_missing: true,
        });
        assert!(matches!(second, Err(CaptureError::Locked)));
    }

    #[test]
    fn test_missing_directory_without_create() {
        let dir = TempDir::new().unwrap();
        let result = FileSlots::open(FileSlotsConfig {
            path: dir.path().join("absent"),
            create_if_missing: false,
        });
        assert!(matches!(result, Err(CaptureError::NotInitialized)));
    }

    #[test]
    fn test_tampered_value_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let slots = open_slots(&dir);
        slots.set("k", "original").unwrap();

        let path = slots.path().join("k.slot");
        let contents = fs::read_to_string(&path).unwrap();
        fs::write(&path, contents.replace("original", "modified")).unwrap();

        assert!(matches!(
            slots.get("k"),
            Err(CaptureError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_garbage_file_is_invalid_format() {
        let dir = TempDir::new().unwrap();
        let slots = open_slots(&dir);
        fs::write(slots.path().join("k.slot"), "not a slot file").unwrap();

        assert!(matches!(slots.get("k"), Err(CaptureError::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let slots = open_slots(&dir);

        assert!(slots.set("../escape", "x").is_err());
        assert!(slots.set("a/b", "x").is_err());
        assert!(slots.get("").is_err());
    }
}
