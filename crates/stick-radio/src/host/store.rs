use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::error::DeviceError;
use crate::hal::PreferenceStore;

/// The boot-preference byte kept in a one-byte file.  A missing file
/// reads as 0, like an unset key in the device's preference storage.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn read_byte(&mut self) -> Result<u8, DeviceError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes.first().copied().unwrap_or(0)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("prefs: {} not written yet", self.path.display());
                Ok(0)
            }
            Err(e) => Err(DeviceError::StorageUnavailable(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_byte(&mut self, value: u8) -> Result<(), DeviceError> {
        let unavailable =
            |e: std::io::Error| DeviceError::StorageUnavailable(format!("{}: {}", self.path.display(), e));
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }
        fs::write(&self.path, [value]).map_err(unavailable)?;
        debug!("prefs: stored boot byte {}", value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FilePreferenceStore::new(dir.path().join("boot_mode"));
        assert_eq!(store.read_byte().unwrap(), 0);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("boot_mode");
        let mut store = FilePreferenceStore::new(path.clone());
        store.write_byte(2).unwrap();
        assert_eq!(FilePreferenceStore::new(path).read_byte().unwrap(), 2);
    }

    #[test]
    fn test_unreadable_path_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be read as a file
        let mut store = FilePreferenceStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.read_byte(),
            Err(DeviceError::StorageUnavailable(_))
        ));
    }
}
