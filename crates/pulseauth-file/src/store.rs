//! One-file-per-key storage in a directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use fs2::FileExt;
use tracing::{debug, instrument};

use pulseauth_core::error::{InvalidInputError, StorageError};
use pulseauth_core::{Error, Result, Storage};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const LOCK_FILE: &str = ".lock";

/// [`Storage`] backed by a directory, one file per key.
///
/// Writes go to a unique temporary file that is renamed over the target, so
/// a reader never observes a half-written value. Files are created `0600`
/// on unix. An advisory lock on `<dir>/.lock` serializes writers across
/// processes sharing the directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Use `root`, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StorageError::Write {
            key: root.display().to_string(),
            message: e.to_string(),
        })?;

        #[cfg(unix)]
        {
            let _ = fs::set_permissions(&root, fs::Permissions::from_mode(0o700));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(InvalidInputError::Other {
                message: format!("invalid storage key '{key}'"),
            }
            .into());
        }
        Ok(self.root.join(key))
    }

    fn lock(&self, exclusive: bool) -> io::Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.root.join(LOCK_FILE))?;
        if exclusive {
            file.lock_exclusive()?;
        } else {
            file.lock_shared()?;
        }
        Ok(file)
    }

    fn write_atomic(&self, path: &Path, value: &str) -> io::Result<()> {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()));

        let result = (|| {
            let mut options = OpenOptions::new();
            options.create_new(true).write(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

#[async_trait]
impl Storage for FileStorage {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key)?;
        let read_error = |e: io::Error| -> Error {
            StorageError::Read {
                key: key.to_string(),
                message: e.to_string(),
            }
            .into()
        };

        let lock = self.lock(false).map_err(read_error)?;
        let result = match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(read_error(e)),
        };
        let _ = lock.unlock();
        result
    }

    #[instrument(skip(self, value), fields(root = %self.root.display()))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path(key)?;
        let write_error = |e: io::Error| -> Error {
            StorageError::Write {
                key: key.to_string(),
                message: e.to_string(),
            }
            .into()
        };

        let lock = self.lock(true).map_err(write_error)?;
        let result = self.write_atomic(&path, value).map_err(write_error);
        let _ = lock.unlock();

        if result.is_ok() {
            debug!(bytes = value.len(), "Stored value");
        }
        result
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;
        let remove_error = |e: io::Error| -> Error {
            StorageError::Remove {
                key: key.to_string(),
                message: e.to_string(),
            }
            .into()
        };

        let lock = self.lock(true).map_err(remove_error)?;
        let result = match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(remove_error(e)),
        };
        let _ = lock.unlock();
        result
    }
}
