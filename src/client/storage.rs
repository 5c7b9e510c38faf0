//! Persistence of the current session id across client restarts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::ClientError;

const APP_DIR: &str = "picker-proxy";
const SESSION_FILE: &str = "session_id";

/// One string slot holding the current session id.
pub trait SessionIdStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ClientError>;
    fn save(&self, session_id: &str) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

impl<T: SessionIdStore + ?Sized> SessionIdStore for Arc<T> {
    fn load(&self) -> Result<Option<String>, ClientError> {
        (**self).load()
    }

    fn save(&self, session_id: &str) -> Result<(), ClientError> {
        (**self).save(session_id)
    }

    fn clear(&self) -> Result<(), ClientError> {
        (**self).clear()
    }
}

/// Session id kept in a single owner-only file under the user config dir.
pub struct FileSessionIdStore {
    path: PathBuf,
}

impl FileSessionIdStore {
    pub fn new() -> Result<Self, ClientError> {
        let dir = dirs::config_dir()
            .ok_or_else(|| ClientError::Storage("could not find config directory".to_string()))?
            .join(APP_DIR);
        Ok(Self::with_path(dir.join(SESSION_FILE)))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(action: &str, err: io::Error) -> ClientError {
    ClientError::Storage(format!("failed to {action} session file: {err}"))
}

impl SessionIdStore for FileSessionIdStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let id = contents.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_error("read", err)),
        }
    }

    fn save(&self, session_id: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage_error("create directory for", e))?;
        }
        fs::write(&self.path, session_id).map_err(|e| storage_error("write", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| storage_error("restrict permissions of", e))?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_error("delete", err)),
        }
    }
}

#[derive(Default)]
pub struct MemorySessionIdStore {
    slot: Mutex<Option<String>>,
}

impl MemorySessionIdStore {
    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(session_id.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionIdStore for MemorySessionIdStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.slot().clone())
    }

    fn save(&self, session_id: &str) -> Result<(), ClientError> {
        *self.slot() = Some(session_id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.slot() = None;
        Ok(())
    }
}
