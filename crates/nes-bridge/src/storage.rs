//! Redirection of engine battery/EEPROM requests to host-chosen files.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::error::BridgeError;

/// Host notification fired when the engine saves with no destination set.
pub type SaveCallback = Box<dyn FnMut() + Send>;

/// Kind of persistent cartridge storage an engine request refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Battery,
    Eeprom,
}

/// Single-slot load/save destinations consumed by the next engine request.
///
/// Each slot holds at most one path; setting it again before the engine
/// consumes it replaces the previous one.
#[derive(Debug, Default)]
pub struct PendingStorage {
    load_path: Option<PathBuf>,
    save_path: Option<PathBuf>,
    failure: Option<(PathBuf, io::Error)>,
}

impl PendingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_load_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if let Some(previous) = self.load_path.replace(path) {
            tracing::debug!(previous = %previous.display(), "replacing unconsumed load path");
        }
    }

    pub fn set_save_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if let Some(previous) = self.save_path.replace(path) {
            tracing::debug!(previous = %previous.display(), "replacing unconsumed save path");
        }
    }

    pub fn load_path(&self) -> Option<&Path> {
        self.load_path.as_deref()
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    pub(crate) fn clear_load_path(&mut self) -> Option<PathBuf> {
        self.load_path.take()
    }

    pub(crate) fn clear_save_path(&mut self) -> Option<PathBuf> {
        self.save_path.take()
    }

    /// Returns the first I/O failure recorded since the last call.
    pub(crate) fn take_failure(&mut self) -> Option<BridgeError> {
        self.failure
            .take()
            .map(|(path, source)| BridgeError::Storage { path, source })
    }

    fn record_failure(&mut self, path: PathBuf, err: io::Error) {
        tracing::warn!(path = %path.display(), error = %err, "game save I/O failed");
        if self.failure.is_none() {
            self.failure = Some((path, err));
        }
    }
}

/// Handle through which an engine issues battery/EEPROM requests.
///
/// Only ever lent to the engine for the duration of a bridge call
/// ([`Engine::load`](crate::Engine::load), [`Engine::unload`](crate::Engine::unload),
/// or [`Engine::execute`](crate::Engine::execute) via
/// [`Frame::storage`](crate::Frame::storage)). Requests may arrive any number
/// of times per call.
pub struct StorageIo<'a> {
    pending: &'a mut PendingStorage,
    save_callback: &'a mut Option<SaveCallback>,
}

impl<'a> StorageIo<'a> {
    pub(crate) fn new(
        pending: &'a mut PendingStorage,
        save_callback: &'a mut Option<SaveCallback>,
    ) -> Self {
        Self {
            pending,
            save_callback,
        }
    }

    /// Serves a load request.
    ///
    /// Returns the full content of the pending load path and consumes it. With
    /// no path pending, or when the file cannot be read, returns `None` and the
    /// engine keeps its default storage.
    pub fn load(&mut self, kind: StorageKind) -> Option<Vec<u8>> {
        let path = self.pending.load_path.take()?;
        match fs::read(&path) {
            Ok(content) => {
                tracing::debug!(?kind, path = %path.display(), len = content.len(), "loaded game save");
                Some(content)
            }
            Err(err) => {
                self.pending.record_failure(path, err);
                None
            }
        }
    }

    /// Serves a save request.
    ///
    /// Writes `content` to the pending save path and consumes it. With no path
    /// pending nothing is written and the host's save callback, if any, is
    /// notified instead.
    pub fn save(&mut self, kind: StorageKind, content: &[u8]) {
        let Some(path) = self.pending.save_path.take() else {
            tracing::trace!(?kind, "no save destination; notifying host");
            if let Some(callback) = self.save_callback.as_mut() {
                callback();
            }
            return;
        };

        match fs::write(&path, content) {
            Ok(()) => {
                tracing::debug!(?kind, path = %path.display(), len = content.len(), "wrote game save");
            }
            Err(err) => self.pending.record_failure(path, err),
        }
    }
}
