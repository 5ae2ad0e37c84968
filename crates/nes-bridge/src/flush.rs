//! Save states and game-save (battery) transfer.
//!
//! Engines only commit battery RAM when the cartridge is unloaded, so writing
//! a game save on demand means unloading the cartridge and bringing the exact
//! same machine back: snapshot, unload, restart, restore.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use crate::{
    Bridge,
    engine::Engine,
    error::{BridgeError, StateError},
};

impl<E: Engine> Bridge<E> {
    /// Writes a snapshot of the running machine to `path`.
    pub fn save_state(&mut self, path: impl AsRef<Path>) -> Result<(), BridgeError> {
        let path = path.as_ref();
        self.ensure_loaded()?;
        self.write_state_file(path)
            .map_err(|err| BridgeError::save_state(path, err))?;
        tracing::debug!(path = %path.display(), "saved state");
        Ok(())
    }

    /// Restores the snapshot stored at `path`.
    pub fn load_state(&mut self, path: impl AsRef<Path>) -> Result<(), BridgeError> {
        let path = path.as_ref();
        self.ensure_loaded()?;
        self.read_state_file(path)
            .map_err(|err| BridgeError::save_state(path, err))?;
        tracing::debug!(path = %path.display(), "loaded state");
        Ok(())
    }

    /// Streams a snapshot of the running machine into `out`.
    pub fn save_state_to(&mut self, out: &mut dyn Write) -> Result<(), BridgeError> {
        self.ensure_loaded()?;
        self.engine.save_state(out).map_err(StateError::from)?;
        Ok(())
    }

    /// Restores a snapshot read from `input`.
    pub fn load_state_from(&mut self, input: &mut dyn Read) -> Result<(), BridgeError> {
        self.ensure_loaded()?;
        self.engine.load_state(input).map_err(StateError::from)?;
        Ok(())
    }

    /// Snapshot of the running machine as an in-memory blob.
    pub fn save_state_to_memory(&mut self) -> Result<Vec<u8>, BridgeError> {
        let mut blob = Vec::new();
        self.save_state_to(&mut blob)?;
        Ok(blob)
    }

    /// Restores a blob produced by [`save_state_to_memory`](Self::save_state_to_memory).
    pub fn load_state_from_memory(&mut self, mut blob: &[u8]) -> Result<(), BridgeError> {
        self.load_state_from(&mut blob)
    }

    /// Forces the engine to write its battery RAM to `destination` without
    /// losing the running game.
    ///
    /// The machine state is parked in a temporary snapshot next to
    /// `destination` for the duration of the flush and that file is removed on
    /// every path. With no game loaded this is a no-op. If the restart fails
    /// the session is gone and the error is returned. A failed battery write is
    /// reported only after the game has been restored.
    pub fn save_game_save(&mut self, destination: impl AsRef<Path>) -> Result<(), BridgeError> {
        let destination = destination.as_ref();
        let Some(rom_path) = self.rom_path().map(Path::to_path_buf) else {
            tracing::debug!("no game loaded; skipping game save flush");
            return Ok(());
        };

        self.pending.set_save_path(destination);

        let temp = TempState::new(temp_state_path(destination, &self.config.temp_state_suffix));
        if let Err(err) = self.write_state_file(temp.path()) {
            self.pending.clear_save_path();
            return Err(BridgeError::save_state(temp.path(), err));
        }

        let flushed = self.unload_cartridge();
        if self.pending.clear_save_path().is_some() {
            tracing::debug!("cartridge issued no save request; nothing flushed");
        }

        self.start_session(&rom_path)?;
        if let Some(err) = self.pending.take_failure() {
            tracing::warn!(error = %err, "game save request failed during restart");
        }
        self.read_state_file(temp.path())
            .map_err(|err| BridgeError::save_state(temp.path(), err))?;

        tracing::info!(path = %destination.display(), "flushed game save");
        flushed
    }

    /// Restarts the running game with its battery RAM loaded from `source`.
    ///
    /// The source is read once by the engine's load request during the
    /// restart; cartridges without battery RAM ignore it.
    pub fn load_game_save(&mut self, source: impl AsRef<Path>) -> Result<(), BridgeError> {
        let source = source.as_ref();
        let rom_path = self
            .rom_path()
            .map(Path::to_path_buf)
            .ok_or(BridgeError::NoSession)?;

        self.pending.set_load_path(source);
        let restarted = self.start_session(&rom_path);
        let unconsumed = self.pending.clear_load_path();
        restarted?;

        if let Some(err) = self.pending.take_failure() {
            return Err(err);
        }
        if unconsumed.is_some() {
            tracing::debug!(path = %source.display(), "cartridge issued no load request; game save ignored");
        } else {
            tracing::info!(path = %source.display(), "loaded game save");
        }
        Ok(())
    }

    fn ensure_loaded(&self) -> Result<(), BridgeError> {
        if self.session.is_some() {
            Ok(())
        } else {
            Err(BridgeError::NoSession)
        }
    }

    fn write_state_file(&mut self, path: &Path) -> Result<(), StateError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.engine.save_state(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn read_state_file(&mut self, path: &Path) -> Result<(), StateError> {
        let mut reader = BufReader::new(File::open(path)?);
        self.engine.load_state(&mut reader)?;
        Ok(())
    }
}

fn temp_state_path(destination: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Temporary snapshot file, deleted when dropped.
struct TempState {
    path: PathBuf,
}

impl TempState {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempState {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove temporary state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_state_sits_next_to_destination() {
        assert_eq!(
            temp_state_path(Path::new("/saves/zelda.sav"), ".temp"),
            PathBuf::from("/saves/zelda.sav.temp")
        );
    }
}
