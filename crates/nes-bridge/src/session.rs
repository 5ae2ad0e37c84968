//! Session lifecycle: bringing a cartridge up and tearing it down.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use crate::{
    Bridge,
    buffers::{VIDEO_FORMAT, VIDEO_HEIGHT, VIDEO_WIDTH},
    engine::{AudioSettings, ControllerDevice, Engine, Region, VideoSettings},
    error::{BridgeError, StartError},
};

/// The cartridge currently running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    rom_path: PathBuf,
    region: Region,
}

impl Session {
    pub fn rom_path(&self) -> &Path {
        &self.rom_path
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

impl<E: Engine> Bridge<E> {
    /// Loads the ROM at `rom_path` and powers the machine on.
    ///
    /// A running session is ended first, which lets the engine flush its
    /// battery RAM. On error no session is active.
    pub fn start(&mut self, rom_path: impl AsRef<Path>) -> Result<(), StartError> {
        let result = self.start_session(rom_path.as_ref());
        if let Some(err) = self.pending.take_failure() {
            tracing::warn!(error = %err, "game save request failed during start");
        }
        result
    }

    /// Ends the session and removes the cartridge. Safe to call when idle.
    pub fn stop(&mut self) {
        if let Some(session) = &self.session {
            tracing::info!(rom = %session.rom_path.display(), "stopping emulation");
        }
        if let Err(err) = self.unload_cartridge() {
            tracing::warn!(error = %err, "game save request failed during stop");
        }
        self.buffers.clear();
    }

    pub(crate) fn start_session(&mut self, rom_path: &Path) -> Result<(), StartError> {
        if self.session.is_some() {
            if let Err(err) = self.unload_cartridge() {
                tracing::warn!(error = %err, "game save request failed while replacing cartridge");
            }
        }

        let result = self.insert_cartridge(rom_path);
        if result.is_err() {
            self.buffers.clear();
        }
        result
    }

    fn insert_cartridge(&mut self, rom_path: &Path) -> Result<(), StartError> {
        let file = File::open(rom_path).map_err(|source| StartError::Open {
            path: rom_path.to_path_buf(),
            source,
        })?;

        let mut storage = self.callbacks.storage(&mut self.pending);
        self.engine
            .load(
                &mut BufReader::new(file),
                self.config.favored_region,
                &mut storage,
            )
            .map_err(|code| {
                tracing::warn!(rom = %rom_path.display(), error = %code, "failed to launch game");
                StartError::LoadFailed(code)
            })?;

        match self.configure_machine() {
            Ok(region) => {
                tracing::info!(rom = %rom_path.display(), %region, "emulation started");
                self.session = Some(Session {
                    rom_path: rom_path.to_path_buf(),
                    region,
                });
                Ok(())
            }
            Err(err) => {
                tracing::warn!(rom = %rom_path.display(), error = %err, "failed to configure machine");
                let mut storage = self.callbacks.storage(&mut self.pending);
                self.engine.unload(&mut storage);
                Err(err)
            }
        }
    }

    /// Applies region, output and controller settings to a freshly loaded
    /// cartridge and powers it on.
    fn configure_machine(&mut self) -> Result<Region, StartError> {
        self.engine.set_region(self.engine.desired_region());
        // The engine may run in a different mode than the one requested.
        let region = self.engine.region();

        self.engine
            .configure_audio(&AudioSettings {
                sample_bits: self.config.sample_bits,
                sample_rate: self.config.sample_rate,
                volume: self.config.volume,
                speaker: self.config.speaker,
            })
            .map_err(StartError::AudioRejected)?;
        self.buffers
            .configure_audio(region, self.config.sample_rate)?;

        self.engine
            .configure_video(&VideoSettings {
                unlimited_sprites: self.config.unlimited_sprites,
                width: VIDEO_WIDTH,
                height: VIDEO_HEIGHT,
                format: VIDEO_FORMAT,
            })
            .map_err(StartError::VideoRejected)?;

        self.engine.connect_controller(0, ControllerDevice::Pad(0));
        self.engine.power(true);
        Ok(region)
    }

    /// Removes the cartridge and drops the session.
    ///
    /// The engine's battery save request is served here; a failed write is
    /// returned after the cartridge is out.
    pub(crate) fn unload_cartridge(&mut self) -> Result<(), BridgeError> {
        self.session = None;
        let mut storage = self.callbacks.storage(&mut self.pending);
        self.engine.unload(&mut storage);
        match self.pending.take_failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
