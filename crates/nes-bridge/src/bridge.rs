use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use crate::{
    buffers::FrameBuffers,
    config::BridgeConfig,
    engine::{Engine, Region},
    error::{BridgeError, StateError},
    frame::{BufferCallback, Frame, HostCallbacks},
    input::Controllers,
    session::Session,
    storage::{PendingStorage, SaveCallback},
};

/// Owned context tying one engine to one host.
///
/// Holds the engine, the frame buffers, controller state, pending game-save
/// paths, the host callbacks and the active session. Every operation runs to
/// completion on the calling thread; engine notifications are serviced as
/// nested calls before the operation returns. Callbacks must not call back
/// into the bridge.
pub struct Bridge<E: Engine> {
    pub(crate) engine: E,
    pub(crate) config: BridgeConfig,
    pub(crate) buffers: FrameBuffers,
    pub(crate) controllers: Controllers,
    pub(crate) pending: PendingStorage,
    pub(crate) callbacks: HostCallbacks,
    pub(crate) session: Option<Session>,
    database: Option<PathBuf>,
}

impl<E: Engine> Bridge<E> {
    pub fn new(engine: E, config: BridgeConfig) -> Self {
        Self {
            buffers: FrameBuffers::new(config.audio_capacity),
            engine,
            config,
            controllers: Controllers::new(),
            pending: PendingStorage::new(),
            callbacks: HostCallbacks::default(),
            session: None,
            database: None,
        }
    }

    /// Builds a bridge around a freshly constructed engine.
    pub fn with_config(config: BridgeConfig) -> Self {
        Self::new(E::construct(), config)
    }

    /// Loads the compatibility database the engine consults on every load.
    pub fn initialize(&mut self, database_path: impl AsRef<Path>) -> Result<(), BridgeError> {
        let path = database_path.as_ref();
        let database_error = |source: StateError| BridgeError::Database {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|err| database_error(err.into()))?;
        self.engine
            .load_database(&mut BufReader::new(file))
            .map_err(|err| database_error(err.into()))?;

        tracing::info!(path = %path.display(), "compatibility database enabled");
        self.database = Some(path.to_path_buf());
        Ok(())
    }

    /// Path of the database passed to the last successful [`initialize`](Self::initialize).
    pub fn database(&self) -> Option<&Path> {
        self.database.as_deref()
    }

    /// Executes exactly one frame.
    ///
    /// The engine renders into the frame buffers and releases them back before
    /// returning, which forwards video and audio to the registered callbacks.
    /// Engine faults are not observable here. Game-save I/O failures raised by
    /// the engine mid-frame are logged.
    pub fn run_frame(&mut self) {
        let mut frame = Frame::new(
            &mut self.buffers,
            &self.controllers,
            &mut self.callbacks,
            &mut self.pending,
        );
        self.engine.execute(&mut frame);

        if let Some(err) = self.pending.take_failure() {
            tracing::warn!(error = %err, "game save request failed during frame");
        }
    }

    /// ORs `mask` into the buttons held by `player` (0 = port 1).
    pub fn activate_input(&mut self, mask: u32, player: usize) {
        if !self.controllers.activate(player, mask) {
            tracing::warn!(player, "ignoring input for unknown player");
        }
    }

    /// Releases the buttons in `mask` for `player`.
    pub fn deactivate_input(&mut self, mask: u32, player: usize) {
        if !self.controllers.deactivate(player, mask) {
            tracing::warn!(player, "ignoring input for unknown player");
        }
    }

    /// Releases every button on every pad.
    pub fn reset_inputs(&mut self) {
        self.controllers.reset();
    }

    pub fn controllers(&self) -> &Controllers {
        &self.controllers
    }

    pub fn set_video_callback(&mut self, callback: Option<BufferCallback>) {
        self.callbacks.video = callback;
    }

    pub fn set_audio_callback(&mut self, callback: Option<BufferCallback>) {
        self.callbacks.audio = callback;
    }

    pub fn set_save_callback(&mut self, callback: Option<SaveCallback>) {
        self.callbacks.save = callback;
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn rom_path(&self) -> Option<&Path> {
        self.session.as_ref().map(Session::rom_path)
    }

    /// Timing of the active session; NTSC when idle.
    pub fn region(&self) -> Region {
        self.session
            .as_ref()
            .map(Session::region)
            .unwrap_or_default()
    }

    /// Seconds per frame for the active region.
    pub fn frame_duration(&self) -> f64 {
        self.region().frame_duration()
    }

    /// Audio samples the engine produces per frame for the active region.
    pub fn audio_frame_length(&self) -> usize {
        self.region().samples_per_frame(self.config.sample_rate)
    }

    pub fn buffers(&self) -> &FrameBuffers {
        &self.buffers
    }

    /// Last rendered frame, RGB565 with a pitch of [`VIDEO_PITCH`](crate::VIDEO_PITCH).
    pub fn video_buffer(&self) -> &[u8] {
        self.buffers.video()
    }

    /// Samples of the last rendered frame.
    pub fn audio_buffer(&self) -> &[i16] {
        self.buffers.audio()
    }

    pub fn pending_storage(&self) -> &PendingStorage {
        &self.pending
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: Engine> Default for Bridge<E> {
    fn default() -> Self {
        Self::with_config(BridgeConfig::default())
    }
}

impl<E: Engine> fmt::Debug for Bridge<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("session", &self.session)
            .field("pending", &self.pending)
            .field("controllers", &self.controllers)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}
