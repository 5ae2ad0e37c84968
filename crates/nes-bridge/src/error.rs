//! Error types surfaced by the bridge.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Raw result code reported by an engine when it refuses a request.
///
/// Engines follow the convention that negative codes are failures; the bridge
/// never interprets the value beyond carrying it to the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[error("engine error code {0}")]
pub struct EngineError(pub i32);

impl EngineError {
    /// Generic "invalid parameter" code used by engines without a richer table.
    pub const INVALID_PARAMETER: Self = Self(-4);
    /// The engine does not support the requested operation.
    pub const UNSUPPORTED: Self = Self(-8);
    /// The content handed to the engine is corrupt or of an unknown format.
    pub const CORRUPT_FILE: Self = Self(-6);
}

/// Failure while bringing up an emulation session.
///
/// No session is active after any of these; everything staged before the
/// failure has been rolled back.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("failed to open ROM {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("engine rejected the ROM image: {0}")]
    LoadFailed(EngineError),

    #[error("engine rejected the audio configuration: {0}")]
    AudioRejected(EngineError),

    #[error("engine rejected the video configuration: {0}")]
    VideoRejected(EngineError),

    #[error("audio buffer holds {capacity} samples but a frame needs {required}")]
    AudioBufferTooSmall { required: usize, capacity: usize },
}

/// Failure while registering a cheat code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheatError {
    #[error("cannot decode cheat code {0:?}")]
    DecodeFailed(String),

    #[error("engine rejected cheat: {0}")]
    Rejected(EngineError),
}

/// Failure while moving an engine snapshot through a file or stream.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Errors returned by the session-level operations of [`Bridge`](crate::Bridge).
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Start(#[from] StartError),

    #[error("no game is loaded")]
    NoSession,

    #[error("game save I/O failed for {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("save state failed: {0}")]
    State(#[from] StateError),

    #[error("save state failed for {path}: {source}")]
    SaveState {
        path: PathBuf,
        #[source]
        source: StateError,
    },

    #[error("failed to load compatibility database {path}: {source}")]
    Database {
        path: PathBuf,
        #[source]
        source: StateError,
    },
}

impl BridgeError {
    pub(crate) fn save_state(path: impl Into<PathBuf>, source: impl Into<StateError>) -> Self {
        Self::SaveState {
            path: path.into(),
            source: source.into(),
        }
    }
}
