use crate::{Bridge, BridgeConfig, engine::Engine, frame::BufferCallback, storage::SaveCallback};
use parking_lot::Mutex;
use std::{
    ffi::{CStr, c_char},
    path::PathBuf,
};

/// C signature of the video and audio notifications: buffer pointer and size
/// in bytes. The pointer is only valid for the duration of the call.
pub type RawBufferCallback = unsafe extern "C" fn(buffer: *const u8, size: i32);

/// C signature of the save notification.
pub type RawVoidCallback = unsafe extern "C" fn();

/// Process-wide bridge behind the exported C entry points.
#[doc(hidden)]
pub struct ExportedBridge<E: Engine> {
    bridge: Mutex<Bridge<E>>,
}

impl<E: Engine> ExportedBridge<E> {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            bridge: Mutex::new(Bridge::with_config(config)),
        }
    }

    pub fn frame_duration(&self) -> f64 {
        self.bridge.lock().frame_duration()
    }

    /// # Safety
    /// `path` must be null or a valid null-terminated string.
    pub unsafe fn initialize(&self, path: *const c_char) {
        let Some(path) = c_path_to_pathbuf(path) else {
            tracing::warn!("initialize called without a database path");
            return;
        };
        if let Err(err) = self.bridge.lock().initialize(&path) {
            tracing::warn!(error = %err, "failed to initialize");
        }
    }

    /// # Safety
    /// `path` must be null or a valid null-terminated string.
    pub unsafe fn start(&self, path: *const c_char) -> bool {
        let Some(path) = c_path_to_pathbuf(path) else {
            return false;
        };
        match self.bridge.lock().start(&path) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(rom = %path.display(), error = %err, "failed to launch game");
                false
            }
        }
    }

    pub fn stop(&self) {
        self.bridge.lock().stop();
    }

    pub fn run_frame(&self) {
        self.bridge.lock().run_frame();
    }

    pub fn activate_input(&self, input: i32, player: i32) {
        self.bridge
            .lock()
            .activate_input(input as u32, player_index(player));
    }

    pub fn deactivate_input(&self, input: i32, player: i32) {
        self.bridge
            .lock()
            .deactivate_input(input as u32, player_index(player));
    }

    pub fn reset_inputs(&self) {
        self.bridge.lock().reset_inputs();
    }

    /// # Safety
    /// `path` must be null or a valid null-terminated string.
    pub unsafe fn save_state(&self, path: *const c_char) {
        self.with_path(path, "save state", |bridge, path| bridge.save_state(path));
    }

    /// # Safety
    /// `path` must be null or a valid null-terminated string.
    pub unsafe fn load_state(&self, path: *const c_char) {
        self.with_path(path, "load state", |bridge, path| bridge.load_state(path));
    }

    /// # Safety
    /// `path` must be null or a valid null-terminated string.
    pub unsafe fn save_game_save(&self, path: *const c_char) {
        self.with_path(path, "save game save", |bridge, path| {
            bridge.save_game_save(path)
        });
    }

    /// # Safety
    /// `path` must be null or a valid null-terminated string.
    pub unsafe fn load_game_save(&self, path: *const c_char) {
        self.with_path(path, "load game save", |bridge, path| {
            bridge.load_game_save(path)
        });
    }

    /// # Safety
    /// `code` must be null or a valid null-terminated string.
    pub unsafe fn add_cheat_code(&self, code: *const c_char) -> bool {
        let Some(code) = c_string(code) else {
            return false;
        };
        match self.bridge.lock().add_cheat_code(&code) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "cheat code refused");
                false
            }
        }
    }

    pub fn reset_cheats(&self) {
        self.bridge.lock().reset_cheats();
    }

    pub fn set_audio_callback(&self, callback: Option<RawBufferCallback>) {
        self.bridge
            .lock()
            .set_audio_callback(callback.map(wrap_buffer_callback));
    }

    pub fn set_video_callback(&self, callback: Option<RawBufferCallback>) {
        self.bridge
            .lock()
            .set_video_callback(callback.map(wrap_buffer_callback));
    }

    pub fn set_save_callback(&self, callback: Option<RawVoidCallback>) {
        self.bridge
            .lock()
            .set_save_callback(callback.map(wrap_void_callback));
    }

    fn with_path(
        &self,
        path: *const c_char,
        op: &'static str,
        f: impl FnOnce(&mut Bridge<E>, &PathBuf) -> Result<(), crate::BridgeError>,
    ) {
        let Some(path) = c_path_to_pathbuf(path) else {
            tracing::warn!(op, "called without a path");
            return;
        };
        if let Err(err) = f(&mut *self.bridge.lock(), &path) {
            tracing::warn!(op, path = %path.display(), error = %err, "operation failed");
        }
    }
}

fn player_index(player: i32) -> usize {
    usize::try_from(player).unwrap_or(usize::MAX)
}

fn wrap_buffer_callback(callback: RawBufferCallback) -> BufferCallback {
    Box::new(move |buffer: &[u8]| {
        let size = i32::try_from(buffer.len()).unwrap_or(i32::MAX);
        unsafe { callback(buffer.as_ptr(), size) }
    })
}

fn wrap_void_callback(callback: RawVoidCallback) -> SaveCallback {
    Box::new(move || unsafe { callback() })
}

fn c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .ok()
        .map(|s| s.to_owned())
}

fn c_path_to_pathbuf(ptr: *const c_char) -> Option<PathBuf> {
    if ptr.is_null() {
        return None;
    }

    let cstr = unsafe { CStr::from_ptr(ptr) };
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Some(std::ffi::OsStr::from_bytes(cstr.to_bytes()).into())
    }
    #[cfg(not(unix))]
    {
        cstr.to_str().ok().map(PathBuf::from)
    }
}
