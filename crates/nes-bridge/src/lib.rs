#![doc = include_str!("../README.md")]

mod bridge;
mod buffers;
mod cheats;
mod config;
mod engine;
mod error;
mod exported;
mod flush;
mod frame;
mod input;
mod session;
mod storage;

#[doc(hidden)]
pub mod __private {
    pub use crate::exported::ExportedBridge;
    pub use once_cell::sync::Lazy;
}

pub use crate::bridge::Bridge;
pub use crate::buffers::{
    FrameBuffers, VIDEO_BUFFER_LEN, VIDEO_FORMAT, VIDEO_HEIGHT, VIDEO_PITCH, VIDEO_WIDTH,
};
pub use crate::cheats::CheatCode;
pub use crate::config::{BridgeConfig, DEFAULT_AUDIO_CAPACITY};
pub use crate::engine::{
    AudioSettings, ColorMasks, ControllerDevice, Engine, FavoredRegion, PixelFormat, Region,
    Speaker, VideoSettings,
};
pub use crate::error::{BridgeError, CheatError, EngineError, StartError, StateError};
pub use crate::exported::{RawBufferCallback, RawVoidCallback};
pub use crate::frame::{AudioLease, BufferCallback, Frame, VideoLease};
pub use crate::input::{Controllers, InputMask, NUM_PADS};
pub use crate::session::Session;
pub use crate::storage::{PendingStorage, SaveCallback, StorageIo, StorageKind};

/// Exports the provided [`Engine`](crate::Engine) implementation behind the
/// `nes_*` C entry points.
///
/// A single bridge instance is created lazily on the first call and lives for
/// the rest of the process. An optional second argument supplies the
/// [`BridgeConfig`](crate::BridgeConfig); the default is used otherwise.
///
/// Host callbacks run while the instance is locked and must not call back
/// into the exported functions.
///
/// ```no_run
/// use nes_bridge::{export_nes_bridge, Engine};
///
/// struct MyEngine;
///
/// impl Engine for MyEngine {
///     # fn construct() -> Self where Self: Sized { Self }
///     # fn load(&mut self, _: &mut dyn std::io::Read, _: nes_bridge::FavoredRegion, _: &mut nes_bridge::StorageIo<'_>) -> Result<(), nes_bridge::EngineError> { Ok(()) }
///     # fn unload(&mut self, _: &mut nes_bridge::StorageIo<'_>) {}
///     # fn desired_region(&self) -> nes_bridge::Region { nes_bridge::Region::Ntsc }
///     # fn set_region(&mut self, _: nes_bridge::Region) {}
///     # fn region(&self) -> nes_bridge::Region { nes_bridge::Region::Ntsc }
///     # fn configure_audio(&mut self, _: &nes_bridge::AudioSettings) -> Result<(), nes_bridge::EngineError> { Ok(()) }
///     # fn configure_video(&mut self, _: &nes_bridge::VideoSettings) -> Result<(), nes_bridge::EngineError> { Ok(()) }
///     # fn connect_controller(&mut self, _: usize, _: nes_bridge::ControllerDevice) {}
///     # fn power(&mut self, _: bool) {}
///     # fn execute(&mut self, _: &mut nes_bridge::Frame<'_>) {}
///     # fn save_state(&mut self, _: &mut dyn std::io::Write) -> Result<(), nes_bridge::EngineError> { Ok(()) }
///     # fn load_state(&mut self, _: &mut dyn std::io::Read) -> Result<(), nes_bridge::EngineError> { Ok(()) }
///     # fn set_cheat(&mut self, _: nes_bridge::CheatCode) -> Result<(), nes_bridge::EngineError> { Ok(()) }
///     # fn clear_cheats(&mut self) {}
///     # fn cheat_count(&self) -> usize { 0 }
/// }
///
/// export_nes_bridge!(MyEngine);
/// ```
#[macro_export]
macro_rules! export_nes_bridge {
    ($engine:ty) => {
        $crate::export_nes_bridge!($engine, $crate::BridgeConfig::default());
    };
    ($engine:ty, $config:expr) => {
        const _: () = {
            fn __nes_bridge_state() -> &'static $crate::__private::ExportedBridge<$engine> {
                static STATE: $crate::__private::Lazy<$crate::__private::ExportedBridge<$engine>> =
                    $crate::__private::Lazy::new(|| {
                        $crate::__private::ExportedBridge::<$engine>::new($config)
                    });
                &STATE
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_frame_duration() -> f64 {
                __nes_bridge_state().frame_duration()
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_initialize(database_path: *const ::std::os::raw::c_char) {
                unsafe { __nes_bridge_state().initialize(database_path) };
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_start_emulation(
                game_path: *const ::std::os::raw::c_char,
            ) -> bool {
                unsafe { __nes_bridge_state().start(game_path) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_stop_emulation() {
                __nes_bridge_state().stop();
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_run_frame() {
                __nes_bridge_state().run_frame();
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_activate_input(input: i32, player_index: i32) {
                __nes_bridge_state().activate_input(input, player_index);
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_deactivate_input(input: i32, player_index: i32) {
                __nes_bridge_state().deactivate_input(input, player_index);
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_reset_inputs() {
                __nes_bridge_state().reset_inputs();
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_save_save_state(path: *const ::std::os::raw::c_char) {
                unsafe { __nes_bridge_state().save_state(path) };
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_load_save_state(path: *const ::std::os::raw::c_char) {
                unsafe { __nes_bridge_state().load_state(path) };
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_save_game_save(path: *const ::std::os::raw::c_char) {
                unsafe { __nes_bridge_state().save_game_save(path) };
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_load_game_save(path: *const ::std::os::raw::c_char) {
                unsafe { __nes_bridge_state().load_game_save(path) };
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_add_cheat_code(
                code: *const ::std::os::raw::c_char,
            ) -> bool {
                unsafe { __nes_bridge_state().add_cheat_code(code) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_reset_cheats() {
                __nes_bridge_state().reset_cheats();
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_set_audio_callback(
                callback: ::std::option::Option<$crate::RawBufferCallback>,
            ) {
                __nes_bridge_state().set_audio_callback(callback);
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_set_video_callback(
                callback: ::std::option::Option<$crate::RawBufferCallback>,
            ) {
                __nes_bridge_state().set_video_callback(callback);
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn nes_set_save_callback(
                callback: ::std::option::Option<$crate::RawVoidCallback>,
            ) {
                __nes_bridge_state().set_save_callback(callback);
            }
        };
    };
}
