use crate::{
    cheats::CheatCode,
    error::EngineError,
    frame::Frame,
    storage::StorageIo,
};
use core::fmt;
use std::io::{Read, Write};

/// Emulation engine driven by a [`Bridge`](crate::Bridge).
///
/// The engine owns every piece of hardware state (CPU, PPU, APU, mapper,
/// battery RAM) and is treated as opaque. The bridge only sequences calls into
/// it and services the requests the engine makes back while those calls run:
/// buffer handoffs through [`Frame`] and battery/EEPROM file requests through
/// [`StorageIo`]. Both are synchronous and nested inside the triggering call.
///
/// The [`export_nes_bridge`](crate::export_nes_bridge) macro wires an
/// implementation into the global C entry points a host links against.
pub trait Engine: Send + 'static {
    /// Constructs a new engine with no cartridge inserted.
    fn construct() -> Self
    where
        Self: Sized;

    /// Loads the game compatibility database.
    ///
    /// The format is engine-defined. The default implementation ignores the
    /// data, which suits engines without a database.
    fn load_database(&mut self, _database: &mut dyn Read) -> Result<(), EngineError> {
        Ok(())
    }

    /// Inserts the cartridge read from `image`.
    ///
    /// `favored` is the region used when the image does not declare one.
    /// Engines that keep battery-backed RAM should request its content through
    /// `storage` while loading; an unset load path yields `None`, in which case
    /// the engine keeps its default (empty) storage.
    fn load(
        &mut self,
        image: &mut dyn Read,
        favored: FavoredRegion,
        storage: &mut StorageIo<'_>,
    ) -> Result<(), EngineError>;

    /// Removes the cartridge, powering the machine down.
    ///
    /// This is the only point at which engines commit battery-backed RAM: they
    /// must hand it to `storage` before returning. Calling this with no
    /// cartridge inserted is a no-op.
    fn unload(&mut self, storage: &mut StorageIo<'_>);

    /// Region declared by the inserted cartridge (or picked from the favored
    /// region at load time).
    fn desired_region(&self) -> Region;

    /// Switches the machine's timing mode.
    fn set_region(&mut self, region: Region);

    /// Timing mode the machine currently runs in.
    fn region(&self) -> Region;

    /// Applies the sound output configuration.
    fn configure_audio(&mut self, settings: &AudioSettings) -> Result<(), EngineError>;

    /// Applies the video output configuration.
    fn configure_video(&mut self, settings: &VideoSettings) -> Result<(), EngineError>;

    /// Plugs `device` into controller `port` (0-based).
    fn connect_controller(&mut self, port: usize, device: ControllerDevice);

    /// Powers the machine on or off.
    fn power(&mut self, on: bool);

    /// Emulates exactly one frame.
    ///
    /// The engine reads controller state from the frame, fills the video and
    /// audio buffers through the leases returned by
    /// [`Frame::acquire_video`] and [`Frame::acquire_audio`], and drops each
    /// lease once the buffer is complete.
    fn execute(&mut self, frame: &mut Frame<'_>);

    /// Writes an opaque snapshot of the whole machine.
    fn save_state(&mut self, out: &mut dyn Write) -> Result<(), EngineError>;

    /// Restores a snapshot produced by [`save_state`](Self::save_state).
    fn load_state(&mut self, input: &mut dyn Read) -> Result<(), EngineError>;

    /// Registers a decoded cheat patch.
    ///
    /// Must leave the registered set untouched when returning an error.
    fn set_cheat(&mut self, code: CheatCode) -> Result<(), EngineError>;

    /// Removes every registered cheat patch.
    fn clear_cheats(&mut self);

    /// Number of cheat patches currently registered.
    fn cheat_count(&self) -> usize;
}

/// Television timing standard of the running machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Region {
    /// 60 Hz NTSC timing.
    #[default]
    Ntsc,
    /// 50 Hz PAL timing.
    Pal,
}

impl Region {
    /// Nominal frames per second.
    pub const fn frame_rate(self) -> u32 {
        match self {
            Region::Ntsc => 60,
            Region::Pal => 50,
        }
    }

    /// Seconds per frame.
    pub fn frame_duration(self) -> f64 {
        1.0 / f64::from(self.frame_rate())
    }

    /// Number of audio samples produced per frame at `sample_rate`.
    pub const fn samples_per_frame(self, sample_rate: u32) -> usize {
        (sample_rate / self.frame_rate()) as usize
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Ntsc => "ntsc",
            Region::Pal => "pal",
        };
        f.write_str(s)
    }
}

/// Region used when a cartridge image does not declare one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FavoredRegion {
    #[default]
    Ntsc,
    Pal,
    Famicom,
}

impl FavoredRegion {
    /// Concrete timing the preference resolves to.
    pub const fn region(self) -> Region {
        match self {
            FavoredRegion::Ntsc | FavoredRegion::Famicom => Region::Ntsc,
            FavoredRegion::Pal => Region::Pal,
        }
    }
}

/// Speaker layout of the sound output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Speaker {
    #[default]
    Mono,
    Stereo,
}

/// Sound output configuration handed to [`Engine::configure_audio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSettings {
    pub sample_bits: u32,
    pub sample_rate: u32,
    /// Volume applied to every channel, 0..=100.
    pub volume: u32,
    pub speaker: Speaker,
}

/// Channel masks of a packed pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMasks {
    pub r: u32,
    pub g: u32,
    pub b: u32,
}

/// Packed pixel layout of the video buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits: u32,
    pub masks: ColorMasks,
}

impl PixelFormat {
    /// 16-bit RGB with 5-6-5 bit allocation.
    pub const RGB565: Self = Self {
        bits: 16,
        masks: ColorMasks {
            r: 0xF800,
            g: 0x07E0,
            b: 0x001F,
        },
    };

    pub const fn bytes_per_pixel(self) -> usize {
        (self.bits / 8) as usize
    }
}

/// Video output configuration handed to [`Engine::configure_video`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    /// Lift the hardware limit of eight sprites per scanline.
    pub unlimited_sprites: bool,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Device that can be plugged into a controller port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerDevice {
    Unconnected,
    /// Standard pad; the payload is the pad index (0 = first pad).
    Pad(u8),
}
