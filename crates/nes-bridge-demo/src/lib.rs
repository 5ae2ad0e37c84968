//! Demo engine built with `nes-bridge`.
//!
//! This crate exposes a tiny deterministic engine that accepts iNES images,
//! renders a moving RGB565 gradient and emits a square tone so that the
//! bridge (session lifecycle, buffer handoff, battery redirection and the
//! forced game-save flush) can be exercised end to end without a real NES
//! core. The `nes_*` C entry points are exported for `DemoEngine`.

use std::io::{Read, Write};

use nes_bridge::{
    AudioSettings, CheatCode, ControllerDevice, Engine, EngineError, FavoredRegion, Frame,
    InputMask, Region, StorageIo, StorageKind, VideoSettings, export_nes_bridge,
};
use serde::{Deserialize, Serialize};

const INES_MAGIC: [u8; 4] = *b"NES\x1A";
const HEADER_LEN: usize = 16;

/// Size of the battery-backed work RAM of every demo cartridge.
pub const BATTERY_RAM_LEN: usize = 0x2000;

const DEFAULT_SAMPLE_RATE: u32 = 44_100;
const TONE_HZ: u32 = 220;
const TONE_AMPLITUDE: i32 = 6_000;

/// Cartridge traits read from the iNES header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cartridge {
    pub region: Region,
    pub battery: bool,
}

impl Cartridge {
    /// Parses an iNES header.
    ///
    /// Byte 9 bit 0 marks a PAL image. Otherwise byte 10 bits 0-1 equal to
    /// 1 or 3 mark a dual-region image, which follows `favored`. Byte 6
    /// bit 1 marks battery-backed RAM.
    pub fn parse(image: &[u8], favored: FavoredRegion) -> Result<Self, EngineError> {
        if image.len() < HEADER_LEN || image[..4] != INES_MAGIC {
            return Err(EngineError::CORRUPT_FILE);
        }

        let region = if image[9] & 0x01 != 0 {
            Region::Pal
        } else if image[10] & 0x01 != 0 {
            favored.region()
        } else {
            Region::Ntsc
        };

        Ok(Self {
            region,
            battery: image[6] & 0x02 != 0,
        })
    }
}

/// Everything a save state captures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub frame: u64,
    pub tone_phase: u32,
    pub last_input: u32,
    pub battery: Vec<u8>,
}

pub struct DemoEngine {
    database_entries: usize,
    cartridge: Option<Cartridge>,
    region: Region,
    audio: Option<AudioSettings>,
    video: Option<VideoSettings>,
    ports: [ControllerDevice; 2],
    powered: bool,
    machine: Machine,
    cheats: Vec<CheatCode>,
}

impl DemoEngine {
    pub fn new() -> Self {
        Self {
            database_entries: 0,
            cartridge: None,
            region: Region::default(),
            audio: None,
            video: None,
            ports: [ControllerDevice::Unconnected; 2],
            powered: false,
            machine: Machine::default(),
            cheats: Vec::new(),
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn database_entries(&self) -> usize {
        self.database_entries
    }

    pub fn audio_settings(&self) -> Option<&AudioSettings> {
        self.audio.as_ref()
    }

    pub fn video_settings(&self) -> Option<&VideoSettings> {
        self.video.as_ref()
    }

    pub fn port(&self, port: usize) -> Option<ControllerDevice> {
        self.ports.get(port).copied()
    }

    /// XOR mask that active cheat patches apply to every pixel.
    fn tint(&self) -> u16 {
        self.cheats.iter().fold(0, |tint, cheat| {
            tint ^ (u16::from(cheat.value) << 8 | (cheat.address & 0x00FF))
        })
    }

    fn render(&self, frame: &mut Frame<'_>) {
        let phase = self.machine.frame as u32;
        let tint = self.tint();
        let mut video = frame.acquire_video();
        let (width, height, pitch) = (video.width() as usize, video.height() as usize, video.pitch());
        for y in 0..height {
            let row = &mut video[y * pitch..y * pitch + width * 2];
            for (x, pixel) in row.chunks_exact_mut(2).enumerate() {
                let (x, y) = (x as u32, y as u32);
                let r = ((x + phase) & 0x1F) as u16;
                let g = ((y + (phase >> 1)) & 0x3F) as u16;
                let b = (((x ^ y) + phase) & 0x1F) as u16;
                let rgb565 = (r << 11 | g << 5 | b) ^ tint;
                pixel.copy_from_slice(&rgb565.to_ne_bytes());
            }
        }
    }

    fn synthesize(&mut self, frame: &mut Frame<'_>, held: InputMask) {
        let (sample_rate, volume) = self
            .audio
            .map(|audio| (audio.sample_rate, audio.volume))
            .unwrap_or((DEFAULT_SAMPLE_RATE, 100));
        let hz = if held.contains(InputMask::A) {
            TONE_HZ * 2
        } else {
            TONE_HZ
        };
        let period = (sample_rate / hz).max(2);
        let amplitude = (TONE_AMPLITUDE * volume.min(100) as i32 / 100) as i16;

        let mut audio = frame.acquire_audio();
        for sample in audio.iter_mut() {
            self.machine.tone_phase %= period;
            *sample = if self.machine.tone_phase < period / 2 {
                amplitude
            } else {
                -amplitude
            };
            self.machine.tone_phase += 1;
        }
    }
}

impl Engine for DemoEngine {
    fn construct() -> Self
    where
        Self: Sized,
    {
        Self::new()
    }

    fn load_database(&mut self, database: &mut dyn Read) -> Result<(), EngineError> {
        let mut text = String::new();
        database
            .read_to_string(&mut text)
            .map_err(|_| EngineError::CORRUPT_FILE)?;
        self.database_entries = text.lines().filter(|line| !line.trim().is_empty()).count();
        tracing::debug!(entries = self.database_entries, "database parsed");
        Ok(())
    }

    fn load(
        &mut self,
        image: &mut dyn Read,
        favored: FavoredRegion,
        storage: &mut StorageIo<'_>,
    ) -> Result<(), EngineError> {
        let mut rom = Vec::new();
        image
            .read_to_end(&mut rom)
            .map_err(|_| EngineError::CORRUPT_FILE)?;
        let cartridge = Cartridge::parse(&rom, favored)?;

        let mut battery = vec![0; BATTERY_RAM_LEN];
        if cartridge.battery {
            if let Some(saved) = storage.load(StorageKind::Battery) {
                let len = saved.len().min(BATTERY_RAM_LEN);
                battery[..len].copy_from_slice(&saved[..len]);
            }
        }

        tracing::debug!(region = %cartridge.region, battery = cartridge.battery, "cartridge inserted");
        self.machine = Machine {
            battery,
            ..Machine::default()
        };
        self.cartridge = Some(cartridge);
        Ok(())
    }

    fn unload(&mut self, storage: &mut StorageIo<'_>) {
        let Some(cartridge) = self.cartridge.take() else {
            return;
        };
        if cartridge.battery {
            storage.save(StorageKind::Battery, &self.machine.battery);
        }
        self.powered = false;
        tracing::debug!("cartridge removed");
    }

    fn desired_region(&self) -> Region {
        self.cartridge
            .map(|cartridge| cartridge.region)
            .unwrap_or_default()
    }

    fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    fn region(&self) -> Region {
        self.region
    }

    fn configure_audio(&mut self, settings: &AudioSettings) -> Result<(), EngineError> {
        if settings.sample_bits != 16 || settings.sample_rate == 0 {
            return Err(EngineError::UNSUPPORTED);
        }
        self.audio = Some(*settings);
        Ok(())
    }

    fn configure_video(&mut self, settings: &VideoSettings) -> Result<(), EngineError> {
        if settings.format.bytes_per_pixel() != 2 {
            return Err(EngineError::UNSUPPORTED);
        }
        self.video = Some(*settings);
        Ok(())
    }

    fn connect_controller(&mut self, port: usize, device: ControllerDevice) {
        if let Some(slot) = self.ports.get_mut(port) {
            *slot = device;
        }
    }

    fn power(&mut self, on: bool) {
        self.powered = on && self.cartridge.is_some();
    }

    fn execute(&mut self, frame: &mut Frame<'_>) {
        if !self.powered {
            return;
        }

        let held = match self.ports[0] {
            ControllerDevice::Pad(pad) => frame.controllers().buttons(usize::from(pad)),
            ControllerDevice::Unconnected => InputMask::empty(),
        };
        self.machine.last_input = held.bits();
        self.machine.frame += 1;
        self.machine.battery[..8].copy_from_slice(&self.machine.frame.to_le_bytes());

        self.render(frame);
        self.synthesize(frame, held);
    }

    fn save_state(&mut self, out: &mut dyn Write) -> Result<(), EngineError> {
        if self.cartridge.is_none() {
            return Err(EngineError::INVALID_PARAMETER);
        }
        let blob = postcard::to_stdvec(&self.machine).map_err(|err| {
            tracing::warn!(error = %err, "failed to encode state");
            EngineError::CORRUPT_FILE
        })?;
        out.write_all(&blob).map_err(|_| EngineError::CORRUPT_FILE)
    }

    fn load_state(&mut self, input: &mut dyn Read) -> Result<(), EngineError> {
        if self.cartridge.is_none() {
            return Err(EngineError::INVALID_PARAMETER);
        }
        let mut blob = Vec::new();
        input
            .read_to_end(&mut blob)
            .map_err(|_| EngineError::CORRUPT_FILE)?;
        let machine: Machine = postcard::from_bytes(&blob).map_err(|err| {
            tracing::warn!(error = %err, "failed to decode state");
            EngineError::CORRUPT_FILE
        })?;
        if machine.battery.len() != BATTERY_RAM_LEN {
            return Err(EngineError::CORRUPT_FILE);
        }
        self.machine = machine;
        Ok(())
    }

    fn set_cheat(&mut self, code: CheatCode) -> Result<(), EngineError> {
        if code.address < 0x8000 {
            return Err(EngineError::INVALID_PARAMETER);
        }
        self.cheats.push(code);
        Ok(())
    }

    fn clear_cheats(&mut self) {
        self.cheats.clear();
    }

    fn cheat_count(&self) -> usize {
        self.cheats.len()
    }
}

impl Default for DemoEngine {
    fn default() -> Self {
        Self::new()
    }
}

export_nes_bridge!(DemoEngine);
