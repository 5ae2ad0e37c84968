//! Bridge configuration.

use crate::engine::{FavoredRegion, Speaker};

/// Fixed capacity of the audio sample buffer, in samples.
pub const DEFAULT_AUDIO_CAPACITY: usize = 0x8000;

/// Output and flush settings applied on every session start.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BridgeConfig {
    pub sample_rate: u32,
    pub sample_bits: u32,
    /// Volume applied to all channels, 0..=100.
    pub volume: u32,
    pub speaker: Speaker,
    /// Region handed to the engine for images that do not declare one.
    pub favored_region: FavoredRegion,
    pub unlimited_sprites: bool,
    /// Capacity of the audio buffer in samples. Must hold at least one PAL
    /// frame at `sample_rate`.
    pub audio_capacity: usize,
    /// Appended to a game-save destination to name the temporary snapshot
    /// written during a forced flush.
    pub temp_state_suffix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            sample_bits: 16,
            volume: 100,
            speaker: Speaker::Mono,
            favored_region: FavoredRegion::Ntsc,
            unlimited_sprites: true,
            audio_capacity: DEFAULT_AUDIO_CAPACITY,
            temp_state_suffix: ".temp".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_volume(mut self, volume: u32) -> Self {
        self.volume = volume.min(100);
        self
    }

    pub fn with_favored_region(mut self, region: FavoredRegion) -> Self {
        self.favored_region = region;
        self
    }

    pub fn with_audio_capacity(mut self, samples: usize) -> Self {
        self.audio_capacity = samples;
        self
    }

    pub fn with_temp_state_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.temp_state_suffix = suffix.into();
        self
    }
}
