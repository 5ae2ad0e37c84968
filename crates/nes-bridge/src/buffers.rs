//! Fixed-capacity video and audio buffers shared with the engine.

use crate::{
    engine::{PixelFormat, Region},
    error::StartError,
};

/// Native output width of the NES picture.
pub const VIDEO_WIDTH: u32 = 256;
/// Native output height of the NES picture.
pub const VIDEO_HEIGHT: u32 = 240;
/// Pixel layout of the video buffer.
pub const VIDEO_FORMAT: PixelFormat = PixelFormat::RGB565;
/// Bytes per row of the video buffer.
pub const VIDEO_PITCH: usize = VIDEO_WIDTH as usize * VIDEO_FORMAT.bytes_per_pixel();
/// Total size of the video buffer in bytes.
pub const VIDEO_BUFFER_LEN: usize = VIDEO_PITCH * VIDEO_HEIGHT as usize;

/// Storage the engine renders into during [`Engine::execute`](crate::Engine::execute).
///
/// Both buffers are allocated once and never resized. Only the audio frame
/// length changes, when a session starts with a different region.
#[derive(Debug)]
pub struct FrameBuffers {
    video: Box<[u8]>,
    audio: Box<[i16]>,
    audio_frame_len: usize,
}

impl FrameBuffers {
    pub fn new(audio_capacity: usize) -> Self {
        Self {
            video: vec![0; VIDEO_BUFFER_LEN].into_boxed_slice(),
            audio: vec![0; audio_capacity].into_boxed_slice(),
            audio_frame_len: 0,
        }
    }

    /// Packed RGB565 pixels of the last rendered frame.
    pub fn video(&self) -> &[u8] {
        &self.video
    }

    pub(crate) fn video_mut(&mut self) -> &mut [u8] {
        &mut self.video
    }

    /// Samples of the last rendered frame.
    pub fn audio(&self) -> &[i16] {
        &self.audio[..self.audio_frame_len]
    }

    pub(crate) fn audio_mut(&mut self) -> &mut [i16] {
        &mut self.audio[..self.audio_frame_len]
    }

    /// Samples of the last rendered frame as native-endian bytes.
    pub fn audio_bytes(&self) -> &[u8] {
        sample_bytes(self.audio())
    }

    pub fn audio_capacity(&self) -> usize {
        self.audio.len()
    }

    /// Samples the engine produces per frame in the current session.
    pub fn audio_frame_len(&self) -> usize {
        self.audio_frame_len
    }

    /// Resizes the per-frame audio window for `region`.
    pub(crate) fn configure_audio(
        &mut self,
        region: Region,
        sample_rate: u32,
    ) -> Result<usize, StartError> {
        let required = region.samples_per_frame(sample_rate);
        if required > self.audio.len() {
            return Err(StartError::AudioBufferTooSmall {
                required,
                capacity: self.audio.len(),
            });
        }
        self.audio_frame_len = required;
        Ok(required)
    }

    /// Blanks both buffers and drops the audio window.
    pub(crate) fn clear(&mut self) {
        self.video.fill(0);
        self.audio.fill(0);
        self.audio_frame_len = 0;
    }
}

/// Reinterprets PCM samples as native-endian bytes.
pub(crate) fn sample_bytes(samples: &[i16]) -> &[u8] {
    // SAFETY: `i16` has no padding and every bit pattern is a valid `u8`; the
    // byte view covers exactly the same allocation.
    unsafe {
        std::slice::from_raw_parts(samples.as_ptr() as *const u8, std::mem::size_of_val(samples))
    }
}

impl Default for FrameBuffers {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_AUDIO_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_buffer_matches_native_resolution() {
        let buffers = FrameBuffers::default();
        assert_eq!(buffers.video().len(), 256 * 240 * 2);
        assert_eq!(VIDEO_PITCH, 512);
    }

    #[test]
    fn audio_window_follows_region() {
        let mut buffers = FrameBuffers::default();
        assert_eq!(buffers.configure_audio(Region::Ntsc, 44_100).ok(), Some(735));
        assert_eq!(buffers.audio().len(), 735);
        assert_eq!(buffers.audio_bytes().len(), 735 * 2);

        assert_eq!(buffers.configure_audio(Region::Pal, 44_100).ok(), Some(882));
        assert_eq!(buffers.audio().len(), 882);
    }

    #[test]
    fn undersized_audio_buffer_is_rejected() {
        let mut buffers = FrameBuffers::new(800);
        assert!(buffers.configure_audio(Region::Ntsc, 44_100).is_ok());
        match buffers.configure_audio(Region::Pal, 44_100) {
            Err(StartError::AudioBufferTooSmall { required, capacity }) => {
                assert_eq!(required, 882);
                assert_eq!(capacity, 800);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // The previous window survives a rejected resize.
        assert_eq!(buffers.audio_frame_len(), 735);
    }

    #[test]
    fn audio_bytes_are_native_endian_samples() {
        let mut buffers = FrameBuffers::new(16);
        buffers.configure_audio(Region::Ntsc, 120).ok();
        buffers.audio_mut().copy_from_slice(&[0x1234, -2]);
        let mut expected = Vec::new();
        expected.extend_from_slice(&0x1234i16.to_ne_bytes());
        expected.extend_from_slice(&(-2i16).to_ne_bytes());
        assert_eq!(buffers.audio_bytes(), expected.as_slice());
    }
}
