use crate::{
    buffers::{self, FrameBuffers, VIDEO_HEIGHT, VIDEO_PITCH, VIDEO_WIDTH},
    input::Controllers,
    storage::{PendingStorage, SaveCallback, StorageIo},
};
use std::ops::{Deref, DerefMut};

/// Host notification receiving a filled video or audio buffer.
///
/// The slice is only valid for the duration of the call.
pub type BufferCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Notification functions registered by the host.
#[derive(Default)]
pub(crate) struct HostCallbacks {
    pub video: Option<BufferCallback>,
    pub audio: Option<BufferCallback>,
    pub save: Option<SaveCallback>,
}

impl HostCallbacks {
    pub fn storage<'a>(&'a mut self, pending: &'a mut PendingStorage) -> StorageIo<'a> {
        StorageIo::new(pending, &mut self.save)
    }
}

/// Everything an engine may touch while executing one frame.
///
/// Buffer access follows an acquire/release handoff: `acquire_*` lends the
/// buffer out and dropping the lease releases it, at which point the content
/// is forwarded to the host. Acquisition never fails; the bridge is driven
/// from a single thread and nothing else can hold the buffers.
pub struct Frame<'a> {
    buffers: &'a mut FrameBuffers,
    controllers: &'a Controllers,
    callbacks: &'a mut HostCallbacks,
    pending: &'a mut PendingStorage,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(
        buffers: &'a mut FrameBuffers,
        controllers: &'a Controllers,
        callbacks: &'a mut HostCallbacks,
        pending: &'a mut PendingStorage,
    ) -> Self {
        Self {
            buffers,
            controllers,
            callbacks,
            pending,
        }
    }

    /// Controller state sampled for this frame.
    pub fn controllers(&self) -> &Controllers {
        self.controllers
    }

    /// Borrows the video buffer for rendering.
    pub fn acquire_video(&mut self) -> VideoLease<'_> {
        tracing::trace!("video buffer acquired");
        VideoLease {
            pixels: self.buffers.video_mut(),
            callback: self.callbacks.video.as_mut(),
        }
    }

    /// Borrows exactly one frame's worth of audio samples.
    pub fn acquire_audio(&mut self) -> AudioLease<'_> {
        tracing::trace!("audio buffer acquired");
        AudioLease {
            samples: self.buffers.audio_mut(),
            callback: self.callbacks.audio.as_mut(),
        }
    }

    /// Battery/EEPROM request handle for engines that flush mid-frame.
    pub fn storage(&mut self) -> StorageIo<'_> {
        self.callbacks.storage(self.pending)
    }
}

/// Mutable view of the video buffer; dropping it hands the frame to the host.
pub struct VideoLease<'f> {
    pixels: &'f mut [u8],
    callback: Option<&'f mut BufferCallback>,
}

impl VideoLease<'_> {
    pub fn width(&self) -> u32 {
        VIDEO_WIDTH
    }

    pub fn height(&self) -> u32 {
        VIDEO_HEIGHT
    }

    /// Bytes per row.
    pub fn pitch(&self) -> usize {
        VIDEO_PITCH
    }
}

impl Deref for VideoLease<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &*self.pixels
    }
}

impl DerefMut for VideoLease<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut *self.pixels
    }
}

impl Drop for VideoLease<'_> {
    fn drop(&mut self) {
        tracing::trace!("video buffer released");
        if let Some(callback) = self.callback.take() {
            callback(&*self.pixels);
        }
    }
}

/// Mutable view of one frame of audio samples; dropping it hands the samples
/// to the host.
pub struct AudioLease<'f> {
    samples: &'f mut [i16],
    callback: Option<&'f mut BufferCallback>,
}

impl Deref for AudioLease<'_> {
    type Target = [i16];

    fn deref(&self) -> &[i16] {
        &*self.samples
    }
}

impl DerefMut for AudioLease<'_> {
    fn deref_mut(&mut self) -> &mut [i16] {
        &mut *self.samples
    }
}

impl Drop for AudioLease<'_> {
    fn drop(&mut self) {
        tracing::trace!("audio buffer released");
        if let Some(callback) = self.callback.take() {
            callback(buffers::sample_bytes(self.samples));
        }
    }
}
