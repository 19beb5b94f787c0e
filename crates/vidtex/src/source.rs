//! Renderer-facing texture source backed by playing media.
//!
//! **Lifecycle**: `Unloaded → Loading → {Ready | Errored}`, with `Destroyed`
//! terminal from anywhere. Dimensions and readiness flags are published
//! together when the load resolves, so a reader never sees `is_ready` with
//! stale zero dimensions.
//!
//! **Refresh**: once ready and playing, the host render loop pumps
//! [`update`](VideoSource::update) each frame and consumes
//! [`take_dirty`](VideoSource::take_dirty) to decide whether to re-upload
//! the latest [`acquire_frame`](VideoSource::acquire_frame) result. The
//! cadence is bounded by `update_fps`, not by the media's native rate.

use std::time::{Duration, Instant};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::media::MediaResource;
use crate::media::handle::{HandleConfig, PlaybackHandle, VideoFrame};
use crate::scheduler::RefreshScheduler;

#[cfg(feature = "video")]
use crate::locator::Locator;
#[cfg(feature = "video")]
use crate::media::ffmpeg::FfmpegHandle;

/// Construction options. `handle` is forwarded verbatim to the playback
/// engine when the source builds one from a locator; an explicitly provided
/// handle arrives already configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSourceOptions {
    /// Kick background loading at construction. When false, nothing happens
    /// until [`VideoSource::load`] is called.
    pub auto_load: bool,
    /// Start playback (and refresh marking) as soon as the source is ready.
    pub auto_play: bool,
    /// Refresh cadence in frames per second; zero means every render pump.
    pub update_fps: f32,
    /// Logical-to-pixel scale factor.
    pub resolution: f32,
    /// Bound on how long [`VideoSource::load`] may wait for the engine.
    pub load_timeout: Option<Duration>,
    pub handle: HandleConfig,
}

impl Default for VideoSourceOptions {
    fn default() -> Self {
        Self {
            auto_load: true,
            auto_play: true,
            update_fps: 0.0,
            resolution: 1.0,
            load_timeout: None,
            handle: HandleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Errored,
    Destroyed,
}

/// A texture source whose pixel content comes from playing media.
///
/// Owns its [`MediaResource`] exclusively. Replacing the media means
/// destroying this source and creating another; there is no in-place swap.
pub struct VideoSource {
    resource: MediaResource,
    state: LoadState,
    error: Option<SourceError>,
    pixel_width: u32,
    pixel_height: u32,
    resolution: f32,
    auto_play: bool,
    load_timeout: Option<Duration>,
    scheduler: RefreshScheduler,
    dirty: bool,
}

impl VideoSource {
    /// Wrap an already-constructed playback handle.
    pub fn from_handle(handle: Box<dyn PlaybackHandle>, options: &VideoSourceOptions) -> Self {
        let mut resource = MediaResource::new(handle);
        if options.auto_load {
            resource.begin_load();
        }
        Self {
            resource,
            state: LoadState::Unloaded,
            error: None,
            pixel_width: 0,
            pixel_height: 0,
            resolution: if options.resolution > 0.0 {
                options.resolution
            } else {
                1.0
            },
            auto_play: options.auto_play,
            load_timeout: options.load_timeout,
            scheduler: RefreshScheduler::new(options.update_fps),
            dirty: false,
        }
    }

    /// Resolve the locator's format and build the bundled ffmpeg engine
    /// for it.
    #[cfg(feature = "video")]
    pub fn from_locator(locator: &str, options: &VideoSourceOptions) -> Self {
        let locator = Locator::parse(locator);
        let handle = FfmpegHandle::from_locator(&locator, options.handle.clone());
        Self::from_handle(Box::new(handle), options)
    }

    /// Await readiness.
    ///
    /// Idempotent once ready: the same source answers immediately without
    /// touching the engine again. After a failure the recorded error is
    /// replayed; after destroy the call fails fast.
    pub fn load(&mut self) -> Result<&mut Self, SourceError> {
        match self.state {
            LoadState::Destroyed => return Err(SourceError::Destroyed),
            LoadState::Errored => {
                let err = self
                    .error
                    .clone()
                    .unwrap_or_else(|| SourceError::Load("load previously failed".to_string()));
                return Err(err);
            }
            LoadState::Ready => return Ok(self),
            LoadState::Unloaded | LoadState::Loading => {}
        }

        self.state = LoadState::Loading;
        match self.resource.await_ready(self.load_timeout) {
            Ok(media) => {
                // Dimensions and readiness are published together; a reader
                // never observes one without the other.
                self.pixel_width = media.width;
                self.pixel_height = media.height;
                self.state = LoadState::Ready;
                self.dirty = true;
                info!(
                    "video source ready: {}x{} ({:.3} fps native)",
                    media.width, media.height, media.frame_rate
                );
                if self.auto_play {
                    self.play();
                }
                Ok(self)
            }
            Err(err) => {
                self.state = LoadState::Errored;
                self.error = Some(err.clone());
                warn!("video source failed to load: {err}");
                Err(err)
            }
        }
    }

    /// Begin playback and refresh marking. No-op unless ready.
    pub fn play(&mut self) {
        if self.state != LoadState::Ready {
            return;
        }
        self.resource.play();
        self.scheduler.start(Instant::now());
    }

    /// Pause playback; no dirty marks happen while paused.
    pub fn pause(&mut self) {
        self.resource.pause();
        self.scheduler.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_active()
    }

    /// Render-loop pump: marks the content dirty whenever the refresh
    /// cadence boundary has passed.
    pub fn update(&mut self, now: Instant) {
        if self.state != LoadState::Ready {
            return;
        }
        if self.scheduler.tick(now) {
            self.dirty = true;
        }
    }

    /// Consume the needs-upload signal. Read once per render pass.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Latest decoded frame for upload.
    pub fn acquire_frame(&mut self) -> Option<VideoFrame> {
        self.resource.poll_frame()
    }

    pub fn update_fps(&self) -> f32 {
        self.scheduler.fps()
    }

    /// Retime the refresh cadence in place; takes effect on the next pump,
    /// no reload required.
    pub fn set_update_fps(&mut self, fps: f32) {
        self.scheduler.set_fps(fps);
    }

    pub fn pixel_width(&self) -> u32 {
        self.pixel_width
    }

    pub fn pixel_height(&self) -> u32 {
        self.pixel_height
    }

    /// Logical width under the current resolution scale.
    pub fn width(&self) -> f32 {
        self.pixel_width as f32 / self.resolution
    }

    /// Logical height under the current resolution scale.
    pub fn height(&self) -> f32 {
        self.pixel_height as f32 / self.resolution
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Authoritative "safe to sample" flag: decoded dimensions are known
    /// and the source has not been destroyed.
    pub fn is_valid(&self) -> bool {
        self.state != LoadState::Destroyed && self.pixel_width > 0 && self.pixel_height > 0
    }

    /// Whether the load sequence completed successfully. For sampling
    /// decisions use [`is_valid`](VideoSource::is_valid).
    pub fn is_ready(&self) -> bool {
        self.state == LoadState::Ready
    }

    pub fn resource(&self) -> &MediaResource {
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut MediaResource {
        &mut self.resource
    }

    /// Release the media engine and stop all refresh activity. Idempotent;
    /// the source cannot be loaded again afterwards.
    pub fn destroy(&mut self) {
        if self.state == LoadState::Destroyed {
            return;
        }
        self.scheduler.stop();
        self.dirty = false;
        self.resource.destroy();
        self.state = LoadState::Destroyed;
        info!("video source destroyed");
    }
}

impl std::fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSource")
            .field("state", &self.state)
            .field("pixel_width", &self.pixel_width)
            .field("pixel_height", &self.pixel_height)
            .field("update_fps", &self.scheduler.fps())
            .finish_non_exhaustive()
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.destroy();
    }
}
