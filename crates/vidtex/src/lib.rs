//! Video-backed texture sources for real-time render pipelines.
//!
//! A [`VideoSource`] hides the asynchronous, error-prone, time-varying
//! nature of media decoding behind a small load state machine, and marks
//! its pixel content dirty at a bounded cadence so upload cost stays
//! independent of the media's native frame rate.
//!
//! The decoding engine sits behind the [`PlaybackHandle`] trait. The crate
//! ships an ffmpeg-subprocess engine behind the `video` feature (on by
//! default); render integrations consume the dirty signal plus
//! [`VideoFrame`]s without knowing which engine produced them.
//!
//! ```no_run
//! use std::time::Instant;
//! use vidtex::{VideoSource, VideoSourceOptions};
//!
//! let mut source = VideoSource::from_locator(
//!     "assets/video/park.mp4",
//!     &VideoSourceOptions::default(),
//! );
//! source.load()?;
//!
//! // Once per render pass:
//! source.update(Instant::now());
//! if source.take_dirty() {
//!     if let Some(frame) = source.acquire_frame() {
//!         // upload frame.data to the GPU-facing texture
//!     }
//! }
//! # Ok::<(), vidtex::SourceError>(())
//! ```

pub mod error;
pub mod locator;
pub mod media;
pub mod scheduler;
pub mod source;

pub use error::SourceError;
pub use locator::{DataEncoding, Locator};
pub use media::MediaResource;
#[cfg(feature = "video")]
pub use media::ffmpeg::{FfmpegHandle, ffmpeg_available};
pub use media::handle::{HandleConfig, MediaEvent, MediaInfo, PlaybackHandle, Preload, VideoFrame};
pub use scheduler::RefreshScheduler;
pub use source::{VideoSource, VideoSourceOptions};
