//! The seam between texture sources and whatever actually plays media.

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

/// One decoded RGBA8 frame, ready for upload to the GPU-facing store.
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Metadata published by a successful probe.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    /// Native frame rate of the stream. Refresh cadence is bounded
    /// independently of it.
    pub frame_rate: f64,
    pub duration_secs: f64,
}

/// Terminal load events a handle delivers. Exactly one per load attempt.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    Loaded(MediaInfo),
    Error(String),
}

/// Preload hint forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    Metadata,
    Auto,
}

/// Engine configuration forwarded verbatim to the playback handle. The core
/// never reinterprets these; each engine uses the ones it understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleConfig {
    pub autoplay: bool,
    pub cross_origin: Option<String>,
    pub preload: Preload,
    pub looping: bool,
    pub muted: bool,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            cross_origin: None,
            preload: Preload::Auto,
            looping: false,
            muted: false,
        }
    }
}

/// A native playable media engine.
///
/// Implementations own their decoding resources (threads, subprocesses,
/// device handles) and report readiness through the event sink given to
/// [`begin_load`](PlaybackHandle::begin_load).
pub trait PlaybackHandle: Send {
    /// Attach the event sink and start metadata discovery. Called at most
    /// once per handle. The handle must deliver exactly one terminal
    /// [`MediaEvent`] even if the engine raises several, and an engine error
    /// must always produce one: a load may never hang just because only an
    /// error occurred.
    fn begin_load(&mut self, events: Sender<MediaEvent>);

    fn play(&mut self);

    fn pause(&mut self);

    fn is_playing(&self) -> bool;

    /// Latest decoded frame, non-blocking. Older frames are dropped.
    fn poll_frame(&mut self) -> Option<VideoFrame>;

    /// Stop playback, detach event delivery, release native resources.
    /// Idempotent.
    fn shutdown(&mut self);
}

#[cfg(test)]
pub(crate) mod scripted {
    //! A playback handle with pre-scripted outcomes, for exercising the
    //! lifecycle without a real engine.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::{MediaEvent, MediaInfo, PlaybackHandle, Sender, VideoFrame};

    pub(crate) enum Script {
        Ready(MediaInfo),
        Fail(String),
        /// Never delivers a terminal event.
        Silent,
    }

    #[derive(Clone, Default)]
    pub(crate) struct Counters {
        pub load_calls: Arc<AtomicU32>,
        pub shutdown_calls: Arc<AtomicU32>,
    }

    impl Counters {
        pub(crate) fn loads(&self) -> u32 {
            self.load_calls.load(Ordering::Relaxed)
        }

        pub(crate) fn shutdowns(&self) -> u32 {
            self.shutdown_calls.load(Ordering::Relaxed)
        }
    }

    pub(crate) struct ScriptedHandle {
        script: Script,
        playing: bool,
        counters: Counters,
        /// Held so a silent script keeps the channel open, like an engine
        /// that simply never reports.
        held_sink: Option<Sender<MediaEvent>>,
    }

    impl ScriptedHandle {
        pub(crate) fn new(script: Script) -> Self {
            Self {
                script,
                playing: false,
                counters: Counters::default(),
                held_sink: None,
            }
        }

        pub(crate) fn ready(width: u32, height: u32) -> Self {
            Self::new(Script::Ready(MediaInfo {
                width,
                height,
                frame_rate: 24.0,
                duration_secs: 1.0,
            }))
        }

        pub(crate) fn failing(reason: &str) -> Self {
            Self::new(Script::Fail(reason.to_string()))
        }

        pub(crate) fn silent() -> Self {
            Self::new(Script::Silent)
        }

        pub(crate) fn counters(&self) -> Counters {
            self.counters.clone()
        }
    }

    impl PlaybackHandle for ScriptedHandle {
        fn begin_load(&mut self, events: Sender<MediaEvent>) {
            self.counters.load_calls.fetch_add(1, Ordering::Relaxed);
            match &self.script {
                Script::Ready(info) => {
                    let _ = events.send(MediaEvent::Loaded(info.clone()));
                }
                Script::Fail(reason) => {
                    let _ = events.send(MediaEvent::Error(reason.clone()));
                }
                Script::Silent => self.held_sink = Some(events),
            }
        }

        fn play(&mut self) {
            self.playing = true;
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn is_playing(&self) -> bool {
            self.playing
        }

        fn poll_frame(&mut self) -> Option<VideoFrame> {
            None
        }

        fn shutdown(&mut self) {
            self.playing = false;
            self.held_sink = None;
            self.counters.shutdown_calls.fetch_add(1, Ordering::Relaxed);
        }
    }
}
