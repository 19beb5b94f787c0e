//! Media resource ownership and readiness signaling.
//!
//! [`MediaResource`] owns exactly one [`PlaybackHandle`] and turns the
//! engine's event stream into a single-resolution readiness deferred: the
//! first terminal event decides the outcome of a load attempt, no matter how
//! many events the engine raises, and a destroyed resource can never be
//! resurrected by a late event.

pub mod handle;

#[cfg(feature = "video")]
pub mod ffmpeg;

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use log::debug;

use crate::error::SourceError;
use handle::{MediaEvent, MediaInfo, PlaybackHandle, VideoFrame};

pub struct MediaResource {
    handle: Box<dyn PlaybackHandle>,
    events: Option<Receiver<MediaEvent>>,
    outcome: Option<Result<MediaInfo, SourceError>>,
    load_started: bool,
    destroyed: bool,
}

impl MediaResource {
    pub fn new(handle: Box<dyn PlaybackHandle>) -> Self {
        Self {
            handle,
            events: None,
            outcome: None,
            load_started: false,
            destroyed: false,
        }
    }

    /// Start metadata discovery. Listeners are attached to the engine
    /// exactly once; repeated calls are no-ops.
    pub fn begin_load(&mut self) {
        if self.destroyed || self.load_started {
            return;
        }
        self.load_started = true;
        let (tx, rx) = bounded(2);
        self.events = Some(rx);
        self.handle.begin_load(tx);
    }

    /// Block until the engine reports a terminal outcome.
    ///
    /// The first terminal event decides; anything the engine raises after
    /// that is ignored. Repeated calls return the recorded outcome without
    /// listening again, so a ready resource answers instantly.
    pub fn await_ready(&mut self, timeout: Option<Duration>) -> Result<MediaInfo, SourceError> {
        if self.destroyed {
            return Err(SourceError::Destroyed);
        }
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        self.begin_load();
        let Some(events) = &self.events else {
            return Err(SourceError::Load("event channel unavailable".to_string()));
        };

        let event = match timeout {
            Some(limit) => match events.recv_timeout(limit) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => return Err(SourceError::Timeout(limit)),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(disconnected_error());
                }
            },
            None => match events.recv() {
                Ok(event) => event,
                Err(_) => return Err(disconnected_error()),
            },
        };

        let outcome = match event {
            MediaEvent::Loaded(info) => Ok(info),
            MediaEvent::Error(reason) => Err(SourceError::Load(reason)),
        };
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Intrinsic pixel dimensions; zero until the load has resolved.
    pub fn dimensions(&self) -> (u32, u32) {
        match &self.outcome {
            Some(Ok(info)) => (info.width, info.height),
            _ => (0, 0),
        }
    }

    /// Probed metadata, once ready.
    pub fn media_info(&self) -> Option<&MediaInfo> {
        match &self.outcome {
            Some(Ok(info)) => Some(info),
            _ => None,
        }
    }

    pub fn play(&mut self) {
        if !self.destroyed {
            self.handle.play();
        }
    }

    pub fn pause(&mut self) {
        if !self.destroyed {
            self.handle.pause();
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.destroyed && self.handle.is_playing()
    }

    /// Latest decoded frame for upload, non-blocking.
    pub fn poll_frame(&mut self) -> Option<VideoFrame> {
        if self.destroyed {
            return None;
        }
        self.handle.poll_frame()
    }

    /// Stop playback, drop the event listeners, release the engine. Safe to
    /// call more than once; anything still in flight resolves against the
    /// destroyed gate instead of this resource's state.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.handle.pause();
        self.handle.shutdown();
        self.events = None;
        debug!("media resource destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

fn disconnected_error() -> SourceError {
    SourceError::Load("engine went away without reporting an outcome".to_string())
}

#[cfg(test)]
mod tests {
    use super::handle::scripted::ScriptedHandle;
    use super::*;
    use crossbeam_channel::Sender;

    fn resource(handle: ScriptedHandle) -> MediaResource {
        MediaResource::new(Box::new(handle))
    }

    #[test]
    fn ready_outcome_publishes_dimensions() {
        let mut res = resource(ScriptedHandle::ready(1920, 1080));
        assert_eq!(res.dimensions(), (0, 0));

        let info = res.await_ready(None).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(res.dimensions(), (1920, 1080));
    }

    #[test]
    fn error_outcome_is_a_load_error() {
        let mut res = resource(ScriptedHandle::failing("decode failed"));
        let err = res.await_ready(None).unwrap_err();
        assert_eq!(err, SourceError::Load("decode failed".to_string()));
        assert_eq!(res.dimensions(), (0, 0));
    }

    #[test]
    fn listeners_attach_once() {
        let handle = ScriptedHandle::ready(8, 8);
        let counters = handle.counters();
        let mut res = resource(handle);

        res.begin_load();
        res.begin_load();
        res.await_ready(None).unwrap();
        res.await_ready(None).unwrap();

        assert_eq!(counters.loads(), 1);
    }

    #[test]
    fn first_terminal_event_wins() {
        // A handle that reports success and then an error; only the first
        // event may decide the outcome.
        struct Noisy;
        impl PlaybackHandle for Noisy {
            fn begin_load(&mut self, events: Sender<MediaEvent>) {
                let _ = events.send(MediaEvent::Loaded(MediaInfo {
                    width: 16,
                    height: 9,
                    frame_rate: 30.0,
                    duration_secs: 0.5,
                }));
                let _ = events.send(MediaEvent::Error("late error".to_string()));
            }
            fn play(&mut self) {}
            fn pause(&mut self) {}
            fn is_playing(&self) -> bool {
                false
            }
            fn poll_frame(&mut self) -> Option<VideoFrame> {
                None
            }
            fn shutdown(&mut self) {}
        }

        let mut res = MediaResource::new(Box::new(Noisy));
        assert!(res.await_ready(None).is_ok());
        // The late error is ignored on every later look.
        assert!(res.await_ready(None).is_ok());
        assert_eq!(res.dimensions(), (16, 9));
    }

    #[test]
    fn timeout_when_the_engine_never_answers() {
        let mut res = resource(ScriptedHandle::silent());
        let limit = Duration::from_millis(25);
        let err = res.await_ready(Some(limit)).unwrap_err();
        assert_eq!(err, SourceError::Timeout(limit));
    }

    #[test]
    fn destroy_is_idempotent_and_gates_await() {
        let handle = ScriptedHandle::ready(4, 4);
        let counters = handle.counters();
        let mut res = resource(handle);

        res.destroy();
        res.destroy();
        assert!(res.is_destroyed());
        assert_eq!(counters.shutdowns(), 1);

        assert_eq!(res.await_ready(None).unwrap_err(), SourceError::Destroyed);
        assert_eq!(res.dimensions(), (0, 0));
        assert!(res.poll_frame().is_none());
    }

    #[test]
    fn destroyed_resource_ignores_playback_requests() {
        let mut res = resource(ScriptedHandle::ready(4, 4));
        res.await_ready(None).unwrap();
        res.destroy();
        res.play();
        assert!(!res.is_playing());
    }
}
