//! Bounded-cadence refresh scheduling.
//!
//! The scheduler decides when a playing texture source should mark its pixel
//! content dirty, independent of the media's native frame rate. High-rate
//! media gets throttled to the configured cadence; off-screen sources can be
//! dialed down without touching playback.
//!
//! # Timing model
//!
//! Caller-pumped: the host render loop calls [`tick`](RefreshScheduler::tick)
//! once per frame with its own clock. An fps of zero means every pump marks
//! dirty (the ambient cadence is whatever rate the host runs at). Boundary
//! accounting advances the reference mark by whole intervals, so a slow pump
//! doesn't accumulate drift.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RefreshScheduler {
    fps: f32,
    active: bool,
    last_mark: Option<Instant>,
}

impl RefreshScheduler {
    pub fn new(fps: f32) -> Self {
        Self {
            fps: sanitize(fps),
            active: false,
            last_mark: None,
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Retime in place. The last mark is kept, so already-elapsed phase
    /// carries over to the new cadence; no reload or restart is needed.
    pub fn set_fps(&mut self, fps: f32) {
        self.fps = sanitize(fps);
    }

    pub fn start(&mut self, now: Instant) {
        if !self.active {
            self.active = true;
            self.last_mark = Some(now);
        }
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.last_mark = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a cadence boundary passed since the last mark. Never blocks;
    /// a stopped scheduler never reports one.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.active {
            return false;
        }
        if self.fps <= 0.0 {
            // Ambient default: every pump.
            return true;
        }
        let interval = Duration::from_secs_f64(1.0 / f64::from(self.fps));
        let Some(last) = self.last_mark else {
            self.last_mark = Some(now);
            return true;
        };
        let elapsed = now.saturating_duration_since(last);
        if elapsed < interval {
            return false;
        }
        let steps = (elapsed.as_secs_f64() / interval.as_secs_f64()).floor() as u32;
        self.last_mark = Some(last + interval * steps);
        true
    }
}

fn sanitize(fps: f32) -> f32 {
    if fps.is_finite() && fps > 0.0 { fps } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> impl Fn(u64) -> Instant {
        let t0 = Instant::now();
        move |ms| t0 + Duration::from_millis(ms)
    }

    #[test]
    fn inactive_scheduler_never_marks() {
        let at = clock();
        let mut sched = RefreshScheduler::new(0.0);
        assert!(!sched.tick(at(0)));
        assert!(!sched.tick(at(1000)));
    }

    #[test]
    fn zero_fps_marks_every_pump() {
        let at = clock();
        let mut sched = RefreshScheduler::new(0.0);
        sched.start(at(0));
        assert!(sched.tick(at(1)));
        assert!(sched.tick(at(2)));
        assert!(sched.tick(at(3)));
    }

    #[test]
    fn cadence_boundaries_follow_fps() {
        let at = clock();
        let mut sched = RefreshScheduler::new(10.0); // 100ms interval
        sched.start(at(0));
        assert!(!sched.tick(at(16)));
        assert!(!sched.tick(at(99)));
        assert!(sched.tick(at(100)));
        assert!(!sched.tick(at(150)));
        assert!(sched.tick(at(205)));
    }

    #[test]
    fn whole_interval_accounting_avoids_drift() {
        let at = clock();
        let mut sched = RefreshScheduler::new(10.0);
        sched.start(at(0));
        // A long stall crosses several boundaries at once; the next one is
        // still aligned to the same 100ms grid.
        assert!(sched.tick(at(250)));
        assert!(!sched.tick(at(290)));
        assert!(sched.tick(at(300)));
    }

    #[test]
    fn retiming_preserves_phase() {
        let at = clock();
        let mut sched = RefreshScheduler::new(10.0);
        sched.start(at(0));
        assert!(sched.tick(at(100)));

        // Halving the cadence: the elapsed 40ms still count toward the next
        // 200ms boundary measured from the last mark.
        sched.set_fps(5.0);
        assert!((sched.fps() - 5.0).abs() < f32::EPSILON);
        assert!(!sched.tick(at(140)));
        assert!(!sched.tick(at(299)));
        assert!(sched.tick(at(300)));
    }

    #[test]
    fn stop_silences_and_start_rebases() {
        let at = clock();
        let mut sched = RefreshScheduler::new(10.0);
        sched.start(at(0));
        sched.stop();
        assert!(!sched.is_active());
        assert!(!sched.tick(at(500)));

        sched.start(at(1000));
        assert!(!sched.tick(at(1050)));
        assert!(sched.tick(at(1100)));
    }

    #[test]
    fn garbage_fps_degrades_to_ambient() {
        let mut sched = RefreshScheduler::new(f32::NAN);
        assert!((sched.fps() - 0.0).abs() < f32::EPSILON);
        sched.set_fps(-5.0);
        assert!((sched.fps() - 0.0).abs() < f32::EPSILON);
    }
}
