//! Frame clock for the simulation driver.
//!
//! Provides the single source of per-frame time: elapsed seconds, the delta
//! between consecutive `update` calls, pause bookkeeping, and an optional
//! fixed delta for deterministic stepping.

use std::time::{Duration, Instant};

/// Monotonic frame clock.
///
/// While paused, `delta()` is 0 and `elapsed()` stops increasing; resuming
/// continues from where the clock stopped rather than jumping.
#[derive(Debug)]
pub struct Time {
    /// When the clock was created or last reset.
    start: Instant,
    /// When the last frame occurred.
    last_frame: Instant,
    /// Total elapsed time in seconds, excluding paused spans.
    elapsed_secs: f32,
    /// Time since last frame in seconds.
    delta_secs: f32,
    /// Total frames since start.
    frame_count: u64,
    /// Whether the clock is paused.
    paused: bool,
    /// When the current pause began, if paused.
    paused_at: Option<Instant>,
    /// Accumulated paused time, subtracted from elapsed.
    pause_elapsed: Duration,
    /// Fixed delta time for deterministic updates (optional).
    fixed_delta: Option<f32>,
}

impl Time {
    /// Create a new clock starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            paused: false,
            paused_at: None,
            pause_elapsed: Duration::ZERO,
            fixed_delta: None,
        }
    }

    /// Update timing values. Call once per frame.
    ///
    /// Returns `(elapsed_time, delta_time)` for convenience.
    pub fn update(&mut self) -> (f32, f32) {
        let now = Instant::now();

        if self.paused {
            self.delta_secs = 0.0;
            return (self.elapsed_secs, self.delta_secs);
        }

        let raw_delta = now.duration_since(self.last_frame).as_secs_f32();
        self.delta_secs = self.fixed_delta.unwrap_or(raw_delta);
        self.last_frame = now;

        self.elapsed_secs = (now.duration_since(self.start) - self.pause_elapsed).as_secs_f32();
        self.frame_count += 1;

        (self.elapsed_secs, self.delta_secs)
    }

    /// Total elapsed time in seconds since start, excluding paused spans.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    /// Time since last frame in seconds (delta time).
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Whether the clock is currently paused.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause time progression.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.paused_at = Some(Instant::now());
        }
    }

    /// Resume time progression after pausing.
    ///
    /// Only the span between `pause` and `resume` counts as paused; active
    /// time before the pause still counts toward `elapsed`.
    pub fn resume(&mut self) {
        if self.paused {
            let now = Instant::now();
            if let Some(paused_at) = self.paused_at.take() {
                self.pause_elapsed += now.duration_since(paused_at);
            }
            self.last_frame = now;
            self.paused = false;
        }
    }

    /// Set a fixed delta time for deterministic updates.
    ///
    /// Pass `None` to use real frame timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    /// Reset the clock to zero. The fixed delta and the paused flag are
    /// kept, so resetting a paused clock leaves it paused at zero.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_frame = now;
        self.elapsed_secs = 0.0;
        self.delta_secs = 0.0;
        self.frame_count = 0;
        self.paused_at = if self.paused { Some(now) } else { None };
        self.pause_elapsed = Duration::ZERO;
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_time_new() {
        let time = Time::new();
        assert_eq!(time.frame(), 0);
        assert!(!time.is_paused());
        assert_eq!(time.delta(), 0.0);
    }

    #[test]
    fn test_time_update() {
        let mut time = Time::new();
        thread::sleep(Duration::from_millis(10));
        let (elapsed, delta) = time.update();

        assert!(elapsed > 0.0);
        assert!(delta > 0.0);
        assert_eq!(time.frame(), 1);
    }

    #[test]
    fn test_time_pause_freezes_elapsed_and_delta() {
        let mut time = Time::new();
        time.update();

        time.pause();
        assert!(time.is_paused());

        let elapsed_before = time.elapsed();
        thread::sleep(Duration::from_millis(10));
        time.update();

        assert_eq!(time.elapsed(), elapsed_before);
        assert_eq!(time.delta(), 0.0);
    }

    #[test]
    fn test_time_resume_does_not_jump() {
        let mut time = Time::new();
        time.update();
        let elapsed_before = time.pause_elapsed;

        time.pause();
        thread::sleep(Duration::from_millis(20));
        time.resume();
        time.update();

        // The paused span is accounted for rather than folded into elapsed.
        assert!(time.pause_elapsed > elapsed_before);
        assert!(time.delta() < 0.015);
    }

    #[test]
    fn test_fixed_delta() {
        let mut time = Time::new();
        time.set_fixed_delta(Some(1.0 / 60.0));

        thread::sleep(Duration::from_millis(50));
        time.update();

        let expected = 1.0 / 60.0;
        assert!((time.delta() - expected).abs() < 0.0001);
    }

    #[test]
    fn test_reset_keeps_paused_clock_paused() {
        let mut time = Time::new();
        time.update();
        time.pause();
        time.reset();

        assert!(time.is_paused());
        assert_eq!(time.elapsed(), 0.0);

        // Still paused: updating does not advance time.
        thread::sleep(Duration::from_millis(5));
        time.update();
        assert_eq!(time.delta(), 0.0);
        assert_eq!(time.elapsed(), 0.0);

        time.resume();
        thread::sleep(Duration::from_millis(5));
        time.update();
        assert!(time.delta() > 0.0);
    }

    #[test]
    fn test_active_time_before_pause_counts_as_elapsed() {
        let mut time = Time::new();
        time.update();

        // Active span not yet observed by an update call.
        thread::sleep(Duration::from_millis(30));
        time.pause();
        thread::sleep(Duration::from_millis(30));
        time.resume();
        time.update();

        // Only the pause-to-resume span is excluded from elapsed.
        assert!(time.elapsed() >= 0.025);
    }

    #[test]
    fn test_reset() {
        let mut time = Time::new();
        thread::sleep(Duration::from_millis(5));
        time.update();
        time.reset();

        assert_eq!(time.frame(), 0);
        assert_eq!(time.elapsed(), 0.0);
        assert!(!time.is_paused());
    }
}
