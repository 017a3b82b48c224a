//! Frame timing.
//!
//! Produces clamped delta times for the audio phases and limits the loop to
//! the target rate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Largest delta handed to the frame phases, in seconds.
const MAX_DT: f64 = 0.25;

/// Frames kept for the rolling average.
const MAX_SAMPLES: usize = 120;

/// Frame timing manager.
#[derive(Debug)]
pub struct FrameTiming {
    /// Target frames per second
    target_fps: u32,
    /// Time budget per frame
    frame_budget: Duration,
    /// Start of the previous frame
    last_frame: Instant,
    /// When timing started
    started: Instant,
    /// Recent frame times for averaging
    frame_times: VecDeque<f64>,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameTiming {
    /// Create a frame timer limited to `target_fps`.
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        let target_fps = target_fps.max(1);
        let now = Instant::now();
        Self {
            target_fps,
            frame_budget: Duration::from_secs_f64(1.0 / f64::from(target_fps)),
            last_frame: now,
            started: now,
            frame_times: VecDeque::with_capacity(MAX_SAMPLES),
        }
    }

    /// Seconds since the previous call, clamped to [`MAX_DT`].
    pub fn delta_time(&mut self) -> f64 {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f64().min(MAX_DT);
        self.last_frame = now;

        self.frame_times.push_back(dt);
        if self.frame_times.len() > MAX_SAMPLES {
            self.frame_times.pop_front();
        }
        dt
    }

    /// Sleep away whatever is left of the frame budget.
    pub fn sleep_remainder(&self) {
        let elapsed = self.last_frame.elapsed();
        if elapsed < self.frame_budget {
            std::thread::sleep(self.frame_budget - elapsed);
        }
    }

    /// Time since the timer was created or reset.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Average FPS over recent frames.
    #[must_use]
    pub fn current_fps(&self) -> f64 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        let avg = self.frame_times.iter().sum::<f64>() / self.frame_times.len() as f64;
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    /// Target FPS.
    #[must_use]
    pub const fn target_fps(&self) -> u32 {
        self.target_fps
    }

    /// Forget history (after a pause or a long load).
    pub fn reset(&mut self) {
        self.last_frame = Instant::now();
        self.frame_times.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timing_creation() {
        let timing = FrameTiming::new(0);
        assert_eq!(timing.target_fps(), 1);
        assert!(timing.current_fps().abs() < f64::EPSILON);
    }

    #[test]
    fn test_frame_timing_delta() {
        let mut timing = FrameTiming::new(60);
        std::thread::sleep(Duration::from_millis(16));
        let dt = timing.delta_time();
        assert!(dt >= 0.015);
        assert!(dt <= MAX_DT);
    }

    #[test]
    fn test_frame_timing_max_dt() {
        let mut timing = FrameTiming::new(60);
        std::thread::sleep(Duration::from_millis(300));
        assert!(timing.delta_time() <= MAX_DT);
    }

    #[test]
    fn test_reset_timing() {
        let mut timing = FrameTiming::new(60);
        timing.delta_time();
        assert!(timing.current_fps() > 0.0);

        timing.reset();
        assert!(timing.frame_times.is_empty());
    }
}
