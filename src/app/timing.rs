use std::time::{Duration, Instant};

pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    fps: f32,
    pub frame_dt: f32,
}

impl FrameTiming {
    pub fn new(now: Instant) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: now,
            frame_count: 0,
            fps: 0.0,
            frame_dt: 1.0 / 60.0,
        }
    }

    /// Measures the delta since the previous frame. Returns true when a new
    /// fps sample is available.
    pub fn update(&mut self, now: Instant) -> bool {
        let dt_duration = if let Some(last) = self.last_frame_time {
            now.saturating_duration_since(last)
        } else {
            Duration::from_millis(16)
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().max(0.0);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
            self.frame_count = 0;
            self.last_fps_time = now;
            return true;
        }
        false
    }

    /// The next frame uses the nominal delta instead of the time spent blocked.
    pub fn reset(&mut self) {
        self.last_frame_time = None;
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// Best-effort frame cap: sleeps out what is left of the budget, never
/// carrying debt from an overrunning frame.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    budget: Duration,
}

impl FramePacer {
    pub fn from_fps(fps: f32) -> Self {
        Self {
            budget: Duration::from_secs_f32(1.0 / fps.max(1.0)),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self, spent: Duration) -> Option<Duration> {
        self.budget.checked_sub(spent).filter(|wait| !wait.is_zero())
    }

    pub fn pace(&self, frame_start: Instant) {
        if let Some(wait) = self.remaining(frame_start.elapsed()) {
            std::thread::sleep(wait);
        }
    }
}

pub fn status_title(base: &str, multiplier: f32, fps: f32) -> String {
    format!("{} - Speed: {:.1}x - {:.1} fps", base, multiplier, fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_frame_waits_out_the_budget() {
        let pacer = FramePacer::from_fps(60.0);
        let spent = Duration::from_millis(4);
        assert_eq!(pacer.remaining(spent), Some(pacer.budget() - spent));
    }

    #[test]
    fn long_frame_does_not_wait() {
        let pacer = FramePacer::from_fps(60.0);
        assert_eq!(pacer.remaining(Duration::from_millis(40)), None);
        assert_eq!(pacer.remaining(pacer.budget()), None);
    }

    #[test]
    fn pace_returns_immediately_after_overrun() {
        let pacer = FramePacer::from_fps(60.0);
        let start = Instant::now() - Duration::from_millis(100);
        let before = Instant::now();
        pacer.pace(start);
        assert!(before.elapsed() < pacer.budget());
    }

    #[test]
    fn pace_sleeps_for_short_frames() {
        let pacer = FramePacer::from_fps(60.0);
        let start = Instant::now();
        pacer.pace(start);
        assert!(start.elapsed() >= pacer.budget());
    }

    #[test]
    fn first_frame_uses_nominal_delta() {
        let start = Instant::now();
        let mut timing = FrameTiming::new(start);
        timing.update(start);
        assert!((timing.frame_dt - 0.016).abs() < 1e-6);

        timing.update(start + Duration::from_millis(50));
        assert!((timing.frame_dt - 0.05).abs() < 1e-6);
    }

    #[test]
    fn reset_discards_blocked_time() {
        let start = Instant::now();
        let mut timing = FrameTiming::new(start);
        timing.update(start);
        timing.reset();
        timing.update(start + Duration::from_secs(10));
        assert!((timing.frame_dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn fps_sample_every_half_second() {
        let start = Instant::now();
        let mut timing = FrameTiming::new(start);
        let samples = (1..=30u64)
            .filter(|frame| timing.update(start + Duration::from_millis(frame * 20)))
            .count();
        assert_eq!(samples, 1);
        assert!((timing.fps() - 50.0).abs() < 1.0);
    }

    #[test]
    fn title_shows_speed_and_fps() {
        assert_eq!(
            status_title("Mesh Viewer - a.obj", 5.0, 59.94),
            "Mesh Viewer - a.obj - Speed: 5.0x - 59.9 fps"
        );
    }
}
