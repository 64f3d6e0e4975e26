use std::time::{Duration, Instant};

/// Holds a loop to a target rate.
///
/// The camera normally blocks on its own exposure clock, so the pacer only
/// sleeps when a backend hands frames back faster than the target cadence.
pub struct FramePacer {
    target_fps: f64,
    frame_duration: Duration,
    next_frame_time: Option<Instant>,
    frames_paced: u64,
    resyncs: u64,
}

impl FramePacer {
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 1.0 };
        Self {
            target_fps: fps,
            frame_duration: Duration::from_secs_f64(1.0 / fps),
            next_frame_time: None,
            frames_paced: 0,
            resyncs: 0,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Block until the next frame slot. The first call returns immediately.
    pub fn wait_for_next_frame(&mut self) {
        let now = Instant::now();
        let Some(next) = self.next_frame_time else {
            self.next_frame_time = Some(now + self.frame_duration);
            self.frames_paced += 1;
            return;
        };

        // More than three slots behind: start counting again from now.
        if now > next + self.frame_duration * 3 {
            self.next_frame_time = Some(now + self.frame_duration);
            self.frames_paced += 1;
            self.resyncs += 1;
            return;
        }

        if now < next {
            std::thread::sleep(next - now);
        }

        self.next_frame_time = Some(next + self.frame_duration);
        self.frames_paced += 1;
    }

    pub fn stats(&self) -> PacerStats {
        PacerStats {
            frames_paced: self.frames_paced,
            resyncs: self.resyncs,
            target_fps: self.target_fps,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PacerStats {
    pub frames_paced: u64,
    pub resyncs: u64,
    pub target_fps: f64,
}

impl PacerStats {
    pub fn effective_fps(&self, elapsed: Duration) -> f64 {
        if elapsed.as_secs_f64() > 0.0 {
            self.frames_paced as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_loop_to_target_rate() {
        let mut pacer = FramePacer::new(50.0);
        let start = Instant::now();
        for _ in 0..5 {
            pacer.wait_for_next_frame();
        }
        // Four waits of 20ms after the free first slot.
        assert!(start.elapsed() >= Duration::from_millis(75));
        assert_eq!(pacer.stats().frames_paced, 5);
    }

    #[test]
    fn invalid_rate_falls_back_to_one_hz() {
        let pacer = FramePacer::new(0.0);
        assert_eq!(pacer.frame_duration(), Duration::from_secs(1));
        let pacer = FramePacer::new(f64::NAN);
        assert_eq!(pacer.stats().target_fps, 1.0);
    }

    #[test]
    fn resyncs_after_long_stall() {
        let mut pacer = FramePacer::new(100.0);
        pacer.wait_for_next_frame();
        std::thread::sleep(Duration::from_millis(60));
        let before = Instant::now();
        pacer.wait_for_next_frame();
        assert!(before.elapsed() < Duration::from_millis(10));
        assert_eq!(pacer.stats().resyncs, 1);
    }
}
