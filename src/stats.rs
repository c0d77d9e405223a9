// ============================================================================
// stats.rs — Life GPU
// Frame rate and generation throughput for the UI strip.
// ============================================================================

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples kept for the throughput plot (one per second).
pub const HISTORY_LEN: usize = 120;

const WINDOW: Duration = Duration::from_secs(1);

pub struct FrameStats {
    started: Instant,
    last_frame: Option<Instant>,
    fps: f32,

    // Generations counted in the running one-second window.
    window_start: Instant,
    window_generations: u32,
    gens_per_sec: f32,

    // (seconds since start, generations/sec)
    history: VecDeque<[f64; 2]>,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self {
            started: now,
            last_frame: None,
            fps: 0.0,
            window_start: now,
            window_generations: 0,
            gens_per_sec: 0.0,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Account for one presented frame; `generated` is whether the frame's
    /// tick produced a generation.
    pub fn frame(&mut self, now: Instant, generated: bool) {
        // FPS (exponential moving average)
        if let Some(last) = self.last_frame {
            let dt = now.duration_since(last).as_secs_f32().max(0.0001);
            self.fps = if self.fps == 0.0 {
                1.0 / dt
            } else {
                self.fps * 0.95 + (1.0 / dt) * 0.05
            };
        }
        self.last_frame = Some(now);

        if generated {
            self.window_generations += 1;
        }
        let window = now.duration_since(self.window_start);
        if window >= WINDOW {
            self.gens_per_sec = self.window_generations as f32 / window.as_secs_f32();
            self.window_generations = 0;
            self.window_start = now;

            if self.history.len() == HISTORY_LEN {
                self.history.pop_front();
            }
            let t = now.duration_since(self.started).as_secs_f64();
            self.history.push_back([t, self.gens_per_sec as f64]);
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn gens_per_sec(&self) -> f32 {
        self.gens_per_sec
    }

    pub fn history(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.history.iter().copied()
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        now.duration_since(self.started)
    }
}
