//! Motion sampler: rate-limited speed of a tracked point in m/s.
//!
//! Advisory telemetry only; the phase machine never reads it. A tick without
//! a usable point or scale leaves the previous sample untouched, so the next
//! reading simply spans a longer interval.

use serde::Serialize;
use tracing::debug;

use crate::config::SamplerConfig;
use crate::geometry::{planar_distance, Vector2};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedReading {
    pub speed_mps: f64,
    pub elapsed_s: f64,
    /// Differs from the last reported speed by more than the display delta.
    pub significant: bool,
}

pub struct MotionSampler {
    update_interval_ms: u64,
    display_delta_mps: f64,
    previous: Option<(Vector2, u64)>,
    reported_speed: f64,
}

impl MotionSampler {
    pub fn new(cfg: &SamplerConfig) -> Self {
        Self {
            update_interval_ms: cfg.update_interval_ms,
            display_delta_mps: cfg.display_delta_mps,
            previous: None,
            reported_speed: 0.0,
        }
    }

    /// Feed one tick. `scale` is meters per pixel for this tick.
    pub fn update(
        &mut self,
        point: Option<Vector2>,
        scale: Option<f64>,
        now_ms: u64,
    ) -> Option<SpeedReading> {
        let point = point?;

        let Some((prev_point, prev_ms)) = self.previous else {
            self.previous = Some((point, now_ms));
            return None;
        };

        let elapsed_ms = now_ms.saturating_sub(prev_ms);
        if elapsed_ms < self.update_interval_ms || elapsed_ms == 0 {
            return None;
        }
        let scale = scale?;

        let elapsed_s = elapsed_ms as f64 / 1000.0;
        let speed_mps = planar_distance(prev_point, point) * scale / elapsed_s;
        self.previous = Some((point, now_ms));

        let significant = (speed_mps - self.reported_speed).abs() > self.display_delta_mps;
        if significant {
            self.reported_speed = speed_mps;
        }
        debug!("Speed {:.2} m/s over {:.3}s", speed_mps, elapsed_s);

        Some(SpeedReading {
            speed_mps,
            elapsed_s,
            significant,
        })
    }

    /// Last speed that passed the display delta.
    pub fn reported_speed(&self) -> f64 {
        self.reported_speed
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.reported_speed = 0.0;
    }
}
