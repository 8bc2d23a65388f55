//! One Euro low-pass filter over 3D positions.
//!
//! Smooth when the input is slow, responsive when it moves fast. Parameters
//! and running state are kept apart so a configured filter can be copied
//! around and reset without losing its tuning.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::math::SMALL_NUMBER;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneEuroParams {
    /// Minimum cutoff frequency (Hz), lower is smoother at rest.
    pub min_cutoff: f32,
    /// How fast the cutoff opens up with speed, higher is less lag on fast motion.
    pub cutoff_slope: f32,
    /// Cutoff frequency (Hz) for the derivative estimate.
    pub delta_cutoff: f32,
}

impl Default for OneEuroParams {
    fn default() -> Self { Self { min_cutoff: 0.1, cutoff_slope: 10.0, delta_cutoff: 10.0 } }
}

#[derive(Debug, Clone, Copy)]
struct LowPass {
    previous: Vector3<f32>,
    primed: bool,
}

impl Default for LowPass {
    fn default() -> Self { Self { previous: Vector3::zeros(), primed: false } }
}

impl LowPass {
    fn filter(&mut self, value: Vector3<f32>, alpha: Vector3<f32>) -> Vector3<f32> {
        if !self.primed {
            self.previous = value;
            self.primed = true;
        }

        let out = alpha.component_mul(&value) + (Vector3::repeat(1.0) - alpha).component_mul(&self.previous);
        self.previous = out;
        out
    }
}

fn smoothing_factor(cutoff: f32, dt: f32) -> f32 {
    let tau = 1.0 / (2.0 * PI * cutoff.max(SMALL_NUMBER));
    1.0 / (1.0 + tau / dt)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OneEuroFilter {
    pub params: OneEuroParams,
    raw: LowPass,
    delta: LowPass,
    previous_raw: Option<Vector3<f32>>,
}

impl OneEuroFilter {
    pub fn new(params: OneEuroParams) -> Self { Self { params, ..Default::default() } }

    /// Filter a single sample taken `dt` seconds after the previous one.
    pub fn run(&mut self, raw: Vector3<f32>, dt: f32) -> Vector3<f32> {
        if dt <= 0.0 {
            return if self.raw.primed { self.raw.previous } else { raw };
        }

        let velocity = match self.previous_raw {
            Some(previous) => (raw - previous) / dt,
            None => Vector3::zeros(),
        };
        self.previous_raw = Some(raw);

        let estimated = self.delta.filter(velocity, Vector3::repeat(smoothing_factor(self.params.delta_cutoff, dt)));
        let alpha =
            estimated.map(|speed| smoothing_factor(self.params.min_cutoff + self.params.cutoff_slope * speed.abs(), dt));

        self.raw.filter(raw, alpha)
    }

    /// Drop the running state, keeping the parameters.
    pub fn reset(&mut self) { *self = Self::new(self.params); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_sample_passes_through() {
        let mut filter = OneEuroFilter::new(OneEuroParams::default());
        let sample = Vector3::new(3.0, -1.0, 2.0);
        assert_relative_eq!(filter.run(sample, 0.016), sample);
    }

    #[test]
    fn settles_on_constant_input() {
        let mut filter = OneEuroFilter::new(OneEuroParams { min_cutoff: 5.0, cutoff_slope: 0.0, delta_cutoff: 20.0 });
        filter.run(Vector3::zeros(), 0.016);

        let target = Vector3::new(10.0, 0.0, 0.0);
        let mut out = Vector3::zeros();
        for _ in 0..200 {
            out = filter.run(target, 0.016);
        }
        assert_relative_eq!(out, target, epsilon = 1.0e-3);
    }

    #[test]
    fn lags_behind_a_step() {
        let mut filter = OneEuroFilter::new(OneEuroParams { min_cutoff: 1.0, cutoff_slope: 0.0, delta_cutoff: 1.0 });
        filter.run(Vector3::zeros(), 0.016);
        let out = filter.run(Vector3::new(1.0, 0.0, 0.0), 0.016);
        assert!(out.x > 0.0 && out.x < 0.5);
    }

    #[test]
    fn faster_motion_opens_cutoff() {
        let slow = OneEuroParams { min_cutoff: 1.0, cutoff_slope: 0.0, delta_cutoff: 10.0 };
        let fast = OneEuroParams { cutoff_slope: 10.0, ..slow };

        let step = |params| {
            let mut filter = OneEuroFilter::new(params);
            filter.run(Vector3::zeros(), 0.016);
            filter.run(Vector3::new(1.0, 0.0, 0.0), 0.016).x
        };
        assert!(step(fast) > step(slow));
    }

    #[test]
    fn reset_keeps_params() {
        let params = OneEuroParams { min_cutoff: 2.0, cutoff_slope: 3.0, delta_cutoff: 4.0 };
        let mut filter = OneEuroFilter::new(params);
        filter.run(Vector3::new(1.0, 1.0, 1.0), 0.016);
        filter.reset();

        assert_eq!(filter.params, params);
        let sample = Vector3::new(-5.0, 0.0, 0.0);
        assert_relative_eq!(filter.run(sample, 0.016), sample);
    }
}
