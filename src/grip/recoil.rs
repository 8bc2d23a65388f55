//! Recoil offset for held weapons.
//!
//! Impulses land on a target pose immediately. A storage pose chases the target
//! at `lerp_rate` while the target itself decays back to identity at
//! `decay_rate`, which gives a sharp kick followed by a smooth settle.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::math::{KINDA_SMALL_NUMBER, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoilSettings {
    pub enabled: bool,
    pub max_translation: Vector3<f32>,
    /// Degrees, as (roll, pitch, yaw).
    pub max_rotation: Vector3<f32>,
    pub max_scale: Vector3<f32>,
    pub decay_rate: f32,
    pub lerp_rate: f32,
}

impl Default for RecoilSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_translation: Vector3::zeros(),
            max_rotation: Vector3::zeros(),
            max_scale: Vector3::repeat(1.0),
            decay_rate: 20.0,
            lerp_rate: 30.0,
        }
    }
}

/// Impulse with the given translation and (roll, pitch, yaw) kick in degrees.
/// Scale is left as a zero delta.
pub fn recoil_impulse(translation: Vector3<f32>, rotation_degrees: Vector3<f32>) -> Pose {
    let rotation = UnitQuaternion::from_euler_angles(
        rotation_degrees.x.to_radians(),
        rotation_degrees.y.to_radians(),
        rotation_degrees.z.to_radians(),
    );
    Pose { position: translation, rotation, scale: Vector3::zeros() }
}

// Bounds always include zero, so a max of -2 allows [-2, 0].
fn clamp_axes(value: &Vector3<f32>, max: &Vector3<f32>) -> Vector3<f32> {
    value.zip_map(max, |v, m| v.clamp(m.min(0.0), m.max(0.0)))
}

#[derive(Debug, Clone, Copy)]
pub struct RecoilAccumulator {
    pub settings: RecoilSettings,
    target: Pose,
    storage: Pose,
    active: bool,
}

impl RecoilAccumulator {
    pub fn new(settings: RecoilSettings) -> Self {
        Self { settings, target: Pose::identity(), storage: Pose::identity(), active: false }
    }

    pub fn is_active(&self) -> bool { self.active }

    /// Offset to stack in front of the grip transform.
    pub fn offset(&self) -> &Pose { &self.storage }

    pub fn target(&self) -> &Pose { &self.target }

    pub fn add_recoil(&mut self, impulse: &Pose) {
        if !self.settings.enabled {
            return;
        }

        let mut target = self.target + *impulse;
        target.position = clamp_axes(&target.position, &self.settings.max_translation);
        target.scale = clamp_axes(&target.scale, &self.settings.max_scale);
        let euler = clamp_axes(&target.euler_degrees(), &self.settings.max_rotation);
        target.set_euler_degrees(&euler);

        self.target = target;
        self.active = !self.target.is_identity(KINDA_SMALL_NUMBER);
    }

    pub fn tick(&mut self, dt: f32) {
        if !self.settings.enabled || !self.active {
            return;
        }

        let rise = (self.settings.lerp_rate * dt).clamp(0.0, 1.0);
        let decay = (self.settings.decay_rate * dt).clamp(0.0, 1.0);
        self.storage = Pose::blend(&self.storage, &self.target, rise);
        self.target = Pose::blend(&self.target, &Pose::identity(), decay);
        self.active = !self.target.is_identity(KINDA_SMALL_NUMBER);

        if !self.active {
            log::trace!("recoil settled");
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.target = Pose::identity();
        self.storage = Pose::identity();
        self.active = false;
    }
}
