//! Pose type and the interpolation helpers the grip scripts are built from.
//!
//! Conventions: Z up, right handed. Composition reads left to right, so
//! `child * parent` yields the child expressed in the parent's space, the same
//! way a relative grip transform is stacked onto the holder's transform.

use nalgebra::{DualQuaternion, Isometry3, Quaternion, Translation3, Unit, UnitDualQuaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// Tolerance used for pose equality and "has converged" checks.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;
/// Floor for lengths and denominators.
pub const SMALL_NUMBER: f32 = 1.0e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Pose {
    fn default() -> Self { Self::identity() }
}

impl Pose {
    pub fn identity() -> Self {
        Self { position: Vector3::zeros(), rotation: UnitQuaternion::identity(), scale: Vector3::repeat(1.0) }
    }

    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self { position, rotation, scale: Vector3::repeat(1.0) }
    }

    pub fn from_translation(position: Vector3<f32>) -> Self { Self::new(position, UnitQuaternion::identity()) }

    pub fn from_rotation(rotation: UnitQuaternion<f32>) -> Self { Self::new(Vector3::zeros(), rotation) }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    /// Copy of this pose with the orientation pulled back onto the unit sphere.
    pub fn normalized(&self) -> Self { Self { rotation: renormalize(&self.rotation), ..*self } }

    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * point.component_mul(&self.scale) + self.position
    }

    pub fn transform_vector(&self, vector: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * vector.component_mul(&self.scale)
    }

    pub fn isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.rotation)
    }

    /// Component-wise comparison. `q` and `-q` describe the same orientation and
    /// compare equal.
    pub fn equals(&self, other: &Pose, tolerance: f32) -> bool {
        let near = |a: &Vector3<f32>, b: &Vector3<f32>| (a - b).iter().all(|d| d.abs() <= tolerance);
        let q = self.rotation.coords;
        let r = other.rotation.coords;
        let rotation_equal =
            (q - r).iter().all(|d| d.abs() <= tolerance) || (q + r).iter().all(|d| d.abs() <= tolerance);

        near(&self.position, &other.position) && near(&self.scale, &other.scale) && rotation_equal
    }

    pub fn is_identity(&self, tolerance: f32) -> bool { self.equals(&Pose::identity(), tolerance) }

    /// Rotation as (roll, pitch, yaw) in degrees.
    pub fn euler_degrees(&self) -> Vector3<f32> {
        let (roll, pitch, yaw) = self.rotation.euler_angles();
        Vector3::new(roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
    }

    pub fn set_euler_degrees(&mut self, euler: &Vector3<f32>) {
        self.rotation = UnitQuaternion::from_euler_angles(
            euler.x.to_radians(),
            euler.y.to_radians(),
            euler.z.to_radians(),
        );
    }

    /// Quaternion blend: translation and scale are lerped, orientation takes the
    /// normalized lerp along the shorter arc. Alphas at either end return the
    /// endpoint untouched.
    pub fn blend(a: &Pose, b: &Pose, alpha: f32) -> Pose {
        if alpha <= KINDA_SMALL_NUMBER {
            return *a;
        }
        if alpha >= 1.0 - KINDA_SMALL_NUMBER {
            return *b;
        }

        Pose {
            position: a.position.lerp(&b.position, alpha),
            rotation: fast_lerp(&a.rotation, &b.rotation, alpha),
            scale: a.scale.lerp(&b.scale, alpha),
        }
    }

    /// Euler blend: roll, pitch and yaw are interpolated independently with no
    /// wrap-around handling.
    pub fn blend_euler(a: &Pose, b: &Pose, alpha: f32) -> Pose {
        let ea = a.euler_degrees();
        let eb = b.euler_degrees();
        let mut out = Pose {
            position: a.position.lerp(&b.position, alpha),
            rotation: UnitQuaternion::identity(),
            scale: a.scale.lerp(&b.scale, alpha),
        };
        out.set_euler_degrees(&(ea + (eb - ea) * alpha));
        out
    }

    /// Dual quaternion blend. Handles screw motion between the poses; `b` is
    /// flipped onto `a`'s hemisphere first so the shorter rotation is taken.
    pub fn blend_dual_quat(a: &Pose, b: &Pose, alpha: f32) -> Pose {
        let a = a.normalized();
        let mut b = b.normalized();

        if a.rotation.coords.dot(&b.rotation.coords) < 0.0 {
            b.rotation = Unit::new_unchecked(-b.rotation.into_inner());
        }

        let da = UnitDualQuaternion::from_isometry(&a.isometry()).into_inner();
        let db = UnitDualQuaternion::from_isometry(&b.isometry()).into_inner();
        let blended = DualQuaternion::from_real_and_dual(
            da.real * (1.0 - alpha) + db.real * alpha,
            da.dual * (1.0 - alpha) + db.dual * alpha,
        );
        let iso = UnitDualQuaternion::new_normalize(blended).to_isometry();

        Pose { position: iso.translation.vector, rotation: iso.rotation, scale: a.scale.lerp(&b.scale, alpha) }
    }
}

/// `child * parent`: applies `child` first, then `parent`.
impl Mul for Pose {
    type Output = Pose;

    fn mul(self, parent: Pose) -> Pose {
        Pose {
            position: parent.transform_point(&self.position),
            rotation: renormalize(&(parent.rotation * self.rotation)),
            scale: self.scale.component_mul(&parent.scale),
        }
    }
}

/// Accumulation used to stack recoil impulses: translation and scale add up,
/// rotations compose.
impl Add for Pose {
    type Output = Pose;

    fn add(self, other: Pose) -> Pose {
        Pose {
            position: self.position + other.position,
            rotation: renormalize(&(other.rotation * self.rotation)),
            scale: self.scale + other.scale,
        }
    }
}

pub fn renormalize(q: &UnitQuaternion<f32>) -> UnitQuaternion<f32> { UnitQuaternion::new_normalize(q.into_inner()) }

/// Normalized lerp taking the shorter arc.
pub fn fast_lerp(a: &UnitQuaternion<f32>, b: &UnitQuaternion<f32>, alpha: f32) -> UnitQuaternion<f32> {
    let bias = if a.coords.dot(&b.coords) >= 0.0 { 1.0 } else { -1.0 };
    let coords = a.coords * (1.0 - alpha) + b.coords * (alpha * bias);
    UnitQuaternion::new_normalize(Quaternion::from_vector(coords))
}

/// Shortest-arc rotation taking the direction of `from` onto the direction of
/// `to`. Zero-length input yields identity. Antiparallel input rotates half a
/// turn around an axis derived only from `from`, so the result is stable from
/// frame to frame.
pub fn find_between(from: &Vector3<f32>, to: &Vector3<f32>) -> UnitQuaternion<f32> {
    let (Some(a), Some(b)) = (from.try_normalize(SMALL_NUMBER), to.try_normalize(SMALL_NUMBER)) else {
        return UnitQuaternion::identity();
    };

    let w = 1.0 + a.dot(&b);
    let q = if w >= 1.0e-6 {
        Quaternion::from_parts(w, a.cross(&b))
    } else {
        let axis = if a.x.abs() > a.z.abs() { Vector3::new(-a.y, a.x, 0.0) } else { Vector3::new(0.0, -a.z, a.y) };
        Quaternion::from_parts(0.0, axis)
    };

    UnitQuaternion::new_normalize(q)
}

/// Keeps only the heading of `rotation`. When the forward axis points straight
/// up or down, the up axis stands in for it.
pub fn pure_yaw(rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let forward = rotation * Vector3::x();
    let heading = if forward.xy().norm_squared() > KINDA_SMALL_NUMBER {
        forward
    } else {
        rotation * Vector3::z() * -forward.z.signum()
    };

    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), heading.y.atan2(heading.x))
}
