pub mod logger;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Packs an orientation as `[x, y, z, w]` for plotting.
pub fn pack(rotation: &UnitQuaternion<f32>) -> [f32; 4] { [rotation.i, rotation.j, rotation.k, rotation.w] }

/// Rotates `axis` by a packed orientation, giving a point on the unit sphere.
pub fn modifier(input: &[f32; 4], axis: [f32; 3]) -> [f32; 4] {
    let rotation = UnitQuaternion::try_new(Quaternion::new(input[3], input[0], input[1], input[2]), f32::EPSILON)
        .unwrap_or_else(UnitQuaternion::identity);
    let res = (rotation * Vector3::new(axis[0], axis[1], axis[2])).try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);

    // the fourth lane is unused by the trace, keep it off the graph
    [res.x, res.y, res.z, -2.0]
}
