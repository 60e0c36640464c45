//! Sensor-local to world-frame conversion of lidar returns.

use crate::quaternion::{Quaternion, mat_vec};

/// Colour written with every point (yellow).
pub const POINT_COLOR: [u8; 3] = [255, 255, 0];

/// Position plus orientation, both in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: [f64; 3],
    pub orientation: Quaternion,
}

impl Pose {
    pub const fn new(position: [f64; 3], orientation: Quaternion) -> Self {
        Pose {
            position,
            orientation,
        }
    }

    /// Pose of a frame mounted at `child` relative to this one.
    pub fn compose(&self, child: Pose) -> Pose {
        let offset = self.orientation.rotate(child.position);
        Pose {
            position: [
                self.position[0] + offset[0],
                self.position[1] + offset[1],
                self.position[2] + offset[2],
            ],
            orientation: self.orientation * child.orientation,
        }
    }
}

/// A lidar return expressed in the world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Distance from the sensor origin.
    pub range: f64,
    /// Angle in radians between the vehicle and sensor orientations.
    pub angle: f64,
    pub timestamp_ms: u64,
    pub color: [u8; 3],
}

/// Transforms sensor-local triples into world-frame points.
///
/// The rotation matrix and the vehicle/sensor angle depend only on the
/// poses, so both are computed once and shared by the whole batch. Points
/// are produced lazily and in input order.
pub fn transform_points<I>(
    points: I,
    sensor: Pose,
    vehicle_orientation: Quaternion,
    timestamp_ms: u64,
) -> impl Iterator<Item = WorldPoint>
where
    I: IntoIterator<Item = [f64; 3]>,
{
    let rotation = sensor.orientation.rotation_matrix();
    let angle = orientation_angle(vehicle_orientation, sensor.orientation);
    let origin = sensor.position;

    points.into_iter().map(move |p| {
        let r = mat_vec(&rotation, p);
        let world = [r[0] + origin[0], r[1] + origin[1], r[2] + origin[2]];
        let range = ((origin[0] - world[0]).powi(2)
            + (origin[1] - world[1]).powi(2)
            + (origin[2] - world[2]).powi(2))
        .sqrt();

        WorldPoint {
            x: world[0],
            y: world[1],
            z: world[2],
            range,
            angle,
            timestamp_ms,
            color: POINT_COLOR,
        }
    })
}

/// Angular distance between the vehicle and sensor orientations.
///
/// The vehicle orientation is conjugated and both quaternions are
/// normalized before taking their inner product. The result does not change
/// when either quaternion is negated.
pub fn orientation_angle(vehicle: Quaternion, sensor: Quaternion) -> f64 {
    let m = vehicle.conjugate().normalize();
    let q = sensor.normalize();
    angle_from_inner_product(m.dot(q))
}

/// `acos(2d² - 1)` with the argument clamped to `[-1, 1]`, so rounding drift
/// never produces NaN.
pub fn angle_from_inner_product(d: f64) -> f64 {
    (2.0 * d * d - 1.0).clamp(-1.0, 1.0).acos()
}

/// Splits a flat `x, y, z, x, y, z, ...` buffer into triples. Trailing
/// values that do not form a full triple are dropped; callers are expected
/// to reject such buffers first.
pub fn triples(flat: &[f32]) -> impl Iterator<Item = [f64; 3]> + '_ {
    flat.chunks_exact(3)
        .map(|c| [c[0] as f64, c[1] as f64, c[2] as f64])
}
