//! Minimal quaternion algebra for orientations.
//!
//! Components are stored scalar-first, `(w, x, y, z)`, which is the order
//! the simulator reports orientations in and the order every formula in this
//! crate is written against.

use std::ops::{Mul, Neg};

/// Row-major 3x3 matrix.
pub type Matrix3 = [[f64; 3]; 3];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion::new(1.0, 0.0, 0.0, 0.0);

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Quaternion { w, x, y, z }
    }

    /// Builds an orientation from roll, pitch and yaw in radians, applied in
    /// yaw-pitch-roll (Z-Y-X) order.
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sy, cy) = (yaw * 0.5).sin_cos();
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        Quaternion {
            w: cy * cr * cp + sy * sr * sp,
            x: cy * sr * cp - sy * cr * sp,
            y: cy * cr * sp + sy * sr * cp,
            z: sy * cr * cp - cy * sr * sp,
        }
    }

    /// Rotation by `angle` radians about the vertical axis.
    pub fn from_yaw(angle: f64) -> Self {
        Self::from_euler(0.0, 0.0, angle)
    }

    /// Negates the vector part. For unit quaternions this is the inverse.
    pub fn conjugate(self) -> Self {
        Quaternion::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Scales to unit length. A zero quaternion maps to the identity.
    pub fn normalize(self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            return Self::IDENTITY;
        }
        Quaternion::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Inner product of the two quaternions taken as 4-vectors.
    pub fn dot(self, other: Quaternion) -> f64 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Rotation matrix for this orientation.
    ///
    /// The quaternion is assumed to be unit-norm; no normalization happens
    /// here and a non-unit input yields a scaled, non-orthogonal matrix.
    pub fn rotation_matrix(self) -> Matrix3 {
        let Quaternion {
            w: q0,
            x: q1,
            y: q2,
            z: q3,
        } = self;
        [
            [
                1.0 - 2.0 * (q2 * q2 + q3 * q3),
                2.0 * (q1 * q2 - q3 * q0),
                2.0 * (q1 * q3 + q2 * q0),
            ],
            [
                2.0 * (q1 * q2 + q3 * q0),
                1.0 - 2.0 * (q1 * q1 + q3 * q3),
                2.0 * (q2 * q3 - q1 * q0),
            ],
            [
                2.0 * (q1 * q3 - q2 * q0),
                2.0 * (q2 * q3 + q1 * q0),
                1.0 - 2.0 * (q1 * q1 + q2 * q2),
            ],
        ]
    }

    pub fn rotate(self, v: [f64; 3]) -> [f64; 3] {
        mat_vec(&self.rotation_matrix(), v)
    }
}

/// Hamilton product: `a * b` applies `b` first, then `a`.
impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, b: Quaternion) -> Quaternion {
        let a = self;
        Quaternion {
            w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        }
    }
}

impl Neg for Quaternion {
    type Output = Quaternion;

    fn neg(self) -> Quaternion {
        Quaternion::new(-self.w, -self.x, -self.y, -self.z)
    }
}

pub fn mat_vec(m: &Matrix3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    fn det(m: &Matrix3) -> f64 {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    fn samples() -> Vec<Quaternion> {
        vec![
            Quaternion::IDENTITY,
            Quaternion::from_euler(0.0, FRAC_PI_2, 0.0),
            Quaternion::from_euler(FRAC_PI_2, FRAC_PI_2, 0.0),
            Quaternion::from_euler(0.3, -1.2, 2.7),
            Quaternion::new(0.5, -0.1, 0.7, 0.2).normalize(),
            -Quaternion::new(0.1, 0.9, -0.3, 0.4).normalize(),
        ]
    }

    #[test]
    fn rotation_matrix_is_orthogonal() {
        for q in samples() {
            let r = q.rotation_matrix();
            assert!((det(&r) - 1.0).abs() < EPS, "det of {q:?}");
            for i in 0..3 {
                for j in 0..3 {
                    // (R^T R)_ij
                    let v: f64 = (0..3).map(|k| r[k][i] * r[k][j]).sum();
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert!((v - expected).abs() < EPS, "R^T R[{i}][{j}] of {q:?}");
                }
            }
        }
    }

    #[test]
    fn yaw_turns_x_into_y() {
        let v = Quaternion::from_yaw(FRAC_PI_2).rotate([1.0, 0.0, 0.0]);
        assert!(v[0].abs() < EPS);
        assert!((v[1] - 1.0).abs() < EPS);
        assert!(v[2].abs() < EPS);
    }

    #[test]
    fn product_composes_rotations() {
        let a = Quaternion::from_euler(0.2, 0.4, -0.9);
        let b = Quaternion::from_euler(-1.1, 0.3, 0.5);
        let v = [0.3, -2.0, 1.5];
        let composed = (a * b).rotate(v);
        let chained = a.rotate(b.rotate(v));
        for i in 0..3 {
            assert!((composed[i] - chained[i]).abs() < EPS);
        }
    }

    #[test]
    fn conjugate_is_inverse_for_unit() {
        let q = Quaternion::from_euler(0.7, -0.2, 1.9);
        let p = q * q.conjugate();
        assert!((p.w - 1.0).abs() < EPS);
        assert!(p.x.abs() < EPS && p.y.abs() < EPS && p.z.abs() < EPS);
    }

    #[test]
    fn normalize_zero_is_identity() {
        assert_eq!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalize(), Quaternion::IDENTITY);
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0).normalize();
        assert_eq!(q, Quaternion::IDENTITY);
    }
}
