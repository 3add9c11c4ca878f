//! Rigid-body transforms in 3D.
//!
//! Poses follow the `T_target_source` naming used throughout the crate:
//! `T_world_base.transform_point(p_base)` yields the point in world frame.

use nalgebra::{Matrix3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Below this angle a rotation is treated as identity when extracting an axis.
const SMALL_ANGLE_THRESHOLD: f64 = 1e-12;

/// Rigid transform: rotation as a unit quaternion plus a translation.
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Build from rotation and translation parts.
    pub fn from_rt(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Build from a w-first quaternion without renormalizing it.
    ///
    /// Used where the quaternion comes from an external estimator and must be
    /// inspected as-is (e.g. for NaN components).
    pub fn from_raw_parts(qw: f64, qx: f64, qy: f64, qz: f64, translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::new_unchecked(nalgebra::Quaternion::new(qw, qx, qy, qz)),
            translation,
        }
    }

    /// Build from a homogeneous 4x4 matrix. The rotation block is
    /// re-orthonormalized through the quaternion conversion.
    pub fn from_matrix(m: Matrix4<f64>) -> Self {
        let r: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&r));
        let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        Self {
            rotation,
            translation,
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Pure rotation of `angle` radians about `axis`.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        Self {
            rotation: UnitQuaternion::from_scaled_axis(axis.normalize() * angle),
            translation: Vector3::zeros(),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        let iso = nalgebra::Isometry3::from_parts(
            Translation3::from(self.translation),
            self.rotation,
        );
        iso.to_homogeneous()
    }

    /// Group composition: `self * other`.
    pub fn compose(&self, other: &SE3) -> SE3 {
        SE3 {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn inverse(&self) -> SE3 {
        let rot_inv = self.rotation.inverse();
        SE3 {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// True when every translation and quaternion component is finite.
    pub fn is_finite(&self) -> bool {
        let q = self.rotation.quaternion();
        self.translation.iter().all(|v| v.is_finite())
            && q.coords.iter().all(|v| v.is_finite())
    }

    /// Copy with the translation multiplied by `factor`; rotation untouched.
    pub fn with_scaled_translation(&self, factor: f64) -> SE3 {
        SE3 {
            rotation: self.rotation,
            translation: self.translation * factor,
        }
    }

    /// Rotation as (unit axis, angle in [0, π]). The axis is +X for
    /// a (near-)identity rotation.
    pub fn axis_angle(&self) -> (Vector3<f64>, f64) {
        match self.rotation.axis_angle() {
            Some((axis, angle)) if angle > SMALL_ANGLE_THRESHOLD => (axis.into_inner(), angle),
            _ => (Vector3::x(), 0.0),
        }
    }

    /// Rotation vector (axis * angle).
    pub fn rotation_vector(&self) -> Vector3<f64> {
        let (axis, angle) = self.axis_angle();
        axis * angle
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}
