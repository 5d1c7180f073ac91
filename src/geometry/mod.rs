//! Rigid-body geometry used by the projection routines.

use crate::camera::CameraModelError;
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Rotation vectors shorter than this are the identity rotation.
pub const MIN_ROTATION_ANGLE: f64 = 1e-8;

/// Pose components within this tolerance of zero count as zero.
pub const IDENTITY_POSE_TOLERANCE: f64 = 1e-12;

/// Skew-symmetric cross-product matrix `[v]×`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Converts an axis-angle rotation vector to a rotation matrix.
///
/// The angle is the norm of `rvec` and the axis its direction. Rodrigues'
/// formula gives `R = I + sin(θ)·K + (1 - cos(θ))·K²` with `K` the cross-product
/// matrix of the unit axis. Vectors shorter than [`MIN_ROTATION_ANGLE`] return
/// the identity exactly.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{Matrix3, Vector3};
/// use orc_camera::geometry::rodrigues;
///
/// assert_eq!(rodrigues(&Vector3::zeros()), Matrix3::identity());
///
/// // Quarter turn about z maps x onto y
/// let r = rodrigues(&Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
/// let x = r * Vector3::x();
/// assert!((x - Vector3::y()).norm() < 1e-12);
/// ```
pub fn rodrigues(rvec: &Vector3<f64>) -> Matrix3<f64> {
    let theta = rvec.norm();
    if theta < MIN_ROTATION_ANGLE {
        return Matrix3::identity();
    }

    let k = skew(&(rvec / theta));
    Matrix3::identity() + k * theta.sin() + k * k * (1.0 - theta.cos())
}

/// Camera extrinsics as an axis-angle rotation and a translation.
///
/// Maps object/world points into camera coordinates with `R(rvec)·p + tvec`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl Pose {
    /// Builds a pose from an axis-angle rotation `rvec` and a translation `tvec`.
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Pose { rvec, tvec }
    }

    /// Zero rotation and zero translation: points are already in camera coordinates.
    pub fn identity() -> Self {
        Pose {
            rvec: Vector3::zeros(),
            tvec: Vector3::zeros(),
        }
    }

    /// True when every rvec and tvec component is within [`IDENTITY_POSE_TOLERANCE`] of zero.
    pub fn is_identity(&self) -> bool {
        self.rvec
            .iter()
            .chain(self.tvec.iter())
            .all(|v| v.abs() < IDENTITY_POSE_TOLERANCE)
    }

    /// Rotation matrix of `rvec`, see [`rodrigues`].
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        rodrigues(&self.rvec)
    }

    /// Transforms a batch of points into camera coordinates.
    ///
    /// The identity pose returns the points unchanged without building a rotation.
    pub fn transform_points(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        if self.is_identity() {
            return points.to_vec();
        }

        let rotation = self.rotation_matrix();
        points
            .iter()
            .map(|p| Point3::from(rotation * p.coords + self.tvec))
            .collect()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::identity()
    }
}

/// `split` evenly spaced points from `start` to `end`, both endpoints included.
///
/// Sample `i` sits at `t = i / (split - 1)`.
///
/// # Errors
///
/// [`CameraModelError::InvalidParams`] if `split < 2`; a single sample has no
/// defined spacing.
pub fn interpolate_line(
    start: &Point2<f64>,
    end: &Point2<f64>,
    split: usize,
) -> Result<Vec<Point2<f64>>, CameraModelError> {
    if split < 2 {
        return Err(CameraModelError::InvalidParams(format!(
            "Line interpolation needs at least 2 samples, got {split}"
        )));
    }

    let last = (split - 1) as f64;
    Ok((0..split)
        .map(|i| {
            let t = i as f64 / last;
            start + (end - start) * t
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_rodrigues_zero_is_identity() {
        assert_eq!(rodrigues(&Vector3::zeros()), Matrix3::identity());
        assert_eq!(
            rodrigues(&Vector3::new(1e-9, -1e-9, 0.0)),
            Matrix3::identity()
        );
    }

    #[test]
    fn test_rodrigues_is_orthonormal() {
        let rvecs = [
            Vector3::new(0.1, -0.2, 0.05),
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.0, PI, 0.0),
            Vector3::new(-2.5, 0.3, 0.7),
            Vector3::new(1e-6, 0.0, 0.0),
        ];

        for rvec in &rvecs {
            let r = rodrigues(rvec);
            assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-6);
            assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rodrigues_axis_is_fixed() {
        let rvec = Vector3::new(0.3, -0.4, 1.2);
        let r = rodrigues(&rvec);
        assert_relative_eq!(r * rvec, rvec, epsilon = 1e-12);
    }

    #[test]
    fn test_rodrigues_quarter_turn() {
        let r = rodrigues(&Vector3::new(FRAC_PI_2, 0.0, 0.0));
        // y onto z about the x axis
        assert_relative_eq!(r * Vector3::y(), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_rodrigues_matches_nalgebra_rotation() {
        let rvec = Vector3::new(0.4, 0.1, -0.9);
        let expected = nalgebra::Rotation3::from_scaled_axis(rvec);
        assert_relative_eq!(rodrigues(&rvec), *expected.matrix(), epsilon = 1e-12);
    }

    #[test]
    fn test_pose_identity_tolerance() {
        assert!(Pose::identity().is_identity());
        assert!(Pose::new(Vector3::new(1e-13, 0.0, 0.0), Vector3::zeros()).is_identity());
        assert!(!Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1e-11)).is_identity());
    }

    #[test]
    fn test_pose_transform_points() {
        let pose = Pose::new(Vector3::new(0.0, 0.0, FRAC_PI_2), Vector3::new(0.0, 0.0, 5.0));
        let transformed = pose.transform_points(&[Point3::new(1.0, 0.0, 0.0)]);
        assert_relative_eq!(transformed[0], Point3::new(0.0, 1.0, 5.0), epsilon = 1e-12);
    }

    #[test]
    fn test_pose_json_round_trip() {
        let pose = Pose::new(Vector3::new(0.1, -0.2, 0.05), Vector3::new(1.5, -0.3, 12.0));
        let json = serde_json::to_string(&pose).unwrap();
        assert_eq!(json, r#"{"rvec":[0.1,-0.2,0.05],"tvec":[1.5,-0.3,12.0]}"#);

        let back: Pose = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pose);
    }

    #[test]
    fn test_interpolate_line_endpoints_and_spacing() {
        let start = Point2::new(10.0, 20.0);
        let end = Point2::new(110.0, -80.0);
        let points = interpolate_line(&start, &end, 11).unwrap();

        assert_eq!(points.len(), 11);
        assert_eq!(points[0], start);
        assert_relative_eq!(points[10], end, epsilon = 1e-12);
        assert_relative_eq!(points[5], Point2::new(60.0, -30.0), epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_line_rejects_fewer_than_two_samples() {
        let start = Point2::new(0.0, 0.0);
        let end = Point2::new(1.0, 1.0);
        for split in [0, 1] {
            assert!(matches!(
                interpolate_line(&start, &end, split),
                Err(CameraModelError::InvalidParams(_))
            ));
        }

        let pair = interpolate_line(&start, &end, 2).unwrap();
        assert_eq!(pair, vec![start, end]);
    }
}
