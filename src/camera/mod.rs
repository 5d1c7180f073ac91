//! Camera data model for the ORC-OS calibration workflow.
//!
//! This module holds the pinhole [`CameraMatrix`], the OpenCV-ordered
//! [`DistortionCoefficients`] and the on-disk [`CameraConfig`]. Every type that
//! reaches the projection routines has been validated here, so the math in
//! [`crate::projection`] never divides by a zero focal length.

pub mod config;
pub mod distortion;

pub use config::CameraConfig;
pub use distortion::DistortionCoefficients;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("Focal length must be finite and non-zero")]
    FocalLengthMustBeNonZero,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Numerical error in computation: {0}")]
    NumericalError(String),
    #[error("Failed to parse YAML: {0}")]
    YamlError(String),
    #[error("Failed to parse JSON: {0}")]
    JsonError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CameraModelError {
    fn from(err: serde_yaml::Error) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

impl From<serde_json::Error> for CameraModelError {
    fn from(err: serde_json::Error) -> Self {
        CameraModelError::JsonError(err.to_string())
    }
}

/// Pinhole intrinsic matrix.
///
/// Layout follows the usual convention: `fx` at `(0, 0)`, `fy` at `(1, 1)` and
/// the principal point `(cx, cy)` in the last column. The remaining entries are
/// carried along untouched; only the four intrinsic values are read by the
/// projection code.
///
/// On disk the matrix is a nested row-major array:
///
/// ```yaml
/// camera_matrix:
///   - [1000.0, 0.0, 960.0]
///   - [0.0, 1000.0, 540.0]
///   - [0.0, 0.0, 1.0]
/// ```
///
/// # Examples
///
/// ```rust
/// use orc_camera::camera::CameraMatrix;
///
/// let camera = CameraMatrix::from_intrinsics(1000.0, 1000.0, 960.0, 540.0).unwrap();
/// assert_eq!(camera.fx(), 1000.0);
/// assert_eq!(camera.cy(), 540.0);
///
/// assert!(CameraMatrix::from_intrinsics(0.0, 1000.0, 960.0, 540.0).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct CameraMatrix {
    matrix: Matrix3<f64>,
}

impl CameraMatrix {
    /// Wraps a full 3x3 matrix after validating its intrinsic entries.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBeNonZero`] if `fx` or `fy` is zero,
    ///   vanishingly small or not finite.
    /// * [`CameraModelError::PrincipalPointMustBeFinite`] if `cx` or `cy` is not finite.
    pub fn new(matrix: Matrix3<f64>) -> Result<Self, CameraModelError> {
        let camera = CameraMatrix { matrix };
        validation::validate_intrinsics(&camera.intrinsics())?;
        Ok(camera)
    }

    /// Builds the canonical intrinsic matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    ///
    /// # Errors
    ///
    /// Same as [`CameraMatrix::new`].
    pub fn from_intrinsics(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraModelError> {
        Self::new(Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0))
    }

    /// Horizontal focal length in pixels, entry `(0, 0)`.
    pub fn fx(&self) -> f64 {
        self.matrix[(0, 0)]
    }

    /// Vertical focal length in pixels, entry `(1, 1)`.
    pub fn fy(&self) -> f64 {
        self.matrix[(1, 1)]
    }

    /// Principal point x, entry `(0, 2)`.
    pub fn cx(&self) -> f64 {
        self.matrix[(0, 2)]
    }

    /// Principal point y, entry `(1, 2)`.
    pub fn cy(&self) -> f64 {
        self.matrix[(1, 2)]
    }

    /// The four intrinsic values as an [`Intrinsics`] record.
    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics {
            fx: self.fx(),
            fy: self.fy(),
            cx: self.cx(),
            cy: self.cy(),
        }
    }

    /// The full 3x3 matrix, including entries the projection code ignores.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }
}

impl fmt::Debug for CameraMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CameraMatrix [fx: {} fy: {} cx: {} cy: {}]",
            self.fx(),
            self.fy(),
            self.cx(),
            self.cy(),
        )
    }
}

impl TryFrom<[[f64; 3]; 3]> for CameraMatrix {
    type Error = CameraModelError;

    fn try_from(rows: [[f64; 3]; 3]) -> Result<Self, Self::Error> {
        let matrix = Matrix3::from_fn(|r, c| rows[r][c]);
        CameraMatrix::new(matrix)
    }
}

impl From<CameraMatrix> for [[f64; 3]; 3] {
    fn from(camera: CameraMatrix) -> Self {
        let m = camera.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    /// Focal lengths below this magnitude are treated as zero.
    pub const MIN_FOCAL_LENGTH: f64 = 1e-12;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        if !intrinsics.fx.is_finite()
            || !intrinsics.fy.is_finite()
            || intrinsics.fx.abs() < MIN_FOCAL_LENGTH
            || intrinsics.fy.abs() < MIN_FOCAL_LENGTH
        {
            return Err(CameraModelError::FocalLengthMustBeNonZero);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }
}
