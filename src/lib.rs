//! ORC Camera Library
//!
//! Pinhole camera projection and lens distortion for the ORC-OS river camera
//! calibration workflow. The library provides:
//! - the camera data model (intrinsic matrix, distortion coefficients, configuration files)
//! - Rodrigues rotation and camera pose handling
//! - point normalization, undistortion, projection and distortion
//! - line projection for drawing straight world lines on distorted images
//! - reprojection error statistics over ground control points

pub mod camera;
pub mod geometry;
pub mod projection;
pub mod util;

// Re-export commonly used types
pub use camera::{
    CameraConfig, CameraMatrix, CameraModelError, DistortionCoefficients, Intrinsics, Resolution,
};
pub use geometry::{rodrigues, Pose};
pub use projection::{
    distort_points, normalize_points, project_line, project_points, undistort_points,
    UndistortOptions,
};
pub use util::{GroundControlPoint, ProjectionError, UtilError};
