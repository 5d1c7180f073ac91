//! Pinhole projection with radial-tangential distortion.
//!
//! These routines back the calibration overlays: GCP markers are placed with
//! [`project_points`], and straight world lines (water lines, cross sections)
//! are drawn as curves on the distorted image with [`project_line`].
//!
//! Coordinate spaces:
//! * pixel coordinates, as seen on the camera image;
//! * normalized coordinates, `((u - cx) / fx, (v - cy) / fy)`;
//! * camera coordinates, 3D points in the camera frame.
//!
//! Every function is pure and allocates its output.

use crate::camera::distortion::DEGENERATE_RADIAL;
use crate::camera::{CameraMatrix, CameraModelError, DistortionCoefficients};
use crate::geometry::{self, Pose};
use log::debug;
use nalgebra::{Point2, Point3, Vector2};

/// Fixed-point passes used by [`undistort_points`] unless configured otherwise.
pub const DEFAULT_UNDISTORT_ITERATIONS: usize = 5;

/// Depths closer to zero than this are clamped before the perspective divide.
pub const MIN_DEPTH: f64 = 1e-10;

/// Controls the fixed-point undistortion.
///
/// The scheme is an approximate inverse of the distortion model. Without a
/// `tolerance` exactly `iterations` passes run, so the cost is fixed and the
/// residual is not. Five passes keep the undistort/distort round trip under
/// 0.01 px for moderate barrel distortion near the image centre; strongly
/// distorted corners need ten or more.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UndistortOptions {
    /// Upper bound on fixed-point passes; the exact count without a tolerance.
    pub iterations: usize,
    /// Stop early once an update moves the normalized estimate less than this.
    pub tolerance: Option<f64>,
}

impl Default for UndistortOptions {
    fn default() -> Self {
        UndistortOptions {
            iterations: DEFAULT_UNDISTORT_ITERATIONS,
            tolerance: None,
        }
    }
}

impl UndistortOptions {
    /// Exactly `iterations` passes, no early stop.
    pub fn with_iterations(iterations: usize) -> Self {
        UndistortOptions {
            iterations,
            tolerance: None,
        }
    }
}

fn to_normalized(point: &Point2<f64>, camera: &CameraMatrix) -> Vector2<f64> {
    Vector2::new(
        (point.x - camera.cx()) / camera.fx(),
        (point.y - camera.cy()) / camera.fy(),
    )
}

fn to_pixel(normalized: &Vector2<f64>, camera: &CameraMatrix) -> Point2<f64> {
    Point2::new(
        camera.fx() * normalized.x + camera.cx(),
        camera.fy() * normalized.y + camera.cy(),
    )
}

fn ensure_finite(point: Point2<f64>, context: &str) -> Result<Point2<f64>, CameraModelError> {
    if point.x.is_finite() && point.y.is_finite() {
        Ok(point)
    } else {
        Err(CameraModelError::NumericalError(format!(
            "{context} produced a non-finite point"
        )))
    }
}

/// Converts between pixel and normalized coordinates.
///
/// Forward: `x' = (x - cx) / fx`, `y' = (y - cy) / fy`.
/// Reverse: `x = fx * x' + cx`, `y = fy * y' + cy`.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Point2;
/// use orc_camera::camera::CameraMatrix;
/// use orc_camera::projection::normalize_points;
///
/// let camera = CameraMatrix::from_intrinsics(1000.0, 1000.0, 960.0, 540.0).unwrap();
/// let normalized = normalize_points(&[Point2::new(1460.0, 40.0)], &camera, false);
/// assert_eq!(normalized[0], Point2::new(0.5, -0.5));
///
/// let pixels = normalize_points(&normalized, &camera, true);
/// assert_eq!(pixels[0], Point2::new(1460.0, 40.0));
/// ```
pub fn normalize_points(
    points: &[Point2<f64>],
    camera: &CameraMatrix,
    reverse: bool,
) -> Vec<Point2<f64>> {
    if reverse {
        points.iter().map(|p| to_pixel(&p.coords, camera)).collect()
    } else {
        points
            .iter()
            .map(|p| Point2::from(to_normalized(p, camera)))
            .collect()
    }
}

/// Inverts the distortion model for a single normalized coordinate.
///
/// Each pass evaluates the distortion terms at the current estimate and divides
/// them out of the *original* observation `target`.
fn undistort_normalized(
    target: &Vector2<f64>,
    dist: &DistortionCoefficients,
    options: &UndistortOptions,
) -> Result<Vector2<f64>, CameraModelError> {
    let mut point = *target;

    for iteration in 0..options.iterations {
        let r2 = point.norm_squared();
        let radial = dist.radial_factor(r2)?;
        if radial.abs() < DEGENERATE_RADIAL {
            return Err(CameraModelError::NumericalError(format!(
                "Radial distortion factor vanishes at r² = {r2}"
            )));
        }
        let (dx, dy) = dist.tangential_offset(point.x, point.y);

        let next = Vector2::new((target.x - dx) / radial, (target.y - dy) / radial);
        let step = (next - point).norm();
        point = next;

        if let Some(tolerance) = options.tolerance {
            if step < tolerance {
                debug!(
                    "Undistortion converged after {} of {} iterations",
                    iteration + 1,
                    options.iterations
                );
                break;
            }
        }
    }

    Ok(point)
}

/// Removes lens distortion from pixel points, returning undistorted pixel points.
///
/// With `dist == None` the points only make the pixel → normalized → pixel
/// round trip. Otherwise the fixed-point scheme described on
/// [`UndistortOptions`] is applied.
///
/// # Errors
///
/// [`CameraModelError::NumericalError`] if the radial model degenerates for
/// one of the points, or a result is not finite.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Point2;
/// use orc_camera::camera::{CameraMatrix, DistortionCoefficients};
/// use orc_camera::projection::{undistort_points, UndistortOptions};
///
/// let camera = CameraMatrix::from_intrinsics(1000.0, 1000.0, 960.0, 540.0).unwrap();
/// let dist = DistortionCoefficients::from_slice(&[-0.25, 0.05, 0.0, 0.0]).unwrap();
///
/// let undistorted = undistort_points(
///     &[Point2::new(1200.0, 540.0)],
///     &camera,
///     Some(&dist),
///     &UndistortOptions::default(),
/// )
/// .unwrap();
/// assert!((undistorted[0].x - 1203.5697).abs() < 1e-3);
/// ```
pub fn undistort_points(
    points: &[Point2<f64>],
    camera: &CameraMatrix,
    dist: Option<&DistortionCoefficients>,
    options: &UndistortOptions,
) -> Result<Vec<Point2<f64>>, CameraModelError> {
    let Some(dist) = dist else {
        return Ok(normalize_points(
            &normalize_points(points, camera, false),
            camera,
            true,
        ));
    };

    points
        .iter()
        .map(|p| {
            let target = to_normalized(p, camera);
            let undistorted = undistort_normalized(&target, dist, options)?;
            ensure_finite(to_pixel(&undistorted, camera), "Undistortion")
        })
        .collect()
}

/// Projects 3D object points to distorted pixel coordinates.
///
/// Points are moved into the camera frame with `R(rvec)·p + tvec` unless the
/// pose is the identity, in which case they are taken as camera coordinates.
/// Depths with `|z| < MIN_DEPTH` are clamped to `±MIN_DEPTH` (zero counts as
/// positive); points behind the camera are projected, not rejected.
///
/// # Errors
///
/// [`CameraModelError::NumericalError`] if the radial denominator vanishes or
/// a projected point is not finite.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{Point2, Point3};
/// use orc_camera::camera::CameraMatrix;
/// use orc_camera::geometry::Pose;
/// use orc_camera::projection::project_points;
///
/// let camera = CameraMatrix::from_intrinsics(1000.0, 1000.0, 960.0, 540.0).unwrap();
/// let projected =
///     project_points(&[Point3::new(0.0, 0.0, 10.0)], &Pose::identity(), &camera, None).unwrap();
/// assert_eq!(projected[0], Point2::new(960.0, 540.0));
/// ```
pub fn project_points(
    object_points: &[Point3<f64>],
    pose: &Pose,
    camera: &CameraMatrix,
    dist: Option<&DistortionCoefficients>,
) -> Result<Vec<Point2<f64>>, CameraModelError> {
    let dist = dist.copied().unwrap_or_default();

    pose.transform_points(object_points)
        .iter()
        .map(|p| {
            let z = if p.z.abs() < MIN_DEPTH {
                debug!("Clamping depth {} of point {:?}", p.z, p);
                if p.z < 0.0 {
                    -MIN_DEPTH
                } else {
                    MIN_DEPTH
                }
            } else {
                p.z
            };

            let normalized = Vector2::new(p.x / z, p.y / z);
            let distorted = dist.distort(&normalized)?;
            ensure_finite(to_pixel(&distorted, camera), "Projection")
        })
        .collect()
}

/// Applies the full forward distortion model to flat pixel points.
///
/// The points are first passed through [`undistort_points`] without
/// coefficients, which is only the normalization round trip, then lifted onto
/// the `z = 1` plane and projected with the identity pose and `dist`. The net
/// effect treats each pixel as an undistorted ray and returns where the lens
/// would image it.
pub fn distort_points(
    points: &[Point2<f64>],
    camera: &CameraMatrix,
    dist: Option<&DistortionCoefficients>,
) -> Result<Vec<Point2<f64>>, CameraModelError> {
    let flat = undistort_points(points, camera, None, &UndistortOptions::default())?;
    let object_points: Vec<Point3<f64>> = normalize_points(&flat, camera, false)
        .iter()
        .map(|p| Point3::new(p.x, p.y, 1.0))
        .collect();

    project_points(&object_points, &Pose::identity(), camera, dist)
}

/// Samples the image of a straight world line between two distorted pixels.
///
/// Both endpoints are undistorted, `split` points are interpolated linearly in
/// the undistorted image at `t = i / (split - 1)`, and the whole sequence is
/// distorted again. The result bends the way the lens bends the line, which a
/// straight pixel-space segment would not.
///
/// # Errors
///
/// * [`CameraModelError::InvalidParams`] if `split < 2`.
/// * [`CameraModelError::NumericalError`] from the undistortion or projection.
pub fn project_line(
    start: &Point2<f64>,
    end: &Point2<f64>,
    camera: &CameraMatrix,
    dist: Option<&DistortionCoefficients>,
    split: usize,
    options: &UndistortOptions,
) -> Result<Vec<Point2<f64>>, CameraModelError> {
    if split < 2 {
        return Err(CameraModelError::InvalidParams(format!(
            "Line projection needs at least 2 samples, got {split}"
        )));
    }

    let endpoints = undistort_points(&[*start, *end], camera, dist, options)?;
    let samples = geometry::interpolate_line(&endpoints[0], &endpoints[1], split)?;
    debug!(
        "Projecting line {:?} -> {:?} with {} samples",
        start, end, split
    );

    distort_points(&samples, camera, dist)
}
