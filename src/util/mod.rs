use crate::camera::{CameraMatrix, CameraModelError, DistortionCoefficients};
use crate::geometry::Pose;
use crate::projection::project_points;
use log::warn;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("Zero projection points")]
    ZeroProjectionPoints,
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Camera(#[from] CameraModelError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

/// A ground control point: where a surveyed world coordinate appears in the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundControlPoint {
    /// Pixel position `[x, y]` on the camera image.
    pub image: [f64; 2],
    /// Surveyed position `[x, y, z]` in world coordinates.
    pub world: [f64; 3],
}

impl GroundControlPoint {
    /// Observed pixel position as a point.
    pub fn image_point(&self) -> Point2<f64> {
        Point2::new(self.image[0], self.image[1])
    }

    /// Surveyed world position as a point.
    pub fn world_point(&self) -> Point3<f64> {
        Point3::new(self.world[0], self.world[1], self.world[2])
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProjectionError {
    pub rmse: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
}

impl fmt::Debug for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Projection Error [ rmse: {}, min: {}, max: {}, mean: {}, stddev: {}, median: {} ]",
            self.rmse, self.min, self.max, self.mean, self.stddev, self.median
        )
    }
}

impl ProjectionError {
    /// Summary statistics of a set of pixel distances.
    pub fn from_errors(errors: &[f64]) -> Result<Self, UtilError> {
        if errors.is_empty() {
            return Err(UtilError::ZeroProjectionPoints);
        }
        if errors.iter().any(|e| !e.is_finite()) {
            return Err(UtilError::InvalidParams(
                "Reprojection errors must be finite".to_string(),
            ));
        }

        let n = errors.len() as f64;
        let mean = errors.iter().sum::<f64>() / n;

        let variance: f64 = errors.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();

        let sum_squared: f64 = errors.iter().map(|x| x.powi(2)).sum::<f64>();
        let rmse = (sum_squared / n).sqrt();

        let min = errors.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = errors.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        let mut sorted_errors = errors.to_vec();
        sorted_errors.sort_by(f64::total_cmp);
        let median = if sorted_errors.len() % 2 == 0 {
            let mid = sorted_errors.len() / 2;
            (sorted_errors[mid - 1] + sorted_errors[mid]) / 2.0
        } else {
            sorted_errors[sorted_errors.len() / 2]
        };

        Ok(ProjectionError {
            rmse,
            min,
            max,
            mean,
            stddev,
            median,
        })
    }
}

/// Pixel distance between each GCP's image point and its re-projected world point.
///
/// Distances are returned in the order of `gcps`.
pub fn residuals(
    gcps: &[GroundControlPoint],
    pose: &Pose,
    camera: &CameraMatrix,
    dist: Option<&DistortionCoefficients>,
) -> Result<Vec<f64>, UtilError> {
    let world: Vec<Point3<f64>> = gcps.iter().map(|g| g.world_point()).collect();
    let projected = project_points(&world, pose, camera, dist)?;

    Ok(gcps
        .iter()
        .zip(projected.iter())
        .map(|(gcp, reprojected)| (reprojected - gcp.image_point()).norm())
        .collect())
}

/// Per-GCP residuals together with their statistics, projecting each GCP once.
///
/// Residuals are returned in the order of `gcps`.
pub fn reprojection_report(
    gcps: &[GroundControlPoint],
    pose: &Pose,
    camera: &CameraMatrix,
    dist: Option<&DistortionCoefficients>,
) -> Result<(Vec<f64>, ProjectionError), UtilError> {
    if gcps.is_empty() {
        return Err(UtilError::ZeroProjectionPoints);
    }

    let errors = residuals(gcps, pose, camera, dist)?;
    let stats = ProjectionError::from_errors(&errors)?;
    if stats.max > 10.0 * stats.median.max(f64::EPSILON) {
        warn!(
            "Largest GCP residual {:.3} px is far above the median {:.3} px",
            stats.max, stats.median
        );
    }
    Ok((errors, stats))
}

/// Reprojection error statistics of a fitted camera over its ground control points.
pub fn compute_reprojection_error(
    gcps: &[GroundControlPoint],
    pose: &Pose,
    camera: &CameraMatrix,
    dist: Option<&DistortionCoefficients>,
) -> Result<ProjectionError, UtilError> {
    reprojection_report(gcps, pose, camera, dist).map(|(_, stats)| stats)
}

/// Writes points as `x,y` CSV rows under a header.
pub fn write_points_csv<W: Write>(writer: W, points: &[Point2<f64>]) -> Result<(), UtilError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["x", "y"])?;
    for p in points {
        csv_writer.serialize((p.x, p.y))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes one `image_x,image_y,residual` row per GCP under a header.
pub fn write_residuals_csv<W: Write>(
    writer: W,
    gcps: &[GroundControlPoint],
    residuals: &[f64],
) -> Result<(), UtilError> {
    if gcps.len() != residuals.len() {
        return Err(UtilError::InvalidParams(format!(
            "{} GCPs but {} residuals",
            gcps.len(),
            residuals.len()
        )));
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["image_x", "image_y", "residual"])?;
    for (gcp, residual) in gcps.iter().zip(residuals.iter()) {
        csv_writer.serialize((gcp.image[0], gcp.image[1], residual))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Renders points as a JSON array of `[x, y]` pairs.
pub fn points_to_json(points: &[Point2<f64>]) -> Result<String, UtilError> {
    let pairs: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
    Ok(serde_json::to_string_pretty(&pairs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn camera() -> CameraMatrix {
        CameraMatrix::from_intrinsics(1000.0, 1000.0, 960.0, 540.0).unwrap()
    }

    #[test]
    fn test_projection_error_statistics() {
        let stats = ProjectionError::from_errors(&[3.0, 1.0, 4.0, 2.0]).unwrap();
        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.median, 2.5);
        assert_relative_eq!(stats.min, 1.0);
        assert_relative_eq!(stats.max, 4.0);
        assert_relative_eq!(stats.rmse, (30.0f64 / 4.0).sqrt());
        assert_relative_eq!(stats.stddev, 1.25f64.sqrt());

        let odd = ProjectionError::from_errors(&[5.0, 1.0, 3.0]).unwrap();
        assert_relative_eq!(odd.median, 3.0);
    }

    #[test]
    fn test_projection_error_rejects_empty() {
        assert!(matches!(
            ProjectionError::from_errors(&[]),
            Err(UtilError::ZeroProjectionPoints)
        ));
    }

    #[test]
    fn test_perfect_fit_has_zero_error() {
        let pose = Pose::new(Vector3::new(0.1, -0.2, 0.05), Vector3::new(1.5, -0.3, 12.0));
        let world = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(-3.0, 0.5, 1.0),
        ];
        let image = project_points(&world, &pose, &camera(), None).unwrap();
        let gcps: Vec<GroundControlPoint> = world
            .iter()
            .zip(image.iter())
            .map(|(w, i)| GroundControlPoint {
                image: [i.x, i.y],
                world: [w.x, w.y, w.z],
            })
            .collect();

        let stats = compute_reprojection_error(&gcps, &pose, &camera(), None).unwrap();
        assert!(stats.rmse < 1e-9);
        assert!(stats.max < 1e-9);
    }

    #[test]
    fn test_residuals_in_input_order() {
        let gcps = [
            GroundControlPoint {
                image: [960.0, 540.0],
                world: [0.0, 0.0, 10.0],
            },
            GroundControlPoint {
                image: [963.0, 544.0],
                world: [0.0, 0.0, 10.0],
            },
        ];
        let errors = residuals(&gcps, &Pose::identity(), &camera(), None).unwrap();
        assert_relative_eq!(errors[0], 0.0);
        assert_relative_eq!(errors[1], 5.0, epsilon = 1e-12);

        let stats = compute_reprojection_error(&gcps, &Pose::identity(), &camera(), None).unwrap();
        assert_relative_eq!(stats.mean, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_reprojection_report_matches_parts() {
        let gcps = [
            GroundControlPoint {
                image: [960.0, 540.0],
                world: [0.0, 0.0, 10.0],
            },
            GroundControlPoint {
                image: [966.0, 548.0],
                world: [0.0, 0.0, 10.0],
            },
        ];
        let (errors, stats) =
            reprojection_report(&gcps, &Pose::identity(), &camera(), None).unwrap();

        assert_eq!(
            errors,
            residuals(&gcps, &Pose::identity(), &camera(), None).unwrap()
        );
        assert_relative_eq!(errors[1], 10.0, epsilon = 1e-12);
        assert_relative_eq!(stats.max, 10.0, epsilon = 1e-12);
        assert_relative_eq!(stats.median, 5.0, epsilon = 1e-12);
        assert!(matches!(
            reprojection_report(&[], &Pose::identity(), &camera(), None),
            Err(UtilError::ZeroProjectionPoints)
        ));
    }

    #[test]
    fn test_write_residuals_csv() {
        let gcps = [GroundControlPoint {
            image: [1100.0, 600.5],
            world: [1.0, 0.5, 0.0],
        }];
        let mut buffer = Vec::new();
        write_residuals_csv(&mut buffer, &gcps, &[2.5]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "image_x,image_y,residual\n1100.0,600.5,2.5\n");

        let mismatched = write_residuals_csv(Vec::new(), &gcps, &[]);
        assert!(matches!(mismatched, Err(UtilError::InvalidParams(_))));
    }

    #[test]
    fn test_reprojection_error_rejects_no_gcps() {
        let result = compute_reprojection_error(&[], &Pose::identity(), &camera(), None);
        assert!(matches!(result, Err(UtilError::ZeroProjectionPoints)));
    }

    #[test]
    fn test_gcp_file_format() {
        let contents = std::fs::read_to_string("samples/gcps.json").unwrap();
        let gcps: Vec<GroundControlPoint> = serde_json::from_str(&contents).unwrap();
        assert_eq!(gcps.len(), 2);
        assert_eq!(gcps[0].image_point(), Point2::new(1100.0, 600.0));
        assert_eq!(gcps[1].world_point(), Point3::new(-1.0, -0.5, 0.0));
    }

    #[test]
    fn test_write_points_csv() {
        let mut buffer = Vec::new();
        write_points_csv(&mut buffer, &[Point2::new(1.5, 2.0), Point2::new(-3.0, 4.25)]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "x,y\n1.5,2.0\n-3.0,4.25\n");
    }

    #[test]
    fn test_points_to_json() {
        let json = points_to_json(&[Point2::new(1.5, 2.0)]).unwrap();
        let parsed: Vec<[f64; 2]> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![[1.5, 2.0]]);
    }
}
