//! Camera configuration files.
//!
//! A configuration bundles the intrinsic matrix, the optional distortion
//! coefficients and, once the camera pose has been solved against ground
//! control points, the rotation/translation vectors. Both YAML and JSON are
//! accepted:
//!
//! ```yaml
//! camera_matrix:
//!   - [1000.0, 0.0, 960.0]
//!   - [0.0, 1000.0, 540.0]
//!   - [0.0, 0.0, 1.0]
//! dist_coeffs: [-0.25, 0.05, 0.0, 0.0]
//! rvec: [0.1, -0.2, 0.05]
//! tvec: [1.5, -0.3, 12.0]
//! resolution:
//!   width: 1920
//!   height: 1080
//! ```

use crate::camera::{CameraMatrix, CameraModelError, DistortionCoefficients, Resolution};
use crate::geometry::Pose;
use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub camera_matrix: CameraMatrix,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_coeffs: Option<DistortionCoefficients>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rvec: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvec: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl CameraConfig {
    pub fn new(camera_matrix: CameraMatrix) -> Self {
        CameraConfig {
            camera_matrix,
            dist_coeffs: None,
            rvec: None,
            tvec: None,
            resolution: None,
        }
    }

    /// Loads a configuration, choosing the parser from the file extension.
    ///
    /// `.json` files are parsed as JSON, everything else as YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CameraModelError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::load_from_json(path),
            _ => Self::load_from_yaml(path),
        }
    }

    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, CameraModelError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: CameraConfig = serde_yaml::from_str(&contents)?;
        config.validate_params()?;
        info!("Loaded camera configuration from {}", path.display());
        Ok(config)
    }

    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Self, CameraModelError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: CameraConfig = serde_json::from_str(&contents)?;
        config.validate_params()?;
        info!("Loaded camera configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraModelError> {
        let yaml_string = serde_yaml::to_string(self)?;
        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;
        Ok(())
    }

    /// Checks the parts serde cannot: a pose needs both vectors, and they must be finite.
    ///
    /// The camera matrix and the coefficients validate themselves while deserializing.
    pub fn validate_params(&self) -> Result<(), CameraModelError> {
        match (self.rvec, self.tvec) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(CameraModelError::InvalidParams(
                    "rvec and tvec must be given together".to_string(),
                ));
            }
            (Some(rvec), Some(tvec)) => {
                if rvec.iter().chain(tvec.iter()).any(|v| !v.is_finite()) {
                    return Err(CameraModelError::InvalidParams(
                        "rvec and tvec must be finite".to_string(),
                    ));
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Camera pose, the identity when the configuration carries none.
    pub fn pose(&self) -> Pose {
        match (self.rvec, self.tvec) {
            (Some(rvec), Some(tvec)) => Pose::new(Vector3::from(rvec), Vector3::from(tvec)),
            _ => Pose::identity(),
        }
    }

    pub fn distortion(&self) -> Option<&DistortionCoefficients> {
        self.dist_coeffs.as_ref()
    }
}
