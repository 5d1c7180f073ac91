//! Radial-tangential lens distortion.
//!
//! Coefficients follow the OpenCV ordering `(k1, k2, p1, p2, k3, k4, k5, k6)`.
//! The rational radial factor
//!
//! ```text
//! radial(r²) = (1 + k1·r² + k2·r⁴ + k3·r⁶) / (1 + k4·r² + k5·r⁴ + k6·r⁶)
//! ```
//!
//! reduces to the classic polynomial model when `k4..k6` are zero.

use crate::camera::CameraModelError;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of coefficients in the rational model.
pub const MAX_COEFFICIENTS: usize = 8;

/// Radial factors with a magnitude below this are treated as degenerate.
pub(crate) const DEGENERATE_RADIAL: f64 = 1e-12;

/// Distortion coefficients, zero-extended to the full rational model.
///
/// # Examples
///
/// ```rust
/// use orc_camera::camera::DistortionCoefficients;
///
/// let dist = DistortionCoefficients::from_slice(&[-0.25, 0.05]).unwrap();
/// assert_eq!(dist.k1(), -0.25);
/// assert_eq!(dist.p1(), 0.0);
/// assert_eq!(dist.k6(), 0.0);
/// ```
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct DistortionCoefficients {
    coefficients: [f64; MAX_COEFFICIENTS],
}

impl DistortionCoefficients {
    /// Builds the coefficient set from a possibly shorter sequence.
    ///
    /// Missing trailing coefficients are zero. A sequence longer than
    /// [`MAX_COEFFICIENTS`] is rejected rather than truncated.
    pub fn from_slice(values: &[f64]) -> Result<Self, CameraModelError> {
        if values.len() > MAX_COEFFICIENTS {
            return Err(CameraModelError::InvalidParams(format!(
                "Expected at most {} distortion coefficients, found {}",
                MAX_COEFFICIENTS,
                values.len()
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(CameraModelError::InvalidParams(format!(
                "Distortion coefficient at index {i} is not finite"
            )));
        }

        let mut coefficients = [0.0; MAX_COEFFICIENTS];
        coefficients[..values.len()].copy_from_slice(values);
        Ok(DistortionCoefficients { coefficients })
    }

    /// First radial coefficient (`r²` term of the numerator).
    pub fn k1(&self) -> f64 {
        self.coefficients[0]
    }

    /// Second radial coefficient (`r⁴` term of the numerator).
    pub fn k2(&self) -> f64 {
        self.coefficients[1]
    }

    /// First tangential coefficient.
    pub fn p1(&self) -> f64 {
        self.coefficients[2]
    }

    /// Second tangential coefficient.
    pub fn p2(&self) -> f64 {
        self.coefficients[3]
    }

    /// Third radial coefficient (`r⁶` term of the numerator).
    pub fn k3(&self) -> f64 {
        self.coefficients[4]
    }

    /// `r²` term of the rational denominator.
    pub fn k4(&self) -> f64 {
        self.coefficients[5]
    }

    /// `r⁴` term of the rational denominator.
    pub fn k5(&self) -> f64 {
        self.coefficients[6]
    }

    /// `r⁶` term of the rational denominator.
    pub fn k6(&self) -> f64 {
        self.coefficients[7]
    }

    /// All eight coefficients in `(k1, k2, p1, p2, k3, k4, k5, k6)` order.
    pub fn as_array(&self) -> &[f64; MAX_COEFFICIENTS] {
        &self.coefficients
    }

    /// True when every coefficient is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.coefficients.iter().all(|&c| c == 0.0)
    }

    /// Rational radial factor at squared radius `r2`.
    ///
    /// # Errors
    ///
    /// [`CameraModelError::NumericalError`] when the denominator vanishes or
    /// the factor is not finite.
    pub fn radial_factor(&self, r2: f64) -> Result<f64, CameraModelError> {
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let numerator = 1.0 + self.k1() * r2 + self.k2() * r4 + self.k3() * r6;
        let denominator = 1.0 + self.k4() * r2 + self.k5() * r4 + self.k6() * r6;

        if denominator.abs() < DEGENERATE_RADIAL {
            return Err(CameraModelError::NumericalError(format!(
                "Degenerate radial distortion at r² = {r2}"
            )));
        }

        let radial = numerator / denominator;
        if !radial.is_finite() {
            return Err(CameraModelError::NumericalError(format!(
                "Radial distortion factor is not finite at r² = {r2}"
            )));
        }
        Ok(radial)
    }

    /// Tangential offset `(dx, dy)` at normalized coordinate `(x, y)`.
    pub fn tangential_offset(&self, x: f64, y: f64) -> (f64, f64) {
        let p1 = self.p1();
        let p2 = self.p2();
        let r2 = x * x + y * y;

        let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        (dx, dy)
    }

    /// Applies the forward distortion model to a normalized image coordinate.
    pub fn distort(&self, point: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let x = point.x;
        let y = point.y;
        let radial = self.radial_factor(x * x + y * y)?;
        let (dx, dy) = self.tangential_offset(x, y);

        Ok(Vector2::new(x * radial + dx, y * radial + dy))
    }
}

impl fmt::Debug for DistortionCoefficients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DistortionCoefficients [k1: {} k2: {} p1: {} p2: {} k3: {} k4: {} k5: {} k6: {}]",
            self.k1(),
            self.k2(),
            self.p1(),
            self.p2(),
            self.k3(),
            self.k4(),
            self.k5(),
            self.k6(),
        )
    }
}

impl TryFrom<Vec<f64>> for DistortionCoefficients {
    type Error = CameraModelError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        DistortionCoefficients::from_slice(&values)
    }
}

impl From<DistortionCoefficients> for Vec<f64> {
    fn from(dist: DistortionCoefficients) -> Self {
        dist.coefficients.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_partial_coefficients_are_zero_extended() {
        let partial = DistortionCoefficients::from_slice(&[0.1]).unwrap();
        let full =
            DistortionCoefficients::from_slice(&[0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(partial, full);
        assert_eq!(partial.as_array()[1..], [0.0; 7]);
    }

    #[test]
    fn test_empty_coefficients_are_zero() {
        let dist = DistortionCoefficients::from_slice(&[]).unwrap();
        assert!(dist.is_zero());
        assert_eq!(dist, DistortionCoefficients::default());
    }

    #[test]
    fn test_too_many_coefficients_rejected() {
        let result = DistortionCoefficients::from_slice(&[0.0; 9]);
        assert!(matches!(result, Err(CameraModelError::InvalidParams(_))));
    }

    #[test]
    fn test_non_finite_coefficient_rejected() {
        let result = DistortionCoefficients::from_slice(&[0.1, f64::NAN]);
        assert!(matches!(result, Err(CameraModelError::InvalidParams(_))));
    }

    #[test]
    fn test_radial_factor_rational_model() {
        let dist = DistortionCoefficients::from_slice(&[0.1, 0.01, 0.0, 0.0, 0.001, 0.2, 0.0, 0.0])
            .unwrap();
        let r2: f64 = 0.25;
        let expected = (1.0 + 0.1 * r2 + 0.01 * r2.powi(2) + 0.001 * r2.powi(3)) / (1.0 + 0.2 * r2);
        assert_relative_eq!(dist.radial_factor(r2).unwrap(), expected, epsilon = 1e-15);
    }

    #[test]
    fn test_radial_factor_degenerate_denominator() {
        // 1 + k4 * r² == 0 at r² = 1
        let dist =
            DistortionCoefficients::from_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, -1.0]).unwrap();
        assert!(matches!(
            dist.radial_factor(1.0),
            Err(CameraModelError::NumericalError(_))
        ));
    }

    #[test]
    fn test_distort_tangential_only() {
        let dist = DistortionCoefficients::from_slice(&[0.0, 0.0, 0.01, -0.02]).unwrap();
        let point = Vector2::new(0.2, -0.1);
        let distorted = dist.distort(&point).unwrap();

        let r2 = 0.05;
        let expected_x = 0.2 + 2.0 * 0.01 * 0.2 * -0.1 + -0.02 * (r2 + 2.0 * 0.04);
        let expected_y = -0.1 + 0.01 * (r2 + 2.0 * 0.01) + 2.0 * -0.02 * 0.2 * -0.1;
        assert_relative_eq!(distorted.x, expected_x, epsilon = 1e-15);
        assert_relative_eq!(distorted.y, expected_y, epsilon = 1e-15);
    }

    #[test]
    fn test_serde_sequence() {
        let dist: DistortionCoefficients = serde_json::from_str("[-0.25, 0.05, 0.0, 0.0]").unwrap();
        assert_eq!(dist.k1(), -0.25);
        assert_eq!(dist.k2(), 0.05);

        let json = serde_json::to_string(&dist).unwrap();
        let values: Vec<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(values.len(), MAX_COEFFICIENTS);
    }
}
