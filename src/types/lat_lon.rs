use crate::error::WindDataError;

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
/// Both values are represented as `f64`.
///
/// # Examples
///
/// ```
/// use windwatts::LatLon;
///
/// let golden = LatLon(39.74, -105.17);
/// assert_eq!(golden.0, 39.74); // Latitude
/// assert_eq!(golden.1, -105.17); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }

    /// Fails with [`WindDataError::InvalidInput`] if either coordinate is NaN or infinite.
    pub(crate) fn check_finite(&self) -> Result<(), WindDataError> {
        if self.0.is_finite() && self.1.is_finite() {
            Ok(())
        } else {
            Err(WindDataError::InvalidInput(format!(
                "coordinates must be finite, got ({}, {})",
                self.0, self.1
            )))
        }
    }
}

impl From<(f64, f64)> for LatLon {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        LatLon(latitude, longitude)
    }
}
