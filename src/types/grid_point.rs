//! Defines the precomputed dataset locations ("grid points") and the implementations
//! needed to index them spatially with the `rstar` crate.

use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// A single precomputed location of the wind dataset.
///
/// Every row of the remote table belongs to exactly one grid point, addressed by its
/// opaque `id` (the dataset's `index` column).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GridPoint {
    /// Opaque identifier used for exact-match row filtering (e.g. "1234567").
    pub id: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl GridPoint {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
        }
    }

    /// The point in the plane the index is built over: `[longitude, latitude]`.
    pub fn plane_point(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Grid points are indexed as degenerate boxes in the (longitude, latitude) plane.
impl RTreeObject for GridPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.plane_point())
    }
}

impl PointDistance for GridPoint {
    /// Squared Euclidean distance to `[query_longitude, query_latitude]`.
    ///
    /// Coordinates are treated as planar. Callers needing geodesic accuracy must project
    /// their points before building the index.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.longitude - point[0];
        let dy = self.latitude - point[1];
        dx * dx + dy * dy
    }
}

/// A grid point returned by a proximity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestPoint {
    pub point: GridPoint,
    /// Great-circle distance from the query coordinate, for display only.
    /// Results are ordered by planar distance, not by this value.
    pub distance_km: f64,
}
