use crate::error::WindDataError;
use crate::types::grid_point::{GridPoint, NearestPoint};
use haversine::{distance, Location as HaversineLocation, Units};
use rstar::RTree;
use std::collections::HashMap;

/// Largest `k` accepted by [`GridIndex::nearest_k`].
pub const MAX_NEAREST: usize = 16;

/// Nearest-neighbour index over the dataset's grid points.
///
/// Distances used for ranking are planar over `(longitude, latitude)` in degrees, which is
/// what decides the grid point a location maps to. The kilometre distance reported by
/// [`GridIndex::nearest_points`] is informational only.
#[derive(Debug, Clone)]
pub struct GridIndex {
    rtree: RTree<GridPoint>,
    coordinates: HashMap<String, (f64, f64)>,
}

impl GridIndex {
    pub fn new(points: Vec<GridPoint>) -> Self {
        let coordinates = points
            .iter()
            .map(|p| (p.id.clone(), (p.latitude, p.longitude)))
            .collect();
        GridIndex {
            rtree: RTree::bulk_load(points),
            coordinates,
        }
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    /// The grid point closest to `(latitude, longitude)`.
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Result<&GridPoint, WindDataError> {
        check_coordinates(latitude, longitude)?;
        self.rtree
            .nearest_neighbor(&[longitude, latitude])
            .ok_or_else(|| WindDataError::NotFound("grid index is empty".to_string()))
    }

    /// The `k` closest grid points, nearest first.
    pub fn nearest_k(
        &self,
        latitude: f64,
        longitude: f64,
        k: usize,
    ) -> Result<Vec<&GridPoint>, WindDataError> {
        check_coordinates(latitude, longitude)?;
        if k == 0 || k > MAX_NEAREST {
            return Err(WindDataError::InvalidInput(format!(
                "number of nearest points must be between 1 and {MAX_NEAREST}, got {k}"
            )));
        }
        if self.is_empty() {
            return Err(WindDataError::NotFound("grid index is empty".to_string()));
        }
        if k > self.len() {
            return Err(WindDataError::InvalidInput(format!(
                "requested {k} nearest points but the grid only has {}",
                self.len()
            )));
        }
        Ok(self
            .rtree
            .nearest_neighbor_iter(&[longitude, latitude])
            .take(k)
            .collect())
    }

    /// Like [`GridIndex::nearest_k`], with the great-circle distance to each point attached.
    pub fn nearest_points(
        &self,
        latitude: f64,
        longitude: f64,
        k: usize,
    ) -> Result<Vec<NearestPoint>, WindDataError> {
        Ok(self
            .nearest_k(latitude, longitude, k)?
            .into_iter()
            .map(|point| {
                let distance_km = distance(
                    HaversineLocation {
                        latitude,
                        longitude,
                    },
                    HaversineLocation {
                        latitude: point.latitude,
                        longitude: point.longitude,
                    },
                    Units::Kilometers,
                );
                NearestPoint {
                    point: point.clone(),
                    distance_km,
                }
            })
            .collect())
    }

    /// `(latitude, longitude)` of a grid point id, if the grid has it.
    pub fn coordinates(&self, id: &str) -> Option<(f64, f64)> {
        self.coordinates.get(id).copied()
    }

    pub fn points(&self) -> impl Iterator<Item = &GridPoint> {
        self.rtree.iter()
    }
}

fn check_coordinates(latitude: f64, longitude: f64) -> Result<(), WindDataError> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(WindDataError::InvalidInput(format!(
            "coordinates must be finite, got ({latitude}, {longitude})"
        )));
    }
    Ok(())
}
