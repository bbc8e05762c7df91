pub mod aggregate;
pub mod dataset;
pub mod grid_point;
pub mod lat_lon;
