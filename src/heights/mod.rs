pub mod height_map;
pub mod interpolate;
