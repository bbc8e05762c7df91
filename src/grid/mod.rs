pub mod error;
pub mod load;
pub mod locate_point;
