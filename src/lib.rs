mod aggregation;
mod cache;
mod clients;
mod config;
mod error;
mod grid;
mod heights;
mod query;
mod types;
mod utils;
mod wind_client;

#[cfg(test)]
mod testing;

pub use error::{ErrorKind, RemoteStage, WindDataError};
pub use wind_client::*;

pub use clients::led_1224_client::*;

pub use config::{WindDataConfig, DEFAULT_RESULT_REUSE_MINUTES};

pub use aggregation::WindFrameAggregateExt;
pub use cache::location_cache::{CacheEntry, FetchedLocation, Freshness, LocationCache};

pub use grid::error::LocateError;
pub use grid::load::{load_grid_points, GridSource};
pub use grid::locate_point::{GridIndex, MAX_NEAREST};

pub use heights::height_map::{
    HeightColumnMap, HeightMatch, MAX_INTERPOLATION_HEIGHT, MIN_INTERPOLATION_HEIGHT,
};
pub use heights::interpolate::{interpolate, interpolate_column, BracketColumn};

pub use query::composer::QueryComposer;
pub use query::engine::{ExecutionContext, QueryEngine, QueryExecution, QueryState, RawResultSet};
pub use query::error::QueryError;
pub use query::filters::{
    check_hour, check_month, check_n_nearest, ColumnSelection, TimeFilters, DEFAULT_VARSET,
};
pub use query::request::{
    Addressing, GroupKey, OrderBy, Predicate, QueryParam, QueryRequest, SelectItem,
    SortDirection, Statistic,
};
pub use query::result_store::{s3_result_store, ResultReader};
pub use query::runner::{LocatedFrame, PollConfig, PollSpeed, QueryRunner};

pub use types::aggregate::{AggregateKind, AggregateResult, Bucket};
pub use types::dataset::Dataset;
pub use types::grid_point::{GridPoint, NearestPoint};
pub use types::lat_lon::LatLon;

pub use utils::{ensure_cache_dir_exists, get_cache_dir};
