//! This module provides the main entry point: a client bound to one dataset that maps
//! coordinates to grid locations, fetches their full time series once, and derives
//! windspeed summaries at arbitrary hub heights from the cached rows.

use crate::aggregation::WindFrameAggregateExt;
use crate::cache::location_cache::{FetchedLocation, Freshness, LocationCache};
use crate::clients::led_1224_client::Led1224Client;
use crate::config::WindDataConfig;
use crate::error::{RemoteStage, WindDataError};
use crate::grid::load::load_grid_points;
use crate::grid::locate_point::GridIndex;
use crate::heights::height_map::HeightColumnMap;
use crate::heights::interpolate::{interpolate_column, BracketColumn};
use crate::query::composer::{check_identifier, QueryComposer};
use crate::query::engine::QueryEngine;
use crate::query::request::{Predicate, SelectItem};
use crate::query::result_store::{s3_result_store, ResultReader};
use crate::query::runner::{PollConfig, PollSpeed, QueryRunner};
use crate::types::aggregate::{AggregateKind, AggregateResult, Bucket};
use crate::types::dataset::Dataset;
use crate::types::grid_point::{GridPoint, NearestPoint};
use crate::types::lat_lon::LatLon;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use log::{debug, info};
use object_store::ObjectStore;
use polars::prelude::*;
use std::sync::Arc;

/// How the windspeed column for a hub height is obtained.
#[derive(Debug, Clone, PartialEq)]
enum HeightColumn {
    /// The table stores it.
    Stored(String),
    /// Interpolated row by row from the nearest windspeed columns below and above.
    Interpolated {
        column: String,
        target: u32,
        lower: (u32, String),
        upper: (u32, String),
    },
}

impl HeightColumn {
    fn name(&self) -> &str {
        match self {
            HeightColumn::Stored(column) | HeightColumn::Interpolated { column, .. } => column,
        }
    }
}

/// The main client for retrieving and summarising wind-resource time series.
///
/// A client holds the grid index of its dataset, the table's column names, and a
/// single-slot cache of the last location fetched. Operations that touch the cache take
/// `&mut self`; use one client per task when fetching concurrently.
///
/// # Examples
///
/// ```no_run
/// # use windwatts::{Dataset, LatLon, QueryEngine, WindClient, WindDataConfig, WindDataError};
/// # use std::sync::Arc;
/// # async fn run(engine: Arc<dyn QueryEngine>) -> Result<(), WindDataError> {
/// let config = WindDataConfig::from_file("windwatts_config.json").await?;
/// let mut client = WindClient::connect()
///     .config(&config)
///     .dataset(Dataset::Wtk)
///     .engine(engine)
///     .call()
///     .await?;
///
/// let golden = LatLon(39.74, -105.17);
/// let average = client.global_avg_at_height(golden, 85).await?;
/// println!("Mean windspeed at 85m: {average} m/s");
/// # Ok(())
/// # }
/// ```
pub struct WindClient {
    dataset: Dataset,
    grid: GridIndex,
    heights: HeightColumnMap,
    column_names: Vec<String>,
    composer: QueryComposer,
    runner: QueryRunner,
    table: String,
    alt_table: String,
    cache: LocationCache,
}

#[bon]
impl WindClient {
    /// Creates a client from already-loaded parts.
    ///
    /// When `column_names` is not given the table is described through the engine.
    ///
    /// # Errors
    ///
    /// [`WindDataError::InvalidInput`] for table names that are not plain identifiers or
    /// an unusable `output_location`, [`WindDataError::Remote`] if describing the table
    /// fails and [`WindDataError::DataUnavailable`] if it reports no columns.
    #[builder]
    pub async fn new(
        config: &WindDataConfig,
        #[builder(default)] dataset: Dataset,
        engine: Arc<dyn QueryEngine>,
        result_store: Arc<dyn ObjectStore>,
        grid_points: Vec<GridPoint>,
        column_names: Option<Vec<String>>,
        #[builder(default)] poll: PollConfig,
    ) -> Result<Self, WindDataError> {
        check_identifier(&config.athena_table_name)?;
        check_identifier(config.alt_table())?;

        let runner = QueryRunner::new(
            engine,
            ResultReader::new(result_store, config.result_bucket()?),
            config.execution_context(),
            poll,
        );
        let column_names = match column_names {
            Some(columns) => columns,
            None => runner
                .describe_columns(&config.athena_table_name)
                .await
                .map_err(WindDataError::remote(RemoteStage::DescribeColumns))?,
        };
        if column_names.is_empty() {
            return Err(WindDataError::DataUnavailable(format!(
                "table {} reported no columns",
                config.athena_table_name
            )));
        }

        let heights = HeightColumnMap::new(dataset, column_names.iter().map(String::as_str));
        info!(
            "Client for {dataset} ready: {} grid points, {} columns over {} heights",
            grid_points.len(),
            column_names.len(),
            heights.heights().count()
        );
        Ok(Self {
            dataset,
            grid: GridIndex::new(grid_points),
            heights,
            composer: QueryComposer::new(column_names.iter().cloned()),
            column_names,
            runner,
            table: config.athena_table_name.clone(),
            alt_table: config.alt_table().to_string(),
            cache: LocationCache::new(),
        })
    }

    /// Creates a client that reads results from S3 and loads the grid dataset named by
    /// `location_data` in the config, caching it under `cache_dir` (or the default cache
    /// directory).
    #[builder]
    pub async fn connect(
        config: &WindDataConfig,
        #[builder(default)] dataset: Dataset,
        engine: Arc<dyn QueryEngine>,
        #[builder(default)] poll: PollConfig,
    ) -> Result<Self, WindDataError> {
        let source = config.grid_source().ok_or_else(|| {
            WindDataError::InvalidInput("config has no location_data for the grid".to_string())
        })?;
        let cache_dir = match &config.cache_dir {
            Some(dir) => dir.clone(),
            None => get_cache_dir().map_err(WindDataError::CacheDirResolution)?,
        };
        ensure_cache_dir_exists(&cache_dir)
            .await
            .map_err(|e| WindDataError::CacheDirCreation(cache_dir.clone(), e))?;
        let grid_points = load_grid_points(&source, dataset, &cache_dir).await?;

        let bucket = config.result_bucket()?;
        let result_store = s3_result_store(config.region_name.as_deref(), &bucket)
            .map_err(WindDataError::remote(RemoteStage::Connect))?;

        Self::builder()
            .config(config)
            .dataset(dataset)
            .engine(engine)
            .result_store(result_store)
            .grid_points(grid_points)
            .poll(poll)
            .build()
            .await
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn height_columns(&self) -> &HeightColumnMap {
        &self.heights
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    pub fn grid_points(&self) -> impl Iterator<Item = &GridPoint> {
        self.grid.points()
    }

    pub fn cache(&self) -> &LocationCache {
        &self.cache
    }

    /// Access to the 12x24 (month by hour) query helpers.
    pub fn led_1224(&self) -> Led1224Client<'_> {
        Led1224Client::new(self)
    }

    pub(crate) fn composer(&self) -> &QueryComposer {
        &self.composer
    }

    pub(crate) fn runner(&self) -> &QueryRunner {
        &self.runner
    }

    /// Table for location-scoped queries.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Table for location-agnostic queries.
    pub fn alt_table(&self) -> &str {
        &self.alt_table
    }

    /// Dataset columns needed to serve `heights`, sorted by name. See
    /// [`HeightColumnMap::resolve`].
    pub fn find_relevant_columns(
        &self,
        heights: &[f64],
        interpolation_required: bool,
    ) -> Result<Vec<String>, WindDataError> {
        Ok(self
            .heights
            .resolve(heights, interpolation_required)?
            .into_iter()
            .collect())
    }

    pub fn nearest_location(&self, location: LatLon) -> Result<&GridPoint, WindDataError> {
        self.grid.nearest(location.0, location.1)
    }

    /// The `n` nearest grid points, closest first, with their distance in km.
    pub fn nearest_locations(
        &self,
        location: LatLon,
        n: usize,
    ) -> Result<Vec<NearestPoint>, WindDataError> {
        self.grid.nearest_points(location.0, location.1, n)
    }

    /// Ids of the `n_nearest` grid points around `location`.
    pub(crate) fn location_ids(
        &self,
        location: LatLon,
        n_nearest: usize,
    ) -> Result<Vec<String>, WindDataError> {
        location.check_finite()?;
        if n_nearest == 1 {
            return Ok(vec![self.nearest_location(location)?.id.clone()]);
        }
        Ok(self
            .grid
            .nearest_k(location.0, location.1, n_nearest)?
            .into_iter()
            .map(|point| point.id.clone())
            .collect())
    }

    /// Adds `latitude` and `longitude` columns by looking up each row's `index`.
    ///
    /// # Errors
    ///
    /// [`WindDataError::MissingColumn`] without an `index` column and
    /// [`WindDataError::NotFound`] for ids that are not in the grid.
    pub fn map_index_to_coordinates(&self, mut df: DataFrame) -> Result<DataFrame, WindDataError> {
        let ids = df
            .column("index")
            .map_err(|_| WindDataError::MissingColumn("index".to_string()))?
            .cast(&DataType::String)?;
        let mut latitudes = Vec::with_capacity(df.height());
        let mut longitudes = Vec::with_capacity(df.height());
        for id in ids.str()?.into_iter() {
            let id = id.ok_or_else(|| {
                WindDataError::NotFound("row without a location index".to_string())
            })?;
            let (latitude, longitude) = self.grid.coordinates(id).ok_or_else(|| {
                WindDataError::NotFound(format!("location index '{id}' is not in the grid"))
            })?;
            latitudes.push(latitude);
            longitudes.push(longitude);
        }
        df.with_column(Column::new("latitude".into(), latitudes))?;
        df.with_column(Column::new("longitude".into(), longitudes))?;
        Ok(df)
    }

    /// Makes sure the cache holds the full time series of the grid point nearest to
    /// `location`, fetching it only if the cached input coordinates differ.
    pub async fn fetch_data(&mut self, location: LatLon) -> Result<Freshness, WindDataError> {
        location.check_finite()?;
        let LatLon(latitude, longitude) = location;
        let grid = &self.grid;
        let composer = &self.composer;
        let runner = &self.runner;
        let table = self.table.as_str();
        self.cache
            .ensure(latitude, longitude, || async move {
                let location_id = grid.nearest(latitude, longitude)?.id.clone();
                info!("Fetching data for ({latitude}, {longitude}) from location {location_id}");
                let request = composer
                    .compose()
                    .table(table)
                    .select(vec![SelectItem::All])
                    .predicates(vec![Predicate::Locations(vec![location_id.clone()])])
                    .call()?;
                let frame = runner
                    .run_frame(&request, PollSpeed::Reduced)
                    .await
                    .map_err(WindDataError::remote(RemoteStage::Fetch))?;
                Ok::<_, WindDataError>(FetchedLocation { location_id, frame })
            })
            .await
    }

    /// The cached time series for `location`, with the windspeed column for `height`
    /// added when the table does not store it.
    pub async fn timeseries(
        &mut self,
        location: LatLon,
        height: Option<u32>,
    ) -> Result<&DataFrame, WindDataError> {
        let plan = height.map(|h| self.plan_height(h)).transpose()?;
        self.fetch_data(location).await?;
        if let Some(plan) = &plan {
            self.apply_height(plan)?;
        }
        self.cached_frame()
    }

    /// Computes (or returns the cached) `kind` aggregate of the windspeed at `height`.
    ///
    /// Height and location are validated before anything is fetched. Aggregates are
    /// cached per kind until the location or the height changes.
    pub async fn avg_at_height(
        &mut self,
        location: LatLon,
        height: u32,
        kind: AggregateKind,
    ) -> Result<AggregateResult, WindDataError> {
        location.check_finite()?;
        let plan = self.plan_height(height)?;
        self.cache.on_height_change(height);
        self.fetch_data(location).await?;
        self.apply_height(&plan)?;

        if let Some(cached) = self.cache.aggregate(kind) {
            debug!("Returning cached {kind} aggregate at {height}m");
            return Ok(cached.clone());
        }
        let result = self.cached_frame()?.aggregate(plan.name(), kind)?;
        self.cache.store_aggregate(result.clone());
        Ok(result)
    }

    /// Mean windspeed over every row at `height`, rounded to 2 decimals.
    pub async fn global_avg_at_height(
        &mut self,
        location: LatLon,
        height: u32,
    ) -> Result<f64, WindDataError> {
        let result = self
            .avg_at_height(location, height, AggregateKind::Global)
            .await?;
        result.as_global().ok_or_else(|| {
            WindDataError::DataUnavailable(format!("no global mean at {height}m"))
        })
    }

    /// Mean windspeed per year, ascending by year.
    pub async fn yearly_avg_at_height(
        &mut self,
        location: LatLon,
        height: u32,
    ) -> Result<Vec<Bucket>, WindDataError> {
        self.grouped_avg(location, height, AggregateKind::Yearly)
            .await
    }

    /// Mean windspeed per month (1 to 12), ascending.
    pub async fn monthly_avg_at_height(
        &mut self,
        location: LatLon,
        height: u32,
    ) -> Result<Vec<Bucket>, WindDataError> {
        self.grouped_avg(location, height, AggregateKind::Monthly)
            .await
    }

    /// Mean windspeed per hour of day (0 to 23), ascending.
    pub async fn hourly_avg_at_height(
        &mut self,
        location: LatLon,
        height: u32,
    ) -> Result<Vec<Bucket>, WindDataError> {
        self.grouped_avg(location, height, AggregateKind::Hourly)
            .await
    }

    async fn grouped_avg(
        &mut self,
        location: LatLon,
        height: u32,
        kind: AggregateKind,
    ) -> Result<Vec<Bucket>, WindDataError> {
        let result = self.avg_at_height(location, height, kind).await?;
        Ok(result.buckets().to_vec())
    }

    fn cached_frame(&self) -> Result<&DataFrame, WindDataError> {
        self.cache
            .frame()
            .ok_or_else(|| WindDataError::DataUnavailable("no time series is cached".to_string()))
    }

    /// Decides from the column names alone how the windspeed column for `height` will be
    /// obtained, so bad heights fail before any fetch.
    fn plan_height(&self, height: u32) -> Result<HeightColumn, WindDataError> {
        if height == 0 {
            return Err(WindDataError::InvalidInput(
                "hub height must be a positive integer".to_string(),
            ));
        }
        let column = self.dataset.windspeed_column(height);
        if self.column_names.contains(&column) {
            return Ok(HeightColumn::Stored(column));
        }

        let mut bracket: Vec<(u32, String)> = self
            .heights
            .resolve(&[f64::from(height)], true)?
            .into_iter()
            .filter(|c| self.dataset.is_windspeed_column(c))
            .filter_map(|c| self.dataset.parse_height(&c).map(|h| (h, c)))
            .collect();
        bracket.sort();
        match <[(u32, String); 2]>::try_from(bracket) {
            Ok([lower, upper]) => Ok(HeightColumn::Interpolated {
                column,
                target: height,
                lower,
                upper,
            }),
            Err(found) => Err(WindDataError::NotFound(format!(
                "expected a windspeed column below and above {height}m, found {}",
                found.len()
            ))),
        }
    }

    /// Adds the planned windspeed column to the cached frame if it is not there yet.
    fn apply_height(&mut self, plan: &HeightColumn) -> Result<(), WindDataError> {
        let HeightColumn::Interpolated {
            column,
            target,
            lower,
            upper,
        } = plan
        else {
            return Ok(());
        };
        let frame = self.cached_frame()?;
        if frame.get_column_index(column).is_some() {
            return Ok(());
        }
        info!(
            "Interpolating windspeed at {target}m using model heights {}m and {}m",
            lower.0, upper.0
        );
        let values = interpolate_column(
            frame,
            BracketColumn {
                height: f64::from(lower.0),
                column: &lower.1,
            },
            BracketColumn {
                height: f64::from(upper.0),
                column: &upper.1,
            },
            f64::from(*target),
            column,
        )?;
        if let Some(frame) = self.cache.frame_mut() {
            frame.with_column(values)?;
        }
        Ok(())
    }
}
