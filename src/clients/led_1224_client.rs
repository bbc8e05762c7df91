//! Provides the `Led1224Client` for querying the 12x24 wind tables: hourly values for
//! every month, stored per location and height.
//!
//! The client is obtained via [`WindClient::led_1224()`] and composes filter, statistic,
//! time-series and map queries that run on the remote engine. Nothing here touches the
//! [`WindClient`]'s location cache.
//!
//! Queries with a location are scoped to the ids of the nearest grid points and run
//! against the location-partitioned table. Queries without one run against the
//! alternate table and recover each row's location id from its storage path, which
//! scans far more data.

use crate::error::{RemoteStage, WindDataError};
use crate::query::filters::{
    check_hour, check_month, check_n_nearest, ColumnSelection, TimeFilters, DEFAULT_VARSET,
};
use crate::query::request::{
    GroupKey, OrderBy, Predicate, QueryRequest, SelectItem, SortDirection, Statistic,
};
use crate::query::runner::{LocatedFrame, PollSpeed};
use crate::types::lat_lon::LatLon;
use crate::wind_client::WindClient;
use bon::bon;
use log::info;
use polars::prelude::DataFrame;
use std::fmt;

/// Columns that never hold a measured value.
const NON_VALUE_COLUMNS: [&str; 4] = ["mohr", "varset", "year", "index"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapVariable {
    Windspeed,
    Winddirection,
}

impl fmt::Display for MapVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapVariable::Windspeed => write!(f, "windspeed"),
            MapVariable::Winddirection => write!(f, "winddirection"),
        }
    }
}

/// A client for the 12x24 query helpers.
///
/// Instances are created by calling [`WindClient::led_1224()`]. Every method returns a
/// builder; finish it with `.call().await`.
pub struct Led1224Client<'a> {
    client: &'a WindClient,
}

#[bon]
impl<'a> Led1224Client<'a> {
    /// Creates a new `Led1224Client`.
    ///
    /// This is typically called internally by [`WindClient::led_1224()`].
    pub(crate) fn new(client: &'a WindClient) -> Self {
        Self { client }
    }

    /// Fetches rows matching location, time and height filters.
    ///
    /// # Optional Builder Methods
    ///
    /// * `.columns(Vec<String>)`: Explicit columns to select. Defaults to every column.
    /// * `.heights(Vec<f64>)`: Select the columns at or bracketing these heights instead,
    ///   plus `mohr` and `year`. Cannot be combined with `.columns()`.
    /// * `.years(Vec<i32>)`, `.months(Vec<u32>)` (1-12), `.hours(Vec<u32>)` (1-24).
    /// * `.location(LatLon)`: Restrict to the `n_nearest` grid points around it. Without
    ///   a location every grid point is returned.
    /// * `.n_nearest(usize)`: 1 to 16, default 1.
    /// * `.varset(&str)`: Default `"all"`.
    ///
    /// # Returns
    ///
    /// The rows with an `index` column, plus the object-storage location of the result
    /// file. The location is also logged for location-agnostic queries, since those
    /// results tend to be large.
    ///
    /// # Errors
    ///
    /// [`WindDataError::InvalidInput`] or [`WindDataError::OutOfRange`] for bad filters,
    /// [`WindDataError::Remote`] if the query fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use windwatts::{LatLon, WindClient, WindDataError};
    /// # async fn run(client: &WindClient) -> Result<(), WindDataError> {
    /// let result = client
    ///     .led_1224()
    ///     .filtered_data()
    ///     .location(LatLon(39.74, -105.17))
    ///     .heights(vec![85.0])
    ///     .years(vec![2010, 2011])
    ///     .months(vec![6, 7, 8])
    ///     .call()
    ///     .await?;
    /// println!("{}", result.frame.head(Some(5)));
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn filtered_data(
        &self,
        columns: Option<Vec<String>>,
        heights: Option<Vec<f64>>,
        years: Option<Vec<i32>>,
        months: Option<Vec<u32>>,
        hours: Option<Vec<u32>>,
        location: Option<LatLon>,
        #[builder(default = 1)] n_nearest: usize,
        #[builder(into, default = DEFAULT_VARSET.to_string())] varset: String,
    ) -> Result<LocatedFrame, WindDataError> {
        check_n_nearest(n_nearest)?;
        let filters = TimeFilters::new(years, months, hours)?;
        let selection = ColumnSelection::from_options(columns, heights)?;
        let location_filter = self.location_filter(location, n_nearest)?;

        let mut columns = match selection {
            ColumnSelection::Columns(columns) => columns,
            ColumnSelection::All => self.columns_except(&["index"]),
            ColumnSelection::Heights(heights) => {
                let mut columns = self.client.find_relevant_columns(&heights, false)?;
                columns.extend(["mohr".to_string(), "year".to_string()]);
                columns
            }
        };
        columns.retain(|c| c != "index");

        let scoped = location_filter.is_some();
        let mut select: Vec<SelectItem> = columns.into_iter().map(SelectItem::Column).collect();
        select.push(if scoped {
            SelectItem::column("index")
        } else {
            SelectItem::PartitionIndex
        });

        let mut predicates = filters.predicates();
        predicates.push(Predicate::Varset(varset));
        predicates.extend(location_filter);

        let request = self
            .client
            .composer()
            .compose()
            .table(self.table_for(scoped))
            .select(select)
            .predicates(predicates)
            .call()?;
        self.run_located(&request, PollSpeed::Standard).await
    }

    /// Computes `statistic` (AVG by default) of selected columns, optionally grouped.
    ///
    /// Without `.columns()` or `.heights()` every value column is aggregated. Result
    /// columns are named `<column>_<statistic>`, e.g. `windspeed_100m_avg`.
    ///
    /// `group_by_index` only applies when `n_nearest > 1`. `order_by` must name one of
    /// the output columns (`month`, `hour`, `year`, `index` or an aggregate).
    #[builder]
    pub async fn compute_statistic(
        &self,
        columns: Option<Vec<String>>,
        heights: Option<Vec<f64>>,
        #[builder(default = Statistic::Avg)] statistic: Statistic,
        location: Option<LatLon>,
        #[builder(default = 1)] n_nearest: usize,
        years: Option<Vec<i32>>,
        months: Option<Vec<u32>>,
        hours: Option<Vec<u32>>,
        #[builder(default)] group_by_index: bool,
        #[builder(default)] group_by_year: bool,
        #[builder(default)] group_by_month: bool,
        #[builder(default)] group_by_hour: bool,
        #[builder(into)] order_by: Option<String>,
        #[builder(default)] order_direction: SortDirection,
        #[builder(into, default = DEFAULT_VARSET.to_string())] varset: String,
    ) -> Result<DataFrame, WindDataError> {
        check_n_nearest(n_nearest)?;
        let filters = TimeFilters::new(years, months, hours)?;
        let columns = match ColumnSelection::from_options(columns, heights)? {
            ColumnSelection::Columns(columns) => columns,
            ColumnSelection::All => self.columns_except(&NON_VALUE_COLUMNS),
            ColumnSelection::Heights(heights) => {
                self.client.find_relevant_columns(&heights, false)?
            }
        };
        let select = columns
            .into_iter()
            .map(|column| SelectItem::Statistic { statistic, column })
            .collect();

        let group_by = group_keys(
            group_by_index && n_nearest > 1,
            group_by_year,
            group_by_month,
            group_by_hour,
        );

        let location_filter = self.location_filter(location, n_nearest)?;
        let scoped = location_filter.is_some();
        let mut predicates: Vec<Predicate> = location_filter.into_iter().collect();
        predicates.extend(filters.predicates());
        predicates.push(Predicate::Varset(varset));

        let request = self
            .client
            .composer()
            .compose()
            .table(self.table_for(scoped))
            .select(select)
            .predicates(predicates)
            .group_by(group_by)
            .maybe_order_by(order_by.map(|column| OrderBy::new(column, order_direction)))
            .call()?;
        self.run_frame(&request, PollSpeed::Reduced).await
    }

    /// Average windspeed at a stored hub height, overall or grouped by year, month or
    /// hour. The table must have a windspeed column for exactly `height`.
    #[builder]
    pub async fn average_windspeed(
        &self,
        height: u32,
        location: Option<LatLon>,
        #[builder(default)] group_by_year: bool,
        #[builder(default)] group_by_month: bool,
        #[builder(default)] group_by_hour: bool,
        #[builder(into)] order_by: Option<String>,
        #[builder(default)] order_direction: SortDirection,
        #[builder(into, default = DEFAULT_VARSET.to_string())] varset: String,
    ) -> Result<DataFrame, WindDataError> {
        let column = self.client.dataset().windspeed_column(height);
        if !self.client.column_names().contains(&column) {
            return Err(WindDataError::InvalidInput(format!(
                "column '{column}' does not exist in the table"
            )));
        }

        let location_filter = self.location_filter(location, 1)?;
        let scoped = location_filter.is_some();
        let mut predicates: Vec<Predicate> = location_filter.into_iter().collect();
        predicates.push(Predicate::Varset(varset));

        let request = self
            .client
            .composer()
            .compose()
            .table(self.table_for(scoped))
            .select(vec![SelectItem::Statistic {
                statistic: Statistic::Avg,
                column,
            }])
            .predicates(predicates)
            .group_by(group_keys(false, group_by_year, group_by_month, group_by_hour))
            .maybe_order_by(order_by.map(|column| OrderBy::new(column, order_direction)))
            .call()?;
        self.run_frame(&request, PollSpeed::Reduced).await
    }

    /// Fetches the windspeed and wind direction series at or around `heights` for the
    /// grid point(s) nearest to a location.
    ///
    /// # Optional Builder Methods
    ///
    /// * `.years(Vec<i32>)`: Restrict to these years.
    /// * `.n_nearest(usize)`: 1 to 16, default 1.
    /// * `.varset(&str)`: Default `"all"`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use windwatts::{LatLon, WindClient, WindDataError};
    /// # async fn run(client: &WindClient) -> Result<(), WindDataError> {
    /// let series = client
    ///     .led_1224()
    ///     .timeseries(LatLon(39.74, -105.17))
    ///     .heights(vec![85.0, 120.0])
    ///     .n_nearest(4)
    ///     .call()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = timeseries)]
    #[doc(hidden)]
    pub async fn build_timeseries(
        &self,
        #[builder(start_fn)] location: LatLon,
        heights: Vec<f64>,
        years: Option<Vec<i32>>,
        #[builder(default = 1)] n_nearest: usize,
        #[builder(into, default = DEFAULT_VARSET.to_string())] varset: String,
    ) -> Result<DataFrame, WindDataError> {
        check_n_nearest(n_nearest)?;
        if heights.is_empty() {
            return Err(WindDataError::InvalidInput(
                "at least one height is required".to_string(),
            ));
        }
        let filters = TimeFilters::new(years, None, None)?;

        let dataset = self.client.dataset();
        let mut columns: Vec<String> = self
            .client
            .find_relevant_columns(&heights, false)?
            .into_iter()
            .filter(|c| dataset.is_windspeed_column(c) || dataset.is_winddirection_column(c))
            .collect();
        if columns.is_empty() {
            return Err(WindDataError::NotFound(format!(
                "no windspeed or winddirection columns around {heights:?}"
            )));
        }
        columns.extend(["year", "mohr", "index"].map(String::from));

        let mut predicates = filters.predicates();
        predicates.push(Predicate::Locations(
            self.client.location_ids(location, n_nearest)?,
        ));
        predicates.push(Predicate::Varset(varset));

        let request = self
            .client
            .composer()
            .compose()
            .table(self.client.table())
            .select(columns.into_iter().map(SelectItem::Column).collect())
            .predicates(predicates)
            .call()?;
        self.run_frame(&request, PollSpeed::Standard).await
    }

    /// Windspeed at or around `height` for every grid point, for one year, month and
    /// hour.
    #[builder]
    pub async fn windspeed_map(
        &self,
        height: f64,
        year: i32,
        month: u32,
        hour: u32,
        #[builder(into, default = DEFAULT_VARSET.to_string())] varset: String,
    ) -> Result<LocatedFrame, WindDataError> {
        self.map(MapVariable::Windspeed, height, year, month, hour, varset)
            .await
    }

    /// Wind direction at or around `height` for every grid point, for one year, month
    /// and hour.
    #[builder]
    pub async fn winddirection_map(
        &self,
        height: f64,
        year: i32,
        month: u32,
        hour: u32,
        #[builder(into, default = DEFAULT_VARSET.to_string())] varset: String,
    ) -> Result<LocatedFrame, WindDataError> {
        self.map(MapVariable::Winddirection, height, year, month, hour, varset)
            .await
    }

    async fn map(
        &self,
        variable: MapVariable,
        height: f64,
        year: i32,
        month: u32,
        hour: u32,
        varset: String,
    ) -> Result<LocatedFrame, WindDataError> {
        check_month(month)?;
        check_hour(hour)?;
        let dataset = self.client.dataset();
        let mut select: Vec<SelectItem> = self
            .client
            .find_relevant_columns(&[height], false)?
            .into_iter()
            .filter(|c| match variable {
                MapVariable::Windspeed => dataset.is_windspeed_column(c),
                MapVariable::Winddirection => dataset.is_winddirection_column(c),
            })
            .map(SelectItem::Column)
            .collect();
        if select.is_empty() {
            return Err(WindDataError::NotFound(format!(
                "no {variable} columns at or around {height}m"
            )));
        }
        select.push(SelectItem::PartitionIndex);

        let request = self
            .client
            .composer()
            .compose()
            .table(self.client.alt_table())
            .select(select)
            .predicates(vec![
                Predicate::Years(vec![year]),
                Predicate::Months(vec![month]),
                Predicate::Hours(vec![hour]),
                Predicate::Varset(varset),
            ])
            .call()?;
        let result = self.run_located(&request, PollSpeed::Standard).await?;
        info!(
            "{variable} map at {height}m for {year}-{month:02} hour {hour}: {} locations",
            result.frame.height()
        );
        Ok(result)
    }

    fn columns_except(&self, excluded: &[&str]) -> Vec<String> {
        self.client
            .column_names()
            .iter()
            .filter(|c| !excluded.contains(&c.as_str()))
            .cloned()
            .collect()
    }

    fn location_filter(
        &self,
        location: Option<LatLon>,
        n_nearest: usize,
    ) -> Result<Option<Predicate>, WindDataError> {
        location
            .map(|location| {
                self.client
                    .location_ids(location, n_nearest)
                    .map(Predicate::Locations)
            })
            .transpose()
    }

    fn table_for(&self, scoped: bool) -> &'a str {
        if scoped {
            self.client.table()
        } else {
            self.client.alt_table()
        }
    }

    async fn run_frame(
        &self,
        request: &QueryRequest,
        speed: PollSpeed,
    ) -> Result<DataFrame, WindDataError> {
        self.client
            .runner()
            .run_frame(request, speed)
            .await
            .map_err(WindDataError::remote(RemoteStage::Query))
    }

    async fn run_located(
        &self,
        request: &QueryRequest,
        speed: PollSpeed,
    ) -> Result<LocatedFrame, WindDataError> {
        self.client
            .runner()
            .run_located(request, speed)
            .await
            .map_err(WindDataError::remote(RemoteStage::Query))
    }
}

fn group_keys(index: bool, year: bool, month: bool, hour: bool) -> Vec<GroupKey> {
    [
        (index, GroupKey::Index),
        (year, GroupKey::Year),
        (month, GroupKey::Month),
        (hour, GroupKey::Hour),
    ]
    .into_iter()
    .filter_map(|(enabled, key)| enabled.then_some(key))
    .collect()
}
