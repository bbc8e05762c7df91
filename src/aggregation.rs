use crate::error::WindDataError;
use crate::types::aggregate::{round2, AggregateKind, AggregateResult, Bucket};
use log::debug;
use polars::prelude::*;

const BUCKET: &str = "bucket";
const VALUE: &str = "value";
const ROWS: &str = "rows";

pub trait WindFrameAggregateExt {
    /// Mean of `value_column` over the whole frame or per year, month or hour.
    ///
    /// Months and hours are derived from the combined `mohr` field as `mohr / 100` and
    /// `mohr % 100`; years come from the `year` column. Means are rounded to 2 decimals
    /// and grouped results are ordered by bucket. A group whose values are all null is
    /// kept with no value.
    ///
    /// Rows with a null `year` or `mohr` belong to no bucket and are left out, so bucket
    /// row counts add up to the frame height only when those fields are complete.
    fn aggregate(
        &self,
        value_column: &str,
        kind: AggregateKind,
    ) -> Result<AggregateResult, WindDataError>;
}

impl WindFrameAggregateExt for DataFrame {
    fn aggregate(
        &self,
        value_column: &str,
        kind: AggregateKind,
    ) -> Result<AggregateResult, WindDataError> {
        require_column(self, value_column)?;
        let (bucket, source, wrap): (Expr, &str, fn(Vec<Bucket>) -> AggregateResult) = match kind
        {
            AggregateKind::Global => {
                return global_mean(self, value_column).map(AggregateResult::Global)
            }
            AggregateKind::Yearly => (
                col("year").cast(DataType::Int64),
                "year",
                AggregateResult::Yearly,
            ),
            AggregateKind::Monthly => (
                (col("mohr").cast(DataType::Int64) / lit(100i64)).cast(DataType::Int64),
                "mohr",
                AggregateResult::Monthly,
            ),
            AggregateKind::Hourly => (
                col("mohr").cast(DataType::Int64) % lit(100i64),
                "mohr",
                AggregateResult::Hourly,
            ),
        };
        require_column(self, source)?;
        grouped_means(self, value_column, kind, bucket).map(wrap)
    }
}

fn require_column(df: &DataFrame, name: &str) -> Result<(), WindDataError> {
    if df.get_column_index(name).is_none() {
        return Err(WindDataError::MissingColumn(name.to_string()));
    }
    Ok(())
}

fn global_mean(df: &DataFrame, value_column: &str) -> Result<f64, WindDataError> {
    let computation = |source| WindDataError::Computation {
        kind: AggregateKind::Global,
        column: value_column.to_string(),
        source,
    };
    let values = df
        .column(value_column)
        .and_then(|c| c.cast(&DataType::Float64))
        .map_err(computation)?;
    values
        .f64()
        .map_err(computation)?
        .mean()
        .map(round2)
        .ok_or_else(|| WindDataError::DataUnavailable(format!("no values in '{value_column}'")))
}

fn grouped_means(
    df: &DataFrame,
    value_column: &str,
    kind: AggregateKind,
    bucket: Expr,
) -> Result<Vec<Bucket>, WindDataError> {
    let computation = |source| WindDataError::Computation {
        kind,
        column: value_column.to_string(),
        source,
    };
    let grouped = df
        .clone()
        .lazy()
        .select([
            bucket.alias(BUCKET),
            col(value_column).cast(DataType::Float64).alias(VALUE),
        ])
        .group_by([col(BUCKET)])
        .agg([
            col(VALUE).mean().alias(VALUE),
            len().cast(DataType::UInt32).alias(ROWS),
        ])
        .sort([BUCKET], SortMultipleOptions::default())
        .collect()
        .map_err(computation)?;

    let keys = grouped.column(BUCKET).and_then(|c| c.i64()).map_err(computation)?;
    let means = grouped.column(VALUE).and_then(|c| c.f64()).map_err(computation)?;
    let rows = grouped.column(ROWS).and_then(|c| c.u32()).map_err(computation)?;

    let mut buckets = Vec::with_capacity(grouped.height());
    let mut unbucketed = 0;
    for ((key, mean), rows) in keys.into_iter().zip(means).zip(rows) {
        let rows = rows.map_or(0, |r| r as usize);
        let Some(key) = key else {
            unbucketed += rows;
            continue;
        };
        buckets.push(Bucket {
            key,
            value: mean.map(round2),
            rows,
        });
    }
    if unbucketed > 0 {
        debug!("Left {unbucketed} rows without a {kind} bucket out of the '{value_column}' means");
    }
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn series() -> PolarsResult<DataFrame> {
        df!(
            "year" => [2001i64, 2001, 2002, 2002, 2002],
            "mohr" => [101i64, 114, 101, 1214, 1223],
            "windspeed_100m" => [2.0, 4.0, 6.0, 8.0, 10.001],
        )
    }

    #[test]
    fn global_mean_of_three_rows() -> Result<(), WindDataError> {
        let df = df!("ws" => [2.0, 4.0, 6.0])?;
        assert_eq!(
            df.aggregate("ws", AggregateKind::Global)?,
            AggregateResult::Global(4.0)
        );
        Ok(())
    }

    #[test]
    fn yearly_groups_are_sorted_and_rounded() -> Result<(), WindDataError> {
        let result = series()?.aggregate("windspeed_100m", AggregateKind::Yearly)?;
        assert_eq!(
            result,
            AggregateResult::Yearly(vec![
                Bucket {
                    key: 2001,
                    value: Some(3.0),
                    rows: 2
                },
                Bucket {
                    key: 2002,
                    value: Some(8.0),
                    rows: 3
                },
            ])
        );
        Ok(())
    }

    #[test]
    fn monthly_and_hourly_derive_from_mohr() -> Result<(), WindDataError> {
        let df = series()?;
        let monthly = df.aggregate("windspeed_100m", AggregateKind::Monthly)?;
        let keys: Vec<_> = monthly.buckets().iter().map(|b| b.key).collect();
        assert_eq!(keys, vec![1, 12]);
        assert_eq!(monthly.buckets()[0].value, Some(4.0));

        let hourly = df.aggregate("windspeed_100m", AggregateKind::Hourly)?;
        let keys: Vec<_> = hourly.buckets().iter().map(|b| b.key).collect();
        assert_eq!(keys, vec![1, 14, 23]);
        assert_eq!(hourly.buckets()[0].value, Some(4.0));
        assert_eq!(hourly.buckets()[2].value, Some(10.0));
        Ok(())
    }

    #[test]
    fn groups_partition_all_rows() -> Result<(), WindDataError> {
        let df = series()?;
        for kind in [
            AggregateKind::Yearly,
            AggregateKind::Monthly,
            AggregateKind::Hourly,
        ] {
            let total: usize = df
                .aggregate("windspeed_100m", kind)?
                .buckets()
                .iter()
                .map(|b| b.rows)
                .sum();
            assert_eq!(total, df.height(), "{kind}");
        }
        Ok(())
    }

    #[test]
    fn missing_value_column() -> Result<(), WindDataError> {
        let err = series()?
            .aggregate("windspeed_85m", AggregateKind::Global)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
        assert!(matches!(err, WindDataError::MissingColumn(c) if c == "windspeed_85m"));
        Ok(())
    }

    #[test]
    fn missing_bucket_source() -> Result<(), WindDataError> {
        let df = df!("ws" => [1.0, 2.0])?;
        assert!(matches!(
            df.aggregate("ws", AggregateKind::Hourly),
            Err(WindDataError::MissingColumn(c)) if c == "mohr"
        ));
        Ok(())
    }

    #[test]
    fn all_null_column_has_no_global_mean() -> Result<(), WindDataError> {
        let df = df!("ws" => [None::<f64>, None])?;
        let err = df.aggregate("ws", AggregateKind::Global).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        Ok(())
    }

    #[test]
    fn all_null_year_keeps_other_years() -> Result<(), WindDataError> {
        let df = df!(
            "year" => [2001i64, 2001, 2002, 2003],
            "ws" => [Some(2.0), Some(4.0), None, Some(7.0)],
        )?;
        let result = df.aggregate("ws", AggregateKind::Yearly)?;
        assert_eq!(
            result.buckets(),
            &[
                Bucket {
                    key: 2001,
                    value: Some(3.0),
                    rows: 2
                },
                Bucket {
                    key: 2002,
                    value: None,
                    rows: 1
                },
                Bucket {
                    key: 2003,
                    value: Some(7.0),
                    rows: 1
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn rows_without_a_year_are_left_out() -> Result<(), WindDataError> {
        let df = df!(
            "year" => [Some(2001i64), None, Some(2002)],
            "ws" => [1.0, 2.0, 3.0],
        )?;
        let result = df.aggregate("ws", AggregateKind::Yearly)?;
        let keys: Vec<_> = result.buckets().iter().map(|b| b.key).collect();
        assert_eq!(keys, vec![2001, 2002]);
        let total: usize = result.buckets().iter().map(|b| b.rows).sum();
        assert_eq!(total, 2);
        Ok(())
    }

    #[test]
    fn bucket_means_round_ties_to_even() -> Result<(), WindDataError> {
        // (4.0 + 4.25) / 2 = 4.125
        let df = df!("year" => [2001i64, 2001], "ws" => [4.0, 4.25])?;
        let result = df.aggregate("ws", AggregateKind::Yearly)?;
        assert_eq!(result.buckets()[0].value, Some(4.12));
        Ok(())
    }
}
