//! Validation of caller-supplied filter parameters, done before anything is composed or
//! sent to the engine.

use crate::error::WindDataError;
use crate::grid::locate_point::MAX_NEAREST;
use crate::query::request::Predicate;

/// Varset every query is restricted to unless the caller picks another.
pub const DEFAULT_VARSET: &str = "all";

/// Optional year, month and hour restrictions.
///
/// Hours follow the dataset's filter convention of 1 to 24, while hourly aggregates
/// derived from `mohr % 100` come out as 0 to 23. Both conventions are kept as found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeFilters {
    years: Vec<i32>,
    months: Vec<u32>,
    hours: Vec<u32>,
}

impl TimeFilters {
    pub fn new(
        years: Option<Vec<i32>>,
        months: Option<Vec<u32>>,
        hours: Option<Vec<u32>>,
    ) -> Result<Self, WindDataError> {
        let months = months.unwrap_or_default();
        let hours = hours.unwrap_or_default();
        for &month in &months {
            check_month(month)?;
        }
        for &hour in &hours {
            check_hour(hour)?;
        }
        Ok(TimeFilters {
            years: years.unwrap_or_default(),
            months,
            hours,
        })
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub(crate) fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if !self.years.is_empty() {
            predicates.push(Predicate::Years(self.years.clone()));
        }
        if !self.months.is_empty() {
            predicates.push(Predicate::Months(self.months.clone()));
        }
        if !self.hours.is_empty() {
            predicates.push(Predicate::Hours(self.hours.clone()));
        }
        predicates
    }
}

/// Which value columns a call asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSelection {
    /// Every value column of the table.
    All,
    /// An explicit list, checked against the known columns.
    Columns(Vec<String>),
    /// Columns resolved from hub heights.
    Heights(Vec<f64>),
}

impl ColumnSelection {
    /// An explicit column list and a height list are mutually exclusive.
    pub fn from_options(
        columns: Option<Vec<String>>,
        heights: Option<Vec<f64>>,
    ) -> Result<Self, WindDataError> {
        match (columns, heights) {
            (Some(_), Some(_)) => Err(WindDataError::InvalidInput(
                "specify either columns or heights, not both".to_string(),
            )),
            (Some(columns), None) => Ok(ColumnSelection::Columns(columns)),
            (None, Some(heights)) if !heights.is_empty() => Ok(ColumnSelection::Heights(heights)),
            (None, _) => Ok(ColumnSelection::All),
        }
    }
}

pub fn check_month(month: u32) -> Result<(), WindDataError> {
    check_range("month", month, 1, 12)
}

pub fn check_hour(hour: u32) -> Result<(), WindDataError> {
    check_range("hour", hour, 1, 24)
}

pub fn check_n_nearest(n_nearest: usize) -> Result<(), WindDataError> {
    if !(1..=MAX_NEAREST).contains(&n_nearest) {
        return Err(WindDataError::InvalidInput(format!(
            "n_nearest must be between 1 and {MAX_NEAREST}, got {n_nearest}"
        )));
    }
    Ok(())
}

pub(crate) fn check_varset(varset: &str) -> Result<(), WindDataError> {
    if varset.trim().is_empty() {
        return Err(WindDataError::InvalidInput("varset must not be empty".to_string()));
    }
    Ok(())
}

fn check_range(parameter: &'static str, value: u32, min: u32, max: u32) -> Result<(), WindDataError> {
    if !(min..=max).contains(&value) {
        return Err(WindDataError::OutOfRange {
            parameter,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn valid_time_filters() -> Result<(), WindDataError> {
        let filters = TimeFilters::new(Some(vec![2001]), Some(vec![1, 12]), Some(vec![1, 24]))?;
        assert_eq!(filters.predicates().len(), 3);
        assert!(TimeFilters::default().predicates().is_empty());
        Ok(())
    }

    #[test]
    fn month_and_hour_bounds() {
        for (months, hours) in [(vec![0], vec![]), (vec![13], vec![]), (vec![], vec![0]), (vec![], vec![25])] {
            let err = TimeFilters::new(None, Some(months), Some(hours)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Range);
        }
    }

    #[test]
    fn columns_and_heights_are_exclusive() {
        let err =
            ColumnSelection::from_options(Some(vec!["windspeed_80m".into()]), Some(vec![80.0]))
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            ColumnSelection::from_options(None, None).ok(),
            Some(ColumnSelection::All)
        );
        assert_eq!(
            ColumnSelection::from_options(None, Some(vec![80.0])).ok(),
            Some(ColumnSelection::Heights(vec![80.0]))
        );
    }

    #[test]
    fn n_nearest_bounds() {
        assert!(check_n_nearest(1).is_ok());
        assert!(check_n_nearest(16).is_ok());
        assert!(check_n_nearest(0).is_err());
        assert!(check_n_nearest(17).is_err());
    }
}
