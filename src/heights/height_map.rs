use crate::error::WindDataError;
use crate::types::dataset::Dataset;
use std::collections::{BTreeMap, BTreeSet};

/// Lowest hub height windspeed may be interpolated to, in meters.
pub const MIN_INTERPOLATION_HEIGHT: f64 = 10.0;
/// Highest hub height windspeed may be interpolated to, in meters.
pub const MAX_INTERPOLATION_HEIGHT: f64 = 1000.0;

/// Dataset columns grouped by the hub height embedded in their name.
///
/// Columns without a parseable height (`year`, `mohr`, `index`, ...) are left out, so
/// every key maps to at least one column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeightColumnMap {
    by_height: BTreeMap<u32, BTreeSet<String>>,
}

/// The available heights around a requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightMatch {
    Exact(u32),
    Bracket {
        lower: Option<u32>,
        upper: Option<u32>,
    },
}

impl HeightColumnMap {
    pub fn new<I, S>(dataset: Dataset, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_height: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
        for column in columns {
            let column = column.as_ref();
            if let Some(height) = dataset.parse_height(column) {
                by_height
                    .entry(height)
                    .or_default()
                    .insert(column.to_string());
            }
        }
        HeightColumnMap { by_height }
    }

    /// Available heights, ascending.
    pub fn heights(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_height.keys().copied()
    }

    pub fn columns_at(&self, height: u32) -> Option<&BTreeSet<String>> {
        self.by_height.get(&height)
    }

    pub fn is_empty(&self) -> bool {
        self.by_height.is_empty()
    }

    /// Locates `height` among the available keys. Only whole-meter heights can match
    /// exactly; anything else is bracketed by its strict neighbours.
    pub fn locate(&self, height: f64) -> HeightMatch {
        if height.fract() == 0.0 && height >= 0.0 && height <= u32::MAX as f64 {
            let whole = height as u32;
            if self.by_height.contains_key(&whole) {
                return HeightMatch::Exact(whole);
            }
        }
        let lower = self
            .by_height
            .keys()
            .rev()
            .find(|&&h| f64::from(h) < height)
            .copied();
        let upper = self
            .by_height
            .keys()
            .find(|&&h| f64::from(h) > height)
            .copied();
        HeightMatch::Bracket { lower, upper }
    }

    /// Resolves each desired height to the columns needed to serve it: the exact
    /// height's columns, or the columns of whichever bracketing heights exist.
    ///
    /// The result is deduplicated and sorted by name.
    pub fn resolve(
        &self,
        desired_heights: &[f64],
        interpolation_required: bool,
    ) -> Result<BTreeSet<String>, WindDataError> {
        let mut columns = BTreeSet::new();
        for &height in desired_heights {
            if !height.is_finite() {
                return Err(WindDataError::InvalidInput(format!(
                    "height must be a finite number, got {height}"
                )));
            }
            if interpolation_required
                && !(MIN_INTERPOLATION_HEIGHT..=MAX_INTERPOLATION_HEIGHT).contains(&height)
            {
                return Err(WindDataError::OutOfRange {
                    parameter: "height",
                    value: height,
                    min: MIN_INTERPOLATION_HEIGHT,
                    max: MAX_INTERPOLATION_HEIGHT,
                });
            }
            let heights = match self.locate(height) {
                HeightMatch::Exact(h) => vec![h],
                HeightMatch::Bracket {
                    lower: None,
                    upper: None,
                } => {
                    return Err(WindDataError::NotFound(format!(
                        "no columns at or around {height}m"
                    )))
                }
                HeightMatch::Bracket { lower, upper } => lower.into_iter().chain(upper).collect(),
            };
            for h in heights {
                if let Some(set) = self.by_height.get(&h) {
                    columns.extend(set.iter().cloned());
                }
            }
        }
        Ok(columns)
    }
}
