use crate::error::WindDataError;
use crate::types::aggregate::round2;
use polars::prelude::*;

/// One side of an interpolation bracket: a height and the column sampled there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketColumn<'a> {
    pub height: f64,
    pub column: &'a str,
}

/// Linearly interpolates between `(lower_height, lower_value)` and
/// `(upper_height, upper_value)` at `target_height`, rounded to 2 decimals.
///
/// # Examples
///
/// ```
/// use windwatts::interpolate;
///
/// assert_eq!(interpolate(10.0, 4.0, 100.0, 6.0, 55.0).unwrap(), 5.0);
/// ```
pub fn interpolate(
    lower_height: f64,
    lower_value: f64,
    upper_height: f64,
    upper_value: f64,
    target_height: f64,
) -> Result<f64, WindDataError> {
    check_bracket(lower_height, upper_height, target_height)?;
    Ok(linear(
        lower_height,
        lower_value,
        upper_height,
        upper_value,
        target_height,
    ))
}

/// Interpolates every row of `df` between two bracket columns, producing a new column
/// named `output`. A row with a null on either side stays null.
pub fn interpolate_column(
    df: &DataFrame,
    lower: BracketColumn<'_>,
    upper: BracketColumn<'_>,
    target_height: f64,
    output: &str,
) -> Result<Column, WindDataError> {
    check_bracket(lower.height, upper.height, target_height)?;
    let lower_values = float_column(df, lower.column)?;
    let upper_values = float_column(df, upper.column)?;

    let values: Vec<Option<f64>> = lower_values
        .f64()?
        .into_iter()
        .zip(upper_values.f64()?)
        .map(|pair| match pair {
            (Some(lv), Some(uv)) => Some(linear(
                lower.height,
                lv,
                upper.height,
                uv,
                target_height,
            )),
            _ => None,
        })
        .collect();
    Ok(Column::new(output.into(), values))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Column, WindDataError> {
    df.column(name)
        .map_err(|_| WindDataError::MissingColumn(name.to_string()))?
        .cast(&DataType::Float64)
        .map_err(WindDataError::from)
}

fn check_bracket(lower_height: f64, upper_height: f64, target_height: f64) -> Result<(), WindDataError> {
    if lower_height == upper_height {
        return Err(WindDataError::DegenerateBracket {
            height: lower_height,
            target: target_height,
        });
    }
    Ok(())
}

fn linear(
    lower_height: f64,
    lower_value: f64,
    upper_height: f64,
    upper_value: f64,
    target_height: f64,
) -> f64 {
    let slope = (upper_value - lower_value) / (upper_height - lower_height);
    round2(lower_value + (target_height - lower_height) * slope)
}
