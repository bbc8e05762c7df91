//! Defines the dataset variants the client can be pointed at. Each variant carries its
//! own column naming scheme, selected once when the client is built.

use std::fmt;
use std::str::FromStr;

/// The wind dataset backing a client.
///
/// The two variants store the same kind of data under different column names, so the
/// variant decides how a hub height is parsed out of a column name and how the
/// windspeed column for a height is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dataset {
    /// NREL Wind ToolKit. Columns look like `windspeed_100m`, `winddirection_80m`.
    #[default]
    Wtk,
    /// ERA5 reanalysis. Columns look like `ws100`, `wd100`.
    Era5,
}

impl Dataset {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Dataset::Wtk => "wtk",
            Dataset::Era5 => "era5",
        }
    }

    /// Extracts the hub height embedded in a column name, or `None` if the column is not
    /// height-specific (`year`, `mohr`, `index`, ...).
    ///
    /// # Examples
    ///
    /// ```
    /// use windwatts::Dataset;
    ///
    /// assert_eq!(Dataset::Wtk.parse_height("windspeed_100m"), Some(100));
    /// assert_eq!(Dataset::Wtk.parse_height("mohr"), None);
    /// assert_eq!(Dataset::Era5.parse_height("ws100"), Some(100));
    /// assert_eq!(Dataset::Era5.parse_height("year"), None);
    /// ```
    pub fn parse_height(&self, column: &str) -> Option<u32> {
        match self {
            Dataset::Wtk => {
                let digits = column.strip_suffix('m')?.rsplit('_').next()?;
                parse_digits(digits)
            }
            Dataset::Era5 => column.get(2..).and_then(parse_digits),
        }
    }

    /// The windspeed column for a hub height, whether or not the dataset stores it.
    pub fn windspeed_column(&self, height: u32) -> String {
        match self {
            Dataset::Wtk => format!("windspeed_{height}m"),
            Dataset::Era5 => format!("ws{height}"),
        }
    }

    pub(crate) fn is_windspeed_column(&self, column: &str) -> bool {
        match self {
            Dataset::Wtk => column.starts_with("windspeed"),
            Dataset::Era5 => column.starts_with("ws"),
        }
    }

    pub(crate) fn is_winddirection_column(&self, column: &str) -> bool {
        match self {
            Dataset::Wtk => column.starts_with("winddirection"),
            Dataset::Era5 => column.starts_with("wd"),
        }
    }

    pub(crate) fn grid_cache_file_name(&self) -> String {
        format!("{}_grid_points.bin", self.name())
    }
}

fn parse_digits(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wtk" => Ok(Dataset::Wtk),
            "era5" => Ok(Dataset::Era5),
            other => Err(format!("unknown dataset '{other}', expected one of wtk, era5")),
        }
    }
}
