//! The structured request handed to a [`QueryEngine`](crate::QueryEngine), and the
//! building blocks the composer assembles it from.
//!
//! Identifiers (table and column names) are validated before they reach a statement.
//! Every caller-supplied value (years, months, hours, varset, location ids) is bound as
//! a positional `?` parameter instead of being spliced into the text.

use std::fmt;
use std::str::FromStr;

/// Expression deriving the month from the combined month/hour field.
pub(crate) const MONTH_EXPR: &str = "CAST(mohr AS INT) / 100";
/// Expression deriving the hour from the combined month/hour field.
pub(crate) const HOUR_EXPR: &str = "CAST(mohr AS INT) % 100";
/// Expression recovering the location id from the storage partition path of a row.
pub(crate) const PARTITION_INDEX_EXPR: &str = r#"regexp_extract("$path", '.*/index=([^/]+)/.*', 1)"#;

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Text(String),
    Int(i64),
}

impl fmt::Display for QueryParam {
    /// Renders the parameter as a SQL literal, the form engines expect for execution
    /// parameters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryParam::Text(text) => write!(f, "'{}'", text.replace('\'', "''")),
            QueryParam::Int(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Avg,
    Sum,
    Min,
    Max,
}

impl Statistic {
    pub fn sql_name(&self) -> &'static str {
        match self {
            Statistic::Avg => "AVG",
            Statistic::Sum => "SUM",
            Statistic::Min => "MIN",
            Statistic::Max => "MAX",
        }
    }

    /// Output name of the statistic over `column`, e.g. `windspeed_100m_avg`.
    pub fn alias(&self, column: &str) -> String {
        format!("{column}_{}", self.sql_name().to_ascii_lowercase())
    }
}

impl FromStr for Statistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVG" => Ok(Statistic::Avg),
            "SUM" => Ok(Statistic::Sum),
            "MIN" => Ok(Statistic::Min),
            "MAX" => Ok(Statistic::Max),
            other => Err(format!(
                "unsupported statistic '{other}', expected one of AVG, SUM, MIN, MAX"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(format!("invalid order direction '{other}', use ASC or DESC")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        OrderBy {
            column: column.into(),
            direction,
        }
    }
}

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    /// `*`
    All,
    Column(String),
    /// `STAT(column) AS column_stat`
    Statistic {
        statistic: Statistic,
        column: String,
    },
    /// Month derived from `mohr`, output as `month`.
    Month,
    /// Hour derived from `mohr`, output as `hour`.
    Hour,
    /// Location id recovered from the partition path, output as `index`.
    PartitionIndex,
}

impl SelectItem {
    pub fn column(name: impl Into<String>) -> Self {
        SelectItem::Column(name.into())
    }

    /// The name this item has in the result set. `None` for `*`.
    pub fn output_name(&self) -> Option<String> {
        match self {
            SelectItem::All => None,
            SelectItem::Column(column) => Some(column.clone()),
            SelectItem::Statistic { statistic, column } => Some(statistic.alias(column)),
            SelectItem::Month => Some("month".to_string()),
            SelectItem::Hour => Some("hour".to_string()),
            SelectItem::PartitionIndex => Some("index".to_string()),
        }
    }

    /// The dataset column this item reads, if any.
    pub(crate) fn source_column(&self) -> Option<&str> {
        match self {
            SelectItem::Column(column) | SelectItem::Statistic { column, .. } => Some(column),
            SelectItem::Month | SelectItem::Hour => Some("mohr"),
            SelectItem::All | SelectItem::PartitionIndex => None,
        }
    }

    pub(crate) fn render(&self) -> String {
        match self {
            SelectItem::All => "*".to_string(),
            SelectItem::Column(column) => column.clone(),
            SelectItem::Statistic { statistic, column } => {
                format!("{}({column}) AS {}", statistic.sql_name(), statistic.alias(column))
            }
            SelectItem::Month => format!("{MONTH_EXPR} AS month"),
            SelectItem::Hour => format!("{HOUR_EXPR} AS hour"),
            SelectItem::PartitionIndex => format!("{PARTITION_INDEX_EXPR} AS index"),
        }
    }
}

/// A `WHERE` conjunct. Values are always bound as parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Years are stored as text partitions, so they are bound as strings.
    Years(Vec<i32>),
    Months(Vec<u32>),
    Hours(Vec<u32>),
    Varset(String),
    Locations(Vec<String>),
}

impl Predicate {
    pub(crate) fn render(&self, parameters: &mut Vec<QueryParam>) -> String {
        let (lhs, values): (&str, Vec<QueryParam>) = match self {
            Predicate::Years(years) => (
                "year",
                years.iter().map(|y| QueryParam::Text(y.to_string())).collect(),
            ),
            Predicate::Months(months) => (
                MONTH_EXPR,
                months.iter().map(|&m| QueryParam::Int(m.into())).collect(),
            ),
            Predicate::Hours(hours) => (
                HOUR_EXPR,
                hours.iter().map(|&h| QueryParam::Int(h.into())).collect(),
            ),
            Predicate::Varset(varset) => ("varset", vec![QueryParam::Text(varset.clone())]),
            Predicate::Locations(ids) => (
                "index",
                ids.iter().map(|id| QueryParam::Text(id.clone())).collect(),
            ),
        };
        let placeholders = vec!["?"; values.len()].join(", ");
        let rendered = if values.len() == 1 {
            format!("{lhs} = ?")
        } else {
            format!("{lhs} IN ({placeholders})")
        };
        parameters.extend(values);
        rendered
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Predicate::Years(v) => v.is_empty(),
            Predicate::Months(v) | Predicate::Hours(v) => v.is_empty(),
            Predicate::Varset(v) => v.is_empty(),
            Predicate::Locations(v) => v.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Index,
    Year,
    Month,
    Hour,
}

impl GroupKey {
    pub(crate) fn render(&self) -> &'static str {
        match self {
            GroupKey::Index => "index",
            GroupKey::Year => "year",
            GroupKey::Month => MONTH_EXPR,
            GroupKey::Hour => HOUR_EXPR,
        }
    }

    /// The select item that must accompany this key in the select list.
    pub(crate) fn select_item(&self) -> SelectItem {
        match self {
            GroupKey::Index => SelectItem::column("index"),
            GroupKey::Year => SelectItem::column("year"),
            GroupKey::Month => SelectItem::Month,
            GroupKey::Hour => SelectItem::Hour,
        }
    }
}

/// How the rows of a request are tied to grid locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing {
    /// A predicate restricts rows to these location ids.
    Locations(Vec<String>),
    /// No location predicate; each row's id comes from its storage partition path.
    PartitionPath,
    /// Neither: whole-table statistics and metadata statements.
    Unscoped,
}

/// A statement with positional `?` placeholders and the values bound to them, ready to
/// be submitted to a query engine.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub statement: String,
    pub parameters: Vec<QueryParam>,
    /// Result column names in select order; empty for `SELECT *` and metadata statements.
    pub output_columns: Vec<String>,
    pub addressing: Addressing,
}

impl QueryRequest {
    /// `DESCRIBE <table>`. The table must already be a validated identifier.
    pub(crate) fn describe(table: &str) -> Self {
        QueryRequest {
            statement: format!("DESCRIBE {table}"),
            parameters: Vec::new(),
            output_columns: Vec::new(),
            addressing: Addressing::Unscoped,
        }
    }

    /// The execution-parameter strings, in placeholder order.
    pub fn parameter_literals(&self) -> Vec<String> {
        self.parameters.iter().map(ToString::to_string).collect()
    }

    /// The statement with parameters substituted as literals. For engines without
    /// parameter binding and for logging; values are quoted and escaped.
    pub fn render_inline(&self) -> String {
        let mut parameters = self.parameters.iter();
        let mut rendered = String::with_capacity(self.statement.len());
        let mut in_literal = false;
        for ch in self.statement.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    rendered.push(ch);
                }
                '?' if !in_literal => match parameters.next() {
                    Some(param) => rendered.push_str(&param.to_string()),
                    None => rendered.push(ch),
                },
                _ => rendered.push(ch),
            }
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_parameters_are_escaped() {
        assert_eq!(QueryParam::Text("all".into()).to_string(), "'all'");
        assert_eq!(
            QueryParam::Text("x' OR '1'='1".into()).to_string(),
            "'x'' OR ''1''=''1'"
        );
        assert_eq!(QueryParam::Int(12).to_string(), "12");
    }

    #[test]
    fn statistic_aliases() {
        let item = SelectItem::Statistic {
            statistic: "avg".parse().unwrap(),
            column: "windspeed_100m".into(),
        };
        assert_eq!(item.render(), "AVG(windspeed_100m) AS windspeed_100m_avg");
        assert_eq!(item.output_name().as_deref(), Some("windspeed_100m_avg"));
        assert!("MEDIAN".parse::<Statistic>().is_err());
    }

    #[test]
    fn predicates_bind_values() {
        let mut params = Vec::new();
        assert_eq!(
            Predicate::Years(vec![2001, 2002]).render(&mut params),
            "year IN (?, ?)"
        );
        assert_eq!(Predicate::Months(vec![7]).render(&mut params), format!("{MONTH_EXPR} = ?"));
        assert_eq!(
            params,
            vec![
                QueryParam::Text("2001".into()),
                QueryParam::Text("2002".into()),
                QueryParam::Int(7)
            ]
        );
    }

    #[test]
    fn inline_rendering_skips_quoted_question_marks() {
        let request = QueryRequest {
            statement: "SELECT '?' AS q FROM t WHERE a = ? AND b IN (?, ?)".into(),
            parameters: vec![
                QueryParam::Text("x".into()),
                QueryParam::Int(1),
                QueryParam::Int(2),
            ],
            output_columns: vec!["q".into()],
            addressing: Addressing::Unscoped,
        };
        assert_eq!(
            request.render_inline(),
            "SELECT '?' AS q FROM t WHERE a = 'x' AND b IN (1, 2)"
        );
        assert_eq!(request.parameter_literals(), vec!["'x'", "1", "2"]);
    }

    #[test]
    fn direction_parsing() {
        assert_eq!("desc".parse::<SortDirection>(), Ok(SortDirection::Desc));
        assert_eq!(SortDirection::default(), SortDirection::Asc);
        assert!("UP".parse::<SortDirection>().is_err());
    }
}
