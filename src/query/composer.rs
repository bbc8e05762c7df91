use crate::error::WindDataError;
use crate::query::filters::{check_hour, check_month, check_varset};
use crate::query::request::{Addressing, GroupKey, OrderBy, Predicate, QueryRequest, SelectItem};
use bon::bon;
use log::debug;
use std::collections::HashSet;

/// Builds [`QueryRequest`]s against a table whose columns are known up front.
///
/// Column references are checked against that set, so only names the table reported
/// ever end up in a statement.
#[derive(Debug, Clone, Default)]
pub struct QueryComposer {
    known_columns: HashSet<String>,
}

#[bon]
impl QueryComposer {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryComposer {
            known_columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn knows(&self, column: &str) -> bool {
        self.known_columns.contains(column)
    }

    /// Validates the parts of a query and assembles the request.
    ///
    /// Group keys add their own select item when the select list does not already
    /// contain it. `order_by` must name one of the resulting output columns
    /// (case-insensitively).
    #[builder]
    pub fn compose(
        &self,
        table: &str,
        select: Vec<SelectItem>,
        #[builder(default)] predicates: Vec<Predicate>,
        #[builder(default)] group_by: Vec<GroupKey>,
        order_by: Option<OrderBy>,
    ) -> Result<QueryRequest, WindDataError> {
        check_identifier(table)?;
        if select.is_empty() {
            return Err(WindDataError::InvalidInput(
                "a query must select at least one column".to_string(),
            ));
        }

        let mut select = select;
        for key in &group_by {
            let item = key.select_item();
            if !select.contains(&item) {
                select.push(item);
            }
        }

        for column in select.iter().filter_map(SelectItem::source_column) {
            self.check_column(column)?;
        }
        for predicate in &predicates {
            check_predicate(predicate)?;
        }
        let addressing = addressing_of(&select, &predicates)?;

        let output_columns: Vec<String> = select.iter().filter_map(SelectItem::output_name).collect();
        let order_by = order_by
            .map(|order| {
                let wanted = order.column.to_ascii_lowercase();
                output_columns
                    .iter()
                    .find(|name| **name == wanted)
                    .map(|name| (name.clone(), order.direction))
                    .ok_or_else(|| {
                        WindDataError::InvalidInput(format!(
                            "order_by column '{}' must be one of the selected columns: {}",
                            order.column,
                            output_columns.join(", ")
                        ))
                    })
            })
            .transpose()?;

        let mut statement = format!(
            "SELECT {} FROM {table}",
            select
                .iter()
                .map(SelectItem::render)
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut parameters = Vec::new();
        if !predicates.is_empty() {
            let conjuncts: Vec<String> = predicates
                .iter()
                .map(|p| p.render(&mut parameters))
                .collect();
            statement.push_str(" WHERE ");
            statement.push_str(&conjuncts.join(" AND "));
        }
        if !group_by.is_empty() {
            let keys: Vec<&str> = group_by.iter().map(GroupKey::render).collect();
            statement.push_str(" GROUP BY ");
            statement.push_str(&keys.join(", "));
        }
        if let Some((column, direction)) = order_by {
            statement.push_str(&format!(" ORDER BY {column} {}", direction.sql()));
        }

        debug!("Composed query: {statement}");
        Ok(QueryRequest {
            statement,
            parameters,
            output_columns,
            addressing,
        })
    }

    fn check_column(&self, column: &str) -> Result<(), WindDataError> {
        if !self.known_columns.contains(column) {
            return Err(WindDataError::InvalidInput(format!(
                "column '{column}' does not exist in the table"
            )));
        }
        check_identifier(column)
    }
}

/// Accepts `name` or `schema.name` made of ASCII letters, digits and underscores, not
/// starting with a digit.
pub(crate) fn check_identifier(identifier: &str) -> Result<(), WindDataError> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    if identifier.split('.').all(valid_part) {
        Ok(())
    } else {
        Err(WindDataError::InvalidInput(format!(
            "'{identifier}' is not a valid identifier"
        )))
    }
}

fn check_predicate(predicate: &Predicate) -> Result<(), WindDataError> {
    if predicate.is_empty() {
        return Err(WindDataError::InvalidInput(format!(
            "empty predicate {predicate:?}"
        )));
    }
    match predicate {
        Predicate::Months(months) => months.iter().try_for_each(|&m| check_month(m)),
        Predicate::Hours(hours) => hours.iter().try_for_each(|&h| check_hour(h)),
        Predicate::Varset(varset) => check_varset(varset),
        Predicate::Years(_) | Predicate::Locations(_) => Ok(()),
    }
}

fn addressing_of(select: &[SelectItem], predicates: &[Predicate]) -> Result<Addressing, WindDataError> {
    let partition_index = select.contains(&SelectItem::PartitionIndex);
    let locations = predicates.iter().find_map(|p| match p {
        Predicate::Locations(ids) => Some(ids.clone()),
        _ => None,
    });
    match (partition_index, locations) {
        (true, Some(_)) => Err(WindDataError::InvalidInput(
            "a partition-derived index cannot be combined with a location filter".to_string(),
        )),
        (true, None) => Ok(Addressing::PartitionPath),
        (false, Some(ids)) => Ok(Addressing::Locations(ids)),
        (false, None) => Ok(Addressing::Unscoped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::query::request::{QueryParam, SortDirection, Statistic, MONTH_EXPR};

    fn composer() -> QueryComposer {
        QueryComposer::new([
            "windspeed_80m",
            "windspeed_100m",
            "winddirection_80m",
            "mohr",
            "year",
            "varset",
            "index",
        ])
    }

    #[test]
    fn location_scoped_fetch() -> Result<(), WindDataError> {
        let request = composer()
            .compose()
            .table("wtk_1224")
            .select(vec![SelectItem::All])
            .predicates(vec![Predicate::Locations(vec!["123".into()])])
            .call()?;
        assert_eq!(request.statement, "SELECT * FROM wtk_1224 WHERE index = ?");
        assert_eq!(request.parameters, vec![QueryParam::Text("123".into())]);
        assert_eq!(request.addressing, Addressing::Locations(vec!["123".into()]));
        assert!(request.output_columns.is_empty());
        Ok(())
    }

    #[test]
    fn grouped_statistic_with_order() -> Result<(), WindDataError> {
        let request = composer()
            .compose()
            .table("wtk_1224")
            .select(vec![SelectItem::Statistic {
                statistic: Statistic::Avg,
                column: "windspeed_100m".into(),
            }])
            .predicates(vec![
                Predicate::Varset("all".into()),
                Predicate::Locations(vec!["1".into(), "2".into()]),
            ])
            .group_by(vec![GroupKey::Index, GroupKey::Month])
            .order_by(OrderBy::new("MONTH", SortDirection::Desc))
            .call()?;
        assert_eq!(
            request.statement,
            format!(
                "SELECT AVG(windspeed_100m) AS windspeed_100m_avg, index, {MONTH_EXPR} AS month \
                 FROM wtk_1224 WHERE varset = ? AND index IN (?, ?) \
                 GROUP BY index, {MONTH_EXPR} ORDER BY month DESC"
            )
        );
        assert_eq!(
            request.output_columns,
            vec!["windspeed_100m_avg", "index", "month"]
        );
        assert_eq!(request.parameters.len(), 3);
        Ok(())
    }

    #[test]
    fn order_by_must_be_selected() {
        let err = composer()
            .compose()
            .table("wtk_1224")
            .select(vec![SelectItem::column("windspeed_80m")])
            .order_by(OrderBy::new("year", SortDirection::Asc))
            .call()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = composer()
            .compose()
            .table("wtk_1224")
            .select(vec![SelectItem::column("windspeed_80m; DROP TABLE x")])
            .call()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn table_must_be_identifier() {
        for table in ["wtk 1224", "1table", "", "db.", "x;--"] {
            assert!(check_identifier(table).is_err(), "{table}");
        }
        assert!(check_identifier("windwatts.wtk_1224").is_ok());
    }

    #[test]
    fn partition_addressing() -> Result<(), WindDataError> {
        let request = composer()
            .compose()
            .table("wtk_1224_alt")
            .select(vec![
                SelectItem::column("windspeed_80m"),
                SelectItem::PartitionIndex,
            ])
            .predicates(vec![Predicate::Years(vec![2010])])
            .call()?;
        assert_eq!(request.addressing, Addressing::PartitionPath);
        assert!(request.statement.contains(r#"regexp_extract("$path""#));
        assert_eq!(request.parameters, vec![QueryParam::Text("2010".into())]);

        let err = composer()
            .compose()
            .table("wtk_1224_alt")
            .select(vec![SelectItem::PartitionIndex])
            .predicates(vec![Predicate::Locations(vec!["1".into()])])
            .call()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        Ok(())
    }

    #[test]
    fn predicate_values_are_validated() {
        let err = composer()
            .compose()
            .table("wtk_1224")
            .select(vec![SelectItem::column("windspeed_80m")])
            .predicates(vec![Predicate::Hours(vec![0])])
            .call()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        let err = composer()
            .compose()
            .table("wtk_1224")
            .select(vec![SelectItem::column("windspeed_80m")])
            .predicates(vec![Predicate::Locations(vec![])])
            .call()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
