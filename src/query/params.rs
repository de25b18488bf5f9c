//! # Query Parameters
//!
//! Translates between builder state and PostgREST-style URL query
//! parameters:
//!
//! ```text
//! select=id,name&grade=eq.7&name=not.ilike.%25ann%25&or=(a.eq.1,b.eq.2)
//! &order=name.desc&offset=10&limit=5
//! ```
//!
//! Values decoded from parameters are text; they are typed against the
//! record field when evaluated.

use super::builder::{parse_columns, OrderBy, Query, SortDirection};
use super::expr;
use super::filter::{Filter, FilterSet};
use crate::error::{DataSourceError, DataSourceResult};

/// Parsed query parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    /// Fields to select (None = all)
    pub select: Option<Vec<String>>,

    /// Filters, all of which must match
    pub filters: FilterSet,

    pub order: Option<OrderBy>,

    /// Number of records to return
    pub limit: Option<usize>,

    /// Number of records to skip
    pub offset: Option<usize>,
}

impl QueryParams {
    /// Parse ordered `key=value` pairs.
    ///
    /// Filter keys may repeat; every occurrence adds a clause.
    pub fn parse<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> DataSourceResult<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut result = QueryParams::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref().trim(), value.as_ref());
            match key {
                "select" => result.select = parse_columns(value),
                "order" => result.order = Some(parse_order(value)?),
                "limit" => result.limit = Some(parse_count("limit", value)?),
                "offset" => result.offset = Some(parse_count("offset", value)?),
                "or" => result.filters.push(expr::parse_or(group_body(key, value)?)?),
                "and" => result.filters.push(expr::parse_and(group_body(key, value)?)?),
                "not.or" => result
                    .filters
                    .push(expr::parse_or(group_body(key, value)?)?.negate()),
                "not.and" => result
                    .filters
                    .push(expr::parse_and(group_body(key, value)?)?.negate()),
                field => result.filters.push(parse_filter(field, value)?),
            }
        }

        Ok(result)
    }

    /// Parse `key=value` arguments as given on a command line
    pub fn parse_args<S: AsRef<str>>(args: &[S]) -> DataSourceResult<Self> {
        let pairs = args
            .iter()
            .map(|arg| {
                let arg = arg.as_ref();
                arg.split_once('=').ok_or_else(|| {
                    DataSourceError::malformed(format!("expected key=value, got '{}'", arg))
                })
            })
            .collect::<DataSourceResult<Vec<_>>>()?;
        Self::parse(pairs)
    }

    /// Parameters describing the filters, order, window and columns of a query
    pub fn from_query(query: &Query) -> Self {
        let (skip, take) = query.window();
        Self {
            select: query.columns.clone(),
            filters: query.filters.clone(),
            order: query.order.clone(),
            limit: take,
            offset: (skip > 0).then_some(skip),
        }
    }

    /// Encode as ordered `key=value` pairs, values unescaped
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        if let Some(columns) = &self.select {
            pairs.push(("select".to_string(), columns.join(",")));
        }
        for filter in self.filters.iter() {
            pairs.push(encode_filter(filter));
        }
        if let Some(order) = &self.order {
            pairs.push((
                "order".to_string(),
                format!("{}.{}", order.field, order.direction.as_str()),
            ));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }

        pairs
    }
}

fn encode_filter(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Field(clause) => (
            clause.field().to_string(),
            format!("{}.{}", clause.operator(), expr::render_operand(clause, false)),
        ),
        Filter::Not(inner) => match inner.as_ref() {
            Filter::Field(clause) => (
                clause.field().to_string(),
                format!(
                    "not.{}.{}",
                    clause.operator(),
                    expr::render_operand(clause, false)
                ),
            ),
            Filter::Not(double) => encode_filter(double),
            Filter::Any(items) => group_pair("not.or", items),
            Filter::All(items) => group_pair("not.and", items),
        },
        Filter::Any(items) => group_pair("or", items),
        Filter::All(items) => group_pair("and", items),
    }
}

fn group_pair(key: &str, items: &[Filter]) -> (String, String) {
    (key.to_string(), format!("({})", expr::render_items(items)))
}

fn group_body<'a>(key: &str, value: &'a str) -> DataSourceResult<&'a str> {
    value
        .trim()
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| {
            DataSourceError::malformed(format!("{} expects (item,...), got '{}'", key, value))
        })
}

/// A value without an operator prefix is shorthand for equality
fn parse_filter(field: &str, value: &str) -> DataSourceResult<Filter> {
    if value.contains('.') {
        expr::parse_condition(field, value)
    } else {
        expr::parse_condition(field, &format!("eq.{}", value))
    }
}

fn parse_order(value: &str) -> DataSourceResult<OrderBy> {
    let parts: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let part = match parts.as_slice() {
        [one] => *one,
        [] => return Err(DataSourceError::malformed("order cannot be empty")),
        _ => {
            return Err(DataSourceError::malformed(format!(
                "only one order field is supported, got '{}'",
                value
            )))
        }
    };

    let (field, direction) = match part.rsplit_once('.') {
        Some((field, direction)) => {
            let direction = match direction.to_lowercase().as_str() {
                "asc" => SortDirection::Asc,
                "desc" => SortDirection::Desc,
                _ => {
                    return Err(DataSourceError::malformed(format!(
                        "Invalid order direction: {}",
                        direction
                    )))
                }
            };
            (field, direction)
        }
        None => (part, SortDirection::Asc),
    };

    Ok(OrderBy {
        field: field.to_string(),
        direction,
    })
}

fn parse_count(name: &str, value: &str) -> DataSourceResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| DataSourceError::malformed(format!("Invalid {}: {}", name, value)))
}
