//! # Filter Expression AST
//!
//! Filter clauses accumulated by a query builder, and the predicate
//! evaluation that decides whether a record is included.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde_json::Value;

use super::compare::{partial_order, values_equal};
use super::expr::{split_top_level, unquote};
use super::Record;
use crate::error::{DataSourceError, DataSourceResult};

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Equals
    Eq,

    /// Not equals
    Neq,

    /// Greater than
    Gt,

    /// Greater than or equal
    Gte,

    /// Less than
    Lt,

    /// Less than or equal
    Lte,

    /// Pattern match (LIKE), case-sensitive
    Like,

    /// Pattern match (ILIKE), case-insensitive
    ILike,

    /// Value in list
    In,

    /// Exact match against null / true / false
    Is,
}

impl FilterOperator {
    /// Get the operator string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::ILike => "ilike",
            FilterOperator::In => "in",
            FilterOperator::Is => "is",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = DataSourceError;

    fn from_str(s: &str) -> DataSourceResult<Self> {
        Ok(match s {
            "eq" => FilterOperator::Eq,
            "neq" => FilterOperator::Neq,
            "gt" => FilterOperator::Gt,
            "gte" => FilterOperator::Gte,
            "lt" => FilterOperator::Lt,
            "lte" => FilterOperator::Lte,
            "like" => FilterOperator::Like,
            "ilike" => FilterOperator::ILike,
            "in" => FilterOperator::In,
            "is" => FilterOperator::Is,
            other => return Err(DataSourceError::unsupported(other)),
        })
    }
}

/// Compiled `%` pattern for LIKE / ILIKE
#[derive(Debug, Clone)]
struct LikePattern {
    regex: Regex,
    fold_case: bool,
}

impl LikePattern {
    fn compile(pattern: &str, fold_case: bool) -> DataSourceResult<Self> {
        let source = if fold_case {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        };
        let body: Vec<String> = source.split('%').map(regex::escape).collect();
        let regex = Regex::new(&format!("(?s)^{}$", body.join(".*")))
            .map_err(|e| DataSourceError::malformed(format!("pattern '{}': {}", pattern, e)))?;
        Ok(Self { regex, fold_case })
    }

    fn is_match(&self, subject: &str) -> bool {
        if self.fold_case {
            self.regex.is_match(&subject.to_lowercase())
        } else {
            self.regex.is_match(subject)
        }
    }
}

/// A single `field operator operand` clause
#[derive(Debug, Clone)]
pub struct FieldFilter {
    field: String,
    operator: FilterOperator,
    value: Value,
    /// Operand came from text and is typed by the record field at evaluation
    literal: bool,
    pattern: Option<LikePattern>,
}

impl PartialEq for FieldFilter {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
            && self.operator == other.operator
            && self.value == other.value
            && self.literal == other.literal
    }
}

impl FieldFilter {
    /// Create a filter with a typed operand, compared structurally
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: Value,
    ) -> DataSourceResult<Self> {
        let field = field.into();
        match operator {
            FilterOperator::In if !value.is_array() => {
                return Err(DataSourceError::malformed(format!(
                    "'in' on {} needs a list operand",
                    field
                )))
            }
            FilterOperator::Is if !(value.is_null() || value.is_boolean()) => {
                return Err(DataSourceError::malformed(format!(
                    "'is' on {} accepts only null, true or false",
                    field
                )))
            }
            _ => {}
        }
        Self::build(field, operator, value, false)
    }

    /// Create a filter from a textual operand such as `7`, `(a,b)` or `null`
    pub fn from_text(
        field: impl Into<String>,
        operator: FilterOperator,
        text: &str,
    ) -> DataSourceResult<Self> {
        let field = field.into();
        let value = match operator {
            FilterOperator::Is => match text.to_ascii_lowercase().as_str() {
                "null" => Value::Null,
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => {
                    return Err(DataSourceError::malformed(format!(
                        "'is' on {} accepts only null, true or false, got '{}'",
                        field, text
                    )))
                }
            },
            FilterOperator::In => {
                let inner = text
                    .strip_prefix('(')
                    .and_then(|t| t.strip_suffix(')'))
                    .ok_or_else(|| {
                        DataSourceError::malformed(format!(
                            "'in' on {} needs a (a,b,...) list, got '{}'",
                            field, text
                        ))
                    })?;
                let items = if inner.trim().is_empty() {
                    Vec::new()
                } else {
                    split_top_level(inner)?
                        .into_iter()
                        .map(|item| Value::String(unquote(item.trim())))
                        .collect()
                };
                Value::Array(items)
            }
            _ => Value::String(unquote(text)),
        };
        Self::build(field, operator, value, true)
    }

    fn build(
        field: String,
        operator: FilterOperator,
        value: Value,
        literal: bool,
    ) -> DataSourceResult<Self> {
        if field.is_empty() {
            return Err(DataSourceError::malformed("filter field cannot be empty"));
        }
        let pattern = match operator {
            FilterOperator::Like | FilterOperator::ILike => {
                let source = value.as_str().ok_or_else(|| {
                    DataSourceError::malformed(format!(
                        "'{}' on {} needs a string pattern",
                        operator, field
                    ))
                })?;
                Some(LikePattern::compile(source, operator == FilterOperator::ILike)?)
            }
            _ => None,
        };
        Ok(Self {
            field,
            operator,
            value,
            literal,
            pattern,
        })
    }

    /// Field the clause reads
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Comparison operator
    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    /// Operand as given
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether the operand is an untyped text literal
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// Check if a record matches this clause
    pub fn matches(&self, record: &Record) -> bool {
        let field_value = record.get(&self.field).unwrap_or(&Value::Null);

        match self.operator {
            FilterOperator::Eq => values_equal(&self.operand_for(field_value), field_value),
            FilterOperator::Neq => !values_equal(&self.operand_for(field_value), field_value),
            FilterOperator::Gt => self.range_match(field_value, |o| o.is_gt()),
            FilterOperator::Gte => self.range_match(field_value, |o| o.is_ge()),
            FilterOperator::Lt => self.range_match(field_value, |o| o.is_lt()),
            FilterOperator::Lte => self.range_match(field_value, |o| o.is_le()),
            FilterOperator::Like | FilterOperator::ILike => {
                match (field_value.as_str(), &self.pattern) {
                    (Some(subject), Some(pattern)) => pattern.is_match(subject),
                    _ => false,
                }
            }
            FilterOperator::In => match &self.value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| coerce(item, field_value, self.literal))
                    .any(|item| values_equal(&item, field_value)),
                _ => false,
            },
            FilterOperator::Is => *field_value == self.value,
        }
    }

    fn operand_for(&self, field_value: &Value) -> Value {
        coerce(&self.value, field_value, self.literal)
    }

    fn range_match(&self, field_value: &Value, accept: fn(std::cmp::Ordering) -> bool) -> bool {
        partial_order(field_value, &self.operand_for(field_value)).is_some_and(accept)
    }
}

/// Types a text literal after the record field it is compared with
fn coerce(operand: &Value, target: &Value, literal: bool) -> Value {
    if !literal {
        return operand.clone();
    }
    let Some(text) = operand.as_str() else {
        return operand.clone();
    };
    match target {
        Value::Number(_) => {
            if let Ok(n) = text.parse::<i64>() {
                return Value::Number(n.into());
            }
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| operand.clone())
        }
        Value::Bool(_) => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => operand.clone(),
        },
        Value::Null if text == "null" => Value::Null,
        _ => operand.clone(),
    }
}

/// A filter node: a clause, its negation, or a logic group
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Plain clause
    Field(FieldFilter),

    /// Inverts the wrapped filter
    Not(Box<Filter>),

    /// OR-group
    Any(Vec<Filter>),

    /// AND-group
    All(Vec<Filter>),
}

impl Filter {
    /// Check if a record matches this filter
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Field(clause) => clause.matches(record),
            Filter::Not(inner) => !inner.matches(record),
            Filter::Any(branches) => branches.iter().any(|f| f.matches(record)),
            Filter::All(branches) => branches.iter().all(|f| f.matches(record)),
        }
    }

    /// Wrap in a negation
    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }
}

impl From<FieldFilter> for Filter {
    fn from(clause: FieldFilter) -> Self {
        Filter::Field(clause)
    }
}

/// A set of filters combined with AND logic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, filter: impl Into<Filter>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn push(&mut self, filter: impl Into<Filter>) {
        self.filters.push(filter.into());
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    /// Check if a record matches all filters
    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }
}
