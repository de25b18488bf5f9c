//! # Logic Expressions
//!
//! Parses the raw disjunction escape (`grade.eq.7,name.ilike.%ann%`) into
//! filter trees, and renders filter trees back to the same text form.
//!
//! Grammar, one item per comma at the top level:
//!
//! ```text
//! item      := group | condition
//! group     := ["not."] ("or" | "and") "(" item ("," item)* ")"
//! condition := field "." ["not."] operator "." operand
//! ```
//!
//! Operands may be double-quoted to carry `,` `(` `)` characters.

use serde_json::Value;

use super::filter::{FieldFilter, Filter, FilterOperator};
use crate::error::{DataSourceError, DataSourceResult};

/// Parses the body of an `or(...)` escape into an OR-group.
pub fn parse_or(expr: &str) -> DataSourceResult<Filter> {
    Ok(Filter::Any(parse_items(expr)?))
}

/// Parses the body of an `and(...)` group into an AND-group.
pub fn parse_and(expr: &str) -> DataSourceResult<Filter> {
    Ok(Filter::All(parse_items(expr)?))
}

fn parse_items(expr: &str) -> DataSourceResult<Vec<Filter>> {
    if expr.trim().is_empty() {
        return Err(DataSourceError::malformed("empty logic expression"));
    }
    split_top_level(expr)?
        .into_iter()
        .map(|item| parse_item(item.trim()))
        .collect()
}

fn parse_item(item: &str) -> DataSourceResult<Filter> {
    if item.is_empty() {
        return Err(DataSourceError::malformed("empty item in logic expression"));
    }

    let (negated, body) = match item.strip_prefix("not.") {
        Some(rest) if is_group(rest) => (true, rest),
        _ => (false, item),
    };

    if let Some(group) = parse_group(body)? {
        return Ok(if negated { group.negate() } else { group });
    }

    let (field, condition) = item.split_once('.').ok_or_else(|| {
        DataSourceError::malformed(format!("expected field.operator.value, got '{}'", item))
    })?;
    parse_condition(field, condition)
}

fn is_group(s: &str) -> bool {
    (s.starts_with("or(") || s.starts_with("and(")) && s.ends_with(')')
}

fn parse_group(s: &str) -> DataSourceResult<Option<Filter>> {
    if !is_group(s) {
        return Ok(None);
    }
    let open = s.find('(').unwrap_or(0);
    let inner = &s[open + 1..s.len() - 1];
    let group = if s.starts_with("or(") {
        parse_or(inner)?
    } else {
        parse_and(inner)?
    };
    Ok(Some(group))
}

/// Parses `op.value` or `not.op.value` for a field.
///
/// This is the shape of one condition inside a logic expression and of a
/// filter query parameter value.
pub fn parse_condition(field: &str, condition: &str) -> DataSourceResult<Filter> {
    let field = field.trim();
    if field.is_empty() {
        return Err(DataSourceError::malformed(format!(
            "missing field in condition '{}'",
            condition
        )));
    }

    let (negated, condition) = match condition.strip_prefix("not.") {
        Some(rest) => (true, rest),
        None => (false, condition),
    };

    let (op, operand) = condition.split_once('.').ok_or_else(|| {
        DataSourceError::malformed(format!(
            "expected operator.value for {}, got '{}'",
            field, condition
        ))
    })?;
    let operator: FilterOperator = op.parse()?;
    let clause = Filter::Field(FieldFilter::from_text(field, operator, operand)?);

    Ok(if negated { clause.negate() } else { clause })
}

/// Renders a filter as one logic expression item.
pub fn render(filter: &Filter) -> String {
    match filter {
        Filter::Field(clause) => format!(
            "{}.{}.{}",
            clause.field(),
            clause.operator(),
            render_operand(clause, true)
        ),
        Filter::Not(inner) => match inner.as_ref() {
            Filter::Field(clause) => format!(
                "{}.not.{}.{}",
                clause.field(),
                clause.operator(),
                render_operand(clause, true)
            ),
            Filter::Not(double) => render(double),
            group => format!("not.{}", render(group)),
        },
        Filter::Any(items) => format!("or({})", render_items(items)),
        Filter::All(items) => format!("and({})", render_items(items)),
    }
}

/// Renders filters as a comma-separated item list.
pub fn render_items(items: &[Filter]) -> String {
    items.iter().map(render).collect::<Vec<_>>().join(",")
}

/// Renders the operand of a clause as text.
///
/// `nested` quotes scalars that would otherwise break a logic expression.
pub fn render_operand(clause: &FieldFilter, nested: bool) -> String {
    match clause.value() {
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|v| quote_if_needed(&scalar_text(v)))
                .collect();
            format!("({})", parts.join(","))
        }
        other if nested => quote_if_needed(&scalar_text(other)),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Double-quotes text containing reserved characters.
pub fn quote_if_needed(text: &str) -> String {
    if text.contains([',', '(', ')', '"', '\\']) || text != text.trim() {
        let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        text.to_string()
    }
}

/// Removes surrounding double quotes and their escapes.
pub fn unquote(text: &str) -> String {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        let inner = &text[1..text.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else {
        text.to_string()
    }
}

/// Splits on commas that are outside parentheses and double quotes.
pub fn split_top_level(s: &str) -> DataSourceResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut in_quote = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        if in_quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quote = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    DataSourceError::malformed(format!("unbalanced ')' in '{}'", s))
                })?;
            }
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if in_quote {
        return Err(DataSourceError::malformed(format!("unterminated quote in '{}'", s)));
    }
    if depth != 0 {
        return Err(DataSourceError::malformed(format!("unbalanced '(' in '{}'", s)));
    }

    parts.push(&s[start..]);
    Ok(parts)
}
