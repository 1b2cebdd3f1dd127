//! The filter compiler: the only component allowed to emit SQL fragments.
//!
//! Admin-supplied raw SQL from pipeline configuration is emitted verbatim
//! (parenthesized). Structured filters, whether from configuration or from
//! an API request, are compiled to parameterized conditions; user values
//! never appear in the SQL text.

use serde_json::Value;

use crate::config::{ConfigFilter, Filter, FilterCondition};

/// Operators allowed in structured filter conditions.
const SUPPORTED_OPERATORS: &[&str] = &[
    "=",
    "!=",
    "<",
    ">",
    "<=",
    ">=",
    "LIKE",
    "ILIKE",
    "IN",
    "NOT IN",
    "IS NULL",
    "IS NOT NULL",
];

/// Errors produced while compiling a filter.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("unsupported operator: {0} (allowed: =, !=, <, >, <=, >=, LIKE, ILIKE, IN, NOT IN, IS NULL, IS NOT NULL)")]
    UnsupportedOperator(String),
    #[error("invalid logic operator: {0} (must be AND or OR)")]
    InvalidLogic(String),
    #[error("{0} operator requires an array value")]
    ArrayValueRequired(String),
    #[error("{0} operator requires a non-empty array")]
    EmptyArray(String),
    #[error("operator {0} requires a non-null value")]
    NullValue(String),
}

/// Build a parameterized WHERE clause from the config-level and
/// request-level filters. Placeholders are numbered `$start_index`,
/// `$start_index + 1`, … in emission order. The returned fragment starts
/// with ` WHERE ` when non-empty.
pub fn build_filter_clause(
    config_filter: Option<&ConfigFilter>,
    request_filter: Option<&Filter>,
    start_index: usize,
) -> Result<(String, Vec<Value>), FilterError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut args: Vec<Value> = Vec::new();
    let mut param_index = start_index;

    if let Some(cf) = config_filter {
        match cf {
            // Raw SQL from the config file: admin controlled, trusted
            ConfigFilter::RawSql(sql) => {
                if !sql.is_empty() {
                    conditions.push(format!("({sql})"));
                }
            }
            ConfigFilter::Structured(f) => {
                let (clause, clause_args) = build_filter_from_struct(f, &mut param_index)?;
                if !clause.is_empty() {
                    conditions.push(format!("({clause})"));
                    args.extend(clause_args);
                }
            }
        }
    }

    if let Some(f) = request_filter {
        let (clause, clause_args) = build_filter_from_struct(f, &mut param_index)?;
        if !clause.is_empty() {
            conditions.push(format!("({clause})"));
            args.extend(clause_args);
        }
    }

    if conditions.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    Ok((format!(" WHERE {}", conditions.join(" AND ")), args))
}

/// Compile a structured filter to a condition list joined by its logic
/// operator. Returns the SQL (without the WHERE keyword) and its arguments.
fn build_filter_from_struct(
    filter: &Filter,
    param_index: &mut usize,
) -> Result<(String, Vec<Value>), FilterError> {
    if filter.conditions.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let logic = if filter.logic.is_empty() {
        "AND".to_string()
    } else {
        let logic = filter.logic.to_uppercase();
        if logic != "AND" && logic != "OR" {
            return Err(FilterError::InvalidLogic(filter.logic.clone()));
        }
        logic
    };

    let mut conditions = Vec::with_capacity(filter.conditions.len());
    let mut args = Vec::new();

    for cond in &filter.conditions {
        let (clause, clause_args) = build_condition(cond, param_index)?;
        conditions.push(clause);
        args.extend(clause_args);
    }

    Ok((conditions.join(&format!(" {logic} ")), args))
}

/// Compile a single condition with parameterized values.
fn build_condition(
    cond: &FilterCondition,
    param_index: &mut usize,
) -> Result<(String, Vec<Value>), FilterError> {
    validate_operator(&cond.operator)?;
    validate_value(&cond.operator, &cond.value)?;

    let column = super::quote_identifier(&cond.column);
    let op = cond.operator.to_uppercase();

    // NULL operators take no value
    if op == "IS NULL" || op == "IS NOT NULL" {
        return Ok((format!("{column} {op}"), Vec::new()));
    }

    // IN operators expand one placeholder per element
    if op == "IN" || op == "NOT IN" {
        let values = match &cond.value {
            Value::Array(values) => values,
            _ => return Err(FilterError::ArrayValueRequired(op)),
        };
        let mut placeholders = Vec::with_capacity(values.len());
        let mut args = Vec::with_capacity(values.len());
        for v in values {
            placeholders.push(format!("${param_index}"));
            args.push(v.clone());
            *param_index += 1;
        }
        let clause = format!("{column} {op} ({})", placeholders.join(", "));
        return Ok((clause, args));
    }

    // Standard operators bind exactly one value
    let clause = format!("{column} {op} ${param_index}");
    *param_index += 1;
    Ok((clause, vec![cond.value.clone()]))
}

/// Check that an operator is in the allowed list (case-insensitive).
pub fn validate_operator(operator: &str) -> Result<(), FilterError> {
    let op = operator.to_uppercase();
    if !SUPPORTED_OPERATORS.contains(&op.as_str()) {
        return Err(FilterError::UnsupportedOperator(operator.to_string()));
    }
    Ok(())
}

/// Check that a value is appropriate for the given operator.
pub fn validate_value(operator: &str, value: &Value) -> Result<(), FilterError> {
    let op = operator.to_uppercase();

    if op == "IS NULL" || op == "IS NOT NULL" {
        return Ok(());
    }

    if op == "IN" || op == "NOT IN" {
        match value {
            Value::Array(values) if values.is_empty() => {
                return Err(FilterError::EmptyArray(op))
            }
            Value::Array(_) => return Ok(()),
            _ => return Err(FilterError::ArrayValueRequired(op)),
        }
    }

    if value.is_null() {
        return Err(FilterError::NullValue(operator.to_string()));
    }

    Ok(())
}

/// Validate every condition of a request filter without compiling it.
/// Used at the HTTP layer so malformed filters fail as client errors
/// before any retrieval work starts.
pub fn validate_filter(filter: &Filter) -> Result<(), FilterError> {
    if !filter.logic.is_empty() {
        let logic = filter.logic.to_uppercase();
        if logic != "AND" && logic != "OR" {
            return Err(FilterError::InvalidLogic(filter.logic.clone()));
        }
    }
    for cond in &filter.conditions {
        validate_operator(&cond.operator)?;
        validate_value(&cond.operator, &cond.value)?;
    }
    Ok(())
}
