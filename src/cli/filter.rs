//! Record filters for the command line: `field=value` and `field~regex`.

use regex::Regex;
use serde_json::Value;

/// A single condition on a record field. Dotted fields address nested
/// objects (and array indices).
#[derive(Debug, Clone)]
pub enum Condition {
    Eq { field: String, value: Value },
    Match { field: String, pattern: Regex },
}

impl Condition {
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Condition::Eq { field, value } => lookup(record, field) == Some(value),
            Condition::Match { field, pattern } => lookup(record, field)
                .and_then(Value::as_str)
                .map_or(false, |s| pattern.is_match(s)),
        }
    }
}

/// Parse `field=value`. The value is read as JSON when it parses, otherwise
/// as a plain string, so `age=30` matches a number and `name=rony` a string.
pub fn parse_eq(s: &str) -> Result<Condition, String> {
    let (field, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", s))?;
    let field = parse_field(field)?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(Condition::Eq { field, value })
}

/// Parse `field~regex`.
pub fn parse_match(s: &str) -> Result<Condition, String> {
    let (field, raw) = s
        .split_once('~')
        .ok_or_else(|| format!("expected FIELD~REGEX, got '{}'", s))?;
    let field = parse_field(field)?;
    let pattern = Regex::new(raw).map_err(|e| format!("invalid regex '{}': {}", raw, e))?;
    Ok(Condition::Match { field, pattern })
}

fn parse_field(field: &str) -> Result<String, String> {
    let field = field.trim();
    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(format!("invalid field '{}'", field));
    }
    Ok(field.to_string())
}

fn lookup<'a>(record: &'a Value, field: &str) -> Option<&'a Value> {
    field.split('.').try_fold(record, |value, key| match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

/// Conjunction of conditions. An empty filter matches every record.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}
