//! Query predicates over sessions.
//!
//! A filter is a single clause `path operator literal`, for example
//! `request.model=gpt-4`, `metadata.tags~qa`, `metadata.published!=null`,
//! `metadata.timestamp>2025-07-01T00:00:00Z` or `metadata.latency_ms<1000`.
//! The path walks the session's attribute tree (see [`Session::project`]);
//! there is no boolean composition, one clause per filter.
//!
//! Operators:
//! - `=` / `!=`: `null` tests presence, anything else compares text
//! - `~`: list membership, or substring for scalars
//! - `<` / `>`: RFC 3339 timestamps first, then numbers; otherwise no match

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::DateTime;
use regex::Regex;
use serde_json::Value;

use crate::error_handling::types::FilterError;
use crate::session_management::Session;

fn clause_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([\w.]+)\s*(!=|=|~|<|>)\s*(\S+)\s*$").expect("clause pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Contains,
    Less,
    Greater,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Operator::Eq),
            "!=" => Some(Operator::NotEq),
            "~" => Some(Operator::Contains),
            "<" => Some(Operator::Less),
            ">" => Some(Operator::Greater),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Contains => "~",
            Operator::Less => "<",
            Operator::Greater => ">",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub path: Vec<String>,
    pub op: Operator,
    pub literal: String,
}

/// Compiled filter. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    clause: Option<Clause>,
}

impl SessionFilter {
    /// Compiles `expr`. Blank input yields the match-all filter.
    pub fn parse(expr: &str) -> Result<Self, FilterError> {
        if expr.trim().is_empty() {
            return Ok(Self::default());
        }
        let caps = clause_regex()
            .captures(expr)
            .ok_or_else(|| FilterError::Syntax(expr.to_string()))?;
        let path: Vec<String> = caps[1].split('.').map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return Err(FilterError::Syntax(expr.to_string()));
        }
        let op = Operator::parse(&caps[2]).ok_or_else(|| FilterError::Syntax(expr.to_string()))?;
        Ok(Self {
            clause: Some(Clause {
                path,
                op,
                literal: caps[3].to_string(),
            }),
        })
    }

    pub fn clause(&self) -> Option<&Clause> {
        self.clause.as_ref()
    }

    pub fn is_match_all(&self) -> bool {
        self.clause.is_none()
    }

    /// Evaluates the filter against an attribute tree.
    pub fn matches(&self, tree: &Value) -> bool {
        match &self.clause {
            None => true,
            Some(clause) => compare(resolve(tree, &clause.path), clause.op, &clause.literal),
        }
    }

    /// Evaluates the filter against a session's projection. A session that
    /// cannot be projected never matches a non-empty filter.
    pub fn matches_session(&self, session: &Session) -> bool {
        if self.clause.is_none() {
            return true;
        }
        session.project().map(|tree| self.matches(&tree)).unwrap_or(false)
    }
}

impl FromStr for SessionFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SessionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.clause {
            None => Ok(()),
            Some(c) => write!(f, "{}{}{}", c.path.join("."), c.op, c.literal),
        }
    }
}

/// Walks nested objects. Missing keys, non-object hops and JSON null all
/// resolve to `None`.
fn resolve<'a>(tree: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = tree;
    for segment in path {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare(value: Option<&Value>, op: Operator, literal: &str) -> bool {
    match op {
        Operator::Eq if literal == "null" => value.is_none(),
        Operator::NotEq if literal == "null" => value.is_some(),
        Operator::Eq => value.is_some_and(|v| text(v) == literal),
        Operator::NotEq => value.map_or(true, |v| text(v) != literal),
        Operator::Contains => match value {
            None => false,
            Some(Value::Array(items)) => items.iter().any(|item| text(item) == literal),
            Some(v) => text(v).contains(literal),
        },
        Operator::Less | Operator::Greater => {
            let Some(value) = value else {
                return false;
            };
            let ordering = compare_timestamps(value, literal).or_else(|| {
                let lhs = as_number(value)?;
                let rhs: f64 = literal.parse().ok()?;
                lhs.partial_cmp(&rhs)
            });
            match ordering {
                Some(o) if op == Operator::Less => o.is_lt(),
                Some(o) => o.is_gt(),
                None => false,
            }
        }
    }
}

fn compare_timestamps(value: &Value, literal: &str) -> Option<std::cmp::Ordering> {
    let lhs = DateTime::parse_from_rfc3339(value.as_str()?).ok()?;
    let rhs = DateTime::parse_from_rfc3339(literal).ok()?;
    Some(lhs.cmp(&rhs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matches(expr: &str, tree: Value) -> bool {
        SessionFilter::parse(expr).unwrap().matches(&tree)
    }

    #[test]
    fn test_equality() {
        assert!(matches("request.model=gpt-4", json!({"request": {"model": "gpt-4"}})));
        assert!(!matches("request.model=gpt-4", json!({"request": {"model": "gpt-3"}})));
        assert!(matches("request.model!=gpt-4", json!({"request": {"model": "gpt-3"}})));
        assert!(matches("request.model!=gpt-4", json!({"request": {}})));
        assert!(matches("stream=true", json!({"stream": true})));
        assert!(matches("metadata.latency_ms=500", json!({"metadata": {"latency_ms": 500}})));
    }

    #[test]
    fn test_null_literal_checks_presence() {
        assert!(matches("metadata.published!=null", json!({"metadata": {"published": "ref"}})));
        assert!(!matches("metadata.published!=null", json!({"metadata": {}})));
        assert!(!matches("metadata.published!=null", json!({"metadata": {"published": null}})));
        assert!(matches("metadata.published=null", json!({"metadata": {"published": null}})));
        assert!(matches("metadata.published=null", json!({})));
    }

    #[test]
    fn test_contains() {
        assert!(matches("metadata.tags~qa", json!({"metadata": {"tags": ["qa", "x"]}})));
        assert!(!matches("metadata.tags~qa", json!({"metadata": {"tags": ["x"]}})));
        assert!(!matches("metadata.tags~q", json!({"metadata": {"tags": ["qa"]}})));
        assert!(matches("request.prompt~ell", json!({"request": {"prompt": "hello"}})));
        assert!(!matches("request.prompt~ell", json!({"request": {}})));
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(matches("metadata.latency_ms<1000", json!({"metadata": {"latency_ms": 500}})));
        assert!(!matches("metadata.latency_ms<1000", json!({"metadata": {"latency_ms": 1500}})));
        assert!(matches("metadata.latency_ms>1000", json!({"metadata": {"latency_ms": 1500.5}})));
        assert!(matches("response.status<300", json!({"response": {"status": "200"}})));
        assert!(!matches("metadata.latency_ms<abc", json!({"metadata": {"latency_ms": 500}})));
        assert!(!matches("metadata.latency_ms<1000", json!({"metadata": {}})));
        assert!(!matches("request.model<1000", json!({"request": {"model": "gpt"}})));
    }

    #[test]
    fn test_timestamp_ordering() {
        let tree = json!({"metadata": {"timestamp": "2025-07-06T12:42:00Z"}});
        assert!(matches("metadata.timestamp>2025-07-01T00:00:00Z", tree.clone()));
        assert!(!matches("metadata.timestamp<2025-07-01T00:00:00Z", tree.clone()));
        assert!(matches("metadata.timestamp<2025-07-06T14:42:00+01:00", tree));
    }

    #[test]
    fn test_path_through_non_object_is_absent() {
        assert!(!matches("request.model.name=gpt", json!({"request": {"model": "gpt"}})));
        assert!(matches("request.model.name=null", json!({"request": {"model": "gpt"}})));
    }

    #[test]
    fn test_blank_expression_matches_everything() {
        let f = SessionFilter::parse("   ").unwrap();
        assert!(f.is_match_all());
        assert!(f.matches(&json!({})));
        assert!(f.matches(&Value::Null));
    }

    #[test]
    fn test_whitespace_around_operator() {
        assert!(matches("  request.model = gpt-4 ", json!({"request": {"model": "gpt-4"}})));
    }

    #[test]
    fn test_syntax_errors() {
        for expr in ["request.model", "=gpt", "metadata.tags ~", "a b=c", "request..model=x", "x=y z", "model<"] {
            assert_eq!(
                SessionFilter::parse(expr),
                Err(FilterError::Syntax(expr.to_string())),
                "{expr}"
            );
        }
    }

    #[test]
    fn test_parse_and_display() {
        let f: SessionFilter = "metadata.tags~qa".parse().unwrap();
        let clause = f.clause().unwrap();
        assert_eq!(clause.path, vec!["metadata", "tags"]);
        assert_eq!(clause.op, Operator::Contains);
        assert_eq!(clause.literal, "qa");
        assert_eq!(f.to_string(), "metadata.tags~qa");
    }

    #[test]
    fn test_matches_session() {
        let mut s = Session::default();
        s.request.model = Some("gpt-4".into());
        s.metadata.tags = vec!["qa".into()];
        assert!(SessionFilter::parse("request.model=gpt-4").unwrap().matches_session(&s));
        assert!(SessionFilter::parse("metadata.tags~qa").unwrap().matches_session(&s));
        assert!(SessionFilter::parse("origin=manual").unwrap().matches_session(&s));
        assert!(!SessionFilter::parse("metadata.published!=null").unwrap().matches_session(&s));
    }
}
