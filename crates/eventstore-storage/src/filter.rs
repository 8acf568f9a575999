//! Filter and sort model for event queries
//!
//! Filters are conjunction-friendly predicates over named record fields.
//! They can be built directly or parsed from a Mongo-style JSON document:
//!
//! ```text
//! {"level": "ERROR"}
//! {"time": {"$gte": "2019-08-23T09:30:00"}, "tag": {"$in": ["WEB", "API"]}}
//! {"$or": [{"level": "ERROR"}, {"level": "WARNING"}]}
//! ```

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Map, Value};

use crate::record::{EventRecord, FieldRef, TIME_FIELD};
use crate::time::{format_time, parse_iso};
use crate::{Result, StorageError};

/// A predicate over event records
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value
    Eq(String, Value),
    /// Field is absent or differs from value
    Ne(String, Value),
    /// Field greater than value
    Gt(String, Value),
    /// Field greater than or equal to value
    Gte(String, Value),
    /// Field less than value
    Lt(String, Value),
    /// Field less than or equal to value
    Lte(String, Value),
    /// Field equals one of the values
    In(String, Vec<Value>),
    /// Field presence
    Exists(String, bool),
    /// Logical AND (empty matches everything)
    And(Vec<Filter>),
    /// Logical OR (empty matches nothing)
    Or(Vec<Filter>),
    /// Logical NOT
    Not(Box<Filter>),
}

impl Filter {
    /// Matches every record
    pub fn all() -> Self {
        Filter::And(Vec::new())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    /// `time >= from`
    pub fn time_from(from: DateTime<Utc>) -> Self {
        Filter::Gte(TIME_FIELD.to_string(), Value::String(format_time(&from)))
    }

    /// `time <= to`
    pub fn time_to(to: DateTime<Utc>) -> Self {
        Filter::Lte(TIME_FIELD.to_string(), Value::String(format_time(&to)))
    }

    /// Evaluate against a record
    pub fn matches(&self, record: &EventRecord) -> bool {
        match self {
            Filter::Eq(field, value) => equals(record, field, value),
            Filter::Ne(field, value) => !equals(record, field, value),
            Filter::Gt(field, value) => ordered(record, field, value, |o| o == Ordering::Greater),
            Filter::Gte(field, value) => ordered(record, field, value, |o| o != Ordering::Less),
            Filter::Lt(field, value) => ordered(record, field, value, |o| o == Ordering::Less),
            Filter::Lte(field, value) => ordered(record, field, value, |o| o != Ordering::Greater),
            Filter::In(field, values) => record.get(field).map_or(false, |actual| {
                values
                    .iter()
                    .any(|v| compare(actual, v) == Some(Ordering::Equal))
            }),
            Filter::Exists(field, expected) => record.get(field).is_some() == *expected,
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Filter::Not(inner) => !inner.matches(record),
        }
    }

    /// Inclusive time bounds implied by top-level conjuncts
    ///
    /// Backends use these to narrow an index scan; the full filter is still
    /// evaluated on every candidate, so bounds that cannot be derived are
    /// simply left open.
    pub fn time_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let mut lower: Option<DateTime<Utc>> = None;
        let mut upper: Option<DateTime<Utc>> = None;
        self.collect_time_bounds(&mut lower, &mut upper);
        (lower, upper)
    }

    fn collect_time_bounds(
        &self,
        lower: &mut Option<DateTime<Utc>>,
        upper: &mut Option<DateTime<Utc>>,
    ) {
        match self {
            Filter::And(filters) => {
                for f in filters {
                    f.collect_time_bounds(lower, upper);
                }
            }
            Filter::Gt(field, value) | Filter::Gte(field, value) if field == TIME_FIELD => {
                if let Some(t) = as_instant(value) {
                    *lower = Some(lower.map_or(t, |l| l.max(t)));
                }
            }
            Filter::Lt(field, value) | Filter::Lte(field, value) if field == TIME_FIELD => {
                if let Some(t) = as_instant(value) {
                    *upper = Some(upper.map_or(t, |u| u.min(t)));
                }
            }
            Filter::Eq(field, value) if field == TIME_FIELD => {
                if let Some(t) = as_instant(value) {
                    *lower = Some(lower.map_or(t, |l| l.max(t)));
                    *upper = Some(upper.map_or(t, |u| u.min(t)));
                }
            }
            _ => {}
        }
    }

    /// Rewrite string operands on `time` as RFC 3339 UTC instants
    ///
    /// Naive operands are read in `zone` (UTC when `None`), the same way the
    /// query's time bounds are. Unparseable strings are `Validation` errors.
    pub fn resolve_times(self, zone: Option<FixedOffset>) -> Result<Self> {
        let resolve = |field: String, value: Value| -> Result<(String, Value)> {
            if field != TIME_FIELD {
                return Ok((field, value));
            }
            let value = match value {
                Value::String(text) => Value::String(format_time(&parse_iso(&text, zone)?)),
                other => other,
            };
            Ok((field, value))
        };

        Ok(match self {
            Filter::Eq(f, v) => resolve(f, v).map(|(f, v)| Filter::Eq(f, v))?,
            Filter::Ne(f, v) => resolve(f, v).map(|(f, v)| Filter::Ne(f, v))?,
            Filter::Gt(f, v) => resolve(f, v).map(|(f, v)| Filter::Gt(f, v))?,
            Filter::Gte(f, v) => resolve(f, v).map(|(f, v)| Filter::Gte(f, v))?,
            Filter::Lt(f, v) => resolve(f, v).map(|(f, v)| Filter::Lt(f, v))?,
            Filter::Lte(f, v) => resolve(f, v).map(|(f, v)| Filter::Lte(f, v))?,
            Filter::In(f, values) => {
                let mut resolved = Vec::with_capacity(values.len());
                for v in values {
                    resolved.push(resolve(f.clone(), v)?.1);
                }
                Filter::In(f, resolved)
            }
            Filter::Exists(f, expected) => Filter::Exists(f, expected),
            Filter::And(filters) => Filter::And(resolve_all(filters, zone)?),
            Filter::Or(filters) => Filter::Or(resolve_all(filters, zone)?),
            Filter::Not(inner) => Filter::Not(Box::new(inner.resolve_times(zone)?)),
        })
    }

    /// Parse a Mongo-style filter document
    pub fn from_document(doc: &Value) -> Result<Self> {
        let Value::Object(map) = doc else {
            return Err(invalid(format!("filter must be an object, got {}", doc)));
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            match key.as_str() {
                "$and" => clauses.push(Filter::And(parse_list(key, value)?)),
                "$or" => clauses.push(Filter::Or(parse_list(key, value)?)),
                "$nor" => clauses.push(Filter::Not(Box::new(Filter::Or(parse_list(key, value)?)))),
                op if op.starts_with('$') => {
                    return Err(invalid(format!("unknown top-level operator '{}'", op)))
                }
                field => clauses.push(parse_field(field, value)?),
            }
        }

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        })
    }
}

/// Sort order for query results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub ascending: bool,
}

impl Sort {
    pub fn new(field: impl Into<String>, ascending: bool) -> Self {
        Self {
            field: field.into(),
            ascending,
        }
    }

    /// True when this sort follows the time index
    pub fn is_time(&self) -> bool {
        self.field == TIME_FIELD
    }

    /// Order two records; missing fields sort before present ones
    pub fn compare(&self, a: &EventRecord, b: &EventRecord) -> Ordering {
        let ord = match (a.get(&self.field), b.get(&self.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => sort_key(x, y),
        };
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }

    /// Stable in-place sort
    pub fn apply(&self, records: &mut [EventRecord]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

fn resolve_all(filters: Vec<Filter>, zone: Option<FixedOffset>) -> Result<Vec<Filter>> {
    filters.into_iter().map(|f| f.resolve_times(zone)).collect()
}

// ========== Comparison ==========

fn equals(record: &EventRecord, field: &str, value: &Value) -> bool {
    record
        .get(field)
        .map_or(false, |actual| compare(actual, value) == Some(Ordering::Equal))
}

fn ordered(record: &EventRecord, field: &str, value: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    record
        .get(field)
        .and_then(|actual| compare(actual, value))
        .map_or(false, accept)
}

/// Compare a record field with a filter operand; `None` when incomparable
fn compare(actual: FieldRef<'_>, operand: &Value) -> Option<Ordering> {
    match actual {
        FieldRef::Time(t) => as_instant(operand).map(|o| t.with_timezone(&Utc).cmp(&o)),
        FieldRef::Value(v) => compare_values(v, operand),
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total order used for sorting: null < bool < number < string < array < object
fn sort_key(a: FieldRef<'_>, b: FieldRef<'_>) -> Ordering {
    match (a, b) {
        (FieldRef::Time(x), FieldRef::Time(y)) => x.cmp(&y),
        (FieldRef::Value(x), FieldRef::Value(y)) => compare_values(x, y)
            .unwrap_or_else(|| type_rank(x).cmp(&type_rank(y))),
        (FieldRef::Time(_), FieldRef::Value(_)) => Ordering::Greater,
        (FieldRef::Value(_), FieldRef::Time(_)) => Ordering::Less,
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn as_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_iso(text, None).ok(),
        _ => None,
    }
}

// ========== Document parsing ==========

fn parse_list(op: &str, value: &Value) -> Result<Vec<Filter>> {
    let Value::Array(items) = value else {
        return Err(invalid(format!("'{}' expects an array", op)));
    };
    items.iter().map(Filter::from_document).collect()
}

fn parse_field(field: &str, value: &Value) -> Result<Filter> {
    match value {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            let mut clauses = Vec::with_capacity(ops.len());
            for (op, operand) in ops {
                clauses.push(parse_operator(field, op, operand)?);
            }
            Ok(match clauses.len() {
                1 => clauses.remove(0),
                _ => Filter::And(clauses),
            })
        }
        literal => Ok(Filter::Eq(field.to_string(), literal.clone())),
    }
}

fn parse_operator(field: &str, op: &str, operand: &Value) -> Result<Filter> {
    let name = field.to_string();
    let filter = match op {
        "$eq" => Filter::Eq(name, operand.clone()),
        "$ne" => Filter::Ne(name, operand.clone()),
        "$gt" => Filter::Gt(name, operand.clone()),
        "$gte" => Filter::Gte(name, operand.clone()),
        "$lt" => Filter::Lt(name, operand.clone()),
        "$lte" => Filter::Lte(name, operand.clone()),
        "$in" | "$nin" => {
            let Value::Array(values) = operand else {
                return Err(invalid(format!("'{}' on '{}' expects an array", op, field)));
            };
            let filter = Filter::In(name, values.clone());
            if op == "$nin" {
                Filter::Not(Box::new(filter))
            } else {
                filter
            }
        }
        "$exists" => match operand {
            Value::Bool(expected) => Filter::Exists(name, *expected),
            _ => return Err(invalid(format!("'$exists' on '{}' expects a boolean", field))),
        },
        "$not" => {
            let mut wrapped = Map::new();
            wrapped.insert(field.to_string(), operand.clone());
            Filter::Not(Box::new(Filter::from_document(&Value::Object(wrapped))?))
        }
        other => return Err(invalid(format!("unknown operator '{}' on '{}'", other, field))),
    };

    if field == TIME_FIELD {
        validate_time_operand(&filter)?;
    }
    Ok(filter)
}

/// Reject time comparisons whose operand is not a parseable datetime
fn validate_time_operand(filter: &Filter) -> Result<()> {
    match filter {
        Filter::Gt(_, v) | Filter::Gte(_, v) | Filter::Lt(_, v) | Filter::Lte(_, v) => match v {
            Value::String(text) => parse_iso(text, None).map(|_| ()),
            other => Err(invalid(format!("time operand must be an ISO-8601 string, got {}", other))),
        },
        _ => Ok(()),
    }
}

fn invalid(message: String) -> StorageError {
    StorageError::Validation(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 8, 23, h, m, 0).unwrap()
    }

    fn records() -> Vec<EventRecord> {
        vec![
            EventRecord::new(at(9, 30), "first event").with_field("level", "INFO"),
            EventRecord::new(at(9, 45), "second event").with_field("level", "WARNING"),
            EventRecord::new(at(10, 30), "third event")
                .with_field("level", "ERROR")
                .with_field("tag", "WEB")
                .with_field("code", 500),
        ]
    }

    fn count(filter: &Filter) -> usize {
        records().iter().filter(|r| filter.matches(r)).count()
    }

    #[test]
    fn test_time_range() {
        let filter = Filter::And(vec![Filter::time_from(at(9, 31)), Filter::time_to(at(9, 46))]);
        assert_eq!(count(&filter), 1);
        assert_eq!(count(&Filter::time_from(at(9, 29))), 3);
        assert_eq!(count(&Filter::time_to(at(9, 29))), 0);
    }

    #[test]
    fn test_empty_and_matches_all() {
        assert_eq!(count(&Filter::all()), 3);
        assert_eq!(count(&Filter::Or(vec![])), 0);
    }

    #[test]
    fn test_field_predicates() {
        assert_eq!(count(&Filter::eq("level", "ERROR")), 1);
        assert_eq!(count(&Filter::Ne("level".into(), json!("ERROR"))), 2);
        assert_eq!(count(&Filter::Exists("tag".into(), true)), 1);
        assert_eq!(count(&Filter::Gte("code".into(), json!(400))), 1);
        assert_eq!(count(&Filter::Gt("code".into(), json!("400"))), 0);
        assert_eq!(
            count(&Filter::In("level".into(), vec![json!("INFO"), json!("ERROR")])),
            2
        );
    }

    #[test]
    fn test_from_document() {
        let filter = Filter::from_document(&json!({"level": "ERROR"})).unwrap();
        assert_eq!(filter, Filter::eq("level", "ERROR"));

        let filter = Filter::from_document(&json!({
            "time": {"$gte": "2019-08-23T09:31:00", "$lte": "2019-08-23T09:46:00"}
        }))
        .unwrap();
        assert_eq!(count(&filter), 1);

        let filter = Filter::from_document(&json!({
            "$or": [{"level": "INFO"}, {"tag": {"$exists": true}}]
        }))
        .unwrap();
        assert_eq!(count(&filter), 2);

        let filter = Filter::from_document(&json!({"level": {"$nin": ["INFO", "WARNING"]}})).unwrap();
        assert_eq!(count(&filter), 1);

        let filter = Filter::from_document(&json!({"level": {"$not": {"$eq": "INFO"}}})).unwrap();
        assert_eq!(count(&filter), 2);
    }

    #[test]
    fn test_from_document_rejects_unknown_operators() {
        for doc in [
            json!({"level": {"$regex": "ERR"}}),
            json!({"$where": "true"}),
            json!(["level"]),
            json!({"time": {"$gte": "yesterday"}}),
        ] {
            assert!(matches!(
                Filter::from_document(&doc),
                Err(StorageError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_time_bounds() {
        let filter = Filter::And(vec![
            Filter::time_from(at(9, 0)),
            Filter::And(vec![Filter::time_from(at(9, 31))]),
            Filter::time_to(at(10, 0)),
            Filter::eq("level", "INFO"),
        ]);
        assert_eq!(filter.time_bounds(), (Some(at(9, 31)), Some(at(10, 0))));

        let or = Filter::Or(vec![Filter::time_from(at(9, 0))]);
        assert_eq!(or.time_bounds(), (None, None));
    }

    #[test]
    fn test_sort() {
        let mut list = records();
        list.push(EventRecord::new(at(8, 0), "untagged"));

        Sort::new("level", true).apply(&mut list);
        let levels: Vec<_> = list.iter().map(|r| r.field("level").cloned()).collect();
        assert_eq!(
            levels,
            vec![None, Some(json!("ERROR")), Some(json!("INFO")), Some(json!("WARNING"))]
        );

        Sort::new("time", false).apply(&mut list);
        assert_eq!(list[0].event, json!("third event"));
        assert_eq!(list[3].event, json!("untagged"));
    }

    #[test]
    fn test_resolve_times_uses_zone() {
        let zone = FixedOffset::east_opt(2 * 3600);
        let doc = json!({
            "time": {"$gte": "2019-08-23T11:30:00", "$in": ["2019-08-23 11:45"]},
            "$or": [{"time": "2019-08-23T12:30:00"}, {"level": "2019-08-23T12:30:00"}]
        });
        let resolved = Filter::from_document(&doc).unwrap().resolve_times(zone).unwrap();

        assert_eq!(resolved.time_bounds(), (Some(at(9, 30)), None));
        assert!(matches!(
            &resolved,
            Filter::And(clauses) if clauses.contains(&Filter::Or(vec![
                Filter::eq("time", "2019-08-23T10:30:00Z"),
                Filter::eq("level", "2019-08-23T12:30:00"),
            ]))
        ));
        assert_eq!(count(&resolved), 0);
        assert_eq!(
            count(&Filter::from_document(&json!({"time": {"$gte": "2019-08-23T11:30:00"}}))
                .unwrap()
                .resolve_times(zone)
                .unwrap()),
            3
        );
    }

    #[test]
    fn test_resolve_times_rejects_bad_operand() {
        let err = Filter::eq("time", "teatime").resolve_times(None).unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
        assert_eq!(
            Filter::eq("level", "teatime").resolve_times(None).unwrap(),
            Filter::eq("level", "teatime")
        );
    }
}
