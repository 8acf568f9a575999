//! Query/result engine
//!
//! Write path: resolve the event time, apply classification, build the
//! record. Read path: compose the filter from time bounds and caller
//! predicates, then hand results back either as a single-pass cursor or as a
//! materialized list, with backend identifiers stripped.

use std::fmt;

use chrono::{FixedOffset, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::provider::StoredEvents;
use crate::record::{EventRecord, RESERVED_FIELDS};
use crate::time::{express, TimeInput};
use crate::{Filter, Result, Sort, StorePolicy};

/// An event to store
#[derive(Debug, Clone, PartialEq)]
pub struct EventInput {
    /// Caller-supplied time; ignored when the store stamps times itself
    pub at: Option<TimeInput>,
    pub event: Value,
    pub fields: Map<String, Value>,
}

impl EventInput {
    pub fn new(event: impl Into<Value>) -> Self {
        Self {
            at: None,
            event: event.into(),
            fields: Map::new(),
        }
    }

    pub fn at(mut self, time: impl Into<TimeInput>) -> Self {
        self.at = Some(time.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Build the record to insert for `input` under `policy`
pub fn prepare_record(policy: &StorePolicy, input: EventInput) -> Result<EventRecord> {
    let EventInput {
        at,
        event,
        mut fields,
    } = input;

    let time = if policy.time_auto {
        if at.is_some() {
            warn!("time was provided while time_auto is enabled; using the current time");
        }
        Utc::now()
    } else {
        match at {
            Some(at) => at.resolve(policy.time_zone)?,
            None => Utc::now(),
        }
    };

    for name in RESERVED_FIELDS {
        if fields.remove(name).is_some() {
            warn!(field = name, "dropping extra field with a reserved name");
        }
    }

    let mut record = EventRecord {
        time: express(time, policy.time_zone),
        event,
        fields,
    };

    if let Some(classifier) = &policy.classifier {
        if let Some((field, value)) = classifier.classify(&record.event)? {
            record.fields.insert(field, value);
        }
    }

    Ok(record)
}

/// Retrieval options
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    /// Inclusive lower time bound
    pub from_time: Option<TimeInput>,
    /// Inclusive upper time bound
    pub to_time: Option<TimeInput>,
    /// Extra predicates, ANDed together
    pub filters: Vec<Filter>,
    /// Collect results into a list instead of returning a cursor
    pub materialize: bool,
    pub order_by: Option<String>,
    pub ascending: bool,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            from_time: None,
            to_time: None,
            filters: Vec::new(),
            materialize: false,
            order_by: None,
            ascending: true,
        }
    }
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_time(mut self, time: impl Into<TimeInput>) -> Self {
        self.from_time = Some(time.into());
        self
    }

    pub fn to_time(mut self, time: impl Into<TimeInput>) -> Self {
        self.to_time = Some(time.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a Mongo-style filter document
    pub fn filter_document(self, doc: &Value) -> Result<Self> {
        Ok(self.filter(Filter::from_document(doc)?))
    }

    pub fn materialize(mut self) -> Self {
        self.materialize = true;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.order_by = Some(field.into());
        self.ascending = ascending;
        self
    }

    /// Conjunction of the time bounds and every extra predicate
    ///
    /// Time operands in the extra predicates are resolved in `zone`, like the
    /// bounds themselves.
    pub fn compose_filter(&self, zone: Option<FixedOffset>) -> Result<Filter> {
        let mut clauses = self
            .filters
            .iter()
            .cloned()
            .map(|f| f.resolve_times(zone))
            .collect::<Result<Vec<_>>>()?;
        if let Some(from) = &self.from_time {
            clauses.push(Filter::time_from(from.resolve(zone)?));
        }
        if let Some(to) = &self.to_time {
            clauses.push(Filter::time_to(to.resolve(zone)?));
        }
        Ok(Filter::And(clauses))
    }

    pub fn sort(&self) -> Option<Sort> {
        self.order_by
            .as_ref()
            .map(|field| Sort::new(field.clone(), self.ascending))
    }
}

/// Single-pass cursor over query results
///
/// Holds the backend stream until it is exhausted, fails, or is closed.
/// After that it keeps returning `None`.
pub struct EventCursor {
    inner: Option<StoredEvents>,
}

impl EventCursor {
    pub fn new(inner: StoredEvents) -> Self {
        Self { inner: Some(inner) }
    }

    /// Release the backend stream without consuming the rest
    pub fn close(&mut self) {
        self.inner = None;
    }

    pub fn is_exhausted(&self) -> bool {
        self.inner.is_none()
    }
}

impl Iterator for EventCursor {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.inner.as_mut()?;
        match inner.next() {
            Some(Ok(stored)) => Some(Ok(stored.record)),
            Some(Err(e)) => {
                self.inner = None;
                Some(Err(e))
            }
            None => {
                self.inner = None;
                None
            }
        }
    }
}

impl fmt::Debug for EventCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCursor")
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}

/// Query results
#[derive(Debug)]
pub enum Events {
    Lazy(EventCursor),
    Materialized(Vec<EventRecord>),
}

impl Events {
    pub fn is_materialized(&self) -> bool {
        matches!(self, Events::Materialized(_))
    }

    /// Collect into a list, draining a cursor if needed
    pub fn into_vec(self) -> Result<Vec<EventRecord>> {
        match self {
            Events::Lazy(cursor) => cursor.collect(),
            Events::Materialized(records) => Ok(records),
        }
    }
}

impl IntoIterator for Events {
    type Item = Result<EventRecord>;
    type IntoIter = Box<dyn Iterator<Item = Result<EventRecord>> + Send>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Events::Lazy(cursor) => Box::new(cursor),
            Events::Materialized(records) => Box::new(records.into_iter().map(Ok)),
        }
    }
}
