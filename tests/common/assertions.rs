use eventstore::{EventQuery, EventRecord, EventStore};
use serde_json::Value;

/// Run a query and collect the results
pub fn collect(store: &EventStore, query: EventQuery) -> Vec<EventRecord> {
    store
        .get_events(&query)
        .expect("query failed")
        .into_vec()
        .expect("cursor failed")
}

/// Assert no record exposes a backend identifier
pub fn assert_no_identifiers(records: &[EventRecord]) {
    for record in records {
        assert!(record.field("_id").is_none(), "record carries _id: {:?}", record);
        let json = serde_json::to_value(record).expect("record serializes");
        assert!(json.get("_id").is_none(), "serialized record carries _id: {}", json);
    }
}

/// Values of one field across records, `Null` where absent
pub fn field_values(records: &[EventRecord], field: &str) -> Vec<Value> {
    records
        .iter()
        .map(|r| r.field(field).cloned().unwrap_or(Value::Null))
        .collect()
}
