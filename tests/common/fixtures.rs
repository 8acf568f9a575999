use chrono::{DateTime, TimeZone, Utc};
use eventstore::{EventInput, StoreOptions};
use parking_lot::{Mutex, MutexGuard};
use tempfile::TempDir;

static GLOBAL_STORE: Mutex<()> = Mutex::new(());

/// Serialize tests that use the process-wide store
///
/// The store is reset on entry so each test starts uninitialized.
pub fn global_store_lock() -> MutexGuard<'static, ()> {
    let guard = GLOBAL_STORE.lock();
    eventstore::EventStore::reset();
    guard
}

/// A time on the scenario day, 2019-08-23, in UTC
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 8, 23, hour, minute, 0).unwrap()
}

/// Options pointing the document backend at a fresh directory
pub fn document_options(dir: &TempDir) -> StoreOptions {
    StoreOptions::new().connection_target(dir.path())
}

/// The three-event log: INFO at 09:30, WARNING at 09:45, ERROR at 10:30 tagged WEB
pub fn scenario_events() -> Vec<EventInput> {
    vec![
        EventInput::new("service started")
            .at(at(9, 30))
            .field("level", "INFO"),
        EventInput::new("slow response")
            .at(at(9, 45))
            .field("level", "WARNING"),
        EventInput::new("request failed")
            .at(at(10, 30))
            .field("level", "ERROR")
            .field("tag", "WEB"),
    ]
}
