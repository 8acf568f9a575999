//! Collections: a documents table plus a time index

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::filter::{Filter, Sort};
use crate::provider::StoredEvents;
use crate::record::{EventRecord, StoredEvent};
use crate::{Result, StorageError};

/// Index entries fetched per read transaction by a cursor
pub const BATCH_SIZE: usize = 256;

type IndexKey = (i64, u64);

/// How stored times are decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecOptions {
    /// Express decoded times in `zone` instead of UTC
    pub tz_aware: bool,
    pub zone: Option<FixedOffset>,
}

impl CodecOptions {
    pub fn tz_aware(zone: FixedOffset) -> Self {
        Self {
            tz_aware: true,
            zone: Some(zone),
        }
    }

    fn decode_zone(&self) -> Option<FixedOffset> {
        if self.tz_aware {
            self.zone
        } else {
            None
        }
    }
}

/// A named collection of event documents
#[derive(Clone)]
pub struct Collection {
    db: Arc<Database>,
    name: String,
    index_name: String,
    codec: CodecOptions,
}

impl Collection {
    pub(crate) fn new(db: Arc<Database>, name: &str, codec: CodecOptions) -> Self {
        Self {
            db,
            name: name.to_string(),
            index_name: format!("{}.time_index", name),
            codec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> CodecOptions {
        self.codec
    }

    fn docs_table(&self) -> TableDefinition<'_, u64, &'static [u8]> {
        TableDefinition::new(&self.name)
    }

    fn index_table(&self) -> TableDefinition<'_, IndexKey, ()> {
        TableDefinition::new(&self.index_name)
    }

    /// Insert one record, returning its assigned id
    pub fn insert_one(&self, record: &EventRecord) -> Result<u64> {
        let write_txn = self.db.begin_write()?;
        let id = {
            let mut docs = write_txn.open_table(self.docs_table())?;
            let id = match docs.last()? {
                Some((key, _)) => key.value() + 1,
                None => 1,
            };
            let bytes = serde_json::to_vec(&record.to_document(id))?;
            docs.insert(id, bytes.as_slice())?;

            let mut index = write_txn.open_table(self.index_table())?;
            index.insert((record.instant().timestamp_micros(), id), ())?;
            id
        };
        write_txn.commit()?;
        Ok(id)
    }

    /// Ensure the time-ascending index exists and covers every document
    ///
    /// Idempotent; returns the number of documents that had to be indexed.
    pub fn create_time_index(&self) -> Result<usize> {
        let write_txn = self.db.begin_write()?;
        let mut backfilled = 0;
        {
            let docs = write_txn.open_table(self.docs_table())?;
            let mut index = write_txn.open_table(self.index_table())?;

            let indexed: HashSet<u64> = index
                .iter()?
                .map(|entry| entry.map(|(key, _)| key.value().1))
                .collect::<std::result::Result<_, _>>()?;

            for entry in docs.iter()? {
                let (key, value) = entry?;
                let id = key.value();
                if indexed.contains(&id) {
                    continue;
                }
                let stored = decode(id, value.value(), None)?;
                index.insert((stored.record.instant().timestamp_micros(), id), ())?;
                backfilled += 1;
            }
        }
        write_txn.commit()?;
        debug!(collection = %self.name, backfilled, "time index ready");
        Ok(backfilled)
    }

    /// Find documents matching `filter`
    ///
    /// Unsorted and time-sorted queries stream from the time index in
    /// batches. Sorting on any other field materializes the matches first.
    pub fn find(&self, filter: Filter, sort: Option<Sort>) -> Result<StoredEvents> {
        match sort {
            Some(sort) if !sort.is_time() => {
                let mut matches = IndexScan::new(self, filter, true).collect::<Result<Vec<_>>>()?;
                matches.sort_by(|a, b| sort.compare(&a.record, &b.record));
                Ok(Box::new(matches.into_iter().map(Ok)))
            }
            sort => {
                let ascending = sort.map_or(true, |s| s.ascending);
                Ok(Box::new(IndexScan::new(self, filter, ascending)))
            }
        }
    }

    /// Remove the collection and its index
    pub fn drop_all(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(self.docs_table())?;
        write_txn.delete_table(self.index_table())?;
        write_txn.commit()?;
        info!(collection = %self.name, "dropped collection");
        Ok(())
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("codec", &self.codec)
            .finish()
    }
}

fn decode(id: u64, bytes: &[u8], zone: Option<FixedOffset>) -> Result<StoredEvent> {
    let doc: Map<String, Value> =
        serde_json::from_slice(bytes).map_err(|e| StorageError::CorruptDocument {
            id,
            reason: e.to_string(),
        })?;
    StoredEvent::from_document(doc, zone)
}

fn index_bound(time: DateTime<Utc>, id: u64) -> IndexKey {
    (time.timestamp_micros(), id)
}

fn is_empty_range(lower: &Bound<IndexKey>, upper: &Bound<IndexKey>) -> bool {
    match (lower, upper) {
        (Bound::Included(a), Bound::Included(b)) => a > b,
        (Bound::Included(a), Bound::Excluded(b))
        | (Bound::Excluded(a), Bound::Included(b))
        | (Bound::Excluded(a), Bound::Excluded(b)) => a >= b,
        _ => false,
    }
}

/// Batched forward-only scan over the time index
///
/// Each batch runs in its own read transaction, so no transaction is held
/// between calls to `next`.
struct IndexScan {
    db: Arc<Database>,
    docs_name: String,
    index_name: String,
    zone: Option<FixedOffset>,
    filter: Filter,
    ascending: bool,
    lower: Bound<IndexKey>,
    upper: Bound<IndexKey>,
    buffer: VecDeque<StoredEvent>,
    done: bool,
}

impl IndexScan {
    fn new(collection: &Collection, filter: Filter, ascending: bool) -> Self {
        let (from, to) = filter.time_bounds();
        let lower = from.map_or(Bound::Unbounded, |t| Bound::Included(index_bound(t, 0)));
        let upper = to.map_or(Bound::Unbounded, |t| Bound::Included(index_bound(t, u64::MAX)));
        let done = is_empty_range(&lower, &upper);
        Self {
            db: Arc::clone(&collection.db),
            docs_name: collection.name.clone(),
            index_name: collection.index_name.clone(),
            zone: collection.codec.decode_zone(),
            filter,
            ascending,
            lower,
            upper,
            buffer: VecDeque::new(),
            done,
        }
    }

    fn fill(&mut self) -> Result<()> {
        while self.buffer.is_empty() && !self.done {
            let read_txn = self.db.begin_read()?;
            let index = match read_txn.open_table(TableDefinition::<IndexKey, ()>::new(&self.index_name)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => {
                    self.done = true;
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let docs = match read_txn
                .open_table(TableDefinition::<u64, &'static [u8]>::new(&self.docs_name))
            {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => {
                    self.done = true;
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let range = index.range((self.lower, self.upper))?;
            let keys: Vec<IndexKey> = if self.ascending {
                range
                    .take(BATCH_SIZE)
                    .map(|entry| entry.map(|(key, _)| key.value()))
                    .collect::<std::result::Result<_, _>>()?
            } else {
                range
                    .rev()
                    .take(BATCH_SIZE)
                    .map(|entry| entry.map(|(key, _)| key.value()))
                    .collect::<std::result::Result<_, _>>()?
            };

            if keys.len() < BATCH_SIZE {
                self.done = true;
            }
            if let Some(&last) = keys.last() {
                if self.ascending {
                    self.lower = Bound::Excluded(last);
                } else {
                    self.upper = Bound::Excluded(last);
                }
                if is_empty_range(&self.lower, &self.upper) {
                    self.done = true;
                }
            }

            for (_, id) in keys {
                if let Some(bytes) = docs.get(id)? {
                    let stored = decode(id, bytes.value(), self.zone)?;
                    if self.filter.matches(&stored.record) {
                        self.buffer.push_back(stored);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Iterator for IndexScan {
    type Item = Result<StoredEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
