//! In-memory `RelationFetcher` for tests.
//!
//! `MockDatabase` holds tables as plain rows, evaluates owner and batch queries
//! against them (junction hops and ordering included) and logs every query it
//! receives, so tests can assert how many round trips a scenario took.
//!
//! # Example
//!
//! ```
//! use lifeguard_bulk::mock::MockDatabase;
//! use lifeguard_bulk::model::record;
//!
//! let db = MockDatabase::new()
//!     .with_table("users", vec![record([("id", 7.into()), ("name", "jack".into())])]);
//! assert_eq!(db.query_count(), 0);
//! ```

use crate::executor::LifeError;
use crate::fetch::{OwnerFilter, OwnerQuery, RelationFetcher, ResultRow};
use crate::loader::planner::BatchQuery;
use crate::model::Record;
use crate::relation::def::{Direction, OrderSpec};
use crate::value::{compare_values, KeyValue};
use sea_query::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Which fetcher entry point received a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Owners,
    Batch,
}

/// One logged query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    pub kind: QueryKind,
    /// Rendered PostgreSQL
    pub sql: String,
    /// Table the rows come from
    pub table: String,
    /// Keys of a batch query (empty for owner queries)
    pub keys: Vec<KeyValue>,
    /// Bound parameters, in placeholder order
    pub values: Vec<Value>,
}

/// In-memory tables plus a query log
#[derive(Debug, Default)]
pub struct MockDatabase {
    tables: HashMap<String, Vec<Record>>,
    log: Mutex<Vec<QueryLogEntry>>,
    failure: Mutex<Option<String>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `rows` to `table`
    pub fn with_table(mut self, table: &str, rows: Vec<Record>) -> Self {
        self.tables.entry(table.to_string()).or_default().extend(rows);
        self
    }

    pub fn insert(&mut self, table: &str, row: Record) {
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    /// Make the next query fail with `LifeError::QueryError(message)`
    pub fn fail_next(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    pub fn queries(&self) -> Vec<QueryLogEntry> {
        lock(&self.log).clone()
    }

    pub fn query_count(&self) -> usize {
        lock(&self.log).len()
    }

    /// Logged batch queries, oldest first
    pub fn batch_queries(&self) -> Vec<QueryLogEntry> {
        lock(&self.log)
            .iter()
            .filter(|entry| entry.kind == QueryKind::Batch)
            .cloned()
            .collect()
    }

    pub fn clear_log(&self) {
        lock(&self.log).clear();
    }

    fn rows(&self, table: &str) -> &[Record] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn record_query(&self, entry: QueryLogEntry) -> Result<(), LifeError> {
        log::trace!("mock query: {}", entry.sql);
        lock(&self.log).push(entry);
        match lock(&self.failure).take() {
            Some(message) => Err(LifeError::QueryError(message)),
            None => Ok(()),
        }
    }
}

impl RelationFetcher for MockDatabase {
    fn fetch_batch(&self, query: &BatchQuery) -> Result<Vec<ResultRow>, LifeError> {
        let (sql, values) = query.to_sql();
        self.record_query(QueryLogEntry {
            kind: QueryKind::Batch,
            sql,
            table: query.related_table().to_string(),
            keys: query.keys().to_vec(),
            values: values.0,
        })?;

        let keys: HashSet<&KeyValue> = query.keys().iter().collect();
        let key_column = query.key_column();
        let related = self.rows(query.related_table());

        let mut rows = Vec::new();
        match query.junction() {
            None => {
                for row in related {
                    if let Some(key) = key_of(row, &key_column.column) {
                        if keys.contains(&key) {
                            rows.push(ResultRow::new(Some(key), row.clone()));
                        }
                    }
                }
            }
            Some(hop) => {
                for link in self.rows(&key_column.table) {
                    let Some(owner_key) = key_of(link, &key_column.column) else {
                        continue;
                    };
                    if !keys.contains(&owner_key) {
                        continue;
                    }
                    let Some(target) = key_of(link, &hop.related_column) else {
                        continue;
                    };
                    for row in related {
                        if key_of(row, &hop.related_key).as_ref() == Some(&target) {
                            rows.push(ResultRow::new(Some(owner_key.clone()), row.clone()));
                        }
                    }
                }
            }
        }

        rows.sort_by(|a, b| compare_records(&a.record, &b.record, query.order_by()));
        Ok(rows)
    }

    fn fetch_owners(&self, query: &OwnerQuery) -> Result<Vec<Record>, LifeError> {
        let (sql, values) = query.to_sql();
        self.record_query(QueryLogEntry {
            kind: QueryKind::Owners,
            sql,
            table: query.table().to_string(),
            keys: Vec::new(),
            values: values.0,
        })?;

        let mut rows: Vec<Record> = self
            .rows(query.table())
            .iter()
            .filter(|row| query.filters().iter().all(|filter| matches_filter(row, filter)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| compare_records(a, b, query.get_order_by()));
        Ok(rows)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn key_of(row: &Record, column: &str) -> Option<KeyValue> {
    row.get(column).and_then(KeyValue::from_value)
}

fn matches_filter(row: &Record, filter: &OwnerFilter) -> bool {
    match filter {
        OwnerFilter::Eq(column, value) => match (key_of(row, column), KeyValue::from_value(value)) {
            (Some(a), Some(b)) => a == b,
            _ => row
                .get(column)
                .is_some_and(|v| compare_values(v, value) == Ordering::Equal),
        },
        OwnerFilter::In(column, values) => key_of(row, column)
            .is_some_and(|key| values.iter().any(|value| KeyValue::from_value(value).as_ref() == Some(&key))),
    }
}

fn compare_records(a: &Record, b: &Record, order_by: &[OrderSpec]) -> Ordering {
    let null = Value::Int(None);
    for order in order_by {
        let ordering = compare_values(
            a.get(&order.column).unwrap_or(&null),
            b.get(&order.column).unwrap_or(&null),
        );
        let ordering = match order.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
