//! Result distribution.
//!
//! Routes the rows of one batch query back to the owners that asked for them,
//! merges the related rows into the working set and commits every owner's value
//! without triggering any further load.

use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::fetch::ResultRow;
use crate::model::{EntityId, ModelDef, Record, RelationValue};
use crate::relation::def::{Cardinality, Direction, OrderSpec, RelationDescriptor};
use crate::session::WorkingSet;
use crate::value::{compare_values, KeyValue};
use sea_query::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// What happened during one batch load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// `Owner.relation`
    pub relation: String,
    /// Owners resolved by the batch
    pub owners: usize,
    /// Distinct keys sent to the data layer
    pub keys: usize,
    /// Rows returned by the data layer
    pub rows: usize,
    /// Rows whose join key matched no owner of the batch
    pub orphan_rows: usize,
    /// Distinct non-null join keys of the orphan rows
    pub orphan_keys: Vec<KeyValue>,
    /// Owners resolved from already-tracked entities without a query
    pub from_identity_map: usize,
    /// Owners that left the working set before their value was committed
    pub skipped: usize,
    /// Whether a query was issued
    pub queried: bool,
}

impl BatchReport {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            ..Self::default()
        }
    }

    pub fn has_orphans(&self) -> bool {
        self.orphan_rows > 0
    }
}

/// Distribute `rows` to `owners` and commit each owner's relation value
///
/// Rows are grouped by join key in the order they arrived, then stably sorted by
/// the relation's ordering. Owners sharing a key receive equal lists. An owner
/// with no match (or a `NULL` key) gets an empty list or an explicit absence.
/// Rows matching no owner are counted in the report and logged, never fatal.
///
/// # Errors
///
/// `LoaderError::MissingKey` when a related row lacks its primary key.
pub fn distribute(
    working_set: &mut dyn WorkingSet,
    descriptor: &RelationDescriptor,
    related: &ModelDef,
    owners: &[(EntityId, Option<KeyValue>)],
    rows: Vec<ResultRow>,
    config: &LoaderConfig,
    report: &mut BatchReport,
) -> Result<(), LoaderError> {
    let requested: HashSet<&KeyValue> = owners.iter().filter_map(|(_, key)| key.as_ref()).collect();

    report.rows += rows.len();
    let mut groups: HashMap<KeyValue, Vec<Record>> = HashMap::new();
    for row in rows {
        match row.join_key {
            Some(key) if requested.contains(&key) => groups.entry(key).or_default().push(row.record),
            join_key => {
                report.orphan_rows += 1;
                if config.report_orphan_rows {
                    log::warn!(
                        "{}: fetched row with join key {:?} matches no owner in the batch",
                        descriptor.label(),
                        join_key
                    );
                }
                if let Some(key) = join_key {
                    if !report.orphan_keys.contains(&key) {
                        report.orphan_keys.push(key);
                    }
                }
            }
        }
    }

    let mut related_ids: HashMap<KeyValue, Vec<EntityId>> = HashMap::with_capacity(groups.len());
    for (key, mut records) in groups {
        sort_records(&mut records, descriptor.order_by());
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = working_set.merge_loaded(related, record)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        related_ids.insert(key, ids);
    }

    for (owner, key) in owners {
        let ids = key.as_ref().and_then(|k| related_ids.get(k)).cloned().unwrap_or_default();
        let value = into_value(descriptor, *owner, ids, config);
        commit(working_set, descriptor, *owner, value, report);
    }
    Ok(())
}

/// Shape matched entities as the relation's value
pub(crate) fn into_value(
    descriptor: &RelationDescriptor,
    owner: EntityId,
    ids: Vec<EntityId>,
    config: &LoaderConfig,
) -> RelationValue {
    match descriptor.cardinality() {
        Cardinality::Many => RelationValue::Many(ids),
        Cardinality::One => {
            if ids.len() > 1 && config.warn_on_multiple_rows {
                log::warn!(
                    "{}: {} rows matched single-valued relation on {}; keeping the first",
                    descriptor.label(),
                    ids.len(),
                    owner
                );
            }
            RelationValue::One(ids.first().copied())
        }
    }
}

/// Commit `value` on `owner`, skipping owners that left the working set
pub(crate) fn commit(
    working_set: &mut dyn WorkingSet,
    descriptor: &RelationDescriptor,
    owner: EntityId,
    value: RelationValue,
    report: &mut BatchReport,
) {
    if working_set.set_committed_value(owner, descriptor.name(), value) {
        report.owners += 1;
    } else {
        report.skipped += 1;
        log::debug!("{}: owner {} left the working set, skipped", descriptor.label(), owner);
    }
}

fn sort_records(records: &mut [Record], order_by: &[OrderSpec]) {
    if order_by.is_empty() {
        return;
    }
    let null = Value::Int(None);
    records.sort_by(|a, b| {
        order_by
            .iter()
            .map(|order| {
                let ordering = compare_values(
                    a.get(&order.column).unwrap_or(&null),
                    b.get(&order.column).unwrap_or(&null),
                );
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}
