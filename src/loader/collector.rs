//! Sibling collection.
//!
//! When one entity's relation is accessed, its siblings are the other entities of
//! the same model in the same working set whose copy of that relation is still
//! unresolved. They are loaded together with the accessed entity.

use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::model::EntityId;
use crate::relation::def::RelationDescriptor;
use crate::session::WorkingSet;
use crate::value::KeyValue;
use sea_query::Value;
use std::collections::HashSet;

/// Collect the batch for `trigger`: the trigger itself plus every unresolved sibling
///
/// The trigger is always part of the batch. Siblings come in working-set order;
/// entities whose relation is already resolved are skipped so that nothing is
/// fetched twice, and pending entities are skipped when `config.skip_pending` is set.
///
/// # Errors
///
/// Returns `LoaderError::UnknownEntity` if `trigger` is not in the working set.
pub fn collect_siblings(
    working_set: &dyn WorkingSet,
    descriptor: &RelationDescriptor,
    trigger: EntityId,
    config: &LoaderConfig,
) -> Result<Vec<EntityId>, LoaderError> {
    if working_set.entity(trigger).is_none() {
        return Err(LoaderError::UnknownEntity(trigger));
    }

    let mut seen = HashSet::new();
    let mut batch = Vec::new();
    for id in working_set.entities_of(descriptor.owner()) {
        let Some(entity) = working_set.entity(id) else {
            continue;
        };
        let wanted = id == trigger
            || (!entity.is_resolved(descriptor.name()) && !(config.skip_pending && entity.is_pending()));
        if wanted && seen.insert(id) {
            batch.push(id);
        }
    }

    if !seen.contains(&trigger) {
        batch.insert(0, trigger);
    }

    log::debug!(
        "{}: collected {} entities (trigger {})",
        descriptor.label(),
        batch.len(),
        trigger
    );
    Ok(batch)
}

/// Local key of one owner
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerKey {
    pub owner: EntityId,
    /// Normalized key used for grouping, `None` for `NULL`
    pub key: Option<KeyValue>,
    /// The key column as stored on the owner; bound as is so that an `INT4`
    /// column is matched with an `INT4` parameter
    pub value: Option<Value>,
}

impl OwnerKey {
    fn absent(owner: EntityId) -> Self {
        Self {
            owner,
            key: None,
            value: None,
        }
    }
}

/// Read the local key of each owner
///
/// A `NULL` key, or a missing key column on a pending entity, yields no key:
/// such owners resolve to absence without contributing to the query. Owners that
/// vanished from the working set are left out.
///
/// # Errors
///
/// `LoaderError::MissingKey` when a persistent owner lacks the key column,
/// `LoaderError::UnsupportedRelation` for an invalid descriptor.
pub fn owner_keys(
    working_set: &dyn WorkingSet,
    descriptor: &RelationDescriptor,
    owners: &[EntityId],
) -> Result<Vec<OwnerKey>, LoaderError> {
    let shape = descriptor.shape()?;
    let column = shape
        .local_key
        .as_unary()
        .ok_or_else(|| LoaderError::unsupported(descriptor.owner(), descriptor.name(), "composite local key"))?;

    let mut keys = Vec::with_capacity(owners.len());
    for &id in owners {
        let Some(entity) = working_set.entity(id) else {
            log::debug!("{}: owner {} vanished before its key was read", descriptor.label(), id);
            continue;
        };
        let owner_key = match entity.get(column) {
            Some(value) => match KeyValue::from_value(value) {
                Some(key) => OwnerKey {
                    owner: id,
                    key: Some(key),
                    value: Some(value.clone()),
                },
                None => OwnerKey::absent(id),
            },
            None if entity.is_pending() => OwnerKey::absent(id),
            None => {
                return Err(LoaderError::MissingKey {
                    model: entity.model().to_string(),
                    column: column.to_string(),
                })
            }
        };
        keys.push(owner_key);
    }
    Ok(keys)
}
