//! Identity map: the working set of one unit of work.

use crate::error::LoaderError;
use crate::model::{Entity, EntityId, IdentityKey, ModelDef, Record, RelationValue};
use crate::session::WorkingSet;
use std::collections::HashMap;

/// Entities tracked by one unit of work, at most one instance per identity
///
/// Handles stay stable for the lifetime of the map; an expunged entity leaves an
/// empty slot behind so its handle never points at another entity.
#[derive(Debug, Default)]
pub struct IdentityMap {
    slots: Vec<Option<Entity>>,
    index: HashMap<IdentityKey, EntityId>,
    by_model: HashMap<String, Vec<EntityId>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked entities
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Track a new, not yet persisted entity
    ///
    /// Pending entities are not indexed by identity, so loaded rows never resolve
    /// to them.
    pub fn add_pending(&mut self, model: &ModelDef, record: Record) -> EntityId {
        let key = model.identity_of(&record).ok();
        self.push(Entity::new(model.name(), key, record, true))
    }

    /// Stop tracking `id`
    pub fn expunge(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.slots.get_mut(id.index())?.take()?;
        if let Some(key) = entity.key() {
            if self.index.get(key) == Some(&id) {
                self.index.remove(key);
            }
        }
        if let Some(ids) = self.by_model.get_mut(entity.model()) {
            ids.retain(|other| *other != id);
        }
        Some(entity)
    }

    fn push(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.slots.len());
        self.by_model.entry(entity.model().to_string()).or_default().push(id);
        self.slots.push(Some(entity));
        id
    }
}

impl WorkingSet for IdentityMap {
    fn entities_of(&self, model: &str) -> Vec<EntityId> {
        self.by_model.get(model).cloned().unwrap_or_default()
    }

    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn lookup(&self, key: &IdentityKey) -> Option<EntityId> {
        self.index.get(key).copied()
    }

    fn merge_loaded(&mut self, model: &ModelDef, record: Record) -> Result<EntityId, LoaderError> {
        let key = model.identity_of(&record)?;
        if let Some(&existing) = self.index.get(&key) {
            return Ok(existing);
        }
        let id = self.push(Entity::new(model.name(), Some(key.clone()), record, false));
        self.index.insert(key, id);
        Ok(id)
    }

    fn set_committed_value(&mut self, id: EntityId, relation: &str, value: RelationValue) -> bool {
        match self.slots.get_mut(id.index()).and_then(Option::as_mut) {
            Some(entity) => {
                entity.set_committed_value(relation, value);
                true
            }
            None => false,
        }
    }
}
