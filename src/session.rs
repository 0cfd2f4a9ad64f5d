//! Working sets and units of work.
//!
//! A [`WorkingSet`] is the set of identity-tracked entities the loaders operate
//! on: siblings are collected from it and fetched rows are merged into it.
//! [`IdentityMap`] is the in-process implementation and [`UnitOfWork`] the handle
//! applications use to load entities and access their relations.

pub mod identity_map;
pub mod unit_of_work;

#[doc(inline)]
pub use identity_map::IdentityMap;
#[doc(inline)]
pub use unit_of_work::UnitOfWork;

use crate::error::LoaderError;
use crate::model::{Entity, EntityId, IdentityKey, ModelDef, Record, RelationValue};

/// The entities of one unit of work, as seen by the loaders
pub trait WorkingSet {
    /// Entities of `model`, in the order they entered the working set
    fn entities_of(&self, model: &str) -> Vec<EntityId>;

    fn entity(&self, id: EntityId) -> Option<&Entity>;

    /// Entity tracked under `key`, if any
    fn lookup(&self, key: &IdentityKey) -> Option<EntityId>;

    /// Track a loaded row; an entity already tracked under the same identity is
    /// kept and returned unchanged
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::MissingKey` if the row lacks its primary key.
    fn merge_loaded(&mut self, model: &ModelDef, record: Record) -> Result<EntityId, LoaderError>;

    /// Store `value` on `id` without triggering any load
    ///
    /// Returns `false` when `id` is no longer tracked.
    fn set_committed_value(&mut self, id: EntityId, relation: &str, value: RelationValue) -> bool;
}
