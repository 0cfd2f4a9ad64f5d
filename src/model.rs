//! Entity metadata and entity instances.
//!
//! A [`ModelDef`] describes one mapped type (name, table, primary key). An
//! [`Entity`] is one identity-tracked instance of that type: its column values
//! plus the state of each relation. A relation is `RESOLVED` exactly when the
//! entity holds a [`RelationValue`] for it; absence means `UNRESOLVED`.

use crate::error::LoaderError;
use crate::relation::identity::Identity;
use crate::value::KeyValue;
use sea_query::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Column values of one row, keyed by column name
pub type Record = BTreeMap<String, Value>;

/// Build a [`Record`] from `(column, value)` pairs
///
/// # Example
///
/// ```
/// use lifeguard_bulk::model::record;
///
/// let row = record([("id", 7.into()), ("name", "jack".into())]);
/// assert_eq!(row.len(), 2);
/// ```
pub fn record<I, K>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Metadata for one mapped entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    name: String,
    table: String,
    primary_key: Identity,
}

impl ModelDef {
    /// Describe a model stored in `table` with primary key `primary_key`
    ///
    /// # Example
    ///
    /// ```
    /// use lifeguard_bulk::ModelDef;
    ///
    /// let user = ModelDef::new("User", "users", "id");
    /// assert_eq!(user.table(), "users");
    /// assert_eq!(user.primary_key().as_unary(), Some("id"));
    /// ```
    pub fn new(name: impl Into<String>, table: impl Into<String>, primary_key: impl Into<Identity>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: primary_key.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &Identity {
        &self.primary_key
    }

    /// Extract the identity key of `record` for this model
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::MissingKey` when a primary key column is absent or `NULL`.
    pub fn identity_of(&self, record: &Record) -> Result<IdentityKey, LoaderError> {
        let mut values = Vec::with_capacity(self.primary_key.arity());
        for col in self.primary_key.iter() {
            let value = record
                .get(col)
                .and_then(KeyValue::from_value)
                .ok_or_else(|| LoaderError::MissingKey {
                    model: self.name.clone(),
                    column: col.to_string(),
                })?;
            values.push(value);
        }
        Ok(IdentityKey::new(self.name.clone(), values))
    }
}

/// Identity of a tracked entity: its model plus primary key values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    model: String,
    values: Vec<KeyValue>,
}

impl IdentityKey {
    pub fn new(model: impl Into<String>, values: Vec<KeyValue>) -> Self {
        Self {
            model: model.into(),
            values,
        }
    }

    /// Identity key for a model with a single-column primary key
    pub fn single(model: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        Self::new(model, vec![value.into()])
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn values(&self) -> &[KeyValue] {
        &self.values
    }
}

/// Handle to an entity held by a working set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value of a resolved relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationValue {
    /// Single-valued relation: the related entity, or an explicit absence
    One(Option<EntityId>),
    /// Collection-valued relation, in the relation's declared order
    Many(Vec<EntityId>),
}

impl RelationValue {
    /// The single related entity (`None` for absence or for a collection)
    pub fn as_one(&self) -> Option<EntityId> {
        match self {
            RelationValue::One(id) => *id,
            RelationValue::Many(_) => None,
        }
    }

    /// The related entities as a slice (zero or one for single-valued relations)
    pub fn ids(&self) -> &[EntityId] {
        match self {
            RelationValue::One(Some(id)) => std::slice::from_ref(id),
            RelationValue::One(None) => &[],
            RelationValue::Many(ids) => ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

/// One identity-tracked entity instance
#[derive(Debug, Clone)]
pub struct Entity {
    model: String,
    key: Option<IdentityKey>,
    record: Record,
    pending: bool,
    relations: HashMap<String, RelationValue>,
}

impl Entity {
    pub(crate) fn new(model: impl Into<String>, key: Option<IdentityKey>, record: Record, pending: bool) -> Self {
        Self {
            model: model.into(),
            key,
            record,
            pending,
            relations: HashMap::new(),
        }
    }

    /// Name of the entity's model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Identity key; `None` for a pending entity without an assigned primary key
    pub fn key(&self) -> Option<&IdentityKey> {
        self.key.as_ref()
    }

    /// Column value by name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.record.get(column)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Whether the entity was added to the unit of work but never persisted
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether `relation` has been resolved on this entity
    pub fn is_resolved(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// The resolved value of `relation`, if any
    pub fn relation(&self, relation: &str) -> Option<&RelationValue> {
        self.relations.get(relation)
    }

    /// Store an already-fetched relation value without running any loader.
    pub(crate) fn set_committed_value(&mut self, relation: &str, value: RelationValue) {
        self.relations.insert(relation.to_string(), value);
    }
}
