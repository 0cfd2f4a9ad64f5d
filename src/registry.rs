//! Model and relation registry.
//!
//! The registry is the mapper configuration: which models exist and which
//! relations each of them declares, with their loading strategy. Relations are
//! described once at declaration time; `configure()` rejects the configuration if
//! any relation has a join shape the loaders cannot handle.

use crate::error::LoaderError;
use crate::model::ModelDef;
use crate::relation::declaration::{validate_declaration, RelationDeclaration, Validation};
use crate::relation::def::RelationDescriptor;
use crate::relation::strategy::LoadStrategy;
use std::collections::BTreeMap;

/// A declared relation and the strategy used to load it
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredRelation {
    descriptor: RelationDescriptor,
    strategy: LoadStrategy,
}

impl RegisteredRelation {
    pub fn descriptor(&self) -> &RelationDescriptor {
        &self.descriptor
    }

    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }
}

/// Models plus their declared relations
///
/// # Example
///
/// ```
/// use lifeguard_bulk::{LoadStrategy, ModelDef, Registry, RelationDeclaration};
///
/// # fn main() -> Result<(), lifeguard_bulk::LoaderError> {
/// let mut registry = Registry::new();
/// registry.register_model(ModelDef::new("User", "users", "id"))?;
/// registry.register_model(ModelDef::new("Address", "addresses", "id"))?;
/// registry.declare(
///     RelationDeclaration::new("User", "addresses", "Address")
///         .join_on(("users", "id"), ("addresses", "user_id"))
///         .strategy(LoadStrategy::Batch),
/// )?;
/// registry.configure()?;
///
/// assert_eq!(registry.relation("User", "addresses")?.strategy(), LoadStrategy::Batch);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: BTreeMap<String, ModelDef>,
    relations: BTreeMap<(String, String), RegisteredRelation>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::DuplicateModel` if the name is taken.
    pub fn register_model(&mut self, model: ModelDef) -> Result<(), LoaderError> {
        if self.models.contains_key(model.name()) {
            return Err(LoaderError::DuplicateModel(model.name().to_string()));
        }
        log::debug!("registered model {} ({})", model.name(), model.table());
        self.models.insert(model.name().to_string(), model);
        Ok(())
    }

    /// Declare a relation; both models must already be registered
    ///
    /// A `LoadStrategy::Batch` relation with an unsupported join shape is refused
    /// and not registered. Other strategies keep the declaration; its shape is
    /// reported by [`configure`](Self::configure) or on first load.
    ///
    /// # Errors
    ///
    /// `LoaderError::UnknownModel`, `LoaderError::DuplicateRelation`,
    /// `LoaderError::UnsupportedRelation`.
    pub fn declare(&mut self, declaration: RelationDeclaration) -> Result<(), LoaderError> {
        let owner = self.model(declaration.owner())?;
        let related = self.model(declaration.related())?;

        let key = (declaration.owner().to_string(), declaration.name().to_string());
        if self.relations.contains_key(&key) {
            return Err(LoaderError::DuplicateRelation {
                model: key.0,
                relation: key.1,
            });
        }

        let descriptor = RelationDescriptor::build(&declaration, owner, related);
        let strategy = declaration.get_strategy();
        if let Validation::Invalid { reason } = descriptor.validation() {
            if strategy == LoadStrategy::Batch {
                return Err(LoaderError::unsupported(declaration.owner(), declaration.name(), reason));
            }
            log::warn!("{} cannot be batch loaded: {}", descriptor.label(), reason);
        }
        self.relations.insert(
            key,
            RegisteredRelation { descriptor, strategy },
        );
        Ok(())
    }

    /// Validate every declared relation
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::UnsupportedRelation` for the first invalid relation,
    /// in `(model, relation)` order.
    pub fn configure(&self) -> Result<(), LoaderError> {
        for registered in self.relations.values() {
            registered.descriptor.shape()?;
        }
        log::info!(
            "configured {} models and {} relations",
            self.models.len(),
            self.relations.len()
        );
        Ok(())
    }

    /// Validate a declaration against the registered models without declaring it
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::UnknownModel` if either model is not registered.
    pub fn validate(&self, declaration: &RelationDeclaration) -> Result<Validation, LoaderError> {
        let owner = self.model(declaration.owner())?;
        let related = self.model(declaration.related())?;
        Ok(validate_declaration(declaration, owner, related))
    }

    /// # Errors
    ///
    /// Returns `LoaderError::UnknownModel` if no model has this name.
    pub fn model(&self, name: &str) -> Result<&ModelDef, LoaderError> {
        self.models
            .get(name)
            .ok_or_else(|| LoaderError::UnknownModel(name.to_string()))
    }

    /// # Errors
    ///
    /// Returns `LoaderError::UnknownRelation` if `model` declares no such relation.
    pub fn relation(&self, model: &str, name: &str) -> Result<&RegisteredRelation, LoaderError> {
        self.relations
            .get(&(model.to_string(), name.to_string()))
            .ok_or_else(|| LoaderError::UnknownRelation {
                model: model.to_string(),
                relation: name.to_string(),
            })
    }

    /// Relations declared on `model`, by name
    pub fn relations_of<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a RegisteredRelation> + 'a {
        self.relations
            .iter()
            .filter(move |((owner, _), _)| owner == model)
            .map(|(_, registered)| registered)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.values()
    }
}
