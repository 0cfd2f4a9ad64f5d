//! The unit of work: one working set plus the machinery to resolve relations on it.

use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::fetch::{OwnerQuery, RelationFetcher};
use crate::loader::{load_batch, BatchReport};
use crate::model::{Entity, EntityId, Record, RelationValue};
use crate::registry::Registry;
use crate::relation::strategy::LoadContext;
use crate::session::{IdentityMap, WorkingSet};

/// One unit of work over a [`Registry`]
///
/// Entities loaded through a unit of work are siblings of each other; batch
/// loading never crosses into another unit of work. A unit of work is meant to be
/// used from one coroutine at a time, which is what `&mut self` on every loading
/// method enforces.
///
/// # Example
///
/// ```no_run
/// use lifeguard_bulk::{
///     DatabaseConfig, MayPostgresExecutor, ModelDef, OwnerQuery, PostgresFetcher, Registry,
///     RelationDeclaration, UnitOfWork,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut registry = Registry::new();
/// registry.register_model(ModelDef::new("User", "users", "id"))?;
/// registry.register_model(ModelDef::new("Address", "addresses", "id"))?;
/// registry.declare(
///     RelationDeclaration::new("User", "addresses", "Address")
///         .join_on(("users", "id"), ("addresses", "user_id"))
///         .bulk(),
/// )?;
/// registry.configure()?;
///
/// let executor = MayPostgresExecutor::connect(&DatabaseConfig::load()?)?;
/// let fetcher = PostgresFetcher::new(&executor);
/// let mut uow = UnitOfWork::new(&registry, &fetcher);
///
/// let users = uow.load("User", OwnerQuery::new("users"))?;
/// // one query for the addresses of every loaded user
/// let addresses = uow.get_relation(users[0], "addresses")?;
/// # Ok(())
/// # }
/// ```
pub struct UnitOfWork<'a> {
    registry: &'a Registry,
    fetcher: &'a dyn RelationFetcher,
    config: LoaderConfig,
    working_set: IdentityMap,
    reports: Vec<BatchReport>,
}

impl<'a> UnitOfWork<'a> {
    pub fn new(registry: &'a Registry, fetcher: &'a dyn RelationFetcher) -> Self {
        Self::with_config(registry, fetcher, LoaderConfig::default())
    }

    pub fn with_config(registry: &'a Registry, fetcher: &'a dyn RelationFetcher, config: LoaderConfig) -> Self {
        Self {
            registry,
            fetcher,
            config,
            working_set: IdentityMap::new(),
            reports: Vec::new(),
        }
    }

    /// Run `query` for `model` and track the returned rows
    ///
    /// Relations declared `EagerJoin` or `EagerSubquery` are resolved for the
    /// loaded entities right away, one batch per relation. Returns the handles in
    /// row order, without duplicates.
    ///
    /// # Errors
    ///
    /// `LoaderError::UnknownModel`, `LoaderError::DataAccess`,
    /// `LoaderError::MissingKey`, or any error of an eager relation.
    pub fn load(&mut self, model: &str, query: OwnerQuery) -> Result<Vec<EntityId>, LoaderError> {
        let registry = self.registry;
        let def = registry.model(model)?;
        if query.table() != def.table() {
            log::warn!("loading {} from table '{}' instead of '{}'", model, query.table(), def.table());
        }

        let records = self.fetcher.fetch_owners(&query)?;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = self.working_set.merge_loaded(def, record)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        log::debug!("loaded {} {} entities", ids.len(), model);

        for registered in registry.relations_of(model).filter(|r| r.strategy().is_eager()) {
            let descriptor = registered.descriptor();
            let owners: Vec<EntityId> = ids
                .iter()
                .copied()
                .filter(|id| {
                    self.working_set
                        .entity(*id)
                        .is_some_and(|entity| !entity.is_resolved(descriptor.name()))
                })
                .collect();
            if owners.is_empty() {
                continue;
            }

            let mut ctx = LoadContext {
                working_set: &mut self.working_set,
                fetcher: self.fetcher,
                registry,
                descriptor,
                config: &self.config,
            };
            let report = load_batch(&mut ctx, &owners)?;
            self.reports.push(report);
        }
        Ok(ids)
    }

    /// Every row of `model`'s table
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_all(&mut self, model: &str) -> Result<Vec<EntityId>, LoaderError> {
        let table = self.registry.model(model)?.table().to_string();
        self.load(model, OwnerQuery::new(table))
    }

    /// Track an already persisted row without querying
    ///
    /// # Errors
    ///
    /// `LoaderError::UnknownModel`, `LoaderError::MissingKey`.
    pub fn track(&mut self, model: &str, record: Record) -> Result<EntityId, LoaderError> {
        let def = self.registry.model(model)?;
        self.working_set.merge_loaded(def, record)
    }

    /// Add a new, not yet persisted entity
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::UnknownModel` if `model` is not registered.
    pub fn add(&mut self, model: &str, record: Record) -> Result<EntityId, LoaderError> {
        let def = self.registry.model(model)?;
        Ok(self.working_set.add_pending(def, record))
    }

    /// Value of `relation` on `id`, loading it on first access
    ///
    /// An already resolved relation is returned as is, without any query. An
    /// unresolved one is handed to the loader of its strategy; for
    /// `LoadStrategy::Batch` this resolves the relation on every unresolved
    /// sibling of `id` as well.
    ///
    /// # Errors
    ///
    /// `LoaderError::UnknownEntity`, `LoaderError::UnknownRelation`,
    /// `LoaderError::UnsupportedRelation`, `LoaderError::DataAccess`.
    pub fn get_relation(&mut self, id: EntityId, relation: &str) -> Result<RelationValue, LoaderError> {
        let registry = self.registry;
        let entity = self.working_set.entity(id).ok_or(LoaderError::UnknownEntity(id))?;
        if let Some(value) = entity.relation(relation) {
            return Ok(value.clone());
        }
        let registered = registry.relation(entity.model(), relation)?;

        let mut ctx = LoadContext {
            working_set: &mut self.working_set,
            fetcher: self.fetcher,
            registry,
            descriptor: registered.descriptor(),
            config: &self.config,
        };
        let outcome = registered.strategy().loader().load(&mut ctx, id)?;
        if let Some(report) = outcome.report {
            self.reports.push(report);
        }
        Ok(outcome.value)
    }

    /// Entities of `relation` on `id`, loading it on first access
    ///
    /// # Errors
    ///
    /// See [`get_relation`](Self::get_relation).
    pub fn related(&mut self, id: EntityId, relation: &str) -> Result<Vec<&Entity>, LoaderError> {
        let value = self.get_relation(id, relation)?;
        Ok(value
            .ids()
            .iter()
            .filter_map(|related| self.working_set.entity(*related))
            .collect())
    }

    /// Set a relation value directly, without loading and without marking
    /// anything else
    ///
    /// # Errors
    ///
    /// `LoaderError::UnknownEntity`, `LoaderError::UnknownRelation`.
    pub fn set_committed_value(&mut self, id: EntityId, relation: &str, value: RelationValue) -> Result<(), LoaderError> {
        let entity = self.working_set.entity(id).ok_or(LoaderError::UnknownEntity(id))?;
        self.registry.relation(entity.model(), relation)?;
        if self.working_set.set_committed_value(id, relation, value) {
            Ok(())
        } else {
            Err(LoaderError::UnknownEntity(id))
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.working_set.entity(id)
    }

    /// Tracked entities of `model`, in the order they entered the unit of work
    pub fn entities_of(&self, model: &str) -> Vec<EntityId> {
        self.working_set.entities_of(model)
    }

    /// Stop tracking `id`; it will no longer take part in batches
    pub fn expunge(&mut self, id: EntityId) -> Option<Entity> {
        self.working_set.expunge(id)
    }

    /// Reports of every batch run so far, oldest first
    pub fn reports(&self) -> &[BatchReport] {
        &self.reports
    }

    pub fn working_set(&self) -> &IdentityMap {
        &self.working_set
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}
