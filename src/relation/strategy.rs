//! Loading strategies and the loader interface they dispatch to.
//!
//! Every relation carries a [`LoadStrategy`]. When an unresolved relation is
//! accessed, the unit of work asks the strategy for its [`RelationLoader`] and
//! hands it a [`LoadContext`]. `Batch` maps to the bulk loader, which resolves the
//! relation for every sibling in one query; the other strategies resolve only the
//! accessed entity on access.

use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::fetch::RelationFetcher;
use crate::loader::{BatchReport, BulkLoader};
use crate::model::{EntityId, RelationValue};
use crate::registry::Registry;
use crate::relation::def::RelationDescriptor;
use crate::relation::lazy::LazyLoader;
use crate::session::WorkingSet;

/// How a relation is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadStrategy {
    /// Load on first access, for the accessed entity only
    #[default]
    Default,
    /// Load together with the owners when they are queried
    EagerJoin,
    /// Load with a second query right after the owners are queried
    EagerSubquery,
    /// Load on first access, for the accessed entity and all of its siblings
    Batch,
}

impl LoadStrategy {
    /// Whether the relation is loaded while its owners are being loaded
    pub fn is_eager(self) -> bool {
        matches!(self, LoadStrategy::EagerJoin | LoadStrategy::EagerSubquery)
    }

    /// The loader used when an unresolved relation with this strategy is accessed
    pub fn loader(self) -> &'static dyn RelationLoader {
        match self {
            LoadStrategy::Batch => &BulkLoader,
            LoadStrategy::Default | LoadStrategy::EagerJoin | LoadStrategy::EagerSubquery => &LazyLoader,
        }
    }
}

/// Everything a loader may touch while resolving one relation
pub struct LoadContext<'a> {
    pub working_set: &'a mut dyn WorkingSet,
    pub fetcher: &'a dyn RelationFetcher,
    pub registry: &'a Registry,
    pub descriptor: &'a RelationDescriptor,
    pub config: &'a LoaderConfig,
}

/// Value produced for the triggering entity
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub value: RelationValue,
    /// Batch statistics, `None` when the value came without running the batch pipeline
    pub report: Option<BatchReport>,
}

/// Resolves an unresolved relation on first access
pub trait RelationLoader: Sync {
    /// Resolve the relation for `trigger` (and whatever else the loader chooses)
    ///
    /// # Errors
    ///
    /// `LoaderError::UnsupportedRelation` for invalid descriptors,
    /// `LoaderError::DataAccess` when the fetch fails.
    fn load(&self, ctx: &mut LoadContext<'_>, trigger: EntityId) -> Result<LoadOutcome, LoaderError>;
}
