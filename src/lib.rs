//! # Lifeguard Bulk
//!
//! Batched lazy relation loading for Lifeguard models on the `may` runtime.
//!
//! Accessing an unloaded relation on one entity loads it for every sibling of
//! that entity in the same unit of work with a single query, instead of one
//! query per entity (the N+1 pattern).
//!
//! See [README on GitHub](https://github.com/microscaler/lifeguard) for full architecture.

pub mod config;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod loader;
#[cfg(feature = "metrics")]
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;
pub mod registry;
pub mod relation;
pub mod session;
pub mod value;

pub use config::{DatabaseConfig, LoaderConfig};
pub use error::LoaderError;
pub use executor::{LifeError, LifeExecutor, MayPostgresExecutor};
pub use fetch::{OwnerFilter, OwnerQuery, PostgresFetcher, RelationFetcher, ResultRow};
pub use loader::{BatchQuery, BatchReport, BulkLoader};
pub use model::{Entity, EntityId, IdentityKey, ModelDef, Record, RelationValue};
pub use registry::{RegisteredRelation, Registry};
pub use relation::{
    validate_declaration, Cardinality, ColumnRef, CompareOp, Direction, Identity, JoinKind, JoinPredicate,
    LazyLoader, LoadStrategy, OrderSpec, RelationDeclaration, RelationDescriptor, RelationLoader, Validation,
};
pub use session::{IdentityMap, UnitOfWork, WorkingSet};
pub use value::KeyValue;
