//! Per-entity lazy loading.
//!
//! The default strategy: the relation is resolved on first access for the
//! accessed entity only, with its own query. Accessing the same relation on `N`
//! entities therefore costs `N` queries; declare the relation with
//! `LoadStrategy::Batch` to resolve all siblings at once instead.
//!
//! # Example
//!
//! ```
//! use lifeguard_bulk::{LoadStrategy, RelationDeclaration};
//!
//! // Lazy (one query per accessed user)
//! let lazy = RelationDeclaration::new("User", "addresses", "Address")
//!     .join_on(("users", "id"), ("addresses", "user_id"));
//! assert_eq!(lazy.get_strategy(), LoadStrategy::Default);
//!
//! // Batched (one query for every loaded user)
//! let batched = lazy.clone().strategy(LoadStrategy::Batch);
//! assert_eq!(batched.get_strategy(), LoadStrategy::Batch);
//! ```

use crate::error::LoaderError;
use crate::loader::bulk::{load_batch, resolved_value};
use crate::model::EntityId;
use crate::relation::strategy::{LoadContext, LoadOutcome, RelationLoader};

/// Loader that resolves a relation for the triggering entity only
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyLoader;

impl RelationLoader for LazyLoader {
    fn load(&self, ctx: &mut LoadContext<'_>, trigger: EntityId) -> Result<LoadOutcome, LoaderError> {
        if ctx.working_set.entity(trigger).is_none() {
            return Err(LoaderError::UnknownEntity(trigger));
        }
        log::trace!("{}: lazy load for {}", ctx.descriptor.label(), trigger);

        let report = load_batch(ctx, &[trigger])?;
        let value = resolved_value(&*ctx.working_set, ctx.descriptor, trigger)?;
        Ok(LoadOutcome {
            value,
            report: Some(report),
        })
    }
}
