//! The bulk loader: one query per relation access, for every sibling at once.

use crate::error::LoaderError;
use crate::loader::collector::{collect_siblings, owner_keys, OwnerKey};
use crate::loader::distributor::{commit, distribute, into_value, BatchReport};
use crate::loader::planner::plan;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
use crate::model::{EntityId, IdentityKey, RelationValue};
use crate::relation::def::RelationDescriptor;
use crate::relation::strategy::{LoadContext, LoadOutcome, RelationLoader};
use crate::session::WorkingSet;
use crate::value::KeyValue;
use sea_query::Value;

/// Loader for `LoadStrategy::Batch` relations
///
/// Accessing the relation on one entity resolves it on the entity and on all of
/// its unresolved siblings with a single fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkLoader;

impl RelationLoader for BulkLoader {
    fn load(&self, ctx: &mut LoadContext<'_>, trigger: EntityId) -> Result<LoadOutcome, LoaderError> {
        ctx.descriptor.shape()?;

        let siblings = collect_siblings(&*ctx.working_set, ctx.descriptor, trigger, ctx.config)?;
        let report = load_batch(ctx, &siblings)?;
        let value = resolved_value(&*ctx.working_set, ctx.descriptor, trigger)?;
        Ok(LoadOutcome {
            value,
            report: Some(report),
        })
    }
}

/// Resolve `ctx.descriptor` for exactly `owners`
///
/// Reads each owner's key, resolves direct-key targets that are already tracked,
/// fetches the rest with one query and distributes the rows. On a fetch failure
/// the error is returned and no owner is marked resolved.
///
/// # Errors
///
/// `LoaderError::UnsupportedRelation`, `LoaderError::MissingKey`,
/// `LoaderError::DataAccess`.
pub fn load_batch(ctx: &mut LoadContext<'_>, owners: &[EntityId]) -> Result<BatchReport, LoaderError> {
    let descriptor = ctx.descriptor;
    let registry = ctx.registry;
    let shape = descriptor.shape()?;
    let related = registry.model(descriptor.related())?;
    let mut report = BatchReport::new(descriptor.label());

    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("lifeguard_bulk.batch", relation = %report.relation, owners = owners.len()).entered();

    let keyed = owner_keys(&*ctx.working_set, descriptor, owners)?;

    let shortcut = ctx.config.resolve_from_identity_map && shape.remote_is_primary_key;
    let mut local: Vec<(EntityId, RelationValue)> = Vec::new();
    let mut to_fetch: Vec<(EntityId, Option<KeyValue>)> = Vec::with_capacity(keyed.len());
    let mut bind: Vec<Value> = Vec::with_capacity(keyed.len());
    for OwnerKey { owner, key, value } in keyed {
        let tracked = match (&key, shortcut) {
            (Some(key), true) => ctx
                .working_set
                .lookup(&IdentityKey::new(related.name(), vec![key.clone()])),
            _ => None,
        };
        match tracked {
            Some(target) => local.push((owner, into_value(descriptor, owner, vec![target], ctx.config))),
            None => {
                bind.extend(value);
                to_fetch.push((owner, key));
            }
        }
    }

    let rows = match plan(descriptor, bind)? {
        Some(query) => {
            report.keys = query.keys().len();
            report.queried = true;
            log::debug!(
                "{}: fetching {} keys for {} owners ({} resolved locally)",
                report.relation,
                report.keys,
                to_fetch.len(),
                local.len()
            );

            #[cfg(feature = "metrics")]
            let started = std::time::Instant::now();
            let rows = ctx.fetcher.fetch_batch(&query)?;
            #[cfg(feature = "metrics")]
            METRICS.record_fetch(started.elapsed());
            rows
        }
        None => {
            log::debug!("{}: no keys to fetch for {} owners", report.relation, to_fetch.len());
            Vec::new()
        }
    };

    report.from_identity_map = local.len();
    for (owner, value) in local {
        commit(&mut *ctx.working_set, descriptor, owner, value, &mut report);
    }
    distribute(&mut *ctx.working_set, descriptor, related, &to_fetch, rows, ctx.config, &mut report)?;

    #[cfg(feature = "metrics")]
    METRICS.record_batch(&report.relation, report.owners, report.orphan_rows);
    Ok(report)
}

/// The committed value of `descriptor` on `id`
pub(crate) fn resolved_value(
    working_set: &dyn WorkingSet,
    descriptor: &RelationDescriptor,
    id: EntityId,
) -> Result<RelationValue, LoaderError> {
    working_set
        .entity(id)
        .and_then(|entity| entity.relation(descriptor.name()))
        .cloned()
        .ok_or(LoaderError::UnknownEntity(id))
}
