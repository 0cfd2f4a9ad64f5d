//! Batched relation loading.
//!
//! When an unresolved relation is accessed on one entity, the loader resolves it
//! for that entity and every sibling in the same working set:
//!
//! 1. [`collector`] gathers the unresolved siblings and their local keys
//! 2. [`planner`] turns the distinct keys into one [`BatchQuery`]
//! 3. the [`RelationFetcher`](crate::fetch::RelationFetcher) runs it
//! 4. [`distributor`] routes the rows back and commits every owner's value
//!
//! The number of queries per access is therefore one (zero when every key is
//! `NULL` or already tracked), whatever the number of siblings.

pub mod bulk;
pub mod collector;
pub mod distributor;
pub mod planner;

#[doc(inline)]
pub use bulk::{load_batch, BulkLoader};
#[doc(inline)]
pub use collector::{collect_siblings, owner_keys, OwnerKey};
#[doc(inline)]
pub use distributor::{distribute, BatchReport};
#[doc(inline)]
pub use planner::{plan, BatchQuery, JunctionHop, BATCH_KEY_ALIAS};
