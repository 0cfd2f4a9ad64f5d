//! Relation module for entity relationships.
//!
//! This module describes relationships between models and how they are loaded:
//! - many-to-one (`Address.user`): the owner holds the foreign key
//! - one-to-many / one-to-one (`User.addresses`, `User.user_info`): the related
//!   table holds the foreign key
//! - many-to-many (`User.things`): linked through a junction table
//!
//! # Architecture
//!
//! - **Declaration**: what the application declares (`RelationDeclaration`) and
//!   the validation of its join shape
//! - **Def**: the immutable `RelationDescriptor` built from a declaration
//! - **Identity**: single and composite column sets
//! - **Strategy**: `LoadStrategy` and the loaders it dispatches to

// Identity types
pub mod identity;
#[doc(inline)]
pub use identity::Identity;

// Declarations and validation
pub mod declaration;
#[doc(inline)]
pub use declaration::{validate_declaration, ColumnRef, CompareOp, JoinPredicate, RelationDeclaration, Validation};

// Descriptors
pub mod def;
#[doc(inline)]
pub use def::{Cardinality, Direction, JoinKind, JoinShape, JunctionDef, OrderSpec, RelationDescriptor};

// Loading strategies
pub mod strategy;
#[doc(inline)]
pub use strategy::{LoadContext, LoadOutcome, LoadStrategy, RelationLoader};

pub mod lazy;
#[doc(inline)]
pub use lazy::LazyLoader;
