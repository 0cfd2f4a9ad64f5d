//! RelationDescriptor struct for storing relationship metadata
//!
//! A `RelationDescriptor` is built once from a [`RelationDeclaration`] when the
//! relation is declared, and is shared read-only by every entity of the owning
//! model afterwards. Declarations whose join shape cannot be batch loaded still
//! produce a descriptor, but an invalid one: any attempt to load through it fails
//! with `LoaderError::UnsupportedRelation`.

use crate::error::LoaderError;
use crate::model::ModelDef;
use crate::relation::declaration::{resolve_shape, RelationDeclaration, Validation};
use crate::relation::identity::Identity;

/// Whether a relation yields one related entity or a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    One,
    Many,
}

/// How the owner's key reaches the related table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// The owner holds the foreign key; the remote key is the related primary key
    /// (many-to-one, `belongs_to`)
    DirectKey,
    /// The related table holds a foreign key to the owner (one-to-many, one-to-one)
    ReverseKey,
    /// Owner and related rows are linked through a junction table (many-to-many)
    Junction,
}

/// Sort direction of an ordering term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl From<Direction> for sea_query::Order {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => sea_query::Order::Asc,
            Direction::Desc => sea_query::Order::Desc,
        }
    }
}

/// One ordering term on a column of the related table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderSpec {
    pub column: String,
    pub direction: Direction,
}

impl OrderSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// The junction hop of a many-to-many relation
///
/// For `users ⇄ user_to_things ⇄ things`:
/// `table = "user_to_things"`, `owner_column = "user_id"`,
/// `related_column = "thing_id"`, `related_key = "id"` (on `things`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JunctionDef {
    /// Junction table name
    pub table: String,
    /// Junction column matching the owner's local key
    pub owner_column: String,
    /// Junction column matching the related table's key
    pub related_column: String,
    /// Related table column referenced by `related_column`
    pub related_key: String,
}

/// Resolved join shape of a valid relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinShape {
    pub kind: JoinKind,
    /// Owner column whose value keys the batch
    pub local_key: Identity,
    /// Column matched against the local key values: on the related table for
    /// direct/reverse joins, on the junction table for junction joins
    pub remote_key: Identity,
    pub junction: Option<JunctionDef>,
    /// The remote key is the related model's primary key, so matches can be
    /// found in the identity map without a query
    pub remote_is_primary_key: bool,
}

/// Immutable description of one relationship
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDescriptor {
    owner: String,
    owner_table: String,
    name: String,
    related: String,
    related_table: String,
    cardinality: Cardinality,
    order_by: Vec<OrderSpec>,
    shape: Result<JoinShape, String>,
}

impl RelationDescriptor {
    /// Build the descriptor for `declaration`, validating its join shape
    ///
    /// `owner` and `related` are the models named by the declaration.
    ///
    /// # Example
    ///
    /// ```
    /// use lifeguard_bulk::{Cardinality, JoinKind, ModelDef, RelationDeclaration, RelationDescriptor};
    ///
    /// let user = ModelDef::new("User", "users", "id");
    /// let address = ModelDef::new("Address", "addresses", "id");
    /// let decl = RelationDeclaration::new("User", "addresses", "Address")
    ///     .join_on(("users", "id"), ("addresses", "user_id"));
    ///
    /// let descriptor = RelationDescriptor::build(&decl, &user, &address);
    /// assert!(descriptor.is_valid());
    /// assert_eq!(descriptor.join_kind(), Some(JoinKind::ReverseKey));
    /// assert_eq!(descriptor.cardinality(), Cardinality::Many);
    /// ```
    pub fn build(declaration: &RelationDeclaration, owner: &ModelDef, related: &ModelDef) -> Self {
        let shape = resolve_shape(declaration, owner, related);
        let cardinality = declaration.cardinality().unwrap_or(match &shape {
            Ok(JoinShape {
                kind: JoinKind::DirectKey,
                ..
            }) => Cardinality::One,
            _ => Cardinality::Many,
        });

        Self {
            owner: owner.name().to_string(),
            owner_table: owner.table().to_string(),
            name: declaration.name().to_string(),
            related: related.name().to_string(),
            related_table: related.table().to_string(),
            cardinality,
            order_by: declaration.get_order_by().to_vec(),
            shape,
        }
    }

    /// Owning model name
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn owner_table(&self) -> &str {
        &self.owner_table
    }

    /// Relation name on the owning model
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Related model name
    pub fn related(&self) -> &str {
        &self.related
    }

    pub fn related_table(&self) -> &str {
        &self.related_table
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn order_by(&self) -> &[OrderSpec] {
        &self.order_by
    }

    pub fn is_valid(&self) -> bool {
        self.shape.is_ok()
    }

    pub fn validation(&self) -> Validation {
        match &self.shape {
            Ok(_) => Validation::Valid,
            Err(reason) => Validation::Invalid {
                reason: reason.clone(),
            },
        }
    }

    /// The join shape, or `UnsupportedRelation` when the declaration was rejected
    pub fn shape(&self) -> Result<&JoinShape, LoaderError> {
        self.shape
            .as_ref()
            .map_err(|reason| LoaderError::unsupported(&self.owner, &self.name, reason.clone()))
    }

    pub fn join_kind(&self) -> Option<JoinKind> {
        self.shape.as_ref().ok().map(|shape| shape.kind)
    }

    /// Owner column keying the batch (valid relations only)
    pub fn local_column(&self) -> Option<&str> {
        self.shape.as_ref().ok().and_then(|shape| shape.local_key.as_unary())
    }

    /// Whether `other` describes the same relation (same owning model and name)
    pub fn same_relation(&self, other: &RelationDescriptor) -> bool {
        self.owner == other.owner && self.name == other.name
    }

    /// `Owner.relation` label used in logs
    pub fn label(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}
