//! Relation declarations and join-shape validation.
//!
//! A [`RelationDeclaration`] is what an application writes down about a
//! relationship: which models it links, the join predicates, an optional junction
//! table, the ordering and the loading strategy. [`resolve_shape`] decides whether
//! the declared join can be loaded in one batched `IN` query.
//!
//! Supported shapes:
//! - one equality `owner.col = related.col` and no secondary join
//! - a junction table with exactly one equality `owner.col = junction.col` and
//!   exactly one secondary equality `junction.col = related.col`
//!
//! Everything else (composite keys, extra filter predicates, raw SQL conditions)
//! is rejected with a reason.

use crate::model::ModelDef;
use crate::relation::def::{Cardinality, JoinKind, JoinShape, JunctionDef, OrderSpec};
use crate::relation::identity::Identity;
use crate::relation::strategy::LoadStrategy;
use sea_query::Value;
use std::fmt;

/// A table-qualified column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

impl<T: Into<String>, C: Into<String>> From<(T, C)> for ColumnRef {
    fn from((table, column): (T, C)) -> Self {
        Self::new(table, column)
    }
}

/// Comparison operator of a literal filter predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One conjunct of a join condition
#[derive(Debug, Clone, PartialEq)]
pub enum JoinPredicate {
    /// `local = remote`; `local` is the side nearer the owner
    Eq { local: ColumnRef, remote: ColumnRef },
    /// `column <op> value`
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Value,
    },
    /// Raw SQL condition
    Custom(String),
}

impl JoinPredicate {
    pub fn eq(local: impl Into<ColumnRef>, remote: impl Into<ColumnRef>) -> Self {
        JoinPredicate::Eq {
            local: local.into(),
            remote: remote.into(),
        }
    }

    pub fn compare(column: impl Into<ColumnRef>, op: CompareOp, value: impl Into<Value>) -> Self {
        JoinPredicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }
}

/// Outcome of validating a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid { reason: String },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// A relationship as declared on its owning model
///
/// # Example
///
/// ```
/// use lifeguard_bulk::{LoadStrategy, OrderSpec, RelationDeclaration};
///
/// let addresses = RelationDeclaration::new("User", "addresses", "Address")
///     .join_on(("users", "id"), ("addresses", "user_id"))
///     .order_by(OrderSpec::desc("email_address"))
///     .strategy(LoadStrategy::Batch);
/// assert_eq!(addresses.name(), "addresses");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDeclaration {
    owner: String,
    name: String,
    related: String,
    primary_join: Vec<JoinPredicate>,
    junction: Option<String>,
    secondary_join: Vec<JoinPredicate>,
    cardinality: Option<Cardinality>,
    order_by: Vec<OrderSpec>,
    strategy: LoadStrategy,
}

impl RelationDeclaration {
    /// Declare relation `name` on model `owner`, targeting model `related`
    pub fn new(owner: impl Into<String>, name: impl Into<String>, related: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            related: related.into(),
            primary_join: Vec::new(),
            junction: None,
            secondary_join: Vec::new(),
            cardinality: None,
            order_by: Vec::new(),
            strategy: LoadStrategy::Default,
        }
    }

    /// Add `local = remote` to the primary join
    pub fn join_on(self, local: impl Into<ColumnRef>, remote: impl Into<ColumnRef>) -> Self {
        self.primary_join(JoinPredicate::eq(local, remote))
    }

    /// Add a predicate to the primary join
    pub fn primary_join(mut self, predicate: JoinPredicate) -> Self {
        self.primary_join.push(predicate);
        self
    }

    /// Route the relation through junction table `table`
    pub fn through(mut self, table: impl Into<String>) -> Self {
        self.junction = Some(table.into());
        self
    }

    /// Add `junction_column = related_column` to the secondary join
    pub fn secondary_join_on(self, junction_column: impl Into<ColumnRef>, related_column: impl Into<ColumnRef>) -> Self {
        self.secondary_join(JoinPredicate::eq(junction_column, related_column))
    }

    /// Add a predicate to the secondary join
    pub fn secondary_join(mut self, predicate: JoinPredicate) -> Self {
        self.secondary_join.push(predicate);
        self
    }

    /// `uselist = false` forces a single-valued relation, `true` a collection
    pub fn uselist(mut self, uselist: bool) -> Self {
        self.cardinality = Some(if uselist { Cardinality::Many } else { Cardinality::One });
        self
    }

    pub fn one(self) -> Self {
        self.uselist(false)
    }

    pub fn many(self) -> Self {
        self.uselist(true)
    }

    /// Append an ordering term (columns of the related table)
    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for `strategy(LoadStrategy::Batch)`
    pub fn bulk(self) -> Self {
        self.strategy(LoadStrategy::Batch)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn related(&self) -> &str {
        &self.related
    }

    pub fn primary_predicates(&self) -> &[JoinPredicate] {
        &self.primary_join
    }

    pub fn junction(&self) -> Option<&str> {
        self.junction.as_deref()
    }

    pub fn secondary_predicates(&self) -> &[JoinPredicate] {
        &self.secondary_join
    }

    /// Explicit cardinality, if one was declared
    pub fn cardinality(&self) -> Option<Cardinality> {
        self.cardinality
    }

    pub fn get_order_by(&self) -> &[OrderSpec] {
        &self.order_by
    }

    pub fn get_strategy(&self) -> LoadStrategy {
        self.strategy
    }
}

/// Check whether `declaration` can be batch loaded
///
/// # Example
///
/// ```
/// use lifeguard_bulk::{ModelDef, RelationDeclaration, validate_declaration};
///
/// let multi_fk = ModelDef::new("MultiFk", "multi_fk", "id");
/// let multi_pk = ModelDef::new("MultiPk", "multi_pk", ["id", "name"]);
/// let decl = RelationDeclaration::new("MultiFk", "multi_pks", "MultiPk")
///     .join_on(("multi_fk", "pk_id"), ("multi_pk", "id"))
///     .join_on(("multi_fk", "pk_name"), ("multi_pk", "name"));
///
/// assert!(!validate_declaration(&decl, &multi_fk, &multi_pk).is_valid());
/// ```
pub fn validate_declaration(declaration: &RelationDeclaration, owner: &ModelDef, related: &ModelDef) -> Validation {
    match resolve_shape(declaration, owner, related) {
        Ok(_) => Validation::Valid,
        Err(reason) => Validation::Invalid { reason },
    }
}

/// Resolve the join shape of `declaration`, or the reason it is unsupported
pub(crate) fn resolve_shape(
    declaration: &RelationDeclaration,
    owner: &ModelDef,
    related: &ModelDef,
) -> Result<JoinShape, String> {
    let (local, remote) = single_equality(&declaration.primary_join, "primary")?;
    expect_table(local, owner.table(), "primary join local side")?;

    match &declaration.junction {
        None => {
            if !declaration.secondary_join.is_empty() {
                return Err("secondary join declared without a junction table".to_string());
            }
            expect_table(remote, related.table(), "primary join remote side")?;

            let remote_is_primary_key = related.primary_key().as_unary() == Some(remote.column.as_str());
            let kind = if remote_is_primary_key {
                JoinKind::DirectKey
            } else {
                JoinKind::ReverseKey
            };
            Ok(JoinShape {
                kind,
                local_key: Identity::Unary(local.column.clone()),
                remote_key: Identity::Unary(remote.column.clone()),
                junction: None,
                remote_is_primary_key,
            })
        }
        Some(junction) => {
            expect_table(remote, junction, "primary join remote side")?;
            let (junction_side, related_side) = single_equality(&declaration.secondary_join, "secondary")?;
            expect_table(junction_side, junction, "secondary join local side")?;
            expect_table(related_side, related.table(), "secondary join remote side")?;

            Ok(JoinShape {
                kind: JoinKind::Junction,
                local_key: Identity::Unary(local.column.clone()),
                remote_key: Identity::Unary(remote.column.clone()),
                junction: Some(JunctionDef {
                    table: junction.clone(),
                    owner_column: remote.column.clone(),
                    related_column: junction_side.column.clone(),
                    related_key: related_side.column.clone(),
                }),
                remote_is_primary_key: false,
            })
        }
    }
}

fn single_equality<'a>(predicates: &'a [JoinPredicate], which: &str) -> Result<(&'a ColumnRef, &'a ColumnRef), String> {
    match predicates {
        [] => Err(format!("{which} join has no condition")),
        [JoinPredicate::Eq { local, remote }] => Ok((local, remote)),
        [JoinPredicate::Compare { column, .. }] => {
            Err(format!("{which} join filters {column} instead of equating two columns"))
        }
        [JoinPredicate::Custom(sql)] => Err(format!("{which} join is a custom condition: {sql}")),
        many if many.iter().all(|p| matches!(p, JoinPredicate::Eq { .. })) => Err(format!(
            "{which} join spans {} column pairs; composite keys are not supported",
            many.len()
        )),
        _ => Err(format!("{which} join combines a key equality with custom predicates")),
    }
}

fn expect_table(column: &ColumnRef, table: &str, side: &str) -> Result<(), String> {
    if column.table == table {
        Ok(())
    } else {
        Err(format!("{side} {column} does not belong to table '{table}'"))
    }
}
