//! Batch query planning.
//!
//! Turns a relation descriptor plus the key values of a sibling batch into one
//! [`BatchQuery`]: a single `SELECT` over the related table restricted by
//! `key IN (...)`, joined through the junction table for many-to-many relations.
//! Every row carries the matched owner-side key under [`BATCH_KEY_ALIAS`] so the
//! distributor can route it back to its owners.

use crate::error::LoaderError;
use crate::relation::def::{JoinKind, OrderSpec, RelationDescriptor};
use crate::relation::declaration::ColumnRef;
use crate::value::KeyValue;
use sea_query::{Asterisk, Expr, ExprTrait, Iden, PostgresQueryBuilder, Query, SelectStatement, Value, Values};
use std::collections::HashSet;

/// Column alias carrying the join key of each fetched row
pub const BATCH_KEY_ALIAS: &str = "__batch_key";

/// Runtime table or column name
#[derive(Debug, Clone)]
pub(crate) struct SqlName(String);

impl SqlName {
    pub(crate) fn new(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl Iden for SqlName {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// Junction hop of a many-to-many batch query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionHop {
    pub table: String,
    /// Junction column referencing the related table
    pub related_column: String,
    /// Related table column it references
    pub related_key: String,
}

/// One batched related-row query
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuery {
    relation: String,
    related_table: String,
    key_column: ColumnRef,
    keys: Vec<KeyValue>,
    values: Vec<Value>,
    junction: Option<JunctionHop>,
    order_by: Vec<OrderSpec>,
}

impl BatchQuery {
    /// `Owner.relation` label
    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn related_table(&self) -> &str {
        &self.related_table
    }

    /// Column matched against the keys (related table, or junction table)
    pub fn key_column(&self) -> &ColumnRef {
        &self.key_column
    }

    /// Distinct key values, in first-seen order
    pub fn keys(&self) -> &[KeyValue] {
        &self.keys
    }

    /// Values bound for [`keys`](Self::keys), as read from the first owner of each key
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn junction(&self) -> Option<&JunctionHop> {
        self.junction.as_ref()
    }

    pub fn order_by(&self) -> &[OrderSpec] {
        &self.order_by
    }

    pub fn to_statement(&self) -> SelectStatement {
        let related = SqlName::new(&self.related_table);
        let mut select = Query::select();
        select
            .column((related.clone(), Asterisk))
            .expr_as(
                Expr::col((SqlName::new(&self.key_column.table), SqlName::new(&self.key_column.column))),
                SqlName::new(BATCH_KEY_ALIAS),
            )
            .from(related.clone());

        if let Some(hop) = &self.junction {
            select.inner_join(
                SqlName::new(&hop.table),
                Expr::col((SqlName::new(&hop.table), SqlName::new(&hop.related_column)))
                    .equals((related.clone(), SqlName::new(&hop.related_key))),
            );
        }

        select.and_where(
            Expr::col((SqlName::new(&self.key_column.table), SqlName::new(&self.key_column.column)))
                .is_in(self.values.iter().cloned()),
        );

        for order in &self.order_by {
            select.order_by((related.clone(), SqlName::new(&order.column)), order.direction.into());
        }
        select
    }

    /// Render to PostgreSQL with bound parameters
    pub fn to_sql(&self) -> (String, Values) {
        self.to_statement().build(PostgresQueryBuilder)
    }
}

/// Plan the batch query for the owner key `values`
///
/// Values are deduplicated on their [`KeyValue`], keeping the first occurrence;
/// `NULL`s and values that cannot act as a key are dropped. The kept values are
/// bound unchanged. Returns `Ok(None)` when no key remains, in which case no query
/// must be issued.
///
/// # Errors
///
/// Returns `LoaderError::UnsupportedRelation` for an invalid descriptor.
pub fn plan<I, V>(descriptor: &RelationDescriptor, values: I) -> Result<Option<BatchQuery>, LoaderError>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let shape = descriptor.shape()?;

    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    let mut bound = Vec::new();
    for value in values {
        let value = value.into();
        let Some(key) = KeyValue::from_value(&value) else {
            continue;
        };
        if seen.insert(key.clone()) {
            keys.push(key);
            bound.push(value);
        }
    }
    if keys.is_empty() {
        return Ok(None);
    }

    let remote = shape
        .remote_key
        .as_unary()
        .ok_or_else(|| LoaderError::unsupported(descriptor.owner(), descriptor.name(), "composite remote key"))?;

    let (key_column, junction) = match (shape.kind, &shape.junction) {
        (JoinKind::Junction, Some(junction)) => (
            ColumnRef::new(&junction.table, &junction.owner_column),
            Some(JunctionHop {
                table: junction.table.clone(),
                related_column: junction.related_column.clone(),
                related_key: junction.related_key.clone(),
            }),
        ),
        (JoinKind::Junction, None) => {
            return Err(LoaderError::unsupported(
                descriptor.owner(),
                descriptor.name(),
                "junction relation without a junction table",
            ))
        }
        (JoinKind::DirectKey | JoinKind::ReverseKey, _) => (ColumnRef::new(descriptor.related_table(), remote), None),
    };

    Ok(Some(BatchQuery {
        relation: descriptor.label(),
        related_table: descriptor.related_table().to_string(),
        key_column,
        keys,
        values: bound,
        junction,
        order_by: descriptor.order_by().to_vec(),
    }))
}
