//! Data access seam of the loader.
//!
//! The loader never talks to a database directly. Owner queries and batch
//! queries go through a [`RelationFetcher`]; [`PostgresFetcher`] renders them
//! with SeaQuery and runs them on a [`LifeExecutor`](crate::LifeExecutor).

pub mod postgres;

#[doc(inline)]
pub use postgres::PostgresFetcher;

use crate::executor::LifeError;
use crate::loader::planner::{BatchQuery, SqlName};
use crate::model::Record;
use crate::relation::def::OrderSpec;
use crate::value::KeyValue;
use sea_query::{ExprTrait, Expr, PostgresQueryBuilder, Query, SelectStatement, Value, Values};

/// One fetched related row
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Join key value the row matched (the owner-side key), `None` if `NULL`
    pub join_key: Option<KeyValue>,
    /// Columns of the related table
    pub record: Record,
}

impl ResultRow {
    pub fn new(join_key: Option<KeyValue>, record: Record) -> Self {
        Self { join_key, record }
    }
}

/// Executes loader queries
pub trait RelationFetcher {
    /// Run a batch query; each row carries its join key
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the underlying query fails.
    fn fetch_batch(&self, query: &BatchQuery) -> Result<Vec<ResultRow>, LifeError>;

    /// Run an owner query
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the underlying query fails.
    fn fetch_owners(&self, query: &OwnerQuery) -> Result<Vec<Record>, LifeError>;
}

/// Condition of an [`OwnerQuery`]
#[derive(Debug, Clone, PartialEq)]
pub enum OwnerFilter {
    /// `column = value`
    Eq(String, Value),
    /// `column IN (values)`
    In(String, Vec<Value>),
}

/// Query for the owner entities a unit of work loads up front
///
/// # Example
///
/// ```
/// use lifeguard_bulk::{OrderSpec, OwnerQuery};
///
/// let query = OwnerQuery::new("users").filter_in("id", [7, 8, 9]).order_by(OrderSpec::asc("id"));
/// let (sql, _) = query.to_sql();
/// assert_eq!(sql, r#"SELECT * FROM "users" WHERE "id" IN ($1, $2, $3) ORDER BY "id" ASC"#);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerQuery {
    table: String,
    filters: Vec<OwnerFilter>,
    order_by: Vec<OrderSpec>,
}

impl OwnerQuery {
    /// Every row of `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
        }
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(OwnerFilter::Eq(column.into(), value.into()));
        self
    }

    pub fn filter_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters
            .push(OwnerFilter::In(column.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filters(&self) -> &[OwnerFilter] {
        &self.filters
    }

    pub fn get_order_by(&self) -> &[OrderSpec] {
        &self.order_by
    }

    pub fn to_statement(&self) -> SelectStatement {
        let mut select = Query::select();
        select
            .column(sea_query::Asterisk)
            .from(SqlName::new(&self.table));
        for filter in &self.filters {
            match filter {
                OwnerFilter::Eq(column, value) => {
                    select.and_where(Expr::col(SqlName::new(column)).eq(value.clone()));
                }
                OwnerFilter::In(column, values) => {
                    select.and_where(Expr::col(SqlName::new(column)).is_in(values.iter().cloned()));
                }
            }
        }
        for order in &self.order_by {
            select.order_by(SqlName::new(&order.column), order.direction.into());
        }
        select
    }

    /// Render to PostgreSQL with bound parameters
    pub fn to_sql(&self) -> (String, Values) {
        self.to_statement().build(PostgresQueryBuilder)
    }
}
