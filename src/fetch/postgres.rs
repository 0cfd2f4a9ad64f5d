//! `RelationFetcher` over `may_postgres`.
//!
//! Queries are rendered with SeaQuery's `PostgresQueryBuilder`; bound values are
//! converted to `ToSql` parameters and returned rows are decoded column by column
//! into SeaQuery values according to their Postgres type.

use crate::executor::{LifeError, LifeExecutor};
use crate::fetch::{OwnerQuery, RelationFetcher, ResultRow};
use crate::loader::planner::{BatchQuery, BATCH_KEY_ALIAS};
use crate::model::Record;
use crate::value::KeyValue;
use may_postgres::types::{ToSql, Type};
use may_postgres::Row;
use sea_query::{Value, Values};

/// Fetcher running loader queries on a [`LifeExecutor`]
pub struct PostgresFetcher<'e, E: LifeExecutor> {
    executor: &'e E,
}

impl<'e, E: LifeExecutor> PostgresFetcher<'e, E> {
    pub fn new(executor: &'e E) -> Self {
        Self { executor }
    }

    fn query(&self, sql: &str, values: &Values) -> Result<Vec<Row>, LifeError> {
        with_converted_params(values, |params| self.executor.query_all(sql, params))
    }
}

impl<E: LifeExecutor> RelationFetcher for PostgresFetcher<'_, E> {
    fn fetch_batch(&self, query: &BatchQuery) -> Result<Vec<ResultRow>, LifeError> {
        let (sql, values) = query.to_sql();
        log::debug!("{}: {} ({} keys)", query.relation(), sql, query.keys().len());

        let rows = self.query(&sql, &values)?;
        rows.iter()
            .map(|row| {
                let mut record = decode_row(row)?;
                let join_key = record.remove(BATCH_KEY_ALIAS).as_ref().and_then(KeyValue::from_value);
                Ok(ResultRow::new(join_key, record))
            })
            .collect()
    }

    fn fetch_owners(&self, query: &OwnerQuery) -> Result<Vec<Record>, LifeError> {
        let (sql, values) = query.to_sql();
        log::debug!("owners: {}", sql);

        let rows = self.query(&sql, &values)?;
        rows.iter().map(decode_row).collect()
    }
}

/// Run `f` with `values` converted to `may_postgres` parameters
///
/// # Errors
///
/// Returns `LifeError::Other` for values that cannot be bound.
pub fn with_converted_params<F, R>(values: &Values, f: F) -> Result<R, LifeError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, LifeError>,
{
    let boxed = values
        .iter()
        .map(to_sql_param)
        .collect::<Result<Vec<Box<dyn ToSql + Sync>>, LifeError>>()?;
    let params: Vec<&dyn ToSql> = boxed.iter().map(|p| p.as_ref() as &dyn ToSql).collect();
    f(&params)
}

fn to_sql_param(value: &Value) -> Result<Box<dyn ToSql + Sync>, LifeError> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    let param: Box<dyn ToSql + Sync> = match value {
        Value::Bool(b) => Box::new(*b),
        Value::TinyInt(i) => Box::new(i.map(i16::from)),
        Value::SmallInt(i) => Box::new(*i),
        Value::Int(i) => Box::new(*i),
        Value::BigInt(i) => Box::new(*i),
        Value::TinyUnsigned(u) => Box::new(u.map(i16::from)),
        Value::SmallUnsigned(u) => Box::new(u.map(i32::from)),
        Value::Unsigned(u) => Box::new(u.map(i64::from)),
        Value::BigUnsigned(u) => {
            let converted = u
                .map(|u| {
                    i64::try_from(u).map_err(|_| {
                        LifeError::Other(format!(
                            "BigUnsigned value {} exceeds i64::MAX ({}), cannot be safely cast to i64",
                            u,
                            i64::MAX
                        ))
                    })
                })
                .transpose()?;
            Box::new(converted)
        }
        Value::Float(f) => Box::new(*f),
        Value::Double(d) => Box::new(*d),
        Value::String(s) => Box::new(s.as_ref().map(|s| s.to_string())),
        Value::Char(c) => Box::new(c.map(|c| c.to_string())),
        Value::Bytes(b) => Box::new(b.as_ref().map(|b| b.to_vec())),
        Value::Json(j) => Box::new(j.as_ref().map(|j| serde_json::Value::clone(j))),
        Value::Uuid(u) => Box::new(u.as_ref().map(|u| Uuid::from_bytes(*u.as_bytes()))),
        Value::ChronoDate(d) => Box::new(d.as_ref().map(|d| NaiveDate::clone(d))),
        Value::ChronoTime(t) => Box::new(t.as_ref().map(|t| NaiveTime::clone(t))),
        Value::ChronoDateTime(dt) => Box::new(dt.as_ref().map(|dt| NaiveDateTime::clone(dt))),
        Value::ChronoDateTimeUtc(dt) => Box::new(dt.as_ref().map(|dt| DateTime::<Utc>::clone(dt))),
        Value::Decimal(d) => Box::new(d.as_ref().map(|d| Decimal::clone(d))),
        other => {
            return Err(LifeError::Other(format!(
                "Unsupported value type in query: {:?}",
                other
            )))
        }
    };
    Ok(param)
}

/// Decode every column of `row` into a [`Record`]
///
/// # Errors
///
/// Returns `LifeError::ParseError` for columns of an unsupported type.
pub fn decode_row(row: &Row) -> Result<Record, LifeError> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_())
            .map_err(|e| LifeError::ParseError(format!("column '{}': {}", column.name(), e)))?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn decode_column(row: &Row, idx: usize, ty: &Type) -> Result<Value, String> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn get<'r, T>(row: &'r Row, idx: usize) -> Result<Value, String>
    where
        T: may_postgres::types::FromSql<'r>,
        Option<T>: Into<Value>,
    {
        row.try_get::<_, Option<T>>(idx)
            .map(Into::into)
            .map_err(|e| e.to_string())
    }

    if *ty == Type::BOOL {
        get::<bool>(row, idx)
    } else if *ty == Type::INT2 {
        get::<i16>(row, idx)
    } else if *ty == Type::INT4 {
        get::<i32>(row, idx)
    } else if *ty == Type::INT8 {
        get::<i64>(row, idx)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, idx)
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, idx)
    } else if *ty == Type::NUMERIC {
        get::<Decimal>(row, idx)
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
        get::<String>(row, idx)
    } else if *ty == Type::BYTEA {
        get::<Vec<u8>>(row, idx)
    } else if *ty == Type::UUID {
        get::<Uuid>(row, idx)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get::<serde_json::Value>(row, idx)
    } else if *ty == Type::DATE {
        get::<NaiveDate>(row, idx)
    } else if *ty == Type::TIME {
        get::<NaiveTime>(row, idx)
    } else if *ty == Type::TIMESTAMP {
        get::<NaiveDateTime>(row, idx)
    } else if *ty == Type::TIMESTAMPTZ {
        get::<DateTime<Utc>>(row, idx)
    } else {
        Err(format!("unsupported column type {}", ty))
    }
}
