//! SQLite implementation of the `Driver` capability.
//!
//! # Responsibility
//! - Translate driver requests into parameterized SQL over one connection.
//! - Map SQLite values to JSON rows and back.
//! - Store JSON documents in per-collection tables.
//!
//! # Invariants
//! - The connection must come from `db::open_db*` so scalar functions are
//!   registered.
//! - `save` only writes columns that exist on the target table.

use super::decompose::{decompose, Decompose};
use super::ident::{quote, validate_identifier};
use super::query::{Criteria, FindOptions, Join};
use super::{Driver, DriverError, DriverResult, Row};
use crate::db::migrations::apply_migrations;
use crate::db::routines::find_routine;
use log::{error, info, warn};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use serde_json::{Number, Value};
use std::time::Instant;

const PRIMARY_KEY: &str = "id";

/// Driver backed by a borrowed SQLite connection.
pub struct SqliteDriver<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDriver<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_rows(&self, operation: &str, sql: &str, values: &[Value]) -> DriverResult<Vec<Row>> {
        let result = self.query_rows_unlogged(sql, values);
        if let Err(err) = &result {
            warn!("event=driver_query module=driver status=error operation={operation} error={err}");
        }
        result
    }

    fn query_rows_unlogged(&self, sql: &str, values: &[Value]) -> DriverResult<Vec<Row>> {
        let bind = values
            .iter()
            .map(json_to_sql)
            .collect::<DriverResult<Vec<SqlValue>>>()?;

        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.query(params_from_iter(bind))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut mapped = Row::new();
            for (index, name) in names.iter().enumerate() {
                mapped.insert(name.clone(), sql_to_json(row.get_ref(index)?)?);
            }
            result.push(mapped);
        }
        Ok(result)
    }

    fn table_columns(&self, table: &str) -> DriverResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid;")?;
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn table_exists(&self, table: &str) -> DriverResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn ensure_collection(&self, collection: &str) -> DriverResult<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
            );",
            quote(collection)
        ))?;
        Ok(())
    }
}

impl Driver for SqliteDriver<'_> {
    fn bootstrap_schema(&self) -> DriverResult<()> {
        let started_at = Instant::now();
        info!("event=schema_bootstrap module=driver status=start");

        match apply_migrations(self.conn) {
            Ok(applied) => {
                info!(
                    "event=schema_bootstrap module=driver status=ok applied={applied} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=schema_bootstrap module=driver status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    fn find(
        &self,
        table: &str,
        criteria: &Criteria,
        options: &FindOptions,
    ) -> DriverResult<Vec<Row>> {
        let table = validate_identifier(table)?;
        let (where_sql, values) = criteria.to_sql(0)?;
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {};",
            options.select_list()?,
            quote(table),
            where_sql,
            options.order_column()?
        );
        self.query_rows("find", &sql, &values)
    }

    fn find_one(&self, table: &str, id: i64, options: &FindOptions) -> DriverResult<Option<Row>> {
        let table = validate_identifier(table)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 LIMIT 1;",
            options.select_list()?,
            quote(table),
            quote(PRIMARY_KEY)
        );
        let mut rows = self.query_rows("find_one", &sql, &[Value::from(id)])?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    fn count(&self, table: &str, criteria: &Criteria) -> DriverResult<u64> {
        let table = validate_identifier(table)?;
        let (where_sql, values) = criteria.to_sql(0)?;
        let sql = format!("SELECT COUNT(*) AS count FROM {}{};", quote(table), where_sql);

        let rows = self.query_rows("count", &sql, &values)?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| DriverError::InvalidData("count returned no value".to_string()))?;
        Ok(count)
    }

    fn where_clause(
        &self,
        table: &str,
        condition: &str,
        params: &[Value],
    ) -> DriverResult<Vec<Row>> {
        let table = validate_identifier(table)?;
        let condition = condition.trim();
        if condition.is_empty() || condition.contains(';') {
            return Err(DriverError::InvalidData(format!(
                "invalid where condition `{condition}`"
            )));
        }

        let sql = format!(
            "SELECT * FROM {} WHERE {condition} ORDER BY {};",
            quote(table),
            quote(PRIMARY_KEY)
        );
        self.query_rows("where", &sql, params)
    }

    fn save(&self, table: &str, mut row: Row) -> DriverResult<Row> {
        let table = validate_identifier(table)?;
        let known_columns = self.table_columns(table)?;
        if known_columns.is_empty() {
            return Err(DriverError::InvalidData(format!(
                "table `{table}` does not exist"
            )));
        }

        if row.get(PRIMARY_KEY).is_some_and(Value::is_null) {
            row.remove(PRIMARY_KEY);
        }
        let upsert = row.contains_key(PRIMARY_KEY);

        let mut columns = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());
        for (column, value) in row {
            validate_identifier(&column)?;
            if !known_columns.contains(&column) {
                return Err(DriverError::UnknownColumn {
                    table: table.to_string(),
                    column,
                });
            }
            columns.push(column);
            values.push(value);
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *;", quote(table))
        } else {
            let column_list = columns
                .iter()
                .map(|column| quote(column))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=columns.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut sql = format!(
                "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
                quote(table)
            );

            if upsert {
                let mut assignments = columns
                    .iter()
                    .filter(|column| column.as_str() != PRIMARY_KEY)
                    .map(|column| format!("{0} = excluded.{0}", quote(column)))
                    .collect::<Vec<_>>();
                if assignments.is_empty() {
                    // Keeps RETURNING populated when only the key was sent.
                    assignments.push(format!("{0} = excluded.{0}", quote(PRIMARY_KEY)));
                }
                sql.push_str(&format!(
                    " ON CONFLICT({}) DO UPDATE SET {}",
                    quote(PRIMARY_KEY),
                    assignments.join(", ")
                ));
            }
            sql.push_str(" RETURNING *;");
            sql
        };

        let mut saved = self.query_rows("save", &sql, &values)?;
        if saved.is_empty() {
            return Err(DriverError::InvalidData(format!(
                "save on `{table}` returned no row"
            )));
        }
        Ok(saved.swap_remove(0))
    }

    fn call_scalar(&self, function: &str, args: &[Value]) -> DriverResult<Value> {
        let function = validate_identifier(function)?;
        let placeholders = (1..=args.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {function}({placeholders}) AS result;");

        let rows = self.query_rows("call_scalar", &sql, args)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove("result"))
            .unwrap_or(Value::Null))
    }

    fn call_routine(
        &self,
        routine: &str,
        args: &[Value],
        decompose_with: Option<&Decompose>,
    ) -> DriverResult<Vec<Value>> {
        let script =
            find_routine(routine).ok_or_else(|| DriverError::UnknownRoutine(routine.to_string()))?;
        if script.arity != args.len() {
            return Err(DriverError::InvalidData(format!(
                "routine `{routine}` expects {} argument(s), got {}",
                script.arity,
                args.len()
            )));
        }

        let rows = self.query_rows("call_routine", script.sql, args)?;
        match decompose_with {
            Some(schema) => decompose(&rows, schema),
            None => Ok(rows.into_iter().map(Value::Object).collect()),
        }
    }

    fn join(&self, origin: &str, joins: &[Join], criteria: &Criteria) -> DriverResult<Vec<Row>> {
        let origin = validate_identifier(origin)?;

        let mut join_sql = String::new();
        let mut relations = vec![origin.to_string()];
        for join in joins {
            join.render(origin, &mut join_sql, &mut relations)?;
        }

        let mut select_items = Vec::new();
        for relation in &relations {
            let columns = self.table_columns(relation)?;
            if columns.is_empty() {
                return Err(DriverError::InvalidData(format!(
                    "table `{relation}` does not exist"
                )));
            }
            for column in columns {
                select_items.push(format!(
                    "{}.{} AS {}",
                    quote(relation),
                    quote(&column),
                    quote(&format!("{relation}.{column}"))
                ));
            }
        }

        let (where_sql, values) = criteria.to_sql(0)?;
        let sql = format!(
            "SELECT {} FROM {}{join_sql}{where_sql} ORDER BY {}.{};",
            select_items.join(", "),
            quote(origin),
            quote(origin),
            quote(PRIMARY_KEY)
        );
        self.query_rows("join", &sql, &values)
    }

    fn save_doc(&self, collection: &str, document: &Value) -> DriverResult<Value> {
        let collection = validate_identifier(collection)?;
        let Value::Object(fields) = document else {
            return Err(DriverError::InvalidData(
                "documents must be JSON objects".to_string(),
            ));
        };

        let mut body = fields.clone();
        let id = match body.remove(PRIMARY_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_i64().ok_or_else(|| {
                DriverError::InvalidData(format!("document id `{value}` is not an integer"))
            })?),
        };
        let body_text = serde_json::to_string(&body)?;

        self.ensure_collection(collection)?;
        let table = quote(collection);
        let stored_id: i64 = match id {
            Some(id) => self.conn.query_row(
                &format!(
                    "INSERT INTO {table} (id, body) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET
                        body = excluded.body,
                        updated_at = (strftime('%s', 'now') * 1000)
                     RETURNING id;"
                ),
                params![id, body_text],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                &format!("INSERT INTO {table} (body) VALUES (?1) RETURNING id;"),
                params![body_text],
                |row| row.get(0),
            )?,
        };

        body.insert(PRIMARY_KEY.to_string(), Value::from(stored_id));
        Ok(Value::Object(body))
    }

    fn find_doc(&self, collection: &str, criteria: &Row) -> DriverResult<Vec<Value>> {
        let collection = validate_identifier(collection)?;
        if !self.table_exists(collection)? {
            return Ok(Vec::new());
        }

        let mut clauses = Vec::with_capacity(criteria.len());
        let mut values = Vec::with_capacity(criteria.len());
        for (index, (field, value)) in criteria.iter().enumerate() {
            let field = validate_identifier(field)?;
            clauses.push(format!("json_extract(body, '$.{field}') = ?{}", index + 1));
            values.push(value.clone());
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT id, body FROM {}{where_sql} ORDER BY id;",
            quote(collection)
        );
        let rows = self.query_rows("find_doc", &sql, &values)?;

        rows.into_iter()
            .map(|row| -> DriverResult<Value> {
                let body_text = row.get("body").and_then(Value::as_str).ok_or_else(|| {
                    DriverError::InvalidData(format!("document body in `{collection}` is not text"))
                })?;
                let mut document: Row = serde_json::from_str(body_text)?;
                if let Some(id) = row.get(PRIMARY_KEY) {
                    document.insert(PRIMARY_KEY.to_string(), id.clone());
                }
                Ok(Value::Object(document))
            })
            .collect()
    }
}

fn json_to_sql(value: &Value) -> DriverResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                SqlValue::Integer(integer)
            } else if let Some(real) = number.as_f64() {
                SqlValue::Real(real)
            } else {
                return Err(DriverError::InvalidData(format!(
                    "number `{number}` cannot be stored"
                )));
            }
        }
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(serde_json::to_string(value)?),
    })
}

fn sql_to_json(value: ValueRef<'_>) -> DriverResult<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(integer) => Ok(Value::from(integer)),
        ValueRef::Real(real) => Number::from_f64(real).map(Value::Number).ok_or_else(|| {
            DriverError::InvalidData(format!("non-finite real `{real}` in result"))
        }),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|text| Value::String(text.to_string()))
            .map_err(|err| DriverError::InvalidData(format!("non-UTF-8 text in result: {err}"))),
        ValueRef::Blob(_) => Err(DriverError::InvalidData(
            "blob columns are not supported".to_string(),
        )),
    }
}
