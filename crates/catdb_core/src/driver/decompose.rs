//! Reshaping of flat joined rows into nested object graphs.
//!
//! # Invariants
//! - Parents keep the order in which their primary key first appears.
//! - Children are deduplicated by their own primary key per parent.
//! - Children whose primary key is null are omitted (outer-join misses).

use super::{DriverError, DriverResult, Row};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Describes how rows collapse into one object per primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decompose {
    /// Column holding the primary key of this level.
    pub pk: String,
    /// `(column, field)` pairs copied onto each emitted object.
    pub columns: Vec<(String, String)>,
    /// `(field, descriptor)` pairs emitted as nested arrays.
    pub children: Vec<(String, Decompose)>,
}

impl Decompose {
    pub fn new(pk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            ..Self::default()
        }
    }

    /// Maps `column` onto `field` of the emitted object.
    pub fn column(mut self, column: impl Into<String>, field: impl Into<String>) -> Self {
        self.columns.push((column.into(), field.into()));
        self
    }

    /// Nests `child` objects under `field`.
    pub fn child(mut self, field: impl Into<String>, child: Decompose) -> Self {
        self.children.push((field.into(), child));
        self
    }
}

/// Collapses `rows` into nested objects as described by `schema`.
pub fn decompose(rows: &[Row], schema: &Decompose) -> DriverResult<Vec<Value>> {
    build_level(rows.iter().collect(), schema)
}

fn build_level(rows: Vec<&Row>, schema: &Decompose) -> DriverResult<Vec<Value>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Row>> = HashMap::new();

    for row in rows {
        let pk = row.get(&schema.pk).ok_or_else(|| {
            DriverError::InvalidData(format!("decompose key `{}` missing from row", schema.pk))
        })?;
        if pk.is_null() {
            continue;
        }

        let key = pk.to_string();
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row);
    }

    let mut objects = Vec::with_capacity(order.len());
    for key in order {
        let Some(group) = groups.remove(&key) else {
            continue;
        };
        let first = group[0];

        let mut object = Map::new();
        for (column, field) in &schema.columns {
            let value = first.get(column).ok_or_else(|| {
                DriverError::InvalidData(format!("decompose column `{column}` missing from row"))
            })?;
            object.insert(field.clone(), value.clone());
        }
        for (field, child) in &schema.children {
            let nested = build_level(group.clone(), child)?;
            object.insert(field.clone(), Value::Array(nested));
        }

        objects.push(Value::Object(object));
    }

    Ok(objects)
}
