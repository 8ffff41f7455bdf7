//! Cat records and projections.

use serde::{Deserialize, Serialize};

/// Store-generated primary key of a cat row.
pub type CatId = i64;

/// Persisted cat row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cat {
    pub id: CatId,
    pub name: String,
    pub age: i64,
    pub breed: String,
}

/// Cat attributes without identity, used for create and update input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCat {
    pub name: String,
    pub age: i64,
    pub breed: String,
}

impl NewCat {
    pub fn new(name: impl Into<String>, age: i64, breed: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age,
            breed: breed.into(),
        }
    }
}

/// Fixed `{name, age, breed}` projection returned by single-cat lookups.
///
/// `deny_unknown_fields` makes a projection that leaks extra columns fail
/// loudly instead of silently dropping them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatProfile {
    pub name: String,
    pub age: i64,
    pub breed: String,
}

impl CatProfile {
    /// Column list requested from the store for this projection.
    pub const FIELDS: [&'static str; 3] = ["name", "age", "breed"];
}

impl From<&NewCat> for CatProfile {
    fn from(value: &NewCat) -> Self {
        Self {
            name: value.name.clone(),
            age: value.age,
            breed: value.breed.clone(),
        }
    }
}

/// Status marker returned after the store bootstrap succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum InitStatus {
    #[serde(rename = "OK")]
    Ok,
}
