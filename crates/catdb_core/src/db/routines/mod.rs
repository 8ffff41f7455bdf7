//! Named SQL routines and scalar functions exposed by the data source.
//!
//! # Responsibility
//! - Embed table-returning routines as SQL scripts addressable by name.
//! - Register scalar functions on each connection.
//!
//! # Invariants
//! - Routine parameters are positional (`?1`, `?2`, ...) and always bound.
//! - Routine names are unique within `ROUTINES`.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// Table-returning SQL script invoked by name through the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routine {
    pub name: &'static str,
    /// Number of positional parameters the script binds.
    pub arity: usize,
    pub sql: &'static str,
}

const ROUTINES: &[Routine] = &[
    Routine {
        name: "get_cat",
        arity: 1,
        sql: include_str!("get_cat.sql"),
    },
    Routine {
        name: "cats_people",
        arity: 0,
        sql: include_str!("cats_people.sql"),
    },
];

/// Name of the scalar function that uppercases a cat name.
pub const UPPERCASE_NAME: &str = "uppercase_name";

/// Looks up an embedded routine by name.
pub fn find_routine(name: &str) -> Option<&'static Routine> {
    ROUTINES.iter().find(|routine| routine.name == name)
}

/// Registers every scalar function the driver can call by name.
pub fn register_scalar_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        UPPERCASE_NAME,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let name = ctx.get::<Option<String>>(0)?;
            Ok(name.map(|value| value.to_uppercase()))
        },
    )
}
