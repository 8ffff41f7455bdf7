//! Data access façade over a relational/document store of cats, people
//! and reports.
//!
//! `CatService` is the application-facing API; it forwards every call to
//! an injected `Driver`. `SqliteDriver` is the bundled implementation.

pub mod config;
pub mod db;
pub mod driver;
pub mod logging;
pub mod model;
pub mod service;

pub use config::CoreConfig;
pub use driver::{
    Condition, Criteria, Decompose, Driver, DriverError, DriverResult, FindOptions, Join,
    JoinKind, Op, Row, SqliteDriver,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::cat::{Cat, CatId, CatProfile, InitStatus, NewCat};
pub use service::cat_service::{CatService, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
