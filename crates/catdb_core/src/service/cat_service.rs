//! Cat and report use-case façade.
//!
//! # Responsibility
//! - Provide one entry point per data access use-case.
//! - Delegate every operation to exactly one `Driver` call.
//!
//! # Invariants
//! - The façade holds no state besides the injected driver.
//! - Driver failures are surfaced unchanged (wrapped, never retried).
//! - Zero-row singular lookups become `StoreError::NotFound`.

use crate::db::routines::UPPERCASE_NAME;
use crate::driver::{
    Criteria, Decompose, Driver, DriverError, FindOptions, Join, JoinKind, Op, Row,
};
use crate::model::cat::{Cat, CatId, CatProfile, InitStatus, NewCat};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const CATS: &str = "cats";
const CATS_PEOPLE: &str = "cats_people";
const REPORTS: &str = "reports";
const GET_CAT_ROUTINE: &str = "get_cat";
const CATS_PEOPLE_ROUTINE: &str = "cats_people";

pub type StoreResult<T> = Result<T, StoreError>;

/// Error surfaced by façade operations.
#[derive(Debug)]
pub enum StoreError {
    /// The schema bootstrap routine failed.
    StoreInit(DriverError),
    /// A singular lookup matched no row.
    NotFound(String),
    /// Any other failure raised by the driver.
    Driver(DriverError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreInit(err) => write!(f, "store initialization failed: {err}"),
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Driver(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreInit(err) | Self::Driver(err) => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<DriverError> for StoreError {
    fn from(value: DriverError) -> Self {
        Self::Driver(value)
    }
}

/// Data access façade over an injected driver.
pub struct CatService<D: Driver> {
    driver: D,
}

impl<D: Driver> CatService<D> {
    /// Creates a façade using the provided driver implementation.
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Runs the one-time schema bootstrap of the data source.
    ///
    /// Safe to call repeatedly; an up-to-date store is left untouched.
    pub fn initialize_store(&self) -> StoreResult<InitStatus> {
        self.driver
            .bootstrap_schema()
            .map_err(StoreError::StoreInit)?;
        Ok(InitStatus::Ok)
    }

    /// Lists cats, optionally only those at least `min_age` years old.
    pub fn list_by_min_age(&self, min_age: Option<i64>) -> StoreResult<Vec<Cat>> {
        let criteria = match min_age {
            Some(age) => Criteria::all().and("age", Op::Gte, age),
            None => Criteria::all(),
        };
        let rows = self
            .driver
            .find(CATS, &criteria, &FindOptions::default())?;
        from_rows(rows)
    }

    /// Gets the `{name, age, breed}` projection of one cat.
    pub fn get_by_id(&self, id: CatId) -> StoreResult<CatProfile> {
        let row = self
            .driver
            .find_one(CATS, id, &FindOptions::fields(CatProfile::FIELDS))?
            .ok_or_else(|| StoreError::NotFound(format!("cat {id}")))?;
        from_row(row)
    }

    pub fn count(&self) -> StoreResult<u64> {
        Ok(self.driver.count(CATS, &Criteria::all())?)
    }

    /// Lists cats whose name matches a `LIKE` pattern such as `Wh%`.
    ///
    /// The pattern is bound as a parameter, never spliced into SQL.
    pub fn get_by_name(&self, pattern: &str) -> StoreResult<Vec<Cat>> {
        let rows = self
            .driver
            .where_clause(CATS, "name LIKE ?1", &[Value::from(pattern)])?;
        from_rows(rows)
    }

    /// Persists a new cat and returns it with its generated id.
    pub fn create(&self, cat: &NewCat) -> StoreResult<Cat> {
        let row = self.driver.save(CATS, to_row(cat)?)?;
        from_row(row)
    }

    /// Saves `cat` under `id`, inserting it when the id is unused.
    pub fn update(&self, id: CatId, cat: &NewCat) -> StoreResult<Cat> {
        let mut row = to_row(cat)?;
        row.insert("id".to_string(), Value::from(id));
        let row = self.driver.save(CATS, row)?;
        from_row(row)
    }

    /// Uppercases `name` using the data source's scalar function.
    pub fn upper_case_name(&self, name: &str) -> StoreResult<String> {
        match self
            .driver
            .call_scalar(UPPERCASE_NAME, &[Value::from(name)])?
        {
            Value::String(upper) => Ok(upper),
            other => Err(StoreError::Driver(DriverError::InvalidData(format!(
                "{UPPERCASE_NAME} returned non-text value `{other}`"
            )))),
        }
    }

    /// Gets the first cat named exactly `name` via the `get_cat` routine.
    pub fn get_single_cat(&self, name: &str) -> StoreResult<Cat> {
        let value = self
            .driver
            .call_routine(GET_CAT_ROUTINE, &[Value::from(name)], None)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("cat named `{name}`")))?;
        Ok(serde_json::from_value(value).map_err(DriverError::from)?)
    }

    /// Lists every cat with its owners nested under `people`, keeping the
    /// routine's snake_case column names.
    pub fn get_records_with_related(&self) -> StoreResult<Vec<Value>> {
        Ok(self.driver.call_routine(
            CATS_PEOPLE_ROUTINE,
            &[],
            Some(&cats_with_people_descriptor(ColumnCase::Snake)),
        )?)
    }

    /// Same graph as `get_records_with_related` with camelCase keys.
    ///
    /// Renaming happens in the driver through the decompose descriptor.
    pub fn get_records_with_related_camel(&self) -> StoreResult<Vec<Value>> {
        Ok(self.driver.call_routine(
            CATS_PEOPLE_ROUTINE,
            &[],
            Some(&cats_with_people_descriptor(ColumnCase::Camel)),
        )?)
    }

    /// Returns flat `cats_people ⋈ cats ⋈ people` rows for one cat.
    pub fn get_joined_records(&self, cat_id: CatId) -> StoreResult<Vec<Row>> {
        let joins = [Join::new("cats", JoinKind::Inner)
            .on("id", "cat_id")
            .with_child(Join::new("people", JoinKind::Inner).on("id", "cats_people.people_id"))];
        let criteria = Criteria::all().and("cats_people.cat_id", Op::Eq, cat_id);
        Ok(self.driver.join(CATS_PEOPLE, &joins, &criteria)?)
    }

    /// Stores a report document and returns it with its `id`.
    pub fn save_report(&self, report: &Value) -> StoreResult<Value> {
        Ok(self.driver.save_doc(REPORTS, report)?)
    }

    pub fn get_report_by_title(&self, title: &str) -> StoreResult<Value> {
        let mut criteria = Row::new();
        criteria.insert("title".to_string(), Value::from(title));
        self.driver
            .find_doc(REPORTS, &criteria)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("report `{title}`")))
    }

    /// Lists link rows with columns aliased to `catId` and `personId`.
    pub fn list_with_aliased_columns(&self) -> StoreResult<Vec<Row>> {
        let options = FindOptions::exprs([("catId", "cat_id"), ("personId", "people_id")]);
        Ok(self.driver.find(CATS_PEOPLE, &Criteria::all(), &options)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnCase {
    Snake,
    Camel,
}

fn cats_with_people_descriptor(case: ColumnCase) -> Decompose {
    let field = |snake: &'static str, camel: &'static str| match case {
        ColumnCase::Snake => snake,
        ColumnCase::Camel => camel,
    };

    Decompose::new("cat_id")
        .column("cat_id", field("cat_id", "catId"))
        .column("cat_name", field("cat_name", "catName"))
        .column("age", "age")
        .column("breed", "breed")
        .child(
            "people",
            Decompose::new("person_id")
                .column("person_id", field("person_id", "personId"))
                .column("person_name", field("person_name", "personName")),
        )
}

fn to_row<T: Serialize>(value: &T) -> StoreResult<Row> {
    match serde_json::to_value(value).map_err(DriverError::from)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Driver(DriverError::InvalidData(format!(
            "expected a record, got `{other}`"
        )))),
    }
}

fn from_row<T: DeserializeOwned>(row: Row) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(row)).map_err(DriverError::from)?)
}

fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> StoreResult<Vec<T>> {
    rows.into_iter().map(from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::{CatService, StoreError};
    use crate::db::DbError;
    use crate::driver::{
        Criteria, Decompose, Driver, DriverError, DriverResult, FindOptions, Join, Op, Row,
    };
    use crate::model::cat::{InitStatus, NewCat};
    use serde_json::{json, Value};
    use std::cell::RefCell;

    /// Driver double that records requests and replays canned responses.
    #[derive(Default)]
    struct RecordingDriver {
        fail_bootstrap: bool,
        saved: RefCell<Vec<(String, Row)>>,
        finds: RefCell<Vec<(String, Criteria, FindOptions)>>,
        one: Option<Row>,
    }

    fn as_row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    impl Driver for RecordingDriver {
        fn bootstrap_schema(&self) -> DriverResult<()> {
            if self.fail_bootstrap {
                return Err(DriverError::Db(DbError::UnsupportedSchemaVersion {
                    db_version: 9,
                    latest_supported: 1,
                }));
            }
            Ok(())
        }

        fn find(
            &self,
            table: &str,
            criteria: &Criteria,
            options: &FindOptions,
        ) -> DriverResult<Vec<Row>> {
            self.finds
                .borrow_mut()
                .push((table.to_string(), criteria.clone(), options.clone()));
            Ok(Vec::new())
        }

        fn find_one(&self, _table: &str, _id: i64, options: &FindOptions) -> DriverResult<Option<Row>> {
            assert_eq!(options.fields, vec!["name", "age", "breed"]);
            Ok(self.one.clone())
        }

        fn count(&self, _table: &str, _criteria: &Criteria) -> DriverResult<u64> {
            Err(DriverError::InvalidData("count unavailable".to_string()))
        }

        fn where_clause(
            &self,
            _table: &str,
            _condition: &str,
            _params: &[Value],
        ) -> DriverResult<Vec<Row>> {
            Ok(Vec::new())
        }

        fn save(&self, table: &str, row: Row) -> DriverResult<Row> {
            self.saved.borrow_mut().push((table.to_string(), row.clone()));
            let mut persisted = row;
            persisted.entry("id").or_insert(json!(100));
            Ok(persisted)
        }

        fn call_scalar(&self, _function: &str, _args: &[Value]) -> DriverResult<Value> {
            Ok(json!(7))
        }

        fn call_routine(
            &self,
            _routine: &str,
            _args: &[Value],
            _decompose: Option<&Decompose>,
        ) -> DriverResult<Vec<Value>> {
            Ok(Vec::new())
        }

        fn join(&self, _origin: &str, _joins: &[Join], _criteria: &Criteria) -> DriverResult<Vec<Row>> {
            Ok(Vec::new())
        }

        fn save_doc(&self, _collection: &str, document: &Value) -> DriverResult<Value> {
            Ok(document.clone())
        }

        fn find_doc(&self, _collection: &str, _criteria: &Row) -> DriverResult<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn initialize_store_reports_ok_and_maps_bootstrap_failure() {
        let service = CatService::new(RecordingDriver::default());
        assert_eq!(service.initialize_store().unwrap(), InitStatus::Ok);

        let failing = CatService::new(RecordingDriver {
            fail_bootstrap: true,
            ..RecordingDriver::default()
        });
        assert!(matches!(
            failing.initialize_store(),
            Err(StoreError::StoreInit(DriverError::Db(_)))
        ));
    }

    #[test]
    fn list_by_min_age_only_filters_when_threshold_given() {
        let service = CatService::new(RecordingDriver::default());
        service.list_by_min_age(None).unwrap();
        service.list_by_min_age(Some(4)).unwrap();

        let finds = service.driver.finds.borrow();
        assert_eq!(finds[0].0, "cats");
        assert!(finds[0].1.is_empty());
        assert_eq!(finds[1].1, Criteria::all().and("age", Op::Gte, 4));
    }

    #[test]
    fn update_sets_id_before_saving() {
        let service = CatService::new(RecordingDriver::default());
        let cat = service
            .update(12, &NewCat::new("Tom", 4, "Siamese"))
            .unwrap();
        assert_eq!(cat.id, 12);

        let saved = service.driver.saved.borrow();
        assert_eq!(saved[0].0, "cats");
        assert_eq!(saved[0].1.get("id"), Some(&json!(12)));
    }

    #[test]
    fn create_does_not_send_an_id() {
        let service = CatService::new(RecordingDriver::default());
        let cat = service.create(&NewCat::new("Kit", 1, "Manx")).unwrap();
        assert_eq!(cat.id, 100);
        assert!(!service.driver.saved.borrow()[0].1.contains_key("id"));
    }

    #[test]
    fn singular_lookups_without_rows_are_not_found() {
        let service = CatService::new(RecordingDriver::default());
        assert!(matches!(service.get_by_id(1), Err(StoreError::NotFound(_))));
        assert!(matches!(
            service.get_single_cat("nobody"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            service.get_report_by_title("missing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn get_by_id_returns_projection() {
        let service = CatService::new(RecordingDriver {
            one: Some(as_row(json!({"name": "Tom", "age": 4, "breed": "Siamese"}))),
            ..RecordingDriver::default()
        });
        let profile = service.get_by_id(1).unwrap();
        assert_eq!(profile.name, "Tom");
    }

    #[test]
    fn driver_errors_pass_through_unchanged() {
        let service = CatService::new(RecordingDriver::default());
        match service.count() {
            Err(StoreError::Driver(DriverError::InvalidData(message))) => {
                assert_eq!(message, "count unavailable");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn non_text_scalar_result_is_rejected() {
        let service = CatService::new(RecordingDriver::default());
        assert!(matches!(
            service.upper_case_name("tom"),
            Err(StoreError::Driver(DriverError::InvalidData(_)))
        ));
    }
}
