use crate::config::EngineConfig;
use crate::dependency::Dependency;
use crate::task::{TaskElement, TaskId};
use crate::validation::Violation;
use crate::{Schedule, ScheduleMetadata};
use serde_json::Error as SerdeJsonError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("schedule failed validation: {}", summarize(.0))]
    Validation(Vec<Violation>),

    #[error("no schedule stored")]
    NotFound,
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

pub trait ScheduleStore {
    fn save_schedule(&self, schedule: &Schedule) -> PersistenceResult<()>;
    fn load_schedule(&self) -> PersistenceResult<Option<Schedule>>;
}

/// Runs the deferred validation pass; any violation blocks the save or load.
pub fn ensure_valid(schedule: &Schedule) -> PersistenceResult<()> {
    let violations = schedule.validate();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(PersistenceError::Validation(violations))
    }
}

/// Rebuilds a loaded schedule and refuses it unless it validates.
pub(crate) fn assemble(
    metadata: ScheduleMetadata,
    config: EngineConfig,
    elements: Vec<TaskElement>,
    roots: Vec<TaskId>,
    dependencies: Vec<Dependency>,
) -> PersistenceResult<Schedule> {
    let schedule = Schedule::from_parts(metadata, config, elements, roots, dependencies)
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
    ensure_valid(&schedule)?;
    Ok(schedule)
}

/// Saves through `store` and, on success, marks every element as persisted.
pub fn persist<S: ScheduleStore + ?Sized>(
    store: &S,
    schedule: &mut Schedule,
) -> PersistenceResult<()> {
    store.save_schedule(schedule)?;
    schedule.mark_all_persisted();
    Ok(())
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_schedule_from_csv, load_schedule_from_json, save_schedule_to_csv, save_schedule_to_json,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::OrderElement;
    use crate::validation::ViolationKind;

    #[test]
    fn ensure_valid_turns_violations_into_an_error() {
        let mut schedule = Schedule::new();
        let g = schedule.add_group("G", None).unwrap();
        match ensure_valid(&schedule) {
            Err(PersistenceError::Validation(violations)) => {
                assert_eq!(violations[0].kind, ViolationKind::GroupWithoutOrderElement);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        schedule
            .set_order_element(g, Some(OrderElement::new("OE", "Order", 8)))
            .unwrap();
        assert!(ensure_valid(&schedule).is_ok());
    }
}
