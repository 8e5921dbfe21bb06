pub mod calculations;
pub mod config;
pub mod constraint;
pub mod dependency;
pub mod dependency_type;
pub mod error;
pub mod graph;
#[cfg(feature = "cli")]
pub mod logging;
pub mod metadata;
pub mod persistence;
pub mod resource;
pub mod schedule;
pub mod task;
pub mod validation;

pub use calculations::propagation::PropagationSummary;
pub use config::{ConfigError, EngineConfig, PropagationPolicy};
pub use constraint::Constraint;
pub use dependency::{Dependency, DependencyRecord, TaskLookup};
pub use dependency_type::DependencyType;
pub use error::{Endpoint, ScheduleError, ScheduleResult};
pub use metadata::ScheduleMetadata;
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteScheduleStore;
pub use persistence::{
    PersistenceError, ScheduleStore, load_schedule_from_csv, load_schedule_from_json, persist,
    save_schedule_to_csv, save_schedule_to_json,
};
pub use resource::ResourceAllocation;
pub use schedule::Schedule;
pub use task::{OrderElement, StartConstraint, Task, TaskElement, TaskGroup, TaskId, TaskKind};
pub use validation::{Violation, ViolationKind};
