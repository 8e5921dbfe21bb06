use crate::dependency::Dependency;
use crate::task::TaskId;
use std::fmt;
use thiserror::Error;

/// Which end of a task a computation or constraint refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Start,
    End,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::End => write!(f, "end"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("task {0} is not a task group")]
    NotAGroup(TaskId),

    #[error("task {0} is a task group and cannot hold resource allocations")]
    NotALeaf(TaskId),

    #[error("task {task} has no {endpoint} date")]
    UnscheduledTask { task: TaskId, endpoint: Endpoint },

    #[error("task group {0} has no order element")]
    MissingOrderElement(TaskId),

    #[error("index {index} is out of bounds for group {group} with {len} children")]
    IndexOutOfBounds {
        group: TaskId,
        index: usize,
        len: usize,
    },

    #[error("adding {child} under {group} would create a cycle in the task hierarchy")]
    HierarchyCycle { group: TaskId, child: TaskId },

    #[error("dependency {0} already exists")]
    DuplicateDependency(Dependency),

    #[error("dependency {0} not found")]
    DependencyNotFound(Dependency),

    #[error("dependency cycle detected involving task {0}")]
    DependencyCycle(TaskId),

    #[error("task id {0} is used more than once")]
    DuplicateTask(TaskId),

    #[error("no {0} ids left")]
    IdsExhausted(&'static str),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
