use crate::graph::schedule_dag::ScheduleDag;
use crate::schedule::Schedule;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    GroupWithoutOrderElement,
    EndBeforeStart,
    DanglingDependency,
    SelfDependency,
    DuplicateDependency,
    DependencyCycle,
    BrokenHierarchy,
}

/// A structural rule a schedule breaks. Reported by the validation pass, never at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub task: Option<TaskId>,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, task: Option<TaskId>, message: impl Into<String>) -> Self {
        Self {
            kind,
            task,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub fn validate_schedule(schedule: &Schedule) -> Vec<Violation> {
    let mut violations = Vec::new();
    validate_elements(schedule, &mut violations);
    validate_hierarchy(schedule, &mut violations);
    validate_dependencies(schedule, &mut violations);
    violations
}

fn validate_elements(schedule: &Schedule, violations: &mut Vec<Violation>) {
    for element in schedule.tasks() {
        if !element.is_leaf() && element.order_element().is_none() {
            violations.push(Violation::new(
                ViolationKind::GroupWithoutOrderElement,
                Some(element.id()),
                format!(
                    "order element associated to task group {} must be not null",
                    element.id()
                ),
            ));
        }
        if let (Some(start), Some(end)) = (element.start_date(), element.end_date()) {
            if end < start {
                violations.push(Violation::new(
                    ViolationKind::EndBeforeStart,
                    Some(element.id()),
                    format!("task {} ends on {end} before it starts on {start}", element.id()),
                ));
            }
        }
    }
}

fn validate_hierarchy(schedule: &Schedule, violations: &mut Vec<Violation>) {
    let mut broken = |task: TaskId, message: String| {
        violations.push(Violation::new(
            ViolationKind::BrokenHierarchy,
            Some(task),
            message,
        ));
    };

    let mut seen = HashSet::new();
    for root in schedule.roots() {
        match schedule.task(*root) {
            None => broken(*root, format!("root {root} does not exist")),
            Some(element) if element.parent().is_some() => {
                broken(*root, format!("root {root} also has a parent"))
            }
            Some(_) => {}
        }
        if !seen.insert(*root) {
            broken(*root, format!("task {root} is listed more than once"));
        }
    }

    for element in schedule.tasks() {
        for child in element.children() {
            match schedule.task(*child) {
                None => broken(
                    element.id(),
                    format!("group {} lists missing child {child}", element.id()),
                ),
                Some(c) if c.parent() != Some(element.id()) => broken(
                    *child,
                    format!(
                        "task {child} is a child of group {} but points at another parent",
                        element.id()
                    ),
                ),
                Some(_) => {}
            }
            if !seen.insert(*child) {
                broken(*child, format!("task {child} is listed more than once"));
            }
        }
        if let Some(parent) = element.parent() {
            let listed = schedule
                .task(parent)
                .is_some_and(|p| p.children().contains(&element.id()));
            if !listed {
                broken(
                    element.id(),
                    format!(
                        "task {} is not among the children of its parent {parent}",
                        element.id()
                    ),
                );
            }
        } else if !schedule.roots().contains(&element.id()) {
            broken(
                element.id(),
                format!("task {} has no parent and is not a root", element.id()),
            );
        }
    }
}

fn validate_dependencies(schedule: &Schedule, violations: &mut Vec<Violation>) {
    let mut seen = HashSet::with_capacity(schedule.dependencies().len());
    for dependency in schedule.dependencies() {
        for endpoint in [dependency.source(), dependency.destination()] {
            if schedule.task(endpoint).is_none() {
                violations.push(Violation::new(
                    ViolationKind::DanglingDependency,
                    Some(endpoint),
                    format!("dependency {dependency} refers to missing task {endpoint}"),
                ));
            }
        }
        if dependency.source() == dependency.destination() {
            violations.push(Violation::new(
                ViolationKind::SelfDependency,
                Some(dependency.source()),
                format!("task {} depends on itself", dependency.source()),
            ));
        }
        if !seen.insert(*dependency) {
            violations.push(Violation::new(
                ViolationKind::DuplicateDependency,
                Some(dependency.destination()),
                format!("dependency {dependency} is listed more than once"),
            ));
        }
    }

    for cycle in ScheduleDag::build(schedule).cycles() {
        // self loops are already reported above
        if cycle.len() < 2 {
            continue;
        }
        let chain = cycle
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        violations.push(Violation::new(
            ViolationKind::DependencyCycle,
            cycle.first().copied(),
            format!("tasks {chain} depend on each other in a cycle"),
        ));
    }
}
