use crate::constraint::Constraint;
use crate::error::{Endpoint, ScheduleError, ScheduleResult};
use crate::resource::ResourceAllocation;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of an element inside a [`crate::Schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u32);

impl TaskId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(TaskId)
    }
}

/// The planning item a task was created from. Groups take their defaults from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderElement {
    pub code: String,
    pub name: String,
    pub work_hours: u32,
}

impl OrderElement {
    pub fn new(code: impl Into<String>, name: impl Into<String>, work_hours: u32) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            work_hours,
        }
    }
}

/// A restriction a task places on its own start, on top of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "date", rename_all = "snake_case")]
pub enum StartConstraint {
    #[default]
    AsSoonAsPossible,
    StartNotEarlierThan(NaiveDate),
    StartInFixedDate(NaiveDate),
}

impl StartConstraint {
    pub fn to_constraints(&self) -> Vec<Constraint<NaiveDate>> {
        match self {
            StartConstraint::AsSoonAsPossible => Vec::new(),
            StartConstraint::StartNotEarlierThan(date) => {
                vec![Constraint::bigger_or_equal_than(*date)]
            }
            StartConstraint::StartInFixedDate(date) => vec![Constraint::equal_to(*date)],
        }
    }
}

/// Leaf payload: something resources are actually allocated to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_hours: Option<u32>,
    #[serde(default)]
    allocations: Vec<ResourceAllocation>,
}

impl Task {
    pub(crate) fn with_allocations(
        work_hours: Option<u32>,
        allocations: Vec<ResourceAllocation>,
    ) -> Self {
        Self {
            work_hours,
            allocations,
        }
    }

    pub fn resource_allocations(&self) -> &[ResourceAllocation] {
        &self.allocations
    }

    pub(crate) fn push_allocation(&mut self, allocation: ResourceAllocation) {
        if !self.allocations.contains(&allocation) {
            self.allocations.push(allocation);
        }
    }
}

/// Composite payload. Child order is display and dependency order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    #[serde(default)]
    children: Vec<TaskId>,
}

impl TaskGroup {
    pub fn children(&self) -> &[TaskId] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<TaskId> {
        &mut self.children
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    Task(Task),
    Group(TaskGroup),
}

impl TaskKind {
    /// Re-anchors allocations after the owner moved. Groups hold none, so this is a no-op for them.
    pub(crate) fn move_allocations(&mut self, new_start: Option<NaiveDate>) {
        match self {
            TaskKind::Task(task) => {
                for allocation in &mut task.allocations {
                    allocation.start_date = new_start;
                }
            }
            TaskKind::Group(_) => {}
        }
    }
}

/// A schedulable unit: a leaf [`Task`] or a [`TaskGroup`].
///
/// Dates are half-open: the element occupies `[start_date, end_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskElement {
    id: TaskId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order_element: Option<OrderElement>,
    #[serde(default)]
    start_constraint: StartConstraint,
    #[serde(default)]
    parent: Option<TaskId>,
    #[serde(skip)]
    new_object: bool,
    kind: TaskKind,
}

impl TaskElement {
    pub(crate) fn new(id: TaskId, name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id,
            name: name.into(),
            notes: None,
            start_date: None,
            end_date: None,
            order_element: None,
            start_constraint: StartConstraint::default(),
            parent: None,
            new_object: true,
            kind,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes;
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    pub fn date(&self, endpoint: Endpoint) -> Option<NaiveDate> {
        match endpoint {
            Endpoint::Start => self.start_date,
            Endpoint::End => self.end_date,
        }
    }

    /// The date at `endpoint`, or `UnscheduledTask` when it was never set.
    pub fn require_date(&self, endpoint: Endpoint) -> ScheduleResult<NaiveDate> {
        self.date(endpoint).ok_or(ScheduleError::UnscheduledTask {
            task: self.id,
            endpoint,
        })
    }

    pub fn is_scheduled(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_some()
    }

    pub fn length(&self) -> Option<Duration> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn set_dates(&mut self, start: NaiveDate, end: NaiveDate) -> ScheduleResult<()> {
        if end < start {
            return Err(ScheduleError::InvalidArgument(format!(
                "task {} end date {end} precedes start date {start}",
                self.id
            )));
        }
        self.start_date = Some(start);
        self.end_date = Some(end);
        Ok(())
    }

    pub(crate) fn set_dates_unchecked(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.start_date = start;
        self.end_date = end;
    }

    pub fn order_element(&self) -> Option<&OrderElement> {
        self.order_element.as_ref()
    }

    pub fn set_order_element(&mut self, order_element: Option<OrderElement>) {
        self.order_element = order_element;
    }

    pub fn start_constraint(&self) -> StartConstraint {
        self.start_constraint
    }

    pub fn set_start_constraint(&mut self, constraint: StartConstraint) {
        self.start_constraint = constraint;
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<TaskId>) {
        self.parent = parent;
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TaskKind::Task(_))
    }

    /// Children in order. Always empty for a leaf.
    pub fn children(&self) -> &[TaskId] {
        match &self.kind {
            TaskKind::Task(_) => &[],
            TaskKind::Group(group) => group.children(),
        }
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut TaskKind {
        &mut self.kind
    }

    pub fn as_task(&self) -> Option<&Task> {
        match &self.kind {
            TaskKind::Task(task) => Some(task),
            TaskKind::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&TaskGroup> {
        match &self.kind {
            TaskKind::Task(_) => None,
            TaskKind::Group(group) => Some(group),
        }
    }

    /// Work hours a new schedule would assume for this element.
    ///
    /// Groups defer to their order element rather than summing children;
    /// leaves prefer their own estimate and fall back to the order element.
    pub fn default_work_hours(&self) -> ScheduleResult<u32> {
        let from_order = self.order_element.as_ref().map(|order| order.work_hours);
        match &self.kind {
            TaskKind::Group(_) => from_order.ok_or(ScheduleError::MissingOrderElement(self.id)),
            TaskKind::Task(task) => Ok(task.work_hours.or(from_order).unwrap_or(0)),
        }
    }

    pub fn default_duration(&self, hours_per_workday: u32) -> ScheduleResult<Duration> {
        if hours_per_workday == 0 {
            return Err(ScheduleError::InvalidArgument(
                "hours_per_workday must be greater than zero".into(),
            ));
        }
        let hours = self.default_work_hours()?;
        let days = hours.div_ceil(hours_per_workday);
        Ok(Duration::days(i64::from(days)))
    }

    pub fn resource_allocations(&self) -> &[ResourceAllocation] {
        match &self.kind {
            TaskKind::Task(task) => task.resource_allocations(),
            TaskKind::Group(_) => &[],
        }
    }

    /// Whether this element was created in memory and never saved.
    pub fn is_new_object(&self) -> bool {
        self.new_object
    }

    pub fn set_new_object(&mut self, new_object: bool) {
        self.new_object = new_object;
    }
}
