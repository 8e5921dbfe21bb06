use crate::calculations::propagation::{Propagation, PropagationSummary};
use crate::config::EngineConfig;
use crate::constraint::Constraint;
use crate::dependency::{Dependency, TaskLookup};
use crate::dependency_type::DependencyType;
use crate::error::{Endpoint, ScheduleError, ScheduleResult};
use crate::metadata::ScheduleMetadata;
use crate::resource::ResourceAllocation;
use crate::task::{OrderElement, StartConstraint, Task, TaskElement, TaskGroup, TaskId, TaskKind};
use crate::validation::{self, Violation};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashSet};

/// Arena owning every task element of a project plus the dependencies between them.
///
/// Elements are addressed by [`TaskId`]. Structural edits go through the schedule so
/// that parent back-references and child lists never disagree.
#[derive(Debug, Clone)]
pub struct Schedule {
    metadata: ScheduleMetadata,
    config: EngineConfig,
    elements: BTreeMap<TaskId, TaskElement>,
    roots: Vec<TaskId>,
    dependencies: Vec<Dependency>,
    next_task_id: u32,
    next_allocation_id: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskLookup for Schedule {
    fn lookup(&self, id: TaskId) -> Option<&TaskElement> {
        self.elements.get(&id)
    }
}

impl Schedule {
    pub fn new() -> Self {
        Self::new_with_metadata(ScheduleMetadata::default())
    }

    pub fn new_with_metadata(metadata: ScheduleMetadata) -> Self {
        Self::with_config(metadata, EngineConfig::default())
    }

    pub fn with_config(metadata: ScheduleMetadata, config: EngineConfig) -> Self {
        Self {
            metadata,
            config,
            elements: BTreeMap::new(),
            roots: Vec::new(),
            dependencies: Vec::new(),
            next_task_id: 1,
            next_allocation_id: 1,
        }
    }

    /// Reassembles a schedule from already-linked parts, as a persistence layer hands them over.
    ///
    /// Only id uniqueness and the id counters are checked here; run
    /// [`Schedule::validate`] before trusting the rest.
    pub(crate) fn from_parts(
        metadata: ScheduleMetadata,
        config: EngineConfig,
        elements: Vec<TaskElement>,
        roots: Vec<TaskId>,
        dependencies: Vec<Dependency>,
    ) -> ScheduleResult<Self> {
        let next_task_id = match elements.iter().map(|element| element.id().get()).max() {
            Some(max) => max.checked_add(1).ok_or(ScheduleError::IdsExhausted("task"))?,
            None => 1,
        };
        let max_allocation_id = elements
            .iter()
            .flat_map(|element| element.resource_allocations())
            .map(|allocation| allocation.id)
            .max();
        let next_allocation_id = match max_allocation_id {
            Some(max) => max
                .checked_add(1)
                .ok_or(ScheduleError::IdsExhausted("allocation"))?,
            None => 1,
        };

        let mut by_id = BTreeMap::new();
        for element in elements {
            let id = element.id();
            if by_id.insert(id, element).is_some() {
                return Err(ScheduleError::DuplicateTask(id));
            }
        }
        Ok(Self {
            metadata,
            config,
            elements: by_id,
            roots,
            dependencies,
            next_task_id,
            next_allocation_id,
        })
    }

    pub fn metadata(&self) -> &ScheduleMetadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: ScheduleMetadata) {
        self.metadata = metadata;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskElement> {
        self.elements.get(&id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut TaskElement> {
        self.elements.get_mut(&id)
    }

    pub fn get(&self, id: TaskId) -> ScheduleResult<&TaskElement> {
        self.require(id)
    }

    fn get_mut(&mut self, id: TaskId) -> ScheduleResult<&mut TaskElement> {
        self.elements
            .get_mut(&id)
            .ok_or(ScheduleError::TaskNotFound(id))
    }

    /// All elements in id order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskElement> {
        self.elements.values()
    }

    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    fn next_id(&mut self) -> ScheduleResult<TaskId> {
        let next = self
            .next_task_id
            .checked_add(1)
            .ok_or(ScheduleError::IdsExhausted("task"))?;
        let id = TaskId::new(self.next_task_id);
        self.next_task_id = next;
        Ok(id)
    }

    fn insert_root(&mut self, element: TaskElement) -> TaskId {
        let id = element.id();
        self.elements.insert(id, element);
        self.roots.push(id);
        tracing::debug!(task = %id, "created task element");
        id
    }

    /// Creates a top-level leaf task.
    pub fn add_task(&mut self, name: impl Into<String>) -> ScheduleResult<TaskId> {
        let id = self.next_id()?;
        Ok(self.insert_root(TaskElement::new(id, name, TaskKind::Task(Task::default()))))
    }

    /// Creates a top-level, empty task group.
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        order_element: Option<OrderElement>,
    ) -> ScheduleResult<TaskId> {
        let id = self.next_id()?;
        let mut element = TaskElement::new(id, name, TaskKind::Group(TaskGroup::default()));
        element.set_order_element(order_element);
        Ok(self.insert_root(element))
    }

    pub fn set_dates(
        &mut self,
        id: TaskId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ScheduleResult<()> {
        self.get_mut(id)?.set_dates(start, end)
    }

    pub fn set_start_constraint(
        &mut self,
        id: TaskId,
        constraint: StartConstraint,
    ) -> ScheduleResult<()> {
        self.get_mut(id)?.set_start_constraint(constraint);
        Ok(())
    }

    pub fn set_order_element(
        &mut self,
        id: TaskId,
        order_element: Option<OrderElement>,
    ) -> ScheduleResult<()> {
        self.get_mut(id)?.set_order_element(order_element);
        Ok(())
    }

    pub fn set_work_hours(&mut self, id: TaskId, hours: u32) -> ScheduleResult<()> {
        match self.get_mut(id)?.kind_mut() {
            TaskKind::Task(task) => {
                task.work_hours = Some(hours);
                Ok(())
            }
            TaskKind::Group(_) => Err(ScheduleError::NotALeaf(id)),
        }
    }

    pub fn parent(&self, id: TaskId) -> ScheduleResult<Option<TaskId>> {
        Ok(self.get(id)?.parent())
    }

    pub fn children(&self, id: TaskId) -> ScheduleResult<&[TaskId]> {
        Ok(self.get(id)?.children())
    }

    pub fn is_leaf(&self, id: TaskId) -> ScheduleResult<bool> {
        Ok(self.get(id)?.is_leaf())
    }

    /// Whether `ancestor` is `id` itself or sits above it in the hierarchy.
    pub fn is_ancestor_or_self(&self, ancestor: TaskId, id: TaskId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.elements.get(&current).and_then(TaskElement::parent);
        }
        false
    }

    /// Appends `child` to `group`.
    pub fn add_task_element(&mut self, group: TaskId, child: TaskId) -> ScheduleResult<()> {
        let len = self.group_children(group)?.len();
        let len = if self.get(child)?.parent() == Some(group) {
            len - 1
        } else {
            len
        };
        self.insert_task_element(group, len, child)
    }

    /// Inserts `child` at `index` in `group`, detaching it from wherever it was first.
    ///
    /// `index` is interpreted after the detach, so moving a child within its own
    /// group addresses the list without it.
    pub fn insert_task_element(
        &mut self,
        group: TaskId,
        index: usize,
        child: TaskId,
    ) -> ScheduleResult<()> {
        self.group_children(group)?;
        self.get(child)?;
        if self.is_ancestor_or_self(child, group) {
            return Err(ScheduleError::HierarchyCycle { group, child });
        }

        let previous_parent = self.get(child)?.parent();
        let len_after_detach = self.group_children(group)?.len()
            - usize::from(previous_parent == Some(group));
        if index > len_after_detach {
            return Err(ScheduleError::IndexOutOfBounds {
                group,
                index,
                len: len_after_detach,
            });
        }

        self.detach(child)?;
        self.group_children_mut(group)?.insert(index, child);
        self.set_parent(child, Some(group))?;
        tracing::debug!(%group, %child, index, "inserted task element");
        Ok(())
    }

    /// Removes `child` from `group` by identity. The child stays in the schedule as a root.
    ///
    /// Returns false when `child` was not one of the group's children.
    pub fn remove_child(&mut self, group: TaskId, child: TaskId) -> ScheduleResult<bool> {
        let children = self.group_children_mut(group)?;
        let Some(position) = children.iter().position(|id| *id == child) else {
            return Ok(false);
        };
        children.remove(position);
        self.set_parent(child, None)?;
        self.roots.push(child);
        tracing::debug!(%group, %child, "removed child from group");
        Ok(true)
    }

    fn group_children(&self, group: TaskId) -> ScheduleResult<&[TaskId]> {
        self.get(group)?
            .as_group()
            .map(TaskGroup::children)
            .ok_or(ScheduleError::NotAGroup(group))
    }

    fn group_children_mut(&mut self, group: TaskId) -> ScheduleResult<&mut Vec<TaskId>> {
        match self.get_mut(group)?.kind_mut() {
            TaskKind::Group(g) => Ok(g.children_mut()),
            TaskKind::Task(_) => Err(ScheduleError::NotAGroup(group)),
        }
    }

    /// The single place a parent back-reference is reassigned.
    fn set_parent(&mut self, child: TaskId, parent: Option<TaskId>) -> ScheduleResult<()> {
        self.get_mut(child)?.set_parent(parent);
        Ok(())
    }

    fn detach(&mut self, child: TaskId) -> ScheduleResult<()> {
        match self.get(child)?.parent() {
            Some(parent) => {
                if let Ok(children) = self.group_children_mut(parent) {
                    children.retain(|id| *id != child);
                }
            }
            None => self.roots.retain(|id| *id != child),
        }
        self.set_parent(child, None)
    }

    /// `id` and everything below it, parents before children.
    pub fn subtree(&self, id: TaskId) -> ScheduleResult<Vec<TaskId>> {
        self.get(id)?;
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            result.push(current);
            if let Some(element) = self.elements.get(&current) {
                stack.extend(element.children().iter().rev().copied());
            }
        }
        Ok(result)
    }

    /// Deletes `id` and its whole subtree, along with every dependency touching them.
    pub fn remove_task(&mut self, id: TaskId) -> ScheduleResult<Vec<TaskId>> {
        let removed = self.subtree(id)?;
        self.detach(id)?;
        for task in &removed {
            self.elements.remove(task);
        }
        let gone: HashSet<TaskId> = removed.iter().copied().collect();
        let before = self.dependencies.len();
        self.dependencies
            .retain(|dep| !gone.contains(&dep.source()) && !gone.contains(&dep.destination()));
        tracing::debug!(
            task = %id,
            removed = removed.len(),
            dropped_dependencies = before - self.dependencies.len(),
            "removed task subtree"
        );
        Ok(removed)
    }

    pub fn default_work_hours(&self, id: TaskId) -> ScheduleResult<u32> {
        self.get(id)?.default_work_hours()
    }

    pub fn default_duration(&self, id: TaskId) -> ScheduleResult<Duration> {
        self.get(id)?.default_duration(self.config.hours_per_workday)
    }

    /// Allocates a resource to a leaf task and returns the allocation id.
    pub fn allocate(
        &mut self,
        id: TaskId,
        resource_id: impl Into<String>,
        allocation_units: f64,
    ) -> ScheduleResult<u32> {
        if !allocation_units.is_finite() || allocation_units < 0.0 {
            return Err(ScheduleError::InvalidArgument(format!(
                "allocation units must be a non-negative number (got {allocation_units})"
            )));
        }
        let allocation_id = self.next_allocation_id;
        let next_allocation_id = allocation_id
            .checked_add(1)
            .ok_or(ScheduleError::IdsExhausted("allocation"))?;
        let element = self.get_mut(id)?;
        let start = element.start_date();
        let TaskKind::Task(task) = element.kind_mut() else {
            return Err(ScheduleError::NotALeaf(id));
        };
        let mut allocation = ResourceAllocation::new(allocation_id, resource_id, allocation_units);
        allocation.start_date = start;
        task.push_allocation(allocation);
        self.next_allocation_id = next_allocation_id;
        Ok(allocation_id)
    }

    /// Allocations visible at `id`: a leaf's own, or the union over a group's descendants.
    pub fn resource_allocations(&self, id: TaskId) -> ScheduleResult<HashSet<&ResourceAllocation>> {
        let mut result = HashSet::new();
        for task in self.subtree(id)? {
            if let Some(element) = self.elements.get(&task) {
                result.extend(element.resource_allocations());
            }
        }
        Ok(result)
    }

    /// Moves `id` so it starts at `start`, keeping its length, and lets it re-anchor allocations.
    ///
    /// Moving a scheduled group shifts every scheduled descendant by the same offset.
    pub fn move_to(&mut self, id: TaskId, start: NaiveDate) -> ScheduleResult<()> {
        let previous = self.get(id)?.start_date();
        self.shift_element(id, start)?;
        if let Some(offset) = previous.map(|previous| start - previous) {
            if offset != Duration::zero() {
                for descendant in self.subtree(id)?.into_iter().skip(1) {
                    if let Some(current) = self.get(descendant)?.start_date() {
                        self.shift_element(descendant, current + offset)?;
                    }
                }
            }
        }
        tracing::debug!(task = %id, %start, "moved task");
        Ok(())
    }

    fn shift_element(&mut self, id: TaskId, start: NaiveDate) -> ScheduleResult<()> {
        let element = self.get_mut(id)?;
        let length = element.length().unwrap_or_else(Duration::zero);
        element.set_dates_unchecked(Some(start), Some(start + length));
        element.kind_mut().move_allocations(Some(start));
        Ok(())
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Registers an edge. Returns false when an equal dependency is already present.
    pub fn add_dependency(&mut self, dependency: Dependency) -> ScheduleResult<bool> {
        self.get(dependency.source())?;
        self.get(dependency.destination())?;
        if dependency.source() == dependency.destination() {
            return Err(ScheduleError::InvalidArgument(format!(
                "task {} cannot depend on itself",
                dependency.source()
            )));
        }
        if self.dependencies.contains(&dependency) {
            return Ok(false);
        }
        self.dependencies.push(dependency);
        tracing::debug!(%dependency, "added dependency");
        Ok(true)
    }

    pub fn connect(
        &mut self,
        source: TaskId,
        destination: TaskId,
        dependency_type: DependencyType,
    ) -> ScheduleResult<bool> {
        self.add_dependency(Dependency::new(source, destination, dependency_type))
    }

    pub fn remove_dependency(&mut self, dependency: &Dependency) -> bool {
        let before = self.dependencies.len();
        self.dependencies.retain(|dep| dep != dependency);
        before != self.dependencies.len()
    }

    /// Swaps the type of an existing edge, keeping its position among the dependencies.
    pub fn change_dependency_type(
        &mut self,
        dependency: &Dependency,
        dependency_type: DependencyType,
    ) -> ScheduleResult<Dependency> {
        let position = self
            .dependencies
            .iter()
            .position(|dep| dep == dependency)
            .ok_or(ScheduleError::DependencyNotFound(*dependency))?;
        let replacement = self.dependencies[position].create_with_type(dependency_type);
        if replacement != self.dependencies[position] && self.dependencies.contains(&replacement) {
            return Err(ScheduleError::DuplicateDependency(replacement));
        }
        self.dependencies[position] = replacement;
        Ok(replacement)
    }

    pub fn incoming(&self, id: TaskId) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|dep| dep.destination() == id)
            .collect()
    }

    pub fn outgoing(&self, id: TaskId) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|dep| dep.source() == id)
            .collect()
    }

    /// Incoming dependencies that bound the given endpoint of `id`.
    pub fn incoming_to(&self, id: TaskId, endpoint: Endpoint) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|dep| dep.destination() == id)
            .filter(|dep| dep.dependency_type().destination_endpoint() == endpoint)
            .collect()
    }

    /// Everything restricting the start of `id`: incoming dependencies first, then its own
    /// constraint.
    pub fn start_constraints_for(
        &self,
        id: TaskId,
    ) -> ScheduleResult<Vec<Constraint<NaiveDate>>> {
        let own = self.get(id)?.start_constraint().to_constraints();
        let mut result = Dependency::constraints_for_start(self, self.incoming(id))?;
        result.extend(own);
        Ok(result)
    }

    pub fn end_constraints_for(
        &self,
        id: TaskId,
    ) -> ScheduleResult<Vec<Constraint<NaiveDate>>> {
        self.get(id)?;
        Dependency::constraints_for_end(self, self.incoming(id))
    }

    /// Start for `id` at or after `current`, from incoming dependencies that bound its start.
    pub fn calculate_start(&self, id: TaskId, current: NaiveDate) -> ScheduleResult<NaiveDate> {
        self.get(id)?;
        Dependency::calculate_start_with(
            self.config.propagation_policy,
            self,
            id,
            current,
            self.incoming_to(id, Endpoint::Start),
        )
    }

    pub fn calculate_end(&self, id: TaskId, current: NaiveDate) -> ScheduleResult<NaiveDate> {
        self.get(id)?;
        Dependency::calculate_end_with(
            self.config.propagation_policy,
            self,
            id,
            current,
            self.incoming_to(id, Endpoint::End),
        )
    }

    /// Recomputes one task from its incoming dependencies. Returns whether it moved.
    pub fn propagate(&mut self, id: TaskId) -> ScheduleResult<bool> {
        Propagation::new(self).propagate_task(id)
    }

    /// Recomputes every task in dependency order.
    pub fn propagate_all(&mut self) -> ScheduleResult<PropagationSummary> {
        Propagation::new(self).execute()
    }

    pub fn validate(&self) -> Vec<Violation> {
        validation::validate_schedule(self)
    }

    pub fn new_objects(&self) -> Vec<TaskId> {
        self.elements
            .values()
            .filter(|element| element.is_new_object())
            .map(TaskElement::id)
            .collect()
    }

    pub fn mark_all_persisted(&mut self) {
        for element in self.elements.values_mut() {
            element.set_new_object(false);
        }
    }
}
