use crate::config::PropagationPolicy;
use crate::constraint::Constraint;
use crate::dependency_type::DependencyType;
use crate::error::{Endpoint, ScheduleError, ScheduleResult};
use crate::task::{TaskElement, TaskId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Resolves task handles to the elements they point at.
pub trait TaskLookup {
    fn lookup(&self, id: TaskId) -> Option<&TaskElement>;

    fn require(&self, id: TaskId) -> ScheduleResult<&TaskElement> {
        self.lookup(id).ok_or(ScheduleError::TaskNotFound(id))
    }
}

impl TaskLookup for std::collections::BTreeMap<TaskId, TaskElement> {
    fn lookup(&self, id: TaskId) -> Option<&TaskElement> {
        self.get(&id)
    }
}

/// A directed, typed precedence edge between two tasks.
///
/// Identity is `(source, destination, type)`; visibility is presentation only and
/// does not take part in equality or hashing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dependency {
    source: TaskId,
    destination: TaskId,
    #[serde(rename = "type")]
    dependency_type: DependencyType,
    visible: bool,
}

/// A dependency as a persistence layer materializes it, before any checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    #[serde(default)]
    pub source: Option<TaskId>,
    #[serde(default)]
    pub destination: Option<TaskId>,
    #[serde(default, rename = "type")]
    pub dependency_type: Option<DependencyType>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Dependency {
    pub fn new(source: TaskId, destination: TaskId, dependency_type: DependencyType) -> Self {
        Self::with_visibility(source, destination, dependency_type, true)
    }

    pub fn with_visibility(
        source: TaskId,
        destination: TaskId,
        dependency_type: DependencyType,
        visible: bool,
    ) -> Self {
        Self {
            source,
            destination,
            dependency_type,
            visible,
        }
    }

    /// Builds a dependency from possibly-absent parts, rejecting any missing one.
    pub fn try_new(
        source: Option<TaskId>,
        destination: Option<TaskId>,
        dependency_type: Option<DependencyType>,
        visible: bool,
    ) -> ScheduleResult<Self> {
        let source =
            source.ok_or_else(|| ScheduleError::InvalidArgument("source cannot be absent".into()))?;
        let destination = destination
            .ok_or_else(|| ScheduleError::InvalidArgument("destination cannot be absent".into()))?;
        let dependency_type = dependency_type
            .ok_or_else(|| ScheduleError::InvalidArgument("type cannot be absent".into()))?;
        Ok(Self::with_visibility(
            source,
            destination,
            dependency_type,
            visible,
        ))
    }

    pub fn source(&self) -> TaskId {
        self.source
    }

    pub fn destination(&self) -> TaskId {
        self.destination
    }

    pub fn dependency_type(&self) -> DependencyType {
        self.dependency_type
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Same endpoints and visibility, different type. `self` is left untouched.
    pub fn create_with_type(&self, dependency_type: DependencyType) -> Self {
        Self::with_visibility(self.source, self.destination, dependency_type, self.visible)
    }

    pub fn to_record(&self) -> DependencyRecord {
        DependencyRecord {
            source: Some(self.source),
            destination: Some(self.destination),
            dependency_type: Some(self.dependency_type),
            visible: self.visible,
        }
    }

    /// Start-date restrictions imposed by `dependencies`, in iteration order and then
    /// in the order each type produced them.
    pub fn constraints_for_start<'a, L, I>(
        tasks: &L,
        dependencies: I,
    ) -> ScheduleResult<Vec<Constraint<NaiveDate>>>
    where
        L: TaskLookup + ?Sized,
        I: IntoIterator<Item = &'a Dependency>,
    {
        Self::constraints_for(tasks, dependencies, Endpoint::Start)
    }

    pub fn constraints_for_end<'a, L, I>(
        tasks: &L,
        dependencies: I,
    ) -> ScheduleResult<Vec<Constraint<NaiveDate>>>
    where
        L: TaskLookup + ?Sized,
        I: IntoIterator<Item = &'a Dependency>,
    {
        Self::constraints_for(tasks, dependencies, Endpoint::End)
    }

    /// Start date for `origin` given its proposed `current` start, last dependency wins.
    ///
    /// With no dependencies the proposal comes back unchanged.
    pub fn calculate_start<'a, L, I>(
        tasks: &L,
        origin: TaskId,
        current: NaiveDate,
        dependencies: I,
    ) -> ScheduleResult<NaiveDate>
    where
        L: TaskLookup + ?Sized,
        I: IntoIterator<Item = &'a Dependency>,
    {
        Self::calculate_start_with(
            PropagationPolicy::LastWins,
            tasks,
            origin,
            current,
            dependencies,
        )
    }

    pub fn calculate_end<'a, L, I>(
        tasks: &L,
        origin: TaskId,
        current: NaiveDate,
        dependencies: I,
    ) -> ScheduleResult<NaiveDate>
    where
        L: TaskLookup + ?Sized,
        I: IntoIterator<Item = &'a Dependency>,
    {
        Self::calculate_end_with(PropagationPolicy::LastWins, tasks, origin, current, dependencies)
    }

    pub fn calculate_start_with<'a, L, I>(
        policy: PropagationPolicy,
        tasks: &L,
        origin: TaskId,
        current: NaiveDate,
        dependencies: I,
    ) -> ScheduleResult<NaiveDate>
    where
        L: TaskLookup + ?Sized,
        I: IntoIterator<Item = &'a Dependency>,
    {
        Self::apply(policy, Endpoint::Start, tasks, origin, current, dependencies)
    }

    pub fn calculate_end_with<'a, L, I>(
        policy: PropagationPolicy,
        tasks: &L,
        origin: TaskId,
        current: NaiveDate,
        dependencies: I,
    ) -> ScheduleResult<NaiveDate>
    where
        L: TaskLookup + ?Sized,
        I: IntoIterator<Item = &'a Dependency>,
    {
        Self::apply(policy, Endpoint::End, tasks, origin, current, dependencies)
    }

    fn constraints_for<'a, L, I>(
        tasks: &L,
        dependencies: I,
        endpoint: Endpoint,
    ) -> ScheduleResult<Vec<Constraint<NaiveDate>>>
    where
        L: TaskLookup + ?Sized,
        I: IntoIterator<Item = &'a Dependency>,
    {
        let mut result = Vec::new();
        for dependency in dependencies {
            let source = tasks.require(dependency.source)?;
            let constraints = match endpoint {
                Endpoint::Start => dependency.dependency_type.start_constraints_for(source)?,
                Endpoint::End => dependency.dependency_type.end_constraints_for(source)?,
            };
            result.extend(constraints);
        }
        Ok(result)
    }

    fn apply<'a, L, I>(
        policy: PropagationPolicy,
        endpoint: Endpoint,
        tasks: &L,
        origin: TaskId,
        current: NaiveDate,
        dependencies: I,
    ) -> ScheduleResult<NaiveDate>
    where
        L: TaskLookup + ?Sized,
        I: IntoIterator<Item = &'a Dependency>,
    {
        let mut result = current;
        for dependency in dependencies {
            let source = tasks.require(dependency.source)?;
            let proposed = match policy {
                PropagationPolicy::LastWins => current,
                PropagationPolicy::Tightest => result,
            };
            result = match endpoint {
                Endpoint::Start => dependency
                    .dependency_type
                    .calculate_start_from_source(source, proposed)?,
                Endpoint::End => dependency
                    .dependency_type
                    .calculate_end_from_source(source, proposed)?,
            };
            tracing::trace!(
                task = %origin,
                %dependency,
                %endpoint,
                %result,
                "evaluated dependency"
            );
        }
        Ok(result)
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.destination == other.destination
            && self.dependency_type == other.dependency_type
    }
}

impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.destination.hash(state);
        self.dependency_type.hash(state);
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -[{}]-> {}",
            self.source, self.dependency_type, self.destination
        )
    }
}

impl TryFrom<DependencyRecord> for Dependency {
    type Error = ScheduleError;

    fn try_from(record: DependencyRecord) -> Result<Self, Self::Error> {
        Dependency::try_new(
            record.source,
            record.destination,
            record.dependency_type,
            record.visible,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskKind};
    use std::collections::{BTreeMap, HashSet};

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tasks() -> BTreeMap<TaskId, TaskElement> {
        let mut map = BTreeMap::new();
        for (raw, start, end) in [
            (1, d(2025, 1, 6), d(2025, 1, 10)),
            (2, d(2025, 1, 8), d(2025, 1, 15)),
            (3, d(2025, 1, 1), d(2025, 1, 3)),
        ] {
            let id = TaskId::new(raw);
            let mut element =
                TaskElement::new(id, format!("T{raw}"), TaskKind::Task(Task::default()));
            element.set_dates(start, end).unwrap();
            map.insert(id, element);
        }
        map
    }

    #[test]
    fn try_new_rejects_each_missing_part() {
        let a = Some(TaskId::new(1));
        let b = Some(TaskId::new(2));
        let ty = Some(DependencyType::EndStart);
        assert!(Dependency::try_new(a, b, ty, true).is_ok());
        for (src, dst, t) in [(None, b, ty), (a, None, ty), (a, b, None)] {
            assert!(matches!(
                Dependency::try_new(src, dst, t, true),
                Err(ScheduleError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn visibility_is_not_part_of_identity() {
        let a = TaskId::new(1);
        let b = TaskId::new(2);
        let shown = Dependency::with_visibility(a, b, DependencyType::EndStart, true);
        let hidden = Dependency::with_visibility(a, b, DependencyType::EndStart, false);
        assert_eq!(shown, hidden);

        let set: HashSet<Dependency> = [shown, hidden].into_iter().collect();
        assert_eq!(set.len(), 1);

        assert_ne!(shown, shown.create_with_type(DependencyType::StartStart));
    }

    #[test]
    fn create_with_type_copies_endpoints_and_visibility() {
        let original = Dependency::with_visibility(
            TaskId::new(4),
            TaskId::new(5),
            DependencyType::EndStart,
            false,
        );
        let retyped = original.create_with_type(DependencyType::EndEnd);
        assert_eq!(retyped.dependency_type(), DependencyType::EndEnd);
        assert_eq!(retyped.source(), original.source());
        assert_eq!(retyped.destination(), original.destination());
        assert_eq!(retyped.is_visible(), original.is_visible());
        assert_eq!(original.dependency_type(), DependencyType::EndStart);
    }

    #[test]
    fn empty_collections_produce_nothing() {
        let map = tasks();
        let none: Vec<Dependency> = Vec::new();
        assert!(Dependency::constraints_for_start(&map, &none).unwrap().is_empty());
        assert!(Dependency::constraints_for_end(&map, &none).unwrap().is_empty());
        assert_eq!(
            Dependency::calculate_start(&map, TaskId::new(2), d(2025, 2, 1), &none).unwrap(),
            d(2025, 2, 1)
        );
    }

    #[test]
    fn single_dependency_matches_its_type() {
        let map = tasks();
        let dep = Dependency::new(TaskId::new(1), TaskId::new(2), DependencyType::EndStart);
        assert_eq!(
            Dependency::constraints_for_start(&map, [&dep]).unwrap(),
            DependencyType::EndStart
                .start_constraints_for(&map[&TaskId::new(1)])
                .unwrap()
        );
    }

    #[test]
    fn aggregation_preserves_dependency_order() {
        let map = tasks();
        let deps = [
            Dependency::new(TaskId::new(3), TaskId::new(2), DependencyType::EndStart),
            Dependency::new(TaskId::new(1), TaskId::new(2), DependencyType::StartStart),
        ];
        assert_eq!(
            Dependency::constraints_for_start(&map, &deps).unwrap(),
            vec![
                Constraint::BiggerOrEqualThan(d(2025, 1, 3)),
                Constraint::BiggerOrEqualThan(d(2025, 1, 6)),
            ]
        );
    }

    #[test]
    fn last_wins_keeps_only_the_final_dependency() {
        let map = tasks();
        // Source 1 ends on the 10th, source 3 ends on the 3rd.
        let deps = [
            Dependency::new(TaskId::new(1), TaskId::new(2), DependencyType::EndStart),
            Dependency::new(TaskId::new(3), TaskId::new(2), DependencyType::EndStart),
        ];
        let current = d(2025, 1, 2);
        assert_eq!(
            Dependency::calculate_start(&map, TaskId::new(2), current, &deps).unwrap(),
            d(2025, 1, 3)
        );
        assert_eq!(
            Dependency::calculate_start_with(
                PropagationPolicy::Tightest,
                &map,
                TaskId::new(2),
                current,
                &deps
            )
            .unwrap(),
            d(2025, 1, 10)
        );
    }

    #[test]
    fn unknown_source_is_reported() {
        let map = tasks();
        let dep = Dependency::new(TaskId::new(42), TaskId::new(2), DependencyType::EndStart);
        assert_eq!(
            Dependency::calculate_end(&map, TaskId::new(2), d(2025, 1, 1), [&dep]),
            Err(ScheduleError::TaskNotFound(TaskId::new(42)))
        );
    }

    #[test]
    fn record_conversion_applies_the_same_checks() {
        let record = DependencyRecord {
            source: Some(TaskId::new(1)),
            destination: None,
            dependency_type: Some(DependencyType::EndEnd),
            visible: true,
        };
        assert!(Dependency::try_from(record).is_err());

        let dep = Dependency::new(TaskId::new(1), TaskId::new(2), DependencyType::EndEnd);
        assert_eq!(Dependency::try_from(dep.to_record()), Ok(dep));
    }
}
