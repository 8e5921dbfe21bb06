use chrono::NaiveDate;
use gantt_core::{
    Constraint, Dependency, DependencyRecord, DependencyType, Endpoint, PropagationPolicy,
    Schedule, ScheduleError, TaskId,
};
use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn hash_of(dependency: &Dependency) -> u64 {
    let mut hasher = DefaultHasher::new();
    dependency.hash(&mut hasher);
    hasher.finish()
}

/// A ends 2025-01-10, B and C are plain leaves.
fn two_sources() -> (Schedule, TaskId, TaskId, TaskId) {
    let mut s = Schedule::new();
    let a = s.add_task("A").unwrap();
    let b = s.add_task("B").unwrap();
    let c = s.add_task("C").unwrap();
    s.set_dates(a, d(2025, 1, 6), d(2025, 1, 10)).unwrap();
    s.set_dates(b, d(2025, 1, 13), d(2025, 1, 20)).unwrap();
    (s, a, b, c)
}

#[test]
fn construction_rejects_every_missing_part() {
    let a = TaskId::new(1);
    let b = TaskId::new(2);
    for ty in DependencyType::ALL {
        assert!(Dependency::try_new(Some(a), Some(b), Some(ty), true).is_ok());
    }

    let missing = [
        (None, Some(b), Some(DependencyType::EndStart)),
        (Some(a), None, Some(DependencyType::EndStart)),
        (Some(a), Some(b), None),
    ];
    for (source, destination, ty) in missing {
        let err = Dependency::try_new(source, destination, ty, false).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidArgument(_)), "{err:?}");
    }
}

#[test]
fn record_conversion_goes_through_the_same_checks() {
    let record = DependencyRecord {
        source: Some(TaskId::new(3)),
        destination: None,
        dependency_type: Some(DependencyType::StartStart),
        visible: true,
    };
    assert!(matches!(
        Dependency::try_from(record),
        Err(ScheduleError::InvalidArgument(_))
    ));

    let dep = Dependency::with_visibility(
        TaskId::new(3),
        TaskId::new(4),
        DependencyType::EndEnd,
        false,
    );
    let back = Dependency::try_from(dep.to_record()).unwrap();
    assert_eq!(back, dep);
    assert!(!back.is_visible());
}

#[test]
fn visibility_does_not_affect_identity() {
    let a = TaskId::new(1);
    let b = TaskId::new(2);
    let shown = Dependency::with_visibility(a, b, DependencyType::EndStart, true);
    let hidden = Dependency::with_visibility(a, b, DependencyType::EndStart, false);
    assert_eq!(shown, hidden);
    assert_eq!(hash_of(&shown), hash_of(&hidden));

    let set: HashSet<Dependency> = [shown, hidden].into_iter().collect();
    assert_eq!(set.len(), 1);

    let other_type = Dependency::new(a, b, DependencyType::StartStart);
    assert_ne!(shown, other_type);
}

#[test]
fn create_with_type_keeps_everything_else() {
    let original = Dependency::with_visibility(
        TaskId::new(5),
        TaskId::new(6),
        DependencyType::EndStart,
        false,
    );
    let changed = original.create_with_type(DependencyType::StartEnd);
    assert_eq!(changed.dependency_type(), DependencyType::StartEnd);
    assert_eq!(changed.source(), original.source());
    assert_eq!(changed.destination(), original.destination());
    assert_eq!(changed.is_visible(), original.is_visible());
    assert_eq!(original.dependency_type(), DependencyType::EndStart);
}

#[test]
fn empty_collections_produce_nothing_and_change_nothing() {
    let (s, _, _, c) = two_sources();
    let none: Vec<Dependency> = Vec::new();
    assert!(Dependency::constraints_for_start(&s, &none).unwrap().is_empty());
    assert!(Dependency::constraints_for_end(&s, &none).unwrap().is_empty());
    assert_eq!(
        Dependency::calculate_start(&s, c, d(2025, 2, 1), &none).unwrap(),
        d(2025, 2, 1)
    );
    assert_eq!(
        Dependency::calculate_end(&s, c, d(2025, 2, 1), &none).unwrap(),
        d(2025, 2, 1)
    );
}

#[test]
fn single_dependency_matches_its_type_exactly() {
    let (s, a, _, c) = two_sources();
    let dep = Dependency::new(a, c, DependencyType::EndStart);
    let via_dependency = Dependency::constraints_for_start(&s, [&dep]).unwrap();
    let via_type = DependencyType::EndStart
        .start_constraints_for(s.get(a).unwrap())
        .unwrap();
    assert_eq!(via_dependency, via_type);
    assert_eq!(via_dependency, vec![Constraint::bigger_or_equal_than(d(2025, 1, 10))]);
}

#[test]
fn constraints_keep_dependency_order() {
    let (s, a, b, c) = two_sources();
    let deps = [
        Dependency::new(b, c, DependencyType::StartStart),
        Dependency::new(a, c, DependencyType::EndStart),
        Dependency::new(a, c, DependencyType::EndEnd),
    ];
    let start = Dependency::constraints_for_start(&s, &deps).unwrap();
    assert_eq!(
        start,
        vec![
            Constraint::bigger_or_equal_than(d(2025, 1, 13)),
            Constraint::bigger_or_equal_than(d(2025, 1, 10)),
        ]
    );
    let end = Dependency::constraints_for_end(&s, &deps).unwrap();
    assert_eq!(end, vec![Constraint::bigger_or_equal_than(d(2025, 1, 10))]);
}

#[test]
fn each_type_bounds_the_expected_endpoint() {
    let (s, a, _, _) = two_sources();
    let source = s.get(a).unwrap();
    let early = d(2025, 1, 1);
    let cases = [
        (DependencyType::EndStart, Endpoint::Start, d(2025, 1, 10)),
        (DependencyType::StartStart, Endpoint::Start, d(2025, 1, 6)),
        (DependencyType::EndEnd, Endpoint::End, d(2025, 1, 10)),
        (DependencyType::StartEnd, Endpoint::End, d(2025, 1, 6)),
    ];
    for (ty, endpoint, bound) in cases {
        assert_eq!(ty.destination_endpoint(), endpoint);
        let (start, end) = (
            ty.calculate_start_from_source(source, early).unwrap(),
            ty.calculate_end_from_source(source, early).unwrap(),
        );
        match endpoint {
            Endpoint::Start => assert_eq!((start, end), (bound, early), "{ty}"),
            Endpoint::End => assert_eq!((start, end), (early, bound), "{ty}"),
        }
        let late = d(2025, 3, 1);
        assert_eq!(ty.calculate_start_from_source(source, late).unwrap(), late);
        assert_eq!(ty.calculate_end_from_source(source, late).unwrap(), late);
    }
}

#[test]
fn last_dependency_wins_by_default() {
    let (s, a, b, c) = two_sources();
    let current = d(2025, 1, 1);
    // B starts on the 13th, A ends on the 10th: the later edge is A's.
    let deps = [
        Dependency::new(b, c, DependencyType::StartStart),
        Dependency::new(a, c, DependencyType::EndStart),
    ];
    assert_eq!(
        Dependency::calculate_start(&s, c, current, &deps).unwrap(),
        d(2025, 1, 10)
    );
    assert_eq!(
        Dependency::calculate_start_with(PropagationPolicy::LastWins, &s, c, current, &deps)
            .unwrap(),
        d(2025, 1, 10)
    );
}

#[test]
fn tightest_policy_keeps_every_lower_bound() {
    let (s, a, b, c) = two_sources();
    let current = d(2025, 1, 1);
    let deps = [
        Dependency::new(b, c, DependencyType::StartStart),
        Dependency::new(a, c, DependencyType::EndStart),
    ];
    assert_eq!(
        Dependency::calculate_start_with(PropagationPolicy::Tightest, &s, c, current, &deps)
            .unwrap(),
        d(2025, 1, 13)
    );
}

#[test]
fn unscheduled_source_is_reported() {
    let (s, a, _, c) = two_sources();
    let dep = Dependency::new(c, a, DependencyType::EndStart);
    let err = Dependency::calculate_start(&s, a, d(2025, 1, 1), [&dep]).unwrap_err();
    assert_eq!(
        err,
        ScheduleError::UnscheduledTask {
            task: c,
            endpoint: Endpoint::End
        }
    );
    assert!(Dependency::constraints_for_start(&s, [&dep]).is_err());
}

#[test]
fn schedule_rejects_self_edges_and_ignores_duplicates() {
    let (mut s, a, b, _) = two_sources();
    assert!(matches!(
        s.connect(a, a, DependencyType::EndStart),
        Err(ScheduleError::InvalidArgument(_))
    ));
    assert!(s.connect(a, b, DependencyType::EndStart).unwrap());
    let hidden = Dependency::with_visibility(a, b, DependencyType::EndStart, false);
    assert!(!s.add_dependency(hidden).unwrap());
    assert_eq!(s.dependencies().len(), 1);
    assert!(matches!(
        s.connect(a, TaskId::new(99), DependencyType::EndStart),
        Err(ScheduleError::TaskNotFound(_))
    ));
}

#[test]
fn changing_a_type_keeps_the_edge_in_place() {
    let (mut s, a, b, c) = two_sources();
    s.connect(a, c, DependencyType::EndStart).unwrap();
    s.connect(b, c, DependencyType::EndStart).unwrap();
    s.connect(a, b, DependencyType::StartStart).unwrap();

    let first = Dependency::new(a, c, DependencyType::EndStart);
    let replaced = s
        .change_dependency_type(&first, DependencyType::EndEnd)
        .unwrap();
    assert_eq!(s.dependencies()[0], replaced);
    assert_eq!(replaced.dependency_type(), DependencyType::EndEnd);

    let second = s
        .change_dependency_type(
            &Dependency::new(b, c, DependencyType::EndStart),
            DependencyType::EndEnd,
        )
        .unwrap();
    assert_eq!(s.dependencies()[1], second);

    s.connect(a, c, DependencyType::EndStart).unwrap();
    assert!(matches!(
        s.change_dependency_type(&first, DependencyType::EndEnd),
        Err(ScheduleError::DuplicateDependency(_))
    ));
    s.remove_dependency(&first);

    assert!(matches!(
        s.change_dependency_type(&first, DependencyType::StartStart),
        Err(ScheduleError::DependencyNotFound(_))
    ));
}
