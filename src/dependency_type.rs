use crate::constraint::Constraint;
use crate::error::{Endpoint, ScheduleResult};
use crate::task::TaskElement;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of precedence relation. Names read source endpoint first, then destination endpoint.
///
/// Every variant is a lower bound on one endpoint of the destination task. None of the
/// functions touch the source task; they only read the endpoint the variant depends on,
/// and fail with `UnscheduledTask` when that endpoint is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Destination starts at or after the source ends.
    EndStart,
    /// Destination starts at or after the source starts.
    StartStart,
    /// Destination ends at or after the source ends.
    EndEnd,
    /// Destination ends at or after the source starts.
    StartEnd,
}

impl DependencyType {
    pub const ALL: [DependencyType; 4] = [
        DependencyType::EndStart,
        DependencyType::StartStart,
        DependencyType::EndEnd,
        DependencyType::StartEnd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::EndStart => "end_start",
            DependencyType::StartStart => "start_start",
            DependencyType::EndEnd => "end_end",
            DependencyType::StartEnd => "start_end",
        }
    }

    /// Source endpoint this relation reads.
    pub fn source_endpoint(&self) -> Endpoint {
        match self {
            DependencyType::EndStart | DependencyType::EndEnd => Endpoint::End,
            DependencyType::StartStart | DependencyType::StartEnd => Endpoint::Start,
        }
    }

    /// Destination endpoint this relation constrains.
    pub fn destination_endpoint(&self) -> Endpoint {
        match self {
            DependencyType::EndStart | DependencyType::StartStart => Endpoint::Start,
            DependencyType::EndEnd | DependencyType::StartEnd => Endpoint::End,
        }
    }

    pub fn start_constraints_for(
        &self,
        source: &TaskElement,
    ) -> ScheduleResult<Vec<Constraint<NaiveDate>>> {
        self.constraints_on(Endpoint::Start, source)
    }

    pub fn end_constraints_for(
        &self,
        source: &TaskElement,
    ) -> ScheduleResult<Vec<Constraint<NaiveDate>>> {
        self.constraints_on(Endpoint::End, source)
    }

    pub fn calculate_start_from_source(
        &self,
        source: &TaskElement,
        proposed: NaiveDate,
    ) -> ScheduleResult<NaiveDate> {
        self.calculate_on(Endpoint::Start, source, proposed)
    }

    pub fn calculate_end_from_source(
        &self,
        source: &TaskElement,
        proposed: NaiveDate,
    ) -> ScheduleResult<NaiveDate> {
        self.calculate_on(Endpoint::End, source, proposed)
    }

    fn constraints_on(
        &self,
        destination: Endpoint,
        source: &TaskElement,
    ) -> ScheduleResult<Vec<Constraint<NaiveDate>>> {
        if destination != self.destination_endpoint() {
            return Ok(Vec::new());
        }
        let bound = source.require_date(self.source_endpoint())?;
        Ok(vec![Constraint::bigger_or_equal_than(bound)])
    }

    fn calculate_on(
        &self,
        destination: Endpoint,
        source: &TaskElement,
        proposed: NaiveDate,
    ) -> ScheduleResult<NaiveDate> {
        if destination != self.destination_endpoint() {
            return Ok(proposed);
        }
        let bound = source.require_date(self.source_endpoint())?;
        Ok(bound.max(proposed))
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "end_start" | "es" => Ok(DependencyType::EndStart),
            "start_start" | "ss" => Ok(DependencyType::StartStart),
            "end_end" | "ee" => Ok(DependencyType::EndEnd),
            "start_end" | "se" => Ok(DependencyType::StartEnd),
            other => Err(format!("unknown dependency type '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScheduleError;
    use crate::task::{Task, TaskId, TaskKind};

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn source(start: NaiveDate, end: NaiveDate) -> TaskElement {
        let mut task = TaskElement::new(TaskId::new(1), "source", TaskKind::Task(Task::default()));
        task.set_dates(start, end).unwrap();
        task
    }

    #[test]
    fn end_start_bounds_destination_start_by_source_end() {
        let src = source(d(2025, 1, 6), d(2025, 1, 10));
        let ty = DependencyType::EndStart;
        assert_eq!(
            ty.start_constraints_for(&src).unwrap(),
            vec![Constraint::BiggerOrEqualThan(d(2025, 1, 10))]
        );
        assert!(ty.end_constraints_for(&src).unwrap().is_empty());
        assert_eq!(ty.calculate_start_from_source(&src, d(2025, 1, 7)).unwrap(), d(2025, 1, 10));
        assert_eq!(ty.calculate_start_from_source(&src, d(2025, 1, 20)).unwrap(), d(2025, 1, 20));
        assert_eq!(ty.calculate_end_from_source(&src, d(2025, 1, 7)).unwrap(), d(2025, 1, 7));
    }

    #[test]
    fn start_start_uses_source_start() {
        let src = source(d(2025, 1, 6), d(2025, 1, 10));
        let ty = DependencyType::StartStart;
        assert_eq!(ty.calculate_start_from_source(&src, d(2025, 1, 1)).unwrap(), d(2025, 1, 6));
        assert_eq!(
            ty.start_constraints_for(&src).unwrap(),
            vec![Constraint::BiggerOrEqualThan(d(2025, 1, 6))]
        );
    }

    #[test]
    fn end_end_and_start_end_bound_the_destination_end() {
        let src = source(d(2025, 1, 6), d(2025, 1, 10));
        assert_eq!(
            DependencyType::EndEnd.calculate_end_from_source(&src, d(2025, 1, 8)).unwrap(),
            d(2025, 1, 10)
        );
        assert_eq!(
            DependencyType::StartEnd.calculate_end_from_source(&src, d(2025, 1, 2)).unwrap(),
            d(2025, 1, 6)
        );
        assert!(DependencyType::EndEnd.start_constraints_for(&src).unwrap().is_empty());
        assert_eq!(
            DependencyType::EndEnd.calculate_start_from_source(&src, d(2025, 1, 2)).unwrap(),
            d(2025, 1, 2)
        );
    }

    #[test]
    fn unscheduled_source_fails_only_when_read() {
        let src = TaskElement::new(TaskId::new(9), "bare", TaskKind::Task(Task::default()));
        assert_eq!(
            DependencyType::EndStart.start_constraints_for(&src),
            Err(ScheduleError::UnscheduledTask {
                task: TaskId::new(9),
                endpoint: Endpoint::End,
            })
        );
        assert!(DependencyType::EndStart.end_constraints_for(&src).unwrap().is_empty());
    }

    #[test]
    fn parses_long_and_short_names() {
        for ty in DependencyType::ALL {
            assert_eq!(ty.as_str().parse::<DependencyType>(), Ok(ty));
        }
        assert_eq!("SE".parse::<DependencyType>(), Ok(DependencyType::StartEnd));
        assert!("sideways".parse::<DependencyType>().is_err());
    }
}
