use crate::constraint;
use crate::error::ScheduleResult;
use crate::graph::schedule_dag::ScheduleDag;
use crate::schedule::Schedule;
use crate::task::TaskId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationSummary {
    pub visited: usize,
    pub moved: Vec<TaskId>,
    pub skipped_unscheduled: Vec<TaskId>,
    pub refitted_groups: Vec<TaskId>,
}

impl PropagationSummary {
    pub fn to_cli_summary(&self) -> String {
        let mut parts = vec![format!("visited={}", self.visited)];
        parts.push(format!("moved={}", self.moved.len()));
        if !self.skipped_unscheduled.is_empty() {
            parts.push(format!("skipped={}", self.skipped_unscheduled.len()));
        }
        if !self.refitted_groups.is_empty() {
            parts.push(format!("groups={}", self.refitted_groups.len()));
        }
        parts.join(", ")
    }
}

/// Pushes tasks later until their incoming dependencies are satisfied.
pub struct Propagation<'a> {
    schedule: &'a mut Schedule,
}

impl<'a> Propagation<'a> {
    pub fn new(schedule: &'a mut Schedule) -> Self {
        Self { schedule }
    }

    /// Walks groups before their children and sources before destinations. Groups are
    /// fitted to their children both before and after the walk.
    pub fn execute(mut self) -> ScheduleResult<PropagationSummary> {
        let order = ScheduleDag::build_with_hierarchy(self.schedule).topological_order()?;
        let fit_groups = self.schedule.config().fit_groups_to_children;
        let mut summary = PropagationSummary::default();
        if fit_groups {
            summary.refitted_groups = self.fit_groups()?;
        }

        for id in order {
            if !self.schedule.get(id)?.is_scheduled() {
                tracing::warn!(task = %id, "skipping unscheduled task during propagation");
                summary.skipped_unscheduled.push(id);
                continue;
            }
            summary.visited += 1;
            if self.propagate_task(id)? {
                summary.moved.push(id);
            }
        }

        if fit_groups {
            for id in self.fit_groups()? {
                if !summary.refitted_groups.contains(&id) {
                    summary.refitted_groups.push(id);
                }
            }
        }

        tracing::info!(
            visited = summary.visited,
            moved = summary.moved.len(),
            skipped = summary.skipped_unscheduled.len(),
            "propagation finished"
        );
        Ok(summary)
    }

    /// Start from start-side dependencies, let end-side dependencies push the whole task
    /// later, then apply the task's own start constraint. Length is preserved.
    pub fn propagate_task(&mut self, id: TaskId) -> ScheduleResult<bool> {
        let element = self.schedule.get(id)?;
        let (Some(start), Some(end)) = (element.start_date(), element.end_date()) else {
            return Ok(false);
        };
        let length = end - start;
        let own = element.start_constraint().to_constraints();

        let mut new_start = self.schedule.calculate_start(id, start)?;
        let candidate_end = new_start + length;
        let new_end = self.schedule.calculate_end(id, candidate_end)?;
        if new_end > candidate_end {
            new_start = new_end - length;
        }
        new_start = constraint::apply_all(&own, new_start);

        if new_start == start {
            return Ok(false);
        }
        self.schedule.move_to(id, new_start)?;
        Ok(true)
    }

    /// Fits every group to [earliest child start, latest child end), innermost groups first.
    fn fit_groups(&mut self) -> ScheduleResult<Vec<TaskId>> {
        let mut pre_order = Vec::new();
        for root in self.schedule.roots().to_vec() {
            pre_order.extend(self.schedule.subtree(root)?);
        }

        let mut refitted = Vec::new();
        for id in pre_order.into_iter().rev() {
            let element = self.schedule.get(id)?;
            if element.is_leaf() {
                continue;
            }
            let Some((start, end)) = self.children_bounds(element.children()) else {
                continue;
            };
            if element.start_date() != Some(start) || element.end_date() != Some(end) {
                self.schedule.set_dates(id, start, end)?;
                refitted.push(id);
            }
        }
        Ok(refitted)
    }

    fn children_bounds(&self, children: &[TaskId]) -> Option<(NaiveDate, NaiveDate)> {
        let scheduled = children
            .iter()
            .filter_map(|child| self.schedule.task(*child))
            .filter_map(|child| child.start_date().zip(child.end_date()));
        scheduled.fold(None, |acc, (start, end)| match acc {
            None => Some((start, end)),
            Some((lo, hi)) => Some((lo.min(start), hi.max(end))),
        })
    }
}
