use crate::dependency_type::DependencyType;
use crate::error::{ScheduleError, ScheduleResult};
use crate::schedule::Schedule;
use crate::task::TaskId;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Why one node must be handled before another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DagEdge {
    Dependency(DependencyType),
    /// Parent group to child.
    Hierarchy,
}

/// Dependency graph of a schedule: one node per element, one edge per dependency.
pub struct ScheduleDag {
    pub graph: DiGraph<TaskId, DagEdge>,
    pub id_to_index: HashMap<TaskId, NodeIndex>,
}

impl ScheduleDag {
    pub fn build(schedule: &Schedule) -> Self {
        let mut graph: DiGraph<TaskId, DagEdge> = DiGraph::new();
        let mut id_to_index: HashMap<TaskId, NodeIndex> = HashMap::new();

        // Add nodes first
        for element in schedule.tasks() {
            let node_ix = graph.add_node(element.id());
            id_to_index.insert(element.id(), node_ix);
        }

        // Edges point from source to destination; dangling ones are left for validation
        for dependency in schedule.dependencies() {
            if let (Some(&u), Some(&v)) = (
                id_to_index.get(&dependency.source()),
                id_to_index.get(&dependency.destination()),
            ) {
                graph.add_edge(u, v, DagEdge::Dependency(dependency.dependency_type()));
            }
        }

        Self { graph, id_to_index }
    }

    /// Like [`ScheduleDag::build`], plus an edge from every group to each of its children,
    /// so a group is ordered before everything it contains.
    pub fn build_with_hierarchy(schedule: &Schedule) -> Self {
        let mut dag = Self::build(schedule);
        for element in schedule.tasks() {
            let Some(&parent) = dag.id_to_index.get(&element.id()) else {
                continue;
            };
            for child in element.children() {
                if let Some(&child) = dag.id_to_index.get(child) {
                    dag.graph.add_edge(parent, child, DagEdge::Hierarchy);
                }
            }
        }
        dag
    }

    /// Task ids with every source before its destinations.
    pub fn topological_order(&self) -> ScheduleResult<Vec<TaskId>> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|ix| self.graph[ix]).collect())
            .map_err(|cycle| ScheduleError::DependencyCycle(self.graph[cycle.node_id()]))
    }

    /// Every group of tasks that depend on each other in a loop, self loops included.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self
                        .graph
                        .find_edge(component[0], component[0])
                        .is_some()
            })
            .map(|component| {
                let mut ids: Vec<TaskId> =
                    component.into_iter().map(|ix| self.graph[ix]).collect();
                ids.sort();
                ids
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Dependency;

    #[test]
    fn builds_one_edge_per_dependency() {
        let mut s = Schedule::new();
        let a = s.add_task("A").unwrap();
        let b = s.add_task("B").unwrap();
        let c = s.add_task("C").unwrap();
        s.connect(a, b, DependencyType::EndStart).unwrap();
        s.connect(a, c, DependencyType::StartStart).unwrap();

        let dag = ScheduleDag::build(&s);
        assert_eq!(dag.graph.node_count(), 3);
        assert_eq!(dag.graph.edge_count(), 2);

        let order = dag.topological_order().unwrap();
        let pos = |id| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
        assert!(dag.cycles().is_empty());
    }

    #[test]
    fn reports_cycles() {
        let mut s = Schedule::new();
        let a = s.add_task("A").unwrap();
        let b = s.add_task("B").unwrap();
        s.add_dependency(Dependency::new(a, b, DependencyType::EndStart)).unwrap();
        s.add_dependency(Dependency::new(b, a, DependencyType::EndStart)).unwrap();

        let dag = ScheduleDag::build(&s);
        assert!(matches!(
            dag.topological_order(),
            Err(ScheduleError::DependencyCycle(_))
        ));
        assert_eq!(dag.cycles(), vec![vec![a, b]]);
    }

    #[test]
    fn hierarchy_edges_order_groups_before_children() {
        let mut s = Schedule::new();
        let c = s.add_task("C").unwrap();
        let g = s.add_group("G", None).unwrap();
        s.add_task_element(g, c).unwrap();

        assert_eq!(ScheduleDag::build(&s).graph.edge_count(), 0);
        let dag = ScheduleDag::build_with_hierarchy(&s);
        assert_eq!(dag.graph.edge_count(), 1);
        assert_eq!(dag.topological_order().unwrap(), vec![g, c]);
    }

    #[test]
    fn dependency_from_child_into_its_group_is_a_cycle_for_propagation() {
        let mut s = Schedule::new();
        let g = s.add_group("G", None).unwrap();
        let c = s.add_task("C").unwrap();
        s.add_task_element(g, c).unwrap();
        s.connect(c, g, DependencyType::EndEnd).unwrap();

        assert!(ScheduleDag::build(&s).cycles().is_empty());
        assert!(matches!(
            ScheduleDag::build_with_hierarchy(&s).topological_order(),
            Err(ScheduleError::DependencyCycle(_))
        ));
    }
}
