pub mod schedule_dag;

pub use schedule_dag::{DagEdge, ScheduleDag};
