use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Represents an allocation of a resource (person, equipment, cost bucket) to a leaf task.
///
/// Allocations are entities: two allocations are the same allocation when their ids match,
/// whatever their other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAllocation {
    /// Identifier handed out by the owning schedule.
    pub id: u32,
    /// Identifier for the resource. This can be a person id, crew name, or equipment tag.
    pub resource_id: String,
    /// Optional role or description for the resource while working on the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Planned units for the allocation (e.g., hours or FTE-days). Must be non-negative.
    pub allocation_units: f64,
    /// Day the allocation is anchored at. Follows the task when it moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

impl ResourceAllocation {
    pub fn new(id: u32, resource_id: impl Into<String>, allocation_units: f64) -> Self {
        Self {
            id,
            resource_id: resource_id.into(),
            role: None,
            allocation_units,
            start_date: None,
        }
    }
}

impl PartialEq for ResourceAllocation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResourceAllocation {}

impl Hash for ResourceAllocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
