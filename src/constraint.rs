use serde::{Deserialize, Serialize};

/// A restriction on a candidate value, usually a date.
///
/// Constraints are applied in sequence: each one either leaves the candidate
/// alone or narrows it. Ordering is whatever the producer returned, so callers
/// must apply a sequence in order to get deterministic results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Constraint<T> {
    /// Candidate must be at or after the bound.
    BiggerOrEqualThan(T),
    /// Candidate must be at or before the bound.
    LessOrEqualThan(T),
    /// Candidate is pinned to the value.
    Equal(T),
}

impl<T: Ord + Copy> Constraint<T> {
    pub fn bigger_or_equal_than(value: T) -> Self {
        Self::BiggerOrEqualThan(value)
    }

    pub fn less_or_equal_than(value: T) -> Self {
        Self::LessOrEqualThan(value)
    }

    pub fn equal_to(value: T) -> Self {
        Self::Equal(value)
    }

    pub fn bound(&self) -> T {
        match self {
            Constraint::BiggerOrEqualThan(v)
            | Constraint::LessOrEqualThan(v)
            | Constraint::Equal(v) => *v,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Constraint::BiggerOrEqualThan(_) => "bigger_or_equal_than",
            Constraint::LessOrEqualThan(_) => "less_or_equal_than",
            Constraint::Equal(_) => "equal",
        }
    }

    /// Returns the candidate narrowed so that it satisfies this constraint.
    pub fn apply_to(&self, value: T) -> T {
        match self {
            Constraint::BiggerOrEqualThan(bound) => value.max(*bound),
            Constraint::LessOrEqualThan(bound) => value.min(*bound),
            Constraint::Equal(fixed) => *fixed,
        }
    }

    pub fn is_satisfied_by(&self, value: T) -> bool {
        match self {
            Constraint::BiggerOrEqualThan(bound) => value >= *bound,
            Constraint::LessOrEqualThan(bound) => value <= *bound,
            Constraint::Equal(fixed) => value == *fixed,
        }
    }
}

/// Pipes `initial` through every constraint, in order.
pub fn apply_all<'a, T, I>(constraints: I, initial: T) -> T
where
    T: Ord + Copy + 'a,
    I: IntoIterator<Item = &'a Constraint<T>>,
{
    constraints
        .into_iter()
        .fold(initial, |value, constraint| constraint.apply_to(value))
}

/// Constraints from the sequence that `value` does not satisfy.
pub fn violated_by<'a, T, I>(constraints: I, value: T) -> Vec<&'a Constraint<T>>
where
    T: Ord + Copy + 'a,
    I: IntoIterator<Item = &'a Constraint<T>>,
{
    constraints
        .into_iter()
        .filter(|constraint| !constraint.is_satisfied_by(value))
        .collect()
}
