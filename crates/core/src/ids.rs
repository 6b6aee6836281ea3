use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a loaded strategy.
///
/// Dense and 1-based: the router assigns ids in load order. Zero means the
/// strategy has not been loaded yet.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct StrategyId(u32);

impl StrategyId {
    /// Placeholder for a strategy that has not been assigned an id.
    pub const UNASSIGNED: StrategyId = StrategyId(0);

    pub fn new(id: u32) -> Self {
        StrategyId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Whether the router has assigned this id.
    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
