pub mod action;
pub mod comparator;
pub mod plan;

pub use action::{Action, ActionKind};
pub use comparator::TimedActionComparator;
pub use plan::ReconfigurationPlan;
