pub mod action_model;
pub mod algorithm;
pub mod durations;
pub mod injector;
pub mod injectors;
pub mod problem;
pub mod propagator;
pub mod search;
pub mod slice;
pub mod store;
pub mod view;

pub use action_model::{NodeActionModel, VmActionModel, VmTransition};
pub use algorithm::{ReconfigurationAlgorithm, SolveOutcome};
pub use durations::{AttributeDuration, ConstantDuration, DurationEvaluator, DurationEvaluators};
pub use injector::{ConstraintMapper, Injector, InjectorBuilder};
pub use problem::ReconfigurationProblem;
pub use propagator::Propagator;
pub use search::{SearchBudget, SearchStatistics, Termination};
pub use slice::Slice;
pub use store::{Assignment, Contradiction, DomainStore, VarId};
pub use view::{SolverView, ViewBuilder, ViewMapper};
