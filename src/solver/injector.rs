//! Constraint injection: translating declarative constraints into
//! propagators over the problem variables.

use std::collections::BTreeMap;

use crate::constraint::SatConstraint;
use crate::error::Result;
use crate::solver::injectors;
use crate::solver::problem::ReconfigurationProblem;

/// Translates one declarative constraint into solver state.
///
/// An injector reads the already-built action models, propagates directly on
/// elements that are already fixed (failing fast with a diagnostic naming
/// the offending subjects on a contradiction) and posts deferred propagators
/// for everything else. Injectors never mutate the source model.
pub trait Injector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()>;
}

/// Builds the injector for one constraint instance, or `None` when the
/// constraint is not the kind this builder handles.
pub type InjectorBuilder = Box<dyn Fn(&SatConstraint) -> Option<Box<dyn Injector>>>;

/// The runtime registry mapping a constraint kind tag to its injector
/// builder.
pub struct ConstraintMapper {
    table: BTreeMap<String, InjectorBuilder>,
}

impl ConstraintMapper {
    /// An empty registry.
    pub fn new() -> Self {
        Self { table: BTreeMap::new() }
    }

    /// The registry with every built-in constraint kind.
    pub fn with_defaults() -> Self {
        let mut mapper = Self::new();
        mapper.register("gather", Box::new(injectors::placement::build_gather));
        mapper.register("split", Box::new(injectors::placement::build_split));
        mapper.register("splitAmong", Box::new(injectors::placement::build_split_among));
        mapper.register("quarantine", Box::new(injectors::placement::build_quarantine));
        mapper.register("root", Box::new(injectors::placement::build_root));
        mapper.register("running", Box::new(injectors::state::build_running));
        mapper.register("ready", Box::new(injectors::state::build_ready));
        mapper.register("sleeping", Box::new(injectors::state::build_sleeping));
        mapper.register("online", Box::new(injectors::state::build_online));
        mapper.register("offline", Box::new(injectors::state::build_offline));
        mapper.register("cumulatedRunningCapacity", Box::new(injectors::capacity::build_cumulated_running_capacity));
        mapper.register("syncEnd", Box::new(injectors::sync::build_sync_end));
        mapper
    }

    /// Register a builder for a kind tag.
    ///
    /// # Returns
    /// `true` if a previous builder was replaced.
    pub fn register(&mut self, tag: &str, builder: InjectorBuilder) -> bool {
        self.table.insert(tag.to_string(), builder).is_some()
    }

    pub fn unregister(&mut self, tag: &str) -> bool {
        self.table.remove(tag).is_some()
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.table.contains_key(tag)
    }

    /// The injector for `c`, or `None` when its kind is unknown to this
    /// registry.
    pub fn build(&self, c: &SatConstraint) -> Option<Box<dyn Injector>> {
        self.table.get(c.tag()).and_then(|builder| builder(c))
    }
}

impl Default for ConstraintMapper {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vm;

    #[test]
    fn defaults_cover_every_kind() {
        let mapper = ConstraintMapper::with_defaults();
        for c in [
            SatConstraint::gather([Vm(1)]),
            SatConstraint::split(vec![[Vm(1)].into()]),
            SatConstraint::root([Vm(1)]),
            SatConstraint::sync_end([Vm(1)]),
        ] {
            assert!(mapper.is_registered(c.tag()));
            assert!(mapper.build(&c).is_some());
        }
    }

    #[test]
    fn unknown_kind_yields_none() {
        let mut mapper = ConstraintMapper::with_defaults();
        let c = SatConstraint::gather([Vm(1)]);
        assert!(mapper.unregister("gather"));
        assert!(!mapper.unregister("gather"));
        assert!(mapper.build(&c).is_none());
    }

    #[test]
    fn mismatched_builder_yields_none() {
        let mut mapper = ConstraintMapper::new();
        // A builder registered under the wrong tag refuses the instance
        mapper.register("gather", Box::new(injectors::placement::build_root));
        assert!(mapper.build(&SatConstraint::gather([Vm(1)])).is_none());
    }
}
