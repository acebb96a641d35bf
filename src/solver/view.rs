//! Solver-side views: translating model views into propagators.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::{ModelView, ShareableResource, VmState, SHAREABLE_KIND};
use crate::solver::problem::ReconfigurationProblem;
use crate::solver::propagator::Propagator;

/// The solver-side counterpart of one model view.
pub trait SolverView {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()>;
}

/// Builds the solver view for one model view instance, or `None` when the
/// view is not the kind this builder handles.
pub type ViewBuilder = Box<dyn Fn(&ModelView) -> Option<Box<dyn SolverView>>>;

/// The runtime registry mapping a view kind tag to its solver-view builder.
pub struct ViewMapper {
    table: BTreeMap<String, ViewBuilder>,
}

impl ViewMapper {
    pub fn new() -> Self {
        Self { table: BTreeMap::new() }
    }

    /// The registry with every built-in view kind.
    pub fn with_defaults() -> Self {
        let mut mapper = Self::new();
        mapper.register(SHAREABLE_KIND, Box::new(build_shareable));
        mapper
    }

    /// # Returns
    /// `true` if a previous builder was replaced.
    pub fn register(&mut self, kind: &str, builder: ViewBuilder) -> bool {
        self.table.insert(kind.to_string(), builder).is_some()
    }

    pub fn unregister(&mut self, kind: &str) -> bool {
        self.table.remove(kind).is_some()
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.table.contains_key(kind)
    }

    pub fn build(&self, view: &ModelView) -> Option<Box<dyn SolverView>> {
        self.table.get(view.kind()).and_then(|builder| builder(view))
    }
}

impl Default for ViewMapper {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn build_shareable(view: &ModelView) -> Option<Box<dyn SolverView>> {
    view.as_shareable().map(|rc| Box::new(ShareableResourceView { rc: rc.clone() }) as Box<dyn SolverView>)
}

/// Per-node capacity enforcement for one shareable resource: the summed
/// consumption of the VMs ending the plan running on a node stays within
/// the node's capacity. A node going offline offers nothing, which the
/// host-requires-online wiring already guarantees.
pub struct ShareableResourceView {
    rc: ShareableResource,
}

impl SolverView for ShareableResourceView {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let running: Vec<_> = rp
            .vm_actions()
            .filter(|m| m.target == VmState::Running)
            .filter_map(|m| m.d_slice.map(|d| (m.vm, d.host)))
            .collect();
        let vars: Vec<_> = running.iter().map(|(_, h)| *h).collect();
        let weights: Vec<i32> = running.iter().map(|(vm, _)| self.rc.consumption(*vm)).collect();

        let total_needed: i64 = weights.iter().map(|w| *w as i64).sum();
        let total_offered: i64 =
            rp.source_model().mapping().all_nodes().map(|n| self.rc.capacity(n) as i64).sum();
        if total_needed > total_offered {
            let detail = format!(
                "the running VMs need {} '{}' but the whole datacenter offers {}",
                total_needed,
                self.rc.resource(),
                total_offered
            );
            log::error!("{}: {}", self.rc.id(), detail);
            return Err(Error::Injection { constraint: self.rc.id(), detail });
        }

        let nodes: Vec<_> = rp.source_model().mapping().all_nodes().collect();
        for n in nodes {
            let idx = rp.node_index(n);
            rp.post(Propagator::WeightedAtMost {
                vars: vars.clone(),
                weights: weights.clone(),
                targets: [idx].into(),
                capacity: self.rc.capacity(n) as i64,
            });
        }
        Ok(())
    }
}
