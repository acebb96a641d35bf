//! Injector for the temporal synchronization family.

use crate::constraint::{SatConstraint, SyncEnd};
use crate::solver::action_model::VmTransition;
use crate::solver::injector::Injector;
use crate::solver::problem::ReconfigurationProblem;
use crate::solver::propagator::Propagator;
use crate::error::Result;

pub struct SyncEndInjector {
    cstr: SyncEnd,
}

pub fn build_sync_end(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::SyncEnd(s) => Some(Box::new(SyncEndInjector { cstr: s.clone() })),
        _ => None,
    }
}

impl Injector for SyncEndInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        // Chain the end instants of every involved VM that may produce an
        // action; VMs staying away have nothing to synchronize.
        let ends: Vec<_> = self
            .cstr
            .vms
            .iter()
            .filter_map(|vm| rp.vm_action(*vm))
            .filter(|m| m.transition != VmTransition::StayAway)
            .map(|m| m.end)
            .collect();

        for pair in ends.windows(2) {
            rp.post(Propagator::Eq(pair[0], pair[1]));
        }
        Ok(())
    }
}
