//! Injector for the capacity constraint family.

use std::collections::BTreeSet;

use crate::constraint::{CumulatedRunningCapacity, SatConstraint};
use crate::error::{Error, Result};
use crate::model::VmState;
use crate::solver::injector::Injector;
use crate::solver::problem::ReconfigurationProblem;
use crate::solver::propagator::Propagator;

pub struct CumulatedRunningCapacityInjector {
    cstr: CumulatedRunningCapacity,
}

pub fn build_cumulated_running_capacity(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::CumulatedRunningCapacity(cap) => {
            Some(Box::new(CumulatedRunningCapacityInjector { cstr: cap.clone() }))
        }
        _ => None,
    }
}

impl Injector for CumulatedRunningCapacityInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let targets: BTreeSet<i32> = self.cstr.nodes.iter().map(|n| rp.node_index(*n)).collect();

        // Future hosts of every VM that ends the plan running
        let hosts: Vec<_> = rp
            .vm_actions()
            .filter(|m| m.target == VmState::Running)
            .filter_map(|m| m.d_slice.map(|d| d.host))
            .collect();

        // Fail fast when the pinned placements alone overrun the bound
        let committed = hosts
            .iter()
            .filter(|h| matches!(rp.store().value(**h), Some(v) if targets.contains(&v)))
            .count() as u64;
        if committed > self.cstr.amount as u64 {
            let detail = format!(
                "{} VMs are already pinned into {:?}, more than the allowed {}",
                committed, self.cstr.nodes, self.cstr.amount
            );
            log::error!("cumulatedRunningCapacity: {}", detail);
            return Err(Error::Injection { constraint: "cumulatedRunningCapacity".to_string(), detail });
        }

        let weights = vec![1; hosts.len()];
        rp.post(Propagator::WeightedAtMost { vars: hosts, weights, targets, capacity: self.cstr.amount as i64 });
        Ok(())
    }
}
