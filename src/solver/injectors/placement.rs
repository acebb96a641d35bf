//! Injectors for the placement constraint family: co-location, separation,
//! quarantine and pinning.

use std::collections::BTreeSet;

use crate::constraint::{Gather, Quarantine, Root, SatConstraint, Split, SplitAmong};
use crate::error::{Error, Result};
use crate::model::{Node, Vm};
use crate::solver::injector::Injector;
use crate::solver::problem::ReconfigurationProblem;
use crate::solver::propagator::Propagator;
use crate::solver::slice::Slice;
use crate::solver::store::VarId;

fn contradiction(tag: &str, detail: String) -> Error {
    log::error!("{}: {}", tag, detail);
    Error::Injection { constraint: tag.to_string(), detail }
}

/// The destination slices of the given VMs, skipping VMs without one.
fn d_slices(rp: &ReconfigurationProblem, vms: impl IntoIterator<Item = Vm>) -> Vec<(Vm, Slice)> {
    vms.into_iter().filter_map(|vm| rp.vm_action(vm).and_then(|m| m.d_slice.map(|d| (vm, d)))).collect()
}

pub struct GatherInjector {
    cstr: Gather,
}

pub fn build_gather(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::Gather(g) => Some(Box::new(GatherInjector { cstr: g.clone() })),
        _ => None,
    }
}

impl GatherInjector {
    /// Force every future host variable onto `idx`.
    fn place_on(&self, rp: &mut ReconfigurationProblem, slices: &[(Vm, Slice)], idx: i32) -> Result<()> {
        for (vm, d) in slices {
            if rp.store_mut().instantiate(d.host, idx).is_err() {
                return Err(contradiction(
                    "gather",
                    format!("unable to keep {} co-located with the group on {}", vm, rp.node_at(idx)),
                ));
            }
        }
        Ok(())
    }

    /// Pairwise equality of the future hosts, propagating what is already
    /// fixed.
    fn force_colocation(&self, rp: &mut ReconfigurationProblem, slices: &[(Vm, Slice)]) -> Result<()> {
        for i in 0..slices.len() {
            for j in 0..i {
                let (v1, s1) = slices[i];
                let (v2, s2) = slices[j];
                let fixed1 = rp.store().value(s1.host);
                let fixed2 = rp.store().value(s2.host);
                match (fixed1, fixed2) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(contradiction("gather", format!("{} and {} are pinned to different hosts", v1, v2)));
                    }
                    (Some(a), None) => {
                        if rp.store_mut().instantiate(s2.host, a).is_err() {
                            return Err(contradiction("gather", format!("unable to co-locate {} with {}", v2, v1)));
                        }
                    }
                    (None, Some(b)) => {
                        if rp.store_mut().instantiate(s1.host, b).is_err() {
                            return Err(contradiction("gather", format!("unable to co-locate {} with {}", v1, v2)));
                        }
                    }
                    _ => rp.post(Propagator::Eq(s1.host, s2.host)),
                }
            }
        }
        Ok(())
    }
}

impl Injector for GatherInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let slices = d_slices(rp, self.cstr.vms.iter().copied());

        if self.cstr.continuous {
            // Anchor on the host of the already-running members
            let map = rp.source_model().mapping();
            let mut anchor: Option<Node> = None;
            for vm in &self.cstr.vms {
                if let Some(n) = map.running_location(*vm) {
                    match anchor {
                        None => anchor = Some(n),
                        Some(a) if a != n => {
                            return Err(contradiction(
                                "gather",
                                format!("{:?} are already running but not co-located", self.cstr.vms),
                            ));
                        }
                        _ => {}
                    }
                }
            }
            if let Some(n) = anchor {
                let idx = rp.node_index(n);
                return self.place_on(rp, &slices, idx);
            }
        }
        self.force_colocation(rp, &slices)
    }
}

pub struct SplitInjector {
    cstr: Split,
}

pub fn build_split(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::Split(s) => Some(Box::new(SplitInjector { cstr: s.clone() })),
        _ => None,
    }
}

impl Injector for SplitInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        if self.cstr.continuous && !SatConstraint::Split(self.cstr.clone()).is_satisfied(rp.source_model()) {
            return Err(contradiction("split", "the groups already share nodes in the source model".to_string()));
        }

        let groups: Vec<Vec<(Vm, Slice)>> =
            self.cstr.groups.iter().map(|g| d_slices(rp, g.iter().copied())).collect();

        for i in 0..groups.len() {
            for j in 0..i {
                for (v1, s1) in &groups[i] {
                    for (v2, s2) in &groups[j] {
                        let fixed1 = rp.store().value(s1.host);
                        let fixed2 = rp.store().value(s2.host);
                        if let (Some(a), Some(b)) = (fixed1, fixed2) {
                            if a == b {
                                return Err(contradiction(
                                    "split",
                                    format!("{} and {} of distinct groups are pinned to {}", v1, v2, rp.node_at(a)),
                                ));
                            }
                        } else {
                            rp.post(Propagator::Neq(s1.host, s2.host));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct SplitAmongInjector {
    cstr: SplitAmong,
}

pub fn build_split_among(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::SplitAmong(sa) => Some(Box::new(SplitAmongInjector { cstr: sa.clone() })),
        _ => None,
    }
}

impl Injector for SplitAmongInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let node_groups: Vec<BTreeSet<i32>> = self
            .cstr
            .node_groups
            .iter()
            .map(|ng| ng.iter().map(|n| rp.node_index(*n)).collect())
            .collect();
        if node_groups.is_empty() {
            return Err(contradiction("splitAmong", "no node group to place onto".to_string()));
        }

        let mut group_vars: Vec<VarId> = Vec::new();
        for (g, vms) in self.cstr.vm_groups.iter().enumerate() {
            let members = d_slices(rp, vms.iter().copied());
            let var = rp.store_mut().new_var(&format!("splitAmong.group{}", g), 0, node_groups.len() as i32 - 1);

            if self.cstr.continuous {
                // Groups with running members are anchored to the node group
                // already hosting them
                let map = rp.source_model().mapping();
                let used: BTreeSet<Node> = vms.iter().filter_map(|vm| map.running_location(*vm)).collect();
                if !used.is_empty() {
                    let owner = self.cstr.node_groups.iter().position(|ng| used.iter().all(|n| ng.contains(n)));
                    match owner {
                        Some(k) => {
                            rp.store_mut().instantiate(var, k as i32).expect("freshly created variable");
                        }
                        None => {
                            return Err(contradiction(
                                "splitAmong",
                                format!("the VM group {:?} already spans several node groups", vms),
                            ));
                        }
                    }
                }
            }

            rp.post(Propagator::GroupChannel {
                group: var,
                members: members.iter().map(|(_, s)| s.host).collect(),
                node_groups: node_groups.clone(),
            });
            rp.register_decision(var);
            group_vars.push(var);
        }

        // Distinct VM groups end on distinct node groups
        for i in 0..group_vars.len() {
            for j in 0..i {
                rp.post(Propagator::Neq(group_vars[i], group_vars[j]));
            }
        }
        Ok(())
    }
}

pub struct QuarantineInjector {
    cstr: Quarantine,
}

pub fn build_quarantine(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::Quarantine(q) => Some(Box::new(QuarantineInjector { cstr: q.clone() })),
        _ => None,
    }
}

impl Injector for QuarantineInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let sealed: BTreeSet<i32> = self.cstr.nodes.iter().map(|n| rp.node_index(*n)).collect();
        let vms: Vec<Vm> = rp.source_model().mapping().all_vms().collect();

        for vm in vms {
            let Some(d) = rp.vm_action(vm).and_then(|m| m.d_slice) else {
                continue;
            };
            let inside = match rp.source_model().mapping().vm_location(vm) {
                Some(n) => self.cstr.nodes.contains(&n),
                None => false,
            };
            let keep = sealed.clone();
            let outcome = if inside {
                rp.store_mut().retain(d.host, |v| keep.contains(&v))
            } else {
                rp.store_mut().retain(d.host, |v| !keep.contains(&v))
            };
            if outcome.is_err() {
                let side = if inside { "inside" } else { "outside" };
                return Err(contradiction(
                    "quarantine",
                    format!("{} has no host left {} the quarantined nodes", vm, side),
                ));
            }
        }
        Ok(())
    }
}

pub struct RootInjector {
    cstr: Root,
}

pub fn build_root(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::Root(r) => Some(Box::new(RootInjector { cstr: r.clone() })),
        _ => None,
    }
}

impl Injector for RootInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        for vm in &self.cstr.vms {
            let Some(m) = rp.vm_action(*vm) else {
                continue;
            };
            // Only a hosted VM with a future placement can be pinned
            let (Some(c), Some(d)) = (m.c_slice, m.d_slice) else {
                continue;
            };
            let idx = rp.store().value(c.host).expect("current hosts are pinned");
            if rp.store_mut().instantiate(d.host, idx).is_err() {
                return Err(contradiction("root", format!("{} cannot stay on {}", vm, rp.node_at(idx))));
            }
        }
        Ok(())
    }
}
