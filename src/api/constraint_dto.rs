//! Wire format for constraints.
//!
//! Each constraint serializes to an object carrying its kind under `"id"`,
//! the involved elements, and the `"continuous"` flag. The conversion into
//! domain constraints validates shapes the type system cannot express and
//! fails with a descriptive error before anything reaches the core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::constraint::SatConstraint;
use crate::error::Error;
use crate::model::{Node, Vm};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "id", rename_all = "camelCase")]
pub enum ConstraintDto {
    Gather { vms: Vec<u32>, continuous: bool },
    Split { vms: Vec<Vec<u32>>, continuous: bool },
    SplitAmong { vms: Vec<Vec<u32>>, nodes: Vec<Vec<u32>>, continuous: bool },
    Quarantine { nodes: Vec<u32>, continuous: bool },
    Root { vms: Vec<u32>, continuous: bool },
    Running { vms: Vec<u32>, continuous: bool },
    Ready { vms: Vec<u32>, continuous: bool },
    Sleeping { vms: Vec<u32>, continuous: bool },
    Online { nodes: Vec<u32>, continuous: bool },
    Offline { nodes: Vec<u32>, continuous: bool },
    CumulatedRunningCapacity { nodes: Vec<u32>, amount: u32, continuous: bool },
    SyncEnd { vms: Vec<u32>, continuous: bool },
}

fn vms_out(vms: &BTreeSet<Vm>) -> Vec<u32> {
    vms.iter().map(|v| v.0).collect()
}

fn nodes_out(nodes: &BTreeSet<Node>) -> Vec<u32> {
    nodes.iter().map(|n| n.0).collect()
}

fn vm_groups_out(groups: &[BTreeSet<Vm>]) -> Vec<Vec<u32>> {
    groups.iter().map(|g| vms_out(g)).collect()
}

fn node_groups_out(groups: &[BTreeSet<Node>]) -> Vec<Vec<u32>> {
    groups.iter().map(|g| nodes_out(g)).collect()
}

impl From<&SatConstraint> for ConstraintDto {
    fn from(c: &SatConstraint) -> Self {
        let continuous = c.is_continuous();
        match c {
            SatConstraint::Gather(g) => ConstraintDto::Gather { vms: vms_out(&g.vms), continuous },
            SatConstraint::Split(s) => ConstraintDto::Split { vms: vm_groups_out(&s.groups), continuous },
            SatConstraint::SplitAmong(sa) => ConstraintDto::SplitAmong {
                vms: vm_groups_out(&sa.vm_groups),
                nodes: node_groups_out(&sa.node_groups),
                continuous,
            },
            SatConstraint::Quarantine(q) => ConstraintDto::Quarantine { nodes: nodes_out(&q.nodes), continuous },
            SatConstraint::Root(r) => ConstraintDto::Root { vms: vms_out(&r.vms), continuous },
            SatConstraint::Running(r) => ConstraintDto::Running { vms: vms_out(&r.vms), continuous },
            SatConstraint::Ready(r) => ConstraintDto::Ready { vms: vms_out(&r.vms), continuous },
            SatConstraint::Sleeping(s) => ConstraintDto::Sleeping { vms: vms_out(&s.vms), continuous },
            SatConstraint::Online(o) => ConstraintDto::Online { nodes: nodes_out(&o.nodes), continuous },
            SatConstraint::Offline(o) => ConstraintDto::Offline { nodes: nodes_out(&o.nodes), continuous },
            SatConstraint::CumulatedRunningCapacity(cap) => ConstraintDto::CumulatedRunningCapacity {
                nodes: nodes_out(&cap.nodes),
                amount: cap.amount,
                continuous,
            },
            SatConstraint::SyncEnd(s) => ConstraintDto::SyncEnd { vms: vms_out(&s.vms), continuous },
        }
    }
}

fn vms_in(raw: Vec<u32>) -> BTreeSet<Vm> {
    raw.into_iter().map(Vm).collect()
}

fn nodes_in(raw: Vec<u32>) -> BTreeSet<Node> {
    raw.into_iter().map(Node).collect()
}

/// Apply the wire `continuous` flag, rejecting `false` on continuous-only
/// kinds with a conversion error instead of silently ignoring it.
fn restrict(c: SatConstraint, continuous: bool) -> Result<SatConstraint, Error> {
    let tag = c.tag();
    c.with_continuous(continuous)
        .map_err(|_| Error::Conversion(format!("'{}' only supports \"continuous\": true", tag)))
}

impl TryFrom<ConstraintDto> for SatConstraint {
    type Error = Error;

    fn try_from(dto: ConstraintDto) -> Result<Self, Error> {
        match dto {
            ConstraintDto::Gather { vms, continuous } => restrict(SatConstraint::gather(vms_in(vms)), continuous),
            ConstraintDto::Split { vms, continuous } => {
                if vms.is_empty() {
                    return Err(Error::Conversion("'split' needs at least one VM group".to_string()));
                }
                restrict(SatConstraint::split(vms.into_iter().map(vms_in).collect()), continuous)
            }
            ConstraintDto::SplitAmong { vms, nodes, continuous } => {
                if vms.is_empty() || nodes.is_empty() {
                    return Err(Error::Conversion("'splitAmong' needs VM groups and node groups".to_string()));
                }
                let vm_groups = vms.into_iter().map(vms_in).collect();
                let node_groups = nodes.into_iter().map(nodes_in).collect();
                restrict(SatConstraint::split_among(vm_groups, node_groups), continuous)
            }
            ConstraintDto::Quarantine { nodes, continuous } => {
                restrict(SatConstraint::quarantine(nodes_in(nodes)), continuous)
            }
            ConstraintDto::Root { vms, continuous } => restrict(SatConstraint::root(vms_in(vms)), continuous),
            ConstraintDto::Running { vms, continuous } => restrict(SatConstraint::running(vms_in(vms)), continuous),
            ConstraintDto::Ready { vms, continuous } => restrict(SatConstraint::ready(vms_in(vms)), continuous),
            ConstraintDto::Sleeping { vms, continuous } => restrict(SatConstraint::sleeping(vms_in(vms)), continuous),
            ConstraintDto::Online { nodes, continuous } => restrict(SatConstraint::online(nodes_in(nodes)), continuous),
            ConstraintDto::Offline { nodes, continuous } => {
                restrict(SatConstraint::offline(nodes_in(nodes)), continuous)
            }
            ConstraintDto::CumulatedRunningCapacity { nodes, amount, continuous } => {
                restrict(SatConstraint::cumulated_running_capacity(nodes_in(nodes), amount), continuous)
            }
            ConstraintDto::SyncEnd { vms, continuous } => restrict(SatConstraint::sync_end(vms_in(vms)), continuous),
        }
    }
}
