pub mod checker;

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::model::{Model, Node, Vm};
use crate::plan::ReconfigurationPlan;

/// Keep a set of VMs co-located on a single node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gather {
    pub vms: BTreeSet<Vm>,
    pub continuous: bool,
}

/// Keep the node sets used by distinct VM groups disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Split {
    pub groups: Vec<BTreeSet<Vm>>,
    pub continuous: bool,
}

/// Map each VM group entirely inside a single node group, distinct VM groups
/// on distinct node groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SplitAmong {
    pub vm_groups: Vec<BTreeSet<Vm>>,
    pub node_groups: Vec<BTreeSet<Node>>,
    pub continuous: bool,
}

/// Seal a set of nodes: no placement may cross the set boundary in either
/// direction for the plan's lifetime. Continuous-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quarantine {
    pub nodes: BTreeSet<Node>,
}

/// Pin VMs to their current host: relocating any of them violates the
/// constraint. Continuous-only, no discrete restriction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Root {
    pub vms: BTreeSet<Vm>,
}

/// Have a set of VMs running at the end of the reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Running {
    pub vms: BTreeSet<Vm>,
    pub continuous: bool,
}

/// Have a set of VMs ready (hosted nowhere) at the end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ready {
    pub vms: BTreeSet<Vm>,
    pub continuous: bool,
}

/// Have a set of VMs sleeping at the end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sleeping {
    pub vms: BTreeSet<Vm>,
    pub continuous: bool,
}

/// Have a set of nodes online at the end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Online {
    pub nodes: BTreeSet<Node>,
    pub continuous: bool,
}

/// Have a set of nodes offline at the end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Offline {
    pub nodes: BTreeSet<Node>,
    pub continuous: bool,
}

/// Bound the total number of running VMs hosted on a set of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CumulatedRunningCapacity {
    pub nodes: BTreeSet<Node>,
    pub amount: u32,
    pub continuous: bool,
}

/// Force every reconfiguration action on the given VMs to terminate at the
/// same instant. Continuous-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncEnd {
    pub vms: BTreeSet<Vm>,
}

/// A declarative placement constraint.
///
/// A closed union of kinds; every kind pairs with a discrete checker
/// (satisfaction on one model) and a continuous checker (satisfaction along
/// a whole plan), see [`checker`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SatConstraint {
    Gather(Gather),
    Split(Split),
    SplitAmong(SplitAmong),
    Quarantine(Quarantine),
    Root(Root),
    Running(Running),
    Ready(Ready),
    Sleeping(Sleeping),
    Online(Online),
    Offline(Offline),
    CumulatedRunningCapacity(CumulatedRunningCapacity),
    SyncEnd(SyncEnd),
}

impl SatConstraint {
    pub fn gather(vms: impl IntoIterator<Item = Vm>) -> Self {
        SatConstraint::Gather(Gather { vms: vms.into_iter().collect(), continuous: false })
    }

    pub fn split(groups: Vec<BTreeSet<Vm>>) -> Self {
        SatConstraint::Split(Split { groups, continuous: false })
    }

    pub fn split_among(vm_groups: Vec<BTreeSet<Vm>>, node_groups: Vec<BTreeSet<Node>>) -> Self {
        SatConstraint::SplitAmong(SplitAmong { vm_groups, node_groups, continuous: false })
    }

    pub fn quarantine(nodes: impl IntoIterator<Item = Node>) -> Self {
        SatConstraint::Quarantine(Quarantine { nodes: nodes.into_iter().collect() })
    }

    pub fn root(vms: impl IntoIterator<Item = Vm>) -> Self {
        SatConstraint::Root(Root { vms: vms.into_iter().collect() })
    }

    pub fn running(vms: impl IntoIterator<Item = Vm>) -> Self {
        SatConstraint::Running(Running { vms: vms.into_iter().collect(), continuous: false })
    }

    pub fn ready(vms: impl IntoIterator<Item = Vm>) -> Self {
        SatConstraint::Ready(Ready { vms: vms.into_iter().collect(), continuous: false })
    }

    pub fn sleeping(vms: impl IntoIterator<Item = Vm>) -> Self {
        SatConstraint::Sleeping(Sleeping { vms: vms.into_iter().collect(), continuous: false })
    }

    pub fn online(nodes: impl IntoIterator<Item = Node>) -> Self {
        SatConstraint::Online(Online { nodes: nodes.into_iter().collect(), continuous: false })
    }

    pub fn offline(nodes: impl IntoIterator<Item = Node>) -> Self {
        SatConstraint::Offline(Offline { nodes: nodes.into_iter().collect(), continuous: false })
    }

    pub fn cumulated_running_capacity(nodes: impl IntoIterator<Item = Node>, amount: u32) -> Self {
        SatConstraint::CumulatedRunningCapacity(CumulatedRunningCapacity {
            nodes: nodes.into_iter().collect(),
            amount,
            continuous: false,
        })
    }

    pub fn sync_end(vms: impl IntoIterator<Item = Vm>) -> Self {
        SatConstraint::SyncEnd(SyncEnd { vms: vms.into_iter().collect() })
    }

    /// The stable wire identifier of this constraint kind.
    pub fn tag(&self) -> &'static str {
        match self {
            SatConstraint::Gather(_) => "gather",
            SatConstraint::Split(_) => "split",
            SatConstraint::SplitAmong(_) => "splitAmong",
            SatConstraint::Quarantine(_) => "quarantine",
            SatConstraint::Root(_) => "root",
            SatConstraint::Running(_) => "running",
            SatConstraint::Ready(_) => "ready",
            SatConstraint::Sleeping(_) => "sleeping",
            SatConstraint::Online(_) => "online",
            SatConstraint::Offline(_) => "offline",
            SatConstraint::CumulatedRunningCapacity(_) => "cumulatedRunningCapacity",
            SatConstraint::SyncEnd(_) => "syncEnd",
        }
    }

    /// The VMs this constraint talks about. Fixed at construction.
    pub fn involved_vms(&self) -> BTreeSet<Vm> {
        match self {
            SatConstraint::Gather(c) => c.vms.clone(),
            SatConstraint::Split(c) => c.groups.iter().flatten().copied().collect(),
            SatConstraint::SplitAmong(c) => c.vm_groups.iter().flatten().copied().collect(),
            SatConstraint::Root(c) => c.vms.clone(),
            SatConstraint::Running(c) => c.vms.clone(),
            SatConstraint::Ready(c) => c.vms.clone(),
            SatConstraint::Sleeping(c) => c.vms.clone(),
            SatConstraint::SyncEnd(c) => c.vms.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// The nodes this constraint talks about. Fixed at construction.
    pub fn involved_nodes(&self) -> BTreeSet<Node> {
        match self {
            SatConstraint::SplitAmong(c) => c.node_groups.iter().flatten().copied().collect(),
            SatConstraint::Quarantine(c) => c.nodes.clone(),
            SatConstraint::Online(c) => c.nodes.clone(),
            SatConstraint::Offline(c) => c.nodes.clone(),
            SatConstraint::CumulatedRunningCapacity(c) => c.nodes.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn is_continuous(&self) -> bool {
        match self {
            SatConstraint::Gather(c) => c.continuous,
            SatConstraint::Split(c) => c.continuous,
            SatConstraint::SplitAmong(c) => c.continuous,
            SatConstraint::Quarantine(_) | SatConstraint::Root(_) | SatConstraint::SyncEnd(_) => true,
            SatConstraint::Running(c) => c.continuous,
            SatConstraint::Ready(c) => c.continuous,
            SatConstraint::Sleeping(c) => c.continuous,
            SatConstraint::Online(c) => c.continuous,
            SatConstraint::Offline(c) => c.continuous,
            SatConstraint::CumulatedRunningCapacity(c) => c.continuous,
        }
    }

    /// Whether this kind supports switching the continuous flag at all.
    /// Continuous-only kinds refuse to become discrete.
    pub fn can_be_discrete(&self) -> bool {
        !matches!(self, SatConstraint::Quarantine(_) | SatConstraint::Root(_) | SatConstraint::SyncEnd(_))
    }

    /// Request the restriction mode.
    ///
    /// # Returns
    /// The adjusted constraint, or `Error::UnsupportedRestriction` when a
    /// continuous-only kind is asked to become discrete.
    pub fn with_continuous(mut self, continuous: bool) -> Result<Self> {
        if !continuous && !self.can_be_discrete() {
            return Err(Error::UnsupportedRestriction(self.tag()));
        }
        match &mut self {
            SatConstraint::Gather(c) => c.continuous = continuous,
            SatConstraint::Split(c) => c.continuous = continuous,
            SatConstraint::SplitAmong(c) => c.continuous = continuous,
            SatConstraint::Running(c) => c.continuous = continuous,
            SatConstraint::Ready(c) => c.continuous = continuous,
            SatConstraint::Sleeping(c) => c.continuous = continuous,
            SatConstraint::Online(c) => c.continuous = continuous,
            SatConstraint::Offline(c) => c.continuous = continuous,
            SatConstraint::CumulatedRunningCapacity(c) => c.continuous = continuous,
            SatConstraint::Quarantine(_) | SatConstraint::Root(_) | SatConstraint::SyncEnd(_) => {}
        }
        Ok(self)
    }

    /// Discrete satisfaction: the constraint holds on this single model.
    pub fn is_satisfied(&self, model: &Model) -> bool {
        checker::discrete(self, model)
    }

    /// Satisfaction over a whole plan.
    ///
    /// Continuous constraints must hold along the plan's timeline; discrete
    /// ones only on the plan's result.
    pub fn is_satisfied_plan(&self, plan: &ReconfigurationPlan) -> bool {
        if self.is_continuous() {
            checker::continuous(self, plan)
        } else {
            match plan.result() {
                Ok(result) => checker::discrete(self, &result),
                Err(_) => false,
            }
        }
    }
}

impl fmt::Display for SatConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vms = self.involved_vms();
        let nodes = self.involved_nodes();
        write!(
            f,
            "{}(vms={:?}, nodes={:?}, {})",
            self.tag(),
            vms.iter().map(|v| v.0).collect::<Vec<_>>(),
            nodes.iter().map(|n| n.0).collect::<Vec<_>>(),
            if self.is_continuous() { "continuous" } else { "discrete" }
        )
    }
}
