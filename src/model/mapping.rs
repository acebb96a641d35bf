use std::collections::{BTreeMap, BTreeSet};

use crate::model::element::{Node, Vm, VmState};

/// The placement state of a datacenter: which nodes are powered, and where
/// every VM lives.
///
/// Nodes are partitioned into {online, offline}; VMs are partitioned into
/// {running on a node, sleeping on a node, ready}. Every `add_*` operation
/// first removes the subject from its previous partition, so the last write
/// wins and redundant calls are harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    online: BTreeSet<Node>,
    offline: BTreeSet<Node>,

    running: BTreeMap<Vm, Node>,
    sleeping: BTreeMap<Vm, Node>,
    ready: BTreeSet<Vm>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node and mark it online.
    pub fn add_online_node(&mut self, n: Node) {
        self.offline.remove(&n);
        self.online.insert(n);
    }

    /// Declare a node and mark it offline.
    ///
    /// Refused (returns `false`) while the node still hosts running or
    /// sleeping VMs.
    pub fn add_offline_node(&mut self, n: Node) -> bool {
        if self.hosted_vms(n).next().is_some() {
            return false;
        }
        self.online.remove(&n);
        self.offline.insert(n);
        true
    }

    /// Place a VM as running on `n`.
    ///
    /// # Returns
    /// `false` without any mutation if `n` is unknown or offline; a VM can
    /// never run on an offline node.
    pub fn add_running_vm(&mut self, vm: Vm, n: Node) -> bool {
        if !self.online.contains(&n) {
            return false;
        }
        self.detach(vm);
        self.running.insert(vm, n);
        true
    }

    /// Place a VM as sleeping on `n`.
    ///
    /// The node must be known, but unlike a running VM a sleeping image may
    /// sit on a node that is currently powered down.
    pub fn add_sleeping_vm(&mut self, vm: Vm, n: Node) -> bool {
        if !self.online.contains(&n) && !self.offline.contains(&n) {
            return false;
        }
        self.detach(vm);
        self.sleeping.insert(vm, n);
        true
    }

    /// Mark a VM ready: known to the system but hosted nowhere.
    pub fn add_ready_vm(&mut self, vm: Vm) {
        self.detach(vm);
        self.ready.insert(vm);
    }

    /// Forget a VM entirely.
    pub fn remove_vm(&mut self, vm: Vm) -> bool {
        self.detach(vm)
    }

    /// Forget a node. Refused while the node hosts VMs.
    pub fn remove_node(&mut self, n: Node) -> bool {
        if self.hosted_vms(n).next().is_some() {
            return false;
        }
        self.online.remove(&n) || self.offline.remove(&n)
    }

    fn detach(&mut self, vm: Vm) -> bool {
        self.running.remove(&vm).is_some() || self.sleeping.remove(&vm).is_some() || self.ready.remove(&vm)
    }

    pub fn is_online(&self, n: Node) -> bool {
        self.online.contains(&n)
    }

    pub fn is_offline(&self, n: Node) -> bool {
        self.offline.contains(&n)
    }

    pub fn is_running(&self, vm: Vm) -> bool {
        self.running.contains_key(&vm)
    }

    pub fn is_sleeping(&self, vm: Vm) -> bool {
        self.sleeping.contains_key(&vm)
    }

    pub fn is_ready(&self, vm: Vm) -> bool {
        self.ready.contains(&vm)
    }

    pub fn contains_vm(&self, vm: Vm) -> bool {
        self.is_running(vm) || self.is_sleeping(vm) || self.is_ready(vm)
    }

    pub fn contains_node(&self, n: Node) -> bool {
        self.is_online(n) || self.is_offline(n)
    }

    /// The node hosting `vm`, or `None` for a ready or unknown VM.
    pub fn vm_location(&self, vm: Vm) -> Option<Node> {
        self.running.get(&vm).or_else(|| self.sleeping.get(&vm)).copied()
    }

    /// The node hosting `vm` if the VM is running there.
    pub fn running_location(&self, vm: Vm) -> Option<Node> {
        self.running.get(&vm).copied()
    }

    pub fn vm_state(&self, vm: Vm) -> Option<VmState> {
        if self.is_running(vm) {
            Some(VmState::Running)
        } else if self.is_sleeping(vm) {
            Some(VmState::Sleeping)
        } else if self.is_ready(vm) {
            Some(VmState::Ready)
        } else {
            None
        }
    }

    pub fn online_nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.online.iter().copied()
    }

    pub fn offline_nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.offline.iter().copied()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.online.iter().chain(self.offline.iter()).copied()
    }

    pub fn running_vms(&self) -> impl Iterator<Item = Vm> + '_ {
        self.running.keys().copied()
    }

    pub fn sleeping_vms(&self) -> impl Iterator<Item = Vm> + '_ {
        self.sleeping.keys().copied()
    }

    pub fn ready_vms(&self) -> impl Iterator<Item = Vm> + '_ {
        self.ready.iter().copied()
    }

    pub fn all_vms(&self) -> impl Iterator<Item = Vm> + '_ {
        self.running.keys().chain(self.sleeping.keys()).copied().chain(self.ready.iter().copied())
    }

    /// VMs running on `n`.
    pub fn running_vms_on(&self, n: Node) -> impl Iterator<Item = Vm> + '_ {
        self.running.iter().filter(move |(_, host)| **host == n).map(|(vm, _)| *vm)
    }

    /// VMs running or sleeping on `n`.
    pub fn hosted_vms(&self, n: Node) -> impl Iterator<Item = Vm> + '_ {
        self.running
            .iter()
            .filter(move |(_, host)| **host == n)
            .chain(self.sleeping.iter().filter(move |(_, host)| **host == n))
            .map(|(vm, _)| *vm)
    }

    pub fn nb_nodes(&self) -> usize {
        self.online.len() + self.offline.len()
    }

    pub fn nb_vms(&self) -> usize {
        self.running.len() + self.sleeping.len() + self.ready.len()
    }

    pub fn clear(&mut self) {
        self.online.clear();
        self.offline.clear();
        self.running.clear();
        self.sleeping.clear();
        self.ready.clear();
    }
}
