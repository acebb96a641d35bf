use serde::{Deserialize, Serialize};
use std::fmt;

/// A virtual machine, identified by a unique integer.
///
/// The identifier carries no payload; fresh identifiers are handed out by
/// [`crate::model::Model::new_vm`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Vm(pub u32);

/// A physical node, identified by a unique integer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Node(pub u32);

impl fmt::Display for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vm#{}", self.0)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Either kind of managed element. Used to key the attribute store and to
/// identify action subjects generically.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Element {
    Vm(Vm),
    Node(Node),
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Vm(vm) => write!(f, "{}", vm),
            Element::Node(n) => write!(f, "{}", n),
        }
    }
}

/// The discrete lifecycle state of a VM.
///
/// `Running` and `Sleeping` VMs are hosted on a node; a `Ready` VM is known
/// to the system but placed nowhere.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VmState {
    Ready,
    Running,
    Sleeping,
}

/// The discrete power state of a node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeState {
    Offline,
    Online,
}

impl NodeState {
    /// Encoding used by the solver-side state variables.
    pub fn encode(self) -> i32 {
        match self {
            NodeState::Offline => 0,
            NodeState::Online => 1,
        }
    }
}

impl VmState {
    pub fn encode(self) -> i32 {
        match self {
            VmState::Ready => 0,
            VmState::Running => 1,
            VmState::Sleeping => 2,
        }
    }
}
