use std::fmt;

use crate::model::{Element, Model, Node, NodeState, Vm, VmState};

/// Identifies an action variant without its payload. Keys the duration
/// evaluator registry and the generic transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    BootVm,
    ShutdownVm,
    MigrateVm,
    SuspendVm,
    ResumeVm,
    BootNode,
    ShutdownNode,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::BootVm => "bootVM",
            ActionKind::ShutdownVm => "shutdownVM",
            ActionKind::MigrateVm => "migrateVM",
            ActionKind::SuspendVm => "suspendVM",
            ActionKind::ResumeVm => "resumeVM",
            ActionKind::BootNode => "bootNode",
            ActionKind::ShutdownNode => "shutdownNode",
        };
        write!(f, "{}", name)
    }
}

/// A timed reconfiguration operation on one subject.
///
/// `start <= end`, both non-negative instants on the shared plan timeline.
/// Every variant documents a precondition; [`Action::apply`] performs the
/// state transition iff the precondition holds on the given model and
/// otherwise returns `false` without touching it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Start a ready VM on an online node.
    BootVm { vm: Vm, node: Node, start: i32, end: i32 },
    /// Stop a running VM and put it back to ready.
    ShutdownVm { vm: Vm, node: Node, start: i32, end: i32 },
    /// Move a running VM between two online nodes.
    MigrateVm { vm: Vm, from: Node, to: Node, start: i32, end: i32 },
    /// Suspend a running VM to a sleeping image.
    SuspendVm { vm: Vm, from: Node, to: Node, start: i32, end: i32 },
    /// Resume a sleeping VM to running.
    ResumeVm { vm: Vm, from: Node, to: Node, start: i32, end: i32 },
    /// Power an offline node up.
    BootNode { node: Node, start: i32, end: i32 },
    /// Power an online, empty node down.
    ShutdownNode { node: Node, start: i32, end: i32 },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::BootVm { .. } => ActionKind::BootVm,
            Action::ShutdownVm { .. } => ActionKind::ShutdownVm,
            Action::MigrateVm { .. } => ActionKind::MigrateVm,
            Action::SuspendVm { .. } => ActionKind::SuspendVm,
            Action::ResumeVm { .. } => ActionKind::ResumeVm,
            Action::BootNode { .. } => ActionKind::BootNode,
            Action::ShutdownNode { .. } => ActionKind::ShutdownNode,
        }
    }

    pub fn start(&self) -> i32 {
        match self {
            Action::BootVm { start, .. }
            | Action::ShutdownVm { start, .. }
            | Action::MigrateVm { start, .. }
            | Action::SuspendVm { start, .. }
            | Action::ResumeVm { start, .. }
            | Action::BootNode { start, .. }
            | Action::ShutdownNode { start, .. } => *start,
        }
    }

    pub fn end(&self) -> i32 {
        match self {
            Action::BootVm { end, .. }
            | Action::ShutdownVm { end, .. }
            | Action::MigrateVm { end, .. }
            | Action::SuspendVm { end, .. }
            | Action::ResumeVm { end, .. }
            | Action::BootNode { end, .. }
            | Action::ShutdownNode { end, .. } => *end,
        }
    }

    /// The element this action reconfigures.
    pub fn subject(&self) -> Element {
        match self {
            Action::BootVm { vm, .. }
            | Action::ShutdownVm { vm, .. }
            | Action::MigrateVm { vm, .. }
            | Action::SuspendVm { vm, .. }
            | Action::ResumeVm { vm, .. } => Element::Vm(*vm),
            Action::BootNode { node, .. } | Action::ShutdownNode { node, .. } => Element::Node(*node),
        }
    }

    /// The VM state transition `(current, next)` declared by a VM action.
    pub fn vm_transition(&self) -> Option<(VmState, VmState)> {
        match self {
            Action::BootVm { .. } => Some((VmState::Ready, VmState::Running)),
            Action::ShutdownVm { .. } => Some((VmState::Running, VmState::Ready)),
            Action::MigrateVm { .. } => Some((VmState::Running, VmState::Running)),
            Action::SuspendVm { .. } => Some((VmState::Running, VmState::Sleeping)),
            Action::ResumeVm { .. } => Some((VmState::Sleeping, VmState::Running)),
            _ => None,
        }
    }

    /// The node state transition `(current, next)` declared by a node action.
    pub fn node_transition(&self) -> Option<(NodeState, NodeState)> {
        match self {
            Action::BootNode { .. } => Some((NodeState::Offline, NodeState::Online)),
            Action::ShutdownNode { .. } => Some((NodeState::Online, NodeState::Offline)),
            _ => None,
        }
    }

    /// Where the subject must be hosted before the action, if anywhere.
    pub fn source_host(&self) -> Option<Node> {
        match self {
            Action::ShutdownVm { node, .. } => Some(*node),
            Action::MigrateVm { from, .. } | Action::SuspendVm { from, .. } | Action::ResumeVm { from, .. } => Some(*from),
            _ => None,
        }
    }

    /// Where the subject is hosted after the action, if anywhere.
    pub fn destination_host(&self) -> Option<Node> {
        match self {
            Action::BootVm { node, .. } => Some(*node),
            Action::MigrateVm { to, .. } | Action::SuspendVm { to, .. } | Action::ResumeVm { to, .. } => Some(*to),
            _ => None,
        }
    }

    /// Apply the state transition on `model`.
    ///
    /// # Returns
    /// `true` iff the precondition held and the mapping was mutated; on
    /// `false` the model is left untouched.
    pub fn apply(&self, model: &mut Model) -> bool {
        let map = model.mapping_mut();
        match *self {
            Action::BootVm { vm, node, .. } => {
                if map.is_online(node) && map.is_ready(vm) {
                    return map.add_running_vm(vm, node);
                }
                false
            }
            Action::ShutdownVm { vm, node, .. } => {
                if map.is_online(node) && map.is_running(vm) && map.vm_location(vm) == Some(node) {
                    map.add_ready_vm(vm);
                    return true;
                }
                false
            }
            Action::MigrateVm { vm, from, to, .. } => {
                if map.is_online(from) && map.is_online(to) && map.is_running(vm) && map.vm_location(vm) == Some(from) {
                    return map.add_running_vm(vm, to);
                }
                false
            }
            Action::SuspendVm { vm, from, to, .. } => {
                if map.is_online(from) && map.is_online(to) && map.is_running(vm) && map.vm_location(vm) == Some(from) {
                    return map.add_sleeping_vm(vm, to);
                }
                false
            }
            Action::ResumeVm { vm, from, to, .. } => {
                if map.is_online(to) && map.is_sleeping(vm) && map.vm_location(vm) == Some(from) {
                    return map.add_running_vm(vm, to);
                }
                false
            }
            Action::BootNode { node, .. } => {
                if map.is_offline(node) {
                    map.add_online_node(node);
                    return true;
                }
                false
            }
            Action::ShutdownNode { node, .. } => {
                if map.is_online(node) {
                    return map.add_offline_node(node);
                }
                false
            }
        }
    }

    /// A compact human-readable form, e.g. `migrateVM(vm=vm#1, from=node#0, to=node#2)`.
    pub fn pretty(&self) -> String {
        match self {
            Action::BootVm { vm, node, .. } => format!("bootVM(vm={}, on={})", vm, node),
            Action::ShutdownVm { vm, node, .. } => format!("shutdownVM(vm={}, on={})", vm, node),
            Action::MigrateVm { vm, from, to, .. } => format!("migrateVM(vm={}, from={}, to={})", vm, from, to),
            Action::SuspendVm { vm, from, to, .. } => format!("suspendVM(vm={}, from={}, to={})", vm, from, to),
            Action::ResumeVm { vm, from, to, .. } => format!("resumeVM(vm={}, from={}, to={})", vm, from, to),
            Action::BootNode { node, .. } => format!("bootNode(node={})", node),
            Action::ShutdownNode { node, .. } => format!("shutdownNode(node={})", node),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}:{}}} {}", self.start(), self.end(), self.pretty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mapping;

    fn model_with(setup: impl FnOnce(&mut Mapping)) -> Model {
        let mut mo = Model::new();
        setup(mo.mapping_mut());
        mo
    }

    #[test]
    fn boot_vm_needs_ready_and_online() {
        let (vm, n1) = (Vm(0), Node(0));
        let mut mo = model_with(|m| {
            m.add_online_node(n1);
            m.add_ready_vm(vm);
        });
        let a = Action::BootVm { vm, node: n1, start: 0, end: 3 };
        assert!(a.apply(&mut mo));
        assert_eq!(mo.mapping().vm_location(vm), Some(n1));

        // Already running now, so the precondition no longer holds
        assert!(!a.apply(&mut mo));
        assert_eq!(mo.mapping().vm_location(vm), Some(n1));
    }

    #[test]
    fn migrate_checks_source_location() {
        let (vm, n1, n2) = (Vm(0), Node(0), Node(1));
        let mut mo = model_with(|m| {
            m.add_online_node(n1);
            m.add_online_node(n2);
            m.add_running_vm(vm, n1);
        });

        let wrong = Action::MigrateVm { vm, from: n2, to: n1, start: 0, end: 5 };
        assert!(!wrong.apply(&mut mo));
        assert_eq!(mo.mapping().vm_location(vm), Some(n1));

        let right = Action::MigrateVm { vm, from: n1, to: n2, start: 0, end: 5 };
        assert!(right.apply(&mut mo));
        assert_eq!(mo.mapping().vm_location(vm), Some(n2));
    }

    #[test]
    fn shutdown_node_requires_empty() {
        let (vm, n1) = (Vm(0), Node(0));
        let mut mo = model_with(|m| {
            m.add_online_node(n1);
            m.add_running_vm(vm, n1);
        });
        let a = Action::ShutdownNode { node: n1, start: 0, end: 2 };
        assert!(!a.apply(&mut mo));
        assert!(mo.mapping().is_online(n1));

        mo.mapping_mut().add_ready_vm(vm);
        assert!(a.apply(&mut mo));
        assert!(mo.mapping().is_offline(n1));
    }

    #[test]
    fn suspend_resume_cycle() {
        let (vm, n1) = (Vm(3), Node(0));
        let mut mo = model_with(|m| {
            m.add_online_node(n1);
            m.add_running_vm(vm, n1);
        });
        assert!(Action::SuspendVm { vm, from: n1, to: n1, start: 0, end: 2 }.apply(&mut mo));
        assert!(mo.mapping().is_sleeping(vm));
        assert!(Action::ResumeVm { vm, from: n1, to: n1, start: 2, end: 4 }.apply(&mut mo));
        assert!(mo.mapping().is_running(vm));
    }

    #[test]
    fn equality_covers_kind_subjects_and_times() {
        let a = Action::ShutdownNode { node: Node(1), start: 0, end: 2 };
        let b = Action::ShutdownNode { node: Node(1), start: 0, end: 2 };
        let c = Action::ShutdownNode { node: Node(1), start: 1, end: 2 };
        let d = Action::ShutdownNode { node: Node(2), start: 0, end: 2 };
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
