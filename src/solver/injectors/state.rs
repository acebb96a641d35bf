//! Injectors for the state constraint family.
//!
//! Target states are resolved structurally when the problem is built, so
//! the VM-side injectors only re-assert the encoded state variable; the
//! node-side ones pin the free power-state variables.

use crate::constraint::{Offline, Online, Ready, Running, SatConstraint, Sleeping};
use crate::error::{Error, Result};
use crate::model::{Node, Vm, VmState};
use crate::solver::injector::Injector;
use crate::solver::problem::ReconfigurationProblem;

fn contradiction(tag: &str, detail: String) -> Error {
    log::error!("{}: {}", tag, detail);
    Error::Injection { constraint: tag.to_string(), detail }
}

fn assert_vm_state(rp: &mut ReconfigurationProblem, tag: &str, vms: &[Vm], state: VmState) -> Result<()> {
    for vm in vms {
        let Some(m) = rp.vm_action(*vm) else {
            return Err(contradiction(tag, format!("{} has no action model", vm)));
        };
        let var = m.state;
        if rp.store_mut().instantiate(var, state.encode()).is_err() {
            return Err(contradiction(tag, format!("{} cannot reach the {:?} state", vm, state)));
        }
    }
    Ok(())
}

fn pin_node_state(rp: &mut ReconfigurationProblem, tag: &str, nodes: &[Node], online: bool) -> Result<()> {
    for n in nodes {
        let Some(m) = rp.node_action(*n) else {
            return Err(contradiction(tag, format!("{} has no action model", n)));
        };
        let var = m.state;
        if rp.store_mut().instantiate(var, if online { 1 } else { 0 }).is_err() {
            let wanted = if online { "online" } else { "offline" };
            return Err(contradiction(tag, format!("{} cannot end the plan {}", n, wanted)));
        }
    }
    Ok(())
}

pub struct RunningInjector {
    cstr: Running,
}

pub fn build_running(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::Running(r) => Some(Box::new(RunningInjector { cstr: r.clone() })),
        _ => None,
    }
}

impl Injector for RunningInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let vms: Vec<Vm> = self.cstr.vms.iter().copied().collect();
        assert_vm_state(rp, "running", &vms, VmState::Running)
    }
}

pub struct ReadyInjector {
    cstr: Ready,
}

pub fn build_ready(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::Ready(r) => Some(Box::new(ReadyInjector { cstr: r.clone() })),
        _ => None,
    }
}

impl Injector for ReadyInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let vms: Vec<Vm> = self.cstr.vms.iter().copied().collect();
        assert_vm_state(rp, "ready", &vms, VmState::Ready)
    }
}

pub struct SleepingInjector {
    cstr: Sleeping,
}

pub fn build_sleeping(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::Sleeping(s) => Some(Box::new(SleepingInjector { cstr: s.clone() })),
        _ => None,
    }
}

impl Injector for SleepingInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let vms: Vec<Vm> = self.cstr.vms.iter().copied().collect();
        assert_vm_state(rp, "sleeping", &vms, VmState::Sleeping)
    }
}

pub struct OnlineInjector {
    cstr: Online,
}

pub fn build_online(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::Online(o) => Some(Box::new(OnlineInjector { cstr: o.clone() })),
        _ => None,
    }
}

impl Injector for OnlineInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let nodes: Vec<Node> = self.cstr.nodes.iter().copied().collect();
        pin_node_state(rp, "online", &nodes, true)
    }
}

pub struct OfflineInjector {
    cstr: Offline,
}

pub fn build_offline(c: &SatConstraint) -> Option<Box<dyn Injector>> {
    match c {
        SatConstraint::Offline(o) => Some(Box::new(OfflineInjector { cstr: o.clone() })),
        _ => None,
    }
}

impl Injector for OfflineInjector {
    fn inject(&self, rp: &mut ReconfigurationProblem) -> Result<()> {
        let nodes: Vec<Node> = self.cstr.nodes.iter().copied().collect();
        pin_node_state(rp, "offline", &nodes, false)
    }
}
