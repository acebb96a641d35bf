//! The reconfiguration problem: one action model per VM and per node, the
//! propagators wiring them together, and the extraction of a plan from a
//! solved assignment.

use bimap::BiMap;
use std::collections::BTreeMap;

use crate::constraint::SatConstraint;
use crate::error::{Error, Result};
use crate::model::{Element, Model, Node, NodeState, Vm, VmState};
use crate::plan::{Action, ActionKind, ReconfigurationPlan};
use crate::solver::action_model::{NodeActionModel, VmActionModel, VmTransition};
use crate::solver::durations::DurationEvaluators;
use crate::solver::search::{minimize, SearchBudget, SearchResult};
use crate::solver::slice::Slice;
use crate::solver::store::{Assignment, DomainStore, VarId};
use crate::solver::propagator::Propagator;

/// The states every subject must reach, resolved from the state constraints
/// before any variable exists. Defaults to keeping the current state.
#[derive(Debug, Default)]
struct StateTargets {
    vms: BTreeMap<Vm, VmState>,
    nodes: BTreeMap<Node, NodeState>,
}

fn resolve_targets(model: &Model, constraints: &[SatConstraint]) -> Result<StateTargets> {
    let mut targets = StateTargets::default();

    let mut set_vm = |vm: Vm, state: VmState, tag: &str| -> Result<()> {
        if !model.mapping().contains_vm(vm) {
            return Err(Error::Injection { constraint: tag.to_string(), detail: format!("{} is not part of the model", vm) });
        }
        match targets.vms.insert(vm, state) {
            Some(prev) if prev != state => Err(Error::Injection {
                constraint: tag.to_string(),
                detail: format!("{} is required to be both {:?} and {:?}", vm, prev, state),
            }),
            _ => Ok(()),
        }
    };
    for c in constraints {
        match c {
            SatConstraint::Running(r) => {
                for vm in &r.vms {
                    set_vm(*vm, VmState::Running, c.tag())?;
                }
            }
            SatConstraint::Ready(r) => {
                for vm in &r.vms {
                    set_vm(*vm, VmState::Ready, c.tag())?;
                }
            }
            SatConstraint::Sleeping(s) => {
                for vm in &s.vms {
                    set_vm(*vm, VmState::Sleeping, c.tag())?;
                }
            }
            _ => {}
        }
    }

    let mut set_node = |n: Node, state: NodeState, tag: &str| -> Result<()> {
        if !model.mapping().contains_node(n) {
            return Err(Error::Injection { constraint: tag.to_string(), detail: format!("{} is not part of the model", n) });
        }
        match targets.nodes.insert(n, state) {
            Some(prev) if prev != state => Err(Error::Injection {
                constraint: tag.to_string(),
                detail: format!("{} is required to be both {:?} and {:?}", n, prev, state),
            }),
            _ => Ok(()),
        }
    };
    for c in constraints {
        match c {
            SatConstraint::Online(o) => {
                for n in &o.nodes {
                    set_node(*n, NodeState::Online, c.tag())?;
                }
            }
            SatConstraint::Offline(o) => {
                for n in &o.nodes {
                    set_node(*n, NodeState::Offline, c.tag())?;
                }
            }
            _ => {}
        }
    }
    Ok(targets)
}

pub struct ReconfigurationProblem {
    source: Model,
    store: DomainStore,
    propagators: Vec<Propagator>,
    nodes: BiMap<Node, i32>,
    vm_models: BTreeMap<Vm, VmActionModel>,
    node_models: BTreeMap<Node, NodeActionModel>,
    /// Variables created by injectors that the search must branch on too.
    extra_decisions: Vec<VarId>,
    makespan: VarId,
    horizon: i32,
}

impl ReconfigurationProblem {
    /// Build the problem: resolve target states, allocate one action model
    /// per subject and wire the structural propagators.
    pub fn build(model: &Model, constraints: &[SatConstraint], durations: &DurationEvaluators) -> Result<Self> {
        let targets = resolve_targets(model, constraints)?;
        let map = model.mapping();

        let mut nodes: BiMap<Node, i32> = BiMap::new();
        for (idx, n) in map.all_nodes().enumerate() {
            nodes.insert(n, idx as i32);
        }
        let nb_nodes = nodes.len() as i32;
        if nb_nodes == 0 && map.nb_vms() > 0 {
            return Err(Error::Injection {
                constraint: "model".to_string(),
                detail: "VMs declared but no node to host anything".to_string(),
            });
        }

        // The horizon bounds every time variable: all actions in sequence
        let mut horizon: i32 = 0;
        for vm in map.all_vms() {
            let kind = match (map.vm_state(vm).expect("iterated from the mapping"), targets.vms.get(&vm)) {
                (VmState::Running, None | Some(VmState::Running)) => Some(ActionKind::MigrateVm),
                (VmState::Ready, Some(VmState::Running)) => Some(ActionKind::BootVm),
                (VmState::Running, Some(VmState::Ready)) => Some(ActionKind::ShutdownVm),
                (VmState::Running, Some(VmState::Sleeping)) => Some(ActionKind::SuspendVm),
                (VmState::Sleeping, Some(VmState::Running)) => Some(ActionKind::ResumeVm),
                _ => None,
            };
            if let Some(kind) = kind {
                horizon += durations.evaluate(model, kind, Element::Vm(vm));
            }
        }
        for n in map.all_nodes() {
            let kind = if map.is_online(n) { ActionKind::ShutdownNode } else { ActionKind::BootNode };
            horizon += durations.evaluate(model, kind, Element::Node(n));
        }
        horizon = horizon.max(1);

        let mut rp = Self {
            source: model.clone(),
            store: DomainStore::new(),
            propagators: Vec::new(),
            nodes,
            vm_models: BTreeMap::new(),
            node_models: BTreeMap::new(),
            extra_decisions: Vec::new(),
            makespan: VarId::default(),
            horizon,
        };

        rp.build_node_models(model, durations);
        rp.build_vm_models(model, &targets, durations)?;
        rp.wire_nodes()?;
        rp.link_makespan();
        Ok(rp)
    }

    fn build_node_models(&mut self, model: &Model, durations: &DurationEvaluators) {
        let all: Vec<Node> = model.mapping().all_nodes().collect();
        for n in all {
            let current = if model.mapping().is_online(n) { NodeState::Online } else { NodeState::Offline };
            let kind = match current {
                NodeState::Online => ActionKind::ShutdownNode,
                NodeState::Offline => ActionKind::BootNode,
            };
            let cost = durations.evaluate(model, kind, Element::Node(n));

            let state = self.store.new_var(&format!("{}.state", n), 0, 1);
            let duration = self.store.new_var_from(&format!("{}.duration", n), vec![0, cost]);
            let start = self.store.new_var(&format!("{}.start", n), 0, self.horizon);
            let end = self.store.new_var(&format!("{}.end", n), 0, self.horizon);

            self.propagators.push(Propagator::TransitionDuration {
                var: state,
                same: current.encode(),
                duration,
                cost,
            });
            self.propagators.push(Propagator::Sum { total: end, a: start, b: duration });

            self.node_models.insert(n, NodeActionModel { node: n, current, state, start, end, duration });
        }
    }

    fn build_vm_models(&mut self, model: &Model, targets: &StateTargets, durations: &DurationEvaluators) -> Result<()> {
        let map = model.mapping();
        let all: Vec<Vm> = map.all_vms().collect();
        for vm in all {
            let current = map.vm_state(vm).expect("iterated from the mapping");
            let target = targets.vms.get(&vm).copied().unwrap_or(current);

            let transition = match (current, target) {
                (VmState::Running, VmState::Running) => VmTransition::Relocate,
                (VmState::Ready, VmState::Running) => VmTransition::Boot,
                (VmState::Running, VmState::Ready) => VmTransition::Shutdown,
                (VmState::Running, VmState::Sleeping) => VmTransition::Suspend,
                (VmState::Sleeping, VmState::Running) => VmTransition::Resume,
                (VmState::Ready, VmState::Ready) | (VmState::Sleeping, VmState::Sleeping) => VmTransition::StayAway,
                (from, to) => {
                    return Err(Error::Injection {
                        constraint: "state".to_string(),
                        detail: format!("no supported transition takes {} from {:?} to {:?}", vm, from, to),
                    })
                }
            };
            let model_entry = self.build_vm_model(model, vm, transition, target, durations);
            self.vm_models.insert(vm, model_entry);
        }
        Ok(())
    }

    fn build_vm_model(
        &mut self,
        model: &Model,
        vm: Vm,
        transition: VmTransition,
        target: VmState,
        durations: &DurationEvaluators,
    ) -> VmActionModel {
        let nb_nodes = self.nodes.len() as i32;
        let state = self.store.constant(&format!("{}.state", vm), target.encode());
        let subject = Element::Vm(vm);
        let location = model.mapping().vm_location(vm);
        let current_idx = location.map(|n| self.node_index(n));

        match transition {
            VmTransition::StayAway => {
                let zero = self.store.constant(&format!("{}.start", vm), 0);
                let end = self.store.constant(&format!("{}.end", vm), 0);
                let duration = self.store.constant(&format!("{}.duration", vm), 0);
                VmActionModel { vm, transition, target, c_slice: None, d_slice: None, state, start: zero, end, duration }
            }
            VmTransition::Relocate => {
                let cur = current_idx.expect("a running VM is hosted somewhere");
                let cost = durations.evaluate(model, ActionKind::MigrateVm, subject);
                let host = self.store.new_var(&format!("{}.host", vm), 0, nb_nodes - 1);
                let duration = self.store.new_var_from(&format!("{}.duration", vm), vec![0, cost]);
                let start = self.store.new_var(&format!("{}.start", vm), 0, self.horizon);
                let end = self.store.new_var(&format!("{}.end", vm), 0, self.horizon);
                self.propagators.push(Propagator::TransitionDuration { var: host, same: cur, duration, cost });
                self.propagators.push(Propagator::Sum { total: end, a: start, b: duration });

                let c_start = self.store.constant(&format!("{}.c.start", vm), 0);
                let c_host = self.store.constant(&format!("{}.c.host", vm), cur);
                let c_slice = Slice { subject, start: c_start, end, host: c_host };
                let d_slice = Slice { subject, start, end, host };
                VmActionModel { vm, transition, target, c_slice: Some(c_slice), d_slice: Some(d_slice), state, start, end, duration }
            }
            VmTransition::Boot | VmTransition::Resume => {
                let kind = if transition == VmTransition::Boot { ActionKind::BootVm } else { ActionKind::ResumeVm };
                let cost = durations.evaluate(model, kind, subject);
                let host = self.store.new_var(&format!("{}.host", vm), 0, nb_nodes - 1);
                let duration = self.store.constant(&format!("{}.duration", vm), cost);
                let start = self.store.new_var(&format!("{}.start", vm), 0, self.horizon);
                let end = self.store.new_var(&format!("{}.end", vm), 0, self.horizon);
                self.propagators.push(Propagator::Sum { total: end, a: start, b: duration });

                let c_slice = current_idx.map(|cur| {
                    let c_start = self.store.constant(&format!("{}.c.start", vm), 0);
                    let c_host = self.store.constant(&format!("{}.c.host", vm), cur);
                    Slice { subject, start: c_start, end, host: c_host }
                });
                let d_slice = Slice { subject, start, end, host };
                VmActionModel { vm, transition, target, c_slice, d_slice: Some(d_slice), state, start, end, duration }
            }
            VmTransition::Shutdown | VmTransition::Suspend => {
                let kind = if transition == VmTransition::Shutdown { ActionKind::ShutdownVm } else { ActionKind::SuspendVm };
                let cur = current_idx.expect("a running VM is hosted somewhere");
                let cost = durations.evaluate(model, kind, subject);
                let duration = self.store.constant(&format!("{}.duration", vm), cost);
                let start = self.store.new_var(&format!("{}.start", vm), 0, self.horizon);
                let end = self.store.new_var(&format!("{}.end", vm), 0, self.horizon);
                self.propagators.push(Propagator::Sum { total: end, a: start, b: duration });

                let c_start = self.store.constant(&format!("{}.c.start", vm), 0);
                let c_host = self.store.constant(&format!("{}.c.host", vm), cur);
                let c_slice = Slice { subject, start: c_start, end, host: c_host };
                VmActionModel { vm, transition, target, c_slice: Some(c_slice), d_slice: None, state, start, end, duration }
            }
        }
    }

    /// Wire node power states to VM placements: destinations need the node
    /// online, evacuations precede shutdowns, and landings on a powered-up
    /// node wait for its boot.
    fn wire_nodes(&mut self) -> Result<()> {
        let state_by_index: Vec<VarId> = {
            let mut v = vec![VarId::default(); self.nodes.len()];
            for (n, model) in &self.node_models {
                v[*self.nodes.get_by_left(n).expect("every node is indexed") as usize] = model.state;
            }
            v
        };

        let vm_models: Vec<VmActionModel> = self.vm_models.values().cloned().collect();
        for m in &vm_models {
            if let Some(d) = m.d_slice {
                self.propagators.push(Propagator::RequiresOnline { host: d.host, states: state_by_index.clone() });

                // Landing on an initially-offline node waits for its boot
                for (n, nm) in &self.node_models {
                    if nm.current == NodeState::Offline {
                        let idx = *self.nodes.get_by_left(n).expect("every node is indexed");
                        self.propagators.push(Propagator::HostedAfterBoot {
                            host: d.host,
                            node_index: idx,
                            boot_end: nm.end,
                            d_start: d.start,
                        });
                    }
                }
            }

            // The current host cannot power down before the VM is gone.
            // Only meaningful for online hosts; an offline host has no
            // shutdown to order against.
            if let Some(c) = m.c_slice {
                let host_node = self.node_at(self.store.value(c.host).expect("current hosts are pinned"));
                let nm = &self.node_models[&host_node];
                if nm.current == NodeState::Online {
                    self.propagators.push(Propagator::EvacuateBefore {
                        state: nm.state,
                        vacated_end: c.end,
                        shutdown_start: nm.start,
                    });
                }
            }
        }

        // An online node keeping a sleeping image cannot be powered down;
        // the mapping would refuse the shutdown.
        let sleeping_hosts: Vec<(Vm, Node)> = self
            .vm_models
            .values()
            .filter(|m| m.target == VmState::Sleeping)
            .filter_map(|m| self.source.mapping().vm_location(m.vm).map(|n| (m.vm, n)))
            .filter(|(_, n)| self.source.mapping().is_online(*n))
            .collect();
        for (vm, n) in sleeping_hosts {
            let state = self.node_models[&n].state;
            if self.store.instantiate(state, 1).is_err() {
                return Err(Error::Injection {
                    constraint: "sleeping".to_string(),
                    detail: format!("{} keeps a sleeping image on {}, which is required to go offline", vm, n),
                });
            }
        }
        Ok(())
    }

    fn link_makespan(&mut self) {
        let mut terms: Vec<VarId> = self.vm_models.values().map(|m| m.end).collect();
        terms.extend(self.node_models.values().map(|m| m.end));
        let makespan = self.store.new_var("makespan", 0, self.horizon);
        self.propagators.push(Propagator::Max { bound: makespan, terms });
        self.makespan = makespan;
    }

    pub fn source_model(&self) -> &Model {
        &self.source
    }

    pub fn horizon(&self) -> i32 {
        self.horizon
    }

    pub fn makespan(&self) -> VarId {
        self.makespan
    }

    pub fn store(&self) -> &DomainStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DomainStore {
        &mut self.store
    }

    /// Post a propagator to be enforced during search.
    pub fn post(&mut self, p: Propagator) {
        self.propagators.push(p);
    }

    /// Declare an injector-created variable the search must branch on.
    pub fn register_decision(&mut self, var: VarId) {
        self.extra_decisions.push(var);
    }

    pub fn vm_action(&self, vm: Vm) -> Option<&VmActionModel> {
        self.vm_models.get(&vm)
    }

    pub fn node_action(&self, n: Node) -> Option<&NodeActionModel> {
        self.node_models.get(&n)
    }

    pub fn vm_actions(&self) -> impl Iterator<Item = &VmActionModel> {
        self.vm_models.values()
    }

    pub fn node_actions(&self) -> impl Iterator<Item = &NodeActionModel> {
        self.node_models.values()
    }

    /// The solver index of a node.
    pub fn node_index(&self, n: Node) -> i32 {
        *self.nodes.get_by_left(&n).expect("every node is indexed")
    }

    /// The node behind a solver index.
    pub fn node_at(&self, idx: i32) -> Node {
        *self.nodes.get_by_right(&idx).expect("every index maps to a node")
    }

    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Run the branch-and-bound search for a makespan-minimal assignment.
    pub fn solve(&mut self, budget: SearchBudget) -> SearchResult {
        let mut decisions: Vec<VarId> = Vec::new();
        decisions.extend(self.node_models.values().map(|m| m.state));
        for m in self.vm_models.values() {
            if let Some(d) = m.d_slice {
                decisions.push(d.host);
            }
        }
        decisions.extend(self.extra_decisions.iter().copied());
        decisions.extend(self.vm_models.values().map(|m| m.start));
        decisions.extend(self.node_models.values().map(|m| m.start));

        minimize(&mut self.store, &self.propagators, &decisions, self.makespan, budget)
    }

    /// Synthesize the plan encoded by a solved assignment: one action per
    /// subject whose placement or state changes.
    pub fn extract_plan(&self, solution: &Assignment) -> Result<ReconfigurationPlan> {
        let mut plan = ReconfigurationPlan::new(self.source.clone());
        let map = self.source.mapping();

        for m in self.vm_models.values() {
            let start = solution[m.start];
            let end = solution[m.end];
            let action = match m.transition {
                VmTransition::StayAway => None,
                VmTransition::Relocate => {
                    let from = map.vm_location(m.vm).expect("a running VM is hosted somewhere");
                    let to = self.node_at(solution[m.d_slice.expect("relocatable VMs have a destination").host]);
                    if from == to {
                        None
                    } else {
                        Some(Action::MigrateVm { vm: m.vm, from, to, start, end })
                    }
                }
                VmTransition::Boot => {
                    let node = self.node_at(solution[m.d_slice.expect("boots have a destination").host]);
                    Some(Action::BootVm { vm: m.vm, node, start, end })
                }
                VmTransition::Shutdown => {
                    let node = map.vm_location(m.vm).expect("a running VM is hosted somewhere");
                    Some(Action::ShutdownVm { vm: m.vm, node, start, end })
                }
                VmTransition::Suspend => {
                    let node = map.vm_location(m.vm).expect("a running VM is hosted somewhere");
                    Some(Action::SuspendVm { vm: m.vm, from: node, to: node, start, end })
                }
                VmTransition::Resume => {
                    let from = map.vm_location(m.vm).expect("a sleeping VM is hosted somewhere");
                    let to = self.node_at(solution[m.d_slice.expect("resumes have a destination").host]);
                    Some(Action::ResumeVm { vm: m.vm, from, to, start, end })
                }
            };
            if let Some(a) = action {
                plan.add(a)?;
            }
        }

        for m in self.node_models.values() {
            let solved = solution[m.state];
            if solved == m.current.encode() {
                continue;
            }
            let start = solution[m.start];
            let end = solution[m.end];
            let action = match m.current {
                NodeState::Online => Action::ShutdownNode { node: m.node, start, end },
                NodeState::Offline => Action::BootNode { node: m.node, start, end },
            };
            plan.add(action)?;
        }
        Ok(plan)
    }
}
