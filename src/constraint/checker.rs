//! Satisfaction checkers.
//!
//! Every constraint kind pairs with a discrete check (one model) and a
//! continuous check (a whole plan). Continuous semantics are defined at
//! action boundaries only: the constraint must hold on the source model, on
//! every model reached after applying a time-ordered action prefix, and on
//! the result. Kinds without a discrete restriction (`Root`, `Quarantine`,
//! `SyncEnd`) instead watch the actions themselves.

use std::collections::BTreeSet;

use crate::constraint::SatConstraint;
use crate::model::{Element, Model, Node, Vm};
use crate::plan::{Action, ReconfigurationPlan};

/// Discrete satisfaction of `c` on `model`.
pub fn discrete(c: &SatConstraint, model: &Model) -> bool {
    let map = model.mapping();
    match c {
        SatConstraint::Gather(g) => {
            let mut host = None;
            for vm in &g.vms {
                if let Some(n) = map.running_location(*vm) {
                    match host {
                        None => host = Some(n),
                        Some(h) if h != n => return false,
                        _ => {}
                    }
                }
            }
            true
        }
        SatConstraint::Split(s) => {
            let used: Vec<BTreeSet<Node>> = s.groups.iter().map(|g| used_nodes(model, g)).collect();
            for i in 0..used.len() {
                for j in 0..i {
                    if used[i].intersection(&used[j]).next().is_some() {
                        return false;
                    }
                }
            }
            true
        }
        SatConstraint::SplitAmong(sa) => {
            let mut claimed: Vec<usize> = Vec::new();
            for grp in &sa.vm_groups {
                let used = used_nodes(model, grp);
                if used.is_empty() {
                    continue;
                }
                // The whole group must fit one node group
                let owner = sa.node_groups.iter().position(|ng| used.is_subset(ng));
                match owner {
                    Some(k) => {
                        if claimed.contains(&k) {
                            return false;
                        }
                        claimed.push(k);
                    }
                    None => return false,
                }
            }
            true
        }
        SatConstraint::Quarantine(_) | SatConstraint::Root(_) | SatConstraint::SyncEnd(_) => true,
        SatConstraint::Running(r) => r.vms.iter().all(|vm| map.is_running(*vm)),
        SatConstraint::Ready(r) => r.vms.iter().all(|vm| map.is_ready(*vm)),
        SatConstraint::Sleeping(s) => s.vms.iter().all(|vm| map.is_sleeping(*vm)),
        SatConstraint::Online(o) => o.nodes.iter().all(|n| map.is_online(*n)),
        SatConstraint::Offline(o) => o.nodes.iter().all(|n| map.is_offline(*n)),
        SatConstraint::CumulatedRunningCapacity(cap) => {
            let count = map.running_vms().filter(|vm| match map.vm_location(*vm) {
                Some(n) => cap.nodes.contains(&n),
                None => false,
            });
            count.count() as u64 <= cap.amount as u64
        }
    }
}

/// Continuous satisfaction of `c` along `plan`.
pub fn continuous(c: &SatConstraint, plan: &ReconfigurationPlan) -> bool {
    match c {
        SatConstraint::Root(r) => !plan.actions().iter().any(|a| relocates_one_of(a, &r.vms)),
        SatConstraint::Quarantine(q) => !plan.actions().iter().any(|a| crosses_boundary(a, &q.nodes)),
        SatConstraint::SyncEnd(s) => {
            let mut shared_end = None;
            for a in plan.actions() {
                let concerned = match a.subject() {
                    Element::Vm(vm) => s.vms.contains(&vm),
                    _ => false,
                };
                if !concerned {
                    continue;
                }
                match shared_end {
                    None => shared_end = Some(a.end()),
                    Some(e) if e != a.end() => return false,
                    _ => {}
                }
            }
            true
        }
        SatConstraint::Running(_)
        | SatConstraint::Ready(_)
        | SatConstraint::Sleeping(_)
        | SatConstraint::Online(_)
        | SatConstraint::Offline(_) => holds_once_reached(c, plan),
        _ => holds_at_every_boundary(c, plan),
    }
}

/// `true` iff the discrete form of `c` holds on the source, after every
/// applied action prefix, and on the result.
fn holds_at_every_boundary(c: &SatConstraint, plan: &ReconfigurationPlan) -> bool {
    let mut model = plan.source().clone();
    if !discrete(c, &model) {
        return false;
    }
    for action in plan.actions() {
        if !action.apply(&mut model) {
            // Inconsistent plan: never satisfied
            return false;
        }
        if !discrete(c, &model) {
            return false;
        }
    }
    true
}

/// State constraints: the target state may be reached anywhere along the
/// plan, but once reached it must not be lost, and it must hold at the end.
fn holds_once_reached(c: &SatConstraint, plan: &ReconfigurationPlan) -> bool {
    let mut model = plan.source().clone();
    let mut reached = discrete(c, &model);
    for action in plan.actions() {
        if !action.apply(&mut model) {
            return false;
        }
        let sat = discrete(c, &model);
        if reached && !sat {
            return false;
        }
        reached = reached || sat;
    }
    reached
}

/// A placement action moving one of `vms` away from its current host.
fn relocates_one_of(a: &Action, vms: &BTreeSet<Vm>) -> bool {
    let concerned = match a.subject() {
        Element::Vm(vm) => vms.contains(&vm),
        _ => false,
    };
    if !concerned {
        return false;
    }
    match (a.source_host(), a.destination_host()) {
        (Some(from), Some(to)) => from != to,
        _ => false,
    }
}

/// A placement action crossing the quarantine boundary: the subject comes
/// from outside the set (including from nowhere) and lands inside, or comes
/// from inside and lands outside. Moves wholly inside or wholly outside the
/// set are fine, as are actions that leave the subject hosted nowhere.
fn crosses_boundary(a: &Action, nodes: &BTreeSet<Node>) -> bool {
    let Some(to) = a.destination_host() else {
        return false;
    };
    let from_inside = a.source_host().map(|n| nodes.contains(&n)).unwrap_or(false);
    let to_inside = nodes.contains(&to);
    from_inside != to_inside
}

fn used_nodes(model: &Model, vms: &BTreeSet<Vm>) -> BTreeSet<Node> {
    vms.iter().filter_map(|vm| model.mapping().running_location(*vm)).collect()
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

    fn four_online_nodes(map: &mut Mapping) {
        for i in 0..4 {
            map.add_online_node(Node(i));
        }
    }

    #[test]
    fn split_among_discrete() {
        let mo = model_with(|map| {
            four_online_nodes(map);
            map.add_running_vm(Vm(1), Node(0));
            map.add_running_vm(Vm(2), Node(0));
            map.add_running_vm(Vm(3), Node(2));
            map.add_running_vm(Vm(4), Node(3));
        });

        let sa = SatConstraint::split_among(
            vec![[Vm(1), Vm(2)].into(), [Vm(3), Vm(4)].into()],
            vec![[Node(0), Node(1)].into(), [Node(2), Node(3)].into()],
        );
        assert!(sa.is_satisfied(&mo));

        // One member strays into the other node group
        let mut spread = mo.clone();
        spread.mapping_mut().add_running_vm(Vm(2), Node(2));
        assert!(!sa.is_satisfied(&spread));

        // Both VM groups collapse onto one node group
        let mut collapsed = mo.clone();
        collapsed.mapping_mut().add_running_vm(Vm(1), Node(2));
        collapsed.mapping_mut().add_running_vm(Vm(2), Node(3));
        assert!(!sa.is_satisfied(&collapsed));
    }

    #[test]
    fn split_among_continuous() {
        let mo = model_with(|map| {
            four_online_nodes(map);
            map.add_running_vm(Vm(1), Node(0));
            map.add_running_vm(Vm(2), Node(0));
            map.add_running_vm(Vm(3), Node(2));
        });
        let sa = SatConstraint::split_among(
            vec![[Vm(1), Vm(2)].into(), [Vm(3)].into()],
            vec![[Node(0), Node(1)].into(), [Node(2), Node(3)].into()],
        )
        .with_continuous(true)
        .unwrap();

        let mut plan = ReconfigurationPlan::new(mo.clone());
        assert!(sa.is_satisfied_plan(&plan));

        // In-group move: fine
        plan.add(Action::MigrateVm { vm: Vm(1), from: Node(0), to: Node(1), start: 3, end: 4 }).unwrap();
        assert!(sa.is_satisfied_plan(&plan));

        // vm2 strays into the second node group
        plan.add(Action::MigrateVm { vm: Vm(2), from: Node(0), to: Node(2), start: 0, end: 2 }).unwrap();
        assert!(!sa.is_satisfied_plan(&plan));
    }

    #[test]
    fn gather_discrete_and_continuous_agree_on_empty_plan() {
        let mo = model_with(|map| {
            four_online_nodes(map);
            map.add_running_vm(Vm(1), Node(0));
            map.add_running_vm(Vm(2), Node(1));
        });
        let discrete = SatConstraint::gather([Vm(1), Vm(2)]);
        let continuous = discrete.clone().with_continuous(true).unwrap();

        let plan = ReconfigurationPlan::new(mo.clone());
        assert_eq!(discrete.is_satisfied(&mo), continuous.is_satisfied_plan(&plan));
        assert!(!continuous.is_satisfied_plan(&plan));
    }

    #[test]
    fn root_continuous_fails_on_migration() {
        let mo = model_with(|map| {
            four_online_nodes(map);
            map.add_running_vm(Vm(1), Node(0));
        });
        let root = SatConstraint::root([Vm(1)]);
        assert!(root.is_satisfied(&mo));

        let mut plan = ReconfigurationPlan::new(mo);
        assert!(root.is_satisfied_plan(&plan));
        plan.add(Action::MigrateVm { vm: Vm(1), from: Node(0), to: Node(1), start: 1, end: 2 }).unwrap();
        assert!(!root.is_satisfied_plan(&plan));
    }

    #[test]
    fn quarantine_boundary_semantics() {
        let mo = model_with(|map| {
            four_online_nodes(map);
            map.add_running_vm(Vm(1), Node(0));
            map.add_running_vm(Vm(2), Node(1));
            map.add_ready_vm(Vm(3));
            map.add_running_vm(Vm(4), Node(2));
        });
        let q = SatConstraint::quarantine([Node(0), Node(1)]);

        let mut plan = ReconfigurationPlan::new(mo.clone());
        assert!(q.is_satisfied_plan(&plan));

        // Moving within the quarantined set stays satisfied
        plan.add(Action::MigrateVm { vm: Vm(1), from: Node(0), to: Node(1), start: 0, end: 1 }).unwrap();
        assert!(q.is_satisfied_plan(&plan));

        // Shutting a VM down inside the set leaves it hosted nowhere: fine
        plan.add(Action::ShutdownVm { vm: Vm(2), node: Node(1), start: 1, end: 2 }).unwrap();
        assert!(q.is_satisfied_plan(&plan));

        // Booting a ready VM into the set breaks the seal
        let mut entered = ReconfigurationPlan::new(mo.clone());
        entered.add(Action::BootVm { vm: Vm(3), node: Node(0), start: 0, end: 1 }).unwrap();
        assert!(!q.is_satisfied_plan(&entered));

        // Booting it outside is fine, migrating into the set is not
        let mut outside = ReconfigurationPlan::new(mo.clone());
        outside.add(Action::BootVm { vm: Vm(3), node: Node(2), start: 0, end: 1 }).unwrap();
        assert!(q.is_satisfied_plan(&outside));
        outside.add(Action::MigrateVm { vm: Vm(4), from: Node(2), to: Node(1), start: 0, end: 1 }).unwrap();
        assert!(!q.is_satisfied_plan(&outside));

        // Leaving the set also crosses the boundary
        let mut leave = ReconfigurationPlan::new(mo);
        leave.add(Action::MigrateVm { vm: Vm(1), from: Node(0), to: Node(3), start: 0, end: 1 }).unwrap();
        assert!(!q.is_satisfied_plan(&leave));
    }

    #[test]
    fn sync_end_shares_one_instant() {
        let mo = model_with(|map| {
            four_online_nodes(map);
            map.add_running_vm(Vm(1), Node(0));
            map.add_running_vm(Vm(2), Node(1));
        });
        let sync = SatConstraint::sync_end([Vm(1), Vm(2)]);

        let mut plan = ReconfigurationPlan::new(mo.clone());
        plan.add(Action::MigrateVm { vm: Vm(1), from: Node(0), to: Node(2), start: 0, end: 5 }).unwrap();
        plan.add(Action::MigrateVm { vm: Vm(2), from: Node(1), to: Node(3), start: 2, end: 5 }).unwrap();
        assert!(sync.is_satisfied_plan(&plan));

        let mut skewed = ReconfigurationPlan::new(mo);
        skewed.add(Action::MigrateVm { vm: Vm(1), from: Node(0), to: Node(2), start: 0, end: 5 }).unwrap();
        skewed.add(Action::MigrateVm { vm: Vm(2), from: Node(1), to: Node(3), start: 0, end: 4 }).unwrap();
        assert!(!sync.is_satisfied_plan(&skewed));
    }

    #[test]
    fn capacity_checked_at_boundaries() {
        let mo = model_with(|map| {
            four_online_nodes(map);
            map.add_running_vm(Vm(1), Node(0));
            map.add_running_vm(Vm(2), Node(1));
            map.add_running_vm(Vm(3), Node(2));
        });
        let cap = SatConstraint::cumulated_running_capacity([Node(0), Node(1)], 2).with_continuous(true).unwrap();

        let mut plan = ReconfigurationPlan::new(mo.clone());
        assert!(cap.is_satisfied_plan(&plan));

        // vm3 squeezes in before vm1 leaves: 3 running VMs on {n0, n1} at the
        // first boundary
        plan.add(Action::MigrateVm { vm: Vm(3), from: Node(2), to: Node(1), start: 0, end: 1 }).unwrap();
        plan.add(Action::MigrateVm { vm: Vm(1), from: Node(0), to: Node(2), start: 1, end: 2 }).unwrap();
        assert!(!cap.is_satisfied_plan(&plan));

        // Discrete form only looks at the result, which is back to 2
        let relaxed = cap.with_continuous(false).unwrap();
        assert!(relaxed.is_satisfied_plan(&plan));
    }

    #[test]
    fn continuous_degenerates_to_discrete_on_an_empty_plan() {
        let mo = model_with(|map| {
            four_online_nodes(map);
            map.add_running_vm(Vm(1), Node(0));
            map.add_running_vm(Vm(2), Node(0));
            map.add_ready_vm(Vm(3));
        });
        let plan = ReconfigurationPlan::new(mo.clone());

        let kinds = vec![
            SatConstraint::gather([Vm(1), Vm(2)]),
            SatConstraint::split(vec![[Vm(1)].into(), [Vm(2)].into()]),
            SatConstraint::split_among(vec![[Vm(1), Vm(2)].into()], vec![[Node(0), Node(1)].into()]),
            SatConstraint::running([Vm(1), Vm(3)]),
            SatConstraint::ready([Vm(3)]),
            SatConstraint::online([Node(0)]),
            SatConstraint::offline([Node(0)]),
            SatConstraint::cumulated_running_capacity([Node(0)], 1),
        ];
        for c in kinds {
            let continuous = c.clone().with_continuous(true).unwrap();
            assert_eq!(
                c.is_satisfied(&mo),
                continuous.is_satisfied_plan(&plan),
                "t=0 disagreement for {}",
                c
            );
        }
        for c in [SatConstraint::root([Vm(1)]), SatConstraint::quarantine([Node(0)]), SatConstraint::sync_end([Vm(1)])] {
            assert_eq!(c.is_satisfied(&mo), c.is_satisfied_plan(&plan));
        }
    }

    #[test]
    fn state_constraint_must_keep_reached_state() {
        let mo = model_with(|map| {
            four_online_nodes(map);
            map.add_ready_vm(Vm(1));
        });
        let running = SatConstraint::running([Vm(1)]).with_continuous(true).unwrap();

        let mut plan = ReconfigurationPlan::new(mo.clone());
        assert!(!running.is_satisfied_plan(&plan));
        plan.add(Action::BootVm { vm: Vm(1), node: Node(0), start: 0, end: 1 }).unwrap();
        assert!(running.is_satisfied_plan(&plan));

        plan.add(Action::ShutdownVm { vm: Vm(1), node: Node(0), start: 1, end: 2 }).unwrap();
        assert!(!running.is_satisfied_plan(&plan));
    }
}
