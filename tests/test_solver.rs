use std::time::Duration;

use vmplan::constraint::SatConstraint;
use vmplan::model::{AttrValue, Element, Model, ModelView, Node, ShareableResource};
use vmplan::plan::ActionKind;
use vmplan::solver::{AttributeDuration, ConstantDuration, ReconfigurationAlgorithm, Termination};

fn two_online_nodes() -> (Model, Node, Node) {
    let mut mo = Model::new();
    let n1 = mo.new_node();
    let n2 = mo.new_node();
    mo.mapping_mut().add_online_node(n1);
    mo.mapping_mut().add_online_node(n2);
    (mo, n1, n2)
}

#[test]
fn shutdown_an_empty_datacenter() {
    let (mo, n1, n2) = two_online_nodes();

    let mut cra = ReconfigurationAlgorithm::new();
    cra.duration_evaluators().register(ActionKind::ShutdownNode, Box::new(ConstantDuration(10)));

    let outcome = cra.solve(&mo, &[SatConstraint::offline([n1, n2])]).unwrap();
    assert_eq!(outcome.termination, Termination::Optimal);

    let plan = outcome.plan.expect("a plan exists");
    assert_eq!(plan.size(), 2);
    assert_eq!(plan.duration(), 10);
    assert!(plan.actions().iter().all(|a| a.kind() == ActionKind::ShutdownNode));

    let result = plan.result().unwrap();
    assert_eq!(result.mapping().offline_nodes().count(), 2);
    assert_eq!(result.mapping().online_nodes().count(), 0);
}

#[test]
fn boot_vms_across_capacity() {
    let (mut mo, _, _) = two_online_nodes();
    let vm1 = mo.new_vm();
    let vm2 = mo.new_vm();
    mo.mapping_mut().add_ready_vm(vm1);
    mo.mapping_mut().add_ready_vm(vm2);

    let mut cpu = ShareableResource::with_defaults("cpu", 4, 0);
    cpu.set_consumption(vm1, 3).set_consumption(vm2, 3);
    mo.attach(ModelView::Shareable(cpu));

    let cra = ReconfigurationAlgorithm::new();
    let outcome = cra.solve(&mo, &[SatConstraint::running([vm1, vm2])]).unwrap();
    let plan = outcome.plan.expect("a plan exists");

    assert_eq!(plan.size(), 2);
    let result = plan.result().unwrap();
    assert!(result.mapping().is_running(vm1));
    assert!(result.mapping().is_running(vm2));
    // 3 + 3 never fits one 4-cpu node
    assert_ne!(result.mapping().vm_location(vm1), result.mapping().vm_location(vm2));
}

#[test]
fn evacuate_before_shutdown() {
    let (mut mo, n1, n2) = two_online_nodes();
    let vm = mo.new_vm();
    mo.mapping_mut().add_running_vm(vm, n1);

    let cra = ReconfigurationAlgorithm::new();
    let outcome = cra.solve(&mo, &[SatConstraint::offline([n1])]).unwrap();
    let plan = outcome.plan.expect("a plan exists");

    assert_eq!(plan.size(), 2);
    let ordered = plan.actions();
    let migration = ordered.iter().find(|a| a.kind() == ActionKind::MigrateVm).expect("the VM moves away");
    let shutdown = ordered.iter().find(|a| a.kind() == ActionKind::ShutdownNode).expect("the node powers down");
    assert!(migration.end() <= shutdown.start(), "the node must be empty before it powers down");

    let result = plan.result().unwrap();
    assert_eq!(result.mapping().vm_location(vm), Some(n2));
    assert!(result.mapping().is_offline(n1));
}

#[test]
fn no_host_left_is_proven_infeasible() {
    let mut mo = Model::new();
    let n1 = mo.new_node();
    mo.mapping_mut().add_online_node(n1);
    let vm = mo.new_vm();
    mo.mapping_mut().add_running_vm(vm, n1);

    let cra = ReconfigurationAlgorithm::new();
    let outcome = cra.solve(&mo, &[SatConstraint::offline([n1])]).unwrap();
    assert_eq!(outcome.termination, Termination::Infeasible);
    assert!(outcome.plan.is_none());
}

#[test]
fn contradicting_state_constraints_fail_at_injection() {
    let (mut mo, n1, _) = two_online_nodes();
    let vm = mo.new_vm();
    mo.mapping_mut().add_running_vm(vm, n1);

    let cra = ReconfigurationAlgorithm::new();
    let err = cra.solve(&mo, &[SatConstraint::running([vm]), SatConstraint::ready([vm])]);
    assert!(err.is_err());
}

#[test]
fn node_budget_reports_unknown() {
    let (mut mo, n1, n2) = two_online_nodes();
    for _ in 0..4 {
        let vm = mo.new_vm();
        mo.mapping_mut().add_running_vm(vm, n1);
    }

    let mut cra = ReconfigurationAlgorithm::new();
    cra.set_node_limit(Some(1));
    let outcome = cra.solve(&mo, &[SatConstraint::offline([n1])]).unwrap();
    assert_eq!(outcome.termination, Termination::BudgetExceeded);
    assert!(outcome.plan.is_none());
    let _ = n2;
}

#[test]
fn continuous_gather_anchors_to_the_running_member() {
    let (mut mo, n1, n2) = two_online_nodes();
    let anchored = mo.new_vm();
    let joining = mo.new_vm();
    mo.mapping_mut().add_running_vm(anchored, n2);
    mo.mapping_mut().add_ready_vm(joining);

    let gather = SatConstraint::gather([anchored, joining]).with_continuous(true).unwrap();
    let cra = ReconfigurationAlgorithm::new();
    let outcome = cra.solve(&mo, &[SatConstraint::running([joining]), gather]).unwrap();
    let plan = outcome.plan.expect("a plan exists");

    let result = plan.result().unwrap();
    assert_eq!(result.mapping().vm_location(joining), Some(n2));
    let _ = n1;
}

#[test]
fn quarantine_keeps_new_vms_outside() {
    let (mut mo, n1, n2) = two_online_nodes();
    let vm = mo.new_vm();
    mo.mapping_mut().add_ready_vm(vm);

    let cra = ReconfigurationAlgorithm::new();
    let outcome = cra
        .solve(&mo, &[SatConstraint::running([vm]), SatConstraint::quarantine([n1])])
        .unwrap();
    let plan = outcome.plan.expect("a plan exists");
    assert_eq!(plan.result().unwrap().mapping().vm_location(vm), Some(n2));
}

#[test]
fn sync_end_aligns_migration_ends() {
    let mut mo = Model::new();
    let n1 = mo.new_node();
    let n2 = mo.new_node();
    let n3 = mo.new_node();
    for n in [n1, n2, n3] {
        mo.mapping_mut().add_online_node(n);
    }
    let fast = mo.new_vm();
    let slow = mo.new_vm();
    mo.mapping_mut().add_running_vm(fast, n1);
    mo.mapping_mut().add_running_vm(slow, n2);
    mo.attributes_mut().put(Element::Vm(fast), "migrate", AttrValue::Int(3));
    mo.attributes_mut().put(Element::Vm(slow), "migrate", AttrValue::Int(5));

    let mut cra = ReconfigurationAlgorithm::new();
    cra.duration_evaluators()
        .register(ActionKind::MigrateVm, Box::new(AttributeDuration { key: "migrate".into(), fallback: 5 }));

    let constraints =
        [SatConstraint::offline([n1, n2]), SatConstraint::sync_end([fast, slow])];
    let outcome = cra.solve(&mo, &constraints).unwrap();
    let plan = outcome.plan.expect("a plan exists");

    let ordered = plan.actions();
    let migrations: Vec<_> = ordered.iter().filter(|a| a.kind() == ActionKind::MigrateVm).collect();
    assert_eq!(migrations.len(), 2);
    assert_eq!(migrations[0].end(), migrations[1].end());

    let result = plan.result().unwrap();
    assert_eq!(result.mapping().vm_location(fast), Some(n3));
    assert_eq!(result.mapping().vm_location(slow), Some(n3));
}

#[test]
fn unregistered_kind_is_rejected() {
    let (mo, n1, _) = two_online_nodes();
    let mut cra = ReconfigurationAlgorithm::new();
    assert!(cra.constraint_mapper().unregister("offline"));
    assert!(cra.solve(&mo, &[SatConstraint::offline([n1])]).is_err());
}

#[test]
fn time_limit_is_accepted() {
    let (mo, n1, n2) = two_online_nodes();
    let mut cra = ReconfigurationAlgorithm::new();
    cra.set_time_limit(Some(Duration::from_secs(5)));
    let outcome = cra.solve(&mo, &[SatConstraint::offline([n1, n2])]).unwrap();
    assert!(outcome.plan.is_some());
}
