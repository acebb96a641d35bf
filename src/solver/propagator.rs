//! Purpose-built propagators.
//!
//! Each propagator is one small domain-reduction rule over the variables of
//! the reconfiguration problem. Propagation runs the whole set to a fixpoint;
//! a wiped-out domain aborts the branch with a [`Contradiction`].

use std::collections::BTreeSet;

use crate::solver::store::{Contradiction, DomainStore, VarId};

#[derive(Debug, Clone)]
pub enum Propagator {
    /// `x == y`.
    Eq(VarId, VarId),
    /// `x != y`.
    Neq(VarId, VarId),
    /// `x + offset <= y`.
    LeOffset { x: VarId, offset: i32, y: VarId },
    /// `total == a + b`.
    Sum { total: VarId, a: VarId, b: VarId },
    /// `duration == if var == same { 0 } else { cost }` — channels a
    /// transition variable (host or state) into its action duration.
    TransitionDuration { var: VarId, same: i32, duration: VarId, cost: i32 },
    /// A host variable may only take values whose node-state variable
    /// resolves to online; committing to a host forces the node online.
    RequiresOnline { host: VarId, states: Vec<VarId> },
    /// If a node's state variable resolves to offline, every current slice it
    /// hosts must end before the shutdown starts.
    EvacuateBefore { state: VarId, vacated_end: VarId, shutdown_start: VarId },
    /// A destination slice landing on an initially-offline node waits for the
    /// node's boot to end.
    HostedAfterBoot { host: VarId, node_index: i32, boot_end: VarId, d_start: VarId },
    /// `bound == max(terms)`.
    Max { bound: VarId, terms: Vec<VarId> },
    /// Σ weights of `vars` assigned into `targets` stays within `capacity`.
    WeightedAtMost { vars: Vec<VarId>, weights: Vec<i32>, targets: BTreeSet<i32>, capacity: i64 },
    /// Channeling for grouped placement: `group` selects one of the
    /// `node_groups`, and every member host must live inside the selected
    /// group.
    GroupChannel { group: VarId, members: Vec<VarId>, node_groups: Vec<BTreeSet<i32>> },
}

impl Propagator {
    /// Run one reduction step.
    ///
    /// # Returns
    /// `true` iff some domain shrank.
    pub fn propagate(&self, store: &mut DomainStore) -> Result<bool, Contradiction> {
        match self {
            Propagator::Eq(x, y) => {
                let mut changed = false;
                let ys: Vec<i32> = store.domain(*y).collect();
                changed |= store.retain(*x, |v| ys.binary_search(&v).is_ok())?;
                let xs: Vec<i32> = store.domain(*x).collect();
                changed |= store.retain(*y, |v| xs.binary_search(&v).is_ok())?;
                Ok(changed)
            }
            Propagator::Neq(x, y) => {
                let mut changed = false;
                if let Some(v) = store.value(*x) {
                    changed |= store.remove(*y, v)?;
                }
                if let Some(v) = store.value(*y) {
                    changed |= store.remove(*x, v)?;
                }
                Ok(changed)
            }
            Propagator::LeOffset { x, offset, y } => {
                let mut changed = false;
                changed |= store.remove_above(*x, store.max(*y) - offset)?;
                changed |= store.remove_below(*y, store.min(*x) + offset)?;
                Ok(changed)
            }
            Propagator::Sum { total, a, b } => {
                let mut changed = false;
                changed |= store.remove_below(*total, store.min(*a) + store.min(*b))?;
                changed |= store.remove_above(*total, store.max(*a) + store.max(*b))?;
                changed |= store.remove_below(*a, store.min(*total) - store.max(*b))?;
                changed |= store.remove_above(*a, store.max(*total) - store.min(*b))?;
                changed |= store.remove_below(*b, store.min(*total) - store.max(*a))?;
                changed |= store.remove_above(*b, store.max(*total) - store.min(*a))?;
                Ok(changed)
            }
            Propagator::TransitionDuration { var, same, duration, cost } => {
                let mut changed = false;
                if let Some(v) = store.value(*var) {
                    let d = if v == *same { 0 } else { *cost };
                    changed |= store.instantiate(*duration, d)?;
                } else if !store.contains(*var, *same) {
                    changed |= store.instantiate(*duration, *cost)?;
                }
                if *cost != 0 {
                    match store.value(*duration) {
                        Some(0) => changed |= store.instantiate(*var, *same)?,
                        Some(d) if d == *cost => changed |= store.remove(*var, *same)?,
                        _ => {}
                    }
                }
                Ok(changed)
            }
            Propagator::RequiresOnline { host, states } => {
                let mut changed = false;
                let candidates: Vec<i32> = store.domain(*host).collect();
                for j in candidates {
                    if store.value(states[j as usize]) == Some(0) {
                        changed |= store.remove(*host, j)?;
                    }
                }
                if let Some(j) = store.value(*host) {
                    changed |= store.instantiate(states[j as usize], 1)?;
                }
                Ok(changed)
            }
            Propagator::EvacuateBefore { state, vacated_end, shutdown_start } => {
                let mut changed = false;
                match store.value(*state) {
                    Some(0) => {
                        changed |= store.remove_above(*vacated_end, store.max(*shutdown_start))?;
                        changed |= store.remove_below(*shutdown_start, store.min(*vacated_end))?;
                    }
                    Some(_) => {}
                    None => {
                        // The handoff cannot fit before any possible shutdown:
                        // the node has to stay online.
                        if store.min(*vacated_end) > store.max(*shutdown_start) {
                            changed |= store.instantiate(*state, 1)?;
                        }
                    }
                }
                Ok(changed)
            }
            Propagator::HostedAfterBoot { host, node_index, boot_end, d_start } => {
                let mut changed = false;
                if store.value(*host) == Some(*node_index) {
                    changed |= store.remove_below(*d_start, store.min(*boot_end))?;
                } else if store.contains(*host, *node_index) && store.max(*d_start) < store.min(*boot_end) {
                    changed |= store.remove(*host, *node_index)?;
                }
                Ok(changed)
            }
            Propagator::Max { bound, terms } => {
                let mut changed = false;
                let floor = terms.iter().map(|t| store.min(*t)).max().unwrap_or(0);
                let ceil = terms.iter().map(|t| store.max(*t)).max().unwrap_or(0);
                changed |= store.remove_below(*bound, floor)?;
                changed |= store.remove_above(*bound, ceil)?;
                let cap = store.max(*bound);
                for t in terms {
                    changed |= store.remove_above(*t, cap)?;
                }
                Ok(changed)
            }
            Propagator::WeightedAtMost { vars, weights, targets, capacity } => {
                let mut changed = false;
                let mut committed: i64 = 0;
                for (var, w) in vars.iter().zip(weights) {
                    if let Some(v) = store.value(*var) {
                        if targets.contains(&v) {
                            committed += *w as i64;
                        }
                    }
                }
                if committed > *capacity {
                    return Err(Contradiction);
                }
                for (var, w) in vars.iter().zip(weights) {
                    if !store.is_instantiated(*var) && committed + *w as i64 > *capacity {
                        changed |= store.retain(*var, |v| !targets.contains(&v))?;
                    }
                }
                Ok(changed)
            }
            Propagator::GroupChannel { group, members, node_groups } => {
                let mut changed = false;
                // A node group stays a candidate while every member could
                // still live inside it.
                for (k, nodes) in node_groups.iter().enumerate() {
                    if !store.contains(*group, k as i32) {
                        continue;
                    }
                    let feasible = members.iter().all(|m| store.domain(*m).any(|v| nodes.contains(&v)));
                    if !feasible {
                        changed |= store.remove(*group, k as i32)?;
                    }
                }
                if let Some(k) = store.value(*group) {
                    let nodes = &node_groups[k as usize];
                    for m in members {
                        changed |= store.retain(*m, |v| nodes.contains(&v))?;
                    }
                } else {
                    // Every member must stay inside the union of the
                    // remaining candidate groups.
                    let mut union: BTreeSet<i32> = BTreeSet::new();
                    for k in store.domain(*group).collect::<Vec<_>>() {
                        union.extend(node_groups[k as usize].iter().copied());
                    }
                    for m in members {
                        changed |= store.retain(*m, |v| union.contains(&v))?;
                    }
                }
                Ok(changed)
            }
        }
    }
}

/// Run all propagators to a fixpoint.
///
/// TODO Every round re-runs the full propagator list; a dirty queue keyed on
/// the variables touched in the previous round would cut the quadratic
/// rescans on larger instances.
pub fn propagate(store: &mut DomainStore, propagators: &[Propagator]) -> Result<(), Contradiction> {
    loop {
        let mut changed = false;
        for p in propagators {
            changed |= p.propagate(store)?;
        }
        if !changed {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_intersects_domains() {
        let mut store = DomainStore::new();
        let x = store.new_var_from("x", vec![1, 2, 3, 5]);
        let y = store.new_var_from("y", vec![2, 4, 5]);
        propagate(&mut store, &[Propagator::Eq(x, y)]).unwrap();
        assert_eq!(store.domain(x).collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(store.domain(y).collect::<Vec<_>>(), vec![2, 5]);
    }

    #[test]
    fn le_offset_tightens_bounds() {
        let mut store = DomainStore::new();
        let x = store.new_var("x", 0, 10);
        let y = store.new_var("y", 0, 10);
        propagate(&mut store, &[Propagator::LeOffset { x, offset: 4, y }]).unwrap();
        assert_eq!(store.max(x), 6);
        assert_eq!(store.min(y), 4);
    }

    #[test]
    fn sum_links_start_duration_end() {
        let mut store = DomainStore::new();
        let start = store.new_var("start", 0, 20);
        let dur = store.constant("dur", 5);
        let end = store.new_var("end", 0, 20);
        let props = [Propagator::Sum { total: end, a: start, b: dur }];
        propagate(&mut store, &props).unwrap();
        assert_eq!(store.min(end), 5);
        assert_eq!(store.max(start), 15);

        store.instantiate(start, 3).unwrap();
        propagate(&mut store, &props).unwrap();
        assert_eq!(store.value(end), Some(8));
    }

    #[test]
    fn transition_duration_channels_both_ways() {
        let mut store = DomainStore::new();
        let host = store.new_var("host", 0, 3);
        let dur = store.new_var_from("dur", vec![0, 7]);
        let props = [Propagator::TransitionDuration { var: host, same: 2, duration: dur, cost: 7 }];

        store.push();
        store.instantiate(host, 2).unwrap();
        propagate(&mut store, &props).unwrap();
        assert_eq!(store.value(dur), Some(0));
        store.pop();

        store.push();
        store.instantiate(host, 1).unwrap();
        propagate(&mut store, &props).unwrap();
        assert_eq!(store.value(dur), Some(7));
        store.pop();

        store.instantiate(dur, 0).unwrap();
        propagate(&mut store, &props).unwrap();
        assert_eq!(store.value(host), Some(2));
    }

    #[test]
    fn weighted_at_most_prunes() {
        let mut store = DomainStore::new();
        let a = store.new_var("a", 0, 1);
        let b = store.new_var("b", 0, 1);
        let targets: BTreeSet<i32> = [0].into();
        let props = [Propagator::WeightedAtMost { vars: vec![a, b], weights: vec![2, 2], targets, capacity: 3 }];

        store.instantiate(a, 0).unwrap();
        propagate(&mut store, &props).unwrap();
        // b no longer fits on node 0
        assert_eq!(store.value(b), Some(1));
    }

    #[test]
    fn group_channel_selects_consistent_group() {
        let mut store = DomainStore::new();
        let m1 = store.new_var("m1", 0, 3);
        let m2 = store.new_var("m2", 0, 3);
        let group = store.new_var("group", 0, 1);
        let node_groups: Vec<BTreeSet<i32>> = vec![[0, 1].into(), [2, 3].into()];
        let props = [Propagator::GroupChannel { group, members: vec![m1, m2], node_groups }];

        store.instantiate(m1, 2).unwrap();
        propagate(&mut store, &props).unwrap();
        assert_eq!(store.value(group), Some(1));
        assert_eq!(store.domain(m2).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn max_closes_on_fixed_terms() {
        let mut store = DomainStore::new();
        let a = store.constant("a", 5);
        let b = store.constant("b", 10);
        let bound = store.new_var("bound", 0, 50);
        propagate(&mut store, &[Propagator::Max { bound, terms: vec![a, b] }]).unwrap();
        assert_eq!(store.value(bound), Some(10));
    }
}
