//! Depth-first branch-and-bound over the domain store.
//!
//! Single-threaded: propagation and branching interleave on one control
//! flow, with the trail restoring domains on backtrack. The objective is
//! minimized by tightening its upper bound after every incumbent. The
//! search is cooperative: a wall-clock deadline or node budget stops it and
//! the incumbent found so far is returned.

use std::time::{Duration, Instant};

use crate::solver::propagator::{propagate, Propagator};
use crate::solver::store::{Assignment, DomainStore, VarId};

/// Caps on the exploration. Unset fields mean unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchBudget {
    pub time_limit: Option<Duration>,
    pub node_limit: Option<u64>,
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_time_limit(limit: Duration) -> Self {
        Self { time_limit: Some(limit), node_limit: None }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStatistics {
    pub nodes: u64,
    pub backtracks: u64,
    pub solutions: u32,
}

/// How the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The tree was exhausted: the incumbent is optimal.
    Optimal,
    /// The tree was exhausted without any solution: proven infeasible.
    Infeasible,
    /// The budget expired first: the incumbent, if any, is the best known.
    BudgetExceeded,
}

#[derive(Debug)]
pub struct SearchResult {
    pub best: Option<Assignment>,
    pub objective: Option<i32>,
    pub termination: Termination,
    pub statistics: SearchStatistics,
}

/// Raised internally when the budget expires mid-branch.
struct Stop;

struct Search<'a> {
    store: &'a mut DomainStore,
    propagators: &'a [Propagator],
    decisions: &'a [VarId],
    objective: VarId,
    deadline: Option<Instant>,
    node_limit: Option<u64>,
    best: Option<Assignment>,
    best_objective: Option<i32>,
    statistics: SearchStatistics,
}

/// Minimize `objective` over all assignments of `decisions`.
pub fn minimize(
    store: &mut DomainStore,
    propagators: &[Propagator],
    decisions: &[VarId],
    objective: VarId,
    budget: SearchBudget,
) -> SearchResult {
    let mut search = Search {
        store,
        propagators,
        decisions,
        objective,
        deadline: budget.time_limit.map(|l| Instant::now() + l),
        node_limit: budget.node_limit,
        best: None,
        best_objective: None,
        statistics: SearchStatistics::default(),
    };

    search.store.push();
    let interrupted = search.explore().is_err();
    search.store.pop();

    let termination = if interrupted {
        Termination::BudgetExceeded
    } else if search.best.is_some() {
        Termination::Optimal
    } else {
        Termination::Infeasible
    };
    log::debug!(
        "search finished: {:?}, objective={:?}, {} nodes, {} backtracks, {} solutions",
        termination,
        search.best_objective,
        search.statistics.nodes,
        search.statistics.backtracks,
        search.statistics.solutions
    );

    SearchResult { best: search.best, objective: search.best_objective, termination, statistics: search.statistics }
}

impl Search<'_> {
    fn exceeded(&self) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        if let Some(limit) = self.node_limit {
            if self.statistics.nodes >= limit {
                return true;
            }
        }
        false
    }

    /// First-fail: the uninstantiated decision variable with the smallest
    /// domain, creation order breaking ties.
    fn pick_variable(&self) -> Option<VarId> {
        self.decisions
            .iter()
            .copied()
            .filter(|v| !self.store.is_instantiated(*v))
            .min_by_key(|v| self.store.size(*v))
    }

    fn explore(&mut self) -> Result<(), Stop> {
        self.statistics.nodes += 1;
        if self.exceeded() {
            return Err(Stop);
        }

        // Branch-and-bound: only improvements over the incumbent are wanted
        if let Some(bound) = self.best_objective {
            if self.store.remove_above(self.objective, bound - 1).is_err() {
                self.statistics.backtracks += 1;
                return Ok(());
            }
        }
        if propagate(self.store, self.propagators).is_err() {
            self.statistics.backtracks += 1;
            return Ok(());
        }

        let Some(var) = self.pick_variable() else {
            // All decisions fixed: the objective collapses to its floor
            let value = self.store.min(self.objective);
            self.store.instantiate(self.objective, value).expect("floor is in the domain");
            self.best = Some(self.store.assignment());
            self.best_objective = Some(value);
            self.statistics.solutions += 1;
            log::debug!("incumbent with objective {}", value);
            return Ok(());
        };

        for v in self.store.domain(var).collect::<Vec<_>>() {
            self.store.push();
            let feasible = self.store.instantiate(var, v).is_ok();
            let outcome = if feasible { self.explore() } else { Ok(()) };
            self.store.pop();
            outcome?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_a_simple_makespan() {
        let mut store = DomainStore::new();
        let s1 = store.new_var("s1", 0, 10);
        let e1 = store.new_var("e1", 0, 20);
        let d1 = store.constant("d1", 4);
        let s2 = store.new_var("s2", 0, 10);
        let e2 = store.new_var("e2", 0, 20);
        let d2 = store.constant("d2", 6);
        let obj = store.new_var("makespan", 0, 20);

        let props = vec![
            Propagator::Sum { total: e1, a: s1, b: d1 },
            Propagator::Sum { total: e2, a: s2, b: d2 },
            // The two windows must not overlap: e1 <= s2
            Propagator::LeOffset { x: e1, offset: 0, y: s2 },
            Propagator::Max { bound: obj, terms: vec![e1, e2] },
        ];
        let decisions = [s1, s2];

        let result = minimize(&mut store, &props, &decisions, obj, SearchBudget::unlimited());
        assert_eq!(result.termination, Termination::Optimal);
        assert_eq!(result.objective, Some(10));
        let best = result.best.unwrap();
        assert_eq!(best[s1], 0);
        assert_eq!(best[s2], 4);
    }

    #[test]
    fn proves_infeasibility() {
        let mut store = DomainStore::new();
        let x = store.new_var("x", 0, 3);
        let y = store.new_var("y", 0, 3);
        let obj = store.constant("obj", 0);
        // x + 10 <= y can never hold on [0, 3]
        let props = vec![Propagator::LeOffset { x, offset: 10, y }];

        let result = minimize(&mut store, &props, &[x, y], obj, SearchBudget::unlimited());
        assert_eq!(result.termination, Termination::Infeasible);
        assert!(result.best.is_none());
    }

    #[test]
    fn node_budget_interrupts() {
        let mut store = DomainStore::new();
        let vars: Vec<_> = (0..12).map(|i| store.new_var(&format!("x{}", i), 0, 9)).collect();
        let obj = store.constant("obj", 0);
        // All-different keeps the tree big enough to hit the cap
        let mut props = Vec::new();
        for i in 0..vars.len() {
            for j in 0..i {
                props.push(Propagator::Neq(vars[i], vars[j]));
            }
        }

        let budget = SearchBudget { time_limit: None, node_limit: Some(3) };
        let result = minimize(&mut store, &props, &vars, obj, budget);
        assert_eq!(result.termination, Termination::BudgetExceeded);
    }

    #[test]
    fn domains_restored_after_search() {
        let mut store = DomainStore::new();
        let x = store.new_var("x", 0, 5);
        let obj = store.new_var("obj", 0, 5);
        let props = vec![Propagator::Eq(x, obj)];

        let result = minimize(&mut store, &props, &[x], obj, SearchBudget::unlimited());
        assert_eq!(result.objective, Some(0));
        // The store is back to its pre-search state
        assert_eq!(store.size(x), 6);
        assert_eq!(store.size(obj), 6);
    }
}
