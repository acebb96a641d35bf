//! The solving facade: owns the registries and the budget, drives the
//! problem build, the injection, the search and the extraction.

use std::time::Duration;

use crate::constraint::SatConstraint;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::plan::ReconfigurationPlan;
use crate::solver::durations::DurationEvaluators;
use crate::solver::injector::ConstraintMapper;
use crate::solver::problem::ReconfigurationProblem;
use crate::solver::search::{SearchBudget, SearchStatistics, Termination};
use crate::solver::view::ViewMapper;

/// The outcome of one solve.
///
/// Search exhaustion is not an error: `plan` is `None` and `termination`
/// tells whether infeasibility was proven or the budget ran out first.
#[derive(Debug)]
pub struct SolveOutcome {
    pub plan: Option<ReconfigurationPlan>,
    pub termination: Termination,
    pub statistics: SearchStatistics,
}

pub struct ReconfigurationAlgorithm {
    durations: DurationEvaluators,
    constraints: ConstraintMapper,
    views: ViewMapper,
    budget: SearchBudget,
}

impl ReconfigurationAlgorithm {
    pub fn new() -> Self {
        Self {
            durations: DurationEvaluators::defaults(),
            constraints: ConstraintMapper::with_defaults(),
            views: ViewMapper::with_defaults(),
            budget: SearchBudget::unlimited(),
        }
    }

    pub fn duration_evaluators(&mut self) -> &mut DurationEvaluators {
        &mut self.durations
    }

    pub fn constraint_mapper(&mut self) -> &mut ConstraintMapper {
        &mut self.constraints
    }

    pub fn view_mapper(&mut self) -> &mut ViewMapper {
        &mut self.views
    }

    /// Cap the wall-clock time of the search. `None` removes the cap.
    pub fn set_time_limit(&mut self, limit: Option<Duration>) {
        self.budget.time_limit = limit;
    }

    /// Cap the number of explored search nodes. `None` removes the cap.
    pub fn set_node_limit(&mut self, limit: Option<u64>) {
        self.budget.node_limit = limit;
    }

    /// Compute a makespan-minimal plan taking `model` to a placement
    /// satisfying every constraint.
    ///
    /// # Errors
    /// `Error::Injection` when the constraint set is contradictory before
    /// search even starts, or names an unknown kind or subject.
    pub fn solve(&self, model: &Model, constraints: &[SatConstraint]) -> Result<SolveOutcome> {
        let mut rp = ReconfigurationProblem::build(model, constraints, &self.durations)?;

        let views: Vec<_> = model.views().cloned().collect();
        for view in &views {
            match self.views.build(view) {
                Some(solver_view) => solver_view.inject(&mut rp)?,
                None => {
                    return Err(Error::Injection {
                        constraint: view.id(),
                        detail: format!("no solver view registered for kind '{}'", view.kind()),
                    });
                }
            }
        }

        for c in constraints {
            let injector = self.constraints.build(c).ok_or_else(|| Error::Injection {
                constraint: c.tag().to_string(),
                detail: "no injector registered for this constraint kind".to_string(),
            })?;
            injector.inject(&mut rp)?;
        }

        log::info!(
            "solving: {} VMs, {} nodes, {} constraints, horizon {}",
            model.mapping().nb_vms(),
            model.mapping().nb_nodes(),
            constraints.len(),
            rp.horizon()
        );
        let result = rp.solve(self.budget);

        let plan = match &result.best {
            Some(assignment) => {
                let plan = rp.extract_plan(assignment)?;
                self.validate(&plan, constraints)?;
                Some(plan)
            }
            None => None,
        };
        Ok(SolveOutcome { plan, termination: result.termination, statistics: result.statistics })
    }

    /// Check the produced plan against every constraint, as a guard against
    /// modeling gaps between the injectors and the checkers.
    fn validate(&self, plan: &ReconfigurationPlan, constraints: &[SatConstraint]) -> Result<()> {
        for c in constraints {
            if !c.is_satisfied_plan(plan) {
                return Err(Error::Inconsistency(format!("the computed plan violates {}", c)));
            }
        }
        Ok(())
    }
}

impl Default for ReconfigurationAlgorithm {
    fn default() -> Self {
        Self::new()
    }
}
