use crate::error::{Error, Result};
use crate::model::{Element, Model, NodeState, VmState};
use crate::plan::action::Action;
use crate::plan::comparator::TimedActionComparator;

/// A set of timed actions turning a source [`Model`] into a new placement.
///
/// Insertion validates each action against the timeline already scheduled
/// for its subject, so the per-subject precedence graph stays consistent and
/// acyclic by construction. The resulting model is obtained by replaying the
/// actions in comparator order over a clone of the source.
#[derive(Debug, Clone)]
pub struct ReconfigurationPlan {
    source: Model,
    actions: Vec<Action>,
    comparator: TimedActionComparator,
}

impl ReconfigurationPlan {
    pub fn new(source: Model) -> Self {
        Self { source, actions: Vec::new(), comparator: TimedActionComparator::start() }
    }

    pub fn source(&self) -> &Model {
        &self.source
    }

    /// Insert an action.
    ///
    /// The action's window must be sane (`0 <= start <= end`) and its
    /// required current state/location must be consistent with the source
    /// model or with the latest action already scheduled for the same
    /// subject, whichever is later. On rejection the plan is unchanged.
    pub fn add(&mut self, action: Action) -> Result<()> {
        if action.start() < 0 || action.end() < action.start() {
            return Err(Error::Inconsistency(format!("malformed window for '{}'", action.pretty())));
        }
        self.check_subject_timeline(&action)?;
        self.actions.push(action);
        Ok(())
    }

    /// Replay the subject's already-scheduled actions together with the
    /// candidate and verify the state chain holds.
    fn check_subject_timeline(&self, candidate: &Action) -> Result<()> {
        let subject = candidate.subject();
        let mut timeline: Vec<&Action> = self.actions.iter().filter(|a| a.subject() == subject).collect();
        timeline.push(candidate);
        timeline.sort_by(|a, b| self.comparator.compare(a, b));

        let mut prev_end = 0;
        match subject {
            Element::Vm(vm) => {
                let mut state = self
                    .source
                    .mapping()
                    .vm_state(vm)
                    .ok_or_else(|| Error::Inconsistency(format!("{} is not part of the source model", vm)))?;
                let mut location = self.source.mapping().vm_location(vm);

                for a in timeline {
                    let (cur, next) = a.vm_transition().expect("VM subject implies a VM action");
                    if a.start() < prev_end {
                        return Err(Error::Inconsistency(format!("'{}' overlaps an earlier action on {}", a.pretty(), vm)));
                    }
                    if cur != state || a.source_host() != location {
                        return Err(Error::Inconsistency(format!(
                            "'{}' expects {} {:?} on {:?}, but the timeline leaves it {:?} on {:?}",
                            a.pretty(),
                            vm,
                            cur,
                            a.source_host(),
                            state,
                            location
                        )));
                    }
                    state = next;
                    location = match next {
                        VmState::Ready => None,
                        _ => a.destination_host(),
                    };
                    prev_end = a.end();
                }
            }
            Element::Node(n) => {
                let mut state = if self.source.mapping().is_online(n) {
                    NodeState::Online
                } else if self.source.mapping().is_offline(n) {
                    NodeState::Offline
                } else {
                    return Err(Error::Inconsistency(format!("{} is not part of the source model", n)));
                };

                for a in timeline {
                    let (cur, next) = a.node_transition().expect("node subject implies a node action");
                    if a.start() < prev_end {
                        return Err(Error::Inconsistency(format!("'{}' overlaps an earlier action on {}", a.pretty(), n)));
                    }
                    if cur != state {
                        return Err(Error::Inconsistency(format!(
                            "'{}' expects {} to be {:?}, but the timeline leaves it {:?}",
                            a.pretty(),
                            n,
                            cur,
                            state
                        )));
                    }
                    state = next;
                    prev_end = a.end();
                }
            }
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The makespan: the latest end instant over all actions, 0 when empty.
    pub fn duration(&self) -> i32 {
        self.actions.iter().map(|a| a.end()).max().unwrap_or(0)
    }

    /// The actions in comparator order (start instant, then end instant).
    pub fn actions(&self) -> Vec<&Action> {
        let mut sorted: Vec<&Action> = self.actions.iter().collect();
        sorted.sort_by(|a, b| self.comparator.compare(a, b));
        sorted
    }

    /// The model obtained by applying every action over a clone of the
    /// source.
    ///
    /// Fails without a partial result if any application is refused; such a
    /// plan is inconsistent.
    pub fn result(&self) -> Result<Model> {
        let mut model = self.source.clone();
        for action in self.actions() {
            if !action.apply(&mut model) {
                return Err(Error::Inconsistency(format!("applying '{}' was refused", action.pretty())));
            }
        }
        Ok(model)
    }
}
