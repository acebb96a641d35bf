use std::collections::BTreeMap;
use std::fmt;

use crate::model::{Element, Model};
use crate::plan::ActionKind;

/// Estimates how long one action kind takes for a given subject.
pub trait DurationEvaluator: fmt::Debug {
    fn evaluate(&self, model: &Model, subject: Element) -> i32;
}

/// The same duration for every subject.
#[derive(Debug, Clone, Copy)]
pub struct ConstantDuration(pub i32);

impl DurationEvaluator for ConstantDuration {
    fn evaluate(&self, _model: &Model, _subject: Element) -> i32 {
        self.0
    }
}

/// Reads a per-element integer attribute from the model, falling back to a
/// constant when the attribute is unset.
#[derive(Debug, Clone)]
pub struct AttributeDuration {
    pub key: String,
    pub fallback: i32,
}

impl DurationEvaluator for AttributeDuration {
    fn evaluate(&self, model: &Model, subject: Element) -> i32 {
        match model.attributes().get_int(subject, &self.key) {
            Some(d) => d as i32,
            None => self.fallback,
        }
    }
}

/// The evaluator registry, one entry per action kind.
#[derive(Debug)]
pub struct DurationEvaluators {
    table: BTreeMap<ActionKind, Box<dyn DurationEvaluator>>,
}

impl DurationEvaluators {
    /// Sensible constant defaults for every kind.
    pub fn defaults() -> Self {
        let mut evals = Self { table: BTreeMap::new() };
        evals.register(ActionKind::BootVm, Box::new(ConstantDuration(3)));
        evals.register(ActionKind::ShutdownVm, Box::new(ConstantDuration(2)));
        evals.register(ActionKind::MigrateVm, Box::new(ConstantDuration(5)));
        evals.register(ActionKind::SuspendVm, Box::new(ConstantDuration(3)));
        evals.register(ActionKind::ResumeVm, Box::new(ConstantDuration(4)));
        evals.register(ActionKind::BootNode, Box::new(ConstantDuration(6)));
        evals.register(ActionKind::ShutdownNode, Box::new(ConstantDuration(6)));
        evals
    }

    /// Register the evaluator for one action kind.
    ///
    /// # Returns
    /// `true` if a previous evaluator was replaced.
    pub fn register(&mut self, kind: ActionKind, eval: Box<dyn DurationEvaluator>) -> bool {
        self.table.insert(kind, eval).is_some()
    }

    pub fn unregister(&mut self, kind: ActionKind) -> bool {
        self.table.remove(&kind).is_some()
    }

    pub fn is_registered(&self, kind: ActionKind) -> bool {
        self.table.contains_key(&kind)
    }

    /// The duration of `kind` applied to `subject`, always at least 1.
    pub fn evaluate(&self, model: &Model, kind: ActionKind, subject: Element) -> i32 {
        let raw = match self.table.get(&kind) {
            Some(eval) => eval.evaluate(model, subject),
            None => {
                log::warn!("no duration evaluator for '{}', assuming 1", kind);
                1
            }
        };
        raw.max(1)
    }
}

impl Default for DurationEvaluators {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttrValue, Vm};

    #[test]
    fn attribute_backed_duration() {
        let mut mo = Model::new();
        let vm = mo.new_vm();
        mo.attributes_mut().put(Element::Vm(vm), "migrate", AttrValue::Int(12));

        let mut evals = DurationEvaluators::defaults();
        evals.register(ActionKind::MigrateVm, Box::new(AttributeDuration { key: "migrate".into(), fallback: 5 }));

        assert_eq!(evals.evaluate(&mo, ActionKind::MigrateVm, Element::Vm(vm)), 12);
        let other = mo.new_vm();
        assert_eq!(evals.evaluate(&mo, ActionKind::MigrateVm, Element::Vm(other)), 5);
    }

    #[test]
    fn durations_are_at_least_one() {
        let mo = Model::new();
        let mut evals = DurationEvaluators::defaults();
        evals.register(ActionKind::BootVm, Box::new(ConstantDuration(0)));
        assert_eq!(evals.evaluate(&mo, ActionKind::BootVm, Element::Vm(Vm(0))), 1);
    }
}
