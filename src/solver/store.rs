//! The variable domain store.
//!
//! An arena of finite integer domains with an undo log: every reduction
//! records the removed values, a checkpoint is a log position, and a
//! rollback replays the log backwards so a failed branch restores the
//! domains exactly.

use slotmap::{new_key_type, SecondaryMap, SlotMap};

new_key_type! {
    /// Handle of one solver variable.
    pub struct VarId;
}

/// Raised when a reduction empties a domain; aborts the current branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contradiction;

#[derive(Debug)]
struct VarRecord {
    name: String,
    /// Remaining values, sorted ascending. Never empty outside a
    /// contradiction.
    values: Vec<i32>,
}

/// A solved assignment: one value per instantiated variable.
pub type Assignment = SecondaryMap<VarId, i32>;

#[derive(Debug, Default)]
pub struct DomainStore {
    vars: SlotMap<VarId, VarRecord>,
    order: Vec<VarId>,
    trail: Vec<(VarId, Vec<i32>)>,
    checkpoints: Vec<usize>,
}

impl DomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A variable over the inclusive range `[lo, hi]`.
    pub fn new_var(&mut self, name: &str, lo: i32, hi: i32) -> VarId {
        debug_assert!(lo <= hi, "empty initial domain for '{}'", name);
        self.new_var_from(name, (lo..=hi).collect())
    }

    /// A variable over an explicit value set (deduplicated, sorted).
    pub fn new_var_from(&mut self, name: &str, mut values: Vec<i32>) -> VarId {
        values.sort_unstable();
        values.dedup();
        debug_assert!(!values.is_empty(), "empty initial domain for '{}'", name);
        let id = self.vars.insert(VarRecord { name: name.to_string(), values });
        self.order.push(id);
        id
    }

    /// A variable already fixed to `v`.
    pub fn constant(&mut self, name: &str, v: i32) -> VarId {
        self.new_var_from(name, vec![v])
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.vars[var].name
    }

    /// Variables in creation order.
    pub fn vars(&self) -> &[VarId] {
        &self.order
    }

    pub fn min(&self, var: VarId) -> i32 {
        *self.vars[var].values.first().expect("domain is never empty")
    }

    pub fn max(&self, var: VarId) -> i32 {
        *self.vars[var].values.last().expect("domain is never empty")
    }

    pub fn size(&self, var: VarId) -> usize {
        self.vars[var].values.len()
    }

    pub fn contains(&self, var: VarId, v: i32) -> bool {
        self.vars[var].values.binary_search(&v).is_ok()
    }

    pub fn is_instantiated(&self, var: VarId) -> bool {
        self.vars[var].values.len() == 1
    }

    /// The value of an instantiated variable.
    pub fn value(&self, var: VarId) -> Option<i32> {
        match self.vars[var].values.as_slice() {
            [v] => Some(*v),
            _ => None,
        }
    }

    pub fn domain(&self, var: VarId) -> impl Iterator<Item = i32> + '_ {
        self.vars[var].values.iter().copied()
    }

    /// Record `removed` on the trail. No-op for an empty removal.
    fn log(&mut self, var: VarId, removed: Vec<i32>) {
        if !removed.is_empty() {
            self.trail.push((var, removed));
        }
    }

    fn reduce(&mut self, var: VarId, keep: impl Fn(i32) -> bool) -> Result<bool, Contradiction> {
        let record = &mut self.vars[var];
        let removed: Vec<i32> = record.values.iter().copied().filter(|v| !keep(*v)).collect();
        if removed.is_empty() {
            return Ok(false);
        }
        record.values.retain(|v| keep(*v));
        let emptied = record.values.is_empty();
        self.log(var, removed);
        if emptied {
            return Err(Contradiction);
        }
        Ok(true)
    }

    /// Remove one value.
    pub fn remove(&mut self, var: VarId, v: i32) -> Result<bool, Contradiction> {
        self.reduce(var, |x| x != v)
    }

    /// Remove every value strictly below `bound`.
    pub fn remove_below(&mut self, var: VarId, bound: i32) -> Result<bool, Contradiction> {
        self.reduce(var, |x| x >= bound)
    }

    /// Remove every value strictly above `bound`.
    pub fn remove_above(&mut self, var: VarId, bound: i32) -> Result<bool, Contradiction> {
        self.reduce(var, |x| x <= bound)
    }

    /// Fix the variable to `v`.
    pub fn instantiate(&mut self, var: VarId, v: i32) -> Result<bool, Contradiction> {
        if !self.contains(var, v) {
            // Wipe the domain through the trail so the branch can be undone
            let _ = self.reduce(var, |_| false);
            return Err(Contradiction);
        }
        self.reduce(var, |x| x == v)
    }

    /// Keep only the values satisfying `keep`.
    pub fn retain(&mut self, var: VarId, keep: impl Fn(i32) -> bool) -> Result<bool, Contradiction> {
        self.reduce(var, keep)
    }

    /// Open a checkpoint.
    pub fn push(&mut self) {
        self.checkpoints.push(self.trail.len());
    }

    /// Roll back to the latest checkpoint, restoring every domain exactly.
    pub fn pop(&mut self) {
        let mark = self.checkpoints.pop().expect("pop without matching push");
        while self.trail.len() > mark {
            let (var, removed) = self.trail.pop().expect("trail length checked above");
            let record = &mut self.vars[var];
            record.values.extend(removed);
            record.values.sort_unstable();
        }
    }

    /// The current assignment of every instantiated variable.
    pub fn assignment(&self) -> Assignment {
        let mut out = Assignment::new();
        for id in &self.order {
            if let Some(v) = self.value(*id) {
                out.insert(*id, v);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reductions_and_queries() {
        let mut store = DomainStore::new();
        let x = store.new_var("x", 0, 9);
        assert_eq!(store.min(x), 0);
        assert_eq!(store.max(x), 9);
        assert_eq!(store.size(x), 10);

        assert!(store.remove_below(x, 3).unwrap());
        assert!(store.remove_above(x, 6).unwrap());
        assert!(store.remove(x, 5).unwrap());
        assert!(!store.remove(x, 5).unwrap());
        assert_eq!(store.domain(x).collect::<Vec<_>>(), vec![3, 4, 6]);

        assert!(store.instantiate(x, 4).unwrap());
        assert_eq!(store.value(x), Some(4));
    }

    #[test]
    fn wipeout_is_a_contradiction() {
        let mut store = DomainStore::new();
        let x = store.new_var("x", 0, 2);
        assert_eq!(store.remove_below(x, 5), Err(Contradiction));
    }

    #[test]
    fn pop_restores_exactly() {
        let mut store = DomainStore::new();
        let x = store.new_var("x", 0, 9);
        let y = store.new_var_from("y", vec![2, 4, 8]);

        store.push();
        store.remove_below(x, 5).unwrap();
        store.instantiate(y, 4).unwrap();
        store.push();
        store.remove(x, 7).unwrap();

        store.pop();
        assert_eq!(store.domain(x).collect::<Vec<_>>(), vec![5, 6, 7, 8, 9]);
        assert_eq!(store.value(y), Some(4));

        store.pop();
        assert_eq!(store.size(x), 10);
        assert_eq!(store.domain(y).collect::<Vec<_>>(), vec![2, 4, 8]);
    }

    #[test]
    fn failed_instantiation_is_undone_by_pop() {
        let mut store = DomainStore::new();
        let x = store.new_var("x", 0, 3);
        store.push();
        assert_eq!(store.instantiate(x, 7), Err(Contradiction));
        store.pop();
        assert_eq!(store.size(x), 4);
    }
}
