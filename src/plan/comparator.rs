use std::cmp::Ordering;

use crate::plan::action::Action;

/// Orders timed actions for presentation and replay.
///
/// The primary key is the start instant ("start" mode) or the end instant
/// ("stop" mode), ascending; actions with the same primary instant are
/// ordered by the other instant. Two actions with identical start and end
/// rank equal by default. With `disallow_simultaneous`, exact ties are
/// instead broken by subject identity and then by action kind, so any two
/// distinct actions get a strict, deterministic order.
///
/// The result is a strict weak ordering in both modes: `compare(a, a)` is
/// always `Equal`.
#[derive(Debug, Clone, Copy)]
pub struct TimedActionComparator {
    start_based: bool,
    disallow_simultaneous: bool,
}

impl TimedActionComparator {
    /// The default comparator: start-instant primary key, ties rank equal.
    pub fn start() -> Self {
        Self { start_based: true, disallow_simultaneous: false }
    }

    /// End-instant primary key.
    pub fn stop() -> Self {
        Self { start_based: false, disallow_simultaneous: false }
    }

    pub fn new(start_based: bool, disallow_simultaneous: bool) -> Self {
        Self { start_based, disallow_simultaneous }
    }

    pub fn compare(&self, a: &Action, b: &Action) -> Ordering {
        let (primary, secondary) = if self.start_based {
            (a.start().cmp(&b.start()), a.end().cmp(&b.end()))
        } else {
            (a.end().cmp(&b.end()), a.start().cmp(&b.start()))
        };

        let by_time = primary.then(secondary);
        if by_time != Ordering::Equal || !self.disallow_simultaneous {
            return by_time;
        }

        // Strict serialization requested: same window, fall back to stable
        // identity keys.
        a.subject().cmp(&b.subject()).then_with(|| a.kind().cmp(&b.kind()))
    }
}

impl Default for TimedActionComparator {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    fn act(node: u32, start: i32, end: i32) -> Action {
        Action::ShutdownNode { node: Node(node), start, end }
    }

    #[test]
    fn precedence() {
        let a = act(1, 0, 4);
        let b = act(2, 4, 10);
        let start = TimedActionComparator::start();
        let stop = TimedActionComparator::stop();

        assert_eq!(start.compare(&a, &b), Ordering::Less);
        assert_eq!(start.compare(&b, &a), Ordering::Greater);
        assert_eq!(stop.compare(&a, &b), Ordering::Less);
        assert_eq!(stop.compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn identical_windows_rank_equal() {
        let a = act(1, 0, 4);
        let b = act(2, 0, 4);
        assert_eq!(TimedActionComparator::start().compare(&a, &b), Ordering::Equal);
        assert_eq!(TimedActionComparator::stop().compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn simultaneous_disallowed_is_strict() {
        let a = act(1, 0, 4);
        let b = act(2, 0, 4);
        for start_based in [true, false] {
            let cmp = TimedActionComparator::new(start_based, true);
            assert_ne!(cmp.compare(&a, &b), Ordering::Equal);
            assert_eq!(cmp.compare(&a, &b), cmp.compare(&b, &a).reverse());
            // Still reflexively equal
            assert_eq!(cmp.compare(&a, &a), Ordering::Equal);
        }
    }

    #[test]
    fn strict_weak_ordering_on_random_windows() {
        use rand::Rng;

        let mut rng = rand::rng();
        let actions: Vec<Action> = (0..40)
            .map(|i| {
                let start = rng.random_range(0..10);
                let len = rng.random_range(0..5);
                act(i, start, start + len)
            })
            .collect();

        for start_based in [true, false] {
            for disallow in [false, true] {
                let cmp = TimedActionComparator::new(start_based, disallow);
                for a in &actions {
                    assert_eq!(cmp.compare(a, a), Ordering::Equal);
                    for b in &actions {
                        assert_eq!(cmp.compare(a, b), cmp.compare(b, a).reverse());
                    }
                }
            }
        }
    }

    #[test]
    fn overlap_falls_back_to_other_instant() {
        let start = TimedActionComparator::start();
        let stop = TimedActionComparator::stop();

        let a = act(1, 0, 4);
        let b = act(2, 2, 4);
        assert_eq!(start.compare(&a, &b), Ordering::Less);
        assert_eq!(stop.compare(&a, &b), Ordering::Less);

        let c = act(1, 0, 4);
        let d = act(2, 0, 3);
        assert_eq!(start.compare(&c, &d), Ordering::Greater);
        assert_eq!(stop.compare(&c, &d), Ordering::Greater);
    }
}
