use super::*;
use crate::compare::by_key;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

const N: usize = if cfg!(miri) { 50 } else { 2000 };

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Task {
    key: i32,
    name: &'static str,
}

impl Updatable for Task {
    type Value = i32;
    type Error = Infallible;

    fn update(&mut self, key: i32) -> Result<(), Infallible> {
        self.key = key;
        Ok(())
    }
}

fn task(key: i32, name: &'static str) -> Task {
    Task { key, name }
}

fn names<C: Compare<Task>>(set: &UpdatableSet<Task, C>) -> Vec<&'static str> {
    set.values().map(|t| t.name).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Gauge {
    level: u32,
    name: char,
}

#[derive(Debug, PartialEq, Eq)]
struct Overflow(u32);

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {} is above the limit", self.0)
    }
}

impl Error for Overflow {}

impl Updatable for Gauge {
    type Value = u32;
    type Error = Overflow;

    fn update(&mut self, level: u32) -> Result<(), Overflow> {
        if level > 100 {
            return Err(Overflow(level));
        }
        self.level = level;
        Ok(())
    }
}

fn gauge(level: u32, name: char) -> Gauge {
    Gauge { level, name }
}

/// Element counting how often it was updated, the count outlives the element.
struct Counted {
    key: i32,
    hits: Rc<Cell<usize>>,
}

impl Updatable for Counted {
    type Value = i32;
    type Error = Infallible;

    fn update(&mut self, key: i32) -> Result<(), Infallible> {
        self.hits.set(self.hits.get() + 1);
        self.key = key;
        Ok(())
    }
}

/// Element whose key can be changed behind the set's back.
struct Drift {
    key: Cell<i32>,
    tag: u8,
}

impl Updatable for Drift {
    type Value = i32;
    type Error = Infallible;

    fn update(&mut self, key: i32) -> Result<(), Infallible> {
        self.key.set(key);
        Ok(())
    }
}

#[test]
fn exp_scenario_test() {
    let mut set = UpdatableSet::new();
    set.insert(task(1, "A"));
    set.insert(task(2, "B"));
    set.insert(task(3, "C"));

    for (id, t) in set.iter() {
        if t.name == "A" {
            assert!(set.mark_for_update(id, 5));
        } else if t.name == "C" {
            set.mark_for_removal(id);
        }
    }
    let report = set.update_all_marked().unwrap();

    assert_eq!(
        report,
        BatchReport {
            removed: 1,
            updated: 1,
            skipped: 0
        }
    );
    assert_eq!(names(&set), ["B", "A"]);
    assert!(set.values().map(|t| t.key).eq([2, 5]));
    assert_eq!(set.pending_marks(), 0);
}

#[test]
fn exp_order_restored_test() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut set = UpdatableSet::new();
    for _ in 0..N {
        set.insert(rng.gen_range(0..1000i64));
    }
    let ids: Vec<_> = set.iter().map(|(id, _)| id).collect();
    let mut expect: std::collections::HashMap<ElementId, i64> =
        set.iter().map(|(id, v)| (id, *v)).collect();

    for _ in 0..3 {
        for &id in &ids {
            if rng.gen_bool(0.3) {
                let v = rng.gen_range(-500..1500i64);
                set.mark_for_update(id, v);
                expect.insert(id, v);
            }
        }
    }
    set.update_all_marked().unwrap();

    assert!(set.is_ordered());
    assert_eq!(set.len(), N);
    for (id, v) in set.iter() {
        assert_eq!(expect[&id], *v);
    }
}

#[test]
fn exp_removal_complete_test() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut set: UpdatableSet<u32> = (0..N as u32).map(|i| i % 97).collect();
    let mut marked = Vec::new();
    for (id, _) in set.iter() {
        if rng.gen_bool(0.4) {
            set.mark_for_removal(id);
            marked.push(id);
        }
    }
    let report = set.update_all_marked().unwrap();

    assert_eq!(report.removed, marked.len());
    assert_eq!(set.len(), N - marked.len());
    assert!(marked.iter().all(|id| !set.contains(*id)));
    assert!(set.is_ordered());
}

#[test]
fn exp_removal_beats_update_test() {
    for removal_first in [false, true] {
        let hits = Rc::new(Cell::new(0));
        let mut set = UpdatableSet::with_comparator(by_key(|p: &Counted| p.key));
        let id = set.insert(Counted {
            key: 1,
            hits: hits.clone(),
        });
        let other = set.insert(Counted {
            key: 2,
            hits: Rc::new(Cell::new(0)),
        });

        if removal_first {
            set.mark_for_removal(id);
            assert!(!set.mark_for_update(id, 9));
        } else {
            assert!(set.mark_for_update(id, 9));
            set.mark_for_removal(id);
        }
        assert!(set.is_marked_for_removal(id));
        assert!(!set.is_marked_for_update(id));

        let report = set.update_all_marked().unwrap();
        assert_eq!((report.removed, report.updated), (1, 0));
        assert!(!set.contains(id));
        assert!(set.contains(other));
        assert_eq!(hits.get(), 0);
    }
}

#[test]
fn exp_second_batch_is_noop_test() {
    let mut set: UpdatableSet<i32> = [3, 1, 2].into_iter().collect();
    let (first, _) = set.first().unwrap();
    set.mark_for_update(first, 10);
    assert_eq!(set.update_all_marked().unwrap().updated, 1);

    let before: Vec<_> = set.iter().map(|(id, v)| (id, *v)).collect();
    let report = set.update_all_marked().unwrap();
    assert!(report.is_empty());
    let after: Vec<_> = set.iter().map(|(id, v)| (id, *v)).collect();
    assert_eq!(before, after);
}

#[test]
fn exp_marking_during_iteration_test() {
    let mut set = UpdatableSet::new();
    for i in 0..100 {
        set.insert(task(i, "t"));
    }
    let before: Vec<_> = set.iter().map(|(id, t)| (id, t.key)).collect();

    let mut seen = Vec::new();
    for (id, t) in set.iter() {
        seen.push((id, t.key));
        if t.key % 2 == 0 {
            set.mark_for_update(id, -t.key);
        } else if t.key % 3 == 0 {
            set.mark_for_removal(id);
        }
        // Nothing changes until the batch runs.
        assert_eq!(set.len(), 100);
        assert_eq!(set.get(id).map(|t| t.key), Some(t.key));
    }
    assert_eq!(seen, before);

    let removed = (0..100).filter(|k| k % 2 != 0 && k % 3 == 0).count();
    let report = set.update_all_marked().unwrap();
    assert_eq!(report.removed, removed);
    assert_eq!(report.updated, 50);
    assert!(set.is_ordered());
    assert_eq!(set.first().map(|(_, t)| t.key), Some(-98));
}

#[test]
fn exp_drifted_element_test() {
    let mut set = UpdatableSet::with_comparator(by_key(|d: &Drift| d.key.get()));
    let ids: Vec<_> = (0..8u8)
        .map(|i| {
            set.insert(Drift {
                key: Cell::new(i as i32 * 10),
                tag: i,
            })
        })
        .collect();

    // Keys changed in place, so the set is now out of order.
    set.get(ids[1]).unwrap().key.set(75);
    set.get(ids[6]).unwrap().key.set(-5);
    assert!(!set.is_ordered());

    set.mark_for_update(ids[1], 35);
    set.mark_for_removal(ids[6]);
    let report = set.update_all_marked().unwrap();

    assert_eq!((report.removed, report.updated, report.skipped), (1, 1, 0));
    assert!(set.is_ordered());
    assert!(!set.contains(ids[6]));
    let tags: Vec<_> = set.values().map(|d| d.tag).collect();
    assert_eq!(tags, [0, 2, 3, 1, 4, 5, 7]);
}

#[test]
fn exp_absent_element_skipped_test() {
    let mut set = UpdatableSet::new();
    let a = set.insert(task(1, "a"));
    let b = set.insert(task(2, "b"));
    set.mark_for_update(a, 7);
    set.mark_for_removal(b);
    assert_eq!(set.remove(a).map(|t| t.key), Some(1));
    assert!(set.remove(b).is_some());

    let report = set.update_all_marked().unwrap();
    assert_eq!(
        report,
        BatchReport {
            removed: 0,
            updated: 0,
            skipped: 2
        }
    );
    assert!(set.is_empty());
    assert_eq!(set.pending_marks(), 0);
}

#[test]
fn exp_failure_halts_test() {
    let mut set = UpdatableSet::new();
    let a = set.insert(gauge(10, 'a'));
    let b = set.insert(gauge(20, 'b'));
    let c = set.insert(gauge(30, 'c'));
    let d = set.insert(gauge(40, 'd'));
    set.mark_for_update(a, 50);
    set.mark_for_update(b, 500);
    set.mark_for_update(c, 5);
    set.mark_for_removal(d);

    let err = set.update_all_marked().unwrap_err();
    assert_eq!(err.id(), b);
    assert_eq!(err.error(), &Overflow(500));
    assert_eq!(err.report().removed, 1);
    assert_eq!(err.report().updated, 1);
    assert_eq!(err.unprocessed(), 1);
    assert!(!err.requeued());

    // Removal and the first update stay applied, the failed element stays put.
    assert!(!set.contains(d));
    assert_eq!(set.get(a).map(|g| g.level), Some(50));
    assert_eq!(set.get(b).map(|g| g.level), Some(20));
    assert_eq!(set.get(c).map(|g| g.level), Some(30));
    assert!(set.is_ordered());
    assert_eq!(set.pending_marks(), 0);
    assert!(set.update_all_marked().unwrap().is_empty());
}

#[test]
fn exp_failure_requeues_test() {
    let mut set = UpdatableSet::new()
        .with_policy(BatchPolicy::new().with_on_failure(OnFailure::Requeue));
    let a = set.insert(gauge(10, 'a'));
    let b = set.insert(gauge(20, 'b'));
    let c = set.insert(gauge(30, 'c'));
    let d = set.insert(gauge(40, 'd'));
    set.mark_for_update(a, 101);
    set.mark_for_update(b, 1);
    set.mark_for_update(c, 2);
    set.mark_for_update(d, 3);

    let err = set.update_all_marked().unwrap_err();
    assert_eq!(err.id(), a);
    assert_eq!(err.unprocessed(), 3);
    assert!(err.requeued());
    assert_eq!(set.pending_marks(), 3);
    assert!(!set.is_marked_for_update(a));
    assert!(set.is_marked_for_update(c));

    let report = set.update_all_marked().unwrap();
    assert_eq!(report.updated, 3);
    let order: String = set.values().map(|g| g.name).collect();
    assert_eq!(order, "bcda");
}

#[test]
fn exp_error_display_test() {
    let mut set = UpdatableSet::new();
    let a = set.insert(gauge(1, 'a'));
    let b = set.insert(gauge(2, 'b'));
    set.mark_for_update(a, 200);
    set.mark_for_update(b, 3);
    let err = set.update_all_marked().unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("update of element {a} failed: level 200 is above the limit (1 unprocessed marks discarded)")
    );
    let source = err.source().unwrap();
    assert_eq!(source.to_string(), "level 200 is above the limit");
    assert_eq!(err.into_error(), Overflow(200));
}

#[test]
fn exp_last_update_wins_test() {
    let mut set = UpdatableSet::new();
    let id = set.insert(task(0, "x"));
    set.insert(task(5, "y"));
    set.mark_for_update(id, 9);
    set.mark_for_update(id, 3);
    set.mark_for_update(id, 7);
    assert_eq!(set.pending_marks(), 1);
    assert_eq!(set.update_all_marked().unwrap().updated, 1);
    assert_eq!(names(&set), ["y", "x"]);
    assert_eq!(set.get(id).map(|t| t.key), Some(7));
}

#[test]
fn exp_unmark_and_clear_test() {
    let mut set = UpdatableSet::new();
    let a = set.insert(task(1, "a"));
    let b = set.insert(task(2, "b"));
    set.mark_for_removal(a);
    set.mark_for_update(b, 0);
    assert!(set.unmark(a));
    assert!(!set.unmark(a));
    assert_eq!(set.pending_marks(), 1);

    set.clear();
    assert!(set.is_empty());
    assert_eq!(set.pending_marks(), 0);
    assert!(set.update_all_marked().unwrap().is_empty());
}

#[test]
fn exp_equal_keys_reinsert_after_peers_test() {
    let mut set = UpdatableSet::with_comparator(by_key(|t: &Task| t.key));
    let a = set.insert(task(1, "a"));
    set.insert(task(2, "b"));
    set.insert(task(2, "c"));
    set.mark_for_update(a, 2);
    set.update_all_marked().unwrap();
    assert_eq!(names(&set), ["b", "c", "a"]);
}

#[test]
fn exp_clone_keeps_marks_test() {
    let mut set = UpdatableSet::new();
    let id = set.insert(task(4, "p"));
    set.mark_for_update(id, 1);
    let mut copy = set.clone();
    assert_eq!(copy.pending_marks(), 1);
    copy.update_all_marked().unwrap();
    assert_eq!(copy.get(id).map(|t| t.key), Some(1));
    assert_eq!(set.get(id).map(|t| t.key), Some(4));
    assert_eq!(set.pending_marks(), 1);
}

#[test]
#[cfg(feature = "serde")]
fn exp_serde_test() {
    let mut set: UpdatableSet<u32> = (0..N as u32).collect();
    let (id, _) = set.first().unwrap();
    set.mark_for_removal(id);
    let ser = bincode::serialize(&set).unwrap();
    let back: UpdatableSet<u32> = bincode::deserialize(&ser).unwrap();
    assert_eq!(back.len(), N);
    assert_eq!(back.pending_marks(), 0);
    assert!(back.values().eq(set.values()));
}

#[test]
fn exp_large_batch_test() {
    let n: u64 = if cfg!(miri) { 200 } else { 100_000 };
    let mut set: UpdatableSet<u64> = (0..n).collect();
    for (id, v) in set.iter() {
        if v % 2 == 0 {
            set.mark_for_removal(id);
        } else {
            set.mark_for_update(id, v + n);
        }
    }
    let report = set.update_all_marked().unwrap();
    assert_eq!(report.removed as u64, n / 2);
    assert_eq!(report.updated as u64, n / 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(set.len() as u64, n / 2);
    assert!(set.is_ordered());
    assert!(set.values().copied().eq((0..n).filter(|v| v % 2 == 1).map(|v| v + n)));
}

/// Element whose update panics when given 13.
#[derive(Debug)]
struct Fragile {
    key: i32,
}

impl Updatable for Fragile {
    type Value = i32;
    type Error = Infallible;

    fn update(&mut self, key: i32) -> Result<(), Infallible> {
        assert!(key != 13, "unlucky key");
        self.key = key;
        Ok(())
    }
}

#[test]
fn exp_panicking_update_keeps_elements_test() {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    let mut set = UpdatableSet::with_comparator(by_key(|f: &Fragile| f.key));
    let ids: Vec<ElementId> = (1..=5).map(|key| set.insert(Fragile { key })).collect();
    set.mark_for_update(ids[0], 10);
    set.mark_for_update(ids[1], 13);
    set.mark_for_removal(ids[2]);

    let outcome = catch_unwind(AssertUnwindSafe(|| set.update_all_marked()));
    assert!(outcome.is_err());

    assert_eq!(set.len(), 4);
    assert!(set.is_ordered());
    assert!(!set.contains(ids[2]));
    assert_eq!(set.get(ids[0]).map(|f| f.key), Some(10));
    assert_eq!(set.get(ids[1]).map(|f| f.key), Some(2));
    assert_eq!(set.pending_marks(), 0);
    let keys: Vec<i32> = set.values().map(|f| f.key).collect();
    assert_eq!(keys, [2, 4, 5, 10]);
}

#[test]
fn exp_partial_nan_test() {
    use crate::compare::Partial;

    let mut set = UpdatableSet::with_comparator(Partial);
    let one = set.insert(1.0f64);
    let two = set.insert(2.0);
    set.insert(3.0);

    set.mark_for_update(one, f64::NAN);
    set.update_all_marked().unwrap();
    assert_eq!(set.len(), 3);
    let values: Vec<f64> = set.values().copied().collect();
    assert_eq!(&values[..2], &[2.0, 3.0]);
    assert!(values[2].is_nan());
    assert!(set.get(one).is_some_and(|v| v.is_nan()));

    // The NaN is still reachable by id and can be brought back into order.
    set.mark_for_update(one, 0.5);
    set.mark_for_update(two, 2.5);
    set.update_all_marked().unwrap();
    assert!(set.values().eq([0.5, 2.5, 3.0].iter()));
    assert!(set.is_ordered());
}
