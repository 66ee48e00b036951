//! Associative priority queue with stable ordering.

#![allow(unused)]

/// An associative container optimized for extraction of the value with the
/// lowest key.
///
/// This is a conventional array-based binary heap with one extra guarantee:
/// same-key elements are always pulled in FIFO order. Each inserted element is
/// stamped with a monotonically increasing epoch, and the heap is ordered by
/// the (key, epoch) pair. The epoch makes every effective key unique, which in
/// turn makes the pull order fully deterministic regardless of the insertion
/// and extraction pattern.
///
/// The stable ordering is load-bearing for simulation reproducibility:
/// continuations scheduled for the same tick must fire in scheduling order, so
/// an unordered heap over the bare key would not do.
pub(crate) struct PriorityQueue<K, V>
where
    K: Copy + Ord,
{
    heap: Vec<Item<K, V>>,
    next_epoch: u64,
}

impl<K: Copy + Ord, V> PriorityQueue<K, V> {
    /// Creates an empty `PriorityQueue`.
    pub(crate) fn new() -> Self {
        Self {
            heap: Vec::new(),
            next_epoch: 0,
        }
    }

    /// Returns the number of key-value pairs in the priority queue.
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if the priority queue contains no element.
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts a new key-value pair.
    ///
    /// This operation has *O*(log(*N*)) amortized worse-case theoretical
    /// complexity.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        // Build a unique key from the user-provided key and a unique epoch.
        let epoch = self.next_epoch;
        assert_ne!(epoch, u64::MAX);
        self.next_epoch += 1;

        let item = Item {
            key: UniqueKey { key, epoch },
            value,
        };
        self.heap.push(item);
        self.sift_up(self.heap.len() - 1);
    }

    /// Pulls the value with the lowest key.
    ///
    /// If there are several equal lowest keys, the value which was inserted
    /// first is returned.
    ///
    /// This operation has *O*(log(*N*)) non-amortized theoretical complexity.
    pub(crate) fn pull(&mut self) -> Option<(K, V)> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let item = self.heap.pop().unwrap();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        Some((item.key.key, item.value))
    }

    /// Peeks a reference to the lowest key, leaving it in the queue.
    ///
    /// If there are several equal lowest keys, a reference to the key which
    /// was inserted first is returned.
    ///
    /// This operation has *O*(1) non-amortized theoretical complexity.
    pub(crate) fn peek_key(&self) -> Option<&K> {
        self.heap.first().map(|item| &item.key.key)
    }

    /// Moves the item at `heap_idx` up the heap while a parent has a larger
    /// key.
    fn sift_up(&mut self, heap_idx: usize) {
        let mut child_idx = heap_idx;

        while child_idx != 0 {
            let parent_idx = (child_idx - 1) / 2;

            // Stop when the key is larger or equal to the parent's.
            if self.heap[child_idx].key >= self.heap[parent_idx].key {
                break;
            }
            self.heap.swap(child_idx, parent_idx);
            child_idx = parent_idx;
        }
    }

    /// Moves the item at `heap_idx` down the heap while a child has a smaller
    /// key.
    fn sift_down(&mut self, heap_idx: usize) {
        let mut parent_idx = heap_idx;

        loop {
            let mut child_idx = 2 * parent_idx + 1;
            if child_idx >= self.heap.len() {
                break;
            }

            // If the sibling exists and has a smaller key, make it the
            // candidate for swapping.
            if let Some(other_child) = self.heap.get(child_idx + 1) {
                child_idx += (self.heap[child_idx].key > other_child.key) as usize;
            }

            // Stop when the key is smaller or equal to the child with the
            // smallest key.
            if self.heap[parent_idx].key <= self.heap[child_idx].key {
                break;
            }
            self.heap.swap(parent_idx, child_idx);
            parent_idx = child_idx;
        }
    }
}

impl<K: Copy + Ord, V> Default for PriorityQueue<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single key-value pair stored in the heap.
struct Item<K: Copy, V> {
    // A unique key by which the heap is sorted.
    key: UniqueKey<K>,
    // The value associated to the key.
    value: V,
}

/// A unique key made of the user-provided key complemented by a unique epoch.
///
/// Implementation note: `UniqueKey` automatically derives `PartialOrd`, which
/// implies that lexicographic order between `key` and `epoch` must be
/// preserved to make sure that `key` has a higher sorting priority than
/// `epoch`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct UniqueKey<K: Copy> {
    /// The user-provided key.
    key: K,
    /// A unique epoch that indicates the insertion date.
    epoch: u64,
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use super::*;

    enum Op<K, V> {
        Insert(K, V),
        Pull(Option<(K, V)>),
    }

    fn check<K: Copy + Ord + Debug, V: Eq + Debug>(operations: impl Iterator<Item = Op<K, V>>) {
        let mut queue = PriorityQueue::new();

        for op in operations {
            match op {
                Op::Insert(key, value) => {
                    queue.insert(key, value);
                }
                Op::Pull(kv) => {
                    assert_eq!(queue.pull(), kv);
                }
            }
        }
    }

    #[test]
    fn priority_queue_smoke() {
        let operations = [
            Op::Insert(5, 'a'),
            Op::Insert(2, 'b'),
            Op::Insert(3, 'c'),
            Op::Insert(4, 'd'),
            Op::Insert(9, 'e'),
            Op::Insert(1, 'f'),
            Op::Insert(8, 'g'),
            Op::Insert(0, 'h'),
            Op::Insert(7, 'i'),
            Op::Insert(6, 'j'),
            Op::Pull(Some((0, 'h'))),
            Op::Pull(Some((1, 'f'))),
            Op::Pull(Some((2, 'b'))),
            Op::Pull(Some((3, 'c'))),
            Op::Pull(Some((4, 'd'))),
            Op::Pull(Some((5, 'a'))),
            Op::Pull(Some((6, 'j'))),
            Op::Pull(Some((7, 'i'))),
            Op::Pull(Some((8, 'g'))),
            Op::Pull(Some((9, 'e'))),
        ];

        check(operations.into_iter());
    }

    #[test]
    fn priority_queue_interleaved() {
        let operations = [
            Op::Insert(2, 'a'),
            Op::Insert(7, 'b'),
            Op::Insert(5, 'c'),
            Op::Pull(Some((2, 'a'))),
            Op::Insert(4, 'd'),
            Op::Pull(Some((4, 'd'))),
            Op::Insert(8, 'e'),
            Op::Insert(2, 'f'),
            Op::Pull(Some((2, 'f'))),
            Op::Pull(Some((5, 'c'))),
            Op::Pull(Some((7, 'b'))),
            Op::Insert(5, 'g'),
            Op::Insert(3, 'h'),
            Op::Pull(Some((3, 'h'))),
            Op::Pull(Some((5, 'g'))),
            Op::Pull(Some((8, 'e'))),
            Op::Pull(None),
        ];

        check(operations.into_iter());
    }

    #[test]
    fn priority_queue_equal_keys() {
        let operations = [
            Op::Insert(4, 'a'),
            Op::Insert(1, 'b'),
            Op::Insert(3, 'c'),
            Op::Pull(Some((1, 'b'))),
            Op::Insert(4, 'd'),
            Op::Insert(8, 'e'),
            Op::Insert(3, 'f'),
            Op::Pull(Some((3, 'c'))),
            Op::Pull(Some((3, 'f'))),
            Op::Pull(Some((4, 'a'))),
            Op::Insert(8, 'g'),
            Op::Pull(Some((4, 'd'))),
            Op::Pull(Some((8, 'e'))),
            Op::Pull(Some((8, 'g'))),
            Op::Pull(None),
        ];

        check(operations.into_iter());
    }

    #[test]
    fn priority_queue_fuzz() {
        use std::collections::BTreeMap;

        use crate::util::rng::Rng;

        // Number of fuzzing operations.
        const ITER: usize = 100_000;

        // Inclusive upper bound for randomly generated keys.
        const MAX_KEY: u64 = 99;

        // Each operation is performed on both the tested implementation and on
        // a shadow queue implemented with a `BTreeMap` keyed by (key, epoch).
        // Any mismatch between the outcomes of pull operations triggers a
        // panic.
        let mut queue = PriorityQueue::new();
        let mut shadow_queue = BTreeMap::new();
        let mut epoch: usize = 0;

        let rng = Rng::new(12345);

        for _ in 0..ITER {
            // Insert with probability 1/2, pull with probability 1/2.
            if rng.gen_bounded(2) == 0 {
                let key = rng.gen_bounded(MAX_KEY + 1);
                let value = rng.gen();
                queue.insert(key, value);
                shadow_queue.insert((key, epoch), value);
                epoch += 1;
            } else {
                let value = queue.pull();
                let shadow_value = match shadow_queue.iter().next() {
                    Some((&unique_key, &value)) => {
                        shadow_queue.remove(&unique_key);
                        Some((unique_key.0, value))
                    }
                    None => None,
                };
                assert_eq!(value, shadow_value);
            }
        }
    }
}
