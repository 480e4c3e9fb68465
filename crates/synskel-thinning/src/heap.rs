// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Indexed binary min-heap over `f32` keys with decrease-key.
//!
//! Items are dense ids `0..capacity`; a position map tracks where each id sits in the
//! heap so its key can be lowered in O(log n).

use std::cmp::Ordering;

const ABSENT: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct IndexedMinHeap {
    heap: Vec<usize>,
    keys: Vec<f32>,
    positions: Vec<usize>,
}

impl IndexedMinHeap {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            keys: vec![f32::INFINITY; capacity],
            positions: vec![ABSENT; capacity],
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.positions.get(id).is_some_and(|&position| position != ABSENT)
    }

    pub fn key(&self, id: usize) -> Option<f32> {
        self.contains(id).then(|| self.keys[id])
    }

    /// Inserts `id`, or lowers its key if it is already queued with a larger one.
    pub fn push_or_decrease(&mut self, id: usize, key: f32) {
        if self.contains(id) {
            self.decrease_key(id, key);
            return;
        }
        if id >= self.positions.len() {
            self.positions.resize(id + 1, ABSENT);
            self.keys.resize(id + 1, f32::INFINITY);
        }
        self.keys[id] = key;
        self.positions[id] = self.heap.len();
        self.heap.push(id);
        self.sift_up(self.heap.len() - 1);
    }

    /// Lowers the key of a queued id; larger keys are ignored.
    pub fn decrease_key(&mut self, id: usize, key: f32) {
        if !self.contains(id) || key.total_cmp(&self.keys[id]) != Ordering::Less {
            return;
        }
        self.keys[id] = key;
        self.sift_up(self.positions[id]);
    }

    pub fn pop(&mut self) -> Option<(usize, f32)> {
        let last = self.heap.len().checked_sub(1)?;
        self.heap.swap(0, last);
        let id = self.heap.pop()?;
        self.positions[id] = ABSENT;
        if !self.heap.is_empty() {
            self.positions[self.heap[0]] = 0;
            self.sift_down(0);
        }
        Some((id, self.keys[id]))
    }

    #[inline]
    fn less(&self, a: usize, b: usize) -> bool {
        // ties resolve by id so pops are deterministic
        match self.keys[self.heap[a]].total_cmp(&self.keys[self.heap[b]]) {
            Ordering::Equal => self.heap[a] < self.heap[b],
            ordering => ordering == Ordering::Less,
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions[self.heap[a]] = a;
        self.positions[self.heap[b]] = b;
    }

    fn sift_up(&mut self, mut position: usize) {
        while position > 0 {
            let parent = (position - 1) / 2;
            if !self.less(position, parent) {
                break;
            }
            self.swap(position, parent);
            position = parent;
        }
    }

    fn sift_down(&mut self, mut position: usize) {
        loop {
            let left = 2 * position + 1;
            let right = left + 1;
            let mut smallest = position;
            if left < self.heap.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.heap.len() && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == position {
                break;
            }
            self.swap(position, smallest);
            position = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_key_order() {
        let mut heap = IndexedMinHeap::with_capacity(6);
        for (id, key) in [(0, 5.0), (1, 1.5), (2, 9.0), (3, 0.0), (4, 1.5), (5, 3.25)] {
            heap.push_or_decrease(id, key);
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop()).map(|(id, _)| id).collect();
        assert_eq!(order, vec![3, 1, 4, 5, 0, 2]);
    }

    #[test]
    fn test_decrease_key_reorders() {
        let mut heap = IndexedMinHeap::with_capacity(3);
        heap.push_or_decrease(0, 4.0);
        heap.push_or_decrease(1, 6.0);
        heap.push_or_decrease(2, 8.0);

        heap.decrease_key(2, 1.0);
        heap.decrease_key(0, 7.0);
        assert_eq!(heap.key(0), Some(4.0));
        assert_eq!(heap.pop(), Some((2, 1.0)));

        heap.push_or_decrease(1, 2.0);
        assert_eq!(heap.pop(), Some((1, 2.0)));
        assert_eq!(heap.pop(), Some((0, 4.0)));
        assert!(heap.pop().is_none());
        assert!(!heap.contains(0));
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut heap = IndexedMinHeap::with_capacity(0);
        heap.push_or_decrease(10, 2.0);
        heap.push_or_decrease(3, 1.0);
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.pop(), Some((3, 1.0)));
    }
}
