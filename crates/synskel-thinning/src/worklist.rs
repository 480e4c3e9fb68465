// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Insertion-ordered surface worklist.
//!
//! Slots live in one vector and are linked by slot index; removed slots go on a free
//! list and are reused by later insertions. Handles stay valid until their own removal.

/// Stable reference to an entry of a [`Worklist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorklistHandle(u32);

impl WorklistHandle {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Slot {
    voxel: usize,
    prev: Option<WorklistHandle>,
    next: Option<WorklistHandle>,
    live: bool,
}

/// FIFO set of voxels with O(1) append and O(1) removal by handle.
#[derive(Debug, Clone, Default)]
pub struct Worklist {
    slots: Vec<Slot>,
    free_list: Vec<WorklistHandle>,
    head: Option<WorklistHandle>,
    tail: Option<WorklistHandle>,
    len: usize,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated; stays flat while removals are recycled.
    pub fn slot_capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn push_back(&mut self, voxel: usize) -> WorklistHandle {
        let slot = Slot {
            voxel,
            prev: self.tail,
            next: None,
            live: true,
        };
        let handle = match self.free_list.pop() {
            Some(recycled) => {
                self.slots[recycled.index()] = slot;
                recycled
            }
            None => {
                self.slots.push(slot);
                WorklistHandle((self.slots.len() - 1) as u32)
            }
        };

        match self.tail {
            Some(tail) => self.slots[tail.index()].next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.len += 1;
        handle
    }

    /// Unlinks an entry; returns its voxel, or `None` if the handle was already removed.
    pub fn remove(&mut self, handle: WorklistHandle) -> Option<usize> {
        let slot = self.slots.get_mut(handle.index())?;
        if !slot.live {
            return None;
        }
        slot.live = false;
        let (voxel, prev, next) = (slot.voxel, slot.prev, slot.next);

        match prev {
            Some(prev) => self.slots[prev.index()].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next.index()].prev = prev,
            None => self.tail = prev,
        }

        self.free_list.push(handle);
        self.len -= 1;
        Some(voxel)
    }

    pub fn voxel(&self, handle: WorklistHandle) -> Option<usize> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.live)
            .map(|slot| slot.voxel)
    }

    /// Entries front to back.
    pub fn iter(&self) -> WorklistIter<'_> {
        WorklistIter {
            worklist: self,
            cursor: self.head,
        }
    }
}

pub struct WorklistIter<'a> {
    worklist: &'a Worklist,
    cursor: Option<WorklistHandle>,
}

impl Iterator for WorklistIter<'_> {
    type Item = (WorklistHandle, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let slot = &self.worklist.slots[handle.index()];
        self.cursor = slot.next;
        Some((handle, slot.voxel))
    }
}
