//! Shared payload slots guarded by the semaphore manager.
//!
//! The coordinator encodes a task payload into a free slot, leasing it to
//! the worker that will run the task. The worker takes the bytes out and
//! releases the lease. A slot is tagged with its task id so a stale task
//! message can never read a payload written for a later task.
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use jpaddr_core::SemaphoreManager;

#[derive(Debug, Default)]
struct SlotData {
    task_id: Option<u64>,
    bytes: Vec<u8>,
}

/// Fixed set of byte buffers, one lock word each.
#[derive(Debug)]
pub struct SharedRing {
    sem: SemaphoreManager,
    slots: Box<[Mutex<SlotData>]>,
    capacity: usize,
    cursor: AtomicUsize,
}

impl SharedRing {
    pub fn new(slots: usize, capacity: usize) -> Self {
        Self {
            sem: SemaphoreManager::new(slots),
            slots: (0..slots).map(|_| Mutex::new(SlotData::default())).collect(),
            capacity,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    /// Largest payload a slot accepts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of leased slots.
    pub fn held(&self) -> usize {
        self.sem.held()
    }

    /// Copy `bytes` into a free slot leased to `owner`.
    ///
    /// Slots are tried starting at a rotating cursor and the call never
    /// blocks. Returns `None` when the payload does not fit or every slot is
    /// leased, in which case the caller sends it inline.
    pub fn put(&self, owner: u32, task_id: u64, bytes: &[u8]) -> Option<usize> {
        let n = self.slots.len();
        if n == 0 || bytes.len() > self.capacity {
            return None;
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n;
        let guard = (0..n).find_map(|i| self.sem.try_acquire_guard((start + i) % n, owner))?;

        let mut data = self.slots[guard.slot()].lock();
        data.task_id = Some(task_id);
        data.bytes.clear();
        data.bytes.extend_from_slice(bytes);
        drop(data);
        Some(guard.into_lease())
    }

    /// Take the payload of `task_id` out of `slot` and end `owner`'s lease.
    ///
    /// Returns `None` if the lease was reclaimed or the slot now holds
    /// another task.
    pub fn take(&self, slot: usize, owner: u32, task_id: u64) -> Option<Vec<u8>> {
        let mut data = self.slots.get(slot)?.lock();
        if self.sem.holder(slot) != Some(owner) || data.task_id != Some(task_id) {
            return None;
        }
        data.task_id = None;
        let bytes = std::mem::take(&mut data.bytes);
        self.sem.release_owned(slot, owner);
        Some(bytes)
    }

    /// End `owner`'s lease on `slot` without reading it.
    pub fn release(&self, slot: usize, owner: u32, task_id: u64) -> bool {
        let Some(cell) = self.slots.get(slot) else {
            return false;
        };
        let mut data = cell.lock();
        if data.task_id != Some(task_id) {
            return false;
        }
        if self.sem.release_owned(slot, owner) {
            data.task_id = None;
            data.bytes.clear();
            return true;
        }
        false
    }

    /// Free every slot leased to `owner`.
    pub fn reclaim(&self, owner: u32) -> Vec<usize> {
        let mut reclaimed = Vec::new();
        for (slot, cell) in self.slots.iter().enumerate() {
            // Clear under the data lock so a new lease cannot be wiped.
            let mut data = cell.lock();
            if self.sem.release_owned(slot, owner) {
                data.task_id = None;
                data.bytes.clear();
                reclaimed.push(slot);
            }
        }
        if !reclaimed.is_empty() {
            tracing::warn!(owner, slots = ?reclaimed, "reclaimed payload slots");
        }
        reclaimed
    }
}
