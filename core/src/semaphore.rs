//! Binary semaphores over an array of shared lock words.
//!
//! Each slot is one `AtomicU32`: `0` means free, otherwise it holds
//! `owner + 1`. Acquisition is a compare-and-swap; contended callers spin
//! briefly and then park on the word's address. The park queue re-checks the
//! word under its own lock before sleeping, and `release` stores the word
//! before unparking, so a release can never slip between a waiter's check and
//! its sleep.
//!
//! A slot may be released by a different thread than the one that acquired
//! it: the coordinator acquires a slot on behalf of a worker, the worker
//! releases it. `reclaim` frees every slot recorded under an owner whose
//! thread is gone.
use parking_lot_core::{SpinWait, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

const FREE: u32 = 0;

/// Fixed array of lock words shared by the coordinator and its workers.
#[derive(Debug)]
pub struct SemaphoreManager {
    words: Box<[AtomicU32]>,
}

impl SemaphoreManager {
    pub fn new(slots: usize) -> Self {
        let words = (0..slots).map(|_| AtomicU32::new(FREE)).collect();
        Self { words }
    }

    pub fn slots(&self) -> usize {
        self.words.len()
    }

    /// Block until `slot` is acquired for `owner`.
    ///
    /// # Panics
    /// If `slot` is out of range or `owner` is `u32::MAX`.
    pub fn acquire(&self, slot: usize, owner: u32) {
        self.acquire_until(slot, owner, None);
    }

    /// Like `acquire`, giving up after `timeout`. Returns whether the slot was
    /// acquired.
    pub fn acquire_timeout(&self, slot: usize, owner: u32, timeout: Duration) -> bool {
        self.acquire_until(slot, owner, Some(Instant::now() + timeout))
    }

    /// Acquire `slot` only if it is free right now.
    pub fn try_acquire(&self, slot: usize, owner: u32) -> bool {
        self.words[slot]
            .compare_exchange(FREE, token(owner), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquire `slot` and release it again when the guard drops.
    pub fn acquire_guard(&self, slot: usize, owner: u32) -> SlotGuard<'_> {
        self.acquire(slot, owner);
        SlotGuard {
            manager: self,
            slot,
            owner,
        }
    }

    /// Guarded `try_acquire`.
    pub fn try_acquire_guard(&self, slot: usize, owner: u32) -> Option<SlotGuard<'_>> {
        self.try_acquire(slot, owner).then(|| SlotGuard {
            manager: self,
            slot,
            owner,
        })
    }

    /// Free `slot` and wake one waiter. Returns false if it was already free.
    pub fn release(&self, slot: usize) -> bool {
        let word = &self.words[slot];
        let previous = word.swap(FREE, Ordering::Release);
        if previous == FREE {
            tracing::warn!(slot, "release of a free semaphore slot");
            return false;
        }
        self.wake_one(word);
        true
    }

    /// Free `slot` only if `owner` holds it.
    pub fn release_owned(&self, slot: usize, owner: u32) -> bool {
        let word = &self.words[slot];
        if word
            .compare_exchange(token(owner), FREE, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        self.wake_one(word);
        true
    }

    /// Current holder of `slot`, if any.
    pub fn holder(&self, slot: usize) -> Option<u32> {
        match self.words[slot].load(Ordering::Acquire) {
            FREE => None,
            t => Some(t - 1),
        }
    }

    /// Number of slots currently held.
    pub fn held(&self) -> usize {
        self.words
            .iter()
            .filter(|w| w.load(Ordering::Relaxed) != FREE)
            .count()
    }

    /// Release every slot held by `owner`. Returns the reclaimed slots.
    pub fn reclaim(&self, owner: u32) -> Vec<usize> {
        let reclaimed: Vec<usize> = (0..self.words.len())
            .filter(|&slot| self.release_owned(slot, owner))
            .collect();
        if !reclaimed.is_empty() {
            tracing::warn!(owner, slots = ?reclaimed, "reclaimed semaphore slots");
        }
        reclaimed
    }

    fn acquire_until(&self, slot: usize, owner: u32, deadline: Option<Instant>) -> bool {
        let word = &self.words[slot];
        let token = token(owner);
        let mut spin = SpinWait::new();
        loop {
            if word
                .compare_exchange_weak(FREE, token, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
            if spin.spin() {
                continue;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return false;
                }
            }
            // SAFETY: the key is the address of a word owned by `self`, which
            // outlives the call. The callbacks neither park nor panic.
            let result = unsafe {
                parking_lot_core::park(
                    key(word),
                    || word.load(Ordering::Relaxed) != FREE,
                    || {},
                    |_, _| {},
                    DEFAULT_PARK_TOKEN,
                    deadline,
                )
            };
            if let parking_lot_core::ParkResult::TimedOut = result {
                return word
                    .compare_exchange(FREE, token, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok();
            }
            spin.reset();
        }
    }

    fn wake_one(&self, word: &AtomicU32) {
        // SAFETY: same key as in `acquire_until`; the callback does not park.
        unsafe {
            parking_lot_core::unpark_one(key(word), |_| DEFAULT_UNPARK_TOKEN);
        }
    }
}

fn token(owner: u32) -> u32 {
    assert!(owner != u32::MAX, "owner id u32::MAX is reserved");
    owner + 1
}

fn key(word: &AtomicU32) -> usize {
    word as *const AtomicU32 as usize
}

/// Releases its slot on drop unless handed off with `into_lease`.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    manager: &'a SemaphoreManager,
    slot: usize,
    owner: u32,
}

impl SlotGuard<'_> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Keep the slot held past the guard. Whoever receives the slot index is
    /// responsible for releasing it.
    pub fn into_lease(self) -> usize {
        let slot = self.slot;
        std::mem::forget(self);
        slot
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.manager.release_owned(self.slot, self.owner);
    }
}
