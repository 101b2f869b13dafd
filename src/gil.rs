//! Global execution lock - the single serialization point for managed state
//!
//! Every dispatched entry acquires this lock before touching the host heap
//! and releases it on exit. The lock is reentrant: native code called from a
//! builtin may legally dispatch back into the boundary on the same thread.
//! The few lock-bookkeeping entries are exempt by construction (a flag on
//! the table entry) and use the raw acquire/release pair instead.

use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};

struct GilState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Reentrant global execution lock.
pub struct Gil {
    state: Mutex<GilState>,
    available: Condvar,
}

impl Gil {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GilState {
                owner: None,
                depth: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Acquire for the duration of the returned guard (dispatch hot path).
    #[inline]
    pub fn lock(&self) -> GilGuard<'_> {
        self.acquire();
        GilGuard { gil: self }
    }

    /// Raw acquire used by the lock-bookkeeping entries. Blocks until the
    /// lock is free or already owned by this thread.
    pub fn acquire(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();

        loop {
            match state.owner {
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return;
                }
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return;
                }
                Some(_) => self.available.wait(&mut state),
            }
        }
    }

    /// Raw release paired with `acquire`. Releasing a lock this thread does
    /// not hold indicates broken native glue and is fatal.
    pub fn release(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.owner != Some(me) || state.depth == 0 {
            drop(state);
            crate::exc::fatal("execution lock released by non-owner thread");
        }

        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.available.notify_one();
        }
    }

    /// True if the current thread holds the lock.
    pub fn is_held_by_current(&self) -> bool {
        let state = self.state.lock();
        state.owner == Some(thread::current().id())
    }
}

impl Default for Gil {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard releasing the lock on drop.
pub struct GilGuard<'a> {
    gil: &'a Gil,
}

impl Drop for GilGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.gil.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reentrant_same_thread() {
        let gil = Gil::new();
        let _a = gil.lock();
        let _b = gil.lock();
        assert!(gil.is_held_by_current());
    }

    #[test]
    fn test_release_on_drop() {
        let gil = Gil::new();
        {
            let _g = gil.lock();
            assert!(gil.is_held_by_current());
        }
        assert!(!gil.is_held_by_current());
    }

    #[test]
    fn test_raw_acquire_release() {
        let gil = Gil::new();
        gil.acquire();
        gil.acquire();
        assert!(gil.is_held_by_current());
        gil.release();
        assert!(gil.is_held_by_current());
        gil.release();
        assert!(!gil.is_held_by_current());
    }

    #[test]
    fn test_cross_thread_exclusion() {
        let gil = Arc::new(Gil::new());
        let _g = gil.lock();

        let gil2 = Arc::clone(&gil);
        let handle = std::thread::spawn(move || gil2.is_held_by_current());
        assert!(!handle.join().unwrap());
    }

    #[test]
    fn test_serializes_mutation() {
        let gil = Arc::new(Gil::new());
        let counter = Arc::new(parking_lot::Mutex::new(0u32));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gil = Arc::clone(&gil);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let _g = gil.lock();
                        *counter.lock() += 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*counter.lock(), 800);
    }
}
