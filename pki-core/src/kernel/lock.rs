//! The per-object re-entrant lock (§4.3, §5).
//!
//! Attribute access acquires the object's lock. The lock is re-entrant
//! on the owning thread: a `trylock` that fails is followed by an
//! owner comparison, and either a recursive depth increment (same
//! thread) or a real block (different thread). A release decrements
//! the depth and only unlocks at zero.

use std::sync::{Condvar, Mutex};
use std::thread::ThreadId;

struct State {
    owner: Option<ThreadId>,
    depth: u32,
}

/// A re-entrant mutex scoped to one kernel object.
pub struct ObjectLock {
    state: Mutex<State>,
    cv: Condvar,
}

impl Default for ObjectLock {
    fn default() -> Self {
        ObjectLock {
            state: Mutex::new(State {
                owner: None,
                depth: 0,
            }),
            cv: Condvar::new(),
        }
    }
}

/// An RAII guard; dropping it releases one level of the lock.
pub struct LockGuard<'a> {
    lock: &'a ObjectLock,
}

impl ObjectLock {
    /// Acquires the lock, blocking if another thread holds it.
    /// Re-entrant: the owning thread may call this repeatedly without
    /// deadlocking itself.
    pub fn lock(&self) -> LockGuard<'_> {
        let me = std::thread::current().id();
        let mut state = self.state.lock().unwrap();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    break;
                }
                Some(_) => {
                    state = self.cv.wait(state).unwrap();
                }
            }
        }
        LockGuard { lock: self }
    }

    /// Non-blocking variant: returns `None` if another thread holds
    /// the lock.
    pub fn try_lock(&self) -> Option<LockGuard<'_>> {
        let me = std::thread::current().id();
        let mut state = self.state.lock().unwrap();
        match state.owner {
            None => {
                state.owner = Some(me);
                state.depth = 1;
                Some(LockGuard { lock: self })
            }
            Some(owner) if owner == me => {
                state.depth += 1;
                Some(LockGuard { lock: self })
            }
            Some(_) => None,
        }
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap();
        if state.depth > 0 {
            state.depth -= 1;
        }
        if state.depth == 0 {
            state.owner = None;
            self.cv.notify_one();
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
