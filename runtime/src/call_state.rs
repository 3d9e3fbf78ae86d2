// call_state.rs — Per-hook request stack
//
// Every generated dispatch override calls `fetch_request` exactly once on
// entry and branches on the result. Hook bodies push a request (original or
// ancestor implementation) right before invoking the routine that triggers
// that dispatch.
//
// Preconditions: none.
// Postconditions: an atomic request holds the re-entrant lock from
//   `make_request` until the matching `fetch_request` on the same thread.
// Failure modes: dropping a state with pending requests panics.
// Side effects: blocks other threads while an atomic request is pending.

use std::fmt;

use parking_lot::{Mutex, ReentrantMutex};

/// How a request synchronizes with other threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transition {
    /// No locking. Only safe when the hooked routine is never called
    /// concurrently.
    Nonatomic,
    /// Hold the re-entrant lock from the push until the dispatch that pops it.
    #[default]
    Atomic,
}

/// LIFO stack of pending dispatch requests plus the hand-off lock.
///
/// The lock covers only the hand-off: once a dispatch has popped its request,
/// other threads are free to push and pop their own while the selected
/// implementation runs.
pub struct CallState<R> {
    lock: ReentrantMutex<()>,
    stack: Mutex<Vec<(Transition, R)>>,
}

impl<R> CallState<R> {
    pub fn new() -> Self {
        Self {
            lock: ReentrantMutex::new(()),
            stack: Mutex::new(Vec::new()),
        }
    }

    /// Push `request`. An atomic request keeps the lock held until it is
    /// fetched.
    pub fn make_request(&self, request: R, transition: Transition) {
        let guard = self.lock.lock();
        self.stack.lock().push((transition, request));
        if transition == Transition::Atomic {
            // Released by the matching `fetch_request`.
            std::mem::forget(guard);
        }
    }

    /// Pop the most recent request, releasing the lock if it was atomic.
    pub fn fetch_request(&self) -> Option<R> {
        let entry = {
            let _guard = self.lock.lock();
            self.stack.lock().pop()
        };
        let (transition, request) = entry?;
        if transition == Transition::Atomic {
            // SAFETY: an atomic entry can only be popped by the thread that
            // pushed it, because every other thread blocks on `lock` above
            // while the forgotten guard from `make_request` is outstanding.
            unsafe { self.lock.force_unlock() };
        }
        tracing::trace!(?transition, "request fetched");
        Some(request)
    }

    /// Number of pending requests.
    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }
}

impl<R> Default for CallState<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for CallState<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallState")
            .field("depth", &self.depth())
            .finish()
    }
}

impl<R> Drop for CallState<R> {
    fn drop(&mut self) {
        // A pending atomic request would deadlock the next caller on another
        // thread, so an unbalanced stack is always fatal.
        if !self.stack.get_mut().is_empty() && !std::thread::panicking() {
            panic!(
                "orig or supr was called inside a hook without actually invoking an original or super function/method"
            );
        }
    }
}
