//! Single-producer, multi-consumer buffer of optimization snapshots.
//!
//! Consumers drain the snapshots in production order. The newest snapshot is
//! never removed: once a consumer has caught up, every further pop returns it
//! again until the producer pushes a newer one. A buffer that received its
//! first snapshot is therefore never observed empty.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::result::OptimizationResult;

/// Outcome of a bounded pop.
#[derive(Clone, Debug, PartialEq)]
pub enum PopOutcome {
    /// The oldest unconsumed snapshot.
    Ready(Arc<OptimizationResult>),
    /// Nothing was pushed before the deadline.
    TimedOut,
    /// The producer stopped without pushing anything.
    Closed,
}

/// Mutable state behind the buffer lock.
#[derive(Debug, Default)]
struct State {
    /// Unconsumed snapshots, oldest first; the last one is retained on pop.
    queue: VecDeque<Arc<OptimizationResult>>,
    /// Set once the producer will push no more.
    closed: bool,
}

impl State {
    /// Remove the oldest snapshot unless it is the only one left.
    fn take(&mut self) -> Option<Arc<OptimizationResult>> {
        match self.queue.len() {
            0 => None,
            1 => self.queue.front().cloned(),
            _ => self.queue.pop_front(),
        }
    }
}

/// Buffer connecting a job's solver thread to polling clients.
///
/// # Examples
/// ```
/// use topoptx::{OptimizationResult, ResultBuffer};
///
/// let buffer = ResultBuffer::new();
/// buffer.push(OptimizationResult::new(vec![0.5], 1.0, 1));
/// buffer.push(OptimizationResult::new(vec![0.4], 0.8, 2));
///
/// assert_eq!(buffer.pop().map(|r| r.iteration), Some(1));
/// assert_eq!(buffer.pop().map(|r| r.iteration), Some(2));
/// // The newest snapshot stays available.
/// assert_eq!(buffer.pop().map(|r| r.iteration), Some(2));
/// ```
#[derive(Debug, Default)]
pub struct ResultBuffer {
    /// Queue and close flag.
    state: Mutex<State>,
    /// Signalled on every push and on close.
    available: Condvar,
}

impl ResultBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot and wake waiting consumers. Never blocks on consumers.
    pub fn push(&self, result: OptimizationResult) {
        let mut state = self.state.lock();
        state.queue.push_back(Arc::new(result));
        drop(state);
        self.available.notify_all();
    }

    /// Mark the producer as done and wake waiting consumers.
    ///
    /// Snapshots already pushed stay available.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Take the oldest unconsumed snapshot, waiting for the first one if needed.
    ///
    /// Returns `None` only when the buffer was closed before any push.
    pub fn pop(&self) -> Option<Arc<OptimizationResult>> {
        let mut state = self.state.lock();
        while state.queue.is_empty() && !state.closed {
            self.available.wait(&mut state);
        }
        state.take()
    }

    /// Like [`pop`](Self::pop) but waits at most `timeout` for the first snapshot.
    pub fn pop_timeout(&self, timeout: Duration) -> PopOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.queue.is_empty() && !state.closed {
            if self.available.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        match state.take() {
            Some(result) => PopOutcome::Ready(result),
            None if state.closed => PopOutcome::Closed,
            None => PopOutcome::TimedOut,
        }
    }

    /// The newest snapshot, without consuming anything.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<OptimizationResult>> {
        self.state.lock().queue.back().cloned()
    }

    /// Number of snapshots held, including the retained newest one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether nothing has been pushed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Whether the producer has closed the buffer.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
