//! FIFO action scheduling.
//!
//! Some consequences must not run inline with the mutation that caused them:
//! death handling is the canonical case - health reaching zero schedules the
//! death animation and destruction, so every other effect resolving in the
//! same tick still finds the entity in the registry. The queue is drained in
//! strict FIFO order at the end of each player command; steps may schedule
//! further steps while the drain is in progress.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::core::session::Session;

/// A deferred simulation step.
pub type ScheduledStep = Box<dyn FnOnce(&mut Session)>;

/// Shared FIFO queue of deferred steps.
///
/// Cloning yields another handle to the same queue, which lets detached
/// watchers (e.g. the health cell inside an entity) schedule work without
/// holding a session borrow.
#[derive(Clone, Default)]
pub struct ActionQueue {
    inner: Rc<RefCell<VecDeque<ScheduledStep>>>,
}

impl ActionQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to the back of the queue.
    pub fn schedule(&self, step: ScheduledStep) {
        self.inner.borrow_mut().push_back(step);
    }

    /// Take the next step off the front of the queue.
    #[must_use]
    pub fn pop(&self) -> Option<ScheduledStep> {
        self.inner.borrow_mut().pop_front()
    }

    /// Number of pending steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Is the queue empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl std::fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionQueue")
            .field("pending", &self.len())
            .finish()
    }
}
