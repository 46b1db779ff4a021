//! A capacity-bounded queue: loads wait in `pending` until room opens up in
//! `queueing`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::SimError;
use crate::hour_counter::HourCounter;
use crate::sandbox::Sandbox;

struct QueueInner<L> {
    capacity: usize,
    pending: VecDeque<L>,
    queueing: VecDeque<L>,
    on_enqueued: Vec<Rc<dyn Fn(L)>>,
}

/// A bounded queue of loads of type `L`. Composes a [`Sandbox`] (for its
/// clock) and a [`HourCounter`] tracking the number currently queueing.
#[derive(Clone)]
pub struct Queue<L: Clone + 'static> {
    #[allow(dead_code)]
    sandbox: Sandbox,
    inner: Rc<RefCell<QueueInner<L>>>,
    queueing_hour_counter: HourCounter,
}

impl<L: Clone + 'static> Queue<L> {
    pub fn new(sandbox: Sandbox, capacity: usize) -> Result<Self, SimError> {
        if capacity == 0 {
            return Err(SimError::InvalidCapacity {
                what: "Queue".into(),
                capacity: 0,
            });
        }
        let queueing_hour_counter = sandbox.add_hour_counter(false);
        Ok(Queue {
            sandbox,
            inner: Rc::new(RefCell::new(QueueInner {
                capacity,
                pending: VecDeque::new(),
                queueing: VecDeque::new(),
                on_enqueued: Vec::new(),
            })),
            queueing_hour_counter,
        })
    }

    pub fn on_enqueued(&self, handler: Rc<dyn Fn(L)>) {
        self.inner.borrow_mut().on_enqueued.push(handler);
    }

    pub fn queueing_hour_counter(&self) -> &HourCounter {
        &self.queueing_hour_counter
    }

    pub fn queueing_len(&self) -> usize {
        self.inner.borrow().queueing.len()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Appends `load` to the pending list, then attempts to move the head of
    /// `pending` into `queueing` if there is room.
    pub fn rqst_enqueue(&self, load: L) -> Result<(), SimError> {
        self.inner.borrow_mut().pending.push_back(load);
        self.try_enqueue()
    }

    fn try_enqueue(&self) -> Result<(), SimError> {
        let moved = {
            let mut state = self.inner.borrow_mut();
            if state.queueing.len() < state.capacity && !state.pending.is_empty() {
                state.pending.pop_front()
            } else {
                None
            }
        };
        if let Some(load) = moved {
            self.inner.borrow_mut().queueing.push_back(load.clone());
            self.queueing_hour_counter.observe_change(1.0)?;
            let handlers = self.inner.borrow().on_enqueued.clone();
            for handler in handlers {
                handler(load.clone());
            }
        }
        Ok(())
    }
}

impl<L: Clone + PartialEq + 'static> Queue<L> {
    /// Removes `load` from `queueing` (a no-op if it isn't there), then
    /// retriggers an enqueue attempt so a pending load can take its place.
    pub fn dequeue(&self, load: &L) -> Result<(), SimError> {
        let removed = {
            let mut state = self.inner.borrow_mut();
            if let Some(pos) = state.queueing.iter().position(|x| x == load) {
                state.queueing.remove(pos);
                true
            } else {
                false
            }
        };
        if removed {
            self.queueing_hour_counter.observe_change(-1.0)?;
        }
        self.try_enqueue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_respects_capacity() {
        let root = Sandbox::new_root("root", 1);
        let queue = Queue::<u32>::new(root.clone(), 1).unwrap();
        queue.rqst_enqueue(1).unwrap();
        queue.rqst_enqueue(2).unwrap();
        assert_eq!(queue.queueing_len(), 1);
        assert_eq!(queue.pending_len(), 1);
    }

    #[test]
    fn dequeue_admits_the_next_pending_load() {
        let root = Sandbox::new_root("root", 1);
        let queue = Queue::<u32>::new(root.clone(), 1).unwrap();
        queue.rqst_enqueue(1).unwrap();
        queue.rqst_enqueue(2).unwrap();
        queue.dequeue(&1).unwrap();
        assert_eq!(queue.queueing_len(), 1);
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let root = Sandbox::new_root("root", 1);
        let err = Queue::<u32>::new(root, 0).unwrap_err();
        assert!(matches!(err, SimError::InvalidCapacity { .. }));
    }

    #[test]
    fn on_enqueued_fires_for_each_admitted_load() {
        let root = Sandbox::new_root("root", 1);
        let queue = Queue::<u32>::new(root, 5).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_cb = seen.clone();
        queue.on_enqueued(Rc::new(move |load| seen_cb.borrow_mut().push(load)));
        queue.rqst_enqueue(10).unwrap();
        queue.rqst_enqueue(20).unwrap();
        assert_eq!(*seen.borrow(), vec![10, 20]);
    }
}
