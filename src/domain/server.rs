//! A capacity-bounded server: loads are started, served for a sampled
//! duration, and depart on external acknowledgement.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rand_pcg::Pcg64;

use crate::error::SimError;
use crate::event::Timestamp;
use crate::hour_counter::HourCounter;
use crate::sandbox::Sandbox;

struct ServerInner<L> {
    capacity: usize,
    pending_start: VecDeque<L>,
    serving: Vec<L>,
    pending_depart: Vec<L>,
    service_sampler: Box<dyn FnMut(&mut Pcg64, &L) -> Timestamp>,
    on_started: Vec<Rc<dyn Fn(L)>>,
    on_ready_to_depart: Vec<Rc<dyn Fn(L)>>,
}

/// A bounded server of loads of type `L`. Tracks two hour-counters: one for
/// the number currently being served, one for the number that have finished
/// service but not yet externally departed.
#[derive(Clone)]
pub struct Server<L: Clone + 'static> {
    sandbox: Sandbox,
    inner: Rc<RefCell<ServerInner<L>>>,
    serving_hour_counter: HourCounter,
    pending_depart_hour_counter: HourCounter,
}

impl<L: Clone + 'static> Server<L> {
    /// `service_sampler` draws a service duration given the sandbox's RNG
    /// and the load being served.
    pub fn new(
        sandbox: Sandbox,
        capacity: usize,
        service_sampler: impl FnMut(&mut Pcg64, &L) -> Timestamp + 'static,
    ) -> Result<Self, SimError> {
        if capacity == 0 {
            return Err(SimError::InvalidCapacity {
                what: "Server".into(),
                capacity: 0,
            });
        }
        let serving_hour_counter = sandbox.add_hour_counter(false);
        let pending_depart_hour_counter = sandbox.add_hour_counter(false);
        Ok(Server {
            sandbox,
            inner: Rc::new(RefCell::new(ServerInner {
                capacity,
                pending_start: VecDeque::new(),
                serving: Vec::new(),
                pending_depart: Vec::new(),
                service_sampler: Box::new(service_sampler),
                on_started: Vec::new(),
                on_ready_to_depart: Vec::new(),
            })),
            serving_hour_counter,
            pending_depart_hour_counter,
        })
    }

    pub fn on_started(&self, handler: Rc<dyn Fn(L)>) {
        self.inner.borrow_mut().on_started.push(handler);
    }

    pub fn on_ready_to_depart(&self, handler: Rc<dyn Fn(L)>) {
        self.inner.borrow_mut().on_ready_to_depart.push(handler);
    }

    pub fn serving_hour_counter(&self) -> &HourCounter {
        &self.serving_hour_counter
    }

    pub fn pending_depart_hour_counter(&self) -> &HourCounter {
        &self.pending_depart_hour_counter
    }

    pub fn serving_len(&self) -> usize {
        self.inner.borrow().serving.len()
    }

    /// Appends `load` to the pending-to-start list, then attempts to start
    /// it (and as many others as capacity allows).
    pub fn rqst_start(&self, load: L) -> Result<(), SimError> {
        self.inner.borrow_mut().pending_start.push_back(load);
        self.try_start()
    }

    fn try_start(&self) -> Result<(), SimError> {
        loop {
            let candidate = {
                let state = self.inner.borrow();
                if state.serving.len() < state.capacity && !state.pending_start.is_empty() {
                    state.pending_start.front().cloned()
                } else {
                    None
                }
            };
            let Some(load) = candidate else { break };
            self.inner.borrow_mut().pending_start.pop_front();
            self.inner.borrow_mut().serving.push(load.clone());
            self.serving_hour_counter.observe_change(1.0)?;

            let duration = {
                let mut state = self.inner.borrow_mut();
                let mut rng = self.sandbox.default_rng();
                (state.service_sampler)(&mut rng, &load)
            };
            let this = self.clone();
            let departing_load = load.clone();
            self.sandbox.schedule(
                move || this.ready_to_depart(departing_load),
                duration,
                Some("server-service-complete".into()),
            )?;

            let handlers = self.inner.borrow().on_started.clone();
            for handler in handlers {
                handler(load.clone());
            }
        }
        Ok(())
    }

    fn ready_to_depart(&self, load: L) {
        self.inner.borrow_mut().pending_depart.push(load.clone());
        let _ = self.serving_hour_counter.observe_change(-1.0);
        let _ = self.pending_depart_hour_counter.observe_change(1.0);
        let handlers = self.inner.borrow().on_ready_to_depart.clone();
        for handler in handlers {
            handler(load.clone());
        }
    }
}

impl<L: Clone + PartialEq + 'static> Server<L> {
    /// Externally acknowledges that `load` has left the server, freeing its
    /// capacity slot and retriggering a start attempt. A no-op if `load`
    /// isn't in `pending_depart`.
    pub fn depart(&self, load: &L) -> Result<(), SimError> {
        let removed = {
            let mut state = self.inner.borrow_mut();
            if let Some(pos) = state.pending_depart.iter().position(|x| x == load) {
                state.pending_depart.remove(pos);
                true
            } else {
                false
            }
        };
        if removed {
            self.pending_depart_hour_counter.observe_change(-1.0)?;
        }
        self.try_start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_moves_load_to_serving_and_schedules_completion() {
        let root = Sandbox::new_root("root", 1);
        let server = Server::<u32>::new(root.clone(), 1, |_rng, _load| 2.0).unwrap();
        server.rqst_start(1).unwrap();
        assert_eq!(server.serving_len(), 1);
        root.run_for(2.0).unwrap();
        assert_eq!(server.serving_len(), 0);
    }

    #[test]
    fn depart_frees_capacity_for_the_next_pending_load() {
        let root = Sandbox::new_root("root", 1);
        let server = Server::<u32>::new(root.clone(), 1, |_rng, _load| 1.0).unwrap();
        server.rqst_start(1).unwrap();
        server.rqst_start(2).unwrap();
        root.run_for(1.0).unwrap();
        assert_eq!(server.serving_len(), 0);
        server.depart(&1).unwrap();
        assert_eq!(server.serving_len(), 1);
    }

    #[test]
    fn depart_of_an_unknown_load_does_not_drive_the_counter_negative() {
        let root = Sandbox::new_root("root", 1);
        let server = Server::<u32>::new(root, 1, |_rng, _load| 1.0).unwrap();
        server.depart(&999).unwrap();
        assert_eq!(server.pending_depart_hour_counter().last_count(), 0.0);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let root = Sandbox::new_root("root", 1);
        let err = Server::<u32>::new(root, 0, |_rng, _load| 1.0).unwrap_err();
        assert!(matches!(err, SimError::InvalidCapacity { .. }));
    }
}
