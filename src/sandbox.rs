//! Sandboxes: scheduler nodes that compose into a tree sharing one logical
//! clock.

use std::cell::{Cell, RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::error::SimError;
use crate::event::{EventKey, SandboxId, Timestamp};
use crate::fel::FutureEventList;
use crate::hour_counter::HourCounter;
use crate::logging::{Level, Logger};

type WarmUpCallback = Rc<dyn Fn()>;

static NEXT_SANDBOX_ID: AtomicU64 = AtomicU64::new(0);

fn fresh_sandbox_id() -> SandboxId {
    SandboxId(NEXT_SANDBOX_ID.fetch_add(1, AtomicOrdering::Relaxed))
}

struct SandboxInner {
    id: String,
    uid: SandboxId,
    seed: u64,
    rng: Pcg64,
    logger: Option<Arc<dyn Logger>>,
    fel: FutureEventList,
    children: Vec<Sandbox>,
    hour_counters: Vec<HourCounter>,
    parent: Option<Weak<RefCell<SandboxInner>>>,
    index_counter: Rc<Cell<u64>>,
    clock_time: Timestamp,
    warmed_up_callbacks: Vec<WarmUpCallback>,
    warmed_up_handler: Option<Rc<dyn Fn()>>,
    wall_clock_ref: Option<Instant>,
    running: bool,
}

/// A scheduler node. Cheap to clone (an `Rc` handle to shared state); every
/// clone refers to the same underlying sandbox. Domain modules hold a
/// `Sandbox` by composition rather than subclassing it.
#[derive(Clone)]
pub struct Sandbox(Rc<RefCell<SandboxInner>>);

impl Sandbox {
    /// Builds a new root sandbox: `parent == None`, owns its own clock and
    /// event-index counter.
    pub fn new_root(id: impl Into<String>, seed: u64) -> Self {
        let uid = fresh_sandbox_id();
        let index_counter = Rc::new(Cell::new(0));
        let inner = SandboxInner {
            id: id.into(),
            uid,
            seed,
            rng: Pcg64::seed_from_u64(seed),
            logger: None,
            fel: FutureEventList::new(uid, index_counter.clone()),
            children: Vec::new(),
            hour_counters: Vec::new(),
            parent: None,
            index_counter,
            clock_time: 0.0,
            warmed_up_callbacks: Vec::new(),
            warmed_up_handler: None,
            wall_clock_ref: None,
            running: false,
        };
        Sandbox(Rc::new(RefCell::new(inner)))
    }

    fn new_child(id: impl Into<String>, seed: u64, parent: &Sandbox) -> Self {
        let uid = fresh_sandbox_id();
        let index_counter = parent.0.borrow().index_counter.clone();
        let inner = SandboxInner {
            id: id.into(),
            uid,
            seed,
            rng: Pcg64::seed_from_u64(seed),
            logger: None,
            fel: FutureEventList::new(uid, index_counter.clone()),
            children: Vec::new(),
            hour_counters: Vec::new(),
            parent: Some(Rc::downgrade(&parent.0)),
            index_counter,
            clock_time: 0.0,
            warmed_up_callbacks: Vec::new(),
            warmed_up_handler: None,
            wall_clock_ref: None,
            running: false,
        };
        Sandbox(Rc::new(RefCell::new(inner)))
    }

    pub fn uid(&self) -> SandboxId {
        self.0.borrow().uid
    }

    pub fn id(&self) -> String {
        self.0.borrow().id.clone()
    }

    pub fn seed(&self) -> u64 {
        self.0.borrow().seed
    }

    pub fn set_logger(&self, logger: Option<Arc<dyn Logger>>) {
        self.0.borrow_mut().logger = logger;
    }

    pub fn logger(&self) -> Option<Arc<dyn Logger>> {
        self.0.borrow().logger.clone()
    }

    /// Registers the closure user models override `warmed_up_handler` with:
    /// invoked once per `warm_up`, on this sandbox only (propagation across
    /// children and hour-counters is handled separately).
    pub fn set_warmed_up_handler(&self, handler: impl Fn() + 'static) {
        self.0.borrow_mut().warmed_up_handler = Some(Rc::new(handler));
    }

    pub fn parent(&self) -> Option<Sandbox> {
        self.0
            .borrow()
            .parent
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(Sandbox)
    }

    pub fn children(&self) -> Vec<Sandbox> {
        self.0.borrow().children.clone()
    }

    pub fn is_root(&self) -> bool {
        self.0.borrow().parent.is_none()
    }

    /// Walks up to the sandbox that owns the authoritative clock.
    pub fn root(&self) -> Sandbox {
        match self.parent() {
            Some(p) => p.root(),
            None => self.clone(),
        }
    }

    pub fn clock_time(&self) -> Timestamp {
        self.root().0.borrow().clock_time
    }

    /// Replaces this sandbox's RNG with a fresh one seeded by `new_seed`.
    pub fn update_random_seed(&self, new_seed: u64) {
        let mut inner = self.0.borrow_mut();
        inner.seed = new_seed;
        inner.rng = Pcg64::seed_from_u64(new_seed);
    }

    /// Mutable access to this sandbox's own deterministic RNG.
    pub fn default_rng(&self) -> RefMut<'_, Pcg64> {
        RefMut::map(self.0.borrow_mut(), |inner| &mut inner.rng)
    }

    /// Attaches a new child sandbox, registering its warm-up propagation.
    pub fn add_child(&self, id: impl Into<String>, seed: u64) -> Sandbox {
        let child = Sandbox::new_child(id, seed, self);
        self.0.borrow_mut().children.push(child.clone());
        let propagate = child.clone();
        let cb: WarmUpCallback = Rc::new(move || propagate.fire_warmed_up());
        self.0.borrow_mut().warmed_up_callbacks.push(cb);
        child
    }

    /// Creates and registers a new hour-counter bound to this sandbox's
    /// clock, with its own warm-up reset wired in.
    pub fn add_hour_counter(&self, keep_history: bool) -> HourCounter {
        let hc = HourCounter::new(self.clone(), keep_history);
        self.0.borrow_mut().hour_counters.push(hc.clone());
        let propagate = hc.clone();
        let cb: WarmUpCallback = Rc::new(move || propagate.warmed_up());
        self.0.borrow_mut().warmed_up_callbacks.push(cb);
        hc
    }

    pub fn hour_counters(&self) -> Vec<HourCounter> {
        self.0.borrow().hour_counters.clone()
    }

    /// Schedules `action` into this sandbox's own FEL at `clock_time() +
    /// delay`. `delay` must be non-negative.
    pub fn schedule(
        &self,
        action: impl FnOnce() + 'static,
        delay: Timestamp,
        tag: Option<String>,
    ) -> Result<EventKey, SimError> {
        if delay < 0.0 {
            return Err(SimError::NegativeDelay {
                sandbox: self.id(),
                delay,
            });
        }
        let timestamp = self.clock_time() + delay;
        let mut inner = self.0.borrow_mut();
        Ok(inner.fel.add(Box::new(action), timestamp, tag))
    }

    /// Shorthand for `schedule(action, 0.0, tag)`.
    pub fn schedule_now(
        &self,
        action: impl FnOnce() + 'static,
        tag: Option<String>,
    ) -> Result<EventKey, SimError> {
        self.schedule(action, 0.0, tag)
    }

    /// Removes a previously-scheduled event from its owner's FEL, if still
    /// pending. Not a core invariant, but convenient for domain modules that
    /// need to cancel a timer.
    pub fn cancel(&self, key: &EventKey) {
        self.0.borrow_mut().fel.remove(key);
    }

    fn local_head_key(&self) -> Option<EventKey> {
        self.0.borrow().fel.min_key()
    }

    /// Finds the earliest pending event across this sandbox's own FEL and
    /// every descendant's, along with a handle to whichever sandbox owns it.
    /// This is a plain recursive scan (no per-subtree minimum caching): for
    /// the tree sizes this engine targets, a linear scan per step is simpler
    /// and fast enough, and avoids cache-invalidation bugs on every
    /// `schedule`/`add_child`.
    pub(crate) fn head_event_handle(&self) -> Option<(Sandbox, EventKey)> {
        let mut best = self.local_head_key().map(|k| (self.clone(), k));
        let children = self.0.borrow().children.clone();
        for child in &children {
            if let Some((owner, key)) = child.head_event_handle() {
                best = match best {
                    None => Some((owner, key)),
                    Some((bowner, bkey)) => {
                        if key < bkey {
                            Some((owner, key))
                        } else {
                            Some((bowner, bkey))
                        }
                    }
                };
            }
        }
        best
    }

    /// Public read-only variant of [`Self::head_event_handle`], returning
    /// just the ordering key.
    pub fn head_event(&self) -> Option<EventKey> {
        self.head_event_handle().map(|(_, key)| key)
    }

    fn log(&self, level: Level, message: &str) {
        if let Some(logger) = self.root().0.borrow().logger.clone() {
            logger.log(level, "desim::sandbox", message);
        }
    }

    /// Executes exactly one event: the global head across the whole tree.
    /// Returns `Ok(false)` if no event remains anywhere. Only meaningful
    /// called on (or delegated to) the root.
    pub fn run(&self) -> Result<bool, SimError> {
        let root = self.root();
        {
            let mut inner = root.0.borrow_mut();
            if inner.running {
                return Err(SimError::RootReentrancy {
                    sandbox: inner.id.clone(),
                });
            }
            inner.running = true;
        }
        let result = root.run_one_locked();
        root.0.borrow_mut().running = false;
        result
    }

    fn run_one_locked(&self) -> Result<bool, SimError> {
        match self.head_event_handle() {
            None => Ok(false),
            Some((owner, key)) => {
                let event = {
                    let mut inner = owner.0.borrow_mut();
                    inner.fel.remove(&key)
                }
                .expect("head event key must exist in the FEL that reported it");
                self.0.borrow_mut().clock_time = key.timestamp;
                self.log(
                    Level::Debug,
                    &format!(
                        "t={:.6} dispatch event#{} owner={} tag={:?}",
                        key.timestamp,
                        key.index,
                        owner.id(),
                        event.tag
                    ),
                );
                if let Some(action) = event.into_action() {
                    action();
                }
                Ok(true)
            }
        }
    }

    /// Runs events until none remain at or before `terminate`, then advances
    /// the clock to `terminate` regardless. Returns `Ok(true)` iff an event
    /// remains in the tree afterward. Must not be called re-entrantly, and
    /// `terminate` must not precede the current clock.
    pub fn run_until(&self, terminate: Timestamp) -> Result<bool, SimError> {
        let root = self.root();
        if terminate < root.clock_time() {
            return Err(SimError::NegativeDelay {
                sandbox: root.id(),
                delay: terminate - root.clock_time(),
            });
        }
        loop {
            match root.head_event_handle() {
                Some((_, key)) if key.timestamp <= terminate => {
                    root.run()?;
                }
                _ => break,
            }
        }
        root.0.borrow_mut().clock_time = terminate;
        Ok(root.head_event_handle().is_some())
    }

    /// `run_until(clock_time() + duration)`.
    pub fn run_for(&self, duration: Timestamp) -> Result<bool, SimError> {
        let target = self.clock_time() + duration;
        self.run_until(target)
    }

    /// Executes up to `event_count` single-event steps, stopping early (and
    /// returning `Ok(false)`) the first time `run()` finds nothing to do.
    pub fn run_count(&self, event_count: usize) -> Result<bool, SimError> {
        for _ in 0..event_count {
            if !self.run()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Paces execution at `speed` logical hours per wall-clock second. The
    /// first call in a sandbox's lifetime only seeds the wall-clock
    /// reference point and executes nothing.
    pub fn run_at_speed(&self, speed: f64) -> Result<bool, SimError> {
        let root = self.root();
        let now = Instant::now();
        let previous = {
            let mut inner = root.0.borrow_mut();
            inner.wall_clock_ref.replace(now)
        };
        match previous {
            None => Ok(true),
            Some(previous) => {
                let elapsed = now.duration_since(previous).as_secs_f64();
                let target = root.clock_time() + elapsed * speed;
                root.run_until(target)
            }
        }
    }

    /// Advances by `duration`, then notifies every sandbox in the subtree
    /// and every registered hour-counter that warm-up has occurred.
    pub fn warm_up(&self, duration: Timestamp) -> Result<bool, SimError> {
        let root = self.root();
        let remaining = root.run_for(duration)?;
        root.log(
            Level::Info,
            &format!("t={:.6} warm-up complete", root.clock_time()),
        );
        root.fire_warmed_up();
        Ok(remaining)
    }

    pub(crate) fn fire_warmed_up(&self) {
        let own_handler = self.0.borrow().warmed_up_handler.clone();
        if let Some(handler) = own_handler {
            handler();
        }
        let callbacks = self.0.borrow().warmed_up_callbacks.clone();
        for cb in callbacks {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    #[test]
    fn run_for_advances_clock_exactly() {
        let root = Sandbox::new_root("root", 1);
        root.run_for(2.0).unwrap();
        assert_eq!(root.clock_time(), 2.0);
    }

    #[test]
    fn run_until_advances_even_with_no_events() {
        let root = Sandbox::new_root("root", 1);
        let more = root.run_until(5.0).unwrap();
        assert_eq!(root.clock_time(), 5.0);
        assert!(!more);
    }

    #[test]
    fn events_fire_in_fifo_order_within_a_timestamp() {
        let root = Sandbox::new_root("root", 1);
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            root.schedule(move || order.borrow_mut().push(i), 0.0, None)
                .unwrap();
        }
        root.run_until(0.0).unwrap();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn negative_delay_is_rejected() {
        let root = Sandbox::new_root("root", 1);
        let err = root.schedule(|| {}, -1.0, None).unwrap_err();
        assert!(matches!(err, SimError::NegativeDelay { .. }));
    }

    #[test]
    fn children_events_are_merged_into_global_order() {
        let root = Sandbox::new_root("root", 1);
        let child = root.add_child("child", 2);
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = log.clone();
            root.schedule(move || log.borrow_mut().push("root@1"), 1.0, None)
                .unwrap();
        }
        {
            let log = log.clone();
            child.schedule(move || log.borrow_mut().push("child@0.5"), 0.5, None)
                .unwrap();
        }
        root.run_until(2.0).unwrap();
        assert_eq!(*log.borrow(), vec!["child@0.5", "root@1"]);
    }

    #[test]
    fn warm_up_propagates_across_the_whole_subtree() {
        let a = Sandbox::new_root("A", 1);
        let b = a.add_child("B", 2);
        let c = a.add_child("C", 3);
        let d = b.add_child("D", 4);

        let hits = Rc::new(StdCell::new(0u32));
        for sbx in [&a, &b, &c, &d] {
            let hits = hits.clone();
            sbx.set_warmed_up_handler(move || hits.set(hits.get() + 1));
        }

        a.warm_up(1.0).unwrap();
        assert_eq!(a.clock_time(), 1.0);
        assert_eq!(hits.get(), 4);
    }

    #[test]
    fn reentrant_run_is_rejected() {
        let root = Sandbox::new_root("root", 1);
        let inner_root = root.clone();
        let captured: Rc<RefCell<Option<SimError>>> = Rc::new(RefCell::new(None));
        let captured_in_action = captured.clone();
        root.schedule(
            move || {
                *captured_in_action.borrow_mut() = inner_root.run().err();
            },
            0.0,
            None,
        )
        .unwrap();
        root.run_until(0.0).unwrap();
        let err = captured.borrow_mut().take().expect("nested run should have failed");
        assert!(matches!(err, SimError::RootReentrancy { .. }));
    }

    #[test]
    fn reseeding_replays_identically() {
        let root = Sandbox::new_root("root", 7);
        let first: Vec<f64> = (0..5)
            .map(|_| crate::samplers::uniform01(&mut root.default_rng()))
            .collect();
        root.update_random_seed(7);
        let second: Vec<f64> = (0..5)
            .map(|_| crate::samplers::uniform01(&mut root.default_rng()))
            .collect();
        assert_eq!(first, second);
    }
}
