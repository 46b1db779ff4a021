//! A source of arrivals at inter-arrival times drawn from a user-supplied
//! sampler.

use std::cell::RefCell;
use std::rc::Rc;

use rand_pcg::Pcg64;

use crate::error::SimError;
use crate::event::Timestamp;
use crate::sandbox::Sandbox;

struct GeneratorInner {
    is_on: bool,
    start_time: Timestamp,
    count: u64,
    sampler: Box<dyn FnMut(&mut Pcg64) -> Timestamp>,
    on_arrive: Vec<Rc<dyn Fn()>>,
}

/// Emits `on_arrive` notifications while `On`. Composes a [`Sandbox`] rather
/// than subclassing one: construct a `Generator`, register `on_arrive`
/// handlers, then `start()`/`end()` it like any other simulated actor.
#[derive(Clone)]
pub struct Generator {
    sandbox: Sandbox,
    inner: Rc<RefCell<GeneratorInner>>,
}

impl Generator {
    /// `sampler` draws the next inter-arrival gap given the sandbox's RNG.
    pub fn new(sandbox: Sandbox, sampler: impl FnMut(&mut Pcg64) -> Timestamp + 'static) -> Self {
        let inner = Rc::new(RefCell::new(GeneratorInner {
            is_on: false,
            start_time: 0.0,
            count: 0,
            sampler: Box::new(sampler),
            on_arrive: Vec::new(),
        }));
        let generator = Generator { sandbox: sandbox.clone(), inner };
        let warm_up_state = generator.inner.clone();
        sandbox.set_warmed_up_handler(move || {
            warm_up_state.borrow_mut().count = 0;
        });
        generator
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn on_arrive(&self, handler: Rc<dyn Fn()>) {
        self.inner.borrow_mut().on_arrive.push(handler);
    }

    pub fn is_on(&self) -> bool {
        self.inner.borrow().is_on
    }

    pub fn count(&self) -> u64 {
        self.inner.borrow().count
    }

    pub fn start_time(&self) -> Timestamp {
        self.inner.borrow().start_time
    }

    /// Transitions `Off -> On` and schedules the first arrival. `count` is
    /// left untouched (it only resets on warm-up, per `warmed_up_handler`).
    /// A no-op if already `On`.
    pub fn start(&self) -> Result<(), SimError> {
        {
            let mut state = self.inner.borrow_mut();
            if state.is_on {
                return Ok(());
            }
            state.is_on = true;
            state.start_time = self.sandbox.clock_time();
        }
        self.schedule_next_arrival()
    }

    /// Transitions `On -> Off`. Any arrival already scheduled still fires,
    /// but is ignored (the handler checks `is_on`).
    pub fn end(&self) {
        self.inner.borrow_mut().is_on = false;
    }

    fn schedule_next_arrival(&self) -> Result<(), SimError> {
        let delay = {
            let mut state = self.inner.borrow_mut();
            let mut rng = self.sandbox.default_rng();
            (state.sampler)(&mut rng)
        };
        let fire = self.clone();
        self.sandbox
            .schedule(move || fire.on_arrival_fire(), delay, Some("generator-arrival".into()))
            .map(|_| ())
    }

    fn on_arrival_fire(&self) {
        if !self.inner.borrow().is_on {
            return;
        }
        self.inner.borrow_mut().count += 1;
        let _ = self.schedule_next_arrival();
        let handlers = self.inner.borrow().on_arrive.clone();
        for handler in handlers {
            handler();
        }
    }
}
