//! desim: a hierarchical discrete-event simulation engine.
//!
//! The core is a tree of [`Sandbox`]es, each owning its own future-event
//! list, with a single logical clock shared from the root down. Domain
//! models (see [`domain`]) compose a `Sandbox` rather than subclassing one,
//! and register closures for the handful of hooks (warm-up, arrivals, ...)
//! they need.
//!
//! Time-weighted statistics are tracked with [`HourCounter`]: a
//! piecewise-constant integrator of a scalar count against a sandbox's
//! clock, supporting pause/resume and a post-warm-up reset.
//!
//! Non-goals: a general-purpose random-variable library (see
//! [`samplers`] for exactly what `domain` needs), parallel or distributed
//! execution, and persistence of simulation state.
//!
//! # Quick example
//!
//! ```
//! use desim::Sandbox;
//!
//! let root = Sandbox::new_root("root", 1);
//! let ticks = std::rc::Rc::new(std::cell::Cell::new(0u32));
//!
//! fn schedule_tick(sandbox: &Sandbox, ticks: std::rc::Rc<std::cell::Cell<u32>>, left: u32) {
//!     let sandbox_for_action = sandbox.clone();
//!     sandbox
//!         .schedule(
//!             move || {
//!                 ticks.set(ticks.get() + 1);
//!                 if left > 0 {
//!                     schedule_tick(&sandbox_for_action, ticks.clone(), left - 1);
//!                 }
//!             },
//!             1.0,
//!             None,
//!         )
//!         .unwrap();
//! }
//!
//! schedule_tick(&root, ticks.clone(), 4);
//! root.run_for(10.0).unwrap();
//! assert_eq!(ticks.get(), 5);
//! assert_eq!(root.clock_time(), 10.0);
//! ```

mod builder;
pub mod domain;
mod error;
mod event;
mod fel;
mod hour_counter;
pub mod logging;
pub mod samplers;
mod sandbox;

pub use builder::SandboxBuilder;
pub use error::SimError;
pub use event::{EventKey, SandboxId, Timestamp};
pub use hour_counter::{HistogramBin, HourCounter, ReadOnlyHourCounter};
pub use sandbox::Sandbox;
