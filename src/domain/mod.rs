//! Reference domain modules: small, representative users of the core that
//! double as worked examples of composing a [`crate::Sandbox`].
//!
//! None of this is required to use the core; it exists to exercise it and
//! to give downstream models something concrete to imitate.

mod generator;
mod pattern_generator;
mod queue;
mod server;
mod tandem;

pub use generator::Generator;
pub use pattern_generator::{CustomCycle, PatternGenerator, PatternGeneratorConfig, SeasonalFactors};
pub use queue::Queue;
pub use server::Server;
pub use tandem::{Stage, TandemLine};
