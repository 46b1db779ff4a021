//! Error kinds surfaced by the engine.
//!
//! Every variant here corresponds to a logic or construction violation that
//! the engine's own contract says must be fatal (§7 of the design docs). They
//! are returned as `Result::Err` rather than raised as panics so an embedder
//! can log and exit cleanly, but none of them are meant to be handled and
//! retried — a caller that gets one back should treat it as a bug.

use thiserror::Error;

use crate::event::Timestamp;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("sandbox '{sandbox}': negative delay {delay} is not permitted")]
    NegativeDelay { sandbox: String, delay: Timestamp },

    #[error(
        "hour-counter on sandbox '{sandbox}': observation at t={observed} precedes last observation at t={last}"
    )]
    ClockRewind {
        sandbox: String,
        observed: Timestamp,
        last: Timestamp,
    },

    #[error("sandbox '{sandbox}': run* called re-entrantly from within an event action")]
    RootReentrancy { sandbox: String },

    #[error(
        "hour-counter on sandbox '{sandbox}': supplied clock {supplied} disagrees with sandbox clock {actual}"
    )]
    ClockMismatch {
        sandbox: String,
        supplied: Timestamp,
        actual: Timestamp,
    },

    #[error("{what}: capacity must be positive, got {capacity}")]
    InvalidCapacity { what: String, capacity: i64 },

    #[error("{what}: a sampler is required but was not provided")]
    MissingSampler { what: String },
}
