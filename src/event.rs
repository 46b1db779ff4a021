//! Events and the total order events are executed in.

use std::cmp::Ordering;
use std::fmt;

use ordered_float::OrderedFloat;

/// Simulation timestamp: hours since the owning root's epoch.
pub type Timestamp = f64;

/// Opaque identity for a sandbox, used by [`Event`]/[`EventKey`] to name an owner
/// without holding a strong reference to it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SandboxId(pub(crate) u64);

/// The `(timestamp, index)` pair that totally orders events across an entire
/// sandbox tree: primary key is the scheduled time, secondary key is the
/// creation order, giving strict FIFO among events tied at the same time.
#[derive(Clone, Copy, Debug)]
pub struct EventKey {
    pub owner: SandboxId,
    pub timestamp: Timestamp,
    pub index: u64,
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        OrderedFloat(self.timestamp) == OrderedFloat(other.timestamp) && self.index == other.index
    }
}
impl Eq for EventKey {}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        OrderedFloat(self.timestamp)
            .cmp(&OrderedFloat(other.timestamp))
            .then(self.index.cmp(&other.index))
    }
}

/// A scheduled invocation of a zero-argument callable. Immutable once
/// constructed; the action is taken exactly once, by the run loop.
pub struct Event {
    pub owner: SandboxId,
    pub index: u64,
    pub timestamp: Timestamp,
    pub tag: Option<String>,
    action: Option<Box<dyn FnOnce()>>,
}

impl Event {
    pub(crate) fn new(
        owner: SandboxId,
        index: u64,
        timestamp: Timestamp,
        tag: Option<String>,
        action: Box<dyn FnOnce()>,
    ) -> Self {
        Self {
            owner,
            index,
            timestamp,
            tag,
            action: Some(action),
        }
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            owner: self.owner,
            timestamp: self.timestamp,
            index: self.index,
        }
    }

    /// Consumes the event, returning its action for a one-shot invocation.
    pub(crate) fn into_action(mut self) -> Option<Box<dyn FnOnce()>> {
        self.action.take()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("owner", &self.owner)
            .field("index", &self.index)
            .field("timestamp", &self.timestamp)
            .field("tag", &self.tag)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(t: f64, i: u64) -> EventKey {
        EventKey {
            owner: SandboxId(0),
            timestamp: t,
            index: i,
        }
    }

    #[test]
    fn orders_by_timestamp_then_index() {
        assert!(key(1.0, 5) < key(2.0, 0));
        assert!(key(1.0, 0) < key(1.0, 1));
        assert_eq!(key(1.0, 1), key(1.0, 1));
    }
}
