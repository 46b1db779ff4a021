//! Per-sandbox future event list.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ordered_float::OrderedFloat;

use crate::event::{Event, EventKey, SandboxId, Timestamp};

/// An ordered set of a single sandbox's own pending events, keyed by
/// `(timestamp, index)` so that `min` is O(1) and `insert`/`remove` are
/// O(log n).
pub(crate) struct FutureEventList {
    owner: SandboxId,
    index_counter: Rc<Cell<u64>>,
    events: BTreeMap<(OrderedFloat<f64>, u64), Event>,
}

impl FutureEventList {
    pub(crate) fn new(owner: SandboxId, index_counter: Rc<Cell<u64>>) -> Self {
        Self {
            owner,
            index_counter,
            events: BTreeMap::new(),
        }
    }

    fn next_index(&self) -> u64 {
        let i = self.index_counter.get();
        self.index_counter.set(i + 1);
        i
    }

    pub(crate) fn add(
        &mut self,
        action: Box<dyn FnOnce()>,
        timestamp: Timestamp,
        tag: Option<String>,
    ) -> EventKey {
        let index = self.next_index();
        let event = Event::new(self.owner, index, timestamp, tag, action);
        let key = event.key();
        self.events.insert((OrderedFloat(timestamp), index), event);
        key
    }

    pub(crate) fn remove(&mut self, key: &EventKey) -> Option<Event> {
        self.events.remove(&(OrderedFloat(key.timestamp), key.index))
    }

    pub(crate) fn min_key(&self) -> Option<EventKey> {
        self.events.keys().next().map(|(t, i)| EventKey {
            owner: self.owner,
            timestamp: t.0,
            index: *i,
        })
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> Rc<Cell<u64>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn min_key_is_smallest_by_time_then_index() {
        let mut fel = FutureEventList::new(SandboxId(0), counter());
        fel.add(Box::new(|| {}), 5.0, None);
        let k2 = fel.add(Box::new(|| {}), 1.0, None);
        fel.add(Box::new(|| {}), 1.0, None);
        let head = fel.min_key().unwrap();
        assert_eq!(head.timestamp, 1.0);
        assert_eq!(head.index, k2.index);
    }

    #[test]
    fn remove_by_identity_evicts_exactly_one() {
        let mut fel = FutureEventList::new(SandboxId(0), counter());
        let a = fel.add(Box::new(|| {}), 1.0, None);
        let _b = fel.add(Box::new(|| {}), 1.0, None);
        assert_eq!(fel.len(), 2);
        assert!(fel.remove(&a).is_some());
        assert_eq!(fel.len(), 1);
        assert!(fel.remove(&a).is_none());
    }

    #[test]
    fn clear_empties_the_list() {
        let mut fel = FutureEventList::new(SandboxId(0), counter());
        fel.add(Box::new(|| {}), 1.0, None);
        fel.add(Box::new(|| {}), 2.0, None);
        fel.clear();
        assert!(fel.min_key().is_none());
    }
}
