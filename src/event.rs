//! The tick-scheduled event queue (§5, §10.5).
//!
//! A `BinaryHeap` of `(Reverse<tick>, sequence, callback)` gives
//! earliest-tick-first ordering with ties broken by insertion order,
//! matching §5's "events at the same tick run in insertion order"
//! rule — a plain min-heap on tick alone would leave same-tick ties
//! unspecified.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

pub type Tick = u64;
pub type EventId = u64;

/// Shared handle used by self-rescheduling events (e.g. the drive's
/// recurring index pulse), which need to queue a follow-up event from
/// inside their own callback.
pub type EventQueueRef = Rc<RefCell<EventQueue>>;

pub trait EventCallback {
    fn fire(self: Box<Self>);
}

impl<F: FnOnce()> EventCallback for F {
    fn fire(self: Box<Self>) {
        (*self)()
    }
}

struct ScheduledEvent {
    at_tick: Tick,
    sequence: u64,
    id: EventId,
    callback: Box<dyn EventCallback>,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at_tick == other.at_tick && self.sequence == other.sequence
    }
}
impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        Reverse((self.at_tick, self.sequence)).cmp(&Reverse((other.at_tick, other.sequence)))
    }
}

/// The cooperative scheduler's event sink: `queue(at_tick, cb)` plus
/// `current_tick` (§6 "Event bus").
pub struct EventQueue {
    current_tick: Tick,
    heap: BinaryHeap<ScheduledEvent>,
    next_sequence: u64,
    next_id: EventId,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue { current_tick: 0, heap: BinaryHeap::new(), next_sequence: 0, next_id: 0 }
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Queue `callback` to fire at `at_tick` (which may be `<=
    /// current_tick`, firing at the next `run_until`). Returns an id
    /// usable with `cancel`.
    pub fn queue(&mut self, at_tick: Tick, callback: impl FnOnce() + 'static) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(ScheduledEvent { at_tick, sequence, id, callback: Box::new(callback) });
        id
    }

    /// Remove a not-yet-fired event by id (§5 "cancellation": a forced
    /// interrupt dequeues a pending FDC state event, ejecting a disk
    /// dequeues its index event). No-op if `id` already fired.
    pub fn cancel(&mut self, id: EventId) {
        let remaining: Vec<ScheduledEvent> = self.heap.drain().filter(|e| e.id != id).collect();
        self.heap.extend(remaining);
    }

    /// Advance `current_tick` to `target` and fire every event at or
    /// before it, in heap order (earliest tick, then insertion order).
    ///
    /// Only safe to call when nothing downstream re-enters this same
    /// queue from inside a callback (a plain, non-shared `EventQueue`).
    /// Self-rescheduling callbacks (e.g. the drive's index pulse) hold
    /// an `EventQueueRef` instead and must drive the queue through
    /// [`pump`], which never holds the `RefCell` borrow across a fire.
    pub fn run_until(&mut self, target: Tick) {
        self.current_tick = target;
        while let Some(top) = self.heap.peek() {
            if top.at_tick > target {
                break;
            }
            let event = self.heap.pop().unwrap();
            event.callback.fire();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Drive a shared queue up to `target`, popping and firing one event
/// at a time without holding the `RefCell` borrow while the callback
/// runs — required because callbacks like the drive's index pulse
/// re-borrow `events` to queue their own successor (§5, §4.G).
pub fn pump(events: &EventQueueRef, target: Tick) {
    events.borrow_mut().current_tick = target;
    loop {
        let due = {
            let mut q = events.borrow_mut();
            match q.heap.peek() {
                Some(top) if top.at_tick <= target => q.heap.pop(),
                _ => None,
            }
        };
        match due {
            Some(event) => event.callback.fire(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn events_fire_in_tick_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut q = EventQueue::new();
        let l1 = log.clone();
        q.queue(20, move || l1.borrow_mut().push("b"));
        let l2 = log.clone();
        q.queue(10, move || l2.borrow_mut().push("a"));

        q.run_until(25);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn same_tick_events_fire_in_insertion_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut q = EventQueue::new();
        for tag in ["first", "second", "third"] {
            let l = log.clone();
            q.queue(5, move || l.borrow_mut().push(tag));
        }
        q.run_until(5);
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn cancel_prevents_a_pending_event_from_firing() {
        let fired = Rc::new(RefCell::new(false));
        let mut q = EventQueue::new();
        let f = fired.clone();
        let id = q.queue(10, move || *f.borrow_mut() = true);
        q.cancel(id);
        q.run_until(10);
        assert!(!*fired.borrow());
    }
}
