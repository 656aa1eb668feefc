//! FIFO mutation queue with a single-drain guard.
//!
//! Arrivals always append. Exactly one caller is told to start draining; every
//! later arrival while the drain is running only enqueues. The drain loop pops
//! until empty, and the pop that finds the queue empty also releases the guard
//! under the same lock, so there is no window where an arrival can observe
//! `draining == true` with nobody left to serve it.

use core_events::Keystroke;
use core_state::DocumentId;
use std::collections::VecDeque;

/// One pending keystroke, bound to the document that was active on arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queued {
    pub seq: u64,
    pub doc: DocumentId,
    pub key: Keystroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    /// Caller owns the drain loop now.
    StartDrain,
    /// A drain is already running; it will reach this item.
    Enqueued { depth: usize },
}

#[derive(Debug, Default)]
pub struct MutationQueue {
    pending: VecDeque<Queued>,
    draining: bool,
    next_seq: u64,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, doc: DocumentId, key: Keystroke) -> Enqueue {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push_back(Queued { seq, doc, key });
        if self.draining {
            Enqueue::Enqueued {
                depth: self.pending.len(),
            }
        } else {
            self.draining = true;
            Enqueue::StartDrain
        }
    }

    /// Head of the queue. `None` means empty, and the drain guard is released.
    pub fn next(&mut self) -> Option<Queued> {
        let item = self.pending.pop_front();
        if item.is_none() {
            self.draining = false;
        }
        item
    }

    /// Releases the guard without popping. Used when a drain loop is torn down
    /// mid-flight; pending items wait for the next arrival to drain them.
    pub fn abandon(&mut self) {
        self.draining = false;
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d() -> DocumentId {
        DocumentId::new("/q/doc")
    }

    #[test]
    fn only_first_arrival_starts_a_drain() {
        let mut q = MutationQueue::new();
        assert_eq!(q.enqueue(d(), Keystroke::Printable('a')), Enqueue::StartDrain);
        assert_eq!(
            q.enqueue(d(), Keystroke::Printable('b')),
            Enqueue::Enqueued { depth: 2 }
        );
        assert!(q.is_draining());
    }

    #[test]
    fn pops_in_arrival_order_then_releases() {
        let mut q = MutationQueue::new();
        for c in ['a', 'b', 'c'] {
            q.enqueue(d(), Keystroke::Printable(c));
        }
        let order: Vec<u64> = std::iter::from_fn(|| q.next()).map(|i| i.seq).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(!q.is_draining());
        assert_eq!(q.enqueue(d(), Keystroke::Printable('d')), Enqueue::StartDrain);
    }

    #[test]
    fn arrival_during_drain_is_served_by_same_loop() {
        let mut q = MutationQueue::new();
        q.enqueue(d(), Keystroke::Printable('a'));
        assert!(q.next().is_some());
        assert!(matches!(
            q.enqueue(d(), Keystroke::Printable('b')),
            Enqueue::Enqueued { .. }
        ));
        assert_eq!(q.next().map(|i| i.key), Some(Keystroke::Printable('b')));
        assert!(q.next().is_none());
        assert!(!q.is_draining());
    }

    #[test]
    fn abandon_leaves_items_for_next_drain() {
        let mut q = MutationQueue::new();
        q.enqueue(d(), Keystroke::Printable('a'));
        q.enqueue(d(), Keystroke::Printable('b'));
        q.abandon();
        assert_eq!(q.len(), 2);
        assert_eq!(q.enqueue(d(), Keystroke::Printable('c')), Enqueue::StartDrain);
    }
}
