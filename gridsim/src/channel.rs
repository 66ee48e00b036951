//! Mailboxes for communication over simulated channels.

use std::any::Any;
use std::collections::{HashMap, VecDeque};

use crate::executor::TaskId;
use crate::topology::{EdgeIndex, NodeIndex};

/// A message in flight, tagged with the identity of its sender.
pub(crate) struct Envelope {
    pub(crate) message: Box<dyn Any>,
    pub(crate) sender: NodeIndex,
}

/// The unbounded FIFO message queue of a single channel.
///
/// A mailbox also tracks the kernel tasks currently suspended on a receive
/// from this channel. Delivering a message wakes at most one of them, in
/// suspension order.
#[derive(Default)]
struct Mailbox {
    queue: VecDeque<Envelope>,
    waiters: VecDeque<TaskId>,
}

impl Mailbox {
    /// Enqueues a message and returns the waiter to wake, if any.
    fn push(&mut self, envelope: Envelope) -> Option<TaskId> {
        self.queue.push_back(envelope);

        self.waiters.pop_front()
    }

    /// Dequeues the oldest message, if any.
    fn try_pop(&mut self) -> Option<Envelope> {
        self.queue.pop_front()
    }

    /// Registers a task as waiting on this mailbox.
    ///
    /// Registering an already waiting task is a no-op, so a task suspended on
    /// several receive futures for the same channel is woken only once per
    /// delivery.
    fn enlist(&mut self, task: TaskId) {
        if !self.waiters.contains(&task) {
            self.waiters.push_back(task);
        }
    }

    /// Removes a task from the waiter list, if present.
    fn delist(&mut self, task: TaskId) {
        self.waiters.retain(|&waiter| waiter != task);
    }
}

/// All mailboxes of a simulation, keyed by channel.
///
/// Mailboxes are created lazily on first use and live until the simulation is
/// discarded.
#[derive(Default)]
pub(crate) struct MailboxSet {
    boxes: HashMap<EdgeIndex, Mailbox>,
}

impl MailboxSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueues a message into a channel's mailbox and returns the waiting
    /// receiver to wake, if any.
    pub(crate) fn push(
        &mut self,
        edge: EdgeIndex,
        message: Box<dyn Any>,
        sender: NodeIndex,
    ) -> Option<TaskId> {
        self.boxes
            .entry(edge)
            .or_default()
            .push(Envelope { message, sender })
    }

    /// Dequeues the oldest message of a channel's mailbox, if any.
    pub(crate) fn try_pop(&mut self, edge: EdgeIndex) -> Option<Envelope> {
        self.boxes.get_mut(&edge).and_then(Mailbox::try_pop)
    }

    /// Registers a task as waiting on a channel's mailbox.
    pub(crate) fn enlist(&mut self, edge: EdgeIndex, task: TaskId) {
        self.boxes.entry(edge).or_default().enlist(task);
    }

    /// Removes a task from a channel's waiter list, if present.
    pub(crate) fn delist(&mut self, edge: EdgeIndex, task: TaskId) {
        if let Some(mailbox) = self.boxes.get_mut(&edge) {
            mailbox.delist(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(message: &'static str, sender: usize) -> Envelope {
        Envelope {
            message: Box::new(message),
            sender: NodeIndex(sender),
        }
    }

    #[test]
    fn mailbox_is_fifo() {
        let mut mailboxes = MailboxSet::new();
        let edge = EdgeIndex(0);

        mailboxes.push(edge, Box::new("a"), NodeIndex(0));
        mailboxes.push(edge, Box::new("b"), NodeIndex(0));

        let first = mailboxes.try_pop(edge).unwrap();
        let second = mailboxes.try_pop(edge).unwrap();
        assert_eq!(*first.message.downcast::<&str>().unwrap(), "a");
        assert_eq!(*second.message.downcast::<&str>().unwrap(), "b");
        assert!(mailboxes.try_pop(edge).is_none());
    }

    #[test]
    fn mailbox_wakes_at_most_one_waiter() {
        let mut mailbox = Mailbox::default();
        mailbox.enlist(1);
        mailbox.enlist(2);

        assert_eq!(mailbox.push(envelope("x", 0)), Some(1));
        assert_eq!(mailbox.push(envelope("y", 0)), Some(2));
        assert_eq!(mailbox.push(envelope("z", 0)), None);
    }

    #[test]
    fn mailbox_enlist_is_idempotent() {
        let mut mailbox = Mailbox::default();
        mailbox.enlist(7);
        mailbox.enlist(7);

        assert_eq!(mailbox.push(envelope("x", 0)), Some(7));
        assert_eq!(mailbox.push(envelope("y", 0)), None);
    }

    #[test]
    fn mailbox_delist_removes_waiter() {
        let mut mailbox = Mailbox::default();
        mailbox.enlist(1);
        mailbox.enlist(2);
        mailbox.delist(1);

        assert_eq!(mailbox.push(envelope("x", 0)), Some(2));
    }
}
