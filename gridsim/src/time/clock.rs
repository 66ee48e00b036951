use std::error::Error;
use std::fmt;

use crate::executor::TaskId;
use crate::util::priority_queue::PriorityQueue;

/// The unit of simulated time.
///
/// Ticks are non-negative integers. The simulation clock starts at 0 and
/// moves forward by exactly one tick per driver step; it is never decremented
/// and no tick is ever revisited.
pub type Tick = u64;

/// A captured resumption of pending simulation work.
///
/// Continuations are stored in the clock queue together with the tick at
/// which they become due.
pub(crate) enum Continuation {
    /// Resumes the suspended kernel task with this identifier.
    Resume(TaskId),
    /// Invokes a callback injected by driving code.
    Invoke(Box<dyn FnOnce()>),
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume(task) => f.debug_tuple("Resume").field(task).finish(),
            Self::Invoke(_) => f.debug_tuple("Invoke").finish(),
        }
    }
}

/// The virtual clock of a simulation.
///
/// The clock owns the current tick and the queue of pending continuations,
/// ordered by due tick. Continuations with the same due tick are stored and
/// retrieved in scheduling order, which makes simulation runs reproducible.
pub(crate) struct Clock {
    tick: Tick,
    queue: PriorityQueue<Tick, Continuation>,
}

impl Clock {
    /// Creates a clock set to tick 0 with an empty continuation queue.
    pub(crate) fn new() -> Self {
        Self {
            tick: 0,
            queue: PriorityQueue::new(),
        }
    }

    /// Returns the current tick.
    pub(crate) fn tick(&self) -> Tick {
        self.tick
    }

    /// Enqueues a continuation to fire when the tick counter reaches `tick`.
    ///
    /// There is no constraint that `tick` lie in the future: a continuation
    /// scheduled for a past tick is accepted and will fire at the next step,
    /// where it is reported as a scheduling anomaly.
    pub(crate) fn schedule_at(&mut self, tick: Tick, continuation: Continuation) {
        self.queue.insert(tick, continuation);
    }

    /// Enqueues a continuation to fire `delay` ticks after the current tick.
    pub(crate) fn schedule_after(&mut self, delay: Tick, continuation: Continuation) {
        self.queue.insert(self.tick + delay, continuation);
    }

    /// Increments the tick counter by exactly one and returns the new tick.
    pub(crate) fn advance(&mut self) -> Tick {
        self.tick += 1;
        self.tick
    }

    /// Pops the next continuation whose due tick is not later than the
    /// current tick, if any.
    ///
    /// Among continuations due at the same tick, the one scheduled first is
    /// returned first.
    pub(crate) fn pull_due(&mut self) -> Option<(Tick, Continuation)> {
        match self.queue.peek_key() {
            Some(&due) if due <= self.tick => self.queue.pull(),
            _ => None,
        }
    }

    /// Returns `true` while at least one continuation is pending.
    pub(crate) fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }
}

/// Error returned when simulation logic requests an invalid wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulingError {
    /// The wait duration was zero ticks.
    ///
    /// A zero-tick wait is rejected rather than coerced to an immediate
    /// resume, which could otherwise spin a kernel in a tight loop without
    /// ever letting the clock move.
    NullWaitDuration,
}

impl fmt::Display for SchedulingError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullWaitDuration => write!(fmt, "the wait duration must be at least one tick"),
        }
    }
}

impl Error for SchedulingError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: usize) -> Continuation {
        Continuation::Resume(id)
    }

    fn resumed(continuation: Continuation) -> TaskId {
        match continuation {
            Continuation::Resume(id) => id,
            Continuation::Invoke(_) => panic!("expected a task resumption"),
        }
    }

    #[test]
    fn clock_starts_at_zero() {
        let clock = Clock::new();

        assert_eq!(clock.tick(), 0);
        assert!(!clock.has_pending());
    }

    #[test]
    fn clock_advances_one_tick_at_a_time() {
        let mut clock = Clock::new();

        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.tick(), 2);
    }

    #[test]
    fn clock_pulls_only_due_continuations() {
        let mut clock = Clock::new();
        clock.schedule_at(1, task(11));
        clock.schedule_at(2, task(22));

        assert!(clock.pull_due().is_none());

        clock.advance();
        let (due, continuation) = clock.pull_due().unwrap();
        assert_eq!(due, 1);
        assert_eq!(resumed(continuation), 11);
        assert!(clock.pull_due().is_none());

        clock.advance();
        let (due, continuation) = clock.pull_due().unwrap();
        assert_eq!(due, 2);
        assert_eq!(resumed(continuation), 22);
        assert!(!clock.has_pending());
    }

    #[test]
    fn clock_preserves_scheduling_order_within_a_tick() {
        let mut clock = Clock::new();
        clock.schedule_at(3, task(1));
        clock.schedule_at(1, task(2));
        clock.schedule_at(3, task(3));
        clock.schedule_at(3, task(4));

        clock.advance();
        assert_eq!(resumed(clock.pull_due().unwrap().1), 2);

        clock.advance();
        clock.advance();
        assert_eq!(resumed(clock.pull_due().unwrap().1), 1);
        assert_eq!(resumed(clock.pull_due().unwrap().1), 3);
        assert_eq!(resumed(clock.pull_due().unwrap().1), 4);
    }

    #[test]
    fn clock_reports_past_continuations_as_due() {
        let mut clock = Clock::new();
        clock.advance();
        clock.advance();
        clock.schedule_at(1, task(5));

        let (due, _) = clock.pull_due().unwrap();
        assert!(due < clock.tick());
    }

    #[test]
    fn clock_schedules_relative_to_current_tick() {
        let mut clock = Clock::new();
        clock.advance();
        clock.schedule_after(2, task(7));

        clock.advance();
        assert!(clock.pull_due().is_none());
        clock.advance();
        let (due, _) = clock.pull_due().unwrap();
        assert_eq!(due, 3);
    }
}
