//! Single-threaded cooperative executor for kernel tasks.

use std::panic::{self, AssertUnwindSafe};
use std::task::{Context, Poll};

use futures_task::noop_waker_ref;
use slab::Slab;
use tracing::trace;

use crate::kernel::KernelFuture;
use crate::simulation::{SimState, SimulationError};
use crate::topology::Component;

/// Identifier of a kernel task within an executor.
pub(crate) type TaskId = usize;

/// One kernel's suspendable execution.
struct Task {
    future: KernelFuture,
    component: Component,
}

/// A single-threaded executor driving kernel tasks.
///
/// Execution is strictly cooperative: exactly one task runs at any instant
/// and it keeps running until it suspends or terminates. Tasks are resumed by
/// identifier through the simulation's ready queue, never through their
/// waker, so the waker handed to polled futures is inert. This is sufficient
/// because every legitimate wake-up source, the clock and the mailboxes, is
/// owned by the engine itself.
pub(crate) struct Executor {
    tasks: Slab<Task>,
}

impl Executor {
    /// Creates an executor with no tasks.
    pub(crate) fn new() -> Self {
        Self { tasks: Slab::new() }
    }

    /// Registers a kernel task and marks it ready for its first run.
    ///
    /// The task is not polled until [`run`](Executor::run) is called.
    pub(crate) fn spawn(
        &mut self,
        shared: &SimState,
        component: Component,
        future: KernelFuture,
    ) -> TaskId {
        let id = self.tasks.insert(Task { future, component });
        shared.ready.borrow_mut().push_back(id);

        id
    }

    /// Polls ready tasks until none is left.
    ///
    /// Each task runs uninterrupted until it suspends or terminates; tasks it
    /// wakes up in the process are appended to the ready queue and run within
    /// the same call. A kernel fault or panic aborts the run immediately and
    /// is reported with the identity of the offending component.
    pub(crate) fn run(&mut self, shared: &SimState) -> Result<(), SimulationError> {
        loop {
            let id = shared.ready.borrow_mut().pop_front();
            let Some(id) = id else {
                return Ok(());
            };
            // A task woken after termination has no entry anymore.
            let Some(task) = self.tasks.get_mut(id) else {
                continue;
            };

            let mut cx = Context::from_waker(noop_waker_ref());
            shared.current.set(Some(id));
            let polled = panic::catch_unwind(AssertUnwindSafe(|| task.future.as_mut().poll(&mut cx)));
            shared.current.set(None);

            match polled {
                Ok(Poll::Pending) => {}
                Ok(Poll::Ready(Ok(()))) => {
                    let task = self.tasks.remove(id);
                    trace!(component = %task.component, "kernel task terminated");
                }
                Ok(Poll::Ready(Err(fault))) => {
                    let task = self.tasks.remove(id);
                    return Err(SimulationError::KernelFault {
                        component: task.component,
                        fault,
                    });
                }
                Err(payload) => {
                    let task = self.tasks.remove(id);
                    return Err(SimulationError::KernelPanic {
                        component: task.component,
                        payload,
                    });
                }
            }
        }
    }
}
