//! Discrete-event simulation management.
//!
//! This module contains the [`Simulation`] driver. A simulation is created
//! from a fully assembled [`Topology`]: construction resolves every component
//! to its execution context and launches every kernel task, each running to
//! its first suspension point. The simulation is then advanced one tick at a
//! time with [`step`](Simulation::step), typically in a loop guarded by
//! [`has_next`](Simulation::has_next), or a fixed number of times for
//! bounded-duration experiments.
//!
//! # Stepping semantics
//!
//! Each step increments the virtual clock by exactly one tick and then fires
//! every continuation now due, in due-tick order with stable same-tick
//! ordering. Kernels resumed by a continuation run uninterrupted until they
//! suspend again or terminate; kernels they wake up through a message
//! delivery run within the same step. A continuation found overdue (its due
//! tick lies strictly in the past) is reported as a scheduling anomaly
//! through a `tracing` warning and executed anyway, since dropping it would
//! corrupt the simulated causal order.
//!
//! # Fault handling
//!
//! Kernel faults are not isolated: a kernel that returns an error or panics
//! aborts the step, the error identifies the offending component, and the
//! simulation is poisoned. There is no way to resume a poisoned simulation
//! because the faulting kernel may have left shared entity state
//! half-updated.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::channel::MailboxSet;
use crate::executor::{Executor, TaskId};
use crate::kernel::KernelError;
use crate::registry::Registry;
use crate::state::StateStore;
use crate::time::{Clock, Continuation, Tick};
use crate::topology::{Component, Entity, NodeId, Topology};

/// State shared between the driver, the executor and all execution contexts.
///
/// Everything in here is mutated exclusively from within the single
/// cooperative execution context, so plain interior mutability is sufficient
/// and no locking exists.
pub(crate) struct SimState {
    pub(crate) topology: Topology,
    pub(crate) clock: RefCell<Clock>,
    pub(crate) states: RefCell<StateStore>,
    pub(crate) mailboxes: RefCell<MailboxSet>,
    /// Tasks ready to be polled by the executor.
    pub(crate) ready: RefCell<VecDeque<TaskId>>,
    /// The task currently being polled, if any.
    pub(crate) current: Cell<Option<TaskId>>,
}

impl SimState {
    pub(crate) fn new(topology: Topology) -> Self {
        Self {
            topology,
            clock: RefCell::new(Clock::new()),
            states: RefCell::new(StateStore::new()),
            mailboxes: RefCell::new(MailboxSet::new()),
            ready: RefCell::new(VecDeque::new()),
            current: Cell::new(None),
        }
    }
}

/// Simulation environment.
///
/// A `Simulation` is created from a [`Topology`] with [`Simulation::new`],
/// which launches all kernel tasks. Driving code then advances the virtual
/// clock with [`step`](Simulation::step) and observes entity state with
/// [`state`](Simulation::state).
///
/// # Examples
///
/// ```
/// use gridsim::context::EntityContext;
/// use gridsim::kernel::KernelResult;
/// use gridsim::simulation::Simulation;
/// use gridsim::topology::{Entity, Topology};
///
/// struct Sensor;
/// impl Entity for Sensor {
///     type State = &'static str;
///     fn initial_state(&self) -> &'static str {
///         "idle"
///     }
/// }
///
/// async fn measure(cx: EntityContext<Sensor>) -> KernelResult {
///     cx.wait(3).await?;
///     cx.update(cx.node(), "done");
///     Ok(())
/// }
///
/// let mut topology = Topology::new();
/// let sensor = topology.add_node_with(Sensor, measure);
///
/// let mut simu = Simulation::new(topology)?;
/// simu.step()?;
/// simu.step()?;
/// assert_eq!(simu.state(sensor), "idle");
/// simu.step()?;
/// assert_eq!(simu.state(sensor), "done");
/// assert!(!simu.has_next());
/// # Ok::<(), gridsim::simulation::SimulationError>(())
/// ```
pub struct Simulation {
    shared: Rc<SimState>,
    executor: Executor,
    // Kept alive so that memoized contexts share the simulation's lifetime.
    #[allow(dead_code)]
    registry: Registry,
    aborted: bool,
}

impl Simulation {
    /// Creates a simulation over the provided topology and launches all
    /// kernel tasks.
    ///
    /// Every component is resolved through the registry by walking each node
    /// and its outgoing edges; every kernel-bearing component then gets its
    /// kernel task launched, each running until its first suspension point or
    /// completion. An error is returned if a kernel faults during launch.
    pub fn new(mut topology: Topology) -> Result<Self, SimulationError> {
        let mut launchers = topology.take_kernels();
        let shared = Rc::new(SimState::new(topology));

        let mut registry = Registry::new();
        for component in shared.topology.components() {
            registry.resolve(
                component,
                &shared,
                launchers.get(&component).map(|launcher| launcher.as_ref()),
            );
        }

        let mut executor = Executor::new();
        let components: Vec<Component> = shared.topology.components().collect();
        for component in components {
            if let Some(launcher) = launchers.remove(&component) {
                let context = registry
                    .context(component)
                    .expect("a kernel-bearing component must resolve to a context");
                debug!(%component, "launching kernel task");
                executor.spawn(&shared, component, launcher.launch(context));
            }
        }

        let mut simulation = Self {
            shared,
            executor,
            registry,
            aborted: false,
        };
        if let Err(error) = simulation.executor.run(&simulation.shared) {
            simulation.aborted = true;
            return Err(error);
        }

        Ok(simulation)
    }

    /// Returns the current simulation tick.
    pub fn tick(&self) -> Tick {
        self.shared.clock.borrow().tick()
    }

    /// Returns `true` while at least one continuation is pending.
    ///
    /// Kernels suspended on a message that never comes do not count as
    /// pending work: if the last pending continuation belongs to such a
    /// kernel's channel, the simulation halts with the kernel suspended
    /// forever.
    pub fn has_next(&self) -> bool {
        !self.aborted && self.shared.clock.borrow().has_pending()
    }

    /// Advances the clock by exactly one tick and runs every continuation now
    /// due.
    ///
    /// Continuations fire in due-tick order; continuations due at the same
    /// tick fire in scheduling order. The step fails if a kernel faults or
    /// panics, after which the simulation is poisoned and every further call
    /// reports [`SimulationError::Aborted`].
    pub fn step(&mut self) -> Result<(), SimulationError> {
        if self.aborted {
            return Err(SimulationError::Aborted);
        }

        let now = self.shared.clock.borrow_mut().advance();
        loop {
            let due = self.shared.clock.borrow_mut().pull_due();
            let Some((due_tick, continuation)) = due else {
                break;
            };
            if due_tick < now {
                warn!(
                    due_tick,
                    current_tick = now,
                    "continuation fired after its due tick"
                );
            }
            match continuation {
                Continuation::Resume(task) => {
                    self.shared.ready.borrow_mut().push_back(task);
                }
                Continuation::Invoke(callback) => callback(),
            }
            if let Err(error) = self.executor.run(&self.shared) {
                self.aborted = true;
                return Err(error);
            }
        }

        Ok(())
    }

    /// Steps the simulation until no continuation is pending.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        while self.has_next() {
            self.step()?;
        }

        Ok(())
    }

    /// Schedules a callback to run at the provided tick.
    ///
    /// There is no constraint that the tick lie in the future: a callback
    /// scheduled for a past tick fires at the next step and is reported as a
    /// scheduling anomaly.
    pub fn schedule_at(&mut self, tick: Tick, callback: impl FnOnce() + 'static) {
        self.shared
            .clock
            .borrow_mut()
            .schedule_at(tick, Continuation::Invoke(Box::new(callback)));
    }

    /// Schedules a callback to run the provided number of ticks after the
    /// current tick.
    pub fn schedule_after(&mut self, delay: Tick, callback: impl FnOnce() + 'static) {
        self.shared
            .clock
            .borrow_mut()
            .schedule_after(delay, Continuation::Invoke(Box::new(callback)));
    }

    /// Returns a read-only view of the simulated topology.
    pub fn topology(&self) -> &Topology {
        &self.shared.topology
    }

    /// Returns the current state of an entity.
    ///
    /// If the entity was never updated, its declared initial state is
    /// returned. This is the observation hook for experiment code; it never
    /// disturbs the simulation.
    pub fn state<E: Entity>(&self, node: NodeId<E>) -> E::State {
        let entity = self.shared.topology.entity(node);

        self.shared.states.borrow_mut().read(node, entity)
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick())
            .field("aborted", &self.aborted)
            .finish_non_exhaustive()
    }
}

/// Error returned when a simulation cannot make progress.
pub enum SimulationError {
    /// A kernel task returned an unrecoverable fault.
    KernelFault {
        /// The component whose kernel faulted.
        component: Component,
        /// The fault reported by the kernel.
        fault: KernelError,
    },
    /// A kernel task panicked.
    KernelPanic {
        /// The component whose kernel panicked.
        component: Component,
        /// The panic payload.
        payload: Box<dyn Any + Send + 'static>,
    },
    /// The simulation was poisoned by an earlier kernel failure.
    Aborted,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KernelFault { component, fault } => {
                write!(fmt, "the kernel bound to {component} faulted: {fault}")
            }
            Self::KernelPanic { component, .. } => {
                write!(fmt, "the kernel bound to {component} panicked")
            }
            Self::Aborted => {
                write!(fmt, "the simulation was aborted by an earlier kernel failure")
            }
        }
    }
}

impl fmt::Debug for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KernelFault { component, fault } => f
                .debug_struct("KernelFault")
                .field("component", component)
                .field("fault", fault)
                .finish(),
            Self::KernelPanic { component, .. } => f
                .debug_struct("KernelPanic")
                .field("component", component)
                .finish_non_exhaustive(),
            Self::Aborted => f.debug_struct("Aborted").finish(),
        }
    }
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::KernelFault { fault, .. } => Some(fault.as_ref()),
            _ => None,
        }
    }
}
