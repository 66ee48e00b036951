//! Execution contexts for simulation kernels.
//!
//! A context is the only surface through which running simulation logic
//! touches simulated time, shared entity state and messaging. Each
//! kernel-bearing component is bound to exactly one context for the lifetime
//! of the simulation: an [`EntityContext`] for nodes, a [`ChannelContext`]
//! for edges.
//!
//! Contexts own no state themselves. They are cheap cloneable handles
//! mediating access to the simulation's clock, state store and mailboxes:
//!
//! * [`state`](EntityContext::state) reads any entity's current state,
//!   defaulting to its declared initial value,
//! * [`update`](EntityContext::update) replaces an entity's state wholesale,
//! * [`wait`](EntityContext::wait) suspends the calling kernel for a number
//!   of ticks,
//! * [`send`](ChannelContext::send) and [`receive`](ChannelContext::receive)
//!   exchange messages over the channel's mailbox (channel contexts only),
//! * [`topology`](EntityContext::topology) and
//!   [`destinations`](EntityContext::destinations) give read-only access to
//!   the component graph.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::simulation::SimState;
use crate::time::{Continuation, SchedulingError, Tick};
use crate::topology::{EdgeId, Entity, NodeId, NodeIndex, Topology};

/// The execution context of a kernel bound to an entity node.
pub struct EntityContext<E: Entity> {
    shared: Rc<SimState>,
    node: NodeId<E>,
}

impl<E: Entity> EntityContext<E> {
    pub(crate) fn new(shared: Rc<SimState>, node: NodeId<E>) -> Self {
        Self { shared, node }
    }

    /// Returns the handle of the entity node this context is bound to.
    pub fn node(&self) -> NodeId<E> {
        self.node
    }

    /// Returns the current simulation tick.
    pub fn tick(&self) -> Tick {
        self.shared.clock.borrow().tick()
    }

    /// Returns a read-only view of the simulated topology.
    pub fn topology(&self) -> &Topology {
        &self.shared.topology
    }

    /// Returns the current state of an entity.
    ///
    /// If the entity was never updated, its declared initial state is
    /// returned. The returned value is a clone: it is never affected by later
    /// updates.
    pub fn state<F: Entity>(&self, node: NodeId<F>) -> F::State {
        let entity = self.shared.topology.entity(node);

        self.shared.states.borrow_mut().read(node, entity)
    }

    /// Replaces the state of an entity.
    ///
    /// The new value completely supersedes the old one and is visible to all
    /// subsequent reads from any context.
    pub fn update<F: Entity>(&self, node: NodeId<F>, next: F::State) {
        self.shared.states.borrow_mut().replace(node, next);
    }

    /// Suspends the calling kernel for the provided number of ticks.
    ///
    /// The kernel resumes at the step that moves the clock to the tick at
    /// which `wait` was invoked plus `ticks`. A zero-tick wait resolves to
    /// [`SchedulingError::NullWaitDuration`] without suspending.
    pub fn wait(&self, ticks: Tick) -> Wait {
        Wait::new(self.shared.clone(), ticks)
    }

    /// Returns the neighbors reachable from a node over edges with the
    /// requested role, keeping only those hosting an entity of type `F`.
    pub fn destinations<F: Entity>(
        &self,
        node: impl Into<NodeIndex>,
        role: &str,
    ) -> Vec<NodeId<F>> {
        self.shared.topology.destinations(node, role)
    }
}

impl<E: Entity> Clone for EntityContext<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            node: self.node,
        }
    }
}

impl<E: Entity> fmt::Debug for EntityContext<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityContext")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// The execution context of a kernel bound to a channel edge.
///
/// On top of the operations shared with [`EntityContext`], a channel context
/// gives access to the channel's mailbox: [`send`](ChannelContext::send)
/// enqueues a message without suspending, [`receive`](ChannelContext::receive)
/// suspends until a message is available.
///
/// # Examples
///
/// A channel kernel that records the first delivered message on its target
/// endpoint:
///
/// ```
/// use gridsim::context::ChannelContext;
/// use gridsim::simulation::Simulation;
/// use gridsim::topology::{Entity, Topology};
///
/// struct Endpoint;
/// impl Entity for Endpoint {
///     type State = Option<String>;
///     fn initial_state(&self) -> Option<String> {
///         None
///     }
/// }
///
/// let mut topology = Topology::new();
/// let a = topology.add_node(Endpoint);
/// let b = topology.add_node(Endpoint);
/// topology.connect_with(a, b, "link", move |cx: ChannelContext<String>| async move {
///     cx.send("ping".to_string(), a);
///     let message = cx.receive(|message, _sender| message).await;
///     cx.update(b, Some(message));
///     Ok(())
/// });
///
/// let simu = Simulation::new(topology)?;
/// assert_eq!(simu.state(b), Some("ping".to_string()));
/// # Ok::<(), gridsim::simulation::SimulationError>(())
/// ```
pub struct ChannelContext<T: 'static> {
    shared: Rc<SimState>,
    edge: EdgeId<T>,
}

impl<T: 'static> ChannelContext<T> {
    pub(crate) fn new(shared: Rc<SimState>, edge: EdgeId<T>) -> Self {
        Self { shared, edge }
    }

    /// Returns the handle of the channel edge this context is bound to.
    pub fn edge(&self) -> EdgeId<T> {
        self.edge
    }

    /// Returns the source and target nodes of the channel.
    pub fn endpoints(&self) -> (NodeIndex, NodeIndex) {
        self.shared.topology.endpoints(self.edge)
    }

    /// Returns the current simulation tick.
    pub fn tick(&self) -> Tick {
        self.shared.clock.borrow().tick()
    }

    /// Returns a read-only view of the simulated topology.
    pub fn topology(&self) -> &Topology {
        &self.shared.topology
    }

    /// Returns the current state of an entity.
    ///
    /// If the entity was never updated, its declared initial state is
    /// returned.
    pub fn state<F: Entity>(&self, node: NodeId<F>) -> F::State {
        let entity = self.shared.topology.entity(node);

        self.shared.states.borrow_mut().read(node, entity)
    }

    /// Replaces the state of an entity.
    pub fn update<F: Entity>(&self, node: NodeId<F>, next: F::State) {
        self.shared.states.borrow_mut().replace(node, next);
    }

    /// Suspends the calling kernel for the provided number of ticks.
    pub fn wait(&self, ticks: Tick) -> Wait {
        Wait::new(self.shared.clone(), ticks)
    }

    /// Returns the neighbors reachable from a node over edges with the
    /// requested role, keeping only those hosting an entity of type `F`.
    pub fn destinations<F: Entity>(
        &self,
        node: impl Into<NodeIndex>,
        role: &str,
    ) -> Vec<NodeId<F>> {
        self.shared.topology.destinations(node, role)
    }

    /// Enqueues a message into the channel's mailbox, tagged with the
    /// identity of its sender.
    ///
    /// Sending never blocks: the message is enqueued immediately and the
    /// calling kernel keeps running. If a kernel is suspended on a receive
    /// from this channel, exactly one such kernel is woken and resumes after
    /// the sender next yields.
    pub fn send(&self, message: T, sender: impl Into<NodeIndex>) {
        let woken = self.shared.mailboxes.borrow_mut().push(
            self.edge.index(),
            Box::new(message),
            sender.into(),
        );
        if let Some(task) = woken {
            self.shared.ready.borrow_mut().push_back(task);
        }
    }

    /// Suspends the calling kernel until exactly one message is available in
    /// the channel's mailbox, then resolves to the handler's result.
    ///
    /// The handler is invoked with the message and the identity of its
    /// sender. Messages are delivered in sending order and each delivery
    /// resumes at most one waiting kernel. A kernel receiving on a channel
    /// into which nothing is ever sent never resumes.
    pub fn receive<R, F>(&self, handler: F) -> Receive<T, R, F>
    where
        F: FnOnce(T, NodeIndex) -> R,
    {
        Receive {
            shared: self.shared.clone(),
            edge: self.edge,
            handler: Some(handler),
            waiting: None,
            _result: PhantomData,
        }
    }
}

impl<T: 'static> Clone for ChannelContext<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            edge: self.edge,
        }
    }
}

impl<T: 'static> fmt::Debug for ChannelContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelContext")
            .field("edge", &self.edge)
            .finish_non_exhaustive()
    }
}

/// Future returned by [`EntityContext::wait`] and [`ChannelContext::wait`].
///
/// Resolves to `Ok(())` at the step that moves the clock to the due tick, or
/// immediately to `Err(SchedulingError::NullWaitDuration)` for a zero-tick
/// wait.
#[must_use = "futures do nothing unless polled"]
pub struct Wait {
    shared: Rc<SimState>,
    ticks: Tick,
    state: WaitState,
}

enum WaitState {
    Unscheduled,
    Scheduled { due: Tick },
    Complete,
}

impl Wait {
    fn new(shared: Rc<SimState>, ticks: Tick) -> Self {
        Self {
            shared,
            ticks,
            state: WaitState::Unscheduled,
        }
    }
}

impl Future for Wait {
    type Output = Result<(), SchedulingError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match this.state {
            WaitState::Unscheduled => {
                if this.ticks == 0 {
                    this.state = WaitState::Complete;
                    return Poll::Ready(Err(SchedulingError::NullWaitDuration));
                }
                let task = this
                    .shared
                    .current
                    .get()
                    .expect("`wait` must be awaited from within a kernel task");
                let mut clock = this.shared.clock.borrow_mut();
                let due = clock.tick() + this.ticks;
                clock.schedule_at(due, Continuation::Resume(task));
                this.state = WaitState::Scheduled { due };

                Poll::Pending
            }
            WaitState::Scheduled { due } => {
                if this.shared.clock.borrow().tick() >= due {
                    this.state = WaitState::Complete;
                    Poll::Ready(Ok(()))
                } else {
                    Poll::Pending
                }
            }
            WaitState::Complete => panic!("`Wait` polled after completion"),
        }
    }
}

impl fmt::Debug for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

/// Future returned by [`ChannelContext::receive`].
///
/// Resolves to the handler's result once a message is delivered.
#[must_use = "futures do nothing unless polled"]
pub struct Receive<T: 'static, R, F>
where
    F: FnOnce(T, NodeIndex) -> R,
{
    shared: Rc<SimState>,
    edge: EdgeId<T>,
    handler: Option<F>,
    waiting: Option<crate::executor::TaskId>,
    _result: PhantomData<fn() -> R>,
}

// No field is structurally pinned.
impl<T: 'static, R, F> Unpin for Receive<T, R, F> where F: FnOnce(T, NodeIndex) -> R {}

impl<T: 'static, R, F> Future for Receive<T, R, F>
where
    F: FnOnce(T, NodeIndex) -> R,
{
    type Output = R;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let task = this
            .shared
            .current
            .get()
            .expect("`receive` must be awaited from within a kernel task");

        let envelope = this.shared.mailboxes.borrow_mut().try_pop(this.edge.index());
        match envelope {
            Some(envelope) => {
                if let Some(task) = this.waiting.take() {
                    this.shared
                        .mailboxes
                        .borrow_mut()
                        .delist(this.edge.index(), task);
                }
                let message = envelope
                    .message
                    .downcast::<T>()
                    .expect("the mailbox message type does not match the channel handle");
                let handler = this
                    .handler
                    .take()
                    .expect("`Receive` polled after completion");

                Poll::Ready((handler)(*message, envelope.sender))
            }
            None => {
                if this.waiting.is_none() {
                    this.shared
                        .mailboxes
                        .borrow_mut()
                        .enlist(this.edge.index(), task);
                    this.waiting = Some(task);
                }

                Poll::Pending
            }
        }
    }
}

impl<T: 'static, R, F> Drop for Receive<T, R, F>
where
    F: FnOnce(T, NodeIndex) -> R,
{
    fn drop(&mut self) {
        // A receive abandoned before delivery must not leave a stale waiter
        // behind, or a later message would wake a task that no longer polls
        // this mailbox instead of an actual receiver.
        if let Some(task) = self.waiting.take() {
            self.shared
                .mailboxes
                .borrow_mut()
                .delist(self.edge.index(), task);
        }
    }
}

impl<T: 'static, R, F> fmt::Debug for Receive<T, R, F>
where
    F: FnOnce(T, NodeIndex) -> R,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receive")
            .field("edge", &self.edge)
            .finish_non_exhaustive()
    }
}
