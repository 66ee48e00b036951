//! Kernel contract.
//!
//! A kernel is the pluggable simulation logic bound to a single topology
//! component. It is a suspendable procedure: given the context of its
//! component, it runs until completion or indefinitely, suspending at every
//! `wait` or `receive` point and resuming when the clock or a mailbox
//! satisfies the suspension.
//!
//! Kernels are usually written as plain `async` functions or closures taking
//! the context by value; the blanket implementations below turn those into
//! [`EntityKernel`] and [`ChannelKernel`] implementations:
//!
//! ```
//! use gridsim::context::EntityContext;
//! use gridsim::kernel::KernelResult;
//! use gridsim::topology::{Entity, Topology};
//!
//! struct Counter;
//! impl Entity for Counter {
//!     type State = u64;
//!     fn initial_state(&self) -> u64 {
//!         0
//!     }
//! }
//!
//! async fn count(cx: EntityContext<Counter>) -> KernelResult {
//!     loop {
//!         cx.wait(1).await?;
//!         let n = cx.state(cx.node());
//!         cx.update(cx.node(), n + 1);
//!     }
//! }
//!
//! let mut topology = Topology::new();
//! topology.add_node_with(Counter, count);
//! ```
//!
//! A kernel terminates by returning `Ok(())`, or faults by returning an
//! error. Faults are not isolated per kernel: they abort the whole simulation
//! run, because the faulting kernel may have left shared state half-updated.

use std::error::Error;
use std::future::Future;
use std::pin::Pin;

use crate::context::{ChannelContext, EntityContext};
use crate::topology::Entity;

/// An unrecoverable fault raised by a kernel.
pub type KernelError = Box<dyn Error + 'static>;

/// The outcome of a kernel's execution.
pub type KernelResult = Result<(), KernelError>;

/// A boxed kernel execution, suspended and resumed by the simulation.
///
/// Kernel futures are not `Send`: a simulation is a single cooperative
/// execution context and its tasks never migrate between threads.
pub type KernelFuture = Pin<Box<dyn Future<Output = KernelResult> + 'static>>;

/// Simulation logic bound to an entity node.
///
/// `simulate` consumes the kernel: a kernel task is started exactly once and
/// is never recreated.
pub trait EntityKernel<E: Entity>: 'static {
    /// Binds this kernel to its entity context and returns its execution.
    fn simulate(self: Box<Self>, cx: EntityContext<E>) -> KernelFuture;
}

impl<E, F, Fut> EntityKernel<E> for F
where
    E: Entity,
    F: FnOnce(EntityContext<E>) -> Fut + 'static,
    Fut: Future<Output = KernelResult> + 'static,
{
    fn simulate(self: Box<Self>, cx: EntityContext<E>) -> KernelFuture {
        Box::pin((self)(cx))
    }
}

/// Simulation logic bound to a channel edge.
pub trait ChannelKernel<T: 'static>: 'static {
    /// Binds this kernel to its channel context and returns its execution.
    fn simulate(self: Box<Self>, cx: ChannelContext<T>) -> KernelFuture;
}

impl<T, F, Fut> ChannelKernel<T> for F
where
    T: 'static,
    F: FnOnce(ChannelContext<T>) -> Fut + 'static,
    Fut: Future<Output = KernelResult> + 'static,
{
    fn simulate(self: Box<Self>, cx: ChannelContext<T>) -> KernelFuture {
        Box::pin((self)(cx))
    }
}
