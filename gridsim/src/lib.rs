//! A discrete-event simulation kernel for datacenter and distributed systems
//! research.
//!
//! Gridsim models a system as a static topology of *entities* (machines,
//! CPUs, tasks, or any user-defined domain object) connected by *channels*.
//! Any component of the topology can be driven by a *kernel*, a pluggable
//! piece of simulation logic written as plain `async` Rust which suspends at
//! timed waits and message receives and is resumed by a deterministic,
//! reproducible virtual clock.
//!
//! Simulating a system involves three distinct activities:
//!
//! 1. the assembly of a [`Topology`](topology::Topology) from entities and
//!    channels, binding a kernel to every component that must be simulated,
//! 2. the creation of a [`Simulation`](simulation::Simulation), which
//!    resolves every component to its execution context and runs every
//!    kernel to its first suspension point,
//! 3. the execution of the simulation by repeated calls to
//!    [`step()`](simulation::Simulation::step), each advancing the virtual
//!    clock by exactly one tick and firing all continuations now due.
//!
//! # Writing kernels
//!
//! A kernel is an `async` function or closure taking the execution context of
//! its component by value (an [`EntityContext`](context::EntityContext) for
//! nodes, a [`ChannelContext`](context::ChannelContext) for edges). The
//! context is the only surface through which simulation logic touches
//! simulated time, shared entity state and messaging:
//!
//! ```
//! use gridsim::context::EntityContext;
//! use gridsim::kernel::KernelResult;
//! use gridsim::simulation::Simulation;
//! use gridsim::topology::{Entity, Topology};
//!
//! struct Battery;
//! impl Entity for Battery {
//!     type State = u64;
//!     fn initial_state(&self) -> u64 {
//!         100
//!     }
//! }
//!
//! // Discharges the battery by one unit every two ticks.
//! async fn discharge(cx: EntityContext<Battery>) -> KernelResult {
//!     loop {
//!         cx.wait(2).await?;
//!         let charge = cx.state(cx.node());
//!         if charge == 0 {
//!             return Ok(());
//!         }
//!         cx.update(cx.node(), charge - 1);
//!     }
//! }
//!
//! let mut topology = Topology::new();
//! let battery = topology.add_node_with(Battery, discharge);
//!
//! let mut simu = Simulation::new(topology)?;
//! simu.step()?;
//! assert_eq!(simu.state(battery), 100);
//! simu.step()?;
//! assert_eq!(simu.state(battery), 99);
//! # Ok::<(), gridsim::simulation::SimulationError>(())
//! ```
//!
//! # Determinism
//!
//! Execution is single-threaded and cooperative: exactly one kernel runs at
//! any instant and it keeps running until it suspends or terminates, so
//! shared state and mailboxes need no synchronization. All continuations due
//! at tick *T* fire, in scheduling order, strictly before any continuation
//! due at tick *T*+1; a continuation is never skipped and never fires twice.
//! Together with the seeded random utilities used by the provided scheduling
//! policies, this makes any simulation run exactly reproducible. The only
//! legitimate parallelism is running several independent simulations, which
//! share nothing.
//!
//! # Scheduling policies
//!
//! The [`policy`] module ships task ordering policies commonly used in
//! datacenter scheduling research (FIFO, shortest remaining time first,
//! seeded random, HEFT-style upward-rank ordering) implemented as ordinary
//! consumers of the engine contract, together with the matching domain
//! entities in [`workload`] and [`machine`].

#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub(crate) mod channel;
pub mod context;
pub(crate) mod executor;
pub mod kernel;
pub mod machine;
pub mod policy;
pub(crate) mod registry;
pub mod simulation;
pub(crate) mod state;
pub mod time;
pub mod topology;
pub(crate) mod util;
pub mod workload;
