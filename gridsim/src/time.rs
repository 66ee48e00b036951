//! Simulation time and scheduling.
//!
//! This module provides most notably:
//!
//! * [`Tick`]: the unit of simulated time, a plain non-negative integer,
//! * [`SchedulingError`]: the error reported when simulation logic requests a
//!   zero-tick wait.
//!
//! Simulated time has no relation to wall-clock time: a simulation always
//! runs as fast as possible and is fully reproducible for a given topology.

mod clock;

pub use clock::{SchedulingError, Tick};

pub(crate) use clock::{Clock, Continuation};
