//! Task sorting policies.
//!
//! A sorting policy decides in which order a scheduler kernel offers queued
//! tasks to the machines of the simulated system. Policies are ordinary
//! consumers of the engine contract: they only read entity state and query
//! the topology through the execution context of the scheduler they serve,
//! and add no scheduling-engine machinery of their own.
//!
//! The provided policies match the classic datacenter scheduling baselines:
//! arrival order ([`FifoSortingPolicy`]), shortest remaining time first
//! ([`SrtfSortingPolicy`]), seeded random order ([`RandomSortingPolicy`]) and
//! HEFT-style upward-rank order ([`HeftSortingPolicy`]).

use std::fmt;

use crate::context::EntityContext;
use crate::machine::{Cpu, Machine, CPU_ROLE};
use crate::topology::{Entity, NodeId};
use crate::util::rng::Rng;
use crate::workload::Task;

/// A policy deciding the order in which queued tasks are scheduled.
///
/// The policy is generic over the entity its scheduler kernel is bound to,
/// so any scheduler entity can host any policy, including a boxed one chosen
/// at experiment setup time.
pub trait TaskSortingPolicy<E: Entity>: 'static {
    /// Sorts the provided tasks into scheduling order.
    ///
    /// `machines` lists the machines the scheduler dispatches to; policies
    /// that rank tasks by expected cost average over them, the others ignore
    /// them.
    fn sort(
        &self,
        cx: &EntityContext<E>,
        tasks: Vec<NodeId<Task>>,
        machines: &[NodeId<Machine>],
    ) -> Vec<NodeId<Task>>;
}

impl<E: Entity> TaskSortingPolicy<E> for Box<dyn TaskSortingPolicy<E>> {
    fn sort(
        &self,
        cx: &EntityContext<E>,
        tasks: Vec<NodeId<Task>>,
        machines: &[NodeId<Machine>],
    ) -> Vec<NodeId<Task>> {
        (**self).sort(cx, tasks, machines)
    }
}

/// Sorts tasks by their order of arrival in the queue.
#[derive(Debug, Default)]
pub struct FifoSortingPolicy;

impl FifoSortingPolicy {
    /// Creates a FIFO sorting policy.
    pub fn new() -> Self {
        Self
    }
}

impl<E: Entity> TaskSortingPolicy<E> for FifoSortingPolicy {
    fn sort(
        &self,
        _cx: &EntityContext<E>,
        tasks: Vec<NodeId<Task>>,
        _machines: &[NodeId<Machine>],
    ) -> Vec<NodeId<Task>> {
        tasks
    }
}

/// Sorts tasks by ascending remaining amount of work.
#[derive(Debug, Default)]
pub struct SrtfSortingPolicy;

impl SrtfSortingPolicy {
    /// Creates a shortest-remaining-time-first sorting policy.
    pub fn new() -> Self {
        Self
    }
}

impl<E: Entity> TaskSortingPolicy<E> for SrtfSortingPolicy {
    fn sort(
        &self,
        cx: &EntityContext<E>,
        mut tasks: Vec<NodeId<Task>>,
        _machines: &[NodeId<Machine>],
    ) -> Vec<NodeId<Task>> {
        tasks.sort_by(|a, b| {
            let a = cx.state(*a).remaining;
            let b = cx.state(*b).remaining;
            a.total_cmp(&b)
        });

        tasks
    }
}

/// Sorts tasks into a pseudo-random order.
///
/// The shuffle is driven by a seeded deterministic generator, so a given seed
/// always produces the same schedule and experiments stay reproducible.
pub struct RandomSortingPolicy {
    rng: Rng,
}

impl RandomSortingPolicy {
    /// Creates a random sorting policy with the provided seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Rng::new(seed),
        }
    }
}

impl<E: Entity> TaskSortingPolicy<E> for RandomSortingPolicy {
    fn sort(
        &self,
        _cx: &EntityContext<E>,
        mut tasks: Vec<NodeId<Task>>,
        _machines: &[NodeId<Machine>],
    ) -> Vec<NodeId<Task>> {
        // Fisher-Yates shuffle.
        for i in (1..tasks.len()).rev() {
            let j = self.rng.gen_bounded(i as u64 + 1) as usize;
            tasks.swap(i, j);
        }

        tasks
    }
}

impl fmt::Debug for RandomSortingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomSortingPolicy").finish_non_exhaustive()
    }
}

/// Heterogeneous Earliest Finish Time (HEFT) task ordering.
///
/// Tasks are sorted by descending *upward rank*: the task's average
/// computation cost over all machines, plus the highest dependent cost, where
/// a dependent costs its average communication time plus its own upward rank.
///
/// <https://en.wikipedia.org/wiki/Heterogeneous_earliest_finish_time>
#[derive(Debug, Default)]
pub struct HeftSortingPolicy;

impl HeftSortingPolicy {
    /// Creates a HEFT sorting policy.
    pub fn new() -> Self {
        Self
    }

    /// Average time to run `task` to completion over all machines, each
    /// machine's speed being the core-weighted average clock rate of its
    /// CPUs.
    fn average_computation_cost<E: Entity>(
        cx: &EntityContext<E>,
        task: NodeId<Task>,
        machines: &[NodeId<Machine>],
    ) -> f64 {
        let remaining = cx.state(task).remaining;

        machines
            .iter()
            .map(|&machine| {
                let cpus = cx.destinations::<Cpu>(machine, CPU_ROLE);
                let cores: u32 = cpus
                    .iter()
                    .map(|&cpu| cx.topology().entity(cpu).cores())
                    .sum();
                if cores == 0 {
                    // A machine without CPUs can never run the task.
                    return f64::INFINITY;
                }
                let speed = cpus.iter().fold(0.0, |acc, &cpu| {
                    let cpu = cx.topology().entity(cpu);
                    acc + cpu.clock_rate() * f64::from(cpu.cores())
                }) / f64::from(cores);

                remaining / speed
            })
            .sum::<f64>()
            / machines.len() as f64
    }

    /// Average time to transfer the output feeding `dependent` over all
    /// machines' network interfaces.
    ///
    /// All of the output of the parent task is assumed to be needed as input
    /// for the dependent.
    fn average_communication_cost<E: Entity>(
        cx: &EntityContext<E>,
        dependent: NodeId<Task>,
        machines: &[NodeId<Machine>],
    ) -> f64 {
        let output_size = cx.topology().entity(dependent).output_size();

        machines
            .iter()
            .map(|&machine| output_size / cx.topology().entity(machine).ethernet_speed())
            .sum::<f64>()
            / machines.len() as f64
    }

    /// Upward rank of a task, as defined by the HEFT policy.
    fn upward_rank<E: Entity>(
        cx: &EntityContext<E>,
        task: NodeId<Task>,
        machines: &[NodeId<Machine>],
    ) -> f64 {
        let computation_cost = Self::average_computation_cost(cx, task, machines);
        let highest_dependent_cost = cx
            .topology()
            .entity(task)
            .dependents()
            .iter()
            .map(|&dependent| {
                Self::average_communication_cost(cx, dependent, machines)
                    + Self::upward_rank(cx, dependent, machines)
            })
            .fold(0.0, f64::max);

        computation_cost + highest_dependent_cost
    }
}

impl<E: Entity> TaskSortingPolicy<E> for HeftSortingPolicy {
    fn sort(
        &self,
        cx: &EntityContext<E>,
        mut tasks: Vec<NodeId<Task>>,
        machines: &[NodeId<Machine>],
    ) -> Vec<NodeId<Task>> {
        let mut ranked: Vec<(NodeId<Task>, f64)> = tasks
            .drain(..)
            .map(|task| (task, Self::upward_rank(cx, task, machines)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        ranked.into_iter().map(|(task, _)| task).collect()
    }
}
