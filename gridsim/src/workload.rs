//! Workload entities.

use crate::topology::{Entity, NodeId};

/// A unit of work submitted to the simulated system.
///
/// A task carries its immutable attributes: the total amount of work it
/// represents, the size of the output it hands to its dependents and the
/// tasks that depend on it. The amount of work still to be done is part of
/// the task's observable state and shrinks as machines execute it.
pub struct Task {
    total_work: f64,
    output_size: f64,
    dependents: Vec<NodeId<Task>>,
}

impl Task {
    /// Creates a task with the provided total amount of work (in flops) and
    /// output size (in bytes), without dependents.
    pub fn new(total_work: f64, output_size: f64) -> Self {
        Self {
            total_work,
            output_size,
            dependents: Vec::new(),
        }
    }

    /// Returns the total amount of work of this task, in flops.
    pub fn total_work(&self) -> f64 {
        self.total_work
    }

    /// Returns the size of this task's output, in bytes.
    pub fn output_size(&self) -> f64 {
        self.output_size
    }

    /// Returns the tasks that depend on this task's output.
    pub fn dependents(&self) -> &[NodeId<Task>] {
        &self.dependents
    }

    /// Registers a task as depending on this task's output.
    ///
    /// Dependencies are wired while the topology is being assembled, through
    /// [`Topology::entity_mut`](crate::topology::Topology::entity_mut).
    pub fn add_dependent(&mut self, dependent: NodeId<Task>) {
        self.dependents.push(dependent);
    }
}

impl Entity for Task {
    type State = TaskState;

    fn initial_state(&self) -> TaskState {
        TaskState {
            remaining: self.total_work,
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("total_work", &self.total_work)
            .field("output_size", &self.output_size)
            .field("dependents", &self.dependents.len())
            .finish()
    }
}

/// The observable state of a [`Task`].
#[derive(Clone, Debug, PartialEq)]
pub struct TaskState {
    /// The amount of work still to be done, in flops.
    pub remaining: f64,
}

impl TaskState {
    /// Returns `true` once no work remains.
    pub fn is_finished(&self) -> bool {
        self.remaining <= 0.0
    }
}
