//! Shared entity state store.

use std::any::Any;
use std::collections::HashMap;

use crate::topology::{Entity, NodeId, NodeIndex};

/// The mapping from entities to their current state.
///
/// Entries are created lazily with the entity's declared initial value on
/// first read and live until the simulation is discarded. Updates replace the
/// previous value wholesale and reads return clones, so a state value handed
/// out to simulation logic can never be aliased by a later update.
#[derive(Default)]
pub(crate) struct StateStore {
    entries: HashMap<NodeIndex, Box<dyn Any>>,
}

impl StateStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the entity's current state, initializing the entry
    /// from the entity's declared initial value if it was never written.
    pub(crate) fn read<E: Entity>(&mut self, node: NodeId<E>, entity: &E) -> E::State {
        self.entries
            .entry(node.index())
            .or_insert_with(|| Box::new(entity.initial_state()))
            .downcast_ref::<E::State>()
            .expect("the stored state type does not match the node handle")
            .clone()
    }

    /// Replaces the entity's state with a new value.
    pub(crate) fn replace<E: Entity>(&mut self, node: NodeId<E>, next: E::State) {
        self.entries.insert(node.index(), Box::new(next));
    }
}
