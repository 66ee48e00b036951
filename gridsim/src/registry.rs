//! Component resolution.
//!
//! The registry maps each topology component to the execution context of its
//! kernel. Resolution is lazy and memoized: the context of a kernel-bearing
//! component is created exactly once and cached for the lifetime of the
//! simulation, and components without a kernel are cached as not simulated so
//! that repeated resolution never re-creates anything.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::{ChannelContext, EntityContext};
use crate::kernel::{ChannelKernel, EntityKernel, KernelFuture};
use crate::simulation::SimState;
use crate::topology::{Component, EdgeId, Entity, NodeId};

/// The memoized outcome of resolving a component.
pub(crate) enum Resolution {
    /// The component carries a kernel; the type-erased context bound to it.
    Simulated(Rc<dyn Any>),
    /// The component carries no kernel and is skipped by the simulation.
    NotSimulated,
}

impl Clone for Resolution {
    fn clone(&self) -> Self {
        match self {
            Self::Simulated(context) => Self::Simulated(context.clone()),
            Self::NotSimulated => Self::NotSimulated,
        }
    }
}

/// The registry of execution contexts for one simulation.
pub(crate) struct Registry {
    entries: HashMap<Component, Resolution>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Resolves a component to its execution context.
    ///
    /// The first resolution creates and caches the context (or the
    /// not-simulated marker); every further resolution returns the cached
    /// result, so two resolutions of the same component always yield the
    /// identical context handle.
    pub(crate) fn resolve(
        &mut self,
        component: Component,
        shared: &Rc<SimState>,
        launcher: Option<&dyn Launcher>,
    ) -> Resolution {
        if let Some(resolution) = self.entries.get(&component) {
            return resolution.clone();
        }

        let resolution = match launcher {
            Some(launcher) => Resolution::Simulated(launcher.context(shared)),
            None => Resolution::NotSimulated,
        };
        self.entries.insert(component, resolution.clone());

        resolution
    }

    /// Returns the memoized context of a component, if it resolved to one.
    pub(crate) fn context(&self, component: Component) -> Option<Rc<dyn Any>> {
        match self.entries.get(&component) {
            Some(Resolution::Simulated(context)) => Some(context.clone()),
            _ => None,
        }
    }
}

/// Type-erased handle binding a kernel to the component it drives.
///
/// A launcher knows how to build the typed context of its component and, once
/// the context is memoized by the registry, how to start the kernel on it.
pub(crate) trait Launcher {
    /// Creates the typed execution context for this component, type-erased
    /// for memoization.
    fn context(&self, shared: &Rc<SimState>) -> Rc<dyn Any>;

    /// Consumes the kernel and binds it to the memoized context, returning
    /// its execution.
    fn launch(self: Box<Self>, context: Rc<dyn Any>) -> KernelFuture;
}

/// Launcher for a kernel bound to an entity node.
pub(crate) struct EntityLauncher<E: Entity, K: EntityKernel<E>> {
    pub(crate) node: NodeId<E>,
    pub(crate) kernel: K,
}

impl<E: Entity, K: EntityKernel<E>> Launcher for EntityLauncher<E, K> {
    fn context(&self, shared: &Rc<SimState>) -> Rc<dyn Any> {
        Rc::new(EntityContext::new(shared.clone(), self.node))
    }

    fn launch(self: Box<Self>, context: Rc<dyn Any>) -> KernelFuture {
        let context = context
            .downcast::<EntityContext<E>>()
            .expect("the memoized context type does not match the component");

        Box::new(self.kernel).simulate((*context).clone())
    }
}

/// Launcher for a kernel bound to a channel edge.
pub(crate) struct ChannelLauncher<T: 'static, K: ChannelKernel<T>> {
    pub(crate) edge: EdgeId<T>,
    pub(crate) kernel: K,
}

impl<T: 'static, K: ChannelKernel<T>> Launcher for ChannelLauncher<T, K> {
    fn context(&self, shared: &Rc<SimState>) -> Rc<dyn Any> {
        Rc::new(ChannelContext::new(shared.clone(), self.edge))
    }

    fn launch(self: Box<Self>, context: Rc<dyn Any>) -> KernelFuture {
        let context = context
            .downcast::<ChannelContext<T>>()
            .expect("the memoized context type does not match the component");

        Box::new(self.kernel).simulate((*context).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::context::EntityContext;
    use crate::kernel::KernelResult;
    use crate::topology::Topology;

    struct Probe;
    impl Entity for Probe {
        type State = ();
        fn initial_state(&self) {}
    }

    async fn idle(_cx: EntityContext<Probe>) -> KernelResult {
        Ok(())
    }

    #[test]
    fn registry_resolution_is_idempotent() {
        let mut topology = Topology::new();
        let simulated = topology.add_node_with(Probe, idle);
        let plain = topology.add_node(Probe);

        let launchers = topology.take_kernels();
        let shared = Rc::new(SimState::new(topology));
        let mut registry = Registry::new();

        let simulated = Component::Node(simulated.index());
        let plain = Component::Node(plain.index());

        let first = registry.resolve(
            simulated,
            &shared,
            launchers.get(&simulated).map(|l| l.as_ref()),
        );
        let second = registry.resolve(
            simulated,
            &shared,
            launchers.get(&simulated).map(|l| l.as_ref()),
        );
        match (first, second) {
            (Resolution::Simulated(a), Resolution::Simulated(b)) => {
                assert!(Rc::ptr_eq(&a, &b));
            }
            _ => panic!("a kernel-bearing component must resolve to a context"),
        }

        let first = registry.resolve(plain, &shared, launchers.get(&plain).map(|l| l.as_ref()));
        let second = registry.resolve(plain, &shared, launchers.get(&plain).map(|l| l.as_ref()));
        assert!(matches!(first, Resolution::NotSimulated));
        assert!(matches!(second, Resolution::NotSimulated));
    }

    #[test]
    fn registry_context_lookup() {
        let mut topology = Topology::new();
        let simulated = topology.add_node_with(Probe, idle);
        let plain = topology.add_node(Probe);

        let launchers = topology.take_kernels();
        let shared = Rc::new(SimState::new(topology));
        let mut registry = Registry::new();

        let simulated = Component::Node(simulated.index());
        let plain = Component::Node(plain.index());
        registry.resolve(
            simulated,
            &shared,
            launchers.get(&simulated).map(|l| l.as_ref()),
        );
        registry.resolve(plain, &shared, None);

        assert!(registry.context(simulated).is_some());
        assert!(registry.context(plain).is_none());
    }
}
