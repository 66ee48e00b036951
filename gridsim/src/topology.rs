//! Topology components.
//!
//! A simulation runs over a static, read-only graph of *nodes* and *edges*.
//! Each node hosts an [`Entity`], a domain object with a declared state type
//! and initial state. Each edge is a directed channel between two nodes,
//! typed by the messages it carries and labeled with a role used for
//! capability-filtered neighbor queries.
//!
//! Nodes and edges may optionally carry a kernel, the pluggable simulation
//! logic that drives them (see the [`kernel`](crate::kernel) module).
//! Components without a kernel are part of the graph but are not simulated.
//!
//! # Typed handles
//!
//! [`Topology::add_node`] and [`Topology::connect`] return the typed handles
//! [`NodeId`] and [`EdgeId`]. A handle ties the component's identity to its
//! entity or message type, so state reads, state updates and message
//! exchanges are statically typed; no casting is ever needed on the user
//! side.
//!
//! # Examples
//!
//! A machine with two CPUs, discoverable through the `"cpu"` role:
//!
//! ```
//! use gridsim::machine::{Cpu, Machine, CPU_ROLE};
//! use gridsim::topology::Topology;
//!
//! let mut topology = Topology::new();
//! let machine = topology.add_node(Machine::new(10e9));
//! let cpu1 = topology.add_node(Cpu::new(2.4e9, 4));
//! let cpu2 = topology.add_node(Cpu::new(3.2e9, 2));
//! topology.connect::<()>(machine, cpu1, CPU_ROLE);
//! topology.connect::<()>(machine, cpu2, CPU_ROLE);
//!
//! let cpus = topology.destinations::<Cpu>(machine, CPU_ROLE);
//! assert_eq!(cpus.len(), 2);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::kernel::{ChannelKernel, EntityKernel};
use crate::registry::{ChannelLauncher, EntityLauncher, Launcher};

/// A simulated domain object hosted by a topology node.
///
/// An entity declares the type of its observable state and its initial value.
/// The state itself lives in the simulation's state store, not in the entity:
/// the entity value only carries immutable attributes (capacities, speeds,
/// structural links) that simulation logic may consult through the topology.
pub trait Entity: 'static {
    /// The observable state of this entity.
    type State: Clone + 'static;

    /// Returns the state of this entity before any update.
    fn initial_state(&self) -> Self::State;
}

/// Untyped identity of a topology node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

/// Untyped identity of a topology edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIndex(pub(crate) usize);

impl fmt::Display for EdgeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel #{}", self.0)
    }
}

/// Identity of a topology component, either a node or an edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    /// A node hosting an entity.
    Node(NodeIndex),
    /// An edge connecting two nodes.
    Edge(EdgeIndex),
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(node) => node.fmt(f),
            Self::Edge(edge) => edge.fmt(f),
        }
    }
}

/// Typed handle to a topology node hosting an entity of type `E`.
///
/// Handles are cheap to copy and can only be obtained from
/// [`Topology::add_node`], [`Topology::add_node_with`] or a capability query
/// such as [`Topology::destinations`], which guarantees that the entity type
/// parameter always matches the hosted entity.
pub struct NodeId<E: Entity> {
    index: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> NodeId<E> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _entity: PhantomData,
        }
    }

    /// Returns the untyped identity of this node.
    pub fn index(&self) -> NodeIndex {
        NodeIndex(self.index)
    }
}

impl<E: Entity> Clone for NodeId<E> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<E: Entity> Copy for NodeId<E> {}
impl<E: Entity> PartialEq for NodeId<E> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl<E: Entity> Eq for NodeId<E> {}
impl<E: Entity> Hash for NodeId<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}
impl<E: Entity> PartialOrd for NodeId<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<E: Entity> Ord for NodeId<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}
impl<E: Entity> fmt::Debug for NodeId<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&self.index).finish()
    }
}

impl<E: Entity> From<NodeId<E>> for NodeIndex {
    fn from(id: NodeId<E>) -> Self {
        id.index()
    }
}

/// Typed handle to a topology edge carrying messages of type `T`.
pub struct EdgeId<T: 'static> {
    index: usize,
    _message: PhantomData<fn() -> T>,
}

impl<T: 'static> EdgeId<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _message: PhantomData,
        }
    }

    /// Returns the untyped identity of this edge.
    pub fn index(&self) -> EdgeIndex {
        EdgeIndex(self.index)
    }
}

impl<T: 'static> Clone for EdgeId<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: 'static> Copy for EdgeId<T> {}
impl<T: 'static> PartialEq for EdgeId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}
impl<T: 'static> Eq for EdgeId<T> {}
impl<T: 'static> Hash for EdgeId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}
impl<T: 'static> PartialOrd for EdgeId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T: 'static> Ord for EdgeId<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}
impl<T: 'static> fmt::Debug for EdgeId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EdgeId").field(&self.index).finish()
    }
}

impl<T: 'static> From<EdgeId<T>> for EdgeIndex {
    fn from(id: EdgeId<T>) -> Self {
        id.index()
    }
}

struct NodeSlot {
    entity: Box<dyn Any>,
    kernel: Option<Box<dyn Launcher>>,
    outgoing: Vec<usize>,
}

struct EdgeSlot {
    source: NodeIndex,
    target: NodeIndex,
    role: String,
    kernel: Option<Box<dyn Launcher>>,
}

/// The static graph of simulated entities and channels.
///
/// A topology is assembled once, before the simulation is created, and is
/// read-only afterwards. Nodes and edges are added with [`add_node`] and
/// [`connect`]; the `_with` variants additionally bind a kernel to the
/// component.
///
/// [`add_node`]: Topology::add_node
/// [`connect`]: Topology::connect
#[derive(Default)]
pub struct Topology {
    nodes: Vec<NodeSlot>,
    edges: Vec<EdgeSlot>,
}

impl Topology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node hosting the provided entity, without simulation logic.
    pub fn add_node<E: Entity>(&mut self, entity: E) -> NodeId<E> {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeSlot {
            entity: Box::new(entity),
            kernel: None,
            outgoing: Vec::new(),
        });

        id
    }

    /// Adds a node hosting the provided entity, driven by the provided
    /// kernel.
    ///
    /// The kernel is launched when the simulation is created and runs until
    /// it returns or faults, suspending at every `wait` point.
    pub fn add_node_with<E, K>(&mut self, entity: E, kernel: K) -> NodeId<E>
    where
        E: Entity,
        K: EntityKernel<E>,
    {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeSlot {
            entity: Box::new(entity),
            kernel: Some(Box::new(EntityLauncher { node: id, kernel })),
            outgoing: Vec::new(),
        });

        id
    }

    /// Connects two nodes with a directed channel carrying messages of type
    /// `T`, without simulation logic.
    ///
    /// The role labels the relation between the two nodes and is matched by
    /// [`destinations`](Topology::destinations) queries.
    pub fn connect<T: 'static>(
        &mut self,
        source: impl Into<NodeIndex>,
        target: impl Into<NodeIndex>,
        role: impl Into<String>,
    ) -> EdgeId<T> {
        self.push_edge(source.into(), target.into(), role.into(), None)
    }

    /// Connects two nodes with a directed channel driven by the provided
    /// kernel.
    pub fn connect_with<T, K>(
        &mut self,
        source: impl Into<NodeIndex>,
        target: impl Into<NodeIndex>,
        role: impl Into<String>,
        kernel: K,
    ) -> EdgeId<T>
    where
        T: 'static,
        K: ChannelKernel<T>,
    {
        let id = EdgeId::new(self.edges.len());
        let launcher = Box::new(ChannelLauncher { edge: id, kernel });

        self.push_edge(source.into(), target.into(), role.into(), Some(launcher))
    }

    fn push_edge<T: 'static>(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        role: String,
        kernel: Option<Box<dyn Launcher>>,
    ) -> EdgeId<T> {
        assert!(source.0 < self.nodes.len(), "unknown source node");
        assert!(target.0 < self.nodes.len(), "unknown target node");

        let index = self.edges.len();
        self.edges.push(EdgeSlot {
            source,
            target,
            role,
            kernel,
        });
        self.nodes[source.0].outgoing.push(index);

        EdgeId::new(index)
    }

    /// Returns a reference to the entity hosted by a node.
    pub fn entity<E: Entity>(&self, node: NodeId<E>) -> &E {
        self.nodes[node.index]
            .entity
            .downcast_ref::<E>()
            .expect("the hosted entity type does not match the node handle")
    }

    /// Returns a mutable reference to the entity hosted by a node.
    ///
    /// Entities are only mutable while the topology is being assembled, that
    /// is before the topology is moved into a simulation; this is typically
    /// used to wire cross-entity links such as task dependencies.
    pub fn entity_mut<E: Entity>(&mut self, node: NodeId<E>) -> &mut E {
        self.nodes[node.index]
            .entity
            .downcast_mut::<E>()
            .expect("the hosted entity type does not match the node handle")
    }

    /// Returns the number of nodes in the topology.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges in the topology.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterates over the untyped identities of all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.nodes.len()).map(NodeIndex)
    }

    /// Returns the role label of an edge.
    pub fn role(&self, edge: impl Into<EdgeIndex>) -> &str {
        &self.edges[edge.into().0].role
    }

    /// Returns the source and target nodes of an edge.
    pub fn endpoints(&self, edge: impl Into<EdgeIndex>) -> (NodeIndex, NodeIndex) {
        let edge = &self.edges[edge.into().0];

        (edge.source, edge.target)
    }

    /// Returns the neighbors reachable from a node over edges with the
    /// requested role, keeping only those hosting an entity of type `E`.
    ///
    /// This is the capability-filtered neighbor lookup used by scheduling
    /// policies, e.g. to enumerate the CPUs of a machine or the links of a
    /// rack. Neighbors of the right role whose entity is of a different type
    /// are silently skipped.
    pub fn destinations<E: Entity>(
        &self,
        node: impl Into<NodeIndex>,
        role: &str,
    ) -> Vec<NodeId<E>> {
        let node = node.into();

        self.nodes[node.0]
            .outgoing
            .iter()
            .filter_map(|&edge| {
                let edge = &self.edges[edge];
                if edge.role != role {
                    return None;
                }
                let target = edge.target.0;
                self.nodes[target]
                    .entity
                    .downcast_ref::<E>()
                    .map(|_| NodeId::new(target))
            })
            .collect()
    }

    /// Iterates over every component, each node followed by its outgoing
    /// edges.
    ///
    /// This is the canonical walk order used to resolve and launch kernels,
    /// so it must stay deterministic.
    pub(crate) fn components(&self) -> impl Iterator<Item = Component> + '_ {
        self.nodes.iter().enumerate().flat_map(|(index, node)| {
            std::iter::once(Component::Node(NodeIndex(index))).chain(
                node.outgoing
                    .iter()
                    .map(|&edge| Component::Edge(EdgeIndex(edge))),
            )
        })
    }

    /// Removes and returns all kernels, keyed by the component they are bound
    /// to.
    pub(crate) fn take_kernels(&mut self) -> HashMap<Component, Box<dyn Launcher>> {
        let mut kernels: HashMap<Component, Box<dyn Launcher>> = HashMap::new();

        for (index, node) in self.nodes.iter_mut().enumerate() {
            if let Some(kernel) = node.kernel.take() {
                kernels.insert(Component::Node(NodeIndex(index)), kernel);
            }
        }
        for (index, edge) in self.edges.iter_mut().enumerate() {
            if let Some(kernel) = edge.kernel.take() {
                kernels.insert(Component::Edge(EdgeIndex(index)), kernel);
            }
        }

        kernels
    }
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Switch {
        ports: u32,
    }
    impl Entity for Switch {
        type State = u32;
        fn initial_state(&self) -> u32 {
            self.ports
        }
    }

    struct Host;
    impl Entity for Host {
        type State = ();
        fn initial_state(&self) {}
    }

    #[test]
    fn topology_entity_access() {
        let mut topology = Topology::new();
        let switch = topology.add_node(Switch { ports: 48 });

        assert_eq!(topology.entity(switch).ports, 48);

        topology.entity_mut(switch).ports = 24;
        assert_eq!(topology.entity(switch).ports, 24);
    }

    #[test]
    fn topology_destinations_filter_by_role() {
        let mut topology = Topology::new();
        let switch = topology.add_node(Switch { ports: 8 });
        let host1 = topology.add_node(Host);
        let host2 = topology.add_node(Host);
        let uplink = topology.add_node(Switch { ports: 32 });
        topology.connect::<u64>(switch, host1, "host");
        topology.connect::<u64>(switch, host2, "host");
        topology.connect::<u64>(switch, uplink, "uplink");

        let hosts = topology.destinations::<Host>(switch, "host");
        assert_eq!(hosts, vec![host1, host2]);
        assert!(topology.destinations::<Host>(switch, "uplink").is_empty());
    }

    #[test]
    fn topology_destinations_filter_by_entity_type() {
        let mut topology = Topology::new();
        let switch = topology.add_node(Switch { ports: 8 });
        let host = topology.add_node(Host);
        let other = topology.add_node(Switch { ports: 4 });
        topology.connect::<u64>(switch, host, "peer");
        topology.connect::<u64>(switch, other, "peer");

        assert_eq!(topology.destinations::<Host>(switch, "peer"), vec![host]);
        assert_eq!(topology.destinations::<Switch>(switch, "peer"), vec![other]);
    }

    #[test]
    fn topology_walk_order_is_nodes_then_outgoing_edges() {
        let mut topology = Topology::new();
        let a = topology.add_node(Host);
        let b = topology.add_node(Host);
        let ab = topology.connect::<u64>(a, b, "link");
        let ba = topology.connect::<u64>(b, a, "link");

        let walk: Vec<Component> = topology.components().collect();
        assert_eq!(
            walk,
            vec![
                Component::Node(a.index()),
                Component::Edge(ab.index()),
                Component::Node(b.index()),
                Component::Edge(ba.index()),
            ]
        );
    }

    #[test]
    fn topology_edge_endpoints_and_role() {
        let mut topology = Topology::new();
        let a = topology.add_node(Host);
        let b = topology.add_node(Host);
        let edge = topology.connect::<u64>(a, b, "link");

        assert_eq!(topology.endpoints(edge), (a.index(), b.index()));
        assert_eq!(topology.role(edge), "link");
    }
}
