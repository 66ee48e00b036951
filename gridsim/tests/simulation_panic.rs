//! Kernel fault and panic propagation.

use gridsim::context::EntityContext;
use gridsim::simulation::{Simulation, SimulationError};
use gridsim::topology::{Component, Entity, Topology};

struct Worker;
impl Entity for Worker {
    type State = u32;
    fn initial_state(&self) -> u32 {
        0
    }
}

#[test]
fn kernel_fault_aborts_the_step() {
    let mut topology = Topology::new();
    let healthy = topology.add_node_with(Worker, |cx: EntityContext<Worker>| async move {
        cx.wait(5).await?;
        cx.update(cx.node(), 1);
        Ok(())
    });
    let faulty = topology.add_node_with(Worker, |cx: EntityContext<Worker>| async move {
        cx.wait(1).await?;
        Err("overload".into())
    });

    let mut simu = Simulation::new(topology).unwrap();
    match simu.step() {
        Err(SimulationError::KernelFault { component, fault }) => {
            assert_eq!(component, Component::Node(faulty.index()));
            assert_eq!(fault.to_string(), "overload");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(()) => panic!("the kernel fault was swallowed"),
    }

    // The simulation is poisoned: no further work is reported or accepted.
    assert!(!simu.has_next());
    assert!(matches!(simu.step(), Err(SimulationError::Aborted)));
    assert_eq!(simu.state(healthy), 0);
}

#[test]
fn kernel_panic_aborts_the_step() {
    let mut topology = Topology::new();
    let faulty = topology.add_node_with(Worker, |cx: EntityContext<Worker>| async move {
        cx.wait(2).await?;
        panic!("kernel exploded");
    });

    let mut simu = Simulation::new(topology).unwrap();
    simu.step().unwrap();
    match simu.step() {
        Err(SimulationError::KernelPanic { component, payload }) => {
            assert_eq!(component, Component::Node(faulty.index()));
            assert_eq!(payload.downcast_ref::<&str>(), Some(&"kernel exploded"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(()) => panic!("the kernel panic was swallowed"),
    }
    assert!(matches!(simu.step(), Err(SimulationError::Aborted)));
}

#[test]
fn kernel_fault_during_launch_fails_construction() {
    let mut topology = Topology::new();
    let faulty = topology.add_node_with(Worker, |_cx: EntityContext<Worker>| async move {
        Err("dead on arrival".into())
    });

    match Simulation::new(topology) {
        Err(SimulationError::KernelFault { component, fault }) => {
            assert_eq!(component, Component::Node(faulty.index()));
            assert_eq!(fault.to_string(), "dead on arrival");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("the launch fault was swallowed"),
    }
}
