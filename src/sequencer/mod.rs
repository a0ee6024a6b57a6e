// Cooperative routine scheduler
//
// Runs at most one routine tree at a time, advanced once per control tick.
// Waiting is logical: a wait node declines to advance and the tick returns.
// Cancelling stops every port the tree's actions reference, each exactly once.

pub mod node;

use tracing::{debug, info};

use crate::actuator::PortId;

pub use node::{
    action, parallel, sequence, wait_for_time, wait_seconds, wait_until, NodeStatus, SequenceNode,
};

/// Context a routine runs against must be able to halt any port it owns
pub trait PortStopper {
    fn stop_port(&mut self, id: PortId);
}

struct ActiveRoutine<C> {
    name: String,
    root: SequenceNode<C>,
}

pub struct Sequencer<C> {
    label: &'static str,
    active: Option<ActiveRoutine<C>>,
}

impl<C: PortStopper> Sequencer<C> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            active: None,
        }
    }

    /// Start `root`, cancelling whatever was running first
    pub fn start(&mut self, name: impl Into<String>, root: SequenceNode<C>, ctx: &mut C) {
        let name = name.into();
        if let Some(previous) = self.active.take() {
            info!(
                "{}: '{}' replaced by '{}'",
                self.label, previous.name, name
            );
            Self::stop_all(previous, ctx);
        }
        info!("{}: started '{}'", self.label, name);
        self.active = Some(ActiveRoutine { name, root });
    }

    /// Advance the active routine by one tick
    ///
    /// # Returns
    /// None when idle, otherwise the routine's status after this tick. A
    /// routine that finishes is dropped without stopping its ports.
    pub fn poll(&mut self, ctx: &mut C, now: std::time::Duration) -> Option<NodeStatus> {
        let routine = self.active.as_mut()?;
        let status = routine.root.poll(ctx, now);
        if status == NodeStatus::Done {
            info!("{}: finished '{}'", self.label, routine.name);
            self.active = None;
        }
        Some(status)
    }

    /// Cancel the active routine, stopping its ports. False if idle.
    pub fn cancel(&mut self, ctx: &mut C) -> bool {
        match self.active.take() {
            Some(routine) => {
                info!("{}: cancelled '{}'", self.label, routine.name);
                Self::stop_all(routine, ctx);
                true
            }
            None => false,
        }
    }

    fn stop_all(routine: ActiveRoutine<C>, ctx: &mut C) {
        let ports = routine.root.referenced_ports();
        debug!("Stopping ports {:?} of '{}'", ports, routine.name);
        for id in ports {
            ctx.stop_port(id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(|routine| routine.name.as_str())
    }

    pub fn current_step(&self) -> Option<&'static str> {
        self.active
            .as_ref()
            .and_then(|routine| routine.root.current_step())
    }
}
