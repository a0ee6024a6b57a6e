// Routine tree nodes and their per-tick state machine

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::actuator::PortId;

pub type Effect<C> = Box<dyn FnMut(&mut C)>;
pub type Predicate<C> = Box<dyn Fn(&C) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Running,
    Done,
}

/// One node of a routine tree
///
/// Trees are built fresh for every run and hold their own progress, so a
/// finished or cancelled tree is simply dropped.
pub enum SequenceNode<C> {
    /// Single side-effecting call, Done the tick it runs
    Action {
        name: &'static str,
        /// Ports the call writes to, stopped if the routine is cancelled
        ports: Vec<PortId>,
        run: Effect<C>,
        fired: bool,
    },
    /// Done once `duration` has elapsed since the first poll
    WaitForTime {
        duration: Duration,
        started: Option<Duration>,
    },
    /// Polled every tick, never times out
    WaitForCondition {
        name: &'static str,
        predicate: Predicate<C>,
    },
    /// Children one at a time, cursor advances at most one per tick
    Sequence {
        children: Vec<SequenceNode<C>>,
        cursor: usize,
    },
    /// Every unfinished child polled each tick in listed order
    Parallel {
        children: Vec<SequenceNode<C>>,
        done: Vec<bool>,
    },
}

pub fn action<C>(
    name: &'static str,
    ports: Vec<PortId>,
    run: impl FnMut(&mut C) + 'static,
) -> SequenceNode<C> {
    SequenceNode::Action {
        name,
        ports,
        run: Box::new(run),
        fired: false,
    }
}

pub fn wait_for_time<C>(duration: Duration) -> SequenceNode<C> {
    SequenceNode::WaitForTime {
        duration,
        started: None,
    }
}

/// Wait in seconds; negative or non-finite values wait zero
pub fn wait_seconds<C>(seconds: f64) -> SequenceNode<C> {
    let duration = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO);
    wait_for_time(duration)
}

pub fn wait_until<C>(
    name: &'static str,
    predicate: impl Fn(&C) -> bool + 'static,
) -> SequenceNode<C> {
    SequenceNode::WaitForCondition {
        name,
        predicate: Box::new(predicate),
    }
}

pub fn sequence<C>(children: Vec<SequenceNode<C>>) -> SequenceNode<C> {
    SequenceNode::Sequence {
        children,
        cursor: 0,
    }
}

pub fn parallel<C>(children: Vec<SequenceNode<C>>) -> SequenceNode<C> {
    let done = vec![false; children.len()];
    SequenceNode::Parallel { children, done }
}

impl<C> SequenceNode<C> {
    /// Advance this node by one tick
    ///
    /// # Arguments
    /// * `ctx` - Subsystems the node's actions and predicates act on
    /// * `now` - Time of this tick, measured from any fixed origin
    pub fn poll(&mut self, ctx: &mut C, now: Duration) -> NodeStatus {
        match self {
            SequenceNode::Action { run, fired, .. } => {
                if !*fired {
                    run(ctx);
                    *fired = true;
                }
                NodeStatus::Done
            }
            SequenceNode::WaitForTime { duration, started } => {
                let start = *started.get_or_insert(now);
                if now.saturating_sub(start) >= *duration {
                    NodeStatus::Done
                } else {
                    NodeStatus::Running
                }
            }
            SequenceNode::WaitForCondition { predicate, .. } => {
                if predicate(ctx) {
                    NodeStatus::Done
                } else {
                    NodeStatus::Running
                }
            }
            SequenceNode::Sequence { children, cursor } => {
                if let Some(child) = children.get_mut(*cursor) {
                    if child.poll(ctx, now) == NodeStatus::Done {
                        *cursor += 1;
                    }
                }
                if *cursor >= children.len() {
                    NodeStatus::Done
                } else {
                    NodeStatus::Running
                }
            }
            SequenceNode::Parallel { children, done } => {
                for (child, finished) in children.iter_mut().zip(done.iter_mut()) {
                    if !*finished && child.poll(ctx, now) == NodeStatus::Done {
                        *finished = true;
                    }
                }
                if done.iter().all(|finished| *finished) {
                    NodeStatus::Done
                } else {
                    NodeStatus::Running
                }
            }
        }
    }

    /// Every port referenced by an action anywhere under this node
    pub fn referenced_ports(&self) -> BTreeSet<PortId> {
        let mut ports = BTreeSet::new();
        self.collect_ports(&mut ports);
        ports
    }

    fn collect_ports(&self, out: &mut BTreeSet<PortId>) {
        match self {
            SequenceNode::Action { ports, .. } => out.extend(ports.iter().copied()),
            SequenceNode::WaitForTime { .. } | SequenceNode::WaitForCondition { .. } => {}
            SequenceNode::Sequence { children, .. } | SequenceNode::Parallel { children, .. } => {
                for child in children {
                    child.collect_ports(out);
                }
            }
        }
    }

    /// Name of the leaf currently holding the routine up
    pub fn current_step(&self) -> Option<&'static str> {
        match self {
            SequenceNode::Action { name, fired, .. } => (!*fired).then_some(*name),
            SequenceNode::WaitForTime { .. } => Some("Wait"),
            SequenceNode::WaitForCondition { name, .. } => Some(*name),
            SequenceNode::Sequence { children, cursor } => {
                children.get(*cursor).and_then(|child| child.current_step())
            }
            SequenceNode::Parallel { children, done } => children
                .iter()
                .zip(done)
                .filter(|(_, finished)| !**finished)
                .find_map(|(child, _)| child.current_step()),
        }
    }
}

impl<C> fmt::Debug for SequenceNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceNode::Action { name, ports, .. } => {
                write!(f, "Action({}, ports={:?})", name, ports)
            }
            SequenceNode::WaitForTime { duration, .. } => write!(f, "Wait({:?})", duration),
            SequenceNode::WaitForCondition { name, .. } => write!(f, "WaitUntil({})", name),
            SequenceNode::Sequence { children, .. } => {
                f.debug_tuple("Sequence").field(children).finish()
            }
            SequenceNode::Parallel { children, .. } => {
                f.debug_tuple("Parallel").field(children).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(20);

    #[derive(Default)]
    struct Rig {
        log: Vec<&'static str>,
        output: f64,
        ready: bool,
    }

    fn step(name: &'static str) -> SequenceNode<Rig> {
        action(name, vec![], move |rig: &mut Rig| rig.log.push(name))
    }

    fn run_until_done(node: &mut SequenceNode<Rig>, rig: &mut Rig, limit: usize) -> usize {
        for tick in 0..limit {
            if node.poll(rig, TICK * tick as u32) == NodeStatus::Done {
                return tick + 1;
            }
        }
        panic!("Node still running after {} ticks", limit);
    }

    #[test]
    fn test_sequence_advances_one_child_per_tick() {
        let mut rig = Rig::default();
        let mut node = sequence(vec![step("a"), step("b"), step("c"), step("d")]);

        for tick in 0..3 {
            assert_eq!(node.poll(&mut rig, TICK * tick), NodeStatus::Running);
            assert_eq!(rig.log.len(), tick as usize + 1, "One action per tick");
        }
        assert_eq!(node.poll(&mut rig, TICK * 3), NodeStatus::Done);
        assert_eq!(rig.log, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_action_runs_once() {
        let mut rig = Rig::default();
        let mut node = step("once");
        assert_eq!(node.poll(&mut rig, Duration::ZERO), NodeStatus::Done);
        assert_eq!(node.poll(&mut rig, TICK), NodeStatus::Done);
        assert_eq!(rig.log, vec!["once"]);
    }

    #[test]
    fn test_wait_for_time_measures_from_first_poll() {
        let mut rig = Rig::default();
        let mut node = wait_seconds::<Rig>(0.1);
        let origin = Duration::from_secs(7);
        assert_eq!(node.poll(&mut rig, origin), NodeStatus::Running);
        assert_eq!(node.poll(&mut rig, origin + TICK * 4), NodeStatus::Running);
        assert_eq!(node.poll(&mut rig, origin + TICK * 5), NodeStatus::Done);
    }

    #[test]
    fn test_zero_and_invalid_waits_finish_immediately() {
        let mut rig = Rig::default();
        for seconds in [0.0, -1.0, f64::NAN] {
            let mut node = wait_seconds::<Rig>(seconds);
            assert_eq!(node.poll(&mut rig, TICK), NodeStatus::Done, "{}", seconds);
        }
    }

    #[test]
    fn test_wait_until_never_times_out() {
        let mut rig = Rig::default();
        let mut node = wait_until("ready", |rig: &Rig| rig.ready);
        for tick in 0..1000 {
            assert_eq!(node.poll(&mut rig, TICK * tick), NodeStatus::Running);
        }
        rig.ready = true;
        assert_eq!(node.poll(&mut rig, TICK * 1000), NodeStatus::Done);
    }

    #[test]
    fn test_parallel_waits_for_slowest_child() {
        let mut rig = Rig::default();
        let mut node = parallel(vec![
            step("fast"),
            sequence(vec![wait_seconds(0.04), step("slow")]),
        ]);
        let ticks = run_until_done(&mut node, &mut rig, 10);
        // wait: ticks 0..=2, slow action on tick 3
        assert_eq!(ticks, 4);
        assert_eq!(rig.log, vec!["fast", "slow"]);
    }

    #[test]
    fn test_parallel_last_writer_wins() {
        let mut rig = Rig::default();
        let mut node = parallel(vec![
            action("first", vec![1], |rig: &mut Rig| rig.output = 0.3),
            action("second", vec![1], |rig: &mut Rig| rig.output = -0.7),
        ]);
        assert_eq!(node.poll(&mut rig, Duration::ZERO), NodeStatus::Done);
        assert_eq!(rig.output, -0.7);
    }

    #[test]
    fn test_empty_groups_are_done() {
        let mut rig = Rig::default();
        assert_eq!(sequence::<Rig>(vec![]).poll(&mut rig, TICK), NodeStatus::Done);
        assert_eq!(parallel::<Rig>(vec![]).poll(&mut rig, TICK), NodeStatus::Done);
    }

    #[test]
    fn test_referenced_ports_are_unique() {
        let node: SequenceNode<Rig> = sequence(vec![
            action("a", vec![5], |_| {}),
            parallel(vec![
                action("b", vec![7, 8], |_| {}),
                action("c", vec![8, 5], |_| {}),
                wait_seconds(1.0),
            ]),
        ]);
        let ports: Vec<PortId> = node.referenced_ports().into_iter().collect();
        assert_eq!(ports, vec![5, 7, 8]);
    }

    #[test]
    fn test_current_step_follows_cursor() {
        let mut rig = Rig::default();
        let mut node = sequence(vec![
            step("spin"),
            wait_until("ready", |rig: &Rig| rig.ready),
        ]);
        assert_eq!(node.current_step(), Some("spin"));
        node.poll(&mut rig, Duration::ZERO);
        assert_eq!(node.current_step(), Some("ready"));
    }
}
