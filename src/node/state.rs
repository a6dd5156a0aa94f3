use crate::colored::Colorize;

use std::sync::atomic::{AtomicU8, Ordering};

/// Liveness of an upstream node.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[repr(u8)]
pub enum NodeState {
    Undialed = 0,
    Alive = 1,
    Dead = 2,
}

impl std::fmt::Debug for NodeState {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NodeState::Undialed => {
                write!(fmt, "{}", "Undialed".yellow())
            }
            NodeState::Alive => {
                write!(fmt, "{}", "Alive".green())
            }
            NodeState::Dead => {
                write!(fmt, "{}", "Dead".red())
            }
        }
    }
}

impl NodeState {
    fn from_u8(state: u8) -> NodeState {
        match state {
            1 => NodeState::Alive,
            2 => NodeState::Dead,
            _ => NodeState::Undialed,
        }
    }
}

/// The state cell of one node, read without locking by any number of readers.
pub struct Liveness {
    state: AtomicU8,
}

impl Liveness {
    pub fn new() -> Self {
        Liveness { state: AtomicU8::new(NodeState::Undialed as u8) }
    }

    pub fn get(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Sets the state, returning the previous one.
    pub fn set(&self, state: NodeState) -> NodeState {
        NodeState::from_u8(self.state.swap(state as u8, Ordering::SeqCst))
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Liveness::new()
    }
}
