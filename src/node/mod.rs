//! Upstream nodes: the endpoint descriptors, their sessions, and the dial and verification of a
//! single node.
//!
//! [Node] and [SendOnlyNode] share the [PoolNode] capability, which the pool and the retry
//! scheduler drive without caring which kind of node they hold.
mod endpoint;
mod link;
mod node;
pub mod probe;
mod send_only;
mod session;
mod state;

pub use endpoint::Endpoint;
pub use node::Node;
pub use probe::Probe;
pub use send_only::SendOnlyNode;
pub use session::Session;
pub use state::{Liveness, NodeState};

use crate::chain_id::TargetChainId;
use crate::Result;

use futures::Future;

use std::fmt;
use std::pin::Pin;

use tokio::time::Duration;

/// Future type that can be held across `.await` boundaries and moved between tasks.
pub type SafeFuture<'a, Out> = Pin<Box<dyn Send + Future<Output = Out> + 'a>>;

/// Timeouts applied by a node to its sessions.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Time allowed to open a session.
    pub dial_timeout: Duration,
    /// Time allowed for a response.
    pub request_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            dial_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// What the pool needs from an upstream node.
pub trait PoolNode: Send + Sync + fmt::Display {
    fn name(&self) -> &str;

    fn state(&self) -> NodeState;

    /// Opens the sessions and asks every address for its chain id, without judging the answers.
    fn probe(&self) -> SafeFuture<'_, Probe>;

    /// Judges a probe against `target`. On agreement the node keeps the session and becomes
    /// `Alive`; otherwise the session is closed and the node is `Dead`.
    fn commit<'a>(&'a self, probe: Probe, target: &'a TargetChainId) -> SafeFuture<'a, Result<()>>;

    /// One complete dial attempt.
    fn dial<'a>(&'a self, target: &'a TargetChainId) -> SafeFuture<'a, Result<()>> {
        Box::pin(async move {
            let probe = self.probe().await;
            self.commit(probe, target).await
        })
    }

    /// Resolves once the node's live session drops, right away if it has none.
    fn disconnected(&self) -> SafeFuture<'static, ()>;

    /// Releases the dropped session and marks the node `Dead`.
    fn demote(&self) -> SafeFuture<'_, ()>;

    /// Tears down every session. Idempotent.
    fn close(&self) -> SafeFuture<'_, ()>;
}
