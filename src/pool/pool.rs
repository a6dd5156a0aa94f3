use crate::chain_id::{ChainId, TargetChainId};
use crate::colored::Colorize;
use crate::node::{Endpoint, Node, NodeState, PoolNode, Probe, SendOnlyNode};
use crate::settings::Settings;
use crate::{Error, Result};

use super::config::{PoolConfig, SelectionMode};
use super::retry;

use rand::seq::SliceRandom;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing_futures::Instrument;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

/// Whether a node reads and writes, or only broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Primary,
    SendOnly,
}

/// A snapshot of one node for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub name: String,
    pub kind: NodeKind,
    pub state: NodeState,
}

/// The set of upstream nodes a client node talks to.
///
/// The pool dials every node once, refuses to start if any node serves another chain, and
/// afterwards keeps every node connected in the background until it is closed. Unreachable
/// nodes never prevent the pool from starting.
pub struct Pool {
    /// Nodes used for reads and writes, in configuration order.
    nodes: Vec<Arc<Node>>,
    /// Nodes only used to broadcast, in configuration order.
    send_only_nodes: Vec<Arc<SendOnlyNode>>,
    chain_id: Arc<TargetChainId>,
    config: PoolConfig,
    shutdown: CancellationToken,
    /// The supervisor task, once dialed.
    tasks: Mutex<Vec<JoinHandle<()>>>,
    dialed: AtomicBool,
    cursor: AtomicUsize,
}

impl Pool {
    pub fn new(
        nodes: Vec<Node>,
        send_only_nodes: Vec<SendOnlyNode>,
        chain_id: Option<ChainId>,
        config: PoolConfig,
    ) -> Self {
        Pool {
            nodes: nodes.into_iter().map(Arc::new).collect(),
            send_only_nodes: send_only_nodes.into_iter().map(Arc::new).collect(),
            chain_id: Arc::new(TargetChainId::new(chain_id)),
            config,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(vec![]),
            dialed: AtomicBool::new(false),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn from_endpoints(
        nodes: Vec<Endpoint>,
        send_only_nodes: Vec<Endpoint>,
        chain_id: Option<ChainId>,
        config: PoolConfig,
    ) -> Self {
        let nodes = nodes.into_iter().map(|e| Node::new(e, config.node.clone())).collect();
        let send_only_nodes = send_only_nodes
            .into_iter()
            .map(|e| SendOnlyNode::new(e, config.node.clone()))
            .collect();
        Pool::new(nodes, send_only_nodes, chain_id, config)
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Pool::from_endpoints(
            settings.nodes(),
            settings.send_only_nodes(),
            settings.chain_id(),
            settings.pool_config(),
        )
    }

    fn all_nodes(&self) -> Vec<Arc<dyn PoolNode>> {
        let nodes = self.nodes.iter().map(|node| node.clone() as Arc<dyn PoolNode>);
        let send_only_nodes =
            self.send_only_nodes.iter().map(|node| node.clone() as Arc<dyn PoolNode>);
        nodes.chain(send_only_nodes).collect()
    }

    /// Dials every node and verifies that they all serve the same chain.
    ///
    /// Returns once every node answered or failed its first attempt. Unreachable nodes are
    /// left `Dead` and redialed in the background; any chain id disagreement or failed chain
    /// id query fails the dial with every fault in one `Error::Verification`. If `deadline`
    /// elapses first, `Error::DialTimeout` names the nodes still dialing, which carry on in
    /// the background.
    pub async fn dial(&self, deadline: Duration) -> Result<()> {
        let nodes = self.all_nodes();
        let pending: Arc<std::sync::Mutex<BTreeMap<usize, String>>> = Arc::new(
            std::sync::Mutex::new(
                nodes.iter().enumerate().map(|(i, node)| (i, node.name().to_owned())).collect(),
            ),
        );
        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut tasks = self.tasks.lock().await;
            if self.shutdown.is_cancelled() {
                return Err(Error::PoolClosed);
            }
            if self.dialed.swap(true, Ordering::SeqCst) {
                return Err(Error::AlreadyDialed);
            }
            info!(
                "[pool] dialing {} nodes and {} send-only nodes",
                self.nodes.len(),
                self.send_only_nodes.len()
            );
            let probes = nodes
                .iter()
                .enumerate()
                .map(|(i, node)| {
                    let node = node.clone();
                    let pending = pending.clone();
                    let span = info_span!("dial", node = %node);
                    tokio::spawn(
                        async move {
                            let probe = node.probe().await;
                            if let Ok(mut pending) = pending.lock() {
                                let _ = pending.remove(&i);
                            }
                            probe
                        }
                        .instrument(span),
                    )
                })
                .collect();
            let supervisor = Supervisor {
                nodes,
                target: self.chain_id.clone(),
                config: self.config.clone(),
                shutdown: self.shutdown.clone(),
            };
            tasks.push(tokio::spawn(supervisor.run(probes, done_tx)));
        }

        let result = match timeout(deadline, done_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::PoolClosed),
            Err(_) => {
                let pending = match pending.lock() {
                    Ok(pending) => pending.values().cloned().collect(),
                    Err(_) => vec![],
                };
                Err(Error::DialTimeout(pending))
            }
        };
        match &result {
            Ok(()) => info!(
                "[pool] dialed, chain id {:?}, {}/{} nodes alive",
                self.chain_id(),
                self.alive_count(),
                self.nodes.len() + self.send_only_nodes.len()
            ),
            Err(err) => error!("[pool] dial failed: {}", err),
        }
        result
    }

    /// The target chain id, once pinned or derived.
    pub fn chain_id(&self) -> Option<ChainId> {
        self.chain_id.get()
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn send_only_nodes(&self) -> &[Arc<SendOnlyNode>] {
        &self.send_only_nodes
    }

    /// Picks an alive primary node to issue calls to.
    pub fn select_node(&self) -> Result<Arc<Node>> {
        let alive: Vec<&Arc<Node>> =
            self.nodes.iter().filter(|node| node.state() == NodeState::Alive).collect();
        if alive.is_empty() {
            return Err(Error::NoAliveNode);
        }
        let node = match self.config.selection {
            SelectionMode::RoundRobin => {
                let i = self.cursor.fetch_add(1, Ordering::Relaxed);
                alive[i % alive.len()]
            }
            SelectionMode::Random => match alive.choose(&mut rand::thread_rng()) {
                Some(node) => *node,
                None => return Err(Error::NoAliveNode),
            },
        };
        Ok(node.clone())
    }

    /// The alive send-only nodes, to broadcast to.
    pub fn send_only_nodes_alive(&self) -> Vec<Arc<SendOnlyNode>> {
        self.send_only_nodes
            .iter()
            .filter(|node| node.state() == NodeState::Alive)
            .cloned()
            .collect()
    }

    /// Every node and its current state. Never touches the network.
    pub fn node_states(&self) -> Vec<NodeStatus> {
        let nodes = self.nodes.iter().map(|node| NodeStatus {
            name: node.name().to_owned(),
            kind: NodeKind::Primary,
            state: node.state(),
        });
        let send_only_nodes = self.send_only_nodes.iter().map(|node| NodeStatus {
            name: node.name().to_owned(),
            kind: NodeKind::SendOnly,
            state: node.state(),
        });
        nodes.chain(send_only_nodes).collect()
    }

    fn alive_count(&self) -> usize {
        self.all_nodes().iter().filter(|node| node.state() == NodeState::Alive).count()
    }

    pub fn report(&self) {
        report(&self.all_nodes())
    }

    /// Stops every background task and closes every session. Idempotent, and valid whether or
    /// not the pool was dialed.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(err) = task.await {
                error!("[pool] background task failed: {:?}", err);
            }
        }
        for node in self.all_nodes() {
            node.close().await;
        }
        debug!("[pool] closed");
    }
}

fn report(nodes: &[Arc<dyn PoolNode>]) {
    let alive = nodes.iter().filter(|node| node.state() == NodeState::Alive).count();
    let summary = format!("{}/{}", alive, nodes.len());
    let summary = if alive == 0 { summary.red() } else { summary.green() };
    info!("[pool] {} nodes alive", summary);
    for node in nodes.iter() {
        info!("[pool]   {} {:?}", node, node.state());
    }
}

/// Judges the first dial of every node, then keeps every node connected until shutdown.
struct Supervisor {
    nodes: Vec<Arc<dyn PoolNode>>,
    target: Arc<TargetChainId>,
    config: PoolConfig,
    shutdown: CancellationToken,
}

impl Supervisor {
    async fn run(self, probes: Vec<JoinHandle<Probe>>, done: oneshot::Sender<Result<()>>) {
        let result = match self.judge(probes).await {
            Some(result) => result,
            None => return,
        };
        let _ = done.send(result);

        let mut tasks: Vec<JoinHandle<()>> = self
            .nodes
            .iter()
            .map(|node| {
                tokio::spawn(retry::run(
                    node.clone(),
                    self.target.clone(),
                    self.config.retry_interval,
                    self.shutdown.clone(),
                ))
            })
            .collect();
        if let Some(interval) = self.config.report_interval {
            tasks.push(tokio::spawn(reporter(self.nodes.clone(), interval, self.shutdown.clone())));
        }
        for task in tasks {
            if let Err(err) = task.await {
                error!("[pool] node task failed: {:?}", err);
            }
        }
    }

    /// Commits the probes in node order, so a derived chain id comes from the first node that
    /// reported one. Returns `None` if the pool shut down meanwhile.
    async fn judge(&self, probes: Vec<JoinHandle<Probe>>) -> Option<Result<()>> {
        let mut faults = vec![];
        let mut probes = probes.into_iter();
        for node in self.nodes.iter() {
            let mut probe = probes.next()?;
            let probe = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    probe.abort();
                    let _ = probe.await;
                    for probe in probes {
                        probe.abort();
                        let _ = probe.await;
                    }
                    return None;
                }
                probe = &mut probe => probe,
            };
            let probe = match probe {
                Ok(probe) => probe,
                Err(err) => {
                    error!("[pool] dial of {} did not complete: {:?}", node, err);
                    continue;
                }
            };
            match node.commit(probe, &self.target).await {
                Ok(()) => debug!("[pool] {} verified", node),
                Err(Error::Verification(node_faults)) => {
                    for fault in node_faults.iter() {
                        error!("[pool] {} failed verification: {}", node, fault);
                    }
                    faults.extend(node_faults);
                }
                Err(err) => warn!("[pool] {} unreachable, will retry: {}", node, err),
            }
        }
        if faults.is_empty() {
            Some(Ok(()))
        } else {
            Some(Err(Error::Verification(faults)))
        }
    }
}

async fn reporter(nodes: Vec<Arc<dyn PoolNode>>, interval: Duration, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => report(&nodes),
        }
    }
}

#[cfg(test)]
mod pool_tests;
