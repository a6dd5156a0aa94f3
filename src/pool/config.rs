use crate::node::NodeConfig;

use tokio::time::Duration;

/// How `Pool::select_node` picks among the alive nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    RoundRobin,
    Random,
}

impl Default for SelectionMode {
    fn default() -> Self {
        SelectionMode::RoundRobin
    }
}

/// Dead nodes are redialed every five seconds by default.
pub const DIAL_RETRY_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Timeouts of every node's sessions.
    pub node: NodeConfig,
    /// Fixed wait between two dial attempts of a dead node.
    pub retry_interval: Duration,
    /// Period of the state summary log, none disables it.
    pub report_interval: Option<Duration>,
    pub selection: SelectionMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            node: NodeConfig::default(),
            retry_interval: DIAL_RETRY_INTERVAL,
            report_interval: None,
            selection: SelectionMode::default(),
        }
    }
}
