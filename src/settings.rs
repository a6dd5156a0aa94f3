use crate::chain_id::ChainId;
use crate::node::{Endpoint, NodeConfig};
use crate::pool::{PoolConfig, SelectionMode};

use config::{Config, ConfigError, File, FileFormat};

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use tokio::time::Duration;

fn default_dial_timeout_ms() -> u64 {
    10_000
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_retry_interval_ms() -> u64 {
    5_000
}
fn default_dial_deadline_ms() -> u64 {
    60_000
}

/// One upstream node as written in the configuration file.
#[derive(Debug, Deserialize, Clone)]
pub struct NodeSettings {
    pub name: String,
    pub primary: SocketAddr,
    #[serde(default)]
    pub secondary: Option<SocketAddr>,
}

impl From<&NodeSettings> for Endpoint {
    fn from(node: &NodeSettings) -> Self {
        Endpoint::new(&node.name, node.primary, node.secondary)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub nodes: Vec<NodeSettings>,
    #[serde(default)]
    pub send_only_nodes: Vec<NodeSettings>,
    /// Pins the chain id; derived from the first reporting node when absent.
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default)]
    pub report_interval_ms: Option<u64>,
    #[serde(default = "default_dial_deadline_ms")]
    pub dial_deadline_ms: u64,
    #[serde(default)]
    pub selection: SelectionMode,
}

const CONFIG_FILE_NAME: &str = "Default.json";

#[derive(Clone, Debug, Deserialize)]
pub enum Env {
    Testing,
    Development,
    Production,
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Env::Testing => write!(f, "Testing"),
            Env::Production => write!(f, "Production"),
            Env::Development => write!(f, "Development"),
        }
    }
}

impl From<&str> for Env {
    fn from(env: &str) -> Self {
        match env {
            "Testing" => Env::Testing,
            "Production" => Env::Production,
            _ => Env::Development,
        }
    }
}

impl Settings {
    /// Loads `Default.json` from `dir`, overlaid by the optional file named after `RUN_ENV`.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let env = Env::from(std::env::var("RUN_ENV").unwrap_or_default().as_str());
        let default_path = dir.join(CONFIG_FILE_NAME);
        let env_path = dir.join(format!("{}.json", env));
        Config::builder()
            .set_default("env", env.to_string())?
            .add_source(File::from(default_path))
            .add_source(File::from(env_path).required(false))
            .build()?
            .try_deserialize()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(json, FileFormat::Json))
            .build()?
            .try_deserialize()
    }

    pub fn nodes(&self) -> Vec<Endpoint> {
        self.nodes.iter().map(Endpoint::from).collect()
    }

    pub fn send_only_nodes(&self) -> Vec<Endpoint> {
        self.send_only_nodes.iter().map(Endpoint::from).collect()
    }

    pub fn chain_id(&self) -> Option<ChainId> {
        self.chain_id.map(ChainId)
    }

    /// How long the initial dial may take as a whole.
    pub fn dial_deadline(&self) -> Duration {
        Duration::from_millis(self.dial_deadline_ms)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            node: NodeConfig {
                dial_timeout: Duration::from_millis(self.dial_timeout_ms),
                request_timeout: Duration::from_millis(self.request_timeout_ms),
            },
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            report_interval: self.report_interval_ms.map(Duration::from_millis),
            selection: self.selection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_json(
            r#"{ "nodes": [ { "name": "alpha", "primary": "127.0.0.1:8546" } ] }"#,
        )
        .unwrap();
        let alpha = Endpoint::new("alpha", "127.0.0.1:8546".parse().unwrap(), None);
        assert_eq!(settings.nodes(), vec![alpha]);
        assert!(settings.send_only_nodes().is_empty());
        assert_eq!(settings.chain_id(), None);

        let config = settings.pool_config();
        assert_eq!(config.retry_interval, Duration::from_secs(5));
        assert_eq!(config.node.dial_timeout, Duration::from_secs(10));
        assert_eq!(config.report_interval, None);
        assert_eq!(config.selection, SelectionMode::RoundRobin);
        assert_eq!(settings.dial_deadline(), Duration::from_secs(60));
    }

    #[test]
    fn test_full() {
        let settings = Settings::from_json(
            r#"{
                "nodes": [
                    { "name": "alpha", "primary": "127.0.0.1:8546", "secondary": "127.0.0.1:8545" }
                ],
                "send_only_nodes": [ { "name": "beta", "primary": "127.0.0.1:9546" } ],
                "chain_id": 1,
                "retry_interval_ms": 250,
                "report_interval_ms": 1000,
                "selection": "Random"
            }"#,
        )
        .unwrap();
        assert_eq!(settings.nodes()[0].secondary, Some("127.0.0.1:8545".parse().unwrap()));
        assert_eq!(settings.send_only_nodes()[0].name, "beta");
        assert_eq!(settings.chain_id(), Some(ChainId(1)));

        let config = settings.pool_config();
        assert_eq!(config.retry_interval, Duration::from_millis(250));
        assert_eq!(config.report_interval, Some(Duration::from_secs(1)));
        assert_eq!(config.selection, SelectionMode::Random);
    }

    #[test]
    fn test_load_default_file() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("settings");
        let settings = Settings::load(&dir).unwrap();
        assert_eq!(settings.nodes.len(), 1);
    }

    #[test]
    fn test_env() {
        assert_eq!(Env::from("Production").to_string(), "Production");
        assert_eq!(Env::from("anything").to_string(), "Development");
    }
}
