use std::path::Path;

use serde::{Deserialize, Serialize};

use skein_ledger::NodeId;

/// Node configuration, layered defaults < config file < environment < CLI.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeCfg {
    pub node_id: NodeId,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_metrics_listen")]
    pub metrics_listen: String,
    #[serde(default = "default_registry")]
    pub registry: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Initial amount granted by this node's genesis block.
    #[serde(default = "default_genesis_amount")]
    pub genesis_amount: u64,
}

fn default_listen() -> String {
    "127.0.0.1:4710".into()
}

fn default_metrics_listen() -> String {
    "127.0.0.1:9410".into()
}

fn default_registry() -> String {
    "registry.json".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_genesis_amount() -> u64 {
    1000
}

impl Default for NodeCfg {
    fn default() -> Self {
        NodeCfg {
            node_id: 0,
            listen: default_listen(),
            metrics_listen: default_metrics_listen(),
            registry: default_registry(),
            log_level: default_log_level(),
            genesis_amount: default_genesis_amount(),
        }
    }
}

impl NodeCfg {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Environment variables override what the file provided.
    pub fn apply_env(&mut self) {
        if let Ok(listen) = std::env::var("SKEIN_LISTEN") {
            self.listen = listen;
        }
        if let Ok(metrics) = std::env::var("SKEIN_METRICS_LISTEN") {
            self.metrics_listen = metrics;
        }
        if let Ok(registry) = std::env::var("SKEIN_REGISTRY") {
            self.registry = registry;
        }
        if let Ok(level) = std::env::var("SKEIN_LOG_LEVEL") {
            self.log_level = level;
        }
    }
}
