use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use skein_ledger::{NodeId, NodeInfo, Tracker};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RegistryEntry {
    id: NodeId,
    address: String,
    port: u16,
}

/// The node registry: a static id → address map loaded at startup, standing
/// in for a live tracker service. Lookups of unlisted ids fail with the I/O
/// error the proof decoder propagates.
#[derive(Clone)]
pub struct StaticRegistry {
    nodes: Arc<HashMap<NodeId, NodeInfo>>,
}

impl StaticRegistry {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let entries: Vec<RegistryEntry> = serde_json::from_str(&raw)?;
        Ok(Self::from_infos(entries.into_iter().map(|e| NodeInfo {
            id: e.id,
            address: e.address,
            port: e.port,
        })))
    }

    pub fn from_infos(infos: impl IntoIterator<Item = NodeInfo>) -> Self {
        StaticRegistry {
            nodes: Arc::new(infos.into_iter().map(|info| (info.id, info)).collect()),
        }
    }

    pub fn info(&self, id: NodeId) -> Option<&NodeInfo> {
        self.nodes.get(&id)
    }

    pub fn all(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Tracker for StaticRegistry {
    fn lookup(&self, id: NodeId) -> io::Result<NodeInfo> {
        self.info(id).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("node {id} is not in the registry"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_looks_up() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"[
                {{ "id": 1, "address": "127.0.0.1", "port": 4711 }},
                {{ "id": 2, "address": "127.0.0.1", "port": 4712 }}
            ]"#
        )
        .expect("write");

        let registry = StaticRegistry::load(file.path()).expect("loads");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(1).expect("known").port, 4711);
        assert!(registry.lookup(9).is_err());
    }
}
