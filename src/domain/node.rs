//! Node records for both API generations
//!
//! These are deliberately not unified: `cordon`/`drain` only exist on the
//! legacy record and `version` only exists on the current one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Legacy Generation (/v1)
// =============================================================================

/// Node as returned by the legacy API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Node is excluded from new volume placement
    #[serde(default)]
    pub cordon: bool,
    /// Node is being evacuated
    #[serde(default)]
    pub drain: bool,
}

/// Full-replacement update for a legacy node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyNodeUpdate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub cordon: bool,
    #[serde(default)]
    pub drain: bool,
}

impl From<&LegacyNode> for LegacyNodeUpdate {
    fn from(node: &LegacyNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            labels: node.labels.clone(),
            cordon: node.cordon,
            drain: node.drain,
        }
    }
}

// =============================================================================
// Current Generation (/v2)
// =============================================================================

/// Node as returned by the current API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Optimistic-concurrency token, changes on every write
    pub version: String,
}

/// Update for a current-generation node.
///
/// `version` must be the token last read; the server rejects the write if
/// the stored node has moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(skip_serializing, default)]
    pub id: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub version: String,
}

impl NodeUpdate {
    /// Start an update from a freshly read node, keeping its labels and version
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            labels: node.labels.clone(),
            version: node.version.clone(),
        }
    }

    /// Set a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}
