//! Domain Ports - Trait definitions for the control plane APIs
//!
//! One trait per API generation. There is intentionally no trait spanning
//! both: their node shapes cannot be merged without dropping fields.

use crate::domain::node::{LegacyNode, LegacyNodeUpdate, Node, NodeUpdate};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// Legacy Generation Port
// =============================================================================

/// Node operations on the legacy (basic-auth) API
#[async_trait]
pub trait LegacyNodeApi: Send + Sync {
    /// Fetch a node by name
    async fn legacy_get_node(&self, name: &str) -> Result<LegacyNode>;

    /// Replace a node's mutable fields
    async fn legacy_update_node(&self, update: &LegacyNodeUpdate) -> Result<LegacyNode>;
}

// =============================================================================
// Current Generation Port
// =============================================================================

/// Node operations on the current (token-authenticated) API
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// List every node in the cluster
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Fetch a node by name
    async fn get_node(&self, name: &str) -> Result<Node>;

    /// Fetch a node by id
    async fn get_node_by_id(&self, id: &str) -> Result<Node>;

    /// Write a node, guarded by its version token
    async fn update_node(&self, update: &NodeUpdate) -> Result<Node>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type LegacyNodeApiRef = Arc<dyn LegacyNodeApi>;
pub type NodeApiRef = Arc<dyn NodeApi>;
