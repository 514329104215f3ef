//! Control Plane Client - Dual-generation storage API facade
//!
//! A resilient client for a storage control plane exposing two incompatible
//! API generations: a legacy basic-auth API and a token-authenticated REST API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                        Orchestrating caller                                  │
//! └───────────────┬─────────────────────────────────────────┬───────────────────┘
//!                 │                                         │
//!                 ▼                                         ▼
//! ┌─────────────────────────────────────────┐  ┌─────────────────────────────┐
//! │        Dual-Version API Facade          │  │   Retry-With-Timeout        │
//! │  ┌──────────────────┐ ┌──────────────┐  │◀─│   Task Executor             │
//! │  │  LegacyNodeApi   │ │   NodeApi    │  │  │   (deadline + cancellation) │
//! │  │  (/v1, basic)    │ │ (/v2, token) │  │  └─────────────────────────────┘
//! │  └──────────────────┘ └──────┬───────┘  │
//! └──────────────────────────────┼──────────┘
//!                                │
//!            ┌───────────────────┴───────────────────┐
//!            ▼                                       ▼
//! ┌─────────────────────────────┐     ┌─────────────────────────────┐
//! │  Authentication Session     │────▶│  Error Taxonomy Mapper      │
//! │  Manager (SessionCache)     │     │  (status -> Error kind)     │
//! └─────────────────────────────┘     └─────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: the facade, authentication and error classification
//! - [`task`]: generic bounded-retry execution under a deadline
//! - [`domain`]: node records and per-generation ports
//! - [`config`]: endpoint and timeout configuration
//! - [`error`]: the fixed error taxonomy

pub mod config;
pub mod controlplane;
pub mod domain;
pub mod error;
pub mod task;

// Re-export commonly used types
pub use config::{ClientConfig, ConfigError, Endpoint};

pub use controlplane::{
    classify, classify_status, AuthSession, Authenticator, ControlPlaneClient, Credentials,
    SessionCache,
};

pub use domain::{
    LegacyNode, LegacyNodeApi, LegacyNodeUpdate, Node, NodeApi, NodeUpdate,
};

pub use error::{Error, ErrorAction, ErrorKind, Result};

pub use task::{run, Attempt, RetryPolicy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
