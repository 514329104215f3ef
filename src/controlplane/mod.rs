//! Control Plane Client Module
//!
//! Talks to both API generations of the storage control plane and maps
//! their failures onto the client's error taxonomy.

pub mod auth;
pub mod classify;
pub mod client;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::*;
pub use classify::{classify, classify_status};
pub use client::*;
