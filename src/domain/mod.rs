//! Domain layer - Resource shapes and port definitions
//!
//! The two API generations describe nodes differently, so each keeps its own
//! record type. The ports expose one trait per generation.

pub mod node;
pub mod ports;

pub use node::*;
pub use ports::*;
