//! Bounded-time, bounded-retry task execution
//!
//! Generic over the work being retried: the facade's API calls, waiting for a
//! node to register, or anything else the caller needs done under a deadline.

pub mod executor;

pub use executor::*;
