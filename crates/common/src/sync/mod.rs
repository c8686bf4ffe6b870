//! Serialization of network operations on constrained runtimes
//!
//! ## Submodules
//!
//! - **`queue`**: FIFO operation queue guaranteeing at most one in-flight
//!   operation, used by the mobile shell where concurrent requests are
//!   unreliable

pub mod queue;

pub use queue::{execute_mobile_safe, OperationQueue, QueueError, QueueResult};
