// Single-flight FIFO operation queue

mod core;
mod errors;

pub use self::core::{execute_mobile_safe, OperationQueue};
pub use self::errors::{QueueError, QueueResult};
