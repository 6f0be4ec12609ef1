//! Mutation helpers layered on top of the services
//!
//! The services themselves fail fast; this module holds opt-in wrappers for
//! callers that want different failure handling.

pub mod retry_queue;

pub use retry_queue::{backoff_delay, RetryQueue, DEFAULT_MAX_RETRIES};
