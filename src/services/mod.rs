pub mod auth;
pub mod idempotency;
pub mod jobs;
pub mod memory;
pub mod processor;
pub mod queue;
pub mod store;
pub mod worker;
