//! Job fan-out pipeline
//!
//! A submitted job is split into one queue message per item. Workers process
//! items idempotently, record one result per item and count progress until the
//! job completes. The API exposes submission, status and results.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod shutdown;
pub mod telemetry;
