//! HTTP load generator for the `/api/v1/messages` service.
//!
//! A [`dispatch::Engine`] drives a mix of GET and POST requests either on a
//! fixed tick for a duration or through a fixed pool of workers until a
//! request quota is spent, and collects the outcomes in a shared
//! [`stats::Recorder`].

pub mod client;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod model;
pub mod report;
pub mod shutdown;
pub mod stats;
pub mod worker;
pub mod workload;
