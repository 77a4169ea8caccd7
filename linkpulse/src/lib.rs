//! Batch link checker: accepts lists of URLs, checks them concurrently with
//! a bounded worker pool and keeps the results in an in-memory store that
//! survives restarts through a JSON snapshot.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod logger;
pub mod message;
pub mod probe;
pub mod queue;
pub mod reporters;
pub mod runnable;
pub mod snapshot;
pub mod store;
pub mod worker_pool;

pub use config::Config;
pub use controller::Controller;
pub use error::CheckError;
pub use lifecycle::{LifecycleState, ShutdownOutcome};
pub use message::{Batch, BatchId, Link, LinkState};
pub use probe::{HttpProbe, Probe};
pub use store::Store;
