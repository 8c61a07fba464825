#![forbid(unsafe_code)]

pub mod coalesce;
pub mod config;
pub mod error;
pub mod gate;
pub mod server;

pub use coalesce::{CoalescingQueue, QueueError, Ticket};
pub use config::{load_from_path, Config};
pub use error::{Result, TriageError};
pub use gate::{AdmissionGate, Decision, GatePolicy};
pub use server::run;
