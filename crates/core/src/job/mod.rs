//! Job payloads, budgets and the fan-out supervisor.

mod supervisor;
mod types;

pub use supervisor::{Supervisor, SweepReport};
pub use types::{Deadline, JobError, JobOutcome, JobRequest};
