//! Container records and lifecycle orchestration.

mod ops;
mod record;
mod run;
mod store;

pub use ops::{commit, exec, list, logs, remove, stop};
pub use record::{ContainerRecord, Status};
pub use run::{run, RunOptions};
pub use store::RecordStore;
