//! Process launch and the in-container init role.

mod init;
mod launcher;
mod nsenter;

pub use init::run_container_init;
pub use launcher::launch;
pub use nsenter::{maybe_enter_container, ENV_EXEC_CMD, ENV_EXEC_PID};

/// File descriptor on which the init role receives its startup command.
pub(crate) const STARTUP_PIPE_FD: i32 = 3;

/// File descriptor on which the init role signals that it is running,
/// and therefore past the pre-exec namespace setup.
pub(crate) const READY_PIPE_FD: i32 = 4;
