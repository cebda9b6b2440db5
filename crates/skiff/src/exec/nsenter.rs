#![allow(unsafe_code)]
//! Namespace re-entry for `skiff exec`.
//!
//! The exec command re-executes this binary with two environment
//! variables carrying the target PID and command. The re-executed
//! process calls [`maybe_enter_container`] before any CLI parsing,
//! joins the target's namespaces and runs the command instead of
//! creating a new container.

use std::fs::File;
use std::os::unix::io::AsRawFd;

/// Environment variable carrying the PID of the container to enter.
pub const ENV_EXEC_PID: &str = "SKIFF_EXEC_PID";
/// Environment variable carrying the command to run inside it.
pub const ENV_EXEC_CMD: &str = "SKIFF_EXEC_CMD";

/// Namespaces joined, in order. The mount namespace comes last so the
/// proc paths stay resolvable while joining the others.
const NAMESPACES: &[&str] = &["ipc", "uts", "net", "pid", "mnt"];

/// Enter the namespaces named by the exec environment variables and run
/// the requested command, exiting with its status. Returns immediately
/// when the variables are not set.
///
/// Errors are written to stderr directly: this runs before the tracing
/// subscriber is installed.
pub fn maybe_enter_container() {
    let (Ok(pid), Ok(cmd)) = (std::env::var(ENV_EXEC_PID), std::env::var(ENV_EXEC_CMD)) else {
        return;
    };

    for ns in NAMESPACES {
        let path = format!("/proc/{pid}/ns/{ns}");
        match File::open(&path) {
            Ok(file) => {
                if unsafe { libc::setns(file.as_raw_fd(), 0) } != 0 {
                    eprintln!(
                        "skiff: setns into {ns} namespace of pid {pid} failed: {}",
                        std::io::Error::last_os_error()
                    );
                }
            }
            Err(err) => eprintln!("skiff: cannot open {path}: {err}"),
        }
    }

    let status = std::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(&cmd)
        .status();

    let code = match status {
        Ok(status) => status.code().unwrap_or(1),
        Err(err) => {
            eprintln!("skiff: failed to run {cmd:?} in container: {err}");
            1
        }
    };
    std::process::exit(code);
}
