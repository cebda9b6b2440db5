#![allow(unsafe_code)]
//! Spawning the container's init process.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use skiff_common::{SkiffError, SkiffPaths, SkiffResult};

use super::{READY_PIPE_FD, STARTUP_PIPE_FD};

/// Launch the container's init process.
///
/// Re-executes the running binary with the `init` role in fresh UTS,
/// PID, mount, network and IPC namespaces, its working directory set to
/// the merged root filesystem built for this container. Returns the
/// child handle and the write end of the startup pipe; the caller sends
/// the command line down the pipe and closes it.
pub fn launch(
    paths: &SkiffPaths,
    tty: bool,
    name: &str,
    volume: &str,
    image: &str,
    env: &[String],
) -> SkiffResult<(Child, File)> {
    let merged = crate::filesystem::prepare(paths, volume, name, image)?;

    // Close-on-exec, so the init role holds no stray copy of the write
    // end and its read runs to EOF once the launcher closes the pipe.
    // The dup2'ed fds 3 and 4 below do not carry the flag and survive.
    let (read_end, write_end) = rustix::pipe::pipe_with(rustix::pipe::PipeFlags::CLOEXEC)
        .map_err(|e| SkiffError::Io(e.into()))?;
    let (ready_read, ready_write) = rustix::pipe::pipe_with(rustix::pipe::PipeFlags::CLOEXEC)
        .map_err(|e| SkiffError::Io(e.into()))?;

    let mut cmd = Command::new("/proc/self/exe");
    cmd.arg("init").current_dir(&merged);

    for entry in env {
        match entry.split_once('=') {
            Some((key, value)) => {
                cmd.env(key, value);
            }
            None => tracing::warn!(entry = %entry, "Ignoring malformed environment entry"),
        }
    }

    if tty {
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
    } else {
        let dir = paths.container_dir(name);
        std::fs::create_dir_all(&dir)?;
        let log = File::create(paths.container_log(name))?;
        tracing::debug!(log = %paths.container_log(name).display(), "Redirecting container output");
        cmd.stdout(Stdio::from(log));
    }

    let startup_fd = read_end.as_raw_fd();
    let ready_fd = ready_write.as_raw_fd();
    // Safety: the hook only calls async-signal-safe functions (dup2,
    // unshare) between fork and exec.
    unsafe {
        cmd.pre_exec(move || {
            if libc::dup2(startup_fd, STARTUP_PIPE_FD) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            if libc::dup2(ready_fd, READY_PIPE_FD) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            let flags = libc::CLONE_NEWUTS
                | libc::CLONE_NEWPID
                | libc::CLONE_NEWNS
                | libc::CLONE_NEWNET
                | libc::CLONE_NEWIPC;
            if libc::unshare(flags) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd.spawn()?;
    tracing::info!(name, pid = child.id(), "Container init process spawned");

    // The parent keeps only the startup pipe's write end.
    drop(read_end);
    drop(ready_write);

    // Block until the init role signals it is running: the caller is
    // about to configure cgroups and namespaces against this pid, which
    // must not happen before the pre-exec unshare has completed.
    wait_for_init(ready_read, name)?;

    Ok((child, File::from(write_end)))
}

fn wait_for_init(ready_read: std::os::fd::OwnedFd, name: &str) -> SkiffResult<()> {
    use std::io::Read;

    let mut ready = File::from(ready_read);
    let mut buf = [0u8; 1];
    let n = ready.read(&mut buf)?;
    if n == 0 {
        return Err(SkiffError::Internal {
            message: format!("container {name} init exited before signaling readiness"),
        });
    }
    tracing::debug!(name, "Container init is running");
    Ok(())
}
