#![allow(unsafe_code)]
//! The in-container init role.
//!
//! The launcher re-executes this binary as `skiff init` inside the new
//! namespaces. The init role reads its startup command from the
//! inherited pipe, switches the root filesystem to the merged view,
//! mounts `/proc` and `/dev`, and replaces itself with the user
//! command. On success nothing after the exec ever runs.

use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::os::unix::io::FromRawFd;
use std::path::Path;

use skiff_common::{SkiffError, SkiffResult};

use super::{READY_PIPE_FD, STARTUP_PIPE_FD};

/// Name of the scratch directory the old root is pivoted into.
const PUT_OLD: &str = ".old_root";

/// Run the init role. Does not return on success.
pub fn run_container_init() -> SkiffResult<()> {
    signal_ready()?;
    let argv = read_startup_command()?;
    if argv.is_empty() {
        return Err(SkiffError::Config {
            message: "no startup command received on the init pipe".to_string(),
        });
    }

    tracing::info!(command = ?argv, "Container init starting");

    setup_rootfs()?;
    mount_essentials()?;
    exec_user_command(&argv)
}

/// Tell the launcher we are running. Reaching userspace here means the
/// pre-exec namespace setup is complete, so the launcher may start
/// configuring cgroups and the network against our pid.
fn signal_ready() -> SkiffResult<()> {
    use std::io::Write;

    // Safety: fd 4 was placed there by the launcher and is owned by
    // this process alone. Dropping the File closes it.
    let mut pipe = unsafe { File::from_raw_fd(READY_PIPE_FD) };
    pipe.write_all(&[1])?;
    Ok(())
}

/// Read the full startup command from the inherited pipe (blocking
/// until the launcher closes its end) and split it on whitespace.
fn read_startup_command() -> SkiffResult<Vec<String>> {
    // Safety: fd 3 was placed there by the launcher and is owned by
    // this process alone.
    let mut pipe = unsafe { File::from_raw_fd(STARTUP_PIPE_FD) };
    let mut raw = String::new();
    pipe.read_to_string(&mut raw)?;
    Ok(raw.split_whitespace().map(str::to_string).collect())
}

/// Switch the root filesystem to the merged view the launcher set as
/// our working directory.
fn setup_rootfs() -> SkiffResult<()> {
    use rustix::mount::{
        mount_change, mount_bind_recursive, unmount, MountPropagationFlags, UnmountFlags,
    };

    // Keep our mount events from propagating back to the host.
    mount_change(
        "/",
        MountPropagationFlags::PRIVATE | MountPropagationFlags::REC,
    )
    .map_err(|e| SkiffError::Io(e.into()))?;

    let new_root = std::env::current_dir()?;

    // pivot_root requires the new root to be a mount point; binding it
    // onto itself (recursively, so the volume binds survive) makes it one.
    mount_bind_recursive(&new_root, &new_root).map_err(|e| SkiffError::Io(e.into()))?;

    let put_old = new_root.join(PUT_OLD);
    if !put_old.exists() {
        std::fs::create_dir(&put_old)?;
    }

    rustix::process::pivot_root(&new_root, &put_old).map_err(|e| SkiffError::Io(e.into()))?;
    std::env::set_current_dir("/")?;

    let old_root = Path::new("/").join(PUT_OLD);
    unmount(&old_root, UnmountFlags::DETACH).map_err(|e| SkiffError::Io(e.into()))?;
    std::fs::remove_dir(&old_root)?;

    tracing::debug!(root = %new_root.display(), "Root filesystem switched");
    Ok(())
}

/// Mount a restricted `/proc` and a tmpfs `/dev` inside the new root.
fn mount_essentials() -> SkiffResult<()> {
    use rustix::mount::{mount, MountFlags};

    let none = CString::new("").unwrap();

    std::fs::create_dir_all("/proc")?;
    mount(
        "proc",
        "/proc",
        CString::new("proc").unwrap().as_c_str(),
        MountFlags::NOEXEC | MountFlags::NOSUID | MountFlags::NODEV,
        none.as_c_str(),
    )
    .map_err(|e| SkiffError::Io(e.into()))?;

    std::fs::create_dir_all("/dev")?;
    mount(
        "tmpfs",
        "/dev",
        CString::new("tmpfs").unwrap().as_c_str(),
        MountFlags::NOSUID | MountFlags::STRICTATIME,
        CString::new("mode=755").unwrap().as_c_str(),
    )
    .map_err(|e| SkiffError::Io(e.into()))?;

    Ok(())
}

/// Replace this process with the user command, resolving it through
/// `PATH`. Only returns on failure.
fn exec_user_command(argv: &[String]) -> SkiffResult<()> {
    let c_args: Vec<CString> = argv
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<Result<_, _>>()
        .map_err(|_| SkiffError::Config {
            message: "startup command contains a NUL byte".to_string(),
        })?;

    let mut ptrs: Vec<*const libc::c_char> = c_args.iter().map(|c| c.as_ptr()).collect();
    ptrs.push(std::ptr::null());

    // Safety: ptrs is NULL-terminated and the CStrings outlive the call.
    unsafe {
        libc::execvp(ptrs[0], ptrs.as_ptr());
    }

    Err(SkiffError::Io(std::io::Error::last_os_error()))
}
