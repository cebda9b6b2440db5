//! Cgroup v1 hierarchy discovery.

use std::path::PathBuf;

use skiff_common::{SkiffError, SkiffResult};

/// Find the mount point of the hierarchy carrying `subsystem` by
/// scanning `/proc/self/mountinfo`.
///
/// A v1 cgroup line ends in `- cgroup cgroup rw,<options>` where the
/// options name the controllers bound to that hierarchy.
pub fn find_cgroup_mountpoint(subsystem: &str) -> SkiffResult<PathBuf> {
    let mountinfo = std::fs::read_to_string("/proc/self/mountinfo")?;
    mountpoint_from_mountinfo(&mountinfo, subsystem).ok_or_else(|| SkiffError::Config {
        message: format!("no cgroup hierarchy mounted for subsystem {subsystem}"),
    })
}

fn mountpoint_from_mountinfo(mountinfo: &str, subsystem: &str) -> Option<PathBuf> {
    for line in mountinfo.lines() {
        let Some((mount_fields, fs_fields)) = line.split_once(" - ") else {
            continue;
        };
        let mut fs = fs_fields.split_whitespace();
        if fs.next() != Some("cgroup") {
            continue;
        }
        let _source = fs.next();
        let Some(super_options) = fs.next() else {
            continue;
        };
        if super_options.split(',').any(|opt| opt == subsystem) {
            let mount_point = mount_fields.split_whitespace().nth(4)?;
            return Some(PathBuf::from(mount_point));
        }
    }
    None
}

/// Absolute path of the control group `cgroup` in the hierarchy of
/// `subsystem`, creating the group directory when `auto_create` is set.
pub fn cgroup_path(subsystem: &str, cgroup: &str, auto_create: bool) -> SkiffResult<PathBuf> {
    let root = find_cgroup_mountpoint(subsystem)?;
    let path = root.join(cgroup);
    if auto_create && !path.exists() {
        std::fs::create_dir_all(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                SkiffError::PermissionDenied {
                    operation: format!("create cgroup {}", path.display()),
                }
            } else {
                SkiffError::Io(e)
            }
        })?;
    }
    Ok(path)
}
