use crate::env::{DAEMON_PROCESS_NAME, STARTER_MARKER_ARGUMENT};
use crate::error::Result;

/// Point-in-time view of one OS process. Process identities are ephemeral,
/// so snapshots are taken fresh for every decision and never cached.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: i32,
    pub parent_pid: i32,
    pub name: String,
    pub cmdline: Vec<String>,
    pub listen_ports: Vec<u16>,
}

/// Injected view of the OS process table.
///
/// The health checker and the stop path only ever see the table through
/// this trait, so tests can substitute a synthetic one.
pub trait ProcessTable: Send + Sync {
    /// Snapshot all visible processes.
    fn list(&self) -> Result<Vec<ProcessInfo>>;

    /// Ask a process to terminate (SIGTERM semantics).
    fn terminate(&self, pid: i32) -> Result<()>;
}

/// Find the `arangod` daemon bound to `port`.
///
/// Returns `None` when no process carries the daemon name, or when the
/// named process is not listening on the expected port (e.g. a stale
/// instance from another install serving a different endpoint).
pub fn find_daemon(processes: &[ProcessInfo], port: u16) -> Option<&ProcessInfo> {
    processes
        .iter()
        .find(|proc| proc.name == DAEMON_PROCESS_NAME)
        .filter(|proc| proc.listen_ports.contains(&port))
}

/// Decide which ancestor of the daemon owns the supervision chain.
///
/// The daemon is launched by the starter script, which may itself have been
/// launched by an outer tool that went through our `start` entry point. In
/// that topology the grandparent carries the marker argument and owns the
/// whole chain; terminating only the starter would orphan it. Exactly two
/// hops are walked; deeper chains do not occur with the supported starter.
pub fn owning_ancestor(processes: &[ProcessInfo], daemon: &ProcessInfo) -> Option<i32> {
    let by_pid = |pid: i32| processes.iter().find(|proc| proc.pid == pid);

    let launcher = by_pid(daemon.parent_pid)?;
    if let Some(grandparent) = by_pid(launcher.parent_pid) {
        if grandparent
            .cmdline
            .iter()
            .any(|arg| arg == STARTER_MARKER_ARGUMENT)
        {
            return Some(grandparent.pid);
        }
    }
    Some(launcher.pid)
}

#[cfg(target_os = "linux")]
mod system {
    use std::collections::HashMap;

    use procfs::net::TcpState;
    use procfs::process::FDTarget;

    use super::{ProcessInfo, ProcessTable};
    use crate::error::{GardenError, Result};

    /// Live process table backed by /proc.
    pub struct SystemProcessTable;

    impl SystemProcessTable {
        /// Socket inode -> listening port, joined from /proc/net/tcp[6].
        fn listening_inodes() -> HashMap<u64, u16> {
            let mut map = HashMap::new();
            let entries = procfs::net::tcp()
                .into_iter()
                .chain(procfs::net::tcp6())
                .flatten();
            for entry in entries {
                if entry.state == TcpState::Listen {
                    map.insert(entry.inode, entry.local_address.port());
                }
            }
            map
        }
    }

    impl ProcessTable for SystemProcessTable {
        fn list(&self) -> Result<Vec<ProcessInfo>> {
            let listening = Self::listening_inodes();

            let procs = procfs::process::all_processes()
                .map_err(|e| GardenError::ProcessTable(e.to_string()))?;

            let mut result = Vec::new();
            for proc in procs.flatten() {
                // Processes can vanish mid-scan; skip anything unreadable.
                let Ok(stat) = proc.stat() else { continue };

                let listen_ports = proc
                    .fd()
                    .map(|fds| {
                        fds.flatten()
                            .filter_map(|fd| match fd.target {
                                FDTarget::Socket(inode) => listening.get(&inode).copied(),
                                _ => None,
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                result.push(ProcessInfo {
                    pid: stat.pid,
                    parent_pid: stat.ppid,
                    name: stat.comm.clone(),
                    cmdline: proc.cmdline().unwrap_or_default(),
                    listen_ports,
                });
            }
            Ok(result)
        }

        fn terminate(&self, pid: i32) -> Result<()> {
            tracing::debug!(pid, "Sending SIGTERM");
            let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
            if rc == 0 {
                Ok(())
            } else {
                Err(GardenError::Terminate {
                    pid,
                    reason: std::io::Error::last_os_error().to_string(),
                })
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use system::SystemProcessTable;

#[cfg(not(target_os = "linux"))]
mod system {
    use super::{ProcessInfo, ProcessTable};
    use crate::error::{GardenError, Result};

    /// Placeholder on unsupported hosts; every call fails.
    pub struct SystemProcessTable;

    impl ProcessTable for SystemProcessTable {
        fn list(&self) -> Result<Vec<ProcessInfo>> {
            Err(GardenError::UnsupportedPlatform)
        }

        fn terminate(&self, _pid: i32) -> Result<()> {
            Err(GardenError::UnsupportedPlatform)
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use system::SystemProcessTable;


#[cfg(test)]
mod tests {
    use super::testing::{daemon_proc, proc};
    use super::*;

    #[test]
    fn test_find_daemon_requires_name_and_port() {
        let procs = vec![
            proc(10, 1, "postgres", &["postgres"]),
            daemon_proc(20, 11, 8529),
        ];

        assert_eq!(find_daemon(&procs, 8529).map(|p| p.pid), Some(20));
        // Right name, wrong port.
        assert!(find_daemon(&procs, 9999).is_none());
        // No daemon at all.
        assert!(find_daemon(&procs[..1], 8529).is_none());
    }

    #[test]
    fn test_owning_ancestor_without_marker_is_launcher() {
        let procs = vec![
            proc(1, 0, "systemd", &["/sbin/init"]),
            proc(50, 1, "arangodb", &["arangodb", "--starter.mode", "single"]),
            daemon_proc(60, 50, 8529),
        ];
        let daemon = procs.last().unwrap();

        assert_eq!(owning_ancestor(&procs, daemon), Some(50));
    }

    #[test]
    fn test_owning_ancestor_with_marker_is_grandparent() {
        let procs = vec![
            proc(40, 1, "other-tool", &["other-tool", "start-arangodb"]),
            proc(50, 40, "arangodb", &["arangodb", "--starter.mode", "single"]),
            daemon_proc(60, 50, 8529),
        ];
        let daemon = procs.last().unwrap();

        assert_eq!(owning_ancestor(&procs, daemon), Some(40));
    }

    #[test]
    fn test_owning_ancestor_missing_parent() {
        let procs = vec![daemon_proc(60, 50, 8529)];
        assert_eq!(owning_ancestor(&procs, &procs[0]), None);
    }
}
