use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::env::DAEMON_PROCESS_NAME;
use crate::error::{GardenError, Result};
use crate::health::{Endpoint, HealthChecker, VersionProbe};
use crate::install;
use crate::process::{owning_ancestor, ProcessTable};

/// Interval between health / liveness polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll `predicate` every `interval` until it holds or `deadline` elapses.
///
/// `deadline: None` polls forever, matching the original blocking
/// behavior; callers wanting a bounded wait pass a deadline and get
/// `false` back when it runs out.
pub async fn poll_until<F, Fut>(
    mut predicate: F,
    interval: Duration,
    deadline: Option<Duration>,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();
    loop {
        if predicate().await {
            return true;
        }
        if deadline.is_some_and(|d| started.elapsed() >= d) {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Handle to a starter process launched by this toolchain.
///
/// Whoever holds the handle owns the instance and is responsible for
/// calling [`stop_supervisor`] before letting it go; dropping the handle
/// leaves the starter running.
pub struct SupervisedProcess {
    child: Child,
}

impl SupervisedProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the starter process has not yet exited.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask the starter to shut down (SIGTERM on Unix).
    pub fn terminate(&mut self) -> Result<()> {
        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        #[cfg(unix)]
        {
            let rc = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if rc != 0 {
                return Err(GardenError::Terminate {
                    pid: pid as i32,
                    reason: std::io::Error::last_os_error().to_string(),
                });
            }
            Ok(())
        }

        #[cfg(not(unix))]
        {
            self.child.start_kill().map_err(|e| GardenError::Terminate {
                pid: pid as i32,
                reason: e.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Discard the starter's stdout/stderr instead of inheriting them.
    pub quiet: bool,
    /// Give up with an error if the daemon is not healthy by then.
    /// `None` waits forever.
    pub health_timeout: Option<Duration>,
}

/// Launch the daemon under its starter and block until it is healthy.
///
/// `exe_path` may be the install root or the starter binary itself. The
/// starter runs with its own directory as working directory and appended
/// to `PATH`, so it can find the co-located `arangod` binary.
pub async fn start<T, P>(
    exe_path: &Path,
    data_path: &Path,
    endpoint: &Endpoint,
    checker: &HealthChecker<T, P>,
    options: &StartOptions,
) -> Result<SupervisedProcess>
where
    T: ProcessTable,
    P: VersionProbe,
{
    let exe = install::exe_path(exe_path);
    let working_dir = exe.parent().unwrap_or(Path::new("."));

    let path_var = match std::env::var("PATH") {
        Ok(current) => format!("{}:{}", current, working_dir.display()),
        Err(_) => working_dir.display().to_string(),
    };

    info!(exe = %exe.display(), data = %data_path.display(), "Starting ArangoDB starter");

    let mut command = Command::new(&exe);
    command
        .arg("--starter.mode")
        .arg("single")
        .arg("--starter.data-dir")
        .arg(data_path)
        .current_dir(working_dir)
        .env("PATH", path_var);

    if options.quiet {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let child = command.spawn().map_err(|e| GardenError::Spawn {
        reason: format!("{}: {}", exe.display(), e),
    })?;
    let mut supervised = SupervisedProcess { child };
    debug!(pid = ?supervised.id(), "Starter spawned, waiting for health");

    let healthy = poll_until(
        || checker.is_running(endpoint),
        POLL_INTERVAL,
        options.health_timeout,
    )
    .await;

    if !healthy {
        let waited = options.health_timeout.unwrap_or_default();
        warn!(?waited, "Daemon never became healthy, tearing starter down");
        supervised.terminate()?;
        return Err(GardenError::NotHealthy { waited });
    }

    info!(pid = ?supervised.id(), "Daemon is healthy");
    Ok(supervised)
}

/// Stop a running daemon by terminating the ancestor that owns it.
///
/// Stateless: the daemon is rediscovered by process name, then the
/// two-hop ancestor walk picks the launcher or, when the marker argument
/// is present, the outer process that started the whole chain. No
/// matching daemon process is a no-op, so stopping twice is safe.
pub fn stop(table: &impl ProcessTable) -> Result<()> {
    let processes = table.list()?;

    let Some(daemon) = processes.iter().find(|p| p.name == DAEMON_PROCESS_NAME) else {
        debug!("No daemon process found, nothing to stop");
        return Ok(());
    };

    match owning_ancestor(&processes, daemon) {
        Some(pid) => {
            info!(daemon_pid = daemon.pid, owner_pid = pid, "Stopping daemon");
            table.terminate(pid)
        }
        None => {
            // Ancestry snapshot is incomplete (launcher already gone);
            // killing the daemon directly would leave the starter respawning
            // it, so do nothing.
            warn!(daemon_pid = daemon.pid, "Daemon has no visible launcher, not stopping");
            Ok(())
        }
    }
}

/// Stop a starter we launched and wait for it to die.
///
/// Absent handle is a no-op: the caller never started anything.
pub async fn stop_supervisor(
    handle: Option<SupervisedProcess>,
    timeout: Option<Duration>,
) -> Result<()> {
    let Some(mut supervised) = handle else {
        return Ok(());
    };

    debug!(pid = ?supervised.id(), "Stopping starter");
    supervised.terminate()?;

    let dead = poll_until(
        || {
            let alive = supervised.is_alive();
            async move { !alive }
        },
        POLL_INTERVAL,
        timeout,
    )
    .await;

    if !dead {
        return Err(GardenError::DidNotTerminate {
            waited: timeout.unwrap_or_default(),
        });
    }

    debug!("Starter terminated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::testing::FakeProbe;
    use crate::process::testing::{daemon_proc, proc, FakeProcessTable};

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_deadline_elapses() {
        let satisfied = poll_until(
            || async { false },
            Duration::from_millis(100),
            Some(Duration::from_secs(1)),
        )
        .await;
        assert!(!satisfied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_predicate_flips() {
        let mut calls = 0;
        let satisfied = poll_until(
            || {
                calls += 1;
                let done = calls >= 3;
                async move { done }
            },
            Duration::from_millis(100),
            None,
        )
        .await;
        assert!(satisfied);
    }

    #[test]
    fn test_stop_without_daemon_is_noop() {
        let table = FakeProcessTable::fixed(vec![proc(10, 1, "postgres", &["postgres"])]);
        stop(&table).unwrap();
        assert!(table.terminated_pids().is_empty());
    }

    #[test]
    fn test_stop_terminates_launcher_without_marker() {
        let table = FakeProcessTable::fixed(vec![
            proc(1, 0, "systemd", &["/sbin/init"]),
            proc(50, 1, "arangodb", &["arangodb", "--starter.mode", "single"]),
            daemon_proc(60, 50, 8529),
        ]);
        stop(&table).unwrap();
        assert_eq!(table.terminated_pids(), vec![50]);
    }

    #[test]
    fn test_stop_terminates_marked_grandparent() {
        let table = FakeProcessTable::fixed(vec![
            proc(40, 1, "conceptnet-rocks", &["conceptnet-rocks", "start-arangodb"]),
            proc(50, 40, "arangodb", &["arangodb"]),
            daemon_proc(60, 50, 8529),
        ]);
        stop(&table).unwrap();
        assert_eq!(table.terminated_pids(), vec![40]);
    }

    #[tokio::test]
    async fn test_stop_supervisor_absent_handle_is_noop() {
        stop_supervisor(None, Some(Duration::from_secs(1)))
            .await
            .unwrap();
    }

    #[cfg(unix)]
    fn write_fake_starter(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;

        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let script = bin.join("arangodb");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_then_stop_supervisor() {
        let dir = tempfile::tempdir().unwrap();
        write_fake_starter(dir.path());

        // Daemon appears in the table one poll after the spawn.
        let checker = HealthChecker::new(
            FakeProcessTable::sequence(vec![vec![], vec![daemon_proc(60, 50, 8529)]]),
            FakeProbe::healthy(true),
        );
        let endpoint = Endpoint::new("http://localhost:8529");

        let options = StartOptions {
            quiet: true,
            health_timeout: Some(Duration::from_secs(5)),
        };
        let mut handle = start(
            dir.path(),
            &dir.path().join("data"),
            &endpoint,
            &checker,
            &options,
        )
        .await
        .unwrap();

        assert!(handle.is_alive());

        stop_supervisor(Some(handle), Some(Duration::from_secs(5)))
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_fails_when_never_healthy() {
        let dir = tempfile::tempdir().unwrap();
        write_fake_starter(dir.path());

        let checker = HealthChecker::new(
            FakeProcessTable::fixed(vec![]),
            FakeProbe::healthy(false),
        );
        let endpoint = Endpoint::new("http://localhost:8529");

        let options = StartOptions {
            quiet: true,
            health_timeout: Some(Duration::from_millis(300)),
        };
        let result = start(
            dir.path(),
            &dir.path().join("data"),
            &endpoint,
            &checker,
            &options,
        )
        .await;

        assert!(matches!(result, Err(GardenError::NotHealthy { .. })));
    }
}
