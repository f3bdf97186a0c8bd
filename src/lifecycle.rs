use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::env;
use crate::error::Result;
use crate::health::{Endpoint, HealthChecker, VersionProbe};
use crate::process::ProcessTable;
use crate::supervisor::{self, StartOptions, SupervisedProcess};

/// How a coordinated instance is started and torn down.
#[derive(Debug, Clone)]
pub struct InstanceOptions {
    /// Install root or starter binary path.
    pub exe_path: PathBuf,
    /// Daemon data directory.
    pub data_path: PathBuf,
    pub start: StartOptions,
    /// Deadline for the starter to die during teardown (`None` = wait forever).
    pub stop_timeout: Option<Duration>,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            exe_path: env::install_path(),
            data_path: env::data_path(),
            start: StartOptions::default(),
            stop_timeout: None,
        }
    }
}

/// Start the daemon unless one is already healthy at the endpoint.
///
/// Returns `None` exactly when the daemon was already running: the caller
/// then owns nothing and must not stop anything. A `Some` handle is the
/// caller's to tear down.
pub async fn start_if_not_running<T, P>(
    endpoint: &Endpoint,
    checker: &HealthChecker<T, P>,
    options: &InstanceOptions,
) -> Result<Option<SupervisedProcess>>
where
    T: ProcessTable,
    P: VersionProbe,
{
    if checker.is_running(endpoint).await {
        info!("Daemon already running, leaving it alone");
        return Ok(None);
    }

    supervisor::start(
        &options.exe_path,
        &options.data_path,
        endpoint,
        checker,
        &options.start,
    )
    .await
    .map(Some)
}

/// Run `work` against a daemon instance, starting one first if needed.
///
/// Whatever this call started is stopped on every exit path, including
/// when `work` fails; an instance that was already running externally is
/// left untouched. When both `work` and the teardown fail, the work's
/// error wins. Exit paths are `Ok`/`Err` returns only: a panicking `work`
/// unwinds past the teardown (async teardown cannot run in `Drop`), so
/// report failures as errors, not panics, when the instance must go away.
pub async fn with_instance<T, P, W, Fut, R>(
    endpoint: &Endpoint,
    checker: &HealthChecker<T, P>,
    options: &InstanceOptions,
    work: W,
) -> anyhow::Result<R>
where
    T: ProcessTable,
    P: VersionProbe,
    W: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
{
    let handle = start_if_not_running(endpoint, checker, options).await?;
    debug!(started = handle.is_some(), "Instance scope entered");

    let result = work().await;

    let teardown = supervisor::stop_supervisor(handle, options.stop_timeout).await;

    let value = result?;
    teardown?;
    Ok(value)
}
