use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::env;
use crate::error::{GardenError, Result};
use crate::process::{find_daemon, ProcessTable};

/// Where to probe for a live daemon, and with which credentials.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub connection_uri: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Endpoint {
    pub fn new(connection_uri: &str) -> Self {
        Self {
            connection_uri: connection_uri.to_string(),
            database: env::SYSTEM_DATABASE.to_string(),
            username: env::DEFAULT_USERNAME.to_string(),
            password: env::DEFAULT_PASSWORD.to_string(),
        }
    }

    /// Same endpoint, but authenticating as root with the given password.
    pub fn with_root_credentials(mut self, root_password: &str) -> Self {
        self.username = env::DEFAULT_USERNAME.to_string();
        self.password = root_password.to_string();
        self
    }

    /// TCP port encoded in the connection URI (scheme default if absent).
    pub fn port(&self) -> Result<u16> {
        let url = url::Url::parse(&self.connection_uri).map_err(|_| GardenError::InvalidUri {
            uri: self.connection_uri.clone(),
        })?;
        url.port_or_known_default().ok_or(GardenError::InvalidUri {
            uri: self.connection_uri.clone(),
        })
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(&env::connection_uri())
    }
}

/// Authenticated protocol-level liveness probe.
#[async_trait]
pub trait VersionProbe: Send + Sync {
    /// True iff the database layer answered the version request.
    /// Probe failures of any kind are reported as `false`, never raised.
    async fn check(&self, endpoint: &Endpoint) -> bool;
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    server: String,
    version: String,
}

/// Probe via ArangoDB's HTTP version API with basic auth.
pub struct HttpVersionProbe {
    client: reqwest::Client,
}

impl HttpVersionProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpVersionProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionProbe for HttpVersionProbe {
    async fn check(&self, endpoint: &Endpoint) -> bool {
        let url = format!(
            "{}/_db/{}/_api/version",
            endpoint.connection_uri.trim_end_matches('/'),
            endpoint.database
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(&endpoint.username, Some(&endpoint.password))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(e) => {
                        debug!(error = %e, "Version probe body read failed");
                        return false;
                    }
                };
                match serde_json::from_slice::<VersionResponse>(&body) {
                    Ok(info) => {
                        trace!(server = %info.server, version = %info.version, "Version probe ok");
                        true
                    }
                    Err(e) => {
                        debug!(error = %e, "Version probe returned unparseable body");
                        false
                    }
                }
            }
            Ok(response) => {
                debug!(status = %response.status(), "Version probe rejected");
                false
            }
            Err(e) => {
                debug!(error = %e, "Version probe transport failure");
                false
            }
        }
    }
}

/// Determines whether the daemon behind an endpoint is alive and serving.
pub struct HealthChecker<T, P> {
    table: T,
    probe: P,
}

impl<T: ProcessTable, P: VersionProbe> HealthChecker<T, P> {
    pub fn new(table: T, probe: P) -> Self {
        Self { table, probe }
    }

    /// True iff an `arangod` process exists, is bound to the endpoint's
    /// port, and the authenticated version probe succeeds.
    ///
    /// The process check runs first so that no network call is made when
    /// the daemon plainly is not there; the probe is still required
    /// because a process can exist mid-startup without serving yet.
    /// Never returns an error: every failure downgrades to "not running".
    pub async fn is_running(&self, endpoint: &Endpoint) -> bool {
        let Ok(port) = endpoint.port() else {
            return false;
        };
        let Ok(processes) = self.table.list() else {
            return false;
        };
        if find_daemon(&processes, port).is_none() {
            trace!(port, "No daemon process bound to port");
            return false;
        }
        self.probe.check(endpoint).await
    }

    pub fn table(&self) -> &T {
        &self.table
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{Endpoint, VersionProbe};

    /// Probe whose answer the test controls.
    pub(crate) struct FakeProbe {
        healthy: Arc<AtomicBool>,
    }

    impl FakeProbe {
        pub(crate) fn healthy(value: bool) -> Self {
            Self {
                healthy: Arc::new(AtomicBool::new(value)),
            }
        }
    }

    #[async_trait]
    impl VersionProbe for FakeProbe {
        async fn check(&self, _endpoint: &Endpoint) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeProbe;
    use super::*;
    use crate::process::testing::{daemon_proc, proc, FakeProcessTable};

    fn endpoint() -> Endpoint {
        Endpoint::new("http://localhost:8529")
    }

    #[test]
    fn test_version_response_body_parses() {
        let body = br#"{"server":"arango","version":"3.11.4","license":"community"}"#;
        let info: VersionResponse = serde_json::from_slice(body).unwrap();
        assert_eq!(info.server, "arango");
        assert_eq!(info.version, "3.11.4");
    }

    #[test]
    fn test_version_response_rejects_non_version_body() {
        assert!(serde_json::from_slice::<VersionResponse>(b"<html>login</html>").is_err());
    }

    #[test]
    fn test_endpoint_port() {
        assert_eq!(endpoint().port().unwrap(), 8529);
        assert_eq!(Endpoint::new("https://db.example.com").port().unwrap(), 443);
        assert!(Endpoint::new("not a uri").port().is_err());
    }

    // Health is the conjunction of process-exists, port-bound and
    // probe-succeeds; each row drops one leg.
    #[tokio::test]
    async fn test_running_requires_all_three_signals() {
        let cases = [
            (vec![daemon_proc(60, 50, 8529)], true, true),
            (vec![daemon_proc(60, 50, 8529)], false, false),
            (vec![daemon_proc(60, 50, 9999)], true, false),
            (vec![proc(60, 50, "postgres", &["postgres"])], true, false),
            (vec![], true, false),
        ];

        for (processes, probe_ok, expected) in cases {
            let checker = HealthChecker::new(
                FakeProcessTable::fixed(processes),
                FakeProbe::healthy(probe_ok),
            );
            assert_eq!(checker.is_running(&endpoint()).await, expected);
        }
    }

    #[tokio::test]
    async fn test_bad_uri_is_not_running() {
        let checker = HealthChecker::new(
            FakeProcessTable::fixed(vec![daemon_proc(60, 50, 8529)]),
            FakeProbe::healthy(true),
        );
        let bad = Endpoint::new("::nope::");
        assert!(!checker.is_running(&bad).await);
    }
}
