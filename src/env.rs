use std::path::PathBuf;

/// Well-known executable name of the ArangoDB daemon itself.
pub const DAEMON_PROCESS_NAME: &str = "arangod";

/// Name of the starter binary that launches and babysits `arangod`.
pub const STARTER_PROGRAM_NAME: &str = "arangodb";

/// Marker argument that identifies a process which entered through our own
/// `start` entry point (embedded in another tool). The stop path uses it to
/// decide which ancestor owns the supervision chain.
pub const STARTER_MARKER_ARGUMENT: &str = "start-arangodb";

pub const DOWNLOAD_ROOT_URL: &str = "https://download.arangodb.com/";

pub const DEFAULT_PORT: u16 = 8529;
pub const SYSTEM_DATABASE: &str = "_system";
pub const DEFAULT_USERNAME: &str = "root";
pub const DEFAULT_PASSWORD: &str = "";

const INSTALL_SUBDIR: &str = ".arangodb";
const CACHE_SUBDIR: &str = "graph-garden";

const ENV_INSTALL_PATH: &str = "GRAPH_GARDEN_INSTALL_PATH";
const ENV_DATA_PATH: &str = "GRAPH_GARDEN_DATA_PATH";
const ENV_CACHE_DIR: &str = "GRAPH_GARDEN_CACHE_DIR";
const ENV_CONNECTION_URI: &str = "GRAPH_GARDEN_CONNECTION_URI";

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var).map(PathBuf::from)
}

/// Default connection URI ($GRAPH_GARDEN_CONNECTION_URI or http://localhost:8529)
pub fn connection_uri() -> String {
    let uri = std::env::var(ENV_CONNECTION_URI)
        .unwrap_or_else(|_| format!("http://localhost:{}", DEFAULT_PORT));
    tracing::trace!(uri = %uri, "Resolved connection URI");
    uri
}

/// ArangoDB install root ($GRAPH_GARDEN_INSTALL_PATH or ~/.arangodb)
pub fn install_path() -> PathBuf {
    let path = env_path(ENV_INSTALL_PATH).unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(INSTALL_SUBDIR)
    });
    tracing::trace!(path = %path.display(), "Resolved install path");
    path
}

/// Daemon data directory ($GRAPH_GARDEN_DATA_PATH or <install>/data)
pub fn data_path() -> PathBuf {
    let path = env_path(ENV_DATA_PATH).unwrap_or_else(|| install_path().join("data"));
    tracing::trace!(path = %path.display(), "Resolved data path");
    path
}

/// Version cache directory ($GRAPH_GARDEN_CACHE_DIR or <user-cache>/graph-garden)
pub fn cache_dir() -> PathBuf {
    let dir = env_path(ENV_CACHE_DIR).unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join(CACHE_SUBDIR)
    });
    tracing::trace!(dir = %dir.display(), "Resolved cache directory");
    dir
}
