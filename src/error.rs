use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GardenError {
    #[error("only GNU/Linux is supported")]
    UnsupportedPlatform,

    #[error("file exists at install path: {path}")]
    InstallPathExists { path: PathBuf },

    #[error("install directory exists and is not empty: {path}")]
    InstallPathNotEmpty { path: PathBuf },

    #[error("no ArangoDB versions found in the download index")]
    NoVersionsFound,

    #[error("cannot parse version string: {version}")]
    InvalidVersion { version: String },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("archive extraction failed: {0}")]
    Archive(String),

    #[error("cannot parse connection URI: {uri}")]
    InvalidUri { uri: String },

    #[error("failed to spawn starter process: {reason}")]
    Spawn { reason: String },

    #[error("daemon did not become healthy within {waited:?}")]
    NotHealthy { waited: Duration },

    #[error("supervisor did not terminate within {waited:?}")]
    DidNotTerminate { waited: Duration },

    #[error("failed to terminate process {pid}: {reason}")]
    Terminate { pid: i32, reason: String },

    #[error("process enumeration failed: {0}")]
    ProcessTable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GardenError>;
