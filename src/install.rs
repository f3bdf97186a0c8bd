use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::env::{DOWNLOAD_ROOT_URL, STARTER_PROGRAM_NAME};
use crate::error::{GardenError, Result};
use crate::versions;

/// Resolve the starter executable for an install root.
///
/// Accepts either the install root (yielding `<root>/bin/arangodb`) or a
/// path that already points at the starter binary itself.
pub fn exe_path(path: &Path) -> PathBuf {
    if path.file_name().is_some_and(|name| name == STARTER_PROGRAM_NAME) {
        path.to_path_buf()
    } else {
        path.join("bin").join(STARTER_PROGRAM_NAME)
    }
}

/// Download and unpack an ArangoDB binary distribution into `path`.
///
/// `version` defaults to the newest version in the catalog. The target
/// directory must not yet exist (or be empty); these preconditions are
/// checked before any network traffic.
pub async fn install(path: &Path, version: Option<String>) -> Result<()> {
    if !cfg!(target_os = "linux") {
        return Err(GardenError::UnsupportedPlatform);
    }

    if path.exists() {
        if path.is_dir() {
            if path.read_dir()?.next().is_some() {
                return Err(GardenError::InstallPathNotEmpty {
                    path: path.to_path_buf(),
                });
            }
        } else {
            return Err(GardenError::InstallPathExists {
                path: path.to_path_buf(),
            });
        }
    }

    std::fs::create_dir_all(path)?;

    let version = match version {
        Some(v) => v,
        None => versions::latest_version().await?,
    };

    let url = archive_url(&version)?;
    info!(version = %version, url = %url, "Installing ArangoDB");

    let archive = download(&url).await?;
    extract_tar_gz(&archive, path)?;
    flatten_distribution_dir(path)?;
    set_bin_permissions(&path.join("bin"))?;

    info!(path = %path.display(), "ArangoDB installed");
    Ok(())
}

/// Archive URL for a version, e.g. 3.11.4-1 lives under
/// `arangodb311/Community/Linux/arangodb3-linux-3.11.4-1.tar.gz`.
fn archive_url(version: &str) -> Result<String> {
    let components = versions::version_components(version);
    let (major, minor) = match components.as_slice() {
        [major, minor, ..] => (*major, *minor),
        _ => {
            return Err(GardenError::InvalidVersion {
                version: version.to_string(),
            })
        }
    };

    Ok(format!(
        "{root}arangodb{major}{minor}/Community/Linux/arangodb{major}-linux-{version}.tar.gz",
        root = DOWNLOAD_ROOT_URL,
    ))
}

async fn download(url: &str) -> Result<Vec<u8>> {
    let mut response = reqwest::get(url).await.map_err(|e| GardenError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(GardenError::Download {
            url: url.to_string(),
            reason: format!("server returned status {}", response.status()),
        });
    }

    let pb = match response.content_length() {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40}] {bytes}/{total_bytes} {msg}")
                    .unwrap(),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };
    pb.set_message("Downloading ArangoDB");

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| GardenError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })? {
        bytes.extend_from_slice(&chunk);
        pb.inc(chunk.len() as u64);
    }

    pb.finish_with_message("Download complete");
    Ok(bytes)
}

fn extract_tar_gz(bytes: &[u8], target: &Path) -> Result<()> {
    let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(bytes));
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(target)
        .map_err(|e| GardenError::Archive(e.to_string()))?;
    Ok(())
}

/// The tarball wraps everything in a single `arangodb3*` directory; hoist
/// its contents into the install root and drop the wrapper.
fn flatten_distribution_dir(path: &Path) -> Result<()> {
    let wrapper = path
        .read_dir()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("arangodb3"))
        })
        .ok_or_else(|| {
            GardenError::Archive("no arangodb3* directory found in archive".to_string())
        })?;

    debug!(dir = %wrapper.display(), "Flattening distribution directory");

    for entry in wrapper.read_dir()? {
        let entry = entry?;
        std::fs::rename(entry.path(), path.join(entry.file_name()))?;
    }
    std::fs::remove_dir(&wrapper)?;

    Ok(())
}

#[cfg(unix)]
fn set_bin_permissions(bin_dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for entry in bin_dir.read_dir()? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(permissions.mode() | 0o111);
        std::fs::set_permissions(entry.path(), permissions)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_bin_permissions(_bin_dir: &Path) -> Result<()> {
    Ok(())
}
