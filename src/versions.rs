use regex::Regex;
use tracing::{debug, info};

use crate::env::{self, DOWNLOAD_ROOT_URL};
use crate::error::{GardenError, Result};

/// Oldest major release line the download index is scanned for (3.4).
const MIN_MAJOR_LINE: u32 = 34;

const CACHE_FILE_NAME: &str = "arangodb_versions.txt";

/// List installable ArangoDB release versions, oldest first.
///
/// Results are cached on disk; pass `clear_cache` to re-scrape the
/// download index.
pub async fn list_versions(clear_cache: bool) -> Result<Vec<String>> {
    let cache_path = env::cache_dir().join(CACHE_FILE_NAME);

    if !clear_cache && cache_path.is_file() {
        debug!(path = %cache_path.display(), "Using cached version list");
        let cached = std::fs::read_to_string(&cache_path)?;
        return Ok(cached
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect());
    }

    info!(url = DOWNLOAD_ROOT_URL, "Fetching ArangoDB version index");
    let index = fetch_text(DOWNLOAD_ROOT_URL).await?;

    let mut result = Vec::new();
    for major_link in major_line_links(&index) {
        let url = format!("{}{}", DOWNLOAD_ROOT_URL, major_link);
        debug!(url = %url, "Scanning release line");
        let listing = fetch_text(&url).await?;
        result.extend(archive_versions(&listing));
    }

    sort_versions(&mut result);

    std::fs::create_dir_all(env::cache_dir())?;
    std::fs::write(&cache_path, result.join("\n") + "\n")?;
    debug!(count = result.len(), path = %cache_path.display(), "Cached version list");

    Ok(result)
}

/// Most recent installable version.
pub async fn latest_version() -> Result<String> {
    list_versions(false)
        .await?
        .pop()
        .ok_or(GardenError::NoVersionsFound)
}

async fn fetch_text(url: &str) -> Result<String> {
    let response = reqwest::get(url).await.map_err(|e| GardenError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(GardenError::Download {
            url: url.to_string(),
            reason: format!("server returned status {}", response.status()),
        });
    }

    response.text().await.map_err(|e| GardenError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Extract `arangodb<NN>/Community/Linux/index.html` listing paths for every
/// release line at or above 3.4 from the download root index page.
fn major_line_links(index_html: &str) -> Vec<String> {
    let href = Regex::new(r#"href="([^"]*arangodb(\d+)/index\.html)""#).unwrap();

    let mut links: Vec<String> = href
        .captures_iter(index_html)
        .filter(|caps| {
            caps[2]
                .parse::<u32>()
                .map(|line| line >= MIN_MAJOR_LINE)
                .unwrap_or(false)
        })
        .map(|caps| {
            caps[1]
                .trim_start_matches('/')
                .replace("index.html", "Community/Linux/index.html")
        })
        .collect();

    // Index pages repeat links; duplicates may not be adjacent, so sort
    // before dedup. Fetch order is irrelevant, versions get sorted later.
    links.sort();
    links.dedup();
    links
}

/// Extract version strings from archive names in a release line listing.
fn archive_versions(listing_html: &str) -> Vec<String> {
    let archive = Regex::new(r"arangodb\d+-linux-(\d+\.\d+\.\d+(?:-\d+)?)\.tar\.gz").unwrap();

    let mut versions: Vec<String> = archive
        .captures_iter(listing_html)
        .map(|caps| caps[1].to_string())
        .collect();

    versions.dedup();
    versions
}

/// Numeric components of a version string like `3.11.4-1`.
pub(crate) fn version_components(version: &str) -> Vec<u32> {
    version
        .split(['.', '-'])
        .filter_map(|part| part.parse().ok())
        .collect()
}

fn sort_versions(versions: &mut Vec<String>) {
    versions.sort_by_key(|v| version_components(v));
    versions.dedup();
}
