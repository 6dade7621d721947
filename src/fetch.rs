//! HTTP fetching of zone reference data, with on-disk caching.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response>;
}

pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Downloads `url` to `path` unless a non-empty copy is already cached
/// there.
pub async fn download_to<C: HttpClient>(client: &C, url: &str, path: &Path) -> Result<()> {
    if path.exists() && std::fs::metadata(path)?.len() > 0 {
        debug!(path = %path.display(), "Reference file already cached");
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!(url, path = %path.display(), "Downloading reference data");
    let bytes = fetch_bytes(client, url).await?;
    std::fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "Reference data saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[tokio::test]
    async fn test_download_to_skips_cached_file() {
        let path = env::temp_dir().join("hvfhv_hotspot_rater_cached.csv");
        fs::write(&path, "LocationID,Zone\n1,Test\n").unwrap();

        // The URL is unreachable; a cache hit must return before any fetch.
        let client = BasicClient::new();
        download_to(&client, "http://127.0.0.1:9/nowhere.csv", &path)
            .await
            .unwrap();

        fs::remove_file(&path).unwrap();
    }
}
