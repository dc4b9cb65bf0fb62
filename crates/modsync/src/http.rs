//! Shared HTTP client and streaming download helpers
//!
//! One lazily-built client serves both platform API requests and file
//! downloads. Downloads stream to a `.part` temp file and are renamed
//! into place only after the caller has verified them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ActionError, Result};

const USER_AGENT: &str = concat!("modsync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to create HTTP client")
});

pub fn client() -> &'static Client {
    &CLIENT
}

/// GET a JSON document, with optional extra headers (API keys).
pub async fn get_json<T: DeserializeOwned>(url: &str, headers: &[(&str, &str)]) -> Result<T> {
    debug!("GET {}", url);

    let mut request = CLIENT.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| ActionError::Http {
            url: url.to_string(),
            source,
        })?;

    response.json::<T>().await.map_err(|source| ActionError::Http {
        url: url.to_string(),
        source,
    })
}

/// Temp path used while a download is in flight.
pub fn temp_path(dest_path: &Path) -> PathBuf {
    let mut name = dest_path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Promote a finished temp file to its final destination.
pub async fn promote(temp: &Path, dest_path: &Path) -> Result<()> {
    fs::rename(temp, dest_path)
        .await
        .map_err(|e| ActionError::fs(dest_path, e))?;
    debug!("renamed {} to {}", temp.display(), dest_path.display());
    Ok(())
}

/// Stream a URL to `dest_path`, creating parent directories as needed.
/// Returns the number of bytes written. Non-2xx statuses are errors.
pub async fn download_to(url: &str, dest_path: &Path) -> Result<u64> {
    url::Url::parse(url).map_err(|_| ActionError::InvalidUrl {
        url: url.to_string(),
    })?;

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ActionError::fs(parent, e))?;
    }

    let response = CLIENT
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| ActionError::Http {
            url: url.to_string(),
            source,
        })?;

    let mut file = fs::File::create(dest_path)
        .await
        .map_err(|e| ActionError::fs(dest_path, e))?;

    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| ActionError::Http {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ActionError::fs(dest_path, e))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| ActionError::fs(dest_path, e))?;
    debug!("downloaded {} bytes from {}", written, url);
    Ok(written)
}
