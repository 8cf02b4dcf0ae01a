//! HTTP object store client.
//!
//! Speaks the minimal object protocol most stores and gateways expose:
//! `GET`, `PUT` and `DELETE` on `<base_url>/<name>`. Downloads are streamed
//! into a temp file next to the destination and renamed into place once
//! complete.

use super::traits::ObjectStore;
use crate::config::CacheDefaults;
use crate::error::{Result, TierCacheError};
use crate::fs::{remove_if_exists, temp_sibling};
use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, StatusCode};
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use url::Url;

/// Object store reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpObjectStore {
    /// Create a client with the default request timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, CacheDefaults::HTTP_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| TierCacheError::Config {
            message: format!("Invalid object store URL {}: {}", base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TierCacheError::Config {
                message: format!("Object store URL cannot be a base: {}", base_url),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(CacheDefaults::USER_AGENT)
            .build()
            .map_err(|e| TierCacheError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of object `name`, one path segment per `/`-separated part.
    pub fn object_url(&self, name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| TierCacheError::Config {
                message: format!("Object store URL cannot be a base: {}", self.base_url),
            })?;
            segments.pop_if_empty();
            segments.extend(name.split('/'));
        }
        Ok(url)
    }

    fn request_error(&self, err: reqwest::Error) -> TierCacheError {
        if err.is_timeout() {
            TierCacheError::Timeout(self.timeout)
        } else {
            TierCacheError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }

    async fn stream_to_file(&self, response: reqwest::Response, temp: &Path) -> Result<u64> {
        let mut file = fs::File::create(temp)
            .await
            .map_err(|e| TierCacheError::io_with_path(e, temp))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.request_error(e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| TierCacheError::io_with_path(e, temp))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| TierCacheError::io_with_path(e, temp))?;
        file.sync_all()
            .await
            .map_err(|e| TierCacheError::io_with_path(e, temp))?;
        Ok(written)
    }
}

/// Stream `file` in fixed-size chunks without loading it into memory.
///
/// Ends after the first read error.
fn file_chunks(file: fs::File) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static {
    stream::unfold(Some(file), |file| async move {
        let mut file = file?;
        let mut buf = vec![0u8; CacheDefaults::UPLOAD_CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), Some(file)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get(&self, name: &str, dest: &Path) -> Result<()> {
        let url = self.object_url(name)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(TierCacheError::ObjectNotFound {
                    object: name.to_string(),
                })
            }
            status => {
                return Err(TierCacheError::RemoteStatus {
                    operation: "get",
                    object: name.to_string(),
                    status: status.as_u16(),
                })
            }
        }

        let temp = temp_sibling(dest, CacheDefaults::DOWNLOAD_TEMP_SUFFIX);
        let bytes = match self.stream_to_file(response, &temp).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(&temp).await {
                    warn!("Failed to clean up {}: {}", temp.display(), cleanup);
                }
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp, dest).await {
            if let Err(cleanup) = remove_if_exists(&temp).await {
                warn!("Failed to clean up {}: {}", temp.display(), cleanup);
            }
            return Err(TierCacheError::Io {
                message: format!("Failed to move download to {}: {}", dest.display(), e),
                path: Some(dest.to_path_buf()),
                source: Some(e),
            });
        }

        debug!("Downloaded {} ({} bytes) to {}", name, bytes, dest.display());
        Ok(())
    }

    async fn put(&self, name: &str, src: &Path) -> Result<()> {
        let url = self.object_url(name)?;
        let file = fs::File::open(src)
            .await
            .map_err(|e| TierCacheError::io_with_path(e, src))?;
        let bytes = file
            .metadata()
            .await
            .map_err(|e| TierCacheError::io_with_path(e, src))?
            .len();

        let response = self
            .client
            .put(url)
            .header(CONTENT_LENGTH, bytes)
            .body(Body::wrap_stream(file_chunks(file)))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TierCacheError::RemoteStatus {
                operation: "put",
                object: name.to_string(),
                status: status.as_u16(),
            });
        }

        debug!("Uploaded {} ({} bytes)", name, bytes);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let url = self.object_url(name)?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!("Deleted object {} (status {})", name, status);
            return Ok(());
        }

        Err(TierCacheError::RemoteStatus {
            operation: "remove",
            object: name.to_string(),
            status: status.as_u16(),
        })
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let url = self.object_url(name)?;
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(TierCacheError::RemoteStatus {
                operation: "exists",
                object: name.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    fn describe(&self) -> String {
        format!("http:{}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_keeps_bucket_path() {
        let store = HttpObjectStore::new("http://127.0.0.1:9000/segments").unwrap();
        assert_eq!(
            store.object_url("seg-1").unwrap().as_str(),
            "http://127.0.0.1:9000/segments/seg-1"
        );

        let trailing = HttpObjectStore::new("http://127.0.0.1:9000/segments/").unwrap();
        assert_eq!(
            trailing.object_url("a/b c").unwrap().as_str(),
            "http://127.0.0.1:9000/segments/a/b%20c"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(matches!(
            HttpObjectStore::new("mailto:ops@example.com"),
            Err(TierCacheError::Config { .. })
        ));
        assert!(HttpObjectStore::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_file_chunks_streams_whole_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("seg-1");
        let payload: Vec<u8> = (0..600_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &payload).unwrap();

        let file = fs::File::open(&path).await.unwrap();
        let chunks: Vec<Vec<u8>> = file_chunks(file)
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert!(chunks.len() >= 3);
        assert!(chunks
            .iter()
            .all(|chunk| chunk.len() <= CacheDefaults::UPLOAD_CHUNK_SIZE));
        assert_eq!(chunks.concat(), payload);
    }

    #[tokio::test]
    async fn test_file_chunks_empty_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        let file = fs::File::open(&path).await.unwrap();
        let chunks: Vec<_> = file_chunks(file).collect().await;
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_describe() {
        let store = HttpObjectStore::new("http://localhost:9000/b").unwrap();
        assert_eq!(store.describe(), "http:http://localhost:9000/b");
    }
}
