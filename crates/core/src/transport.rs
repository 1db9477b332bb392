//! External seams: HTTP transport, APK installer and device ABI probe.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::NetworkConfig;
use crate::error::{MozBuildsError, Result};

/// Streamed response body
pub struct ByteStream {
    /// Content length when the server announced one
    pub total_len: Option<u64>,
    pub chunks: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("total_len", &self.total_len)
            .finish_non_exhaustive()
    }
}

/// Generic "fetch by URL" capability
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a URL as text
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Open a URL as a byte stream
    async fn stream_download(&self, url: &str) -> Result<ByteStream>;
}

/// Fetch a URL and decode its body as JSON
pub async fn fetch_json<T: DeserializeOwned>(transport: &dyn Transport, url: &str) -> Result<T> {
    let body = transport.fetch_text(url).await?;
    serde_json::from_str(&body).map_err(|e| {
        debug!("Invalid JSON from {}: {}", url, e);
        MozBuildsError::Json(e)
    })
}

/// Fire-and-forget installation of a downloaded APK
pub trait Installer: Send + Sync {
    fn install(&self, apk: &Path);
}

/// Installer that does nothing, for download-only runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInstaller;

impl Installer for NoopInstaller {
    fn install(&self, apk: &Path) {
        debug!("Skipping install of {:?}", apk);
    }
}

/// Device capability probe
#[async_trait]
pub trait AbiProbe: Send + Sync {
    /// ABIs the target device supports, most preferred first
    async fn supported_abis(&self) -> Vec<String>;
}

/// Fixed ABI list
#[derive(Debug, Clone, Default)]
pub struct StaticAbis(pub Vec<String>);

#[async_trait]
impl AbiProbe for StaticAbis {
    async fn supported_abis(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MozBuildsError::network_with_cause("cannot build HTTP client", e))?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MozBuildsError::network(format!("HTTP {} for {}", status, url)));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }

    async fn stream_download(&self, url: &str) -> Result<ByteStream> {
        let response = self.get(url).await?;
        let total_len = response.content_length();
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(MozBuildsError::from))
            .boxed();

        Ok(ByteStream { total_len, chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl Transport for Canned {
        async fn fetch_text(&self, _url: &str) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn stream_download(&self, url: &str) -> Result<ByteStream> {
            Err(MozBuildsError::NotFound(url.to_string()))
        }
    }

    #[derive(Debug, serde::Deserialize)]
    struct Payload {
        id: u64,
    }

    #[tokio::test]
    async fn test_fetch_json() {
        let payload: Payload = fetch_json(&Canned(r#"{"id": 42}"#), "http://x").await.unwrap();
        assert_eq!(payload.id, 42);

        let err = fetch_json::<Payload>(&Canned("<html>"), "http://x").await.unwrap_err();
        assert!(matches!(err, MozBuildsError::Json(_)));
    }

    #[tokio::test]
    async fn test_static_abis() {
        let probe = StaticAbis(vec!["x86_64".into()]);
        assert_eq!(probe.supported_abis().await, vec!["x86_64".to_string()]);
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(&NetworkConfig::default()).is_ok());
    }
}
