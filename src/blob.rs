//! Blob store collaborator: read-only access to uploaded files by path or URL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::BlobError;

/// Raw bytes plus whatever content type the store reported.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<FetchedBlob, BlobError>;
}

#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, FetchedBlob>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, location: impl Into<String>, bytes: Vec<u8>, content_type: Option<String>) {
        self.blobs
            .write()
            .await
            .insert(location.into(), FetchedBlob { bytes, content_type });
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, location: &str) -> Result<FetchedBlob, BlobError> {
        self.blobs
            .read()
            .await
            .get(location)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(location.to_string()))
    }
}

/// Fetches storage objects over HTTP. Absolute URLs are fetched as-is; bare
/// paths resolve against `{project_url}/storage/v1/object/{bucket}/`.
/// The service key is only sent to URLs under the project's storage API.
#[derive(Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    storage_root: Option<String>,
    object_base: Option<String>,
    service_key: Option<String>,
}

impl HttpBlobStore {
    pub fn new(project_url: Option<&str>, bucket: &str, service_key: Option<String>) -> Result<Self, BlobError> {
        // Per-fetch deadlines are enforced by the resolver; this is only a backstop.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| BlobError::Request(e.to_string()))?;
        let storage_root = project_url.map(|u| format!("{}/storage/v1/", u.trim_end_matches('/')));
        let object_base = storage_root.as_ref().map(|root| format!("{}object/{}", root, bucket));
        Ok(Self { client, storage_root, object_base, service_key })
    }

    /// Whether `url` points at this project's storage API.
    fn is_own_storage(&self, url: &str) -> bool {
        match &self.storage_root {
            Some(root) => url.starts_with(root.as_str()),
            None => false,
        }
    }

    fn credentials_for(&self, url: &str) -> Option<&str> {
        self.service_key.as_deref().filter(|_| self.is_own_storage(url))
    }

    fn url_for(&self, location: &str) -> Result<String, BlobError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(location.to_string());
        }
        match &self.object_base {
            Some(base) => Ok(format!("{}/{}", base, location.trim_start_matches('/'))),
            None => Err(BlobError::NotFound(format!("no storage base for path {}", location))),
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, location: &str) -> Result<FetchedBlob, BlobError> {
        let url = self.url_for(location)?;
        let mut req = self.client.get(&url).header(USER_AGENT, "quizgen-backend/0.1");
        if let Some(key) = self.credentials_for(&url) {
            req = req
                .header("apikey", key)
                .header(AUTHORIZATION, format!("Bearer {}", key));
        }
        let res = req.send().await.map_err(|e| BlobError::Request(e.to_string()))?;

        if !res.status().is_success() {
            return Err(BlobError::HttpStatus {
                status: res.status().as_u16(),
                location: location.to_string(),
            });
        }
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = res
            .bytes()
            .await
            .map_err(|e| BlobError::Request(e.to_string()))?
            .to_vec();
        debug!(target: "pipeline", %location, size = bytes.len(), "Fetched blob");
        Ok(FetchedBlob { bytes, content_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_blob_roundtrip_and_missing() {
        let blobs = MemoryBlobStore::new();
        blobs.put("a/b.txt", b"hello".to_vec(), Some("text/plain".into())).await;
        assert_eq!(blobs.fetch("a/b.txt").await.unwrap().bytes, b"hello");
        assert!(matches!(blobs.fetch("missing").await, Err(BlobError::NotFound(_))));
    }

    #[test]
    fn http_urls_resolve_against_bucket() {
        let store = HttpBlobStore::new(Some("https://demo.supabase.co/"), "uploads", None).unwrap();
        assert_eq!(
            store.url_for("/quiz/b1/notes.txt").unwrap(),
            "https://demo.supabase.co/storage/v1/object/uploads/quiz/b1/notes.txt"
        );
        assert_eq!(store.url_for("https://cdn.example.com/x.pdf").unwrap(), "https://cdn.example.com/x.pdf");

        let bare = HttpBlobStore::new(None, "uploads", None).unwrap();
        assert!(bare.url_for("quiz/b1/notes.txt").is_err());
    }

    #[test]
    fn service_key_only_goes_to_project_storage() {
        let store = HttpBlobStore::new(Some("https://proj.supabase.co"), "uploads", Some("secret".into())).unwrap();

        let own = store.url_for("quiz/b1/notes.txt").unwrap();
        assert_eq!(store.credentials_for(&own), Some("secret"));
        let signed = "https://proj.supabase.co/storage/v1/object/sign/uploads/x.pdf?token=t";
        assert_eq!(store.credentials_for(signed), Some("secret"));

        for foreign in [
            "http://127.0.0.1:9999/evil.txt",
            "https://cdn.example.com/x.pdf",
            "https://proj.supabase.co.evil.net/storage/v1/object/uploads/x.pdf",
            "https://proj.supabase.co/rest/v1/profiles",
        ] {
            let url = store.url_for(foreign).unwrap();
            assert_eq!(store.credentials_for(&url), None, "{}", foreign);
        }

        let keyless = HttpBlobStore::new(None, "uploads", Some("secret".into())).unwrap();
        assert_eq!(keyless.credentials_for("https://proj.supabase.co/storage/v1/object/uploads/a"), None);
    }

    #[tokio::test]
    async fn foreign_host_receives_no_credentials() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = sock.read(&mut buf).await.unwrap();
            sock.write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                .await
                .unwrap();
            String::from_utf8_lossy(&buf[..n]).to_ascii_lowercase()
        });

        let store = HttpBlobStore {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            ..HttpBlobStore::new(Some("https://proj.supabase.co"), "uploads", Some("SERVICE-SECRET".into())).unwrap()
        };
        let fetched = store.fetch(&format!("http://{}/evil.txt", addr)).await.unwrap();
        assert_eq!(fetched.bytes, b"ok");

        let request = server.await.unwrap();
        assert!(request.starts_with("get /evil.txt"));
        assert!(!request.contains("service-secret"));
        assert!(!request.contains("authorization"));
        assert!(!request.contains("apikey"));
    }
}
