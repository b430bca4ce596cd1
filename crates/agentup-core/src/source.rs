use std::path::{Path, PathBuf};
use std::time::Duration;

use agentup_platform::Deadline;
use async_trait::async_trait;
use log::debug;
use thiserror::Error;

use crate::manifest::Manifest;

const MANIFEST_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_SNIPPET_CHARS: usize = 160;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to build manifest client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("manifest request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("manifest http status: {status}{body_snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to read manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed manifest from {origin}: {source}")]
    Decode {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("manifest fetch did not finish before the deadline")]
    Timeout,
}

/// Where the update manifest comes from.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    fn location(&self) -> String;

    async fn fetch(&self, deadline: Deadline) -> Result<Manifest, SourceError>;
}

impl<T: ManifestSource + 'static> From<T> for Box<dyn ManifestSource> {
    fn from(source: T) -> Self {
        Box::new(source)
    }
}

#[derive(Debug, Clone)]
pub struct HttpManifestSource {
    url: String,
    user_agent: String,
    timeout: Duration,
}

impl HttpManifestSource {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: crate::DEFAULT_USER_AGENT.to_string(),
            timeout: MANIFEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_bytes(&self) -> Result<Vec<u8>, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(SourceError::ClientBuild)?;

        let request_error = |source| SourceError::Request {
            url: self.url.clone(),
            source,
        };

        let response = client.get(&self.url).send().await.map_err(request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, BODY_SNIPPET_CHARS))
                .unwrap_or_default();
            return Err(SourceError::HttpStatus {
                status,
                body_snippet,
            });
        }

        let body = response.bytes().await.map_err(request_error)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    fn location(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self, deadline: Deadline) -> Result<Manifest, SourceError> {
        debug!("Fetching manifest from {}", self.url);

        let body = deadline
            .run(self.fetch_bytes())
            .await
            .map_err(|_| SourceError::Timeout)??;

        Manifest::from_slice(&body).map_err(|source| SourceError::Decode {
            origin: self.url.clone(),
            source,
        })
    }
}

/// Manifest stored on local disk, e.g. a staged rollout copied by
/// configuration management.
#[derive(Debug, Clone)]
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ManifestSource for FileManifestSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self, deadline: Deadline) -> Result<Manifest, SourceError> {
        debug!("Reading manifest from {}", self.path.display());

        let body = deadline
            .run(tokio::fs::read(&self.path))
            .await
            .map_err(|_| SourceError::Timeout)?
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;

        Manifest::from_slice(&body).map_err(|source| SourceError::Decode {
            origin: self.location(),
            source,
        })
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
