use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agentup_platform::{Deadline, FsError, RetryPolicy, rename_with_retry};
use futures_util::StreamExt;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Per-request timeout for artifact downloads; the update deadline still
/// applies on top of it.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(90);

/// Smallest body accepted as a real executable.
pub const DEFAULT_MIN_BYTES: u64 = 32 * 1024;

const PARTIAL_SUFFIX: &str = ".part";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("download http status: {0}")]
    Status(reqwest::StatusCode),
    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("downloaded file too small: {received} bytes (minimum {minimum})")]
    TooSmall { received: u64, minimum: u64 },
    #[error("download of {url} did not finish before the deadline")]
    Timeout { url: String },
    #[error("failed to publish download: {0}")]
    Publish(#[source] FsError),
}

impl DownloadError {
    fn http(context: &'static str, source: reqwest::Error) -> Self {
        Self::Http { context, source }
    }

    fn io(context: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Path of the in-progress file for `destination`.
#[must_use]
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut raw = destination.as_os_str().to_os_string();
    raw.push(PARTIAL_SUFFIX);
    PathBuf::from(raw)
}

/// Builds a client with the artifact request timeout applied.
///
/// # Errors
/// Returns an error when the TLS backend cannot be initialised.
pub fn download_client() -> Result<reqwest::Client, DownloadError> {
    reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|error| DownloadError::http("failed to build download client", error))
}

/// Stream `url` into `destination`.
///
/// The body lands in `destination.part` first and is renamed into place only
/// after it has been synced and passed the size check, so `destination` never
/// holds a partial body. The `.part` file is removed on every failure.
///
/// # Errors
/// Returns an error on transport failures, non-2xx responses, short bodies,
/// local I/O failures, or when `deadline` passes first.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    user_agent: &str,
    minimum_bytes: u64,
    deadline: Deadline,
) -> Result<u64, DownloadError> {
    let partial = partial_path(destination);
    discard_partial(&partial).await;

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|error| DownloadError::io("failed to create download directory", parent, error))?;
    }

    let streamed = match deadline
        .run(stream_to_file(client, url, &partial, user_agent))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(DownloadError::Timeout {
            url: url.to_string(),
        }),
    };

    let received = match streamed {
        Ok(received) => received,
        Err(error) => {
            discard_partial(&partial).await;
            return Err(error);
        }
    };

    if received < minimum_bytes {
        discard_partial(&partial).await;
        return Err(DownloadError::TooSmall {
            received,
            minimum: minimum_bytes,
        });
    }

    if let Err(error) = rename_with_retry(&partial, destination, RetryPolicy::default()).await {
        discard_partial(&partial).await;
        return Err(DownloadError::Publish(error));
    }

    info!("Download complete: {received} bytes -> {}", destination.display());
    Ok(received)
}

async fn stream_to_file(
    client: &reqwest::Client,
    url: &str,
    partial: &Path,
    user_agent: &str,
) -> Result<u64, DownloadError> {
    let mut request = client.get(url);
    if !user_agent.is_empty() {
        request = request.header(reqwest::header::USER_AGENT, user_agent);
    }

    let response = request
        .send()
        .await
        .map_err(|error| DownloadError::http("download request failed", error))?;

    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }

    let total = response.content_length().unwrap_or(0);
    debug!("Downloading {url} ({total} bytes advertised)");

    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|error| DownloadError::io("failed to create download file", partial, error))?;

    let mut received: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|error| DownloadError::http("download stream error", error))?;
        file.write_all(&chunk)
            .await
            .map_err(|error| DownloadError::io("failed to write download data", partial, error))?;
        received += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|error| DownloadError::io("failed to flush download file", partial, error))?;
    file.sync_all()
        .await
        .map_err(|error| DownloadError::io("failed to sync download file", partial, error))?;

    mark_executable(partial).await?;

    Ok(received)
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<(), DownloadError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|error| DownloadError::io("failed to mark download executable", path, error))
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
async fn mark_executable(_path: &Path) -> Result<(), DownloadError> {
    Ok(())
}

async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => debug!("Removed partial download {}", partial.display()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => warn!("Failed to remove partial download {}: {error}", partial.display()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use agentup_platform::Deadline;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{DownloadError, download, download_client, partial_path};

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    async fn serve(server: &MockServer, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path("/agent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/opt/agent/agent.new")),
            Path::new("/opt/agent/agent.new.part")
        );
    }

    #[tokio::test]
    async fn download_publishes_and_leaves_no_partial() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agent"))
            .and(header("user-agent", "agentup-test/2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7_u8; 4096]))
            .mount(&server)
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let destination = temp.path().join("nested").join("agent.new");
        let client = download_client().expect("client should build");

        let received = download(
            &client,
            &format!("{}/agent", server.uri()),
            &destination,
            "agentup-test/2",
            1024,
            deadline(),
        )
        .await
        .expect("download should succeed");

        assert_eq!(received, 4096);
        assert_eq!(std::fs::read(&destination).expect("published file").len(), 4096);
        assert!(!partial_path(&destination).exists());
    }

    #[tokio::test]
    async fn short_body_is_rejected_without_final_file() {
        let server = MockServer::start().await;
        serve(&server, b"tiny".to_vec()).await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let destination = temp.path().join("agent.new");
        let client = download_client().expect("client should build");

        let error = download(
            &client,
            &format!("{}/agent", server.uri()),
            &destination,
            "",
            32 * 1024,
            deadline(),
        )
        .await
        .expect_err("short body should fail");

        assert!(matches!(
            error,
            DownloadError::TooSmall {
                received: 4,
                minimum: 32768
            }
        ));
        assert!(!destination.exists());
        assert!(!partial_path(&destination).exists());
    }

    #[tokio::test]
    async fn non_success_status_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let destination = temp.path().join("agent.new");
        let client = download_client().expect("client should build");

        let error = download(
            &client,
            &format!("{}/agent", server.uri()),
            &destination,
            "",
            0,
            deadline(),
        )
        .await
        .expect_err("404 should fail");

        assert!(matches!(error, DownloadError::Status(status) if status.as_u16() == 404));
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn stale_partial_is_replaced() {
        let server = MockServer::start().await;
        serve(&server, vec![1_u8; 64]).await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let destination = temp.path().join("agent.new");
        std::fs::write(partial_path(&destination), vec![9_u8; 1 << 16])
            .expect("stale partial should be written");
        let client = download_client().expect("client should build");

        download(
            &client,
            &format!("{}/agent", server.uri()),
            &destination,
            "",
            0,
            deadline(),
        )
        .await
        .expect("download should succeed");

        assert_eq!(std::fs::read(&destination).expect("published file"), vec![1_u8; 64]);
    }

    #[tokio::test]
    async fn deadline_removes_partial() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1_u8; 64])
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let destination = temp.path().join("agent.new");
        let client = download_client().expect("client should build");

        let error = download(
            &client,
            &format!("{}/agent", server.uri()),
            &destination,
            "",
            0,
            Deadline::after(Duration::from_millis(100)),
        )
        .await
        .expect_err("slow download should time out");

        assert!(matches!(error, DownloadError::Timeout { .. }));
        assert!(!destination.exists());
        assert!(!partial_path(&destination).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn published_file_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let server = MockServer::start().await;
        serve(&server, vec![1_u8; 64]).await;
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let destination = temp.path().join("agent.new");
        let client = download_client().expect("client should build");

        download(
            &client,
            &format!("{}/agent", server.uri()),
            &destination,
            "",
            0,
            deadline(),
        )
        .await
        .expect("download should succeed");

        let mode = std::fs::metadata(&destination)
            .expect("metadata should load")
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
