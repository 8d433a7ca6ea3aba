// # Liveness Marker
//
// Externally observable proof that the updater last succeeded at time T.
//
// ## Purpose
//
// An outside health checker (for example a container HEALTHCHECK) polls the
// marker's existence and freshness. The scheduler writes it after every
// successful cycle, so a stale or missing marker means the process is stuck,
// crashed, or has been failing every cycle.
//
// ## Implementations
//
// - [`FileLivenessMarker`]: RFC 3339 timestamp in a file, atomically replaced
// - [`MemoryLivenessMarker`]: in-process only, for embedding and tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;

/// Default marker location, shared with the container health check
pub const DEFAULT_LIVENESS_PATH: &str = "/tmp/dns_updater_healthy";

/// Sink for the "last successful cycle" timestamp
#[async_trait]
pub trait LivenessMarker: Send + Sync {
    /// Record a successful cycle completed at `at`, replacing any previous value
    async fn mark(&self, at: DateTime<Utc>) -> Result<(), Error>;

    /// Last recorded success, if any
    async fn last(&self) -> Result<Option<DateTime<Utc>>, Error>;
}

/// File-backed liveness marker
///
/// The timestamp is written to `<path>.tmp` and renamed over `<path>`, so a
/// reader never observes a half-written file.
#[derive(Debug, Clone)]
pub struct FileLivenessMarker {
    path: PathBuf,
}

impl FileLivenessMarker {
    /// Create a marker at `path`
    ///
    /// Nothing is written until the first [`mark`](LivenessMarker::mark).
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Marker file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }
}

impl Default for FileLivenessMarker {
    fn default() -> Self {
        Self::new(DEFAULT_LIVENESS_PATH)
    }
}

#[async_trait]
impl LivenessMarker for FileLivenessMarker {
    async fn mark(&self, at: DateTime<Utc>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::liveness(format!(
                    "Failed to create marker directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::liveness(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(at.to_rfc3339().as_bytes())
                .await
                .map_err(|e| {
                    Error::liveness(format!(
                        "Failed to write to temp file {}: {}",
                        temp_path.display(),
                        e
                    ))
                })?;

            file.flush().await.map_err(|e| {
                Error::liveness(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::liveness(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Liveness marker written: {}", self.path.display());
        Ok(())
    }

    async fn last(&self) -> Result<Option<DateTime<Utc>>, Error> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::liveness(format!(
                "Failed to read marker {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let at = DateTime::parse_from_rfc3339(content.trim()).map_err(|e| {
            Error::liveness(format!(
                "Marker {} does not hold a timestamp: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(at.with_timezone(&Utc)))
    }
}

/// In-memory liveness marker
#[derive(Debug, Clone, Default)]
pub struct MemoryLivenessMarker {
    inner: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl MemoryLivenessMarker {
    /// Create an unset marker
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LivenessMarker for MemoryLivenessMarker {
    async fn mark(&self, at: DateTime<Utc>) -> Result<(), Error> {
        *self.inner.write().await = Some(at);
        Ok(())
    }

    async fn last(&self) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(*self.inner.read().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_marker_absent_until_marked() {
        let dir = TempDir::new().unwrap();
        let marker = FileLivenessMarker::new(dir.path().join("healthy"));

        assert_eq!(marker.last().await.unwrap(), None);
        assert!(!marker.path().exists());
    }

    #[tokio::test]
    async fn file_marker_overwrites_previous_timestamp() {
        let dir = TempDir::new().unwrap();
        let marker = FileLivenessMarker::new(dir.path().join("healthy"));

        let first = Utc.with_ymd_and_hms(2025, 1, 9, 12, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 1, 9, 13, 0, 0).unwrap();

        marker.mark(first).await.unwrap();
        marker.mark(second).await.unwrap();

        assert_eq!(marker.last().await.unwrap(), Some(second));
        assert!(!dir.path().join("healthy.tmp").exists());
    }

    #[tokio::test]
    async fn file_marker_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let marker = FileLivenessMarker::new(dir.path().join("run/routerdns/healthy"));

        marker.mark(Utc::now()).await.unwrap();
        assert!(marker.path().exists());
    }

    #[tokio::test]
    async fn file_marker_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("healthy");
        std::fs::write(&path, "not a timestamp").unwrap();

        let marker = FileLivenessMarker::new(&path);
        assert!(matches!(marker.last().await, Err(Error::Liveness(_))));
    }

    #[test]
    fn memory_marker_round_trip() {
        let marker = MemoryLivenessMarker::new();
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        tokio_test::block_on(async {
            assert_eq!(marker.last().await.unwrap(), None);
            marker.mark(at).await.unwrap();
            assert_eq!(marker.last().await.unwrap(), Some(at));
        });
    }
}
