//! Per-file fetch pipeline
//!
//! Every remote file entry is driven through the same sequence:
//!
//! 1. duplicate check against the [`Ledger`]
//! 2. local path selection, renaming on a file name collision
//! 3. streamed download
//! 4. content hash verification of the bytes on disk
//! 5. ledger commit
//! 6. best-effort remote deletion
//!
//! A local file that was not committed to the ledger is never left behind.
//! Once a record is committed it stays, whatever happens to the remote delete.

use crate::hasher::{self, FileDigests};
use crate::ledger::Ledger;
use dropfetch_types::{Error, FetchOutcome, LedgerRecord, RemoteFileEntry, RemoteStore, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Local file name used when `display_name` already exists in the download directory
///
/// The content hash is inserted before the last `.` of the name; names without
/// a dot get it appended.
pub fn collision_name(display_name: &str, content_hash: &str) -> String {
    match display_name.rfind('.') {
        Some(dot) => format!(
            "{}_{}{}",
            &display_name[..dot],
            content_hash,
            &display_name[dot..]
        ),
        None => format!("{}_{}", display_name, content_hash),
    }
}

/// Drives remote file entries to a terminal [`FetchOutcome`]
pub struct FetchPipeline<'a, R: RemoteStore + ?Sized> {
    remote: &'a R,
    ledger: &'a Ledger,
    download_dir: PathBuf,
}

impl<'a, R: RemoteStore + ?Sized> FetchPipeline<'a, R> {
    /// Create a pipeline writing into `download_dir`
    pub fn new(remote: &'a R, ledger: &'a Ledger, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            ledger,
            download_dir: download_dir.into(),
        }
    }

    /// Directory downloaded files are written into
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Process one remote file entry
    ///
    /// Only a failed ledger lookup is returned as an error; every other failure
    /// is logged and reported through the outcome.
    pub async fn process(&self, entry: &RemoteFileEntry) -> Result<FetchOutcome> {
        let remote_path = entry.remote_path.as_str();
        let content_hash = entry.content_hash.as_str();

        if self.ledger.is_known(content_hash)? {
            info!(
                event = "SKIPPED",
                remote_path,
                content_hash,
                "SKIPPED duplicate"
            );
            return Ok(FetchOutcome::DuplicateSkipped {
                remote_path: remote_path.to_string(),
                content_hash: content_hash.to_string(),
            });
        }

        let local_path = self.resolve_local_path(entry).await;

        if let Err(failure) = self.download_to(remote_path, &local_path).await {
            error!(
                event = "DOWNLOAD FAILED",
                remote_path,
                content_hash,
                local_path = %local_path.display(),
                reason = %failure.error,
                "DOWNLOAD FAILED"
            );
            if failure.file_created {
                discard(&local_path).await;
            }
            return Ok(download_failed(entry, local_path, &failure.error));
        }
        info!(
            event = "DOWNLOADED",
            remote_path,
            content_hash,
            local_path = %local_path.display(),
            "DOWNLOADED"
        );

        let digests = match self.verify(entry, &local_path).await {
            Ok(digests) => digests,
            Err(Error::Integrity { actual, .. }) => {
                error!(
                    event = "HASH MISMATCH",
                    remote_path,
                    content_hash,
                    local_path = %local_path.display(),
                    computed_hash = %actual,
                    "HASH MISMATCH"
                );
                discard(&local_path).await;
                return Ok(FetchOutcome::HashMismatch {
                    remote_path: remote_path.to_string(),
                    content_hash: content_hash.to_string(),
                    computed_hash: actual,
                    local_path,
                });
            }
            Err(e) => {
                error!(
                    event = "DOWNLOAD FAILED",
                    remote_path,
                    content_hash,
                    local_path = %local_path.display(),
                    reason = %e,
                    "could not hash downloaded file"
                );
                discard(&local_path).await;
                return Ok(download_failed(entry, local_path, &e));
            }
        };
        info!(
            event = "HASH VERIFIED",
            remote_path,
            content_hash,
            local_path = %local_path.display(),
            "HASH VERIFIED"
        );

        if let Err(e) = self.commit(entry, &local_path, &digests) {
            error!(
                event = "DOWNLOAD FAILED",
                remote_path,
                content_hash,
                local_path = %local_path.display(),
                reason = %e,
                "ledger commit failed"
            );
            discard(&local_path).await;
            return Ok(download_failed(entry, local_path, &e));
        }
        info!(
            event = "RECORDED",
            remote_path,
            content_hash,
            local_path = %local_path.display(),
            "UPDATED database"
        );

        match self.remote.delete(remote_path).await {
            Ok(()) => {
                info!(
                    event = "DELETED",
                    remote_path,
                    content_hash,
                    local_path = %local_path.display(),
                    "DELETED"
                );
                Ok(FetchOutcome::RemoteDeleted {
                    remote_path: remote_path.to_string(),
                    content_hash: content_hash.to_string(),
                    local_path,
                    bytes: digests.size,
                })
            }
            Err(e) => {
                warn!(
                    event = "DELETE FAILED",
                    remote_path,
                    content_hash,
                    local_path = %local_path.display(),
                    reason = %e,
                    "DELETE FAILED"
                );
                Ok(FetchOutcome::RemoteDeleteFailed {
                    remote_path: remote_path.to_string(),
                    content_hash: content_hash.to_string(),
                    local_path,
                    bytes: digests.size,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Pick the local destination for an entry
    ///
    /// `<download_dir>/<display_name>` unless something already exists there,
    /// in which case [`collision_name`] is used.
    pub async fn resolve_local_path(&self, entry: &RemoteFileEntry) -> PathBuf {
        let preferred = self.download_dir.join(&entry.display_name);
        if fs::try_exists(&preferred).await.unwrap_or(true) {
            self.download_dir
                .join(collision_name(&entry.display_name, &entry.content_hash))
        } else {
            preferred
        }
    }

    /// Stream `remote_path` into `local_path`
    ///
    /// The local file is only created once the remote has answered, so a
    /// failure reports whether anything was written at `local_path`.
    async fn download_to(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> std::result::Result<u64, DownloadFailure> {
        let mut stream = self
            .remote
            .download(remote_path)
            .await
            .map_err(DownloadFailure::before_create)?;
        let mut file = File::create(local_path)
            .await
            .map_err(|e| Error::path(local_path, format!("Failed to create file: {}", e)))
            .map_err(DownloadFailure::before_create)?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(DownloadFailure::after_create)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::path(local_path, format!("Failed to write: {}", e)))
                .map_err(DownloadFailure::after_create)?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| Error::path(local_path, format!("Failed to flush: {}", e)))
            .map_err(DownloadFailure::after_create)?;
        file.sync_all()
            .await
            .map_err(|e| Error::path(local_path, format!("Failed to sync: {}", e)))
            .map_err(DownloadFailure::after_create)?;

        Ok(written)
    }

    async fn verify(&self, entry: &RemoteFileEntry, local_path: &Path) -> Result<FileDigests> {
        let digests = hasher::hash_file(local_path).await?;
        if digests.content_hash.eq_ignore_ascii_case(&entry.content_hash) {
            Ok(digests)
        } else {
            Err(Error::integrity(
                entry.content_hash.clone(),
                digests.content_hash,
            ))
        }
    }

    fn commit(&self, entry: &RemoteFileEntry, local_path: &Path, digests: &FileDigests) -> Result<()> {
        let local_file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::path(local_path, "Local path has no file name"))?;

        let record = LedgerRecord::new(
            local_file_name,
            entry.remote_path.clone(),
            entry.display_name.clone(),
            digests.sha256.clone(),
            entry.content_hash.clone(),
        );

        if !self.ledger.add(&record)? {
            warn!(
                remote_path = %entry.remote_path,
                content_hash = %entry.content_hash,
                sha256 = %digests.sha256,
                "ledger already held this content"
            );
        }
        Ok(())
    }
}

/// A failed download and whether it had already created the local file
struct DownloadFailure {
    error: Error,
    file_created: bool,
}

impl DownloadFailure {
    fn before_create(error: Error) -> Self {
        Self {
            error,
            file_created: false,
        }
    }

    fn after_create(error: Error) -> Self {
        Self {
            error,
            file_created: true,
        }
    }
}

fn download_failed(entry: &RemoteFileEntry, local_path: PathBuf, error: &Error) -> FetchOutcome {
    FetchOutcome::DownloadFailed {
        remote_path: entry.remote_path.clone(),
        content_hash: entry.content_hash.clone(),
        local_path,
        reason: error.to_string(),
    }
}

/// Remove an unverified local file, logging if that fails
async fn discard(local_path: &Path) {
    match fs::remove_file(local_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!(
            local_path = %local_path.display(),
            reason = %e,
            "ERROR to delete corrupted file"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use dropfetch_types::{ByteStream, ListPage};
    use futures::stream;
    use rstest::rstest;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves one fixed body for every path and records deletes
    struct FixedBody {
        body: &'static [u8],
        refuse_downloads: bool,
        deleted: Mutex<Vec<String>>,
    }

    impl FixedBody {
        fn new(body: &'static [u8]) -> Self {
            Self {
                body,
                refuse_downloads: false,
                deleted: Mutex::new(Vec::new()),
            }
        }

        fn refusing_downloads() -> Self {
            Self {
                refuse_downloads: true,
                ..Self::new(b"")
            }
        }
    }

    #[async_trait]
    impl RemoteStore for FixedBody {
        async fn list_folder(&self, _path: &str) -> Result<ListPage> {
            Ok(ListPage::default())
        }

        async fn list_folder_continue(&self, _cursor: &str) -> Result<ListPage> {
            Ok(ListPage::default())
        }

        async fn download(&self, remote_path: &str) -> Result<ByteStream> {
            if self.refuse_downloads {
                return Err(Error::remote("download", format!("{} refused", remote_path)));
            }
            let chunks = self
                .body
                .chunks(3)
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<_>>();
            Ok(stream::iter(chunks).boxed())
        }

        async fn delete(&self, remote_path: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(remote_path.to_string());
            Ok(())
        }
    }

    #[rstest]
    #[case("report.pdf", "report_abc.pdf")]
    #[case("archive.tar.gz", "archive.tar_abc.gz")]
    #[case("README", "README_abc")]
    #[case(".bashrc", "_abc.bashrc")]
    #[case("trailing.", "trailing_abc.")]
    fn test_collision_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(collision_name(name, "abc"), expected);
    }

    #[tokio::test]
    async fn test_resolve_local_path_only_renames_on_collision() {
        let dir = TempDir::new().unwrap();
        let remote = FixedBody::new(b"");
        let ledger = Ledger::open_in_memory().unwrap();
        let pipeline = FetchPipeline::new(&remote, &ledger, dir.path());
        let entry = RemoteFileEntry::new("/inbox/report.pdf", "Report.pdf", "h1");

        assert_eq!(
            pipeline.resolve_local_path(&entry).await,
            dir.path().join("Report.pdf")
        );

        std::fs::write(dir.path().join("Report.pdf"), b"older").unwrap();
        assert_eq!(
            pipeline.resolve_local_path(&entry).await,
            dir.path().join("Report_h1.pdf")
        );
    }

    #[tokio::test]
    async fn test_successful_fetch_commits_and_deletes() {
        let dir = TempDir::new().unwrap();
        let body: &'static [u8] = b"hello world";
        let remote = FixedBody::new(body);
        let ledger = Ledger::open_in_memory().unwrap();
        let pipeline = FetchPipeline::new(&remote, &ledger, dir.path());

        let hash = hasher::content_hash(body).to_uppercase();
        let entry = RemoteFileEntry::new("/inbox/a.txt", "a.txt", hash.clone());

        let outcome = pipeline.process(&entry).await.unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::RemoteDeleted {
                remote_path: "/inbox/a.txt".into(),
                content_hash: hash.clone(),
                local_path: dir.path().join("a.txt"),
                bytes: body.len() as u64,
            }
        );
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), body);
        assert!(ledger.is_known(&hash).unwrap());
        assert_eq!(*remote.deleted.lock().unwrap(), vec!["/inbox/a.txt"]);

        // Second pass is a pure skip
        let again = pipeline.process(&entry).await.unwrap();
        assert!(matches!(again, FetchOutcome::DuplicateSkipped { .. }));
        assert_eq!(remote.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mismatch_purges_local_file() {
        let dir = TempDir::new().unwrap();
        let remote = FixedBody::new(b"not what was promised");
        let ledger = Ledger::open_in_memory().unwrap();
        let pipeline = FetchPipeline::new(&remote, &ledger, dir.path());
        let entry = RemoteFileEntry::new("/inbox/a.txt", "a.txt", hasher::content_hash(b"promised"));

        let outcome = pipeline.process(&entry).await.unwrap();
        match outcome {
            FetchOutcome::HashMismatch {
                computed_hash,
                local_path,
                ..
            } => {
                assert_eq!(computed_hash, hasher::content_hash(b"not what was promised"));
                assert!(!local_path.exists());
            }
            other => panic!("expected a hash mismatch, got {:?}", other),
        }
        assert!(ledger.is_empty().unwrap());
        assert!(remote.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_download_dir_is_download_failure() {
        let dir = TempDir::new().unwrap();
        let remote = FixedBody::new(b"data");
        let ledger = Ledger::open_in_memory().unwrap();
        let pipeline = FetchPipeline::new(&remote, &ledger, dir.path().join("gone"));
        let entry = RemoteFileEntry::new("/inbox/a.txt", "a.txt", hasher::content_hash(b"data"));

        let outcome = pipeline.process(&entry).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::DownloadFailed { .. }));
        assert!(ledger.is_empty().unwrap());
        assert!(remote.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refused_download_leaves_existing_files_alone() {
        let dir = TempDir::new().unwrap();
        let remote = FixedBody::refusing_downloads();
        let ledger = Ledger::open_in_memory().unwrap();
        let pipeline = FetchPipeline::new(&remote, &ledger, dir.path());
        let entry = RemoteFileEntry::new("/inbox/report.pdf", "report.pdf", "h1");

        std::fs::write(dir.path().join("report.pdf"), b"older").unwrap();
        std::fs::write(dir.path().join("report_h1.pdf"), b"kept by the user").unwrap();

        let outcome = pipeline.process(&entry).await.unwrap();
        match outcome {
            FetchOutcome::DownloadFailed { local_path, .. } => {
                assert_eq!(local_path, dir.path().join("report_h1.pdf"));
            }
            other => panic!("expected a download failure, got {:?}", other),
        }
        assert_eq!(std::fs::read(dir.path().join("report.pdf")).unwrap(), b"older");
        assert_eq!(
            std::fs::read(dir.path().join("report_h1.pdf")).unwrap(),
            b"kept by the user"
        );
        assert!(ledger.is_empty().unwrap());
    }
}
