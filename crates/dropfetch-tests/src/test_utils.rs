//! Unified test utilities for dropfetch integration tests
//!
//! [`MockRemoteStore`] is an in-memory [`RemoteStore`] with scripted failures,
//! and [`LogCapture`] collects the structured events emitted while a test runs.

use async_trait::async_trait;
use bytes::Bytes;
use dropfetch_sync::content_hash;
use dropfetch_types::{
    ByteStream, Error, ListPage, RemoteEntry, RemoteFileEntry, RemoteStore, Result,
};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// All zeros
    Zeros,
    /// Deterministic byte sequence derived from a seed
    Seeded(u8),
}

/// Generate test data with the specified pattern
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Seeded(seed) => (0..size)
            .map(|i| ((i * 7 + 13) as u8).wrapping_add(seed))
            .collect(),
    }
}

/// A call observed by [`MockRemoteStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `list_folder(path)`
    ListFolder(String),
    /// `list_folder_continue(cursor)`
    ListFolderContinue(String),
    /// `download(remote_path)`
    Download(String),
    /// `delete(remote_path)`
    Delete(String),
}

#[derive(Debug, Clone)]
struct MockFile {
    content: Vec<u8>,
    served: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct MockState {
    listing: Vec<RemoteEntry>,
    snapshot: Vec<RemoteEntry>,
    files: BTreeMap<String, MockFile>,
    deleted: HashSet<String>,
    fail_download: HashSet<String>,
    fail_download_midway: HashSet<String>,
    fail_delete: HashSet<String>,
    fail_continue: bool,
    calls: Vec<RemoteCall>,
}

/// In-memory remote store
///
/// Files live under a single folder; their remote paths are the lowercased
/// `<folder>/<name>`. `list_folder` snapshots the entries in insertion order
/// and pages through that snapshot `page_size` at a time, so deletes made
/// during a walk do not shift cursors. Deleted entries are gone from the next
/// `list_folder`.
#[derive(Debug)]
pub struct MockRemoteStore {
    folder: String,
    page_size: usize,
    chunk_size: usize,
    state: Mutex<MockState>,
}

impl MockRemoteStore {
    /// Create an empty store serving `folder`
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            page_size: 100,
            chunk_size: 64 * 1024,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Entries per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Size of the chunks download streams are split into
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Add a file whose declared content hash matches `content`
    pub fn with_file(self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        let path = self.path_of(name);
        let entry = RemoteFileEntry::new(path.clone(), name, content_hash(&content));
        {
            let mut state = self.lock();
            state.listing.push(RemoteEntry::File(entry));
            state.files.insert(
                path,
                MockFile {
                    content,
                    served: None,
                },
            );
        }
        self
    }

    /// Add a non-file entry such as a folder
    pub fn with_entry(self, name: &str, tag: &str) -> Self {
        let path = self.path_of(name);
        self.lock().listing.push(RemoteEntry::Other {
            path,
            tag: tag.to_string(),
        });
        self
    }

    /// Serve different bytes than the declared content hash describes
    pub fn corrupt(self, name: &str, served: impl Into<Vec<u8>>) -> Self {
        let path = self.path_of(name);
        if let Some(file) = self.lock().files.get_mut(&path) {
            file.served = Some(served.into());
        }
        self
    }

    /// Make `download` fail before any byte is returned
    pub fn fail_download(self, name: &str) -> Self {
        let path = self.path_of(name);
        self.lock().fail_download.insert(path);
        self
    }

    /// Make the download stream fail after its first chunk
    pub fn fail_download_midway(self, name: &str) -> Self {
        let path = self.path_of(name);
        self.lock().fail_download_midway.insert(path);
        self
    }

    /// Make `delete` fail
    pub fn fail_delete(self, name: &str) -> Self {
        let path = self.path_of(name);
        self.lock().fail_delete.insert(path);
        self
    }

    /// Make every `list_folder_continue` call fail
    pub fn fail_listing_continue(self) -> Self {
        self.lock().fail_continue = true;
        self
    }

    /// Remote path a file name is stored under
    pub fn path_of(&self, name: &str) -> String {
        format!("{}/{}", self.folder, name).to_lowercase()
    }

    /// Declared content hash of a stored file
    pub fn content_hash_of(&self, name: &str) -> Option<String> {
        let path = self.path_of(name);
        self.lock().listing.iter().find_map(|entry| match entry {
            RemoteEntry::File(file) if file.remote_path == path => {
                Some(file.content_hash.clone())
            }
            _ => None,
        })
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Paths passed to `download`
    pub fn downloads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Download(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Paths passed to `delete`, failed attempts included
    pub fn delete_attempts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Delete(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Remote paths still present
    pub fn remaining(&self) -> Vec<String> {
        let state = self.lock();
        state
            .listing
            .iter()
            .map(|entry| entry.path().to_string())
            .filter(|path| !state.deleted.contains(path))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn page(&self, offset: usize) -> ListPage {
        let state = self.lock();
        let end = (offset + self.page_size).min(state.snapshot.len());
        ListPage {
            entries: state.snapshot[offset.min(end)..end].to_vec(),
            cursor: format!("cursor-{}", end),
            has_more: end < state.snapshot.len(),
        }
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn list_folder(&self, path: &str) -> Result<ListPage> {
        {
            let mut state = self.lock();
            state.calls.push(RemoteCall::ListFolder(path.to_string()));
            if path.to_lowercase() != self.folder.to_lowercase() {
                return Err(Error::remote("list_folder", "HTTP 409: path/not_found/.."));
            }
            let snapshot: Vec<RemoteEntry> = state
                .listing
                .iter()
                .filter(|entry| !state.deleted.contains(entry.path()))
                .cloned()
                .collect();
            state.snapshot = snapshot;
        }
        Ok(self.page(0))
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListPage> {
        let fail = {
            let mut state = self.lock();
            state
                .calls
                .push(RemoteCall::ListFolderContinue(cursor.to_string()));
            state.fail_continue
        };
        if fail {
            return Err(Error::remote("list_folder_continue", "HTTP 500"));
        }

        let offset = cursor
            .strip_prefix("cursor-")
            .and_then(|offset| offset.parse().ok())
            .ok_or_else(|| Error::remote("list_folder_continue", "HTTP 409: reset/.."))?;
        Ok(self.page(offset))
    }

    async fn download(&self, remote_path: &str) -> Result<ByteStream> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Download(remote_path.to_string()));

        if state.fail_download.contains(remote_path) {
            return Err(Error::remote("download", "HTTP 500: internal error"));
        }
        let file = state
            .files
            .get(remote_path)
            .filter(|_| !state.deleted.contains(remote_path))
            .ok_or_else(|| Error::remote("download", "HTTP 409: path/not_found/.."))?;

        let body = file.served.clone().unwrap_or_else(|| file.content.clone());
        let mut chunks: Vec<Result<Bytes>> = body
            .chunks(self.chunk_size)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        if state.fail_download_midway.contains(remote_path) {
            chunks.truncate(1);
            chunks.push(Err(Error::remote("download", "connection reset")));
        }

        Ok(stream::iter(chunks).boxed())
    }

    async fn delete(&self, remote_path: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Delete(remote_path.to_string()));

        if state.fail_delete.contains(remote_path) {
            return Err(Error::remote("delete_v2", "HTTP 500: internal error"));
        }
        if !state.files.contains_key(remote_path) || !state.deleted.insert(remote_path.to_string()) {
            return Err(Error::remote("delete_v2", "HTTP 409: path_lookup/not_found/.."));
        }
        Ok(())
    }
}

/// Collects log output as JSON lines for assertions
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a JSON subscriber for the current thread
    ///
    /// Events are captured until the returned guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Captured events, one JSON object per event
    pub fn events(&self) -> Vec<serde_json::Value> {
        let buffer = match self.buffer.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Field maps of captured events whose `event` field equals `name`
    pub fn events_named(&self, name: &str) -> Vec<serde_json::Value> {
        self.events()
            .into_iter()
            .filter_map(|event| event.get("fields").cloned())
            .filter(|fields| fields.get("event").and_then(|e| e.as_str()) == Some(name))
            .collect()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.buffer.lock() {
            Ok(mut guard) => guard.extend_from_slice(buf),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(buf),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
