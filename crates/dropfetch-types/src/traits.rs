//! Core traits for dropfetch operations
//!
//! The remote store is the only collaborator the fetch pipeline talks to over the
//! network. It is expressed as a trait so that the Dropbox client and in-memory
//! test doubles are interchangeable.

use crate::{ListPage, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Stream of downloaded byte chunks
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Folder listing, download and delete operations of a remote object store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List the first page of a folder
    async fn list_folder(&self, path: &str) -> Result<ListPage>;

    /// Continue a listing from a cursor returned by a previous page
    async fn list_folder_continue(&self, cursor: &str) -> Result<ListPage>;

    /// Open a byte stream over a remote file's content
    async fn download(&self, remote_path: &str) -> Result<ByteStream>;

    /// Delete a remote file
    async fn delete(&self, remote_path: &str) -> Result<()>;
}
