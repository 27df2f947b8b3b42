//! Dropbox remote store for dropfetch
//!
//! This crate implements [`dropfetch_types::RemoteStore`] on top of the
//! Dropbox HTTP API v2:
//!
//! - **Listing**: `files/list_folder` and `files/list_folder/continue`
//! - **Download**: `files/download`, streamed chunk by chunk
//! - **Delete**: `files/delete_v2`
//!
//! Every non-2xx response becomes a [`dropfetch_types::Error::Remote`] carrying
//! the API's `error_summary` when one is present.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dropfetch_remote::{ClientConfig, DropboxClient};
//! use dropfetch_types::RemoteStore;
//!
//! # async fn example() -> dropfetch_types::Result<()> {
//! let client = DropboxClient::new(ClientConfig::new("sl.my-token"))?;
//! let page = client.list_folder("/Inbox").await?;
//! println!("{} entries, more: {}", page.entries.len(), page.has_more);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod protocol;

pub use client::{ClientConfig, DropboxClient};
