//! Dropbox API v2 wire types
//!
//! Only the subset of the `files` namespace used by dropfetch is modelled:
//! `list_folder`, `list_folder/continue`, `download` and `delete_v2`.

use dropfetch_types::{ListPage, RemoteEntry, RemoteFileEntry};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Argument of `files/list_folder`
#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    /// Folder path, `""` for the root
    pub path: &'a str,
    /// Only the folder's direct children are listed
    pub recursive: bool,
}

/// Argument of `files/list_folder/continue`
#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    /// Cursor from the previous page
    pub cursor: &'a str,
}

/// Single-path argument of `files/download` and `files/delete_v2`
#[derive(Debug, Serialize)]
pub struct PathArg<'a> {
    /// Remote path
    pub path: &'a str,
}

/// Result of `files/list_folder` and `files/list_folder/continue`
#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    /// Entries on this page
    pub entries: Vec<Metadata>,
    /// Cursor for the next page
    pub cursor: String,
    /// Whether more pages remain
    pub has_more: bool,
}

/// Entry metadata, flattened over the `file` / `folder` / `deleted` variants
#[derive(Debug, Deserialize)]
pub struct Metadata {
    /// Entry type
    #[serde(rename = ".tag")]
    pub tag: String,
    /// Last path component, original case
    pub name: String,
    /// Lowercased full path
    #[serde(default)]
    pub path_lower: Option<String>,
    /// Full path, original case
    #[serde(default)]
    pub path_display: Option<String>,
    /// Dropbox content hash, files only
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl Metadata {
    fn path(&self) -> String {
        self.path_lower
            .clone()
            .or_else(|| self.path_display.clone())
            .unwrap_or_else(|| self.name.clone())
    }
}

impl From<Metadata> for RemoteEntry {
    fn from(metadata: Metadata) -> Self {
        let path = metadata.path();
        match (metadata.tag.as_str(), metadata.content_hash) {
            ("file", Some(content_hash)) => {
                Self::File(RemoteFileEntry::new(path, metadata.name, content_hash))
            }
            // A file without a content hash cannot be verified
            _ => Self::Other {
                path,
                tag: metadata.tag,
            },
        }
    }
}

impl From<ListFolderResult> for ListPage {
    fn from(result: ListFolderResult) -> Self {
        Self {
            entries: result.entries.into_iter().map(RemoteEntry::from).collect(),
            cursor: result.cursor,
            has_more: result.has_more,
        }
    }
}

/// Error body returned with HTTP 409 and most other failures
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Human readable error path such as `path/not_found/..`
    pub error_summary: String,
}

/// Pick the most useful message out of an error response body
pub fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => format!("HTTP {}: {}", status, parsed.error_summary),
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => format!("HTTP {}: {}", status, body.trim()),
    }
}

/// Serialize an argument for the `Dropbox-API-Arg` header
///
/// Header values must be ASCII, so every character above `0x7e` is written as
/// a JSON `\uXXXX` escape (surrogate pairs outside the BMP).
pub fn header_arg<T: Serialize>(arg: &T) -> serde_json::Result<String> {
    let json = serde_json::to_string(arg)?;
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\x7f' {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(escaped, "\\u{:04x}", unit);
            }
        }
    }
    Ok(escaped)
}
