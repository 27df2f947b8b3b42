//! Paginated walk over a remote folder

use crate::pipeline::FetchPipeline;
use crate::report::FetchReport;
use dropfetch_types::{ListPage, RemoteEntry, RemoteStore, Result};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{error, info};

/// Feeds every file of a remote folder through a [`FetchPipeline`]
pub struct FolderWalker<'a, R: RemoteStore + ?Sized> {
    remote: &'a R,
    pipeline: FetchPipeline<'a, R>,
}

impl<'a, R: RemoteStore + ?Sized> FolderWalker<'a, R> {
    /// Create a walker listing from `remote`
    pub fn new(remote: &'a R, pipeline: FetchPipeline<'a, R>) -> Self {
        Self { remote, pipeline }
    }

    /// Pipeline used for file entries
    pub fn pipeline(&self) -> &FetchPipeline<'a, R> {
        &self.pipeline
    }

    /// Walk `folder` page by page until the listing is exhausted
    ///
    /// Entries are processed one at a time, in listing order. A failed listing
    /// call or ledger lookup stops the walk; the returned report then carries
    /// the reason together with everything processed up to that point.
    pub async fn walk(&self, folder: &str) -> FetchReport {
        let started = Instant::now();
        let mut report = FetchReport::new(folder);
        info!(folder, run_id = %report.run_id, "PROCESSING remote folder");

        if let Err(e) = self.walk_pages(folder, &mut report).await {
            error!(
                event = "ABORTED",
                folder,
                kind = ?e.kind(),
                reason = %e,
                "walk aborted"
            );
            report.abort(e.to_string());
        }

        report.finish(started.elapsed());
        report
    }

    async fn walk_pages(&self, folder: &str, report: &mut FetchReport) -> Result<()> {
        let mut seen = HashSet::new();
        let mut page = self.remote.list_folder(folder).await?;

        loop {
            self.process_page(&page, &mut seen, report).await?;
            if !page.has_more {
                return Ok(());
            }
            page = self.remote.list_folder_continue(&page.cursor).await?;
        }
    }

    async fn process_page(
        &self,
        page: &ListPage,
        seen: &mut HashSet<String>,
        report: &mut FetchReport,
    ) -> Result<()> {
        for entry in &page.entries {
            if !seen.insert(entry.path().to_string()) {
                continue;
            }

            match entry {
                RemoteEntry::File(file) => {
                    let outcome = self.pipeline.process(file).await?;
                    report.record(outcome);
                }
                RemoteEntry::Other { path, tag } => {
                    info!(
                        event = "SKIPPED",
                        remote_path = %path,
                        tag = %tag,
                        "SKIPPED non-file entry"
                    );
                    report.record_non_file();
                }
            }
        }
        Ok(())
    }
}
