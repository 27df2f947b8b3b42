//! Console output for the dropfetch CLI

use console::style;
use dropfetch_sync::{FetchReport, FileDigests};
use dropfetch_types::FetchOutcome;
use std::path::Path;
use std::time::Duration;

/// Print the end-of-run summary
pub fn print_report(report: &FetchReport) {
    let stats = &report.stats;
    let folder = if report.folder.is_empty() {
        "/"
    } else {
        report.folder.as_str()
    };

    println!();
    println!(
        "{} {}",
        style("Fetch Summary").bold().underlined(),
        style(format!("({})", report.run_id)).dim()
    );
    println!("  Folder: {}", style(folder).cyan());
    println!("  Files fetched: {}", style(stats.files_fetched).green());
    println!(
        "  Duplicates skipped: {}",
        style(stats.duplicates_skipped).yellow()
    );
    println!(
        "  Non-file entries skipped: {}",
        style(stats.non_file_entries).dim()
    );
    println!(
        "  Failures: {}",
        if stats.failures() > 0 {
            style(stats.failures()).red()
        } else {
            style(stats.failures()).green()
        }
    );
    println!(
        "  Remote deletes failed: {}",
        if stats.remote_delete_failures > 0 {
            style(stats.remote_delete_failures).yellow()
        } else {
            style(stats.remote_delete_failures).green()
        }
    );
    println!(
        "  Bytes downloaded: {}",
        style(format_bytes(stats.bytes_downloaded)).green()
    );
    println!(
        "  Duration: {}",
        style(format_duration(stats.duration)).blue()
    );
    println!(
        "  Transfer rate: {}",
        style(format!(
            "{:.2} MB/s",
            stats.transfer_rate() / 1024.0 / 1024.0
        ))
        .blue()
    );

    let problems: Vec<&FetchOutcome> = report.problems().collect();
    if !problems.is_empty() {
        println!();
        println!("{}", style("Needs attention:").bold());
        for outcome in problems {
            println!("  {}", describe(outcome));
        }
    }

    if let Some(reason) = &report.aborted {
        println!();
        println!(
            "{} Walk stopped early: {}",
            style("✗").red().bold(),
            style(reason).red()
        );
    }
}

/// Print both digests of a local file
pub fn print_digests(path: &Path, digests: &FileDigests) {
    println!("{}", style(path.display()).cyan());
    println!("  content_hash: {}", digests.content_hash);
    println!("  sha256:       {}", digests.sha256);
    println!("  size:         {}", format_bytes(digests.size));
}

/// One-line description of a problem outcome
pub fn describe(outcome: &FetchOutcome) -> String {
    let detail = match outcome {
        FetchOutcome::DownloadFailed { reason, .. }
        | FetchOutcome::RemoteDeleteFailed { reason, .. } => reason.clone(),
        FetchOutcome::HashMismatch { computed_hash, .. } => {
            format!("computed {}", computed_hash)
        }
        FetchOutcome::DuplicateSkipped { .. } | FetchOutcome::RemoteDeleted { .. } => {
            String::new()
        }
    };

    if detail.is_empty() {
        format!("{} {}", outcome.label(), outcome.remote_path())
    } else {
        format!("{} {}: {}", outcome.label(), outcome.remote_path(), detail)
    }
}

/// Format bytes in human readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case(0, "0.00 B")]
    #[case(1536, "1.50 KB")]
    #[case(4 * 1024 * 1024, "4.00 MB")]
    fn test_format_bytes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }

    #[rstest]
    #[case(Duration::from_millis(1500), "1.50s")]
    #[case(Duration::from_secs(125), "2m 5s")]
    #[case(Duration::from_secs(3725), "1h 2m 5s")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }

    #[test]
    fn test_describe() {
        let failed = FetchOutcome::RemoteDeleteFailed {
            remote_path: "/inbox/a.txt".into(),
            content_hash: "h1".into(),
            local_path: PathBuf::from("dl/a.txt"),
            bytes: 1,
            reason: "HTTP 409: path_lookup/not_found/..".into(),
        };
        assert_eq!(
            describe(&failed),
            "DELETE FAILED /inbox/a.txt: HTTP 409: path_lookup/not_found/.."
        );

        let mismatch = FetchOutcome::HashMismatch {
            remote_path: "/inbox/b.txt".into(),
            content_hash: "h2".into(),
            computed_hash: "h3".into(),
            local_path: PathBuf::from("dl/b.txt"),
        };
        assert_eq!(describe(&mismatch), "HASH MISMATCH /inbox/b.txt: computed h3");
    }
}
