//! Plain-text run summaries for the CLI.
//!
//! Rendering is pure string building so integration tests can assert on the
//! exact output without capturing stdout.

use std::path::Path;

use imgsync_core::flat::FlatSyncReport;
use imgsync_core::synchronise::{SyncReport, UploadOutcome};

/// Summary of a structured run: totals, per-folder breakdown, new assets and
/// failures.
pub fn render_summary(report: &SyncReport, manifest_path: &Path) -> String {
    let mut out = String::new();
    push_header(&mut out);
    push_totals(
        &mut out,
        report.remote_total(),
        report.local_total(),
        report.uploaded_count(),
        report.new_count(),
        report.updated_count(),
        report.failed_count(),
        report.skipped_count(),
        report.attempted_bytes(),
        manifest_path,
    );

    let summaries = report.folder_summaries();
    if !summaries.is_empty() {
        out.push_str("\nPer folder:\n");
        for summary in &summaries {
            out.push_str(&format!(
                "  {}: {} local, {} remote before, {} uploaded, {} failed\n",
                summary.folder,
                summary.local,
                summary.remote_before,
                summary.uploaded,
                summary.failed
            ));
        }
    }

    let new_uploads: Vec<_> = report.new_uploads().collect();
    if !new_uploads.is_empty() {
        out.push_str("\nNew assets:\n");
        for record in new_uploads {
            out.push_str(&format!("  + {}/{}\n", record.folder, record.identity));
        }
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        out.push_str("\nFailed uploads:\n");
        for record in failures {
            if let UploadOutcome::Failed { error } = &record.outcome {
                out.push_str(&format!(
                    "  ! {}/{}: {}\n",
                    record.folder, record.file_name, error
                ));
            }
        }
    }

    out
}

/// Summary of a flat run.
pub fn render_flat_summary(report: &FlatSyncReport, manifest_path: &Path) -> String {
    let mut out = String::new();
    push_header(&mut out);
    push_totals(
        &mut out,
        report.remote_count,
        report.local_count,
        report.uploaded_count(),
        report.new_count(),
        report.updated_count(),
        report.failed_count(),
        report.skipped_count(),
        report.attempted_bytes(),
        manifest_path,
    );

    let new_uploads: Vec<_> = report.new_uploads().collect();
    if !new_uploads.is_empty() {
        out.push_str("\nNew assets:\n");
        for record in new_uploads {
            out.push_str(&format!("  + {}\n", record.identity));
        }
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        out.push_str("\nFailed uploads:\n");
        for record in failures {
            if let UploadOutcome::Failed { error } = &record.outcome {
                out.push_str(&format!("  ! {}: {}\n", record.file_name, error));
            }
        }
    }

    out
}

fn push_header(out: &mut String) {
    out.push_str("==================================================\n");
    out.push_str("SYNC SUMMARY\n");
    out.push_str("==================================================\n");
}

#[allow(clippy::too_many_arguments)]
fn push_totals(
    out: &mut String,
    remote_before: usize,
    local: usize,
    uploaded: usize,
    new: usize,
    updated: usize,
    failed: usize,
    skipped: usize,
    attempted_bytes: u64,
    manifest_path: &Path,
) {
    out.push_str(&format!("Remote images before run: {remote_before}\n"));
    out.push_str(&format!("Local images found:       {local}\n"));
    out.push_str(&format!(
        "Uploaded:                 {uploaded} ({new} new, {updated} updated)\n"
    ));
    out.push_str(&format!("Failed:                   {failed}\n"));
    if skipped > 0 {
        out.push_str(&format!("Skipped (cancelled):      {skipped}\n"));
    }
    out.push_str(&format!(
        "Attempted volume:         {:.2}MB\n",
        megabytes(attempted_bytes)
    ));
    out.push_str(&format!(
        "Manifest written to:      {}\n",
        manifest_path.display()
    ));
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
