//! Derives the lifecycle state of a logged run. Remote-primary: ask the
//! CLI for kernel status and classify its text; degrade to local
//! evidence (error marker mtime, output freshness, elapsed time) when
//! the remote answer is missing or unusable. Resolution never fails;
//! the worst answer is `Unknown`.

use crate::app::RunStatus;
use crate::config::ProjectConfig;
use crate::kaggle::executor::KernelCli;
use crate::runlog::RunRecord;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::SystemTime;

pub const ERROR_MARKER_FILE: &str = "RUN_ERROR.log";
pub const KEEPALIVE_FILE: &str = ".gitkeep";

// Elapsed-time buckets for the local heuristic (minutes since trigger)
pub const RUNNING_WINDOW_MINUTES: i64 = 2;
pub const QUEUED_WINDOW_MINUTES: i64 = 10;

const HOST_TOKEN: &str = "kaggle.com/";

/// Extracts the `<owner>/<slug>` handle from a run URL. The segment
/// after the host may be a `code`/`kernels` prefix; the handle is the
/// two segments after that.
pub fn kernel_ref_from_url(url: &str) -> Option<String> {
    let rest = url.split(HOST_TOKEN).nth(1)?;
    let rest = rest.split(['?', '#']).next().unwrap_or("");
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let mut owner = segments.next()?;
    if owner == "code" || owner == "kernels" {
        owner = segments.next()?;
    }
    let slug = segments.next()?;
    Some(format!("{owner}/{slug}"))
}

/// First Kaggle URL in the CLI's push output. The path is cut at the
/// first character the site never uses in a kernel path.
pub fn extract_run_url(text: &str) -> Option<String> {
    for prefix in ["https://www.kaggle.com/", "http://www.kaggle.com/"] {
        if let Some(idx) = text.find(prefix) {
            let after = &text[idx + prefix.len()..];
            let path: String = after
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
                .collect();
            if path.is_empty() {
                continue;
            }
            return Some(format!("{prefix}{path}"));
        }
    }
    None
}

/// Classifies the CLI's status text by substring. Unrecognized text is
/// `None`, not an error; the caller decides what indeterminate means.
pub fn classify_status_text(text: &str) -> Option<RunStatus> {
    let text = text.to_lowercase();
    if text.contains("complete") || text.contains("finished") {
        Some(RunStatus::Complete)
    } else if text.contains("running") || text.contains("processing") {
        Some(RunStatus::Running)
    } else if text.contains("queued") || text.contains("waiting") {
        Some(RunStatus::Queued)
    } else {
        None
    }
}

/// Remote-primary resolution for one record. A record whose URL yields
/// no kernel handle is `Unknown` immediately; the extraction failure is
/// itself the answer, so no local fallback runs.
pub async fn resolve(
    cli: &dyn KernelCli,
    record: &RunRecord,
    root: &Path,
    cfg: &ProjectConfig,
) -> RunStatus {
    let Some(kernel_ref) = record.url.as_deref().and_then(kernel_ref_from_url) else {
        return RunStatus::Unknown;
    };

    match cli.kernel_status(&kernel_ref).await {
        Ok(out) => match classify_status_text(&out) {
            Some(status) => status,
            None => {
                // Indeterminate remote text: fresh outputs settle it,
                // otherwise the run is still owed its artifacts.
                let fresh = record
                    .triggered_at
                    .is_some_and(|t| has_recent_outputs(&cfg.output_dir(root), t.into()));
                if fresh {
                    RunStatus::Complete
                } else {
                    RunStatus::Pending
                }
            }
        },
        Err(e) => {
            tracing::warn!("status query for {kernel_ref} failed, using local evidence: {e}");
            resolve_local(record, root, cfg, Utc::now())
        }
    }
}

/// Local-heuristic resolution: error marker first, then output
/// freshness, then elapsed-time buckets. A record with an unparseable
/// trigger timestamp behaves as infinitely old.
pub fn resolve_local(
    record: &RunRecord,
    root: &Path,
    cfg: &ProjectConfig,
    now: DateTime<Utc>,
) -> RunStatus {
    let Some(triggered) = record.triggered_at else {
        return RunStatus::Pending;
    };
    let since = SystemTime::from(triggered);

    if error_marker_since(root, since) {
        return RunStatus::Error;
    }
    if has_recent_outputs(&cfg.output_dir(root), since) {
        return RunStatus::Complete;
    }

    let elapsed_minutes = now.signed_duration_since(triggered).num_minutes();
    if elapsed_minutes < RUNNING_WINDOW_MINUTES {
        RunStatus::Running
    } else if elapsed_minutes < QUEUED_WINDOW_MINUTES {
        RunStatus::Queued
    } else {
        RunStatus::Pending
    }
}

fn error_marker_since(root: &Path, since: SystemTime) -> bool {
    std::fs::metadata(root.join(ERROR_MARKER_FILE))
        .and_then(|m| m.modified())
        .is_ok_and(|mtime| mtime >= since)
}

/// True when any non-hidden, non-placeholder file under `dir` was
/// modified at or after `since` with a non-zero size. Recurses into
/// subdirectories; scan errors read as "no outputs".
pub fn has_recent_outputs(dir: &Path, since: SystemTime) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == KEEPALIVE_FILE || name.starts_with('.') {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if has_recent_outputs(&entry.path(), since) {
                return true;
            }
        } else if file_type.is_file() {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let fresh = meta.modified().is_ok_and(|mtime| mtime >= since);
            if fresh && meta.len() > 0 {
                return true;
            }
        }
    }
    false
}
