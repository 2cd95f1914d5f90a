//! Append-only log of triggered runs, one `<timestamp> | <url>` line per
//! push. The tracker never rewrites or trims the file itself; readers
//! take a bounded window off the tail.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::eyre::Result;
use std::path::Path;
use tokio::io::AsyncWriteExt;

pub const RUN_LOG_FILE: &str = ".kaggle-run.log";

/// Most-recent window returned by [`read_all`].
pub const DISPLAY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// Raw timestamp text as logged, kept verbatim for display.
    pub label: String,
    /// Parsed trigger instant; `None` for an unparseable line.
    pub triggered_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

/// Appends one run to the log, creating the file if absent. Disk errors
/// propagate to the caller and are not retried.
pub async fn append(root: &Path, url: Option<&str>) -> Result<()> {
    let line = format!(
        "{} | {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        url.unwrap_or("")
    );
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(root.join(RUN_LOG_FILE))
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

/// Reads the last [`DISPLAY_LIMIT`] records, oldest first. A missing log
/// is an empty history, not an error.
pub async fn read_all(root: &Path) -> Vec<RunRecord> {
    let text = match tokio::fs::read_to_string(root.join(RUN_LOG_FILE)).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("failed to read run log: {e}");
            return Vec::new();
        }
    };
    let records: Vec<RunRecord> = text.lines().filter_map(parse_line).collect();
    let skip = records.len().saturating_sub(DISPLAY_LIMIT);
    records.into_iter().skip(skip).collect()
}

pub fn parse_line(line: &str) -> Option<RunRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (ts, url) = match line.split_once('|') {
        Some((ts, url)) => (ts.trim(), url.trim()),
        None => (line, ""),
    };
    let triggered_at = DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|d| d.with_timezone(&Utc));
    Some(RunRecord {
        label: ts.to_string(),
        triggered_at,
        url: if url.is_empty() {
            None
        } else {
            Some(url.to_string())
        },
    })
}
