//! Two refresh paths that may be in flight at once: the bounded
//! poll-and-download loop that follows a push, and the fixed-interval
//! passive poller that keeps the runs tree fresh. Both only re-read
//! durable state (the run log, the output directory) and invoke the CLI
//! as an independent subprocess per call, so no coordination is needed
//! between them.

use crate::app::{RunStatus, TREE_REFRESH_SECS};
use crate::config::ProjectConfig;
use crate::events::AppEvent;
use crate::kaggle::executor::KernelCli;
use crate::kaggle::resolver;
use crate::runlog;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};

/// Floor on the wait between status checks, so a near-zero configured
/// interval cannot turn into a tight remote-query loop.
pub const POLL_WAIT_FLOOR_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    TimedOut,
}

pub fn effective_wait(interval_secs: u64) -> Duration {
    Duration::from_millis(interval_secs.saturating_mul(1000).max(POLL_WAIT_FLOOR_MS))
}

/// Waits for a pushed kernel to finish, then downloads its outputs
/// exactly once. Never fails: every problem is either reported through
/// `on_status` or swallowed as "keep waiting", and loop exhaustion is
/// the `TimedOut` outcome rather than an error.
pub async fn poll_and_download(
    cli: &dyn KernelCli,
    kernel_ref: &str,
    dest: &Path,
    interval_secs: u64,
    timeout_secs: u64,
    mut on_status: impl FnMut(&str, u8),
) -> PollOutcome {
    if let Err(e) = tokio::fs::create_dir_all(dest).await {
        tracing::warn!("could not create output dir {}: {e}", dest.display());
    }

    let wait = effective_wait(interval_secs);
    let total = Duration::from_secs(timeout_secs);
    let start = Instant::now();

    on_status("Waiting for run to start...", 5);
    // The remote needs lead time before the run even registers.
    time::sleep(wait).await;

    while start.elapsed() < total {
        let elapsed = start.elapsed();
        let progress = ((elapsed.as_secs_f64() / total.as_secs_f64()) * 100.0).min(90.0) as u8;
        let remaining = total.saturating_sub(elapsed).as_secs();

        match cli.kernel_status(kernel_ref).await {
            Ok(out) => {
                let status = resolver::classify_status_text(&out);
                on_status(
                    &format!("Status: {}... ({remaining}s remaining)", poll_label(status)),
                    progress,
                );

                if status == Some(RunStatus::Complete) {
                    on_status("Run complete. Downloading outputs...", 95);
                    match cli.download_outputs(kernel_ref, dest).await {
                        Ok(()) => {
                            if dir_has_entries(dest) {
                                on_status("Complete", 100);
                                return PollOutcome::Completed;
                            }
                            // A download that produced nothing is not success.
                            tracing::warn!("output download left {} empty", dest.display());
                        }
                        Err(e) => tracing::warn!("output download failed: {e}"),
                    }
                }
            }
            Err(e) => {
                // A failed status check means "keep waiting", not "fail the run".
                tracing::debug!("status check failed: {e}");
            }
        }

        time::sleep(wait).await;
    }

    on_status("Timed out", 0);
    PollOutcome::TimedOut
}

fn poll_label(status: Option<RunStatus>) -> &'static str {
    match status {
        Some(RunStatus::Complete) => "complete",
        Some(RunStatus::Running) => "running",
        Some(RunStatus::Queued) => "queued",
        _ => "unknown",
    }
}

/// Non-empty check for the downloaded destination. The keepalive file
/// and hidden entries do not count, so a directory scaffolded with a
/// `.gitkeep` is still "empty" until a real artifact lands.
fn dir_has_entries(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|e| {
        let name = e.file_name();
        let name = name.to_string_lossy();
        name != resolver::KEEPALIVE_FILE && !name.starts_with('.')
    })
}

/// One reconciliation pass: re-read the log window, resolve the latest
/// record only, publish the result. Returns false once the receiver is
/// gone.
pub async fn refresh_runs(
    cli: &dyn KernelCli,
    root: &Path,
    tx: &mpsc::UnboundedSender<AppEvent>,
) -> bool {
    let cfg = ProjectConfig::load_or_default(root).await;
    let records = runlog::read_all(root).await;
    let latest_status = match records.last() {
        Some(latest) => Some(resolver::resolve(cli, latest, root, &cfg).await),
        None => None,
    };
    tx.send(AppEvent::RunsResult {
        records,
        latest_status,
    })
    .is_ok()
}

/// Passive tree refresh: unconditionally re-reads and re-resolves every
/// ten seconds, whether or not an active poll loop is running.
pub struct Poller {
    root: PathBuf,
    cli: Arc<dyn KernelCli>,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl Poller {
    pub fn new(root: PathBuf, cli: Arc<dyn KernelCli>, tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { root, cli, tx }
    }

    pub async fn run(self) {
        loop {
            if !refresh_runs(&*self.cli, &self.root, &self.tx).await {
                return;
            }
            time::sleep(Duration::from_secs(TREE_REFRESH_SECS)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use color_eyre::eyre::{eyre, Result};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted stand-in for the kaggle CLI: pops one status response per
    /// query, then repeats a default; counts download invocations.
    struct FakeCli {
        statuses: Mutex<VecDeque<Result<String, String>>>,
        default_status: Result<String, String>,
        status_queries: AtomicUsize,
        downloads: AtomicUsize,
        download_writes_file: bool,
    }

    impl FakeCli {
        fn scripted(statuses: Vec<Result<String, String>>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                default_status: Ok("running".to_string()),
                status_queries: AtomicUsize::new(0),
                downloads: AtomicUsize::new(0),
                download_writes_file: true,
            }
        }

        fn always(status: Result<String, String>) -> Self {
            Self {
                statuses: Mutex::new(VecDeque::new()),
                default_status: status,
                status_queries: AtomicUsize::new(0),
                downloads: AtomicUsize::new(0),
                download_writes_file: true,
            }
        }
    }

    #[async_trait]
    impl KernelCli for FakeCli {
        async fn check_available(&self) -> Result<String> {
            Ok("fake".to_string())
        }
        async fn push_kernel(&self, _root: &Path) -> Result<String> {
            unreachable!("not used by the poll loop")
        }
        async fn kernel_status(&self, _kernel_ref: &str) -> Result<String> {
            self.status_queries.fetch_add(1, Ordering::SeqCst);
            let next = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default_status.clone());
            next.map_err(|e| eyre!(e))
        }
        async fn download_outputs(&self, _kernel_ref: &str, dest: &Path) -> Result<()> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            if self.download_writes_file {
                std::fs::write(dest.join("output.csv"), b"id,target\n")?;
            }
            Ok(())
        }
        async fn download_dataset(&self, _dataset_ref: &str, _dest: &Path) -> Result<()> {
            unreachable!("not used by the poll loop")
        }
        async fn submit_competition(
            &self,
            _competition: &str,
            _file: &Path,
            _message: &str,
        ) -> Result<String> {
            unreachable!("not used by the poll loop")
        }
    }

    #[test]
    fn wait_floor_applies() {
        assert_eq!(effective_wait(0), Duration::from_millis(5000));
        assert_eq!(effective_wait(3), Duration::from_millis(5000));
        assert_eq!(effective_wait(5), Duration::from_millis(5000));
        assert_eq!(effective_wait(10), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn downloads_once_after_completion() {
        let dest = tempfile::tempdir().unwrap();
        let cli = FakeCli::scripted(vec![
            Ok("queued".to_string()),
            Ok("running".to_string()),
            Ok("complete".to_string()),
        ]);
        let mut reports: Vec<(String, u8)> = Vec::new();

        let outcome = poll_and_download(&cli, "alice/nb", dest.path(), 1, 600, |msg, pct| {
            reports.push((msg.to_string(), pct));
        })
        .await;

        assert_eq!(outcome, PollOutcome::Completed);
        assert_eq!(cli.status_queries.load(Ordering::SeqCst), 3);
        assert_eq!(cli.downloads.load(Ordering::SeqCst), 1);
        let last = reports.last().unwrap();
        assert_eq!(last.0, "Complete");
        assert_eq!(last.1, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_capped_below_download_phase() {
        let dest = tempfile::tempdir().unwrap();
        let cli = FakeCli::scripted(vec![
            Ok("queued".to_string()),
            Ok("running".to_string()),
            Ok("running".to_string()),
            Ok("complete".to_string()),
        ]);
        let mut reports: Vec<(String, u8)> = Vec::new();

        poll_and_download(&cli, "alice/nb", dest.path(), 1, 60, |msg, pct| {
            reports.push((msg.to_string(), pct));
        })
        .await;

        for (msg, pct) in &reports {
            if msg.starts_with("Status:") {
                assert!(*pct <= 90, "{msg} reported {pct}");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_zero_and_never_downloads() {
        let dest = tempfile::tempdir().unwrap();
        let cli = FakeCli::always(Ok("running".to_string()));
        let mut reports: Vec<(String, u8)> = Vec::new();

        let outcome = poll_and_download(&cli, "alice/nb", dest.path(), 10, 5, |msg, pct| {
            reports.push((msg.to_string(), pct));
        })
        .await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(cli.downloads.load(Ordering::SeqCst), 0);
        let last = reports.last().unwrap();
        assert_eq!(last.0, "Timed out");
        assert_eq!(last.1, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn query_errors_are_swallowed_until_timeout() {
        let dest = tempfile::tempdir().unwrap();
        let cli = FakeCli::always(Err("no credentials".to_string()));
        let mut reports: Vec<(String, u8)> = Vec::new();

        let outcome = poll_and_download(&cli, "alice/nb", dest.path(), 1, 20, |msg, pct| {
            reports.push((msg.to_string(), pct));
        })
        .await;

        assert_eq!(outcome, PollOutcome::TimedOut);
        assert!(cli.status_queries.load(Ordering::SeqCst) >= 2);
        assert_eq!(cli.downloads.load(Ordering::SeqCst), 0);
        assert_eq!(reports.last().unwrap().1, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_download_falls_back_to_waiting() {
        let dest = tempfile::tempdir().unwrap();
        // A scaffolded keepalive must not satisfy the download check.
        std::fs::write(dest.path().join(crate::kaggle::resolver::KEEPALIVE_FILE), b"").unwrap();
        let mut cli = FakeCli::always(Ok("complete".to_string()));
        cli.download_writes_file = false;
        let mut reports: Vec<(String, u8)> = Vec::new();

        let outcome = poll_and_download(&cli, "alice/nb", dest.path(), 1, 12, |msg, pct| {
            reports.push((msg.to_string(), pct));
        })
        .await;

        // Every completion report triggered a download attempt, but none
        // was accepted as success.
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert!(cli.downloads.load(Ordering::SeqCst) >= 2);
        assert_eq!(reports.last().unwrap().1, 0);
    }

    #[tokio::test]
    async fn refresh_publishes_window_and_latest_status() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join(crate::runlog::RUN_LOG_FILE),
            "2024-06-01T10:00:00.000Z | https://www.kaggle.com/code/a/one\n\
             2024-06-01T11:00:00.000Z | https://www.kaggle.com/code/a/two\n",
        )
        .await
        .unwrap();

        let cli = FakeCli::always(Ok("complete".to_string()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(refresh_runs(&cli, dir.path(), &tx).await);

        match rx.try_recv().unwrap() {
            AppEvent::RunsResult {
                records,
                latest_status,
            } => {
                assert_eq!(records.len(), 2);
                assert_eq!(latest_status, Some(RunStatus::Complete));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        // Only the latest record was resolved.
        assert_eq!(cli.status_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_with_no_log_publishes_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cli = FakeCli::always(Ok("complete".to_string()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(refresh_runs(&cli, dir.path(), &tx).await);

        match rx.try_recv().unwrap() {
            AppEvent::RunsResult {
                records,
                latest_status,
            } => {
                assert!(records.is_empty());
                assert_eq!(latest_status, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(cli.status_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_reports_closed_channel() {
        let dir = tempfile::tempdir().unwrap();
        let cli = FakeCli::always(Ok("running".to_string()));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        assert!(!refresh_runs(&cli, dir.path(), &tx).await);
    }
}
