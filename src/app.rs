use crate::runlog::RunRecord;
use std::path::PathBuf;
use std::time::Instant;

// Passive tree refresh interval (seconds)
pub const TREE_REFRESH_SECS: u64 = 10;

// UI constants
pub const NOTIFICATION_TTL_SECS: u64 = 5;
pub const ERROR_TTL_SECS: u64 = 10;
pub const SPINNER_FRAME_COUNT: usize = 10;
pub const NARROW_WIDTH_THRESHOLD: u16 = 60;

// Poll loop defaults, overridable from the command line
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 600;

/// Lifecycle state of a triggered kernel run. Derived fresh on every
/// refresh, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Complete,
    Running,
    Queued,
    Pending,
    Error,
    Unknown,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Error)
    }

    pub fn icon(self) -> &'static str {
        match self {
            RunStatus::Complete => "✓",
            RunStatus::Running => "⟳",
            RunStatus::Queued | RunStatus::Pending => "◷",
            RunStatus::Error => "✗",
            RunStatus::Unknown => "·",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RunStatus::Complete => "outputs ready",
            RunStatus::Running => "running",
            RunStatus::Queued => "queued",
            RunStatus::Pending => "waiting",
            RunStatus::Error => "error",
            RunStatus::Unknown => "unknown",
        }
    }

    pub fn tooltip(self) -> &'static str {
        match self {
            RunStatus::Complete => "Run completed",
            RunStatus::Running => "Run in progress",
            RunStatus::Queued => "Waiting in queue",
            RunStatus::Pending => "Waiting for outputs",
            RunStatus::Error => "Run failed - check RUN_ERROR.log",
            RunStatus::Unknown => "Status unavailable",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One renderable row of the runs tree, re-derived from the log on every
/// refresh rather than patched in place.
#[derive(Debug, Clone)]
pub struct RunNode {
    pub label: String,
    pub url: Option<String>,
    pub status: Option<RunStatus>,
    pub is_latest: bool,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub timestamp: Instant,
}

/// Immutable configuration set at startup.
pub struct AppConfig {
    pub root: PathBuf,
    pub kernel_ref: Option<String>,
}

pub struct AppState {
    pub config: AppConfig,

    // Run data (source of truth is the durable log; this is the last window read)
    pub records: Vec<RunRecord>,
    pub latest_status: Option<RunStatus>,
    pub nodes: Vec<RunNode>,

    // Navigation
    pub cursor: usize,

    // Push flow
    pub is_pushing: bool,
    pub push_progress: Option<(String, u8)>,

    // Refresh bookkeeping
    pub is_loading: bool,
    pub last_refresh: Option<Instant>,
    pub next_refresh_in: u64,

    // Transient UI
    pub notifications: Vec<Notification>,
    pub error: Option<(String, Instant)>,
    pub spinner_frame: usize,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(root: PathBuf, kernel_ref: Option<String>) -> Self {
        Self {
            config: AppConfig { root, kernel_ref },
            records: Vec::new(),
            latest_status: None,
            nodes: Vec::new(),
            cursor: 0,
            is_pushing: false,
            push_progress: None,
            is_loading: false,
            last_refresh: None,
            next_refresh_in: 0,
            notifications: Vec::new(),
            error: None,
            spinner_frame: 0,
            should_quit: false,
        }
    }

    /// Re-derives the node list from the current record window. The last
    /// record is the only one that carries a status badge; everything
    /// older renders as a plain historical link.
    pub fn rebuild_nodes(&mut self) {
        let last = self.records.len().saturating_sub(1);
        self.nodes = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let is_latest = !self.records.is_empty() && i == last;
                RunNode {
                    label: r.label.clone(),
                    url: r.url.clone(),
                    status: if is_latest { self.latest_status } else { None },
                    is_latest,
                }
            })
            .collect();
        if self.cursor >= self.nodes.len() && !self.nodes.is_empty() {
            self.cursor = self.nodes.len() - 1;
        } else if self.nodes.is_empty() {
            self.cursor = 0;
        }
    }

    /// Applies a refresh result. Returns the new status when the latest
    /// run just transitioned into a terminal state, so the caller can
    /// raise a desktop notification.
    pub fn apply_runs_result(
        &mut self,
        records: Vec<RunRecord>,
        latest_status: Option<RunStatus>,
    ) -> Option<RunStatus> {
        let previous = self.latest_status;
        self.records = records;
        self.latest_status = latest_status;
        self.rebuild_nodes();
        self.is_loading = false;
        self.last_refresh = Some(Instant::now());

        match (previous, latest_status) {
            (Some(old), Some(new)) if old != new && new.is_terminal() => {
                self.notifications.push(Notification {
                    message: format!("Latest run: {}", new.tooltip()),
                    timestamp: Instant::now(),
                });
                Some(new)
            }
            _ => None,
        }
    }

    pub fn move_cursor_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn move_cursor_down(&mut self) {
        if !self.nodes.is_empty() && self.cursor < self.nodes.len() - 1 {
            self.cursor += 1;
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.nodes.get(self.cursor).and_then(|n| n.url.as_deref())
    }

    pub fn advance_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAME_COUNT;
    }

    pub fn set_error(&mut self, msg: String) {
        self.error = Some((msg, Instant::now()));
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn prune_error(&mut self) {
        if let Some((_, ts)) = &self.error {
            if ts.elapsed().as_secs() >= ERROR_TTL_SECS {
                self.error = None;
            }
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|(msg, _)| msg.as_str())
    }

    pub fn prune_notifications(&mut self) {
        let now = Instant::now();
        self.notifications
            .retain(|n| now.duration_since(n.timestamp).as_secs() < NOTIFICATION_TTL_SECS);
    }
}
