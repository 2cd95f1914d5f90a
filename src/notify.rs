use crate::app::RunStatus;

/// Desktop notification when the latest run reaches a terminal state.
/// Best-effort: a missing notification daemon is silently ignored.
#[cfg(feature = "desktop-notify")]
pub fn send_desktop(status: RunStatus) {
    use notify_rust::{Notification, Urgency};

    let (summary, body, icon, urgency) = match status {
        RunStatus::Complete => (
            "Kaggle run completed",
            "Outputs are ready to download.",
            "dialog-information",
            Urgency::Normal,
        ),
        RunStatus::Error => (
            "Kaggle run failed",
            "Check RUN_ERROR.log for details.",
            "dialog-error",
            Urgency::Critical,
        ),
        _ => return,
    };

    let _ = Notification::new()
        .summary(summary)
        .body(body)
        .icon(icon)
        .urgency(urgency)
        .show();
}

#[cfg(not(feature = "desktop-notify"))]
pub fn send_desktop(_status: RunStatus) {}
