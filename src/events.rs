use crate::app::RunStatus;
use crate::runlog::RunRecord;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Tick,
    RunsResult {
        records: Vec<RunRecord>,
        latest_status: Option<RunStatus>,
    },
    PushState(bool),
    PollProgress {
        message: String,
        percent: u8,
    },
    Info(String),
    Error(String),
}

/// Marks "a push is in flight" for the duration of a scope. The flag is
/// cleared on drop, so the indicator cannot stick after an early return
/// or a panic inside the push task.
pub struct PushGuard {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl PushGuard {
    pub fn begin(tx: &mpsc::UnboundedSender<AppEvent>) -> Self {
        let _ = tx.send(AppEvent::PushState(true));
        Self { tx: tx.clone() }
    }
}

impl Drop for PushGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(AppEvent::PushState(false));
    }
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    _tx: mpsc::UnboundedSender<AppEvent>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();

        let thread = std::thread::spawn(move || {
            while !shutdown_flag.load(Ordering::Relaxed) {
                if event::poll(tick_rate).unwrap_or(false) {
                    if let Ok(CrosstermEvent::Key(key)) = event::read() {
                        if event_tx.send(AppEvent::Key(key)).is_err() {
                            break;
                        }
                    }
                } else if event_tx.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self {
            rx,
            _tx: tx,
            shutdown,
            thread: Some(thread),
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self._tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.stop();
    }
}
