// crates/actions/src/timer.rs

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use hisho_core::{HishoError, HishoResult};

use crate::TimerService;

pub const TIMER_DONE_MESSAGE: &str = "タイマーが終了しました！";

/// Announcement sent when a countdown reaches zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerFired {
    pub id: Uuid,
    pub seconds: u64,
    pub message: String,
}

/// Countdowns on the tokio runtime; completions arrive on the channel
/// returned by [`TokioTimer::new`].
pub struct TokioTimer {
    tx: mpsc::UnboundedSender<TimerFired>,
    running: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioTimer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                running: Mutex::new(Vec::new()),
            },
            rx,
        )
    }

    pub fn active(&self) -> usize {
        let mut running = self.running.lock();
        running.retain(|handle| !handle.is_finished());
        running.len()
    }

    pub fn cancel_all(&self) {
        let mut running = self.running.lock();
        for handle in running.drain(..) {
            handle.abort();
        }
        info!("All timers cancelled");
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for handle in self.running.get_mut().drain(..) {
            handle.abort();
        }
    }
}

#[async_trait]
impl TimerService for TokioTimer {
    async fn start_timer(&self, seconds: u64) -> HishoResult<String> {
        if seconds == 0 {
            return Err(HishoError::Action("timer duration must be positive".to_string()));
        }

        let id = Uuid::new_v4();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            debug!(%id, seconds, "Timer fired");
            let _ = tx.send(TimerFired {
                id,
                seconds,
                message: TIMER_DONE_MESSAGE.to_string(),
            });
        });

        let mut running = self.running.lock();
        running.retain(|handle| !handle.is_finished());
        running.push(handle);

        info!(%id, seconds, "Timer started");
        Ok(format!("{}のタイマーをセットしました", format_duration(seconds)))
    }
}

/// `90` → `1分30秒`, `3600` → `1時間`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}時間", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}分", minutes));
    }
    if secs > 0 || out.is_empty() {
        out.push_str(&format!("{}秒", secs));
    }
    out
}
