//! Quest Countdown Timers
//!
//! A `Countdown` is pure state owned by its quest. Real time only enters
//! through a `TimerHandle`: a tokio task that posts tick commands onto the
//! session queue, so every decrement happens on the session's single logical
//! thread. Dropping the handle aborts the task. Tick tasks only hold a weak
//! sender and never keep a session alive on their own.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::debug;

use super::node::QuestId;
use super::session::SessionCommand;

/// Per-quest time limit, counted down one second per tick
#[derive(Debug)]
pub struct Countdown {
    limit: f32,
    remaining: f32,
    running: bool,
    handle: Option<TimerHandle>,
}

impl Countdown {
    pub fn new(limit_secs: f32) -> Self {
        Self {
            limit: limit_secs,
            remaining: limit_secs,
            running: false,
            handle: None,
        }
    }

    pub fn limit(&self) -> f32 {
        self.limit
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn begin(&mut self) {
        self.running = true;
    }

    /// Count down one second. Returns true when this tick expired the timer.
    pub(crate) fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.remaining -= 1.0;
        if self.remaining <= 0.0 {
            self.stop();
            return true;
        }
        false
    }

    /// Stop counting and release the tick task. Safe to call repeatedly.
    pub(crate) fn stop(&mut self) {
        self.running = false;
        self.handle = None;
    }

    pub(crate) fn reset(&mut self) {
        self.remaining = self.limit;
    }

    /// Running but not yet backed by a tick task
    pub(crate) fn needs_handle(&self) -> bool {
        self.running && self.handle.is_none()
    }

    pub(crate) fn attach(&mut self, handle: TimerHandle) {
        self.handle = Some(handle);
    }
}

/// Owned tick task; aborted when dropped
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns tick tasks that feed a session's command queue
#[derive(Debug, Clone)]
pub struct Ticker {
    commands: mpsc::WeakUnboundedSender<SessionCommand>,
    period: Duration,
}

impl Ticker {
    pub fn new(commands: mpsc::WeakUnboundedSender<SessionCommand>, period: Duration) -> Self {
        Self { commands, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start posting `TimerTick(quest_id)` once per period. Must be called
    /// from within a tokio runtime.
    pub fn every_period(&self, quest_id: QuestId) -> TimerHandle {
        let commands = self.commands.clone();
        let period = self.period;

        let task = tokio::spawn(async move {
            // First tick one full period after arming
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let sent = commands
                    .upgrade()
                    .is_some_and(|tx| tx.send(SessionCommand::TimerTick(quest_id)).is_ok());
                if !sent {
                    debug!("Session gone, stopping timer for quest {}", quest_id);
                    break;
                }
            }
        });

        TimerHandle { task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_expires_after_limit_ticks() {
        let mut countdown = Countdown::new(3.0);

        // Not started yet
        assert!(!countdown.tick());
        assert_eq!(countdown.remaining(), 3.0);

        countdown.begin();
        assert!(!countdown.tick());
        assert!(!countdown.tick());
        assert!(countdown.tick());
        assert!(!countdown.is_running());

        // Stopped timers ignore late ticks
        assert!(!countdown.tick());
        assert_eq!(countdown.remaining(), 0.0);
    }

    #[test]
    fn test_stop_and_reset() {
        let mut countdown = Countdown::new(2.5);
        countdown.begin();
        countdown.tick();
        assert_eq!(countdown.remaining(), 1.5);

        countdown.reset();
        assert_eq!(countdown.remaining(), 2.5);

        countdown.stop();
        countdown.stop();
        assert!(!countdown.is_running());
        assert!(!countdown.needs_handle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_posts_ticks_until_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = Ticker::new(tx.downgrade(), Duration::from_secs(1));
        let quest_id = QuestId::new();

        let handle = ticker.every_period(quest_id);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(matches!(rx.try_recv(), Ok(SessionCommand::TimerTick(id)) if id == quest_id));
        assert!(matches!(rx.try_recv(), Ok(SessionCommand::TimerTick(_))));
        assert!(rx.try_recv().is_err());

        drop(handle);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err());
    }
}
