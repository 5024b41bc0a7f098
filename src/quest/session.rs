//! Quest Session
//!
//! The single logical thread all quest mutation happens on. Game code, timer
//! tasks and the location tracker never touch quests directly: they post
//! `SessionCommand`s on an unbounded queue that `QuestSession::run` drains in
//! order.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;

use super::bounds::Bounds;
use super::events::QuestEvent;
use super::item::QuestItem;
use super::manager::QuestManager;
use super::node::QuestId;
use super::timer::Ticker;

/// Work posted to a session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    StartQuest(QuestId),
    CompleteQuest(QuestId),
    FailQuest(QuestId),
    ItemFetched(QuestItem),
    /// One countdown second elapsed for this quest
    TimerTick(QuestId),
    /// Sample the tracked entity and test destinations
    CheckLocation,
    Shutdown,
}

/// Reports where the tracked entity currently is
pub trait LocationSource: Send {
    /// Volumes making up the entity (body, held items, ...). The session
    /// tests their enclosing volume.
    fn current_bounds(&self) -> Vec<Bounds>;
}

impl<F> LocationSource for F
where
    F: Fn() -> Vec<Bounds> + Send,
{
    fn current_bounds(&self) -> Vec<Bounds> {
        self()
    }
}

/// Cloneable sender for posting commands from anywhere.
///
/// Every method returns false once the session has stopped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn start_quest(&self, id: QuestId) -> bool {
        self.send(SessionCommand::StartQuest(id))
    }

    pub fn complete_quest(&self, id: QuestId) -> bool {
        self.send(SessionCommand::CompleteQuest(id))
    }

    pub fn fail_quest(&self, id: QuestId) -> bool {
        self.send(SessionCommand::FailQuest(id))
    }

    pub fn item_fetched(&self, item: QuestItem) -> bool {
        self.send(SessionCommand::ItemFetched(item))
    }

    pub fn check_location(&self) -> bool {
        self.send(SessionCommand::CheckLocation)
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionCommand::Shutdown)
    }
}

pub struct QuestSession<L> {
    manager: QuestManager,
    source: L,
    config: EngineConfig,
    /// Keeps the queue open until `run` starts
    commands_tx: mpsc::UnboundedSender<SessionCommand>,
    commands_rx: mpsc::UnboundedReceiver<SessionCommand>,
    ticker: Ticker,
    tracking: Option<JoinHandle<()>>,
}

impl<L: LocationSource> QuestSession<L> {
    pub fn new(manager: QuestManager, source: L, config: EngineConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let ticker = Ticker::new(commands_tx.downgrade(), config.timer_period());
        Self {
            manager,
            source,
            config,
            commands_tx,
            commands_rx,
            ticker,
            tracking: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            commands: self.commands_tx.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QuestEvent> {
        self.manager.subscribe()
    }

    pub fn manager(&self) -> &QuestManager {
        &self.manager
    }

    /// For registering quests before the session runs
    pub fn manager_mut(&mut self) -> &mut QuestManager {
        &mut self.manager
    }

    /// Sample the location at the configured interval
    pub fn start_tracking_location(&mut self) {
        let interval = self.config.location_interval();
        self.start_tracking_location_every(interval);
    }

    /// Sample the location every `interval`, starting now. Replaces any
    /// tracking already running. Must be called within a tokio runtime.
    pub fn start_tracking_location_every(&mut self, interval: Duration) {
        self.stop_tracking_location();

        let commands = self.commands_tx.downgrade();
        self.tracking = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                let sent = commands
                    .upgrade()
                    .is_some_and(|tx| tx.send(SessionCommand::CheckLocation).is_ok());
                if !sent {
                    break;
                }
            }
        }));
        info!("Tracking location every {:?}", interval);
    }

    pub fn stop_tracking_location(&mut self) {
        if let Some(task) = self.tracking.take() {
            task.abort();
            info!("Stopped tracking location");
        }
    }

    pub fn is_tracking_location(&self) -> bool {
        self.tracking.is_some()
    }

    /// Drain commands until `Shutdown` or until every `SessionHandle` is
    /// dropped, then hand the manager back
    pub async fn run(mut self) -> QuestManager {
        info!("Quest session running with {} root quests", self.manager.len());
        // From here on only handles keep the queue open
        let (closed, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut self.commands_tx, closed));
        self.manager.arm_timers(&self.ticker);

        while let Some(command) = self.commands_rx.recv().await {
            if !self.apply(command) {
                break;
            }
            self.manager.arm_timers(&self.ticker);
        }

        self.stop_tracking_location();
        info!("Quest session stopped");
        self.manager
    }

    /// Apply one command. Returns false on shutdown.
    fn apply(&mut self, command: SessionCommand) -> bool {
        let result = match command {
            SessionCommand::StartQuest(id) => self.manager.start_quest(id),
            SessionCommand::CompleteQuest(id) => self.manager.complete_quest(id),
            SessionCommand::FailQuest(id) => self.manager.fail_quest(id),
            SessionCommand::TimerTick(id) => self.manager.timer_tick(id),
            SessionCommand::ItemFetched(item) => {
                self.manager.item_fetched(&item);
                Ok(())
            }
            SessionCommand::CheckLocation => {
                self.sample_location();
                Ok(())
            }
            SessionCommand::Shutdown => return false,
        };

        if let Err(e) = result {
            warn!("Dropped session command: {}", e);
        }
        true
    }

    fn sample_location(&mut self) {
        let parts = self.source.current_bounds();
        match Bounds::enclosing(&parts) {
            Some(bounds) => self.manager.check_location(&bounds),
            None => debug!("Location source reported no bounds"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::{Composition, Quest, QuestStatus};
    use std::sync::{Arc, Mutex};

    fn spot(x: f32) -> Bounds {
        Bounds::from_center_size([x, 0.0, 0.0], [1.0, 1.0, 1.0])
    }

    fn nowhere() -> Vec<Bounds> {
        Vec::new()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expiry_runs_on_session() {
        let mut manager = QuestManager::new();
        let mut quest = Quest::destination("Hurry", "", spot(50.0));
        quest.set_time_limit(3.0).unwrap();
        let id = manager.add_quest(quest);

        let session = QuestSession::new(manager, nowhere, EngineConfig::default());
        let handle = session.handle();
        handle.start_quest(id);
        let task = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.check_location();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        handle.shutdown();

        let manager = task.await.unwrap();
        let quest = manager.get(id).unwrap();
        assert_eq!(quest.status(), QuestStatus::Failed);
        assert!(!quest.timer_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_quest_timer_stops_ticking() {
        let mut manager = QuestManager::new();
        let mut quest = Quest::fetch("Quick", "", [QuestItem::single("key")]);
        quest.set_time_limit(2.0).unwrap();
        let id = manager.add_quest(quest);

        let session = QuestSession::new(manager, nowhere, EngineConfig::default());
        let handle = session.handle();
        handle.start_quest(id);
        handle.item_fetched(QuestItem::single("key"));
        let task = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.shutdown();

        let manager = task.await.unwrap();
        let quest = manager.get(id).unwrap();
        assert_eq!(quest.status(), QuestStatus::Completed);
        assert_eq!(quest.time_remaining(), Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_tracking_completes_destinations() {
        let position = Arc::new(Mutex::new(spot(100.0)));
        let reported = Arc::clone(&position);
        let source = move || vec![*reported.lock().unwrap()];

        let mut root = Quest::multi("Tour", "", Composition::Sequential);
        let well = root.add_child(Quest::destination("well", "", spot(0.0))).unwrap();
        let mill = root.add_child(Quest::destination("mill", "", spot(8.0))).unwrap();

        let mut session = QuestSession::new(QuestManager::new(), source, EngineConfig::default());
        let id = session.manager_mut().add_quest(root);
        let mut events = session.subscribe();
        let handle = session.handle();
        handle.start_quest(id);
        session.start_tracking_location();
        assert!(session.is_tracking_location());
        let task = tokio::spawn(session.run());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        *position.lock().unwrap() = spot(0.3);
        tokio::time::sleep(Duration::from_secs(1)).await;
        *position.lock().unwrap() = spot(8.0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.shutdown();

        let manager = task.await.unwrap();
        assert_eq!(manager.get(well).unwrap().status(), QuestStatus::Completed);
        assert_eq!(manager.get(mill).unwrap().status(), QuestStatus::Completed);
        assert_eq!(manager.get(id).unwrap().status(), QuestStatus::Completed);

        let mut completed = false;
        while let Ok(event) = events.try_recv() {
            if let QuestEvent::Completed { quest_id, .. } = event {
                completed = quest_id == id;
            }
        }
        assert!(completed);
    }

    #[tokio::test]
    async fn test_stop_tracking_is_idempotent() {
        let mut session = QuestSession::new(QuestManager::new(), nowhere, EngineConfig::default());
        session.stop_tracking_location();
        session.start_tracking_location_every(Duration::from_millis(10));
        session.stop_tracking_location();
        session.stop_tracking_location();
        assert!(!session.is_tracking_location());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ends_when_every_handle_is_dropped() {
        let mut manager = QuestManager::new();
        let mut quest = Quest::destination("Linger", "", spot(50.0));
        quest.set_time_limit(100.0).unwrap();
        let id = manager.add_quest(quest);

        let mut session = QuestSession::new(manager, nowhere, EngineConfig::default());
        let handle = session.handle();
        handle.start_quest(id);
        session.start_tracking_location();
        drop(handle);

        let manager = tokio::time::timeout(Duration::from_secs(10), session.run())
            .await
            .unwrap();
        assert_eq!(manager.get(id).unwrap().status(), QuestStatus::InProgress);
    }

    #[tokio::test]
    async fn test_unknown_commands_are_dropped() {
        let session = QuestSession::new(QuestManager::new(), nowhere, EngineConfig::default());
        let handle = session.handle();
        handle.fail_quest(QuestId::new());
        handle.send(SessionCommand::TimerTick(QuestId::new()));
        handle.shutdown();

        let manager = session.run().await;
        assert!(manager.is_empty());
        assert!(!handle.start_quest(QuestId::new()));
    }
}
