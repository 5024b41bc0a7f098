//! Quest Manager
//!
//! Owns the root quests of a session, re-broadcasts their status changes and
//! routes outside stimuli (location samples, fetched items, timer ticks) into
//! the quest trees.

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::EngineConfig;

use super::bounds::Bounds;
use super::error::QuestError;
use super::events::QuestEvent;
use super::item::QuestItem;
use super::node::{Changes, Quest, QuestId};
use super::state::{QuestKind, QuestStatus};
use super::timer::Ticker;

/// Registry for the root quests of one session
pub struct QuestManager {
    quests: Vec<Quest>,
    events: broadcast::Sender<QuestEvent>,
}

impl QuestManager {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            quests: Vec::new(),
            events,
        }
    }

    /// Receive every event broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<QuestEvent> {
        self.events.subscribe()
    }

    /// Register a root quest and start re-broadcasting its tree's changes
    pub fn add_quest(&mut self, mut quest: Quest) -> QuestId {
        let root_id = quest.id();
        let root_name = quest.name().to_string();
        let rewards = quest.rewards().to_vec();
        let events = self.events.clone();

        quest.subscribe(move |change| {
            let _ = events.send(QuestEvent::StatusChanged {
                root_id,
                quest_id: change.quest_id,
                name: change.name.clone(),
                status: change.status,
            });

            if change.quest_id != root_id {
                return;
            }
            match change.status {
                QuestStatus::Completed => {
                    let _ = events.send(QuestEvent::Completed {
                        quest_id: root_id,
                        name: change.name.clone(),
                        rewards: rewards.clone(),
                    });
                }
                QuestStatus::Failed => {
                    let _ = events.send(QuestEvent::Failed {
                        quest_id: root_id,
                        name: change.name.clone(),
                    });
                }
                _ => {}
            }
        });

        info!("Registered quest '{}' ({})", root_name, root_id);
        let _ = self.events.send(QuestEvent::NewQuest {
            quest_id: root_id,
            name: root_name,
        });
        self.quests.push(quest);
        root_id
    }

    /// Root quests, optionally only those with the given status
    pub fn quests(&self, filter: Option<QuestStatus>) -> Vec<&Quest> {
        self.quests
            .iter()
            .filter(|quest| filter.is_none_or(|status| quest.status() == status))
            .collect()
    }

    /// Any quest in any registered tree
    pub fn get(&self, id: QuestId) -> Option<&Quest> {
        self.quests.iter().find_map(|quest| quest.find(id))
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// Start a registered root quest. Children are started by their parents.
    pub fn start_quest(&mut self, id: QuestId) -> Result<(), QuestError> {
        let quest = self
            .quests
            .iter_mut()
            .find(|quest| quest.id() == id)
            .ok_or(QuestError::UnknownQuest(id))?;
        quest.start()
    }

    pub fn complete_quest(&mut self, id: QuestId) -> Result<(), QuestError> {
        self.root_containing(id)?.complete_quest(id)
    }

    pub fn fail_quest(&mut self, id: QuestId) -> Result<(), QuestError> {
        self.root_containing(id)?.fail_quest(id)
    }

    pub fn timer_tick(&mut self, id: QuestId) -> Result<(), QuestError> {
        self.root_containing(id)?.timer_tick(id)
    }

    /// Complete every active destination quest the tracked volume overlaps.
    ///
    /// Only in-progress roots are checked, and multi quests are only entered
    /// through children that are themselves in progress.
    pub fn check_location(&mut self, bounds: &Bounds) {
        for quest in self
            .quests
            .iter_mut()
            .filter(|quest| quest.status() == QuestStatus::InProgress)
        {
            let mut changes = Vec::new();
            check_quest_location(quest, bounds, &mut changes);
        }
    }

    /// Offer a fetched item to every root quest. Each quest ignores items it
    /// has no use for. Returns the roots this item completed.
    pub fn item_fetched(&mut self, item: &QuestItem) -> Vec<QuestId> {
        debug!("Item '{}' x{} fetched", item.id(), item.quantity());
        self.quests
            .iter_mut()
            .filter_map(|quest| quest.item_fetched(item).then(|| quest.id()))
            .collect()
    }

    /// Back every running countdown with a tick task
    pub fn arm_timers(&mut self, ticker: &Ticker) {
        for quest in &mut self.quests {
            quest.arm_timers(ticker);
        }
    }

    fn root_containing(&mut self, id: QuestId) -> Result<&mut Quest, QuestError> {
        self.quests
            .iter_mut()
            .find(|quest| quest.contains(id))
            .ok_or(QuestError::UnknownQuest(id))
    }
}

impl Default for QuestManager {
    fn default() -> Self {
        Self::new()
    }
}

fn check_quest_location(quest: &mut Quest, bounds: &Bounds, changes: &mut Changes) {
    match quest.kind() {
        QuestKind::Multi => {
            quest.for_each_active_child(
                |child, child_changes| check_quest_location(child, bounds, child_changes),
                changes,
            );
        }
        QuestKind::Destination => {
            let reached = quest.status() == QuestStatus::InProgress
                && quest
                    .destination_bounds()
                    .is_some_and(|destination| destination.intersects(bounds));
            if reached {
                debug!("Destination of quest '{}' reached", quest.name());
                quest.complete_into(changes);
            }
        }
        QuestKind::Fetch => {}
    }
}
