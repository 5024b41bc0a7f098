//! Quest Event Types
//!
//! Events the manager broadcasts to its subscribers.

use serde::{Deserialize, Serialize};

use super::item::QuestItem;
use super::node::QuestId;
use super::state::QuestStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuestEvent {
    /// A root quest was registered
    NewQuest { quest_id: QuestId, name: String },

    /// A quest anywhere in a registered tree changed status
    StatusChanged {
        /// Root of the tree the quest belongs to
        root_id: QuestId,
        quest_id: QuestId,
        name: String,
        status: QuestStatus,
    },

    /// A root quest completed; rewards are for the caller to grant
    Completed {
        quest_id: QuestId,
        name: String,
        rewards: Vec<QuestItem>,
    },

    /// A root quest failed
    Failed { quest_id: QuestId, name: String },
}

impl QuestEvent {
    /// The quest the event is about
    pub fn quest_id(&self) -> QuestId {
        match self {
            QuestEvent::NewQuest { quest_id, .. } => *quest_id,
            QuestEvent::StatusChanged { quest_id, .. } => *quest_id,
            QuestEvent::Completed { quest_id, .. } => *quest_id,
            QuestEvent::Failed { quest_id, .. } => *quest_id,
        }
    }

    /// Get event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        match self {
            QuestEvent::NewQuest { .. } => "new_quest",
            QuestEvent::StatusChanged { .. } => "status_changed",
            QuestEvent::Completed { .. } => "completed",
            QuestEvent::Failed { .. } => "failed",
        }
    }
}
