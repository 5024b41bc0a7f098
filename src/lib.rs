//! Quest Engine
//!
//! Quests that can be tracked on their own or composed into trees whose
//! completion and failure are derived from their children.

pub mod config;
pub mod quest;

pub use config::{ConfigError, EngineConfig};
pub use quest::{
    Bounds, Composition, LocationSource, Quest, QuestError, QuestEvent, QuestId, QuestItem,
    QuestKind, QuestManager, QuestSession, QuestStatus, SessionHandle, StatusChange,
};
