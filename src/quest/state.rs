//! Quest State Types
//!
//! Status, kind and composition enums plus the status-change record that
//! listeners receive.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::node::QuestId;

/// Status of a quest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestStatus {
    /// Configured but not yet started
    NotStarted,
    /// Started and waiting on its goal
    InProgress,
    /// Goal reached
    Completed,
    /// Failed by a child, an expired timer or an explicit failure
    Failed,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::NotStarted => "not_started",
            QuestStatus::InProgress => "in_progress",
            QuestStatus::Completed => "completed",
            QuestStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(QuestStatus::NotStarted),
            "in_progress" => Some(QuestStatus::InProgress),
            "completed" => Some(QuestStatus::Completed),
            "failed" => Some(QuestStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, QuestStatus::Completed | QuestStatus::Failed)
    }

    /// Whether the forward-only lifecycle allows moving to `next`
    pub fn can_become(&self, next: QuestStatus) -> bool {
        match next {
            QuestStatus::NotStarted => false,
            QuestStatus::InProgress => *self == QuestStatus::NotStarted,
            QuestStatus::Completed => *self == QuestStatus::InProgress,
            QuestStatus::Failed => !self.is_terminal(),
        }
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Goal type of a quest, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestKind {
    /// Reach a volume in the world
    Destination,
    /// Collect a set of named items
    Fetch,
    /// Complete a list of child quests
    Multi,
}

impl QuestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestKind::Destination => "destination",
            QuestKind::Fetch => "fetch",
            QuestKind::Multi => "multi",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "destination" | "location" | "reach" => Some(QuestKind::Destination),
            "fetch" | "collect" => Some(QuestKind::Fetch),
            "multi" | "nested" => Some(QuestKind::Multi),
            _ => None,
        }
    }
}

impl fmt::Display for QuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a multi quest runs its children
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Composition {
    /// One child at a time, in declared order
    #[default]
    Sequential,
    /// Every child at once
    Parallel,
}

/// A single status transition, delivered to listeners after it is committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub quest_id: QuestId,
    pub name: String,
    pub status: QuestStatus,
    /// Forced failures from a failing sibling never re-enter resolution
    #[serde(skip)]
    pub(crate) cascade: bool,
}

impl StatusChange {
    pub(crate) fn new(quest_id: QuestId, name: &str, status: QuestStatus, cascade: bool) -> Self {
        Self {
            quest_id,
            name: name.to_string(),
            status,
            cascade,
        }
    }

    /// True when this change was forced by a failing sibling branch
    pub fn is_cascade(&self) -> bool {
        self.cascade
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(QuestStatus::from_str("in_progress"), Some(QuestStatus::InProgress));
        assert_eq!(QuestStatus::from_str("failed"), Some(QuestStatus::Failed));
        assert_eq!(QuestStatus::from_str("abandoned"), None);
        assert_eq!(QuestStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_forward_only_transitions() {
        assert!(QuestStatus::NotStarted.can_become(QuestStatus::InProgress));
        assert!(QuestStatus::NotStarted.can_become(QuestStatus::Failed));
        assert!(!QuestStatus::NotStarted.can_become(QuestStatus::Completed));
        assert!(QuestStatus::InProgress.can_become(QuestStatus::Completed));
        assert!(!QuestStatus::InProgress.can_become(QuestStatus::InProgress));

        for terminal in [QuestStatus::Completed, QuestStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                QuestStatus::NotStarted,
                QuestStatus::InProgress,
                QuestStatus::Completed,
                QuestStatus::Failed,
            ] {
                assert!(!terminal.can_become(next));
            }
        }
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(QuestKind::from_str("Nested"), Some(QuestKind::Multi));
        assert_eq!(QuestKind::from_str("collect"), Some(QuestKind::Fetch));
        assert_eq!(QuestKind::from_str("none"), None);
        assert_eq!(Composition::default(), Composition::Sequential);
    }
}
