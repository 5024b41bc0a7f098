use thiserror::Error;

use super::node::QuestId;
use super::state::QuestKind;

/// Configuration-time misuse of a quest or the manager.
///
/// Redundant status transitions are not errors; they are ignored.
#[derive(Debug, Error, PartialEq)]
pub enum QuestError {
    #[error("quest '{0}' is not a multi quest and cannot hold children")]
    NotComposite(String),

    #[error("quest '{quest}' is a {actual} quest, expected {expected}")]
    WrongKind {
        quest: String,
        actual: QuestKind,
        expected: QuestKind,
    },

    /// Configuration after start, or adding an already started child
    #[error("quest '{0}' has already started")]
    AlreadyStarted(String),

    #[error("multi quest '{0}' has no children")]
    NoChildren(String),

    #[error("time limit must be positive (got {0})")]
    InvalidTimeLimit(f32),

    #[error("no quest with id {0}")]
    UnknownQuest(QuestId),
}
