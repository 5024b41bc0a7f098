//! Quest Goals
//!
//! Kind-specific quest data. Each variant only carries what its kind uses.

use super::bounds::Bounds;
use super::item::QuestItem;
use super::node::Quest;
use super::state::{Composition, QuestKind};

#[derive(Debug)]
pub enum Goal {
    /// Completed when the tracked entity overlaps `bounds`
    Destination { bounds: Option<Bounds> },
    /// Completed once every required item id has been fetched often enough
    Fetch {
        required: Vec<QuestItem>,
        collected: Vec<QuestItem>,
    },
    /// Completed when every child is completed
    Multi {
        children: Vec<Quest>,
        composition: Composition,
    },
}

impl Goal {
    pub fn for_kind(kind: QuestKind) -> Self {
        match kind {
            QuestKind::Destination => Goal::Destination { bounds: None },
            QuestKind::Fetch => Goal::Fetch {
                required: Vec::new(),
                collected: Vec::new(),
            },
            QuestKind::Multi => Goal::Multi {
                children: Vec::new(),
                composition: Composition::default(),
            },
        }
    }

    pub fn kind(&self) -> QuestKind {
        match self {
            Goal::Destination { .. } => QuestKind::Destination,
            Goal::Fetch { .. } => QuestKind::Fetch,
            Goal::Multi { .. } => QuestKind::Multi,
        }
    }
}

/// Record `item` unless its id is already saturated. Returns true if recorded.
///
/// Ids that were never required are recorded too; they never count toward
/// completion.
pub fn record_fetch(
    required: &[QuestItem],
    collected: &mut Vec<QuestItem>,
    item: &QuestItem,
) -> bool {
    let wanted = required.iter().filter(|r| r.matches(item)).count();
    let have = collected.iter().filter(|c| c.matches(item)).count();

    if wanted == 0 || have < wanted {
        collected.push(item.clone());
        true
    } else {
        false
    }
}

/// Every required id has been collected as many times as it is listed.
/// An empty target list is never satisfied.
pub fn fetch_satisfied(required: &[QuestItem], collected: &[QuestItem]) -> bool {
    !required.is_empty()
        && required.iter().all(|r| {
            let wanted = required.iter().filter(|other| other.matches(r)).count();
            let have = collected.iter().filter(|c| c.matches(r)).count();
            have >= wanted
        })
}
