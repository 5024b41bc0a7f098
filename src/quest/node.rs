//! Quest State Machine
//!
//! A `Quest` owns its goal, its optional countdown and, for multi quests, its
//! children. Every status transition is delivered to the quest's listeners
//! and handed back up to the parent, which re-broadcasts it to its own
//! listeners and runs its resolution step when the change came from a direct
//! child. Status only moves forward and terminal states are final, so
//! repeated or late stimuli are ignored rather than reported as errors.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::bounds::Bounds;
use super::error::QuestError;
use super::goal::{self, Goal};
use super::item::QuestItem;
use super::state::{Composition, QuestKind, QuestStatus, StatusChange};
use super::timer::{Countdown, Ticker};

/// Changes collected while an operation runs, oldest first
pub(crate) type Changes = Vec<StatusChange>;

type Listener = Box<dyn FnMut(&StatusChange) + Send>;

/// Unique quest identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestId(Uuid);

impl QuestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub struct Quest {
    id: QuestId,
    name: String,
    description: String,
    status: QuestStatus,
    rewards: Vec<QuestItem>,
    /// Set once by `add_child`
    parent: Option<QuestId>,
    goal: Goal,
    countdown: Option<Countdown>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for Quest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quest")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("goal", &self.goal)
            .field("countdown", &self.countdown)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Quest {
    pub fn new(name: &str, description: &str, kind: QuestKind) -> Self {
        Self {
            id: QuestId::new(),
            name: name.to_string(),
            description: description.to_string(),
            status: QuestStatus::NotStarted,
            rewards: Vec::new(),
            parent: None,
            goal: Goal::for_kind(kind),
            countdown: None,
            started_at: None,
            finished_at: None,
            listeners: Vec::new(),
        }
    }

    /// A destination quest targeting `bounds`
    pub fn destination(name: &str, description: &str, bounds: Bounds) -> Self {
        let mut quest = Self::new(name, description, QuestKind::Destination);
        quest.goal = Goal::Destination {
            bounds: Some(bounds),
        };
        quest
    }

    /// A fetch quest requiring each listed item once per occurrence
    pub fn fetch(
        name: &str,
        description: &str,
        items: impl IntoIterator<Item = QuestItem>,
    ) -> Self {
        let mut quest = Self::new(name, description, QuestKind::Fetch);
        quest.goal = Goal::Fetch {
            required: items.into_iter().collect(),
            collected: Vec::new(),
        };
        quest
    }

    /// An empty multi quest; add children before starting it
    pub fn multi(name: &str, description: &str, composition: Composition) -> Self {
        let mut quest = Self::new(name, description, QuestKind::Multi);
        quest.goal = Goal::Multi {
            children: Vec::new(),
            composition,
        };
        quest
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> QuestId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> QuestKind {
        self.goal.kind()
    }

    pub fn status(&self) -> QuestStatus {
        self.status
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    pub fn rewards(&self) -> &[QuestItem] {
        &self.rewards
    }

    pub fn parent(&self) -> Option<QuestId> {
        self.parent
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Seconds spent since start, up to the finish if there is one
    pub fn elapsed_secs(&self) -> Option<i64> {
        self.started_at.map(|start| {
            let end = self.finished_at.unwrap_or_else(Utc::now);
            (end - start).num_seconds()
        })
    }

    pub fn destination_bounds(&self) -> Option<&Bounds> {
        match &self.goal {
            Goal::Destination { bounds } => bounds.as_ref(),
            _ => None,
        }
    }

    pub fn items_to_fetch(&self) -> &[QuestItem] {
        match &self.goal {
            Goal::Fetch { required, .. } => required,
            _ => &[],
        }
    }

    pub fn items_fetched(&self) -> &[QuestItem] {
        match &self.goal {
            Goal::Fetch { collected, .. } => collected,
            _ => &[],
        }
    }

    pub fn children(&self) -> &[Quest] {
        match &self.goal {
            Goal::Multi { children, .. } => children,
            _ => &[],
        }
    }

    pub fn composition(&self) -> Option<Composition> {
        match &self.goal {
            Goal::Multi { composition, .. } => Some(*composition),
            _ => None,
        }
    }

    pub fn has_time_limit(&self) -> bool {
        self.countdown.is_some()
    }

    pub fn time_limit(&self) -> Option<f32> {
        self.countdown.as_ref().map(Countdown::limit)
    }

    pub fn time_remaining(&self) -> Option<f32> {
        self.countdown.as_ref().map(Countdown::remaining)
    }

    pub fn timer_running(&self) -> bool {
        self.countdown.as_ref().is_some_and(Countdown::is_running)
    }

    /// This quest or one of its descendants
    pub fn find(&self, id: QuestId) -> Option<&Quest> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    pub fn contains(&self, id: QuestId) -> bool {
        self.find(id).is_some()
    }

    // ========================================================================
    // Configuration (only while not started)
    // ========================================================================

    fn ensure_configurable(&self) -> Result<(), QuestError> {
        if self.status != QuestStatus::NotStarted {
            return Err(QuestError::AlreadyStarted(self.name.clone()));
        }
        Ok(())
    }

    fn ensure_kind(&self, expected: QuestKind) -> Result<(), QuestError> {
        if self.kind() != expected {
            return Err(QuestError::WrongKind {
                quest: self.name.clone(),
                actual: self.kind(),
                expected,
            });
        }
        self.ensure_configurable()
    }

    pub fn add_reward(&mut self, reward: QuestItem) -> Result<(), QuestError> {
        self.ensure_configurable()?;
        self.rewards.push(reward);
        Ok(())
    }

    pub fn set_destination(&mut self, destination: Bounds) -> Result<(), QuestError> {
        self.ensure_kind(QuestKind::Destination)?;
        if let Goal::Destination { bounds } = &mut self.goal {
            *bounds = Some(destination);
        }
        Ok(())
    }

    pub fn set_time_limit(&mut self, seconds: f32) -> Result<(), QuestError> {
        self.ensure_configurable()?;
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(QuestError::InvalidTimeLimit(seconds));
        }
        self.countdown = Some(Countdown::new(seconds));
        Ok(())
    }

    pub fn clear_time_limit(&mut self) -> Result<(), QuestError> {
        self.ensure_configurable()?;
        self.countdown = None;
        Ok(())
    }

    pub fn add_item_to_fetch(&mut self, item: QuestItem) -> Result<(), QuestError> {
        self.ensure_kind(QuestKind::Fetch)?;
        if let Goal::Fetch { required, .. } = &mut self.goal {
            required.push(item);
        }
        Ok(())
    }

    /// Drop one required occurrence of the item's id. Returns whether one was
    /// listed.
    pub fn remove_item_to_fetch(&mut self, item: &QuestItem) -> Result<bool, QuestError> {
        self.ensure_kind(QuestKind::Fetch)?;
        if let Goal::Fetch { required, .. } = &mut self.goal {
            if let Some(index) = required.iter().position(|r| r.matches(item)) {
                required.remove(index);
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn set_composition(&mut self, value: Composition) -> Result<(), QuestError> {
        self.ensure_kind(QuestKind::Multi)?;
        if let Goal::Multi { composition, .. } = &mut self.goal {
            *composition = value;
        }
        Ok(())
    }

    /// Take ownership of `child`. Its changes bubble through this quest from
    /// now on.
    pub fn add_child(&mut self, mut child: Quest) -> Result<QuestId, QuestError> {
        if self.kind() != QuestKind::Multi {
            return Err(QuestError::NotComposite(self.name.clone()));
        }
        self.ensure_configurable()?;
        child.ensure_configurable()?;

        child.parent = Some(self.id);
        let child_id = child.id;
        if let Goal::Multi { children, .. } = &mut self.goal {
            children.push(child);
        }
        Ok(child_id)
    }

    /// Register a listener for this quest and everything below it
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&StatusChange) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the quest and, for multi quests, the children its composition
    /// calls for. Does nothing unless the quest is not started yet.
    pub fn start(&mut self) -> Result<(), QuestError> {
        if self.status != QuestStatus::NotStarted {
            debug!("Ignoring start of quest '{}' ({})", self.name, self.status);
            return Ok(());
        }
        self.validate()?;

        let mut changes = Vec::new();
        self.start_into(&mut changes);
        Ok(())
    }

    /// Complete an in-progress quest. Ignored in any other status.
    pub fn complete(&mut self) {
        let mut changes = Vec::new();
        self.complete_into(&mut changes);
    }

    /// Fail this quest and every unfinished branch below it
    pub fn fail(&mut self) {
        let mut changes = Vec::new();
        self.fail_into(false, &mut changes);
    }

    /// Complete this quest or a descendant, resolving every ancestor
    pub fn complete_quest(&mut self, id: QuestId) -> Result<(), QuestError> {
        self.route_public(id, |quest, changes| quest.complete_into(changes))
    }

    /// Fail this quest or a descendant, resolving every ancestor
    pub fn fail_quest(&mut self, id: QuestId) -> Result<(), QuestError> {
        self.route_public(id, |quest, changes| quest.fail_into(false, changes))
    }

    /// Deliver one countdown tick to this quest or a descendant
    pub fn timer_tick(&mut self, id: QuestId) -> Result<(), QuestError> {
        self.route_public(id, |quest, changes| quest.tick_into(changes))
    }

    /// Restore the full time limit
    pub fn reset_timer(&mut self) {
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.reset();
        }
    }

    /// Offer a fetched item. Returns true if this call completed the quest.
    pub fn item_fetched(&mut self, item: &QuestItem) -> bool {
        let mut changes = Vec::new();
        self.item_fetched_into(item, &mut changes)
    }

    fn validate(&self) -> Result<(), QuestError> {
        if let Goal::Multi { children, .. } = &self.goal {
            if children.is_empty() {
                return Err(QuestError::NoChildren(self.name.clone()));
            }
            for child in children {
                child.validate()?;
            }
        }
        Ok(())
    }

    fn route_public<F>(&mut self, id: QuestId, mut op: F) -> Result<(), QuestError>
    where
        F: FnMut(&mut Quest, &mut Changes),
    {
        let mut changes = Vec::new();
        if self.route(id, &mut op, &mut changes) {
            Ok(())
        } else {
            Err(QuestError::UnknownQuest(id))
        }
    }

    // ========================================================================
    // Internals shared with the manager
    // ========================================================================

    pub(crate) fn start_into(&mut self, changes: &mut Changes) {
        if !self.transition(QuestStatus::InProgress, false, changes) {
            return;
        }
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.begin();
        }

        let to_start: Vec<usize> = match &self.goal {
            Goal::Multi {
                children,
                composition: Composition::Sequential,
            } => (0..children.len().min(1)).collect(),
            Goal::Multi {
                children,
                composition: Composition::Parallel,
            } => (0..children.len()).collect(),
            _ => Vec::new(),
        };
        for index in to_start {
            self.with_child(
                index,
                |child, child_changes| child.start_into(child_changes),
                changes,
            );
        }
    }

    pub(crate) fn complete_into(&mut self, changes: &mut Changes) {
        if self.status != QuestStatus::InProgress {
            return;
        }
        self.transition(QuestStatus::Completed, false, changes);
    }

    /// Force-fail every unfinished child, then this quest. `cascade` marks the
    /// quest's own change as forced so its parent does not resolve on it.
    pub(crate) fn fail_into(&mut self, cascade: bool, changes: &mut Changes) {
        if self.status.is_terminal() {
            return;
        }
        for index in 0..self.children().len() {
            self.with_child(
                index,
                |child, child_changes| child.fail_into(true, child_changes),
                changes,
            );
        }
        self.transition(QuestStatus::Failed, cascade, changes);
    }

    pub(crate) fn tick_into(&mut self, changes: &mut Changes) {
        let expired = self.countdown.as_mut().is_some_and(Countdown::tick);
        if expired {
            info!("Quest '{}' ({}) ran out of time", self.name, self.id);
            self.fail_into(false, changes);
        }
    }

    pub(crate) fn item_fetched_into(&mut self, item: &QuestItem, changes: &mut Changes) -> bool {
        if self.status != QuestStatus::InProgress {
            return false;
        }

        if self.kind() == QuestKind::Multi {
            self.for_each_child_active_at_start(
                |child, child_changes| {
                    child.item_fetched_into(item, child_changes);
                },
                changes,
            );
            return self.status == QuestStatus::Completed;
        }

        let satisfied = match &mut self.goal {
            Goal::Fetch { required, collected } => {
                if goal::record_fetch(required, collected, item) {
                    debug!("Quest '{}' recorded item '{}'", self.name, item.id());
                }
                goal::fetch_satisfied(required, collected)
            }
            _ => false,
        };

        if satisfied {
            self.complete_into(changes);
        }
        satisfied
    }

    /// Run `op` on each child that is in progress when reached, absorbing the
    /// changes it produces before moving to the next child. A child started
    /// by an earlier sibling's completion is reached too.
    pub(crate) fn for_each_active_child<F>(&mut self, mut op: F, changes: &mut Changes)
    where
        F: FnMut(&mut Quest, &mut Changes),
    {
        for index in 0..self.children().len() {
            if self.children()[index].status == QuestStatus::InProgress {
                self.with_child(index, &mut op, changes);
            }
        }
    }

    /// Like `for_each_active_child`, but children started along the way are
    /// skipped, so a single stimulus is consumed by one generation only
    fn for_each_child_active_at_start<F>(&mut self, mut op: F, changes: &mut Changes)
    where
        F: FnMut(&mut Quest, &mut Changes),
    {
        let active: Vec<usize> = self
            .children()
            .iter()
            .enumerate()
            .filter(|(_, child)| child.status == QuestStatus::InProgress)
            .map(|(index, _)| index)
            .collect();
        for index in active {
            if self.children()[index].status == QuestStatus::InProgress {
                self.with_child(index, &mut op, changes);
            }
        }
    }

    /// Find the quest `id` in this subtree and apply `op` to it. Descendants
    /// of a finished quest are found but left untouched.
    pub(crate) fn route<F>(&mut self, id: QuestId, op: &mut F, changes: &mut Changes) -> bool
    where
        F: FnMut(&mut Quest, &mut Changes),
    {
        if self.id == id {
            op(self, changes);
            return true;
        }
        let Some(index) = self.children().iter().position(|child| child.contains(id)) else {
            return false;
        };
        if self.status.is_terminal() {
            debug!("Ignoring quest {} below finished quest '{}'", id, self.name);
            return true;
        }
        self.with_child(
            index,
            |child, child_changes| {
                child.route(id, op, child_changes);
            },
            changes,
        );
        true
    }

    /// Back every running countdown in this subtree with a tick task
    pub(crate) fn arm_timers(&mut self, ticker: &Ticker) {
        let id = self.id;
        if let Some(countdown) = self.countdown.as_mut() {
            if countdown.needs_handle() {
                debug!("Arming timer for quest '{}' ({})", self.name, id);
                countdown.attach(ticker.every_period(id));
            }
        }
        if let Goal::Multi { children, .. } = &mut self.goal {
            for child in children {
                child.arm_timers(ticker);
            }
        }
    }

    /// Stop every countdown below this quest
    fn stop_child_timers(&mut self) {
        if let Goal::Multi { children, .. } = &mut self.goal {
            for child in children {
                if let Some(countdown) = child.countdown.as_mut() {
                    countdown.stop();
                }
                child.stop_child_timers();
            }
        }
    }

    // ========================================================================
    // Propagation
    // ========================================================================

    /// Commit a status change and notify listeners. Returns false when the
    /// lifecycle does not allow it.
    fn transition(&mut self, status: QuestStatus, cascade: bool, changes: &mut Changes) -> bool {
        if !self.status.can_become(status) {
            return false;
        }

        self.status = status;
        if status == QuestStatus::InProgress {
            self.started_at = Some(Utc::now());
        } else {
            self.finished_at = Some(Utc::now());
            if let Some(countdown) = self.countdown.as_mut() {
                countdown.stop();
            }
            // Unfinished children of a finished quest are frozen
            self.stop_child_timers();
        }

        if cascade {
            debug!("Quest '{}' ({}) failed with its parent", self.name, self.id);
        } else {
            info!("Quest '{}' ({}) is now {}", self.name, self.id, status);
        }

        let change = StatusChange::new(self.id, &self.name, status, cascade);
        self.notify(&change);
        changes.push(change);
        true
    }

    fn notify(&mut self, change: &StatusChange) {
        for listener in &mut self.listeners {
            listener(change);
        }
    }

    /// Run `op` on child `index` and absorb what it changed
    fn with_child<F>(&mut self, index: usize, op: F, changes: &mut Changes)
    where
        F: FnOnce(&mut Quest, &mut Changes),
    {
        let mut child_changes = Vec::new();
        match &mut self.goal {
            Goal::Multi { children, .. } => match children.get_mut(index) {
                Some(child) => op(child, &mut child_changes),
                None => return,
            },
            _ => return,
        }
        self.absorb(child_changes, changes);
    }

    /// Re-broadcast changes that bubbled out of a child, resolving on those
    /// that belong to a direct child
    fn absorb(&mut self, child_changes: Changes, changes: &mut Changes) {
        for change in child_changes {
            self.notify(&change);
            let direct = !change.cascade
                && self.children().iter().any(|child| child.id == change.quest_id);
            let status = change.status;
            changes.push(change);

            if direct {
                self.resolve(status, changes);
            }
        }
    }

    /// Resolution step, run whenever a direct child changes status
    fn resolve(&mut self, child_status: QuestStatus, changes: &mut Changes) {
        if self.status.is_terminal() {
            return;
        }

        match child_status {
            QuestStatus::InProgress => return,
            QuestStatus::Failed => {
                debug!("Child of '{}' failed, failing every branch", self.name);
                self.fail_into(false, changes);
                return;
            }
            QuestStatus::Completed => {}
            QuestStatus::NotStarted => return,
        }

        let all_completed = self
            .children()
            .iter()
            .all(|child| child.status == QuestStatus::Completed);
        if all_completed {
            self.complete_into(changes);
            return;
        }

        if self.composition() == Some(Composition::Sequential) {
            let count = self.children().len();
            for index in 0..count.saturating_sub(1) {
                let children = self.children();
                let advance = children[index].status == QuestStatus::Completed
                    && children[index + 1].status == QuestStatus::NotStarted;
                if advance {
                    self.with_child(
                        index + 1,
                        |next, next_changes| next.start_into(next_changes),
                        changes,
                    );
                }
            }
        }
    }
}
