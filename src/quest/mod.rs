//! Quest System Module
//!
//! Destination, fetch and multi quests arranged in trees. Status changes
//! bubble from children to parents through per-node listeners; the manager
//! re-broadcasts them and routes location samples, fetched items and timer
//! ticks into the trees it owns.

pub mod bounds;
pub mod error;
pub mod events;
pub mod goal;
pub mod item;
pub mod manager;
pub mod node;
pub mod session;
pub mod state;
pub mod timer;

pub use bounds::Bounds;
pub use error::QuestError;
pub use events::QuestEvent;
pub use goal::Goal;
pub use item::QuestItem;
pub use manager::QuestManager;
pub use node::{Quest, QuestId};
pub use session::{LocationSource, QuestSession, SessionCommand, SessionHandle};
pub use state::{Composition, QuestKind, QuestStatus, StatusChange};
pub use timer::{Countdown, Ticker, TimerHandle};
