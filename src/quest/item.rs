use serde::{Deserialize, Serialize};

/// An item identity with a quantity, used for rewards and fetch targets.
///
/// Fetch matching only looks at the id; the quantity is carried for whoever
/// grants rewards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestItem {
    id: String,
    quantity: u32,
}

impl QuestItem {
    pub fn new(id: &str, quantity: u32) -> Self {
        Self {
            id: id.to_string(),
            quantity,
        }
    }

    /// A single unit of `id`
    pub fn single(id: &str) -> Self {
        Self::new(id, 1)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Same item for fetch purposes
    pub fn matches(&self, other: &QuestItem) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_by_id_only() {
        let one = QuestItem::single("apple");
        let crate_of = QuestItem::new("apple", 12);
        assert!(one.matches(&crate_of));
        assert_ne!(one, crate_of);
        assert!(!one.matches(&QuestItem::single("pear")));
    }
}
