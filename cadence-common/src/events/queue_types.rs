//! Queue change type definitions

use serde::{Deserialize, Serialize};

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    Replaced,
    Appended,
    InsertedNext,
    Removed,
    Moved,
    Shuffled,
    Unshuffled,
    Cleared,
    RatingUpdated,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::Replaced => write!(f, "Replaced"),
            QueueChangeTrigger::Appended => write!(f, "Appended"),
            QueueChangeTrigger::InsertedNext => write!(f, "InsertedNext"),
            QueueChangeTrigger::Removed => write!(f, "Removed"),
            QueueChangeTrigger::Moved => write!(f, "Moved"),
            QueueChangeTrigger::Shuffled => write!(f, "Shuffled"),
            QueueChangeTrigger::Unshuffled => write!(f, "Unshuffled"),
            QueueChangeTrigger::Cleared => write!(f, "Cleared"),
            QueueChangeTrigger::RatingUpdated => write!(f, "RatingUpdated"),
        }
    }
}
