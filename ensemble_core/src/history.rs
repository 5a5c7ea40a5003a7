//! Interaction history - a bounded, append-only log of committed turns.

use cast_rules::{CharacterId, InteractionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One committed response-selection event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub timestamp: DateTime<Utc>,
    pub responding: CharacterId,
    /// `None` means the user (or everyone).
    pub target: Option<CharacterId>,
    pub interaction_type: InteractionType,
    pub turn_index: u64,
}

impl TurnRecord {
    /// Whether `id` took part in this turn, as speaker or as target.
    pub fn involves(&self, id: CharacterId) -> bool {
        self.responding == id || self.target == Some(id)
    }
}

/// Bounded log of past turns, oldest evicted first.
#[derive(Debug, Clone)]
pub struct InteractionHistory {
    records: VecDeque<TurnRecord>,
    capacity: usize,
    next_index: u64,
}

impl InteractionHistory {
    /// Create a history holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            next_index: 0,
        }
    }

    /// Append a turn and return the stored record.
    pub fn record(
        &mut self,
        responding: CharacterId,
        target: Option<CharacterId>,
        interaction_type: InteractionType,
    ) -> TurnRecord {
        let record = TurnRecord {
            timestamp: Utc::now(),
            responding,
            target,
            interaction_type,
            turn_index: self.next_index,
        };
        self.next_index += 1;

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record.clone());
        record
    }

    /// The most recent `count` records, newest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &TurnRecord> {
        self.records.iter().rev().take(count)
    }

    /// How many of the last `window` records `id` took part in.
    pub fn involvement_in_last(&self, id: CharacterId, window: usize) -> usize {
        self.recent(window).filter(|r| r.involves(id)).count()
    }

    /// How many of the last `window` records `id` responded in.
    pub fn responses_in_last(&self, id: CharacterId, window: usize) -> usize {
        self.recent(window).filter(|r| r.responding == id).count()
    }

    /// The character who took the latest turn.
    pub fn last_responder(&self) -> Option<CharacterId> {
        self.records.back().map(|r| r.responding)
    }

    /// Iterate over records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TurnRecord> {
        self.records.iter()
    }

    /// Copy of all records, oldest first.
    pub fn snapshot(&self) -> Vec<TurnRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every record. Turn indices keep counting up.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for InteractionHistory {
    fn default() -> Self {
        Self::new(20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_assigns_monotonic_indices() {
        let mut history = InteractionHistory::default();
        let a = CharacterId::new();

        let first = history.record(a, None, InteractionType::UserResponse);
        let second = history.record(a, None, InteractionType::UserResponse);

        assert_eq!(first.turn_index, 0);
        assert_eq!(second.turn_index, 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = InteractionHistory::new(20);
        let a = CharacterId::new();
        for _ in 0..25 {
            history.record(a, None, InteractionType::UserResponse);
        }

        assert_eq!(history.len(), 20);
        assert_eq!(history.iter().next().map(|r| r.turn_index), Some(5));
        assert_eq!(history.recent(1).next().map(|r| r.turn_index), Some(24));
    }

    #[test]
    fn test_involvement_counts_targets() {
        let mut history = InteractionHistory::default();
        let a = CharacterId::new();
        let b = CharacterId::new();

        history.record(a, None, InteractionType::UserResponse);
        history.record(b, Some(a), InteractionType::Disagreement);
        history.record(b, None, InteractionType::UserResponse);

        assert_eq!(history.involvement_in_last(a, 5), 2);
        assert_eq!(history.responses_in_last(a, 5), 1);
        assert_eq!(history.responses_in_last(b, 2), 2);
        assert_eq!(history.involvement_in_last(a, 1), 0);
        assert_eq!(history.last_responder(), Some(b));
    }

    #[test]
    fn test_clear_keeps_counting() {
        let mut history = InteractionHistory::default();
        let a = CharacterId::new();
        history.record(a, None, InteractionType::UserResponse);
        history.clear();

        assert!(history.is_empty());
        let next = history.record(a, None, InteractionType::UserResponse);
        assert_eq!(next.turn_index, 1);
    }
}
