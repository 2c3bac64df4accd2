use indexmap::IndexSet;

use super::QuestionId;

/// Insertion-ordered set of recently asked question ids with FIFO eviction.
#[derive(Debug, Clone, Default)]
pub struct RecentlyAsked {
    ids: IndexSet<QuestionId>,
    capacity: usize,
}

impl RecentlyAsked {
    /// Create an empty set holding at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: IndexSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Size the set as `threshold_percent` of a bank holding `bank_len` questions.
    pub fn for_bank(bank_len: usize, threshold_percent: u8) -> Self {
        let percent = usize::from(threshold_percent.min(100));
        Self::new(bank_len * percent / 100)
    }

    /// Maximum number of ids retained after eviction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of ids currently held.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no id is held.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` was asked recently.
    pub fn contains(&self, id: QuestionId) -> bool {
        self.ids.contains(&id)
    }

    /// Ids from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.ids.iter().copied()
    }

    /// Mark `id` as the newest entry, evicting the oldest ones beyond capacity.
    pub fn record(&mut self, id: QuestionId) {
        self.ids.shift_remove(&id);
        self.ids.insert(id);
        while self.ids.len() > self.capacity {
            self.ids.shift_remove_index(0);
        }
    }

    /// Drop the oldest half of the set (rounded up), returning how many ids were evicted.
    pub fn evict_oldest_half(&mut self) -> usize {
        let count = self.ids.len().div_ceil(2);
        self.ids.drain(..count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_a_share_of_the_bank() {
        assert_eq!(RecentlyAsked::for_bank(3, 80).capacity(), 2);
        assert_eq!(RecentlyAsked::for_bank(50, 20).capacity(), 10);
        assert_eq!(RecentlyAsked::for_bank(4, 0).capacity(), 0);
        assert_eq!(RecentlyAsked::for_bank(4, 250).capacity(), 4);
    }

    #[test]
    fn recording_past_capacity_evicts_oldest_first() {
        let mut recent = RecentlyAsked::new(3);
        for id in 1..=10 {
            recent.record(id);
            assert!(recent.len() <= recent.capacity());
        }

        assert_eq!(recent.iter().collect::<Vec<_>>(), [8, 9, 10]);
    }

    #[test]
    fn re_recording_moves_id_to_newest() {
        let mut recent = RecentlyAsked::new(3);
        recent.record(1);
        recent.record(2);
        recent.record(1);
        recent.record(3);
        recent.record(4);

        assert_eq!(recent.iter().collect::<Vec<_>>(), [3, 1, 4]);
    }

    #[test]
    fn evicting_half_always_makes_progress() {
        let mut recent = RecentlyAsked::new(5);
        recent.record(7);
        assert_eq!(recent.evict_oldest_half(), 1);
        assert!(recent.is_empty());

        for id in 1..=5 {
            recent.record(id);
        }
        assert_eq!(recent.evict_oldest_half(), 3);
        assert_eq!(recent.iter().collect::<Vec<_>>(), [4, 5]);
    }
}
