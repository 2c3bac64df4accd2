//! Per-channel player bookkeeping keyed by chat identity.

use indexmap::IndexMap;
use tracing::warn;

/// Live state of one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Display form of the current identity.
    pub identity: String,
    /// Points earned in the running game.
    pub session_score: u32,
    /// Cumulative points, seeded from the score store.
    pub all_time_score: u32,
    /// Whether the player currently counts towards the player quorum.
    pub active: bool,
}

impl Player {
    fn new(identity: &str) -> Self {
        Self {
            identity: identity.trim().to_owned(),
            session_score: 0,
            all_time_score: 0,
            active: true,
        }
    }
}

/// Registry mapping identities (matched case-insensitively) to players.
#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    players: IndexMap<String, Player>,
    keep_score: bool,
}

fn key(identity: &str) -> String {
    identity.trim().to_lowercase()
}

impl PlayerRegistry {
    /// Create an empty registry; `keep_score` decides what identity changes do with scores.
    pub fn new(keep_score: bool) -> Self {
        Self {
            players: IndexMap::new(),
            keep_score,
        }
    }

    /// Existing player for `identity`, or a fresh active one.
    pub fn resolve(&mut self, identity: &str) -> &mut Player {
        self.players
            .entry(key(identity))
            .or_insert_with(|| Player::new(identity))
    }

    /// Player registered under `identity`, if any.
    pub fn get(&self, identity: &str) -> Option<&Player> {
        self.players.get(&key(identity))
    }

    /// Register `identity` as present in the channel.
    pub fn join(&mut self, identity: &str) -> &mut Player {
        let player = self.resolve(identity);
        player.identity = identity.trim().to_owned();
        player.active = true;
        player
    }

    /// Mark `identity` as gone, keeping its record. Returns whether it was active.
    pub fn leave(&mut self, identity: &str) -> bool {
        match self.players.get_mut(&key(identity)) {
            Some(player) => std::mem::replace(&mut player.active, false),
            None => false,
        }
    }

    /// Move `old` to `new`.
    ///
    /// With `keep_score` the record is re-keyed with its scores intact, merging
    /// into any record `new` already had by keeping the higher scores.
    /// Otherwise `old` is kept as an inactive record and `new` starts fresh
    /// (or resumes its own earlier record).
    pub fn on_identity_change(&mut self, old: &str, new: &str) -> &mut Player {
        let old_key = key(old);
        let new_key = key(new);

        if old_key == new_key {
            return self.join(new);
        }

        if self.keep_score {
            let Some(mut player) = self.players.shift_remove(&old_key) else {
                return self.join(new);
            };
            if let Some(existing) = self.players.get(&new_key) {
                warn!(
                    old,
                    new,
                    existing_score = existing.all_time_score,
                    "identity change merges into an existing record; keeping the higher scores"
                );
                player.session_score = player.session_score.max(existing.session_score);
                player.all_time_score = player.all_time_score.max(existing.all_time_score);
            }
            player.identity = new.trim().to_owned();
            player.active = true;
            self.players.insert(new_key, player);
            self.resolve(new)
        } else {
            if let Some(previous) = self.players.get_mut(&old_key) {
                previous.active = false;
            }
            self.join(new)
        }
    }

    /// Add `points` to both scores of `identity`.
    pub fn award(&mut self, identity: &str, points: u32) -> &Player {
        let player = self.resolve(identity);
        player.session_score = player.session_score.saturating_add(points);
        player.all_time_score = player.all_time_score.saturating_add(points);
        player
    }

    /// Raise the all-time score of `identity` to at least `stored`.
    pub fn seed_all_time(&mut self, identity: &str, stored: u32) {
        if let Some(player) = self.players.get_mut(&key(identity)) {
            player.all_time_score = player.all_time_score.max(stored);
        }
    }

    /// Number of players counting towards the quorum.
    pub fn active_count(&self) -> usize {
        self.players.values().filter(|p| p.active).count()
    }

    /// Players with a positive session score, best first (join order breaks ties).
    pub fn standings(&self, n: usize) -> Vec<&Player> {
        let mut ranked: Vec<&Player> = self
            .players
            .values()
            .filter(|p| p.session_score > 0)
            .collect();
        ranked.sort_by(|a, b| b.session_score.cmp(&a.session_score));
        ranked.truncate(n);
        ranked
    }

    /// Zero every session score at the end of a game.
    pub fn reset_session_scores(&mut self) {
        for player in self.players.values_mut() {
            player.session_score = 0;
        }
    }

    /// All known players in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }
}
