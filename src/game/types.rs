use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::StarterStats;

/// Persistent per-player state. One record per stable user identity.
///
/// Records are created implicitly with starter defaults the first time an
/// identity is referenced; no operation ever observes a missing record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub level: u32,
    pub experience: u64,
    /// Threshold for the next level-up; recomputed whenever the level changes.
    pub experience_to_next: u64,
    pub health: u32,
    pub max_health: u32,
    pub attack: u32,
    pub defense: u32,
    pub gold: u64,
    /// Dedicated consumable counters; everything else lives in `inventory`.
    #[serde(default)]
    pub potions: u32,
    #[serde(default)]
    pub bait: u32,
    /// Item id -> quantity. Quantities are always positive; entries reaching
    /// zero are removed.
    #[serde(default)]
    pub inventory: HashMap<String, u32>,
    #[serde(default)]
    pub total_hunts: u64,
    #[serde(default)]
    pub total_fishes: u64,
    #[serde(default)]
    pub total_battles: u64,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl UserRecord {
    /// A fresh level-1 record with the configured starter stats.
    pub fn starter(stats: &StarterStats, now: DateTime<Utc>) -> Self {
        Self {
            level: 1,
            experience: 0,
            experience_to_next: crate::game::engine::xp_to_next(1),
            health: stats.max_health,
            max_health: stats.max_health,
            attack: stats.attack,
            defense: stats.defense,
            gold: stats.gold,
            potions: 0,
            bait: 0,
            inventory: HashMap::new(),
            total_hunts: 0,
            total_fishes: 0,
            total_battles: 0,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Quantity held of `item_id`, whichever bucket it lives in.
    pub fn held(&self, item_id: &str) -> u32 {
        match item_id {
            "potion" => self.potions,
            "bait" => self.bait,
            _ => self.inventory.get(item_id).copied().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starter_stats() -> StarterStats {
        StarterStats {
            max_health: 100,
            attack: 10,
            defense: 5,
            gold: 100,
        }
    }

    #[test]
    fn starter_record_matches_config() {
        let user = UserRecord::starter(&starter_stats(), Utc::now());
        assert_eq!(user.level, 1);
        assert_eq!(user.experience, 0);
        assert_eq!(user.health, 100);
        assert_eq!(user.max_health, 100);
        assert_eq!(user.gold, 100);
        assert_eq!(user.experience_to_next, 100);
        assert!(user.inventory.is_empty());
    }

    #[test]
    fn held_reads_dedicated_counters_and_inventory() {
        let mut user = UserRecord::starter(&starter_stats(), Utc::now());
        user.potions = 3;
        user.bait = 2;
        user.inventory.insert("iron_sword".to_string(), 1);
        assert_eq!(user.held("potion"), 3);
        assert_eq!(user.held("bait"), 2);
        assert_eq!(user.held("iron_sword"), 1);
        assert_eq!(user.held("beef"), 0);
    }
}
