//! Read-only text renderings of game state. Pure formatting over the same
//! fields the engine mutates; nothing here changes a record.

use std::collections::HashMap;

use crate::game::catalog::ItemCatalog;
use crate::game::types::UserRecord;

pub fn profile_text(user: &UserRecord, display_name: &str) -> String {
    format!(
        "Profile {name}\nLevel: {lvl}\nExp: {exp}/{next}\nHP: {hp}/{max}\nGold: {gold}\nBait: {bait}\nPotions: {potions}",
        name = display_name,
        lvl = user.level,
        exp = user.experience,
        next = user.experience_to_next,
        hp = user.health,
        max = user.max_health,
        gold = user.gold,
        bait = user.bait,
        potions = user.potions,
    )
}

pub fn stats_text(user: &UserRecord) -> String {
    format!(
        "Stats:\nAttack: {}\nDefense: {}\nMax HP: {}\nHunts: {}  Fishes: {}  Battles: {}",
        user.attack,
        user.defense,
        user.max_health,
        user.total_hunts,
        user.total_fishes,
        user.total_battles,
    )
}

pub fn inventory_text(user: &UserRecord, catalog: &ItemCatalog) -> String {
    let mut lines = vec!["Inventory:".to_string()];
    if user.inventory.is_empty() {
        lines.push("- (empty)".to_string());
    } else {
        let mut entries: Vec<_> = user.inventory.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (id, qty) in entries {
            let name = catalog.get(id).map(|d| d.name.as_str()).unwrap_or(id);
            lines.push(format!("- {} x{}", name, qty));
        }
    }
    lines.push(format!("Potions: {}", user.potions));
    lines.push(format!("Bait: {}", user.bait));
    lines.join("\n")
}

pub fn shop_text(catalog: &ItemCatalog) -> String {
    let mut lines = vec!["Shop:".to_string()];
    for def in catalog.all() {
        lines.push(format!("- [{}] {}: {} gold", def.id, def.name, def.price));
    }
    lines.push(String::new());
    lines.push("Use: buy <item> [qty]".to_string());
    lines.join("\n")
}

/// Ranking dimension for the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardKind {
    Level,
    Gold,
    Hunts,
    Fishes,
    Battles,
}

impl LeaderboardKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "level" => Some(Self::Level),
            "gold" => Some(Self::Gold),
            "hunt" | "hunts" => Some(Self::Hunts),
            "fish" | "fishes" => Some(Self::Fishes),
            "battle" | "battles" => Some(Self::Battles),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub level: u32,
    pub gold: u64,
    pub score: u64,
}

/// Rank all users by the requested dimension. Ties on level fall back to
/// experience.
pub fn leaderboard(
    users: &HashMap<String, UserRecord>,
    kind: LeaderboardKind,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(&String, &UserRecord)> = users.iter().collect();
    rows.sort_by(|(_, a), (_, b)| match kind {
        LeaderboardKind::Level => b
            .level
            .cmp(&a.level)
            .then(b.experience.cmp(&a.experience)),
        LeaderboardKind::Gold => b.gold.cmp(&a.gold),
        LeaderboardKind::Hunts => b.total_hunts.cmp(&a.total_hunts),
        LeaderboardKind::Fishes => b.total_fishes.cmp(&a.total_fishes),
        LeaderboardKind::Battles => b.total_battles.cmp(&a.total_battles),
    });
    rows.into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (id, u))| LeaderboardEntry {
            rank: i + 1,
            user_id: id.clone(),
            level: u.level,
            gold: u.gold,
            score: match kind {
                LeaderboardKind::Level => u64::from(u.level),
                LeaderboardKind::Gold => u.gold,
                LeaderboardKind::Hunts => u.total_hunts,
                LeaderboardKind::Fishes => u.total_fishes,
                LeaderboardKind::Battles => u.total_battles,
            },
        })
        .collect()
}

pub fn leaderboard_text(entries: &[LeaderboardEntry], kind: LeaderboardKind) -> String {
    let title = match kind {
        LeaderboardKind::Level => "Leaderboard (level):",
        LeaderboardKind::Gold => "Leaderboard (gold):",
        LeaderboardKind::Hunts => "Leaderboard (hunts):",
        LeaderboardKind::Fishes => "Leaderboard (fishes):",
        LeaderboardKind::Battles => "Leaderboard (battles):",
    };
    let mut lines = vec![title.to_string()];
    if entries.is_empty() {
        lines.push("- (no players yet)".to_string());
    }
    for e in entries {
        lines.push(format!(
            "{}. {} - lvl {} ({} gold)",
            e.rank, e.user_id, e.level, e.gold
        ));
    }
    lines.join("\n")
}
