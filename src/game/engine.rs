//! Pure game-state operations over a [`UserRecord`].
//!
//! Every function here mutates only the record passed in (plus read-only
//! catalog/config lookups) and declines without mutation on any rule failure,
//! so callers can persist the record exactly once per command.

use rand::Rng;

use crate::config::{GrowthConfig, RewardRange};
use crate::game::catalog::ItemCatalog;
use crate::game::errors::GameError;
use crate::game::types::UserRecord;

/// Experience required to advance from `level` to the next one.
///
/// Monotonic in `level`: floor(100 * level^1.5).
pub fn xp_to_next(level: u32) -> u64 {
    (100.0 * f64::from(level).powf(1.5)).floor() as u64
}

/// Outcome of an experience grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpReport {
    pub leveled: bool,
    pub new_level: u32,
    pub levels_gained: u32,
}

/// Add experience and resolve any level-ups it causes.
///
/// Loops because a single large grant may cross multiple level boundaries.
/// Each level applies the configured stat growth and heals the gained health
/// capacity, never exceeding the new maximum.
pub fn grant_experience(
    user: &mut UserRecord,
    amount: u64,
    growth: &GrowthConfig,
) -> LevelUpReport {
    user.experience = user.experience.saturating_add(amount);
    let mut levels_gained = 0u32;
    while user.experience >= user.experience_to_next {
        user.experience -= user.experience_to_next;
        user.level += 1;
        user.max_health = user.max_health.saturating_add(growth.health_per_level);
        user.attack = user.attack.saturating_add(growth.attack_per_level);
        user.defense = user.defense.saturating_add(growth.defense_per_level);
        user.health = user
            .health
            .saturating_add(growth.health_per_level)
            .min(user.max_health);
        user.experience_to_next = xp_to_next(user.level);
        levels_gained += 1;
    }
    LevelUpReport {
        leveled: levels_gained > 0,
        new_level: user.level,
        levels_gained,
    }
}

pub fn add_gold(user: &mut UserRecord, amount: u64) {
    user.gold = user.gold.saturating_add(amount);
}

/// Debit gold, declining without mutation when the balance is insufficient.
pub fn spend_gold(user: &mut UserRecord, amount: u64) -> Result<(), GameError> {
    if user.gold < amount {
        return Err(GameError::InsufficientFunds { required: amount });
    }
    user.gold -= amount;
    Ok(())
}

/// Credit `qty` of an item. Potions and bait use their dedicated counters;
/// everything else goes through the inventory map with the catalog's stack
/// limit enforced.
pub fn add_item(
    user: &mut UserRecord,
    catalog: &ItemCatalog,
    item_id: &str,
    qty: u32,
) -> Result<(), GameError> {
    let def = catalog
        .get(item_id)
        .ok_or_else(|| GameError::UnknownItem(item_id.to_string()))?;
    let held = user.held(item_id);
    if let Some(limit) = def.stack_limit {
        if held.saturating_add(qty) > limit {
            return Err(GameError::StackLimit {
                item: item_id.to_string(),
                limit,
            });
        }
    } else if held.saturating_add(qty) > 1 {
        // Non-stackable items cap at a single copy.
        return Err(GameError::StackLimit {
            item: item_id.to_string(),
            limit: 1,
        });
    }
    match item_id {
        "potion" => user.potions += qty,
        "bait" => user.bait += qty,
        _ => {
            *user.inventory.entry(item_id.to_string()).or_insert(0) += qty;
        }
    }
    Ok(())
}

/// Remove `qty` of an item, declining without mutation when fewer are held.
/// Inventory entries reaching zero are deleted.
pub fn remove_item(user: &mut UserRecord, item_id: &str, qty: u32) -> Result<(), GameError> {
    let held = user.held(item_id);
    if held < qty {
        return Err(GameError::InsufficientItems {
            item: item_id.to_string(),
            held,
            requested: qty,
        });
    }
    match item_id {
        "potion" => user.potions -= qty,
        "bait" => user.bait -= qty,
        _ => {
            let remaining = held - qty;
            if remaining == 0 {
                user.inventory.remove(item_id);
            } else {
                user.inventory.insert(item_id.to_string(), remaining);
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotionUse {
    pub healed: u32,
    pub health: u32,
    pub max_health: u32,
}

/// Consume one potion and heal by the catalog amount, clamped to max health.
pub fn use_potion(user: &mut UserRecord, catalog: &ItemCatalog) -> Result<PotionUse, GameError> {
    if user.potions == 0 {
        return Err(GameError::NoPotionAvailable);
    }
    let heal = catalog.potion_heal();
    user.potions -= 1;
    let before = user.health;
    user.health = user.health.saturating_add(heal).min(user.max_health);
    Ok(PotionUse {
        healed: user.health - before,
        health: user.health,
        max_health: user.max_health,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub item: String,
    pub quantity: u32,
    pub spent: u64,
    pub gold_remaining: u64,
}

/// Buy `qty` of an item: debit gold and credit the item atomically; on any
/// decline neither side changes.
pub fn buy_item(
    user: &mut UserRecord,
    catalog: &ItemCatalog,
    item_id: &str,
    qty: u32,
) -> Result<Purchase, GameError> {
    let def = catalog
        .get(item_id)
        .ok_or_else(|| GameError::UnknownItem(item_id.to_string()))?;
    let total = def.price.saturating_mul(u64::from(qty));
    if user.gold < total {
        return Err(GameError::InsufficientFunds { required: total });
    }
    // Pre-check the stack limit so the debit cannot land without the credit.
    let held = user.held(item_id);
    let limit = def.stack_limit.unwrap_or(1);
    if held.saturating_add(qty) > limit {
        return Err(GameError::StackLimit {
            item: item_id.to_string(),
            limit,
        });
    }
    user.gold -= total;
    add_item(user, catalog, item_id, qty)?;
    Ok(Purchase {
        item: item_id.to_string(),
        quantity: qty,
        spent: total,
        gold_remaining: user.gold,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    pub item: String,
    pub quantity: u32,
    pub earned: u64,
    pub gold_total: u64,
}

/// Sell `qty` of a held item back at the catalog sell price.
pub fn sell_item(
    user: &mut UserRecord,
    catalog: &ItemCatalog,
    item_id: &str,
    qty: u32,
) -> Result<Sale, GameError> {
    let def = catalog
        .get(item_id)
        .ok_or_else(|| GameError::UnknownItem(item_id.to_string()))?;
    remove_item(user, item_id, qty)?;
    let earned = def.sell_price.saturating_mul(u64::from(qty));
    user.gold = user.gold.saturating_add(earned);
    Ok(Sale {
        item: item_id.to_string(),
        quantity: qty,
        earned,
        gold_total: user.gold,
    })
}

/// Rewards from a hunt/fish excursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Haul {
    pub exp: u64,
    pub gold: u64,
    pub report: LevelUpReport,
}

fn roll(min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

/// Go hunting: roll exp/gold in the configured range.
pub fn hunt(user: &mut UserRecord, range: &RewardRange, growth: &GrowthConfig) -> Haul {
    let exp = roll(range.min_exp, range.max_exp);
    let gold = roll(range.min_gold, range.max_gold);
    add_gold(user, gold);
    user.total_hunts += 1;
    let report = grant_experience(user, exp, growth);
    Haul { exp, gold, report }
}

/// Go fishing: consumes one bait, declining when none is held.
pub fn fish(
    user: &mut UserRecord,
    range: &RewardRange,
    growth: &GrowthConfig,
) -> Result<Haul, GameError> {
    if user.bait == 0 {
        return Err(GameError::InsufficientItems {
            item: "bait".to_string(),
            held: 0,
            requested: 1,
        });
    }
    user.bait -= 1;
    let exp = roll(range.min_exp, range.max_exp);
    let gold = roll(range.min_gold, range.max_gold);
    add_gold(user, gold);
    user.total_fishes += 1;
    let report = grant_experience(user, exp, growth);
    Ok(Haul { exp, gold, report })
}

/// A fightable enemy. Rewards are fixed per enemy tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enemy {
    pub id: &'static str,
    pub name: &'static str,
    pub level: u32,
    pub health: u32,
    pub attack: u32,
    pub defense: u32,
    pub exp_reward: u64,
    pub gold_reward: u64,
}

pub const ENEMIES: [Enemy; 4] = [
    Enemy {
        id: "slime",
        name: "Slime",
        level: 1,
        health: 20,
        attack: 3,
        defense: 1,
        exp_reward: 5,
        gold_reward: 10,
    },
    Enemy {
        id: "goblin",
        name: "Goblin",
        level: 5,
        health: 40,
        attack: 8,
        defense: 3,
        exp_reward: 20,
        gold_reward: 50,
    },
    Enemy {
        id: "orc",
        name: "Orc",
        level: 10,
        health: 80,
        attack: 15,
        defense: 8,
        exp_reward: 50,
        gold_reward: 150,
    },
    Enemy {
        id: "dragon",
        name: "Dragon",
        level: 25,
        health: 300,
        attack: 50,
        defense: 30,
        exp_reward: 500,
        gold_reward: 1500,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleOutcome {
    pub enemy: Enemy,
    pub damage_taken: u32,
    pub exp: u64,
    pub gold: u64,
    pub report: LevelUpReport,
}

/// Fight a random enemy. The player takes `max(1, enemy attack − defense)`
/// damage but is never reduced below 1 health, and collects the enemy's fixed
/// rewards.
pub fn battle(user: &mut UserRecord, growth: &GrowthConfig) -> BattleOutcome {
    let enemy = ENEMIES[rand::thread_rng().gen_range(0..ENEMIES.len())];
    battle_enemy(user, enemy, growth)
}

/// Deterministic battle resolution against a chosen enemy.
pub fn battle_enemy(user: &mut UserRecord, enemy: Enemy, growth: &GrowthConfig) -> BattleOutcome {
    let damage = enemy.attack.saturating_sub(user.defense).max(1);
    user.health = user.health.saturating_sub(damage).max(1);
    add_gold(user, enemy.gold_reward);
    user.total_battles += 1;
    let report = grant_experience(user, enemy.exp_reward, growth);
    BattleOutcome {
        enemy,
        damage_taken: damage,
        exp: enemy.exp_reward,
        gold: enemy.gold_reward,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StarterStats;
    use chrono::Utc;

    fn growth() -> GrowthConfig {
        GrowthConfig {
            health_per_level: 10,
            attack_per_level: 2,
            defense_per_level: 1,
        }
    }

    fn user() -> UserRecord {
        UserRecord::starter(
            &StarterStats {
                max_health: 100,
                attack: 10,
                defense: 5,
                gold: 100,
            },
            Utc::now(),
        )
    }

    #[test]
    fn xp_formula_spot_values() {
        assert_eq!(xp_to_next(1), 100);
        assert_eq!(xp_to_next(2), 282); // floor(100 * 2^1.5)
        assert_eq!(xp_to_next(4), 800);
        assert!(xp_to_next(10) > xp_to_next(9));
    }

    #[test]
    fn exact_threshold_grants_exactly_one_level() {
        let mut u = user();
        let report = grant_experience(&mut u, 100, &growth());
        assert!(report.leveled);
        assert_eq!(report.new_level, 2);
        assert_eq!(report.levels_gained, 1);
        assert_eq!(u.experience, 0);
        assert_eq!(u.experience_to_next, 282);
        assert_eq!(u.max_health, 110);
        assert_eq!(u.attack, 12);
        assert_eq!(u.defense, 6);
    }

    #[test]
    fn grant_250_at_level_1_crosses_one_boundary() {
        // 250 >= xp(1)=100 but the remaining 150 < xp(2)=282: one level only.
        let mut u = user();
        let report = grant_experience(&mut u, 250, &growth());
        assert_eq!(report.new_level, 2);
        assert_eq!(report.levels_gained, 1);
        assert_eq!(u.experience, 150);
    }

    #[test]
    fn large_grant_crosses_multiple_boundaries() {
        // 100 + 282 = 382 <= 400, so two levels with 18 left over.
        let mut u = user();
        let report = grant_experience(&mut u, 400, &growth());
        assert_eq!(report.new_level, 3);
        assert_eq!(report.levels_gained, 2);
        assert_eq!(u.experience, 18);
        assert_eq!(u.max_health, 120);
    }

    #[test]
    fn level_up_heals_capacity_delta_without_exceeding_max() {
        let mut u = user();
        u.health = 40;
        grant_experience(&mut u, 100, &growth());
        assert_eq!(u.health, 50); // +10 capacity gained, +10 healed
        assert_eq!(u.max_health, 110);

        let mut full = user();
        grant_experience(&mut full, 100, &growth());
        assert_eq!(full.health, full.max_health);
    }

    #[test]
    fn spend_never_underflows() {
        let mut u = user();
        let err = spend_gold(&mut u, 101).unwrap_err();
        assert!(matches!(err, GameError::InsufficientFunds { required: 101 }));
        assert_eq!(u.gold, 100);
        spend_gold(&mut u, 100).expect("exact spend");
        assert_eq!(u.gold, 0);
        assert!(spend_gold(&mut u, 1).is_err());
        assert_eq!(u.gold, 0);
    }

    #[test]
    fn buy_is_atomic_on_insufficient_funds() {
        let catalog = ItemCatalog::default_catalog();
        let mut u = user();
        u.gold = 40;
        let before = u.clone();
        let err = buy_item(&mut u, &catalog, "potion", 1).unwrap_err();
        assert!(matches!(err, GameError::InsufficientFunds { required: 50 }));
        assert_eq!(u, before);
    }

    #[test]
    fn buy_debits_and_credits_together() {
        let catalog = ItemCatalog::default_catalog();
        let mut u = user();
        u.gold = 200;
        let purchase = buy_item(&mut u, &catalog, "potion", 3).expect("buy");
        assert_eq!(purchase.spent, 150);
        assert_eq!(purchase.gold_remaining, 50);
        assert_eq!(u.potions, 3);
        assert_eq!(u.gold, 50);
    }

    #[test]
    fn buy_declines_on_stack_limit_without_debit() {
        let catalog = ItemCatalog::default_catalog();
        let mut u = user();
        u.gold = 1000;
        buy_item(&mut u, &catalog, "iron_sword", 1).expect("first sword");
        let before = u.clone();
        let err = buy_item(&mut u, &catalog, "iron_sword", 1).unwrap_err();
        assert!(matches!(err, GameError::StackLimit { limit: 1, .. }));
        assert_eq!(u, before);
    }

    #[test]
    fn unknown_item_is_reported() {
        let catalog = ItemCatalog::default_catalog();
        let mut u = user();
        assert!(matches!(
            buy_item(&mut u, &catalog, "excalibur", 1),
            Err(GameError::UnknownItem(_))
        ));
    }

    #[test]
    fn remove_more_than_held_declines_without_mutation() {
        let catalog = ItemCatalog::default_catalog();
        let mut u = user();
        add_item(&mut u, &catalog, "beef", 2).expect("add");
        let err = remove_item(&mut u, "beef", 3).unwrap_err();
        assert!(matches!(
            err,
            GameError::InsufficientItems {
                held: 2,
                requested: 3,
                ..
            }
        ));
        assert_eq!(u.held("beef"), 2);
    }

    #[test]
    fn inventory_entry_reaching_zero_is_deleted() {
        let catalog = ItemCatalog::default_catalog();
        let mut u = user();
        add_item(&mut u, &catalog, "beef", 2).expect("add");
        remove_item(&mut u, "beef", 2).expect("remove");
        assert!(!u.inventory.contains_key("beef"));
    }

    #[test]
    fn potion_use_at_zero_declines_and_health_unchanged() {
        let catalog = ItemCatalog::default_catalog();
        let mut u = user();
        u.health = 30;
        let err = use_potion(&mut u, &catalog).unwrap_err();
        assert!(matches!(err, GameError::NoPotionAvailable));
        assert_eq!(u.health, 30);
    }

    #[test]
    fn potion_heals_clamped_to_max() {
        let catalog = ItemCatalog::default_catalog();
        let mut u = user();
        u.potions = 2;
        u.health = 80;
        let result = use_potion(&mut u, &catalog).expect("use");
        assert_eq!(result.healed, 20);
        assert_eq!(result.health, 100);
        assert_eq!(u.potions, 1);
    }

    #[test]
    fn sell_credits_sell_price() {
        let catalog = ItemCatalog::default_catalog();
        let mut u = user();
        add_item(&mut u, &catalog, "rare_fish", 2).expect("add");
        let sale = sell_item(&mut u, &catalog, "rare_fish", 2).expect("sell");
        assert_eq!(sale.earned, 100); // sell price 50 each
        assert_eq!(u.gold, 200);
        assert!(!u.inventory.contains_key("rare_fish"));
    }

    #[test]
    fn hunt_rewards_stay_in_range_and_count() {
        let range = RewardRange {
            min_exp: 8,
            max_exp: 20,
            min_gold: 20,
            max_gold: 80,
        };
        let mut u = user();
        let haul = hunt(&mut u, &range, &growth());
        assert!((8..=20).contains(&haul.exp));
        assert!((20..=80).contains(&haul.gold));
        assert_eq!(u.total_hunts, 1);
        assert_eq!(u.gold, 100 + haul.gold);
    }

    #[test]
    fn fish_requires_bait() {
        let range = RewardRange {
            min_exp: 5,
            max_exp: 15,
            min_gold: 10,
            max_gold: 60,
        };
        let mut u = user();
        assert!(fish(&mut u, &range, &growth()).is_err());
        u.bait = 1;
        let haul = fish(&mut u, &range, &growth()).expect("fish");
        assert_eq!(u.bait, 0);
        assert_eq!(u.total_fishes, 1);
        assert!((5..=15).contains(&haul.exp));
    }

    #[test]
    fn battle_never_drops_health_below_one() {
        let mut u = user();
        u.health = 2;
        u.defense = 0;
        let dragon = ENEMIES[3];
        let outcome = battle_enemy(&mut u, dragon, &growth());
        assert_eq!(outcome.damage_taken, 50);
        // Health hits the floor of 1, then the 500 exp reward levels twice
        // (100 + 282 thresholds) and each level heals the capacity gain.
        assert_eq!(outcome.report.levels_gained, 2);
        assert_eq!(u.health, 21);
        assert_eq!(u.total_battles, 1);
        assert_eq!(u.gold, 100 + 1500);
    }

    #[test]
    fn weak_enemy_always_deals_at_least_one_damage() {
        let mut u = user();
        u.defense = 99;
        let slime = ENEMIES[0];
        let outcome = battle_enemy(&mut u, slime, &growth());
        assert_eq!(outcome.damage_taken, 1);
    }
}
