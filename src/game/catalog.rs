//! Static item catalog: definitions consulted (never mutated) by gameplay.
//!
//! The catalog is seeded onto disk on first run so operators can edit prices
//! and effects without rebuilding; subsequent runs load whatever the file
//! contains.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::store::{SnapshotFile, StorageError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Consumable,
    Material,
    Weapon,
    Armor,
    Accessory,
}

/// Type-specific effect carried by an item definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemEffect {
    #[default]
    None,
    /// Health restored when consumed.
    Heal(u32),
    AttackBonus(u32),
    DefenseBonus(u32),
    /// Multi-stat bonus for accessories.
    StatBonus {
        #[serde(default)]
        health: u32,
        #[serde(default)]
        attack: u32,
        #[serde(default)]
        defense: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: ItemKind,
    pub price: u64,
    pub sell_price: u64,
    /// Maximum stackable quantity; `None` marks a non-stackable item.
    #[serde(default)]
    pub stack_limit: Option<u32>,
    #[serde(default)]
    pub effect: ItemEffect,
}

impl ItemDefinition {
    fn new(id: &str, name: &str, description: &str, kind: ItemKind, price: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            kind,
            price,
            sell_price: price / 2,
            stack_limit: Some(99),
            effect: ItemEffect::None,
        }
    }

    fn with_effect(mut self, effect: ItemEffect) -> Self {
        self.effect = effect;
        self
    }

    fn non_stackable(mut self) -> Self {
        self.stack_limit = None;
        self
    }

    fn with_stack_limit(mut self, limit: u32) -> Self {
        self.stack_limit = Some(limit);
        self
    }
}

/// The full item table. A `BTreeMap` keeps shop listings in a stable order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ItemCatalog {
    pub items: BTreeMap<String, ItemDefinition>,
}

impl ItemCatalog {
    /// Load the catalog from `path`, seeding the default table (and writing it
    /// to disk) when the file is absent or empty.
    pub fn load_or_seed(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let file: SnapshotFile<ItemCatalog> = SnapshotFile::new(path.as_ref());
        let loaded = file.load();
        if loaded.items.is_empty() {
            let seeded = Self::default_catalog();
            file.save(&seeded)?;
            log::info!("catalog: seeded {} default items", seeded.items.len());
            return Ok(seeded);
        }
        Ok(loaded)
    }

    pub fn get(&self, item_id: &str) -> Option<&ItemDefinition> {
        self.items.get(item_id)
    }

    pub fn all(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Health restored by one potion. Falls back to 50 when the operator has
    /// removed the potion entry from the catalog file.
    pub fn potion_heal(&self) -> u32 {
        match self.get("potion").map(|d| &d.effect) {
            Some(ItemEffect::Heal(amount)) => *amount,
            _ => 50,
        }
    }

    /// The built-in item table.
    pub fn default_catalog() -> Self {
        let defs = vec![
            // Consumables
            ItemDefinition::new("potion", "Potion", "Restore 50 HP", ItemKind::Consumable, 50)
                .with_effect(ItemEffect::Heal(50)),
            ItemDefinition::new(
                "mana_potion",
                "Mana Potion",
                "Restore 30 mana",
                ItemKind::Consumable,
                40,
            ),
            ItemDefinition::new(
                "antidote",
                "Antidote",
                "Remove poison effect",
                ItemKind::Consumable,
                60,
            )
            .with_stack_limit(50),
            ItemDefinition::new("bait", "Bait", "Fishing bait", ItemKind::Consumable, 30),
            // Materials
            ItemDefinition::new("beef", "Beef", "Raw meat from hunting", ItemKind::Material, 20),
            ItemDefinition::new(
                "wild_meat",
                "Wild Meat",
                "Rare meat from hunting",
                ItemKind::Material,
                40,
            ),
            ItemDefinition::new("fish", "Fish", "Caught from fishing", ItemKind::Material, 25),
            ItemDefinition::new(
                "rare_fish",
                "Rare Fish",
                "Rare catch from fishing",
                ItemKind::Material,
                100,
            )
            .with_stack_limit(50),
            // Weapons
            ItemDefinition::new(
                "iron_sword",
                "Iron Sword",
                "Basic iron weapon",
                ItemKind::Weapon,
                200,
            )
            .with_effect(ItemEffect::AttackBonus(15))
            .non_stackable(),
            ItemDefinition::new(
                "steel_sword",
                "Steel Sword",
                "Improved steel weapon",
                ItemKind::Weapon,
                500,
            )
            .with_effect(ItemEffect::AttackBonus(30))
            .non_stackable(),
            ItemDefinition::new(
                "legend_sword",
                "Legendary Sword",
                "Ultimate legendary weapon",
                ItemKind::Weapon,
                5000,
            )
            .with_effect(ItemEffect::AttackBonus(100))
            .non_stackable(),
            // Armor
            ItemDefinition::new(
                "iron_armor",
                "Iron Armor",
                "Basic iron armor",
                ItemKind::Armor,
                150,
            )
            .with_effect(ItemEffect::DefenseBonus(10))
            .non_stackable(),
            ItemDefinition::new(
                "steel_armor",
                "Steel Armor",
                "Improved steel armor",
                ItemKind::Armor,
                400,
            )
            .with_effect(ItemEffect::DefenseBonus(25))
            .non_stackable(),
            ItemDefinition::new(
                "legend_armor",
                "Legendary Armor",
                "Ultimate legendary armor",
                ItemKind::Armor,
                4000,
            )
            .with_effect(ItemEffect::DefenseBonus(80))
            .non_stackable(),
            // Accessories
            ItemDefinition::new(
                "strength_ring",
                "Ring of Strength",
                "Boost attack power",
                ItemKind::Accessory,
                500,
            )
            .with_effect(ItemEffect::StatBonus {
                health: 20,
                attack: 10,
                defense: 0,
            })
            .non_stackable(),
            ItemDefinition::new(
                "vitality_ring",
                "Ring of Vitality",
                "Boost HP and defense",
                ItemKind::Accessory,
                450,
            )
            .with_effect(ItemEffect::StatBonus {
                health: 30,
                attack: 0,
                defense: 5,
            })
            .non_stackable(),
        ];
        let mut items = BTreeMap::new();
        for def in defs {
            items.insert(def.id.clone(), def);
        }
        Self { items }
    }
}
