//! Sub-bot provisioning registry.
//!
//! Players can register bots of their own, paid for in gold. This module owns
//! only the registry state transitions (create, activity marking, delete)
//! and the per-owner limit; actually connecting a sub-bot to a network is the
//! transport layer's concern and happens elsewhere.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::config::SubBotConfig;
use crate::game::engine;
use crate::game::errors::GameError;
use crate::game::players::PlayerStore;
use crate::store::SnapshotFile;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubBotRecord {
    pub id: String,
    pub owner: String,
    pub label: String,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub message_count: u64,
}

pub struct SubBotRegistry {
    cfg: SubBotConfig,
    file: SnapshotFile<HashMap<String, SubBotRecord>>,
    bots: RwLock<HashMap<String, SubBotRecord>>,
    write_gate: Mutex<()>,
    players: Arc<PlayerStore>,
}

impl SubBotRegistry {
    pub fn open(path: impl AsRef<Path>, cfg: SubBotConfig, players: Arc<PlayerStore>) -> Self {
        let file = SnapshotFile::new(path.as_ref());
        let bots = file.load();
        Self {
            cfg,
            file,
            bots: RwLock::new(bots),
            write_gate: Mutex::new(()),
            players,
        }
    }

    pub fn config(&self) -> &SubBotConfig {
        &self.cfg
    }

    /// Register a new sub-bot for `owner`, charging the creation cost.
    ///
    /// The per-owner limit is checked first so a capped owner is never
    /// charged; the charge and the registry insert then happen under the
    /// write gate so a decline cannot strand a paid-for record.
    pub async fn create(&self, owner: &str, label: &str) -> Result<SubBotRecord, GameError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(GameError::Validation("sub-bot needs a name".to_string()));
        }
        let _gate = self.write_gate.lock().await;
        {
            let bots = self.bots.read().await;
            let owned = bots.values().filter(|b| b.owner == owner).count() as u32;
            if owned >= self.cfg.max_per_owner {
                return Err(GameError::Validation(format!(
                    "sub-bot limit reached (max {} per user)",
                    self.cfg.max_per_owner
                )));
            }
        }

        let cost = self.cfg.creation_cost;
        self.players
            .try_with_user(owner, |u| engine::spend_gold(u, cost))
            .await?;

        let now = Utc::now();
        let record = SubBotRecord {
            id: make_bot_id(now),
            owner: owner.to_string(),
            label: label.to_string(),
            prefix: self.cfg.default_prefix.clone(),
            created_at: now,
            last_active_at: now,
            active: false,
            message_count: 0,
        };
        let snapshot = {
            let mut bots = self.bots.write().await;
            bots.insert(record.id.clone(), record.clone());
            bots.clone()
        };
        self.file.save(&snapshot)?;
        log::info!("subbot: {} registered {}", owner, record.id);
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Option<SubBotRecord> {
        self.bots.read().await.get(id).cloned()
    }

    pub async fn list_for(&self, owner: &str) -> Vec<SubBotRecord> {
        let mut bots: Vec<SubBotRecord> = self
            .bots
            .read()
            .await
            .values()
            .filter(|b| b.owner == owner)
            .cloned()
            .collect();
        bots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        bots
    }

    pub async fn count(&self) -> usize {
        self.bots.read().await.len()
    }

    /// Transition the active flag; the transport calls this when a sub-bot
    /// connects or drops.
    pub async fn set_active(&self, id: &str, active: bool) -> Result<(), GameError> {
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut bots = self.bots.write().await;
            let record = bots
                .get_mut(id)
                .ok_or_else(|| GameError::GameNotFound(id.to_string()))?;
            record.active = active;
            record.last_active_at = Utc::now();
            bots.clone()
        };
        self.file.save(&snapshot)?;
        Ok(())
    }

    /// Bump the activity counters for an inbound message handled by a sub-bot.
    pub async fn record_activity(&self, id: &str) -> Result<(), GameError> {
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut bots = self.bots.write().await;
            let record = bots
                .get_mut(id)
                .ok_or_else(|| GameError::GameNotFound(id.to_string()))?;
            record.message_count += 1;
            record.last_active_at = Utc::now();
            bots.clone()
        };
        self.file.save(&snapshot)?;
        Ok(())
    }

    /// Remove a sub-bot. Only its owner may delete it.
    pub async fn delete(&self, id: &str, requester: &str) -> Result<(), GameError> {
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut bots = self.bots.write().await;
            let record = bots
                .get(id)
                .ok_or_else(|| GameError::GameNotFound(id.to_string()))?;
            if record.owner != requester {
                return Err(GameError::PermissionDenied(
                    "not your sub-bot".to_string(),
                ));
            }
            bots.remove(id);
            bots.clone()
        };
        self.file.save(&snapshot)?;
        Ok(())
    }
}

fn make_bot_id(now: DateTime<Utc>) -> String {
    let digits = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let token: String = (0..9)
        .map(|_| digits[rng.gen_range(0..36)] as char)
        .collect();
    format!("bot_{}_{}", now.timestamp_millis(), token)
}
