//! Plain-callable facade for the companion REST layer.
//!
//! The HTTP server lives outside this crate; it consumes [`ApiService`] as a
//! library. Nothing here knows about requests or responses: every operation
//! takes an API key string plus domain arguments and returns domain values, so
//! no transport types leak into the core.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::config::{ApiConfig, GrowthConfig};
use crate::game::catalog::{ItemCatalog, ItemDefinition};
use crate::game::engine::{self, LevelUpReport};
use crate::game::errors::GameError;
use crate::game::players::PlayerStore;
use crate::game::types::UserRecord;
use crate::game::views::{self, LeaderboardEntry, LeaderboardKind};
use crate::spam::{RateLimiter, SpamStats, WarningOutcome};
use crate::store::SnapshotFile;

/// What a successfully authorized key is allowed to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyGrant {
    pub name: String,
    pub owner: String,
    pub admin: bool,
}

/// A runtime-generated key. The secret itself is stored; listings only expose
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredApiKey {
    pub id: String,
    pub key: String,
    pub note: String,
    pub owner: String,
    #[serde(default)]
    pub admin: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked: bool,
}

/// Metadata view of a stored key (no secret).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyInfo {
    pub id: String,
    pub note: String,
    pub owner: String,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Static config keys plus runtime-generated keys, persisted like the other
/// stores.
pub struct ApiKeyTable {
    cfg: ApiConfig,
    file: SnapshotFile<HashMap<String, StoredApiKey>>,
    keys: RwLock<HashMap<String, StoredApiKey>>,
    write_gate: Mutex<()>,
}

impl ApiKeyTable {
    pub fn open(path: impl AsRef<Path>, cfg: ApiConfig) -> Self {
        let file = SnapshotFile::new(path.as_ref());
        let keys = file.load();
        Self {
            cfg,
            file,
            keys: RwLock::new(keys),
            write_gate: Mutex::new(()),
        }
    }

    /// Look a key up, static table first.
    pub async fn authorize(&self, key: &str) -> Result<ApiKeyGrant, GameError> {
        if let Some(seed) = self.cfg.keys.get(key) {
            return Ok(ApiKeyGrant {
                name: seed.name.clone(),
                owner: seed.owner.clone(),
                admin: seed.admin,
            });
        }
        let keys = self.keys.read().await;
        match keys.values().find(|k| k.key == key && !k.revoked) {
            Some(stored) => Ok(ApiKeyGrant {
                name: stored.note.clone(),
                owner: stored.owner.clone(),
                admin: stored.admin,
            }),
            None => Err(GameError::PermissionDenied("invalid API key".to_string())),
        }
    }

    /// Mint a new key. The secret is returned once; listings never repeat it.
    pub async fn generate(
        &self,
        note: &str,
        owner: &str,
        admin: bool,
    ) -> Result<(String, String), GameError> {
        let _gate = self.write_gate.lock().await;
        let now = Utc::now();
        let suffix: u32 = rand::thread_rng().gen_range(0..1000);
        let id = format!("key_{}{:03}", now.timestamp_millis(), suffix);
        let key = make_key_token();
        let snapshot = {
            let mut keys = self.keys.write().await;
            keys.insert(
                id.clone(),
                StoredApiKey {
                    id: id.clone(),
                    key: key.clone(),
                    note: note.to_string(),
                    owner: owner.to_string(),
                    admin,
                    created_at: now,
                    revoked: false,
                },
            );
            keys.clone()
        };
        self.file.save(&snapshot)?;
        log::info!("api: key {} generated for {}", id, owner);
        Ok((id, key))
    }

    pub async fn list(&self) -> Vec<ApiKeyInfo> {
        let keys = self.keys.read().await;
        let mut out: Vec<ApiKeyInfo> = keys
            .values()
            .map(|k| ApiKeyInfo {
                id: k.id.clone(),
                note: k.note.clone(),
                owner: k.owner.clone(),
                admin: k.admin,
                created_at: k.created_at,
                revoked: k.revoked,
            })
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Revoke by key id. Returns whether a live key was revoked.
    pub async fn revoke(&self, id: &str) -> Result<bool, GameError> {
        let _gate = self.write_gate.lock().await;
        let (snapshot, revoked) = {
            let mut keys = self.keys.write().await;
            let revoked = match keys.get_mut(id) {
                Some(k) if !k.revoked => {
                    k.revoked = true;
                    true
                }
                _ => false,
            };
            (keys.clone(), revoked)
        };
        if revoked {
            self.file.save(&snapshot)?;
        }
        Ok(revoked)
    }
}

fn make_key_token() -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let token: String = (0..32)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect();
    format!("qb_{}", token)
}

/// Aggregate bot statistics for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotStats {
    pub total_users: usize,
    pub total_gold: u64,
    pub total_hunts: u64,
    pub total_fishes: u64,
    pub average_level: u32,
}

/// The REST layer's entry point into the core.
pub struct ApiService {
    players: Arc<PlayerStore>,
    limiter: Arc<RateLimiter>,
    keys: Arc<ApiKeyTable>,
    catalog: ItemCatalog,
    growth: GrowthConfig,
}

impl ApiService {
    pub fn new(
        players: Arc<PlayerStore>,
        limiter: Arc<RateLimiter>,
        keys: Arc<ApiKeyTable>,
        catalog: ItemCatalog,
        growth: GrowthConfig,
    ) -> Self {
        Self {
            players,
            limiter,
            keys,
            catalog,
            growth,
        }
    }

    async fn authorize(&self, key: &str) -> Result<ApiKeyGrant, GameError> {
        self.keys.authorize(key).await
    }

    async fn authorize_admin(&self, key: &str) -> Result<ApiKeyGrant, GameError> {
        let grant = self.authorize(key).await?;
        if !grant.admin {
            return Err(GameError::PermissionDenied(
                "admin API key required".to_string(),
            ));
        }
        Ok(grant)
    }

    pub async fn get_user(&self, key: &str, user_id: &str) -> Result<UserRecord, GameError> {
        self.authorize(key).await?;
        self.players.get(user_id).await
    }

    pub async fn grant_experience(
        &self,
        key: &str,
        user_id: &str,
        amount: u64,
    ) -> Result<LevelUpReport, GameError> {
        self.authorize(key).await?;
        self.players
            .try_with_user(user_id, |u| Ok(engine::grant_experience(u, amount, &self.growth)))
            .await
    }

    /// Adjust gold by a signed delta; negative deltas decline when the balance
    /// is insufficient. Returns the new balance.
    pub async fn adjust_gold(
        &self,
        key: &str,
        user_id: &str,
        delta: i64,
    ) -> Result<u64, GameError> {
        self.authorize(key).await?;
        self.players
            .try_with_user(user_id, |u| {
                if delta >= 0 {
                    engine::add_gold(u, delta as u64);
                } else {
                    engine::spend_gold(u, delta.unsigned_abs())?;
                }
                Ok(u.gold)
            })
            .await
    }

    /// Credit an item; returns the new held count.
    pub async fn add_inventory_item(
        &self,
        key: &str,
        user_id: &str,
        item_id: &str,
        qty: u32,
    ) -> Result<u32, GameError> {
        self.authorize(key).await?;
        self.players
            .try_with_user(user_id, |u| {
                engine::add_item(u, &self.catalog, item_id, qty)?;
                Ok(u.held(item_id))
            })
            .await
    }

    /// Remove an item; returns the remaining held count.
    pub async fn remove_inventory_item(
        &self,
        key: &str,
        user_id: &str,
        item_id: &str,
        qty: u32,
    ) -> Result<u32, GameError> {
        self.authorize(key).await?;
        self.players
            .try_with_user(user_id, |u| {
                engine::remove_item(u, item_id, qty)?;
                Ok(u.held(item_id))
            })
            .await
    }

    pub async fn catalog_items(&self, key: &str) -> Result<Vec<ItemDefinition>, GameError> {
        self.authorize(key).await?;
        Ok(self.catalog.all().cloned().collect())
    }

    pub async fn catalog_item(&self, key: &str, item_id: &str) -> Result<ItemDefinition, GameError> {
        self.authorize(key).await?;
        self.catalog
            .get(item_id)
            .cloned()
            .ok_or_else(|| GameError::UnknownItem(item_id.to_string()))
    }

    pub async fn leaderboard(
        &self,
        key: &str,
        kind: LeaderboardKind,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, GameError> {
        self.authorize(key).await?;
        let users = self.players.snapshot().await;
        Ok(views::leaderboard(&users, kind, limit.min(100)))
    }

    pub async fn bot_stats(&self, key: &str) -> Result<BotStats, GameError> {
        self.authorize(key).await?;
        let users = self.players.snapshot().await;
        let total_users = users.len();
        let total_gold = users.values().map(|u| u.gold).sum();
        let total_hunts = users.values().map(|u| u.total_hunts).sum();
        let total_fishes = users.values().map(|u| u.total_fishes).sum();
        let average_level = if total_users == 0 {
            0
        } else {
            (users.values().map(|u| u64::from(u.level)).sum::<u64>() / total_users as u64) as u32
        };
        Ok(BotStats {
            total_users,
            total_gold,
            total_hunts,
            total_fishes,
            average_level,
        })
    }

    pub async fn spam_stats(&self, key: &str, user_id: &str) -> Result<SpamStats, GameError> {
        self.authorize_admin(key).await?;
        Ok(self.limiter.stats(user_id).await)
    }

    pub async fn warn_user(
        &self,
        key: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<WarningOutcome, GameError> {
        self.authorize_admin(key).await?;
        self.limiter.add_warning(user_id, reason).await
    }

    pub async fn unban_user(&self, key: &str, user_id: &str) -> Result<bool, GameError> {
        self.authorize_admin(key).await?;
        self.limiter.unban(user_id).await
    }

    /// Drop all gate state for a user: warnings, ban, and cooldown timestamps.
    pub async fn reset_spam(&self, key: &str, user_id: &str) -> Result<(), GameError> {
        self.authorize_admin(key).await?;
        self.limiter.reset(user_id).await
    }

    /// Delete a user record entirely (admin reset).
    pub async fn reset_user(&self, key: &str, user_id: &str) -> Result<bool, GameError> {
        self.authorize_admin(key).await?;
        self.players.delete(user_id).await
    }
}
