//! Player record persistence with per-store mutation serialization.
//!
//! The authoritative map lives in memory behind an `RwLock`; every mutation
//! funnels through one async write gate so at most one read-modify-write is in
//! flight at a time and snapshot saves are never interleaved. Reads stay
//! concurrent. Mutation closures must decline without side effects (the engine
//! functions guarantee this); on a decline the record is restored from a
//! pre-image, so only the implicit creation of a fresh record can persist.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::config::StarterStats;
use crate::game::errors::GameError;
use crate::game::types::UserRecord;
use crate::store::SnapshotFile;

pub struct PlayerStore {
    file: SnapshotFile<HashMap<String, UserRecord>>,
    users: RwLock<HashMap<String, UserRecord>>,
    write_gate: Mutex<()>,
    starter: StarterStats,
}

impl PlayerStore {
    /// Open the store backed by `path`, loading whatever snapshot exists.
    pub fn open(path: impl AsRef<Path>, starter: StarterStats) -> Self {
        let file = SnapshotFile::new(path.as_ref());
        let users = file.load();
        Self {
            file,
            users: RwLock::new(users),
            write_gate: Mutex::new(()),
            starter,
        }
    }

    /// Run `f` against the (implicitly created) record for `id`, persisting the
    /// result. A decline from `f` rolls the record back to its pre-image and
    /// persists only the creation.
    pub async fn try_with_user<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut UserRecord) -> Result<R, GameError>,
    ) -> Result<R, GameError> {
        let _gate = self.write_gate.lock().await;
        let now = Utc::now();
        let (snapshot, outcome) = {
            let mut map = self.users.write().await;
            let record = map
                .entry(id.to_string())
                .or_insert_with(|| UserRecord::starter(&self.starter, now));
            let before = record.clone();
            let outcome = match f(record) {
                Ok(value) => {
                    record.last_active_at = now;
                    Ok(value)
                }
                Err(e) => {
                    *record = before;
                    Err(e)
                }
            };
            (map.clone(), outcome)
        };
        self.file.save(&snapshot)?;
        outcome
    }

    /// Like [`Self::try_with_user`] for two distinct records mutated together
    /// (wager settlement). Both effects land in a single snapshot write; a
    /// decline rolls both back.
    pub async fn try_with_pair<R>(
        &self,
        first: &str,
        second: &str,
        f: impl FnOnce(&mut UserRecord, &mut UserRecord) -> Result<R, GameError>,
    ) -> Result<R, GameError> {
        if first == second {
            return Err(GameError::Validation(
                "pair operation requires two distinct users".to_string(),
            ));
        }
        let _gate = self.write_gate.lock().await;
        let now = Utc::now();
        let (snapshot, outcome) = {
            let mut map = self.users.write().await;
            let mut rec_a = map
                .remove(first)
                .unwrap_or_else(|| UserRecord::starter(&self.starter, now));
            let mut rec_b = map
                .remove(second)
                .unwrap_or_else(|| UserRecord::starter(&self.starter, now));
            let before_a = rec_a.clone();
            let before_b = rec_b.clone();
            let outcome = match f(&mut rec_a, &mut rec_b) {
                Ok(value) => {
                    rec_a.last_active_at = now;
                    rec_b.last_active_at = now;
                    map.insert(first.to_string(), rec_a);
                    map.insert(second.to_string(), rec_b);
                    Ok(value)
                }
                Err(e) => {
                    map.insert(first.to_string(), before_a);
                    map.insert(second.to_string(), before_b);
                    Err(e)
                }
            };
            (map.clone(), outcome)
        };
        self.file.save(&snapshot)?;
        outcome
    }

    /// Fetch (implicitly creating) the record for `id`.
    pub async fn get(&self, id: &str) -> Result<UserRecord, GameError> {
        self.try_with_user(id, |user| Ok(user.clone())).await
    }

    /// Clone the full map for read-only views (leaderboards, status).
    pub async fn snapshot(&self) -> HashMap<String, UserRecord> {
        self.users.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Delete a record (administrative reset). Returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, GameError> {
        let _gate = self.write_gate.lock().await;
        let (snapshot, existed) = {
            let mut map = self.users.write().await;
            let existed = map.remove(id).is_some();
            (map.clone(), existed)
        };
        self.file.save(&snapshot)?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine;
    use tempfile::TempDir;

    fn starter() -> StarterStats {
        StarterStats {
            max_health: 100,
            attack: 10,
            defense: 5,
            gold: 100,
        }
    }

    #[tokio::test]
    async fn records_are_created_implicitly() {
        let dir = TempDir::new().expect("tempdir");
        let store = PlayerStore::open(dir.path().join("users.json"), starter());
        let user = store.get("alice@chat").await.expect("get");
        assert_eq!(user.level, 1);
        assert_eq!(user.gold, 100);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn mutations_persist_across_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("users.json");
        {
            let store = PlayerStore::open(&path, starter());
            store
                .try_with_user("bob@chat", |u| {
                    engine::add_gold(u, 400);
                    Ok(())
                })
                .await
                .expect("mutate");
        }
        let store = PlayerStore::open(&path, starter());
        let user = store.get("bob@chat").await.expect("get");
        assert_eq!(user.gold, 500);
    }

    #[tokio::test]
    async fn round_trip_preserves_every_field() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("users.json");
        let original = {
            let store = PlayerStore::open(&path, starter());
            store
                .try_with_user("carol@chat", |u| {
                    u.potions = 4;
                    u.bait = 2;
                    u.inventory.insert("iron_sword".to_string(), 1);
                    u.total_hunts = 9;
                    engine::grant_experience(
                        u,
                        150,
                        &crate::config::GrowthConfig {
                            health_per_level: 10,
                            attack_per_level: 2,
                            defense_per_level: 1,
                        },
                    );
                    Ok(u.clone())
                })
                .await
                .expect("mutate")
        };
        let store = PlayerStore::open(&path, starter());
        let mut reloaded = store.get("carol@chat").await.expect("get");
        // get() touches last_active_at; equality covers every other field.
        reloaded.last_active_at = original.last_active_at;
        assert_eq!(reloaded, original);
    }

    #[tokio::test]
    async fn decline_rolls_back_but_persists_creation() {
        let dir = TempDir::new().expect("tempdir");
        let store = PlayerStore::open(dir.path().join("users.json"), starter());
        let err = store
            .try_with_user("dan@chat", |u| {
                engine::add_gold(u, 999); // must not survive the decline below
                engine::spend_gold(u, 10_000)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InsufficientFunds { .. }));
        let user = store.get("dan@chat").await.expect("created");
        assert_eq!(user.gold, 100);
    }

    #[tokio::test]
    async fn pair_mutation_transfers_atomically() {
        let dir = TempDir::new().expect("tempdir");
        let store = PlayerStore::open(dir.path().join("users.json"), starter());
        store
            .try_with_pair("x@chat", "o@chat", |winner, loser| {
                engine::spend_gold(loser, 50)?;
                engine::add_gold(winner, 50);
                Ok(())
            })
            .await
            .expect("transfer");
        assert_eq!(store.get("x@chat").await.unwrap().gold, 150);
        assert_eq!(store.get("o@chat").await.unwrap().gold, 50);
    }

    #[tokio::test]
    async fn pair_decline_rolls_back_both_sides() {
        let dir = TempDir::new().expect("tempdir");
        let store = PlayerStore::open(dir.path().join("users.json"), starter());
        let err = store
            .try_with_pair("x@chat", "o@chat", |winner, loser| {
                engine::add_gold(winner, 777);
                engine::spend_gold(loser, 10_000)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::InsufficientFunds { .. }));
        assert_eq!(store.get("x@chat").await.unwrap().gold, 100);
        assert_eq!(store.get("o@chat").await.unwrap().gold, 100);
    }

    #[tokio::test]
    async fn pair_requires_distinct_users() {
        let dir = TempDir::new().expect("tempdir");
        let store = PlayerStore::open(dir.path().join("users.json"), starter());
        let err = store
            .try_with_pair("same@chat", "same@chat", |_, _| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
    }
}
