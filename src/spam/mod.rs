//! Rate limiter / ban gate for command execution.
//!
//! Two-tier cooldowns (a global per-user gap plus a per-command gap) backed by
//! plain last-timestamp comparison. Warnings escalate to a temporary ban once the active
//! count reaches the configured maximum; warnings age out of the active count
//! after the reset window, and bans are evicted lazily when observed expired.
//!
//! The global timestamp and the per-command timestamps are separate fields, so
//! a command can never collide with internal bookkeeping.
//!
//! State persists synchronously on every recorded command: restarting the
//! process does not reset cooldowns.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::config::SpamConfig;
use crate::game::GameError;
use crate::store::SnapshotFile;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Warning {
    pub reason: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BanRecord {
    pub reason: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub warning_count: u32,
}

/// Per-user gate bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpamRecord {
    /// Global cooldown reference: the last accepted command of any kind.
    #[serde(default)]
    pub last_command_at: Option<DateTime<Utc>>,
    /// Per-command cooldown references, keyed by canonical command name.
    #[serde(default)]
    pub per_command: HashMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpamSnapshot {
    pub users: HashMap<String, SpamRecord>,
    pub bans: HashMap<String, BanRecord>,
}

/// Result of issuing a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningOutcome {
    pub active_warnings: u32,
    pub max_warnings: u32,
    pub banned: bool,
    pub ban_expires_at: Option<DateTime<Utc>>,
}

/// Read-only view of a user's gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpamStats {
    pub last_command_at: Option<DateTime<Utc>>,
    pub active_warnings: u32,
    pub max_warnings: u32,
    pub ban: Option<BanRecord>,
}

pub struct RateLimiter {
    cfg: SpamConfig,
    file: SnapshotFile<SpamSnapshot>,
    state: RwLock<SpamSnapshot>,
    write_gate: Mutex<()>,
}

impl RateLimiter {
    pub fn open(path: impl AsRef<Path>, cfg: SpamConfig) -> Self {
        let file = SnapshotFile::new(path.as_ref());
        let state = file.load();
        Self {
            cfg,
            file,
            state: RwLock::new(state),
            write_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SpamConfig {
        &self.cfg
    }

    fn active_warnings(&self, record: &SpamRecord, now: DateTime<Utc>) -> u32 {
        let window = Duration::seconds(self.cfg.warn_reset_secs);
        record
            .warnings
            .iter()
            .filter(|w| now.signed_duration_since(w.issued_at) < window)
            .count() as u32
    }

    /// May this (user, command) proceed right now?
    pub async fn check(&self, user: &str, command: &str) -> Result<(), GameError> {
        self.check_at(user, command, Utc::now()).await
    }

    /// Deterministic variant of [`Self::check`] for tests and replays.
    pub async fn check_at(
        &self,
        user: &str,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        // Ban gate first; expired bans are evicted on observation.
        let expired_ban = {
            let state = self.state.read().await;
            match state.bans.get(user) {
                Some(ban) if now > ban.expires_at => true,
                Some(ban) => {
                    return Err(GameError::Banned {
                        reason: ban.reason.clone(),
                        remaining_secs: (ban.expires_at - now).num_seconds().max(1),
                    });
                }
                None => false,
            }
        };
        if expired_ban {
            self.evict_ban(user).await?;
        }

        let state = self.state.read().await;
        let Some(record) = state.users.get(user) else {
            return Ok(());
        };

        // Global cooldown takes priority when both are still running.
        if let Some(last) = record.last_command_at {
            let elapsed = (now - last).num_milliseconds();
            if elapsed < self.cfg.global_cooldown_ms {
                return Err(GameError::RateLimited {
                    remaining_ms: self.cfg.global_cooldown_ms - elapsed,
                });
            }
        }

        let cooldown = self.cfg.cooldown_for(command);
        if let Some(last) = record.per_command.get(command) {
            let elapsed = (now - *last).num_milliseconds();
            if elapsed < cooldown {
                return Err(GameError::RateLimited {
                    remaining_ms: cooldown - elapsed,
                });
            }
        }

        Ok(())
    }

    async fn evict_ban(&self, user: &str) -> Result<(), GameError> {
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            if state.bans.remove(user).is_none() {
                return Ok(());
            }
            state.clone()
        };
        self.file.save(&snapshot)?;
        log::debug!("spam: expired ban evicted for {}", user);
        Ok(())
    }

    /// Record an accepted execution, updating both the global and the
    /// per-command timestamps. Persists before returning.
    pub async fn record_command(&self, user: &str, command: &str) -> Result<(), GameError> {
        self.record_command_at(user, command, Utc::now()).await
    }

    pub async fn record_command_at(
        &self,
        user: &str,
        command: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            let record = state.users.entry(user.to_string()).or_default();
            record.last_command_at = Some(now);
            record.per_command.insert(command.to_string(), now);
            state.clone()
        };
        self.file.save(&snapshot)?;
        Ok(())
    }

    /// Issue a warning. Reaching the maximum active count immediately bans the
    /// user for the configured duration; the warning list is left intact.
    pub async fn add_warning(
        &self,
        user: &str,
        reason: &str,
    ) -> Result<WarningOutcome, GameError> {
        self.add_warning_at(user, reason, Utc::now()).await
    }

    pub async fn add_warning_at(
        &self,
        user: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<WarningOutcome, GameError> {
        let _gate = self.write_gate.lock().await;
        let (snapshot, outcome) = {
            let mut state = self.state.write().await;
            let window = Duration::seconds(self.cfg.warn_reset_secs);
            let record = state.users.entry(user.to_string()).or_default();
            // Expired warnings no longer count; drop them while we are here.
            record
                .warnings
                .retain(|w| now.signed_duration_since(w.issued_at) < window);
            record.warnings.push(Warning {
                reason: reason.to_string(),
                issued_at: now,
            });
            let active = record.warnings.len() as u32;
            let banned = active >= self.cfg.max_warnings;
            let mut ban_expires_at = None;
            if banned {
                let expires_at = now + Duration::seconds(self.cfg.ban_duration_secs);
                ban_expires_at = Some(expires_at);
                state.bans.insert(
                    user.to_string(),
                    BanRecord {
                        reason: format!("Too many warnings: {}", reason),
                        issued_at: now,
                        expires_at,
                        warning_count: active,
                    },
                );
                log::info!("spam: {} banned until {}", user, expires_at);
            }
            (
                state.clone(),
                WarningOutcome {
                    active_warnings: active,
                    max_warnings: self.cfg.max_warnings,
                    banned,
                    ban_expires_at,
                },
            )
        };
        self.file.save(&snapshot)?;
        Ok(outcome)
    }

    /// Clear all warnings for a user (admin action).
    pub async fn remove_warnings(&self, user: &str) -> Result<(), GameError> {
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            if let Some(record) = state.users.get_mut(user) {
                record.warnings.clear();
            }
            state.clone()
        };
        self.file.save(&snapshot)?;
        Ok(())
    }

    /// Lift a ban (admin action). Returns whether one was present.
    pub async fn unban(&self, user: &str) -> Result<bool, GameError> {
        let _gate = self.write_gate.lock().await;
        let (snapshot, removed) = {
            let mut state = self.state.write().await;
            let removed = state.bans.remove(user).is_some();
            (state.clone(), removed)
        };
        self.file.save(&snapshot)?;
        Ok(removed)
    }

    /// Drop all gate state for a user (admin action).
    pub async fn reset(&self, user: &str) -> Result<(), GameError> {
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut state = self.state.write().await;
            state.users.remove(user);
            state.bans.remove(user);
            state.clone()
        };
        self.file.save(&snapshot)?;
        Ok(())
    }

    pub async fn stats(&self, user: &str) -> SpamStats {
        self.stats_at(user, Utc::now()).await
    }

    pub async fn stats_at(&self, user: &str, now: DateTime<Utc>) -> SpamStats {
        let state = self.state.read().await;
        let record = state.users.get(user);
        let ban = state
            .bans
            .get(user)
            .filter(|b| now <= b.expires_at)
            .cloned();
        SpamStats {
            last_command_at: record.and_then(|r| r.last_command_at),
            active_warnings: record.map(|r| self.active_warnings(r, now)).unwrap_or(0),
            max_warnings: self.cfg.max_warnings,
            ban,
        }
    }
}
