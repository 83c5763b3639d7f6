use thiserror::Error;

use crate::store::StorageError;

/// Errors that can arise while processing a command or API call.
///
/// Everything except [`GameError::Storage`] is a rule decline: reported to the
/// caller with its specific reason, and guaranteed to leave persisted state
/// unchanged. Storage failures are logged and surfaced as a generic failure;
/// none of these terminate the process.
#[derive(Debug, Error)]
pub enum GameError {
    /// Bad command arguments (unparseable quantity, missing target, etc.).
    #[error("invalid argument: {0}")]
    Validation(String),

    /// Spend or purchase exceeding the player's gold balance.
    #[error("not enough gold ({required} needed)")]
    InsufficientFunds { required: u64 },

    /// Removing or selling more of an item than the player holds.
    #[error("not enough of '{item}' (have {held}, need {requested})")]
    InsufficientItems {
        item: String,
        held: u32,
        requested: u32,
    },

    /// Potion use with an empty potion counter.
    #[error("no potion available")]
    NoPotionAvailable,

    /// Item identifier absent from the catalog.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// Adding beyond a stackable item's stack limit.
    #[error("stack limit reached for '{item}' (max {limit})")]
    StackLimit { item: String, limit: u32 },

    /// Command rejected by a cooldown.
    #[error("rate limited ({remaining_ms}ms remaining)")]
    RateLimited { remaining_ms: i64 },

    /// Command rejected by an active ban.
    #[error("banned: {reason} ({remaining_secs}s remaining)")]
    Banned {
        reason: String,
        remaining_secs: i64,
    },

    /// Mini-game session id not present in the store.
    #[error("game not found: {0}")]
    GameNotFound(String),

    /// Acting user is not a player in the addressed game.
    #[error("not a participant in this game")]
    NotParticipant,

    /// Move attempted out of turn.
    #[error("not your turn")]
    NotYourTurn,

    /// Operation not valid for the game's current status.
    #[error("invalid game state: {0}")]
    InvalidGameState(String),

    /// Owner/admin-only operation attempted without permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Persistence failure; the operation was aborted.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GameError {
    /// Whether this error is a rule decline (user-visible, non-fatal) as
    /// opposed to an infrastructure failure.
    pub fn is_decline(&self) -> bool {
        !matches!(self, GameError::Storage(_))
    }
}
