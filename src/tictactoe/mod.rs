//! Wagered tic-tac-toe mini-game.
//!
//! Sessions are keyed by a short time-based token and move through
//! `waiting -> playing -> ended`. The wager is checked when a game is created
//! and joined but never reserved: settlement happens only on a decisive
//! outcome, and if the loser no longer holds the wager the transfer is
//! silently skipped. That no-escrow window is intentional: a player who
//! spends their gold mid-game owes nothing on loss. Weigh that before
//! changing it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::game::engine;
use crate::game::errors::GameError;
use crate::game::players::PlayerStore;
use crate::store::SnapshotFile;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn other(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Playing,
    Ended,
}

pub type Board = [Option<Mark>; 9];

/// The 8 winning lines of a 3x3 board.
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

pub fn winner(board: &Board) -> Option<Mark> {
    for line in LINES {
        if let Some(mark) = board[line[0]] {
            if board[line[1]] == Some(mark) && board[line[2]] == Some(mark) {
                return Some(mark);
            }
        }
    }
    None
}

pub fn is_full(board: &Board) -> bool {
    board.iter().all(|c| c.is_some())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Win(Mark),
    Draw,
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TttSession {
    pub id: String,
    /// The creator always plays X.
    pub player_x: String,
    /// The invited opponent plays O once they join.
    pub player_o: String,
    pub wager: u64,
    pub board: Board,
    pub turn: Mark,
    pub status: GameStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl TttSession {
    pub fn new(
        id: String,
        creator: String,
        opponent: String,
        wager: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            player_x: creator,
            player_o: opponent,
            wager,
            board: [None; 9],
            turn: Mark::X,
            status: GameStatus::Waiting,
            created_at: now,
            started_at: None,
        }
    }

    pub fn mark_of(&self, user: &str) -> Option<Mark> {
        if user == self.player_x {
            Some(Mark::X)
        } else if user == self.player_o {
            Some(Mark::O)
        } else {
            None
        }
    }

    pub fn player_of(&self, mark: Mark) -> &str {
        match mark {
            Mark::X => &self.player_x,
            Mark::O => &self.player_o,
        }
    }

    /// Place `actor`'s mark at `position` (1..=9), validating state, turn, and
    /// occupancy. On a decisive result the session transitions to `ended`;
    /// otherwise the turn flips.
    pub fn place(&mut self, actor: &str, position: u32) -> Result<MoveOutcome, GameError> {
        if self.status != GameStatus::Playing {
            return Err(GameError::InvalidGameState(
                "game is not in progress".to_string(),
            ));
        }
        let mark = self.mark_of(actor).ok_or(GameError::NotParticipant)?;
        if self.turn != mark {
            return Err(GameError::NotYourTurn);
        }
        if !(1..=9).contains(&position) {
            return Err(GameError::Validation(
                "position must be between 1 and 9".to_string(),
            ));
        }
        let cell = (position - 1) as usize;
        if self.board[cell].is_some() {
            return Err(GameError::Validation("that cell is taken".to_string()));
        }
        self.board[cell] = Some(mark);

        if let Some(winning_mark) = winner(&self.board) {
            self.status = GameStatus::Ended;
            return Ok(MoveOutcome::Win(winning_mark));
        }
        if is_full(&self.board) {
            self.status = GameStatus::Ended;
            return Ok(MoveOutcome::Draw);
        }
        self.turn = mark.other();
        Ok(MoveOutcome::Continue)
    }

    /// Render the board with a position legend.
    pub fn render_board(&self) -> String {
        let cell = |i: usize| match self.board[i] {
            None => "⬜",
            Some(Mark::X) => "❌",
            Some(Mark::O) => "⭕",
        };
        format!(
            "{} {} {}    1 2 3\n{} {} {}    4 5 6\n{} {} {}    7 8 9",
            cell(0),
            cell(1),
            cell(2),
            cell(3),
            cell(4),
            cell(5),
            cell(6),
            cell(7),
            cell(8),
        )
    }
}

/// Wager transfer attempted after a decisive outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub winner: String,
    pub loser: String,
    pub amount: u64,
    /// False when the loser no longer held the wager and the transfer was
    /// skipped.
    pub transferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub session: TttSession,
    pub outcome: MoveOutcome,
    pub settlement: Option<Settlement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForfeitReport {
    pub session: TttSession,
    pub winner: String,
    pub settlement: Option<Settlement>,
}

/// Persistence for sessions, mirroring the player store's write-gate model.
struct GameStore {
    file: SnapshotFile<HashMap<String, TttSession>>,
    games: RwLock<HashMap<String, TttSession>>,
    write_gate: Mutex<()>,
}

impl GameStore {
    fn open(path: impl AsRef<Path>) -> Self {
        let file = SnapshotFile::new(path.as_ref());
        let games = file.load();
        Self {
            file,
            games: RwLock::new(games),
            write_gate: Mutex::new(()),
        }
    }

    async fn get(&self, id: &str) -> Result<TttSession, GameError> {
        self.games
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::GameNotFound(id.to_string()))
    }

    async fn insert(&self, session: TttSession) -> Result<TttSession, GameError> {
        let _gate = self.write_gate.lock().await;
        let (snapshot, stored) = {
            let mut map = self.games.write().await;
            let stored = session.clone();
            map.insert(session.id.clone(), session);
            (map.clone(), stored)
        };
        self.file.save(&snapshot)?;
        Ok(stored)
    }

    async fn contains(&self, id: &str) -> bool {
        self.games.read().await.contains_key(id)
    }

    async fn count(&self) -> usize {
        self.games.read().await.len()
    }

    /// Mutate a session under the write gate, rolling back on decline.
    async fn mutate<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut TttSession) -> Result<R, GameError>,
    ) -> Result<R, GameError> {
        let _gate = self.write_gate.lock().await;
        let (snapshot, outcome) = {
            let mut map = self.games.write().await;
            let session = map
                .get_mut(id)
                .ok_or_else(|| GameError::GameNotFound(id.to_string()))?;
            let before = session.clone();
            let outcome = match f(session) {
                Ok(value) => Ok(value),
                Err(e) => {
                    *session = before;
                    Err(e)
                }
            };
            (map.clone(), outcome)
        };
        // Declines leave the map untouched; skip the redundant write.
        if outcome.is_ok() {
            self.file.save(&snapshot)?;
        }
        outcome
    }
}

/// Mini-game operations, coupled to the shared economy only through the
/// player store's gold mutations.
pub struct TttEngine {
    games: GameStore,
    players: Arc<PlayerStore>,
}

impl TttEngine {
    pub fn open(path: impl AsRef<Path>, players: Arc<PlayerStore>) -> Self {
        Self {
            games: GameStore::open(path),
            players,
        }
    }

    pub async fn session(&self, id: &str) -> Result<TttSession, GameError> {
        self.games.get(id).await
    }

    pub async fn session_count(&self) -> usize {
        self.games.count().await
    }

    /// Create a game against `opponent`. Both parties must currently hold the
    /// wager; the funds are checked, not reserved.
    pub async fn create(
        &self,
        creator: &str,
        opponent: &str,
        wager: u64,
    ) -> Result<TttSession, GameError> {
        if creator == opponent {
            return Err(GameError::Validation(
                "you cannot play against yourself".to_string(),
            ));
        }
        if self.players.get(creator).await?.gold < wager {
            return Err(GameError::InsufficientFunds { required: wager });
        }
        if self.players.get(opponent).await?.gold < wager {
            return Err(GameError::Validation(format!(
                "opponent must hold {} gold before joining",
                wager
            )));
        }

        let now = Utc::now();
        let mut id = make_game_id(now);
        while self.games.contains(&id).await {
            id = reroll_game_id(&id);
        }
        let session = TttSession::new(id, creator.to_string(), opponent.to_string(), wager, now);
        self.games.insert(session).await
    }

    /// Join a waiting game as the invited player (the creator may also confirm
    /// their own game). Re-checks both parties' funds, then starts play with X
    /// to move.
    pub async fn join(&self, id: &str, joiner: &str) -> Result<TttSession, GameError> {
        let session = self.games.get(id).await?;
        if session.status != GameStatus::Waiting {
            return Err(GameError::InvalidGameState(
                "game has already started".to_string(),
            ));
        }
        if session.mark_of(joiner).is_none() {
            return Err(GameError::NotParticipant);
        }
        let wager = session.wager;
        if self.players.get(&session.player_x).await?.gold < wager {
            return Err(GameError::Validation(
                "the creator no longer holds the wager".to_string(),
            ));
        }
        if self.players.get(&session.player_o).await?.gold < wager {
            return Err(GameError::InsufficientFunds { required: wager });
        }

        let now = Utc::now();
        self.games
            .mutate(id, |g| {
                if g.status != GameStatus::Waiting {
                    return Err(GameError::InvalidGameState(
                        "game has already started".to_string(),
                    ));
                }
                g.status = GameStatus::Playing;
                g.started_at = Some(now);
                g.turn = Mark::X;
                Ok(g.clone())
            })
            .await
    }

    /// Play `position` for `actor`, settling the wager on a decisive result.
    pub async fn make_move(
        &self,
        id: &str,
        actor: &str,
        position: u32,
    ) -> Result<MoveReport, GameError> {
        let (session, outcome) = self
            .games
            .mutate(id, |g| {
                let outcome = g.place(actor, position)?;
                Ok((g.clone(), outcome))
            })
            .await?;

        let settlement = match outcome {
            MoveOutcome::Win(mark) => self.settle(&session, mark).await?,
            MoveOutcome::Draw | MoveOutcome::Continue => None,
        };

        Ok(MoveReport {
            session,
            outcome,
            settlement,
        })
    }

    /// Concede the game; the opponent wins and the wager settles best-effort.
    pub async fn forfeit(&self, id: &str, actor: &str) -> Result<ForfeitReport, GameError> {
        let actor_owned = actor.to_string();
        let (session, winner_mark) = self
            .games
            .mutate(id, move |g| {
                if g.status == GameStatus::Ended {
                    return Err(GameError::InvalidGameState(
                        "game is already over".to_string(),
                    ));
                }
                let mark = g.mark_of(&actor_owned).ok_or(GameError::NotParticipant)?;
                g.status = GameStatus::Ended;
                Ok((g.clone(), mark.other()))
            })
            .await?;

        let settlement = self.settle(&session, winner_mark).await?;
        Ok(ForfeitReport {
            winner: session.player_of(winner_mark).to_string(),
            session,
            settlement,
        })
    }

    /// Transfer the wager loser -> winner if the loser still holds it. No
    /// transfer happens for zero wagers, and an underfunded loser simply keeps
    /// whatever they have.
    async fn settle(
        &self,
        session: &TttSession,
        winner_mark: Mark,
    ) -> Result<Option<Settlement>, GameError> {
        if session.wager == 0 {
            return Ok(None);
        }
        let winner = session.player_of(winner_mark).to_string();
        let loser = session.player_of(winner_mark.other()).to_string();
        let wager = session.wager;
        let transferred = self
            .players
            .try_with_pair(&winner, &loser, |w, l| {
                if l.gold >= wager {
                    engine::spend_gold(l, wager)?;
                    engine::add_gold(w, wager);
                    Ok(true)
                } else {
                    Ok(false)
                }
            })
            .await?;
        if !transferred {
            log::info!(
                "ttt {}: wager {} skipped, loser {} lacks funds",
                session.id,
                wager,
                loser
            );
        }
        Ok(Some(Settlement {
            winner,
            loser,
            amount: wager,
            transferred,
        }))
    }
}

/// Short base-36 token from the creation timestamp.
fn make_game_id(now: DateTime<Utc>) -> String {
    let mut n = now.timestamp_millis().unsigned_abs();
    let digits = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    while n > 0 {
        out.push(digits[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    let token: String = out.iter().map(|&b| b as char).collect();
    // Keep the low-order digits: they change every millisecond.
    token[token.len().saturating_sub(6)..].to_string()
}

/// Collision escape hatch: swap in a random final character.
fn reroll_game_id(id: &str) -> String {
    let digits = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let c = digits[rand::thread_rng().gen_range(0..36)] as char;
    let mut out: String = id.chars().take(id.len().saturating_sub(1)).collect();
    out.push(c);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StarterStats;
    use tempfile::TempDir;

    fn players(dir: &TempDir, gold: u64) -> Arc<PlayerStore> {
        Arc::new(PlayerStore::open(
            dir.path().join("users.json"),
            StarterStats {
                max_health: 100,
                attack: 10,
                defense: 5,
                gold,
            },
        ))
    }

    fn ttt(dir: &TempDir, players: Arc<PlayerStore>) -> TttEngine {
        TttEngine::open(dir.path().join("ttt.json"), players)
    }

    #[test]
    fn winner_detects_all_lines() {
        for line in LINES {
            let mut board: Board = [None; 9];
            for cell in line {
                board[cell] = Some(Mark::O);
            }
            assert_eq!(winner(&board), Some(Mark::O), "line {:?}", line);
        }
        assert_eq!(winner(&[None; 9]), None);
    }

    #[test]
    fn full_board_without_line_is_a_draw() {
        use Mark::{O, X};
        // X O X / X O O / O X X has no three-in-a-row.
        let board: Board = [
            Some(X),
            Some(O),
            Some(X),
            Some(X),
            Some(O),
            Some(O),
            Some(O),
            Some(X),
            Some(X),
        ];
        assert_eq!(winner(&board), None);
        assert!(is_full(&board));
    }

    #[test]
    fn place_enforces_turn_and_occupancy() {
        let now = Utc::now();
        let mut game = TttSession::new("g1".into(), "x@c".into(), "o@c".into(), 0, now);
        game.status = GameStatus::Playing;

        assert!(matches!(
            game.place("o@c", 1),
            Err(GameError::NotYourTurn)
        ));
        assert!(matches!(
            game.place("stranger@c", 1),
            Err(GameError::NotParticipant)
        ));
        assert!(matches!(
            game.place("x@c", 10),
            Err(GameError::Validation(_))
        ));
        assert_eq!(game.place("x@c", 5).unwrap(), MoveOutcome::Continue);
        assert!(matches!(
            game.place("o@c", 5),
            Err(GameError::Validation(_))
        ));
        assert_eq!(game.turn, Mark::O);
    }

    #[test]
    fn place_rejects_moves_before_join() {
        let now = Utc::now();
        let mut game = TttSession::new("g1".into(), "x@c".into(), "o@c".into(), 0, now);
        assert!(matches!(
            game.place("x@c", 1),
            Err(GameError::InvalidGameState(_))
        ));
    }

    #[tokio::test]
    async fn create_rejects_self_play_and_missing_funds() {
        let dir = TempDir::new().expect("tempdir");
        let store = players(&dir, 50);
        let engine = ttt(&dir, store);

        assert!(matches!(
            engine.create("a@c", "a@c", 0).await,
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            engine.create("a@c", "b@c", 100).await,
            Err(GameError::InsufficientFunds { required: 100 })
        ));
        engine.create("a@c", "b@c", 50).await.expect("affordable wager");
    }

    #[tokio::test]
    async fn join_transitions_waiting_to_playing() {
        let dir = TempDir::new().expect("tempdir");
        let store = players(&dir, 500);
        let engine = ttt(&dir, store);
        let game = engine.create("a@c", "b@c", 100).await.expect("create");
        assert_eq!(game.status, GameStatus::Waiting);

        assert!(matches!(
            engine.join(&game.id, "stranger@c").await,
            Err(GameError::NotParticipant)
        ));

        let joined = engine.join(&game.id, "b@c").await.expect("join");
        assert_eq!(joined.status, GameStatus::Playing);
        assert_eq!(joined.turn, Mark::X);

        assert!(matches!(
            engine.join(&game.id, "b@c").await,
            Err(GameError::InvalidGameState(_))
        ));
    }

    #[tokio::test]
    async fn unknown_game_id_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let store = players(&dir, 100);
        let engine = ttt(&dir, store);
        assert!(matches!(
            engine.join("nope", "a@c").await,
            Err(GameError::GameNotFound(_))
        ));
    }

    async fn play_x_win(engine: &TttEngine, id: &str) -> MoveReport {
        // X takes the top row; O plays along the middle row.
        engine.make_move(id, "a@c", 1).await.expect("x1");
        engine.make_move(id, "b@c", 4).await.expect("o4");
        engine.make_move(id, "a@c", 2).await.expect("x2");
        engine.make_move(id, "b@c", 5).await.expect("o5");
        engine.make_move(id, "a@c", 3).await.expect("x3 wins")
    }

    #[tokio::test]
    async fn decisive_win_transfers_the_wager() {
        let dir = TempDir::new().expect("tempdir");
        let store = players(&dir, 500);
        let engine = ttt(&dir, Arc::clone(&store));
        let game = engine.create("a@c", "b@c", 100).await.expect("create");
        engine.join(&game.id, "b@c").await.expect("join");

        let report = play_x_win(&engine, &game.id).await;
        assert_eq!(report.outcome, MoveOutcome::Win(Mark::X));
        let settlement = report.settlement.expect("settled");
        assert!(settlement.transferred);
        assert_eq!(settlement.amount, 100);
        assert_eq!(store.get("a@c").await.unwrap().gold, 600);
        assert_eq!(store.get("b@c").await.unwrap().gold, 400);
        assert_eq!(report.session.status, GameStatus::Ended);
    }

    #[tokio::test]
    async fn broke_loser_keeps_their_gold() {
        let dir = TempDir::new().expect("tempdir");
        let store = players(&dir, 500);
        let engine = ttt(&dir, Arc::clone(&store));
        let game = engine.create("a@c", "b@c", 100).await.expect("create");
        engine.join(&game.id, "b@c").await.expect("join");

        // The loser spends their gold mid-game; no escrow means no transfer.
        store
            .try_with_user("b@c", |u| engine::spend_gold(u, 450))
            .await
            .expect("spend");

        let report = play_x_win(&engine, &game.id).await;
        let settlement = report.settlement.expect("settled");
        assert!(!settlement.transferred);
        assert_eq!(store.get("a@c").await.unwrap().gold, 500);
        assert_eq!(store.get("b@c").await.unwrap().gold, 50);
    }

    #[tokio::test]
    async fn draw_transfers_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let store = players(&dir, 500);
        let engine = ttt(&dir, Arc::clone(&store));
        let game = engine.create("a@c", "b@c", 100).await.expect("create");
        engine.join(&game.id, "b@c").await.expect("join");

        // X: 1 2 6 7 9 / O: 3 4 5 8 fills the board with no line:
        // X X O / O O X / X O X
        for (user, pos) in [
            ("a@c", 1),
            ("b@c", 3),
            ("a@c", 2),
            ("b@c", 4),
            ("a@c", 6),
            ("b@c", 5),
            ("a@c", 7),
            ("b@c", 8),
        ] {
            let r = engine.make_move(&game.id, user, pos).await.expect("move");
            assert_eq!(r.outcome, MoveOutcome::Continue);
        }
        let last = engine.make_move(&game.id, "a@c", 9).await.expect("last");
        assert_eq!(last.outcome, MoveOutcome::Draw);
        assert!(last.settlement.is_none());
        assert_eq!(store.get("a@c").await.unwrap().gold, 500);
        assert_eq!(store.get("b@c").await.unwrap().gold, 500);
    }

    #[tokio::test]
    async fn forfeit_awards_the_opponent() {
        let dir = TempDir::new().expect("tempdir");
        let store = players(&dir, 500);
        let engine = ttt(&dir, Arc::clone(&store));
        let game = engine.create("a@c", "b@c", 100).await.expect("create");
        engine.join(&game.id, "b@c").await.expect("join");

        let report = engine.forfeit(&game.id, "a@c").await.expect("forfeit");
        assert_eq!(report.winner, "b@c");
        assert!(report.settlement.expect("settled").transferred);
        assert_eq!(store.get("b@c").await.unwrap().gold, 600);

        assert!(matches!(
            engine.forfeit(&game.id, "b@c").await,
            Err(GameError::InvalidGameState(_))
        ));
    }

    #[tokio::test]
    async fn sessions_survive_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let store = players(&dir, 500);
        let id = {
            let engine = ttt(&dir, Arc::clone(&store));
            engine.create("a@c", "b@c", 10).await.expect("create").id
        };
        let engine = ttt(&dir, store);
        let session = engine.session(&id).await.expect("persisted");
        assert_eq!(session.status, GameStatus::Waiting);
    }

    #[test]
    fn game_ids_are_short_tokens() {
        let id = make_game_id(Utc::now());
        assert!(id.len() <= 6 && !id.is_empty());
        let rerolled = reroll_game_id(&id);
        assert_eq!(rerolled.len(), id.len());
    }
}
