//! The command dispatch pipeline.
//!
//! One inbound message flows through exactly one path: parse prefix and
//! command, consult the rate limiter, run the single matching handler, record
//! the command, reply. Unknown commands are dropped silently. Replies leave
//! through an unbounded channel; the transport on the other end owns actual
//! delivery and its failures.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{ApiKeyTable, ApiService};
use crate::bot::commands::{parse_message, Command};
use crate::config::Config;
use crate::game::catalog::ItemCatalog;
use crate::game::engine;
use crate::game::errors::GameError;
use crate::game::players::PlayerStore;
use crate::game::views::{self, LeaderboardKind};
use crate::logutil::{escape_log, human_wait_ms, human_wait_secs};
use crate::spam::RateLimiter;
use crate::subbot::SubBotRegistry;
use crate::tictactoe::{MoveOutcome, Settlement, TttEngine};
use crate::validation::{parse_amount, parse_position, parse_quantity, resolve_user_ref};

/// Inbound message boundary: everything the core needs from a transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub sender: String,
    pub chat: String,
    pub body: String,
    pub mentions: Vec<String>,
}

/// Outbound reply boundary. `quote` optionally references the sender whose
/// message is being answered; delivery (and delivery failure) belongs to the
/// transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReply {
    pub chat: String,
    pub text: String,
    pub quote: Option<String>,
}

pub struct Dispatcher {
    cfg: Config,
    catalog: ItemCatalog,
    players: Arc<PlayerStore>,
    limiter: Arc<RateLimiter>,
    ttt: TttEngine,
    subbots: SubBotRegistry,
    keys: Arc<ApiKeyTable>,
    outgoing: mpsc::UnboundedSender<OutgoingReply>,
}

impl Dispatcher {
    /// Build the dispatcher and every store under `storage.data_dir`.
    pub fn new(
        cfg: Config,
        outgoing: mpsc::UnboundedSender<OutgoingReply>,
    ) -> Result<Self, GameError> {
        let data_dir = PathBuf::from(&cfg.storage.data_dir);
        let catalog = ItemCatalog::load_or_seed(data_dir.join("catalog.json"))?;
        let players = Arc::new(PlayerStore::open(
            data_dir.join("users.json"),
            cfg.progression.starting.clone(),
        ));
        let limiter = Arc::new(RateLimiter::open(
            data_dir.join("spam.json"),
            cfg.spam.clone(),
        ));
        let ttt = TttEngine::open(data_dir.join("tictactoe.json"), Arc::clone(&players));
        let subbots = SubBotRegistry::open(
            data_dir.join("subbots.json"),
            cfg.subbots.clone(),
            Arc::clone(&players),
        );
        let keys = Arc::new(ApiKeyTable::open(
            data_dir.join("apikeys.json"),
            cfg.api.clone(),
        ));
        Ok(Self {
            cfg,
            catalog,
            players,
            limiter,
            ttt,
            subbots,
            keys,
            outgoing,
        })
    }

    pub fn players(&self) -> Arc<PlayerStore> {
        Arc::clone(&self.players)
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    pub fn tictactoe(&self) -> &TttEngine {
        &self.ttt
    }

    pub fn subbots(&self) -> &SubBotRegistry {
        &self.subbots
    }

    /// Build the REST facade over the same stores this dispatcher mutates.
    pub fn api_service(&self) -> ApiService {
        ApiService::new(
            Arc::clone(&self.players),
            Arc::clone(&self.limiter),
            Arc::clone(&self.keys),
            self.catalog.clone(),
            self.cfg.progression.growth.clone(),
        )
    }

    fn reply(&self, msg: &InboundMessage, text: String) {
        let out = OutgoingReply {
            chat: msg.chat.clone(),
            text,
            quote: Some(msg.sender.clone()),
        };
        if self.outgoing.send(out).is_err() {
            log::warn!("dispatch: outgoing channel closed; reply dropped");
        }
    }

    /// Process one inbound message end to end.
    pub async fn handle_message(&self, msg: InboundMessage) {
        let Some(parsed) = parse_message(&msg.body, &self.cfg.bot.prefixes) else {
            return;
        };
        let Some(cmd) = Command::resolve(&parsed.name) else {
            // Unknown commands get no reply at all.
            log::debug!(
                "dispatch: ignoring unknown command '{}' from {}",
                escape_log(&parsed.name),
                msg.sender
            );
            return;
        };

        log::info!(
            "dispatch: {} -> {}{}",
            msg.sender,
            parsed.prefix,
            cmd.canonical()
        );

        // Gate before any handler runs.
        if let Err(e) = self.limiter.check(&msg.sender, cmd.canonical()).await {
            match e {
                GameError::RateLimited { .. } | GameError::Banned { .. } => {
                    self.reply(&msg, decline_text(&e));
                }
                other => {
                    log::error!("dispatch: gate check failed: {}", other);
                    self.reply(&msg, GENERIC_FAILURE.to_string());
                }
            }
            return;
        }

        let result = self.execute(cmd, &msg, &parsed.args, &parsed.prefix).await;
        let storage_failed = matches!(result, Err(GameError::Storage(_)));
        match result {
            Ok(Some(text)) => self.reply(&msg, text),
            Ok(None) => {}
            Err(e) if e.is_decline() => self.reply(&msg, decline_text(&e)),
            Err(e) => {
                log::error!("dispatch: {} failed: {}", cmd.canonical(), e);
                self.reply(&msg, GENERIC_FAILURE.to_string());
            }
        }

        // One record per accepted execution; declines count, infra failures
        // do not.
        if !storage_failed {
            if let Err(e) = self.limiter.record_command(&msg.sender, cmd.canonical()).await {
                log::error!("dispatch: record_command failed: {}", e);
            }
        }
    }

    async fn execute(
        &self,
        cmd: Command,
        msg: &InboundMessage,
        args: &[String],
        prefix: &str,
    ) -> Result<Option<String>, GameError> {
        if cmd.owner_only() && !self.cfg.bot.owners.iter().any(|o| o == &msg.sender) {
            return Err(GameError::PermissionDenied(
                "this command is owner-only".to_string(),
            ));
        }
        let sender = msg.sender.as_str();
        let growth = &self.cfg.progression.growth;

        match cmd {
            Command::Help => Ok(Some(help_text(&self.cfg.bot.name, prefix))),

            Command::Profile => {
                let user = self.players.get(sender).await?;
                Ok(Some(views::profile_text(&user, sender)))
            }

            Command::Stats => {
                let user = self.players.get(sender).await?;
                Ok(Some(views::stats_text(&user)))
            }

            Command::Hunt => {
                let haul = self
                    .players
                    .try_with_user(sender, |u| {
                        Ok(engine::hunt(u, &self.cfg.rewards.hunt, growth))
                    })
                    .await?;
                let mut text = format!("Hunting results:\n+{} EXP\n+{} gold", haul.exp, haul.gold);
                if haul.report.leveled {
                    text.push_str(&format!(
                        "\nLevel up! You are now level {}",
                        haul.report.new_level
                    ));
                }
                Ok(Some(text))
            }

            Command::Fish => {
                let (haul, bait_left) = self
                    .players
                    .try_with_user(sender, |u| {
                        let haul = engine::fish(u, &self.cfg.rewards.fish, growth)?;
                        Ok((haul, u.bait))
                    })
                    .await?;
                let mut text = format!(
                    "Fishing results:\n+{} EXP\n+{} gold\nBait left: {}",
                    haul.exp, haul.gold, bait_left
                );
                if haul.report.leveled {
                    text.push_str(&format!(
                        "\nLevel up! You are now level {}",
                        haul.report.new_level
                    ));
                }
                Ok(Some(text))
            }

            Command::Battle => {
                let outcome = self
                    .players
                    .try_with_user(sender, |u| Ok(engine::battle(u, growth)))
                    .await?;
                let mut text = format!(
                    "You fought a {} (lvl {}).\nTook {} damage.\n+{} EXP\n+{} gold",
                    outcome.enemy.name,
                    outcome.enemy.level,
                    outcome.damage_taken,
                    outcome.exp,
                    outcome.gold
                );
                if outcome.report.leveled {
                    text.push_str(&format!(
                        "\nLevel up! You are now level {}",
                        outcome.report.new_level
                    ));
                }
                Ok(Some(text))
            }

            Command::Shop => Ok(Some(views::shop_text(&self.catalog))),

            Command::Buy => {
                let Some(item_id) = args.first() else {
                    return Ok(Some(format!("Usage: {}buy <item> [qty]", prefix)));
                };
                let qty = parse_quantity(args.get(1).map(String::as_str))?;
                let purchase = self
                    .players
                    .try_with_user(sender, |u| {
                        engine::buy_item(u, &self.catalog, item_id, qty)
                    })
                    .await?;
                let name = self
                    .catalog
                    .get(item_id)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| item_id.clone());
                Ok(Some(format!(
                    "Bought {}x {}. Gold left: {}",
                    purchase.quantity, name, purchase.gold_remaining
                )))
            }

            Command::Sell => {
                let Some(item_id) = args.first() else {
                    return Ok(Some(format!("Usage: {}sell <item> [qty]", prefix)));
                };
                let qty = parse_quantity(args.get(1).map(String::as_str))?;
                let sale = self
                    .players
                    .try_with_user(sender, |u| {
                        engine::sell_item(u, &self.catalog, item_id, qty)
                    })
                    .await?;
                Ok(Some(format!(
                    "Sold {}x {} for {} gold. Gold now: {}",
                    sale.quantity, sale.item, sale.earned, sale.gold_total
                )))
            }

            Command::Inventory => {
                let user = self.players.get(sender).await?;
                Ok(Some(views::inventory_text(&user, &self.catalog)))
            }

            Command::Use => {
                match args.first().map(String::as_str) {
                    Some("potion") => {
                        let result = self
                            .players
                            .try_with_user(sender, |u| engine::use_potion(u, &self.catalog))
                            .await?;
                        Ok(Some(format!(
                            "Used a potion. HP is now {}/{}",
                            result.health, result.max_health
                        )))
                    }
                    // Anything else is not a consumable we know; stay silent
                    // like any other unknown command.
                    _ => Ok(None),
                }
            }

            Command::Leaderboard => {
                let kind = args
                    .first()
                    .and_then(|s| LeaderboardKind::parse(s))
                    .unwrap_or(LeaderboardKind::Level);
                let users = self.players.snapshot().await;
                let entries = views::leaderboard(&users, kind, 10);
                Ok(Some(views::leaderboard_text(&entries, kind)))
            }

            Command::Ttt => self.execute_ttt(msg, args, prefix).await,

            Command::Jadibot => self.execute_jadibot(msg, args, prefix).await,

            Command::Warn => {
                let target = resolve_user_ref(args.first().map(String::as_str), &msg.mentions)?;
                let reason = if args.len() > 1 {
                    args[1..].join(" ")
                } else {
                    "Spam".to_string()
                };
                let outcome = self.limiter.add_warning(&target, &reason).await?;
                let mut text = format!(
                    "Warned {} ({}/{} active warnings)",
                    target, outcome.active_warnings, outcome.max_warnings
                );
                if outcome.banned {
                    text.push_str("\nWarning limit reached: user is now banned.");
                }
                Ok(Some(text))
            }

            Command::Unwarn => {
                let target = resolve_user_ref(args.first().map(String::as_str), &msg.mentions)?;
                self.limiter.remove_warnings(&target).await?;
                Ok(Some(format!("Cleared warnings for {}", target)))
            }

            Command::Unban => {
                let target = resolve_user_ref(args.first().map(String::as_str), &msg.mentions)?;
                let lifted = self.limiter.unban(&target).await?;
                Ok(Some(if lifted {
                    format!("Unbanned {}", target)
                } else {
                    format!("{} is not banned", target)
                }))
            }

            Command::SpamStats => {
                let target = resolve_user_ref(args.first().map(String::as_str), &msg.mentions)?;
                let stats = self.limiter.stats(&target).await;
                let ban_line = match stats.ban {
                    Some(ban) => format!("banned until {}", ban.expires_at),
                    None => "not banned".to_string(),
                };
                Ok(Some(format!(
                    "Spam stats for {}:\nActive warnings: {}/{}\nStatus: {}",
                    target, stats.active_warnings, stats.max_warnings, ban_line
                )))
            }

            Command::GenApiKey => {
                let note = if args.is_empty() {
                    "No description".to_string()
                } else {
                    args.join(" ")
                };
                let (id, key) = self.keys.generate(&note, sender, false).await?;
                Ok(Some(format!(
                    "API key generated.\nID: {}\nKey: {}\nStore it now; it is shown only once.",
                    id, key
                )))
            }

            Command::ListApiKeys => {
                let keys = self.keys.list().await;
                if keys.is_empty() {
                    return Ok(Some("No API keys yet".to_string()));
                }
                let mut lines = vec!["API keys:".to_string()];
                for k in keys {
                    lines.push(format!(
                        "- {} ({}){}",
                        k.id,
                        k.note,
                        if k.revoked { " [revoked]" } else { "" }
                    ));
                }
                Ok(Some(lines.join("\n")))
            }

            Command::RevokeApiKey => {
                let Some(id) = args.first() else {
                    return Ok(Some(format!("Usage: {}revokeapikey <id>", prefix)));
                };
                let revoked = self.keys.revoke(id).await?;
                Ok(Some(if revoked {
                    "API key revoked".to_string()
                } else {
                    "Key not found".to_string()
                }))
            }
        }
    }

    async fn execute_ttt(
        &self,
        msg: &InboundMessage,
        args: &[String],
        prefix: &str,
    ) -> Result<Option<String>, GameError> {
        let sender = msg.sender.as_str();
        let sub = args.first().map(|s| s.to_lowercase());
        match sub.as_deref() {
            None | Some("help") => Ok(Some(format!(
                "Tic-tac-toe commands:\n{p}ttt start <@user|id> [wager]\n{p}ttt join <gameId>\n{p}ttt move <gameId> <1-9>\n{p}ttt board <gameId>\n{p}ttt forfeit <gameId>",
                p = prefix
            ))),

            Some("start") => {
                let opponent = resolve_user_ref(args.get(1).map(String::as_str), &msg.mentions)?;
                let wager = parse_amount(args.get(2).map(String::as_str))?;
                let game = self.ttt.create(sender, &opponent, wager).await?;
                Ok(Some(format!(
                    "Game created: {id}\nOpponent: {opp}\nWager: {wager} gold\nOpponent must type: {p}ttt join {id}",
                    id = game.id,
                    opp = opponent,
                    wager = wager,
                    p = prefix
                )))
            }

            Some("join") => {
                let Some(id) = args.get(1) else {
                    return Ok(Some(format!("Usage: {}ttt join <gameId>", prefix)));
                };
                let game = self.ttt.join(id, sender).await?;
                Ok(Some(format!(
                    "Game {} started!\nX: {}\nO: {}\nWager: {} gold\nTurn: {}\n\n{}",
                    game.id,
                    game.player_x,
                    game.player_o,
                    game.wager,
                    game.turn.symbol(),
                    game.render_board()
                )))
            }

            Some("board") => {
                let Some(id) = args.get(1) else {
                    return Ok(Some(format!("Usage: {}ttt board <gameId>", prefix)));
                };
                let game = self.ttt.session(id).await?;
                Ok(Some(format!(
                    "Game {} ({:?})\nTurn: {}\n\n{}",
                    game.id,
                    game.status,
                    game.turn.symbol(),
                    game.render_board()
                )))
            }

            Some("move") => {
                let Some(id) = args.get(1) else {
                    return Ok(Some(format!("Usage: {}ttt move <gameId> <1-9>", prefix)));
                };
                let position = parse_position(args.get(2).map(String::as_str))?;
                let report = self.ttt.make_move(id, sender, position).await?;
                let board = report.session.render_board();
                let text = match report.outcome {
                    MoveOutcome::Continue => format!(
                        "Move placed.\nTurn: {}\n\n{}",
                        report.session.turn.symbol(),
                        board
                    ),
                    MoveOutcome::Draw => format!("It's a draw!\n\n{}", board),
                    MoveOutcome::Win(mark) => format!(
                        "Winner: {} ({})\n\n{}{}",
                        report.session.player_of(mark),
                        mark.symbol(),
                        board,
                        settlement_line(&report.settlement)
                    ),
                };
                Ok(Some(text))
            }

            Some("forfeit") => {
                let Some(id) = args.get(1) else {
                    return Ok(Some(format!("Usage: {}ttt forfeit <gameId>", prefix)));
                };
                let report = self.ttt.forfeit(id, sender).await?;
                Ok(Some(format!(
                    "{} forfeits.\nWinner: {}{}",
                    sender,
                    report.winner,
                    settlement_line(&report.settlement)
                )))
            }

            Some(other) => Ok(Some(format!(
                "Unknown subcommand '{}'. Type: {}ttt help",
                other, prefix
            ))),
        }
    }

    async fn execute_jadibot(
        &self,
        msg: &InboundMessage,
        args: &[String],
        prefix: &str,
    ) -> Result<Option<String>, GameError> {
        let sender = msg.sender.as_str();
        let sub = args.first().map(|s| s.to_lowercase());
        match sub.as_deref() {
            None | Some("help") => Ok(Some(format!(
                "Sub-bot commands:\n{p}jadibot create <name>\n{p}jadibot list\n{p}jadibot info <botId>\n{p}jadibot delete <botId>\nCreating a sub-bot costs {cost} gold.",
                p = prefix,
                cost = self.subbots.config().creation_cost
            ))),

            Some("create") => {
                let label = args[1..].join(" ");
                let bot = self.subbots.create(sender, &label).await?;
                Ok(Some(format!(
                    "Sub-bot registered!\nID: {}\nName: {}\nPrefix: {}",
                    bot.id, bot.label, bot.prefix
                )))
            }

            Some("list") => {
                let bots = self.subbots.list_for(sender).await;
                if bots.is_empty() {
                    return Ok(Some("You have no sub-bots yet".to_string()));
                }
                let mut lines = vec!["Your sub-bots:".to_string()];
                for (i, b) in bots.iter().enumerate() {
                    lines.push(format!(
                        "{}. {} ({})\n   Status: {}  Messages: {}",
                        i + 1,
                        b.label,
                        b.id,
                        if b.active { "online" } else { "offline" },
                        b.message_count
                    ));
                }
                Ok(Some(lines.join("\n")))
            }

            Some("info") => {
                let Some(id) = args.get(1) else {
                    return Ok(Some(format!("Usage: {}jadibot info <botId>", prefix)));
                };
                match self.subbots.get(id).await {
                    Some(b) => Ok(Some(format!(
                        "Sub-bot {}\nName: {}\nOwner: {}\nPrefix: {}\nStatus: {}\nCreated: {}\nMessages: {}",
                        b.id,
                        b.label,
                        b.owner,
                        b.prefix,
                        if b.active { "online" } else { "offline" },
                        b.created_at.format("%Y-%m-%d %H:%M UTC"),
                        b.message_count
                    ))),
                    None => Ok(Some("Sub-bot not found".to_string())),
                }
            }

            Some("delete") => {
                let Some(id) = args.get(1) else {
                    return Ok(Some(format!("Usage: {}jadibot delete <botId>", prefix)));
                };
                self.subbots.delete(id, sender).await?;
                Ok(Some("Sub-bot deleted".to_string()))
            }

            Some(other) => Ok(Some(format!(
                "Unknown subcommand '{}'. Type: {}jadibot help",
                other, prefix
            ))),
        }
    }
}

const GENERIC_FAILURE: &str = "Something went wrong, please try again.";

fn settlement_line(settlement: &Option<Settlement>) -> String {
    match settlement {
        Some(s) if s.transferred => {
            format!("\nWager of {} gold transferred to the winner.", s.amount)
        }
        Some(s) => format!(
            "\nWager of {} gold skipped: the loser no longer holds it.",
            s.amount
        ),
        None => String::new(),
    }
}

/// Turn a rule decline into its user-visible message.
fn decline_text(err: &GameError) -> String {
    match err {
        GameError::RateLimited { remaining_ms } => format!(
            "⏱️ Wait {} before using this command again.",
            human_wait_ms(*remaining_ms)
        ),
        GameError::Banned {
            reason,
            remaining_secs,
        } => format!(
            "🚫 You are banned: {}\nTime remaining: {}",
            reason,
            human_wait_secs(*remaining_secs)
        ),
        GameError::InsufficientFunds { required } => {
            format!("Not enough gold. You need {} gold.", required)
        }
        GameError::InsufficientItems { item, held, .. } if item == "bait" && *held == 0 => {
            "You need bait. Buy some in the shop.".to_string()
        }
        GameError::NoPotionAvailable => "You don't have a potion. Buy one in the shop.".to_string(),
        GameError::UnknownItem(id) => format!("Item '{}' not found.", id),
        GameError::GameNotFound(_) => "Game not found.".to_string(),
        other => other.to_string(),
    }
}

fn help_text(bot_name: &str, prefix: &str) -> String {
    format!(
        "{name} - RPG commands:\n\
         {p}profile     - profile & status\n\
         {p}stats       - attack/defense/HP\n\
         {p}hunt        - hunt for EXP & gold\n\
         {p}fish        - fish (needs bait)\n\
         {p}battle      - fight a monster\n\
         {p}shop        - item shop\n\
         {p}buy <item>  - buy an item\n\
         {p}sell <item> - sell an item\n\
         {p}inventory   - your items\n\
         {p}use potion  - heal up\n\
         {p}leaderboard - top players\n\
         {p}ttt         - wagered tic-tac-toe\n\
         {p}jadibot     - your own sub-bot",
        name = bot_name,
        p = prefix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decline_texts_carry_the_reason() {
        let rate = decline_text(&GameError::RateLimited { remaining_ms: 1500 });
        assert!(rate.contains("1s"));
        let ban = decline_text(&GameError::Banned {
            reason: "Too many warnings: Spam".to_string(),
            remaining_secs: 120,
        });
        assert!(ban.contains("Too many warnings"));
        let funds = decline_text(&GameError::InsufficientFunds { required: 50 });
        assert!(funds.contains("50"));
        let bait = decline_text(&GameError::InsufficientItems {
            item: "bait".to_string(),
            held: 0,
            requested: 1,
        });
        assert!(bait.contains("bait"));
    }

    #[test]
    fn help_text_uses_the_invoking_prefix() {
        let text = help_text("Questbot", ".");
        assert!(text.contains(".hunt"));
        assert!(text.contains(".ttt"));
    }
}
