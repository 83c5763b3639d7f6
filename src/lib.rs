//! # Questbot - RPG Chat Bot Engine
//!
//! Questbot is a chat-network RPG bot engine. It parses prefixed text commands
//! from an inbound message stream, gates them through a cooldown/ban system,
//! mutates persistent per-player game state (levels, gold, inventory), and runs
//! a wagered tic-tac-toe side game, all independent of any particular chat
//! transport.
//!
//! ## Features
//!
//! - **Single Command Table**: One authoritative dispatcher routes every command;
//!   game, mini-game, and admin handlers never own their own parsing.
//! - **Anti-Spam Gate**: Two-tier cooldowns (global + per-command) with a
//!   warning/ban escalation ladder, persisted across restarts.
//! - **Pure Game Engine**: Experience/leveling, currency, inventory, and shop
//!   operations as side-effect-free functions over a player record.
//! - **Wagered Tic-Tac-Toe**: Session-keyed mini-game with best-effort gold
//!   settlement against the shared economy.
//! - **Sub-Bot Registry**: Provisioning records for user-owned bots, charged
//!   against the in-game economy.
//! - **API Facade**: Every engine and gate operation exposed as a plain callable
//!   for an HTTP layer, gated by an API-key table.
//! - **Async Design**: Built with Tokio; per-store write gates serialize snapshot
//!   persistence while reads stay concurrent.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use questbot::config::Config;
//! use questbot::bot::Dispatcher;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let dispatcher = Dispatcher::new(config, tx)?;
//!
//!     // Feed inbound messages from your transport:
//!     // dispatcher.handle_message(msg).await;
//!     // ...and deliver replies from `rx` back to the network.
//!     # let _ = &mut rx;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bot`] - Command table and the dispatch pipeline
//! - [`game`] - Player records, item catalog, and the pure game engine
//! - [`spam`] - Rate limiter / ban gate
//! - [`tictactoe`] - Wagered tic-tac-toe mini-game
//! - [`subbot`] - Sub-bot provisioning registry
//! - [`api`] - Plain-callable facade for the REST layer
//! - [`store`] - JSON snapshot persistence
//! - [`config`] - Configuration management

pub mod api;
pub mod bot;
pub mod config;
pub mod game;
pub mod logutil;
pub mod spam;
pub mod store;
pub mod subbot;
pub mod tictactoe;
pub mod validation;
