//! Binary entrypoint for the questbot CLI.
//!
//! Commands:
//! - `start` - run the bot with a local console session (type commands, read
//!   replies; a real chat transport feeds the same dispatcher in production)
//! - `init` - create a starter `config.toml`
//! - `status` - print store counts and a brief summary
//!
//! See the library crate docs for module-level details: `questbot::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use questbot::bot::{Dispatcher, InboundMessage};
use questbot::config::Config;

#[derive(Parser)]
#[command(name = "questbot")]
#[command(about = "A chat-network RPG bot with a persistent economy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot with a local console session
    Start,
    /// Initialize a new configuration file
    Init,
    /// Show store status and statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting questbot v{}", env!("CARGO_PKG_VERSION"));
            run_console(config).await?;
        }
        Commands::Init => {
            if tokio::fs::metadata(&cli.config).await.is_ok() {
                eprintln!("{} already exists; not overwriting.", cli.config);
                std::process::exit(1);
            }
            Config::create_default(&cli.config).await?;
            println!("Wrote {}. Edit it, then run: questbot start", cli.config);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            print_status(config).await?;
        }
    }

    Ok(())
}

/// Drive the dispatcher from stdin: each line is one message from a local
/// console identity, and replies print to stdout. The production transport
/// feeds the same [`Dispatcher::handle_message`] entry point.
async fn run_console(config: Config) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(config, tx)?;

    let printer = tokio::spawn(async move {
        while let Some(reply) = rx.recv().await {
            println!("{}", reply.text);
        }
    });

    println!("questbot console. Type commands (e.g. !help); Ctrl-D exits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let body = line.trim().to_string();
        if body.is_empty() {
            continue;
        }
        dispatcher
            .handle_message(InboundMessage {
                sender: "console@local".to_string(),
                chat: "console".to_string(),
                body,
                mentions: Vec::new(),
            })
            .await;
    }

    drop(dispatcher);
    if let Err(e) = printer.await {
        error!("reply printer task failed: {}", e);
    }
    info!("console session ended");
    Ok(())
}

async fn print_status(config: Config) -> Result<()> {
    let (tx, _rx) = mpsc::unbounded_channel();
    let data_dir = config.storage.data_dir.clone();
    let name = config.bot.name.clone();
    let dispatcher = Dispatcher::new(config, tx)?;

    println!("{} status", name);
    println!("  data dir:     {}", data_dir);
    println!("  players:      {}", dispatcher.players().count().await);
    println!("  ttt sessions: {}", dispatcher.tictactoe().session_count().await);
    println!("  sub-bots:     {}", dispatcher.subbots().count().await);
    Ok(())
}

fn init_logging(config: &Option<Config>, verbose: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level.
    let level = match verbose {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);
    if let Some(file) = config.as_ref().and_then(|c| c.logging.file.clone()) {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let sink = std::sync::Mutex::new(f);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = sink.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                writeln!(fmt, "{}", line)
            });
        }
    }
    let _ = builder.try_init();
}
