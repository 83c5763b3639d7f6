//! Shared helpers for integration tests.

use tempfile::TempDir;
use tokio::sync::mpsc;

use questbot::bot::{Dispatcher, InboundMessage, OutgoingReply};
use questbot::config::Config;

/// A dispatcher wired to a temp data dir and a capturing reply channel.
pub struct TestBot {
    pub dispatcher: Dispatcher,
    pub replies: mpsc::UnboundedReceiver<OutgoingReply>,
    _dir: TempDir,
}

/// Build a test config rooted in `dir`. Cooldowns are zeroed so scripted
/// command sequences run back to back; tests that exercise the gate override
/// this.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_string_lossy().into_owned();
    config.bot.owners = vec!["owner@local".to_string()];
    config.spam.global_cooldown_ms = 0;
    config.spam.default_command_cooldown_ms = 0;
    config.spam.command_cooldowns_ms.clear();
    config
}

#[allow(dead_code)] // Not every test binary customizes the config.
pub fn bot_with(config_fn: impl FnOnce(&mut Config)) -> TestBot {
    let dir = TempDir::new().expect("tempdir");
    let mut config = test_config(&dir);
    config_fn(&mut config);
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(config, tx).expect("dispatcher");
    TestBot {
        dispatcher,
        replies: rx,
        _dir: dir,
    }
}

#[allow(dead_code)] // Not every test binary uses the default bot.
pub fn bot() -> TestBot {
    bot_with(|_| {})
}

impl TestBot {
    /// Send one message from `sender` and return every reply it produced.
    pub async fn send(&mut self, sender: &str, body: &str) -> Vec<String> {
        self.dispatcher
            .handle_message(InboundMessage {
                sender: sender.to_string(),
                chat: "room@chat".to_string(),
                body: body.to_string(),
                mentions: Vec::new(),
            })
            .await;
        self.drain()
    }

    pub fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(reply) = self.replies.try_recv() {
            out.push(reply.text);
        }
        out
    }

    /// Send and expect exactly one reply.
    pub async fn send_one(&mut self, sender: &str, body: &str) -> String {
        let mut replies = self.send(sender, body).await;
        assert_eq!(
            replies.len(),
            1,
            "expected one reply to {:?}, got {:?}",
            body,
            replies
        );
        replies.remove(0)
    }
}
