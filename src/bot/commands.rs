//! The authoritative command table.
//!
//! Every command the bot understands is resolved here and nowhere else; the
//! game engine, the mini-game, and the sub-bot registry expose operations, not
//! parsers. Matching is case-insensitive and unknown names resolve to `None`
//! (the dispatcher stays silent for those).

/// A message split into prefix, command name, and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub prefix: String,
    pub name: String,
    pub args: Vec<String>,
}

/// Split `body` against the configured prefix set.
///
/// Non-empty prefixes are tried in order; an empty-string prefix acts as a
/// catch-all and only applies when it is explicitly configured.
pub fn parse_message(body: &str, prefixes: &[String]) -> Option<ParsedCommand> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let prefix = prefixes
        .iter()
        .find(|p| !p.is_empty() && body.starts_with(p.as_str()))
        .cloned()
        .or_else(|| prefixes.iter().find(|p| p.is_empty()).cloned())?;

    let rest = body[prefix.len()..].trim();
    let mut parts = rest.split_whitespace();
    let name = parts.next()?.to_lowercase();
    let args: Vec<String> = parts.map(str::to_string).collect();
    Some(ParsedCommand { prefix, name, args })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // Built-ins
    Help,
    Leaderboard,
    // Game engine
    Profile,
    Stats,
    Hunt,
    Fish,
    Battle,
    Shop,
    Buy,
    Sell,
    Inventory,
    Use,
    // Mini-game
    Ttt,
    // Sub-bots
    Jadibot,
    // Owner-only moderation
    Warn,
    Unwarn,
    Unban,
    SpamStats,
    // Owner-only API key management
    GenApiKey,
    ListApiKeys,
    RevokeApiKey,
}

impl Command {
    /// Resolve a lowercased command name. Aliases collapse onto one canonical
    /// command; names claimed by an earlier group are never re-resolved by a
    /// later one.
    pub fn resolve(name: &str) -> Option<Command> {
        let cmd = match name {
            "help" | "menu" => Command::Help,
            "leaderboard" | "top" => Command::Leaderboard,
            "profile" => Command::Profile,
            "stats" => Command::Stats,
            "hunt" => Command::Hunt,
            "fish" | "fishing" => Command::Fish,
            "battle" => Command::Battle,
            "shop" => Command::Shop,
            "buy" => Command::Buy,
            "sell" => Command::Sell,
            "inventory" | "inv" => Command::Inventory,
            "use" => Command::Use,
            "ttt" | "tictactoe" => Command::Ttt,
            "jadibot" | "subbot" => Command::Jadibot,
            "warn" => Command::Warn,
            "unwarn" => Command::Unwarn,
            "unban" => Command::Unban,
            "spamstats" => Command::SpamStats,
            "genapikey" | "generateapikey" => Command::GenApiKey,
            "listapikeys" => Command::ListApiKeys,
            "revokeapikey" => Command::RevokeApiKey,
            _ => return None,
        };
        Some(cmd)
    }

    /// Canonical name used for cooldown bookkeeping and logging.
    pub fn canonical(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Leaderboard => "leaderboard",
            Command::Profile => "profile",
            Command::Stats => "stats",
            Command::Hunt => "hunt",
            Command::Fish => "fish",
            Command::Battle => "battle",
            Command::Shop => "shop",
            Command::Buy => "buy",
            Command::Sell => "sell",
            Command::Inventory => "inventory",
            Command::Use => "use",
            Command::Ttt => "ttt",
            Command::Jadibot => "jadibot",
            Command::Warn => "warn",
            Command::Unwarn => "unwarn",
            Command::Unban => "unban",
            Command::SpamStats => "spamstats",
            Command::GenApiKey => "genapikey",
            Command::ListApiKeys => "listapikeys",
            Command::RevokeApiKey => "revokeapikey",
        }
    }

    /// Whether only configured owners may run this command.
    pub fn owner_only(&self) -> bool {
        matches!(
            self,
            Command::Warn
                | Command::Unwarn
                | Command::Unban
                | Command::SpamStats
                | Command::GenApiKey
                | Command::ListApiKeys
                | Command::RevokeApiKey
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_prefix_command_args() {
        let parsed = parse_message("!buy potion 2", &prefixes(&["!"])).expect("parsed");
        assert_eq!(parsed.prefix, "!");
        assert_eq!(parsed.name, "buy");
        assert_eq!(parsed.args, vec!["potion".to_string(), "2".to_string()]);
    }

    #[test]
    fn unprefixed_text_is_ignored_without_catch_all() {
        assert!(parse_message("hello there", &prefixes(&["!"])).is_none());
        assert!(parse_message("", &prefixes(&["!"])).is_none());
        assert!(parse_message("!", &prefixes(&["!"])).is_none());
    }

    #[test]
    fn empty_prefix_catch_all_must_be_explicit() {
        let parsed = parse_message("profile", &prefixes(&["!", ""])).expect("catch-all");
        assert_eq!(parsed.prefix, "");
        assert_eq!(parsed.name, "profile");
    }

    #[test]
    fn first_matching_prefix_wins() {
        let parsed = parse_message(".hunt", &prefixes(&["!", "."])).expect("parsed");
        assert_eq!(parsed.prefix, ".");
        assert_eq!(parsed.name, "hunt");
    }

    #[test]
    fn command_names_are_case_insensitive() {
        let parsed = parse_message("!HUNT", &prefixes(&["!"])).expect("parsed");
        assert_eq!(parsed.name, "hunt");
        assert_eq!(Command::resolve(&parsed.name), Some(Command::Hunt));
    }

    #[test]
    fn aliases_collapse_to_canonical_commands() {
        assert_eq!(Command::resolve("menu"), Some(Command::Help));
        assert_eq!(Command::resolve("inv"), Some(Command::Inventory));
        assert_eq!(Command::resolve("fishing"), Some(Command::Fish));
        assert_eq!(Command::resolve("tictactoe"), Some(Command::Ttt));
        assert_eq!(Command::resolve("subbot"), Some(Command::Jadibot));
        assert_eq!(Command::resolve("nonsense"), None);
    }

    #[test]
    fn owner_only_commands_are_flagged() {
        assert!(Command::Warn.owner_only());
        assert!(Command::GenApiKey.owner_only());
        assert!(!Command::Hunt.owner_only());
        assert!(!Command::Ttt.owner_only());
    }

    #[test]
    fn cooldown_keys_match_canonical_names() {
        assert_eq!(Command::Fish.canonical(), "fish");
        assert_eq!(Command::resolve("fishing").unwrap().canonical(), "fish");
    }
}
