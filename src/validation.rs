//! Argument validation helpers shared by the dispatcher and the API facade.

use crate::game::GameError;

/// Parse a quantity argument. Missing arguments default to 1; anything else
/// must be a positive integer.
pub fn parse_quantity(arg: Option<&str>) -> Result<u32, GameError> {
    match arg {
        None => Ok(1),
        Some(raw) => match raw.parse::<u32>() {
            Ok(qty) if qty >= 1 => Ok(qty),
            _ => Err(GameError::Validation(format!(
                "'{}' is not a valid quantity",
                raw
            ))),
        },
    }
}

/// Parse a board position argument (1..=9).
pub fn parse_position(arg: Option<&str>) -> Result<u32, GameError> {
    let raw = arg.ok_or_else(|| GameError::Validation("position required (1-9)".to_string()))?;
    match raw.parse::<u32>() {
        Ok(pos) if (1..=9).contains(&pos) => Ok(pos),
        _ => Err(GameError::Validation(format!(
            "'{}' is not a position between 1 and 9",
            raw
        ))),
    }
}

/// Parse a non-negative gold amount (wagers, grants).
pub fn parse_amount(arg: Option<&str>) -> Result<u64, GameError> {
    match arg {
        None => Ok(0),
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            GameError::Validation(format!("'{}' is not a valid amount", raw))
        }),
    }
}

/// Resolve a target-user argument. A mention always wins; otherwise the raw
/// token is accepted as an identity if it is non-empty after trimming.
pub fn resolve_user_ref(arg: Option<&str>, mentions: &[String]) -> Result<String, GameError> {
    if let Some(first) = mentions.first() {
        return Ok(first.clone());
    }
    let token = arg.map(str::trim).unwrap_or("");
    let token = token.trim_start_matches('@');
    if token.is_empty() {
        return Err(GameError::Validation(
            "target user required (mention or id)".to_string(),
        ));
    }
    Ok(token.to_string())
}
