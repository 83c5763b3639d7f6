//! Logging helpers: keep user-supplied text single-line in logs and format
//! wait times for decline replies.

/// Escape a string for single-line logging, truncating long previews.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 200;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Render a millisecond wait as a short human figure ("0.5s", "3s", "2m 10s").
pub fn human_wait_ms(ms: i64) -> String {
    let ms = ms.max(0);
    if ms < 1000 {
        return format!("{:.1}s", ms as f64 / 1000.0);
    }
    let secs = ms / 1000;
    if secs < 60 {
        return format!("{}s", secs);
    }
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Render a second count as minutes/hours for ban notices.
pub fn human_wait_secs(secs: i64) -> String {
    human_wait_ms(secs.saturating_mul(1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_newlines() {
        assert_eq!(escape_log("a\nb\tc"), "a\\nb\\tc");
    }

    #[test]
    fn waits_format_by_magnitude() {
        assert_eq!(human_wait_ms(500), "0.5s");
        assert_eq!(human_wait_ms(3000), "3s");
        assert_eq!(human_wait_ms(130_000), "2m 10s");
        assert_eq!(human_wait_secs(3600), "60m 0s");
    }
}
