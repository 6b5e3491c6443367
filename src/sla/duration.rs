//! Human-readable duration strings for SLA accounting.
//!
//! Durations are emitted as `Nd Nh Nm Ns` with zero units omitted (`0s`
//! when everything is zero), and re-parsed by summing whitespace-separated
//! tokens in any order.

/// Format a second count as `Nd Nh Nm Ns`, omitting zero units.
pub fn format_duration_full(seconds: i64) -> String {
    let days = seconds / 86_400;
    let mut rem = seconds % 86_400;
    let hours = rem / 3_600;
    rem %= 3_600;
    let minutes = rem / 60;
    let secs = rem % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }
    parts.join(" ")
}

/// Sum a duration string back to seconds. Tokens may appear in any order;
/// unrecognized tokens are skipped.
pub fn parse_duration_secs(s: &str) -> i64 {
    let mut total = 0;
    for token in s.split_whitespace() {
        let (multiplier, digits) = if let Some(d) = token.strip_suffix('d') {
            (86_400, d)
        } else if let Some(d) = token.strip_suffix('h') {
            (3_600, d)
        } else if let Some(d) = token.strip_suffix('m') {
            (60, d)
        } else if let Some(d) = token.strip_suffix('s') {
            (1, d)
        } else {
            continue;
        };
        if let Ok(value) = digits.parse::<i64>() {
            total += multiplier * value;
        }
    }
    total
}
