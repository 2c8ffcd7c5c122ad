//! Work-log durations in tracker notation ("1w 2d 3h 30m").
//!
//! A working day is 8 hours and a working week is 5 days.

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 8 * HOUR;
const WEEK: u64 = 5 * DAY;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration component '{0}' (expected e.g. 2h, 30m, 1d)")]
    InvalidComponent(String),
}

/// Parse a duration like `"1h 30m"` or `"1h30m"` into seconds.
pub fn parse_work_duration(input: &str) -> Result<u64, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total = 0u64;
    for part in trimmed.split_whitespace() {
        let invalid = || DurationError::InvalidComponent(part.to_string());
        let mut num_buf = String::new();
        for ch in part.chars() {
            if ch.is_ascii_digit() {
                num_buf.push(ch);
                continue;
            }
            let amount: u64 = num_buf.parse().map_err(|_| invalid())?;
            num_buf.clear();
            let scale = match ch.to_ascii_lowercase() {
                'w' => WEEK,
                'd' => DAY,
                'h' => HOUR,
                'm' => MINUTE,
                's' => 1,
                _ => return Err(invalid()),
            };
            total = total.saturating_add(amount.saturating_mul(scale));
        }
        // Trailing digits with no unit
        if !num_buf.is_empty() {
            return Err(invalid());
        }
    }
    Ok(total)
}

/// Render seconds back into tracker notation. Zero renders as `"0m"`.
pub fn format_work_duration(seconds: u64) -> String {
    let mut rest = seconds;
    let mut parts = Vec::new();
    for (scale, suffix) in [(WEEK, "w"), (DAY, "d"), (HOUR, "h"), (MINUTE, "m")] {
        let n = rest / scale;
        if n > 0 {
            parts.push(format!("{n}{suffix}"));
            rest %= scale;
        }
    }
    if rest > 0 {
        parts.push(format!("{rest}s"));
    }
    if parts.is_empty() {
        "0m".to_string()
    } else {
        parts.join(" ")
    }
}
