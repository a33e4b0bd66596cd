use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{RerunError, Result};

/// How often a fragment asks to be replayed.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvery {
    Seconds(f64),
    Duration(Duration),
    /// Human duration such as `"1 minute"` or `"1h 30m"`.
    Text(String),
}

impl RunEvery {
    /// Interval in seconds. Zero means "never"; negative or unparsable values
    /// are configuration errors.
    pub fn to_seconds(&self) -> Result<f64> {
        let seconds = match self {
            RunEvery::Seconds(seconds) => *seconds,
            RunEvery::Duration(duration) => duration.as_secs_f64(),
            RunEvery::Text(text) => parse_interval(text)?,
        };
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(RerunError::InvalidInterval(seconds.to_string()));
        }
        Ok(seconds)
    }
}

impl From<f64> for RunEvery {
    fn from(seconds: f64) -> Self {
        RunEvery::Seconds(seconds)
    }
}

impl From<u32> for RunEvery {
    fn from(seconds: u32) -> Self {
        RunEvery::Seconds(f64::from(seconds))
    }
}

impl From<Duration> for RunEvery {
    fn from(duration: Duration) -> Self {
        RunEvery::Duration(duration)
    }
}

impl From<&str> for RunEvery {
    fn from(text: &str) -> Self {
        RunEvery::Text(text.to_string())
    }
}

impl From<String> for RunEvery {
    fn from(text: String) -> Self {
        RunEvery::Text(text)
    }
}

fn term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([a-z]+)").expect("static interval pattern")
    })
}

fn unit_seconds(unit: &str) -> Option<f64> {
    let seconds = match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "d" | "day" | "days" => 86_400.0,
        "w" | "wk" | "wks" | "week" | "weeks" => 604_800.0,
        _ => return None,
    };
    Some(seconds)
}

/// Parse a human duration into seconds. A bare number is taken as seconds;
/// otherwise the text is a sequence of `<number><unit>` terms, optionally
/// separated by whitespace or commas.
pub fn parse_interval(text: &str) -> Result<f64> {
    let invalid = || RerunError::InvalidInterval(text.to_string());
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(seconds);
    }

    let mut total = 0.0;
    let mut cursor = 0;
    for captures in term_pattern().captures_iter(trimmed) {
        let whole = captures.get(0).ok_or_else(invalid)?;
        if !is_separator(&trimmed[cursor..whole.start()]) {
            return Err(invalid());
        }
        let amount: f64 = captures[1].parse().map_err(|_| invalid())?;
        let unit = unit_seconds(&captures[2]).ok_or_else(invalid)?;
        total += amount * unit;
        cursor = whole.end();
    }

    if cursor == 0 || !is_separator(&trimmed[cursor..]) {
        return Err(invalid());
    }
    Ok(total)
}

fn is_separator(gap: &str) -> bool {
    gap.chars().all(|c| c.is_whitespace() || c == ',')
}
