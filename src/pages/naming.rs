use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{RerunError, Result};

fn material_icon_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^:material/[a-z0-9_]+:$").expect("static icon pattern"))
}

/// Infer `(icon, name)` from a page script file name.
///
/// `03_📈_Sales_report.py` becomes `("📈", "Sales_report")`. Leading digits
/// and separators are ordering hints and are dropped; runs of `_` or spaces
/// collapse to a single `_`.
pub fn page_icon_and_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
    let rest = stem[digits.len()..].trim_start_matches(['_', ' ', '-']);
    let collapsed = collapse_separators(rest);
    let icon_and_name = if collapsed.is_empty() {
        digits
    } else {
        collapsed
    };

    let (icon, name) = extract_leading_emoji(&icon_and_name);
    (icon, name.trim_start_matches(['_', ' ']).to_string())
}

fn collapse_separators(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;
    for ch in raw.chars() {
        if ch == '_' || ch == ' ' {
            if !in_run {
                out.push('_');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out.trim().to_string()
}

/// Split a leading emoji (including modifier and joiner sequences) off `text`.
pub fn extract_leading_emoji(text: &str) -> (String, String) {
    let mut chars = text.char_indices().peekable();
    let Some((_, first)) = chars.peek().copied() else {
        return (String::new(), String::new());
    };
    if !is_emoji(first) {
        return (String::new(), text.to_string());
    }

    let mut end = first.len_utf8();
    chars.next();
    let mut joined = false;
    while let Some(&(idx, ch)) = chars.peek() {
        let accept = if joined {
            is_emoji(ch)
        } else {
            is_emoji_modifier(ch) || ch == '\u{200D}'
        };
        if !accept {
            break;
        }
        joined = ch == '\u{200D}';
        end = idx + ch.len_utf8();
        chars.next();
    }

    (text[..end].to_string(), text[end..].to_string())
}

fn is_emoji(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2300..=0x23FF | 0x2B00..=0x2BFF | 0x3030 | 0x303D
    )
}

fn is_emoji_modifier(ch: char) -> bool {
    matches!(ch as u32, 0xFE0F | 0x20E3 | 0x1F3FB..=0x1F3FF | 0xE0020..=0xE007F)
}

/// Default URL path for a title: lower-cased, whitespace runs become `-`.
pub fn url_path_from_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Icons are a single emoji or a Material Symbols reference.
pub fn validate_icon(icon: &str) -> Result<()> {
    if icon.starts_with(":material") {
        if material_icon_pattern().is_match(icon) {
            return Ok(());
        }
        return Err(RerunError::InvalidIcon(icon.to_string()));
    }

    let (emoji, rest) = extract_leading_emoji(icon);
    if !emoji.is_empty() && rest.trim().is_empty() {
        Ok(())
    } else {
        Err(RerunError::InvalidIcon(icon.to_string()))
    }
}
