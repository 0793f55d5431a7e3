use once_cell::sync::Lazy;
use regex::Regex;

/// Cells starting with this word (any case) are "not scheduled yet".
pub const UNSCHEDULED_PREFIX: &str = "пока";

// Carriage returns count as line breaks.
static CHUNK_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n;]+").expect("Invalid chunk separator regex"));

// A comma followed by this is part of a date list, not an entry break.
static DAY_MONTH_AHEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[0-9]{1,2}\.[0-9]{1,2}").expect("Invalid day.month lookahead regex"));

pub fn is_unscheduled(text: &str) -> bool {
    text.trim_start()
        .to_lowercase()
        .starts_with(UNSCHEDULED_PREFIX)
}

/// Break a raw cell into candidate entries, in the order they appear.
pub fn split_cell(cell: &str) -> Vec<&str> {
    let text = cell.trim();
    if text.is_empty() || is_unscheduled(text) {
        return Vec::new();
    }

    CHUNK_SEPARATOR
        .split(text)
        .flat_map(split_on_commas)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

fn split_on_commas(chunk: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, _) in chunk.match_indices(',') {
        if DAY_MONTH_AHEAD.is_match(&chunk[idx + 1..]) {
            continue;
        }
        parts.push(&chunk[start..idx]);
        start = idx + 1;
    }
    parts.push(&chunk[start..]);
    parts
}
