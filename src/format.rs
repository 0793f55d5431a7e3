use chrono::NaiveDate;

use crate::catalog::Olympiad;
use crate::event::ParsedEvent;
use crate::policy::DueItem;

/// First line of every reminder message.
pub const REMINDER_HEADER: &str = "🔔 Напоминание:";
/// Sent instead of reminders when nothing is due and the operator asked for it.
pub const NO_REMINDERS_INFO: &str = "ℹ️ Сегодня напоминаний нет.";
/// Shown for a subscription whose date cell is empty.
pub const NOT_SCHEDULED_TEXT: &str = "ПОКА РАНО";

const ENTRY_SEPARATOR: &str = "\n\n";

/// Pack lines into chunks of at most `max_len` characters.
///
/// Lines are never split; entries inside a chunk are separated by a blank
/// line. A line longer than `max_len` becomes its own oversized chunk.
/// Chunk ends are trimmed and chunks left blank are dropped.
pub fn chunk_lines<I, S>(lines: I, max_len: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let separator_len = ENTRY_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    // Counts a separator after every pending line.
    let mut pending_len = 0usize;

    for line in lines {
        let line = line.as_ref();
        let line_len = line.chars().count();
        if !pending.is_empty() && pending_len + line_len + separator_len > max_len {
            push_chunk(&mut chunks, &pending);
            pending.clear();
            pending_len = 0;
        }
        pending.push(line.to_string());
        pending_len += line_len + separator_len;
    }
    push_chunk(&mut chunks, &pending);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, pending: &[String]) {
    let joined = pending.join(ENTRY_SEPARATOR);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split free text into chunks of at most `max_len` characters.
///
/// Text that fits is returned whole. Otherwise lines are packed in order
/// with their line breaks kept; a single line over the limit stays whole.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if !current.is_empty() && current_len + line_len > max_len {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// "сегодня", "завтра" or "осталось N дн. YYYY-MM-DD."
pub fn describe_delta(delta: i64, date: NaiveDate) -> String {
    match delta {
        0 => "сегодня".to_string(),
        1 => "завтра".to_string(),
        n => format!("осталось {n} дн. {date}."),
    }
}

pub fn reminder_line(olympiad: &Olympiad, profile: &str, item: &DueItem) -> String {
    format!(
        "🔔 {} ({}, ур. {}): {} — {}\n{}",
        olympiad.name,
        profile,
        olympiad.level,
        describe_delta(item.delta, item.event.date),
        item.event.label,
        olympiad.link
    )
}

/// Summary block for one subscription in a "my subscriptions" listing.
pub fn subscription_block(olympiad: &Olympiad, profile: &str, next: Option<&ParsedEvent>) -> String {
    let upcoming = match next {
        Some(event) => format!("{} — {}", event.date.format("%d.%m.%Y"), event.label),
        None if olympiad.date_desc.is_empty() => NOT_SCHEDULED_TEXT.to_string(),
        None => olympiad.date_desc.clone(),
    };
    format!(
        "• {}\n  Профиль: {}\n  Уровень: {}\n  Ближайшее: {}\n  Описание: {}\n  Сайт: {}",
        olympiad.name, profile, olympiad.level, upcoming, olympiad.description, olympiad.link
    )
}
