pub mod classify;
pub mod split;

use chrono::NaiveDate;
use tracing::debug;

use crate::event::{EventList, ParsedEvent};

pub use classify::{Candidate, DayMonth, EntryShape, classify_entry, extract_event};
pub use split::{is_unscheduled, split_cell};

/// All events of a cell that fall on or after `today`, merged per date and
/// in chronological order.
///
/// Never fails: unreadable fragments are skipped and an unusable cell gives
/// an empty list.
pub fn parse_cell(cell: &str, today: NaiveDate) -> EventList {
    let entries = split_cell(cell);
    let events = EventList::from_events(
        entries
            .iter()
            .filter_map(|entry| extract_event(entry, today)),
    );
    debug!(
        entries = entries.len(),
        events = events.len(),
        %today,
        "parsed date cell"
    );
    events
}

/// Nearest upcoming event of a cell.
pub fn next_upcoming(cell: &str, today: NaiveDate) -> Option<ParsedEvent> {
    parse_cell(cell, today).into_iter().next()
}
