use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Label used when an entry carries no text after `/`.
pub const DEFAULT_LABEL: &str = "событие";
/// Label used for the start of a dash range without an explicit label.
pub const RANGE_START_LABEL: &str = "начало";

/// One upcoming date taken from a cell, with its (possibly merged) label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub date: NaiveDate,
    pub label: String,
}

impl ParsedEvent {
    pub fn new(date: NaiveDate, label: impl Into<String>) -> Self {
        Self {
            date,
            label: label.into(),
        }
    }
}

/// Ascending events of one cell, at most one per date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventList {
    events: Vec<ParsedEvent>,
}

impl EventList {
    /// Merge same-date entries and order the result by date.
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = ParsedEvent>,
    {
        Self::from_merged(merge_events(events))
    }

    /// Chronological view of an already merged date → label map.
    pub fn from_merged(merged: BTreeMap<NaiveDate, String>) -> Self {
        let events = merged
            .into_iter()
            .map(|(date, label)| ParsedEvent { date, label })
            .collect();
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The nearest upcoming event.
    pub fn first(&self) -> Option<&ParsedEvent> {
        self.events.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParsedEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[ParsedEvent] {
        &self.events
    }
}

impl IntoIterator for EventList {
    type Item = ParsedEvent;
    type IntoIter = std::vec::IntoIter<ParsedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventList {
    type Item = &'a ParsedEvent;
    type IntoIter = std::slice::Iter<'a, ParsedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Collapse entries sharing a date into one label.
///
/// The first label seen for a date wins its slot; later labels are appended
/// after `"; "` unless the accumulated label already contains them.
pub fn merge_events<I>(events: I) -> BTreeMap<NaiveDate, String>
where
    I: IntoIterator<Item = ParsedEvent>,
{
    let mut merged: BTreeMap<NaiveDate, String> = BTreeMap::new();
    for event in events {
        match merged.entry(event.date) {
            Entry::Vacant(slot) => {
                slot.insert(event.label);
            }
            Entry::Occupied(mut slot) => {
                let label = slot.get_mut();
                if !label.contains(event.label.as_str()) {
                    label.push_str("; ");
                    label.push_str(&event.label);
                }
            }
        }
    }
    merged
}
