//! Shape detection and date extraction for a single entry.
//!
//! An entry is one of three shapes, checked in this order:
//! - `с 12.09 по 14.09` (phrase range): the first `D.M[.Y]` anywhere in the
//!   expression is the event date.
//! - `12.09–14.09.2025` (dash range): only the left-hand side of the first
//!   dash is read; the event is labelled "начало" unless a label is given.
//! - anything else (single date): the first `D.M[.Y]` in the expression, or
//!   in the whole entry when the expression has none.
//!
//! Text after the first `/` is the label in every shape.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::calendar;
use crate::event::{DEFAULT_LABEL, ParsedEvent, RANGE_START_LABEL};

static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{1,2})\.([0-9]{1,2})(?:\.([0-9]{2,4}))?").expect("Invalid day.month regex")
});

static RANGE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[–—-]\s*").expect("Invalid range separator regex"));

const PHRASE_FROM: &str = "с ";
const PHRASE_TO: &str = " по ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryShape {
    PhraseRange,
    DashRange,
    SingleDate,
}

impl EntryShape {
    fn default_label(self) -> &'static str {
        match self {
            EntryShape::DashRange => RANGE_START_LABEL,
            EntryShape::PhraseRange | EntryShape::SingleDate => DEFAULT_LABEL,
        }
    }
}

/// An entry split into its date expression and optional explicit label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub entry: &'a str,
    pub expression: &'a str,
    /// Trimmed text after `/`; `None` when absent or blank.
    pub label: Option<&'a str>,
}

impl<'a> Candidate<'a> {
    pub fn new(entry: &'a str) -> Self {
        match entry.split_once('/') {
            Some((expression, label)) => {
                let label = label.trim();
                Self {
                    entry,
                    expression,
                    label: (!label.is_empty()).then_some(label),
                }
            }
            None => Self {
                entry,
                expression: entry,
                label: None,
            },
        }
    }
}

/// A `D.M[.Y]` match before any calendar validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayMonth {
    pub day: u32,
    pub month: u32,
    /// Full year; a two-digit group is already shifted into the 2000s.
    pub year: Option<i32>,
}

impl DayMonth {
    /// First `D.M[.Y]` pattern in `text`.
    pub fn find(text: &str) -> Option<Self> {
        let caps = DAY_MONTH.captures(text)?;
        let day = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let year = match caps.get(3) {
            Some(year) => Some(calendar::expand_year(year.as_str())?),
            None => None,
        };
        Some(Self { day, month, year })
    }

    /// Concrete calendar date, or `None` when the fields name no real day.
    pub fn resolve(self, today: NaiveDate) -> Option<NaiveDate> {
        let year = calendar::normalize_year(self.year, self.day, self.month, today);
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

pub fn classify_entry(expression: &str) -> EntryShape {
    let lowered = expression.to_lowercase();
    if lowered.contains(PHRASE_FROM) && lowered.contains(PHRASE_TO) {
        EntryShape::PhraseRange
    } else if RANGE_SEPARATOR.is_match(expression) {
        EntryShape::DashRange
    } else {
        EntryShape::SingleDate
    }
}

fn locate(candidate: &Candidate<'_>, shape: EntryShape) -> Option<DayMonth> {
    match shape {
        EntryShape::PhraseRange => DayMonth::find(candidate.expression),
        EntryShape::DashRange => RANGE_SEPARATOR
            .split(candidate.expression)
            .next()
            .and_then(DayMonth::find),
        EntryShape::SingleDate => {
            DayMonth::find(candidate.expression).or_else(|| DayMonth::find(candidate.entry))
        }
    }
}

/// The upcoming event named by one entry, if any.
///
/// Entries without a date pattern, with an impossible date, or dated before
/// `today` yield `None`.
pub fn extract_event(entry: &str, today: NaiveDate) -> Option<ParsedEvent> {
    let candidate = Candidate::new(entry);
    let shape = classify_entry(candidate.expression);

    let Some(day_month) = locate(&candidate, shape) else {
        trace!(entry, ?shape, "no day.month pattern, skipping entry");
        return None;
    };
    let Some(date) = day_month.resolve(today) else {
        trace!(entry, ?day_month, "impossible calendar date, skipping entry");
        return None;
    };
    if date < today {
        return None;
    }

    let label = candidate.label.unwrap_or(shape.default_label());
    Some(ParsedEvent::new(date, label))
}
