use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::calendar::days_until;
use crate::event::{EventList, ParsedEvent};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_MILESTONE_DAYS: [i64; 11] = [60, 30, 21, 14, 10, 7, 5, 3, 2, 1, 0];

/// Which day deltas trigger a reminder.
///
/// Values are taken as configured; a negative window or milestone simply
/// never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Policy {
    /// Every day while `0 <= delta <= max_days`.
    Window { max_days: i64 },
    /// Only on the listed deltas.
    Milestones { days: BTreeSet<i64> },
}

impl Default for Policy {
    fn default() -> Self {
        Self::milestones(DEFAULT_MILESTONE_DAYS)
    }
}

impl Policy {
    pub fn window(max_days: i64) -> Self {
        Self::Window { max_days }
    }

    pub fn milestones<I>(days: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        Self::Milestones {
            days: days.into_iter().collect(),
        }
    }

    pub fn admits(&self, delta: i64) -> bool {
        match self {
            Policy::Window { max_days } => 0 <= delta && delta <= *max_days,
            Policy::Milestones { days } => days.contains(&delta),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Window { max_days } => write!(f, "window 0..={max_days} days"),
            Policy::Milestones { days } => {
                let list = days
                    .iter()
                    .rev()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "milestones {list}")
            }
        }
    }
}

/// An event that should be announced today, with its distance in days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueItem {
    pub event: ParsedEvent,
    pub delta: i64,
}

pub fn is_due(event: &ParsedEvent, today: NaiveDate, policy: &Policy) -> bool {
    policy.admits(days_until(event.date, today))
}

/// Events of `events` due today, each judged on its own.
pub fn due_items(events: &EventList, today: NaiveDate, policy: &Policy) -> Vec<DueItem> {
    events
        .iter()
        .filter_map(|event| {
            let delta = days_until(event.date, today);
            policy.admits(delta).then(|| DueItem {
                event: event.clone(),
                delta,
            })
        })
        .collect()
}
