use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::event::EventList;
use crate::parser::parse_cell;

/// Shown for a missing level, description, link or profile.
pub const PLACEHOLDER: &str = "—";

/// One catalog row: an olympiad with its profiles and its raw date cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Olympiad {
    pub id: String,
    pub name: String,
    pub profiles: Vec<String>,
    /// Free-form date text exactly as written in the sheet.
    pub date_desc: String,
    pub level: String,
    pub description: String,
    pub link: String,
}

impl Olympiad {
    pub fn new(id: impl Into<String>, profiles: Vec<String>, date_desc: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            profiles: if profiles.is_empty() {
                vec![PLACEHOLDER.to_string()]
            } else {
                profiles
            },
            date_desc: date_desc.into(),
            level: PLACEHOLDER.to_string(),
            description: PLACEHOLDER.to_string(),
            link: PLACEHOLDER.to_string(),
        }
    }

    /// Split a profile cell on `;`, `,` and `/`.
    pub fn split_profiles(raw: &str) -> Vec<String> {
        let profiles: Vec<String> = raw
            .split([';', ',', '/'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if profiles.is_empty() {
            vec![PLACEHOLDER.to_string()]
        } else {
            profiles
        }
    }

    /// Upcoming events, parsed from the raw cell on every call.
    pub fn events(&self, today: NaiveDate) -> EventList {
        parse_cell(&self.date_desc, today)
    }

    pub fn has_profile(&self, profile: &str) -> bool {
        self.profiles.iter().any(|p| p == profile)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    olympiads: Vec<Olympiad>,
    index: HashMap<(String, String), usize>,
}

impl Catalog {
    pub fn new(olympiads: Vec<Olympiad>) -> Self {
        let mut index = HashMap::new();
        for (pos, olympiad) in olympiads.iter().enumerate() {
            for profile in &olympiad.profiles {
                // Later rows shadow earlier ones with the same key.
                index.insert((olympiad.id.clone(), profile.clone()), pos);
            }
        }
        Self { olympiads, index }
    }

    pub fn olympiads(&self) -> &[Olympiad] {
        &self.olympiads
    }

    pub fn len(&self) -> usize {
        self.olympiads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.olympiads.is_empty()
    }

    pub fn lookup(&self, olympiad_id: &str, profile: &str) -> Option<&Olympiad> {
        self.index
            .get(&(olympiad_id.to_string(), profile.to_string()))
            .map(|&pos| &self.olympiads[pos])
    }

    /// Distinct profiles, sorted.
    pub fn profiles(&self) -> Vec<String> {
        self.olympiads
            .iter()
            .flat_map(|o| o.profiles.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn by_profile(&self, profile: &str) -> Vec<&Olympiad> {
        self.olympiads
            .iter()
            .filter(|o| o.has_profile(profile))
            .collect()
    }
}
