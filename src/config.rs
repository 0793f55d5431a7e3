use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::calendar::{local_today, next_daily_run};
use crate::policy::Policy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown time zone '{0}'")]
    UnknownTimezone(String),
}

fn default_max_chunk_length() -> usize {
    4000
}

fn default_timezone() -> Tz {
    chrono_tz::Europe::Moscow
}

fn default_notify_time() -> String {
    "12:00".to_string()
}

fn fallback_notify_time() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()
}

/// Runtime settings for evaluating and delivering reminders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default)]
    pub policy: Policy,
    #[serde(default = "default_max_chunk_length")]
    pub max_chunk_length: usize,
    #[serde(default = "default_timezone", with = "tz_name")]
    pub timezone: Tz,
    /// Local `HH:MM` of the daily sweep.
    #[serde(default = "default_notify_time")]
    pub daily_notify_time: String,
    /// Tell users with nothing due that there are no reminders today.
    #[serde(default)]
    pub send_empty_info: bool,
    /// CSV export of the olympiad sheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
    /// SQLite subscription database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            max_chunk_length: default_max_chunk_length(),
            timezone: default_timezone(),
            daily_notify_time: default_notify_time(),
            send_empty_info: false,
            catalog_path: None,
            database_path: None,
        }
    }
}

impl ReminderConfig {
    /// Wall-clock date in the configured zone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        local_today(now, self.timezone)
    }

    /// Parsed `daily_notify_time`; anything malformed means 12:00.
    pub fn notify_time(&self) -> NaiveTime {
        parse_daily_time(&self.daily_notify_time).unwrap_or_else(fallback_notify_time)
    }

    pub fn next_notify_at(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        next_daily_run(now.with_timezone(&self.timezone), self.notify_time())
    }

    pub fn set_timezone(&mut self, name: &str) -> Result<(), ConfigError> {
        self.timezone = name
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(name.to_string()))?;
        Ok(())
    }
}

pub fn parse_daily_time(value: &str) -> Option<NaiveTime> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let hours = hours.trim().parse().ok()?;
    let minutes = minutes.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ReminderConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config = serde_json::from_str(&contents)?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(config: &ReminderConfig, path: P) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}

mod tz_name {
    use chrono_tz::Tz;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tz, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse::<Tz>()
            .map_err(|_| de::Error::custom(format!("unknown time zone '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_json_gives_defaults() {
        let config: ReminderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ReminderConfig::default());
        assert_eq!(config.max_chunk_length, 4000);
        assert_eq!(config.timezone, chrono_tz::Europe::Moscow);
    }

    #[test]
    fn unknown_timezone_fails_to_parse() {
        let err = serde_json::from_str::<ReminderConfig>(r#"{"timezone":"Mars/Olympus"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));

        let mut config = ReminderConfig::default();
        assert!(matches!(
            config.set_timezone("Nowhere"),
            Err(ConfigError::UnknownTimezone(_))
        ));
        config.set_timezone("Asia/Yekaterinburg").unwrap();
        assert_eq!(config.timezone.name(), "Asia/Yekaterinburg");
    }

    #[test]
    fn notify_time_parses_or_falls_back_to_noon() {
        assert_eq!(parse_daily_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_daily_time("25:00"), None);
        assert_eq!(parse_daily_time("noon"), None);

        let config = ReminderConfig {
            daily_notify_time: "later".into(),
            ..ReminderConfig::default()
        };
        assert_eq!(config.notify_time(), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }

    #[test]
    fn today_and_next_run_follow_configured_zone() {
        let config = ReminderConfig {
            daily_notify_time: "08:15".into(),
            ..ReminderConfig::default()
        };
        // 06:00 UTC is 09:00 in Moscow: today's 08:15 slot has passed.
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
        assert_eq!(config.today(now), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        let next = config.next_notify_at(now);
        assert_eq!(
            next.naive_local(),
            NaiveDate::from_ymd_opt(2025, 3, 11)
                .unwrap()
                .and_hms_opt(8, 15, 0)
                .unwrap()
        );
    }
}
