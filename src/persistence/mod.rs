use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// A user following one profile of one olympiad.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: i64,
    pub olympiad_id: String,
    pub olympiad_name: String,
    pub profile: String,
}

impl Subscription {
    pub fn new(user_id: i64, olympiad_id: impl Into<String>, profile: impl Into<String>) -> Self {
        let olympiad_id = olympiad_id.into();
        Self {
            user_id,
            olympiad_name: olympiad_id.clone(),
            olympiad_id,
            profile: profile.into(),
        }
    }

    /// Uniqueness key: one row per user, olympiad and profile.
    pub fn key(&self) -> (i64, &str, &str) {
        (self.user_id, &self.olympiad_id, &self.profile)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: String,
    pub joined_at: DateTime<Utc>,
}

pub trait SubscriptionStore {
    /// Returns `false` when the subscription already existed.
    fn add_subscription(&self, subscription: &Subscription) -> PersistenceResult<bool>;
    fn remove_subscription(
        &self,
        user_id: i64,
        olympiad_id: &str,
        profile: &str,
    ) -> PersistenceResult<bool>;
    /// Drop every subscription a user holds under one profile; returns how many rows went.
    fn remove_profile(&self, user_id: i64, profile: &str) -> PersistenceResult<usize>;
    fn subscriptions_for_user(&self, user_id: i64) -> PersistenceResult<Vec<Subscription>>;
    fn all_subscriptions(&self) -> PersistenceResult<Vec<Subscription>>;
    /// Insert the user or refresh their names; `joined_at` is kept from the first insert.
    fn upsert_user(&self, user: &UserRecord) -> PersistenceResult<()>;
    /// Everyone known to the store: registered users and subscribers.
    fn all_user_ids(&self) -> PersistenceResult<BTreeSet<i64>>;
}

pub fn validate_subscription(subscription: &Subscription) -> PersistenceResult<()> {
    if subscription.olympiad_id.trim().is_empty() {
        return Err(PersistenceError::InvalidData(format!(
            "subscription of user {} has an empty olympiad id",
            subscription.user_id
        )));
    }
    if subscription.profile.trim().is_empty() {
        return Err(PersistenceError::InvalidData(format!(
            "subscription of user {} to '{}' has an empty profile",
            subscription.user_id, subscription.olympiad_id
        )));
    }
    Ok(())
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    SubscriptionBook, load_catalog_from_csv, load_subscriptions_from_csv,
    load_subscriptions_from_json, read_catalog, save_subscriptions_to_csv,
    save_subscriptions_to_json,
};
