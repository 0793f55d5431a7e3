use super::{
    PersistenceError, PersistenceResult, Subscription, SubscriptionStore, UserRecord,
    validate_subscription,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteSubscriptionStore {
    connection: Mutex<Connection>,
}

impl SqliteSubscriptionStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                user_id       INTEGER NOT NULL,
                olympiad_id   TEXT NOT NULL,
                olympiad_name TEXT NOT NULL,
                profile       TEXT NOT NULL,
                UNIQUE(user_id, olympiad_id, profile)
            );
            CREATE TABLE IF NOT EXISTS users (
                user_id    INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL DEFAULT '',
                username   TEXT NOT NULL DEFAULT '',
                joined_at  TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| PersistenceError::LockPoisoned)
    }

    pub fn user(&self, user_id: i64) -> PersistenceResult<Option<UserRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, first_name, username, joined_at FROM users WHERE user_id = ?1",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let joined_at: String = row.get(3)?;
        let joined_at = DateTime::parse_from_rfc3339(&joined_at)
            .map_err(|err| {
                PersistenceError::InvalidData(format!("bad joined_at for user {user_id}: {err}"))
            })?
            .with_timezone(&Utc);
        Ok(Some(UserRecord {
            user_id: row.get(0)?,
            first_name: row.get(1)?,
            username: row.get(2)?,
            joined_at,
        }))
    }

    fn query_subscriptions(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> PersistenceResult<Vec<Subscription>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(Subscription {
                user_id: row.get(0)?,
                olympiad_id: row.get(1)?,
                olympiad_name: row.get(2)?,
                profile: row.get(3)?,
            })
        })?;

        let mut subscriptions = Vec::new();
        for row in rows {
            subscriptions.push(row?);
        }
        Ok(subscriptions)
    }
}

impl SubscriptionStore for SqliteSubscriptionStore {
    fn add_subscription(&self, subscription: &Subscription) -> PersistenceResult<bool> {
        validate_subscription(subscription)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO subscriptions (user_id, olympiad_id, olympiad_name, profile)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                subscription.user_id,
                subscription.olympiad_id,
                subscription.olympiad_name,
                subscription.profile
            ],
        )?;
        Ok(inserted > 0)
    }

    fn remove_subscription(
        &self,
        user_id: i64,
        olympiad_id: &str,
        profile: &str,
    ) -> PersistenceResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM subscriptions WHERE user_id = ?1 AND olympiad_id = ?2 AND profile = ?3",
            params![user_id, olympiad_id, profile],
        )?;
        Ok(removed > 0)
    }

    fn remove_profile(&self, user_id: i64, profile: &str) -> PersistenceResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM subscriptions WHERE user_id = ?1 AND profile = ?2",
            params![user_id, profile],
        )?;
        Ok(removed)
    }

    fn subscriptions_for_user(&self, user_id: i64) -> PersistenceResult<Vec<Subscription>> {
        let conn = self.lock()?;
        Self::query_subscriptions(
            &conn,
            "SELECT user_id, olympiad_id, olympiad_name, profile FROM subscriptions
             WHERE user_id = ?1 ORDER BY rowid ASC",
            params![user_id],
        )
    }

    fn all_subscriptions(&self) -> PersistenceResult<Vec<Subscription>> {
        let conn = self.lock()?;
        Self::query_subscriptions(
            &conn,
            "SELECT user_id, olympiad_id, olympiad_name, profile FROM subscriptions
             ORDER BY rowid ASC",
            [],
        )
    }

    fn upsert_user(&self, user: &UserRecord) -> PersistenceResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO users (user_id, first_name, username, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user.user_id,
                user.first_name,
                user.username,
                user.joined_at.to_rfc3339()
            ],
        )?;
        tx.execute(
            "UPDATE users SET first_name = ?1, username = ?2 WHERE user_id = ?3",
            params![user.first_name, user.username, user.user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn all_user_ids(&self) -> PersistenceResult<BTreeSet<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id FROM users UNION SELECT DISTINCT user_id FROM subscriptions",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

        let mut ids = BTreeSet::new();
        for id in rows {
            ids.insert(id?);
        }
        Ok(ids)
    }
}
