use super::{
    PersistenceError, PersistenceResult, Subscription, SubscriptionStore, UserRecord,
    validate_subscription,
};
use crate::catalog::{Catalog, Olympiad, PLACEHOLDER};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const ID_KEYWORDS: &[&str] = &["название", "олимпиад"];
const PROFILE_KEYWORDS: &[&str] = &["профиль"];
const DATE_KEYWORDS: &[&str] = &["дат"];
const LEVEL_KEYWORDS: &[&str] = &["уровень"];
const DESCRIPTION_KEYWORDS: &[&str] = &["описан"];
const LINK_KEYWORDS: &[&str] = &["ссыл"];

/// Catalog columns located by header keywords.
struct ColumnMap {
    id: usize,
    profiles: usize,
    dates: usize,
    level: Option<usize>,
    description: Option<usize>,
    link: Option<usize>,
}

impl ColumnMap {
    fn detect(headers: &StringRecord) -> PersistenceResult<Self> {
        let id = detect_column(headers, ID_KEYWORDS);
        let profiles = detect_column(headers, PROFILE_KEYWORDS);
        let dates = detect_column(headers, DATE_KEYWORDS);
        match (id, profiles, dates) {
            (Some(id), Some(profiles), Some(dates)) => Ok(Self {
                id,
                profiles,
                dates,
                level: detect_column(headers, LEVEL_KEYWORDS),
                description: detect_column(headers, DESCRIPTION_KEYWORDS),
                link: detect_column(headers, LINK_KEYWORDS),
            }),
            _ => Err(PersistenceError::InvalidData(
                "required catalog columns not found (name/profile/date)".to_string(),
            )),
        }
    }

    fn olympiad(&self, record: &StringRecord) -> Option<Olympiad> {
        let id = field(record, Some(self.id));
        if id.is_empty() {
            return None;
        }
        let mut olympiad = Olympiad::new(
            id,
            Olympiad::split_profiles(field(record, Some(self.profiles))),
            field(record, Some(self.dates)),
        );
        olympiad.level = or_placeholder(field(record, self.level));
        olympiad.description = or_placeholder(field(record, self.description));
        olympiad.link = or_placeholder(field(record, self.link));
        Some(olympiad)
    }
}

/// First header containing any keyword, case-insensitively.
fn detect_column(headers: &StringRecord, keywords: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let lowered = header.to_lowercase();
        keywords.iter().any(|kw| lowered.contains(kw))
    })
}

fn field(record: &StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).map(str::trim).unwrap_or("")
}

fn or_placeholder(value: &str) -> String {
    if value.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        value.to_string()
    }
}

/// Read a catalog from the CSV export of the olympiad sheet.
///
/// Rows without a name are skipped.
pub fn read_catalog<R: Read>(reader: R) -> PersistenceResult<Catalog> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let columns = ColumnMap::detect(&headers)?;

    let mut olympiads = Vec::new();
    for record in rdr.records() {
        let record = record?;
        match columns.olympiad(&record) {
            Some(olympiad) => olympiads.push(olympiad),
            None => debug!(line = ?record.position().map(|p| p.line()), "skipping catalog row without a name"),
        }
    }
    Ok(Catalog::new(olympiads))
}

pub fn load_catalog_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Catalog> {
    let file = File::open(path.as_ref())?;
    let catalog = read_catalog(file)?;
    info!(
        path = %path.as_ref().display(),
        olympiads = catalog.len(),
        "catalog loaded"
    );
    Ok(catalog)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BookSnapshot {
    subscriptions: Vec<Subscription>,
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// In-memory subscription store backed by JSON or CSV files.
#[derive(Debug, Default)]
pub struct SubscriptionBook {
    state: Mutex<BookSnapshot>,
}

impl SubscriptionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a book from rows, dropping duplicates of the same key.
    pub fn from_subscriptions(subscriptions: Vec<Subscription>) -> PersistenceResult<Self> {
        let book = Self::new();
        for subscription in &subscriptions {
            book.add_subscription(subscription)?;
        }
        Ok(book)
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, BookSnapshot>> {
        self.state.lock().map_err(|_| PersistenceError::LockPoisoned)
    }

    fn snapshot(&self) -> PersistenceResult<BookSnapshot> {
        Ok(self.lock()?.clone())
    }
}

impl SubscriptionStore for SubscriptionBook {
    fn add_subscription(&self, subscription: &Subscription) -> PersistenceResult<bool> {
        validate_subscription(subscription)?;
        let mut state = self.lock()?;
        if state
            .subscriptions
            .iter()
            .any(|s| s.key() == subscription.key())
        {
            return Ok(false);
        }
        state.subscriptions.push(subscription.clone());
        Ok(true)
    }

    fn remove_subscription(
        &self,
        user_id: i64,
        olympiad_id: &str,
        profile: &str,
    ) -> PersistenceResult<bool> {
        let mut state = self.lock()?;
        let before = state.subscriptions.len();
        state
            .subscriptions
            .retain(|s| s.key() != (user_id, olympiad_id, profile));
        Ok(state.subscriptions.len() < before)
    }

    fn remove_profile(&self, user_id: i64, profile: &str) -> PersistenceResult<usize> {
        let mut state = self.lock()?;
        let before = state.subscriptions.len();
        state
            .subscriptions
            .retain(|s| !(s.user_id == user_id && s.profile == profile));
        Ok(before - state.subscriptions.len())
    }

    fn subscriptions_for_user(&self, user_id: i64) -> PersistenceResult<Vec<Subscription>> {
        let state = self.lock()?;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    fn all_subscriptions(&self) -> PersistenceResult<Vec<Subscription>> {
        Ok(self.lock()?.subscriptions.clone())
    }

    fn upsert_user(&self, user: &UserRecord) -> PersistenceResult<()> {
        let mut state = self.lock()?;
        match state.users.iter_mut().find(|u| u.user_id == user.user_id) {
            Some(existing) => {
                existing.first_name = user.first_name.clone();
                existing.username = user.username.clone();
            }
            None => state.users.push(user.clone()),
        }
        Ok(())
    }

    fn all_user_ids(&self) -> PersistenceResult<BTreeSet<i64>> {
        let state = self.lock()?;
        Ok(state
            .users
            .iter()
            .map(|u| u.user_id)
            .chain(state.subscriptions.iter().map(|s| s.user_id))
            .collect())
    }
}

pub fn save_subscriptions_to_json<P: AsRef<Path>>(
    book: &SubscriptionBook,
    path: P,
) -> PersistenceResult<()> {
    let snapshot = book.snapshot()?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    Ok(())
}

pub fn load_subscriptions_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<SubscriptionBook> {
    let file = File::open(path)?;
    let snapshot: BookSnapshot = serde_json::from_reader(file)?;
    let book = SubscriptionBook::from_subscriptions(snapshot.subscriptions)?;
    for user in &snapshot.users {
        book.upsert_user(user)?;
    }
    Ok(book)
}

/// Subscriptions only; user records are not part of the CSV layout.
pub fn save_subscriptions_to_csv<P: AsRef<Path>>(
    book: &SubscriptionBook,
    path: P,
) -> PersistenceResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for subscription in book.all_subscriptions()? {
        wtr.serialize(&subscription)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn load_subscriptions_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<SubscriptionBook> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut subscriptions = Vec::new();
    for record in rdr.deserialize() {
        let subscription: Subscription = record?;
        subscriptions.push(subscription);
    }
    SubscriptionBook::from_subscriptions(subscriptions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "\
Название олимпиады,Профиль,Даты проведения,Уровень,Описание,Ссылка
Высшая проба,математика; физика,12.09/отбор; 01.02/финал,1,Олимпиада НИУ ВШЭ,https://olymp.hse.ru
Физтех,физика,пока не объявлено,,,
,химия,10.10,2,,
";

    #[test]
    fn catalog_columns_are_detected_by_keyword() {
        let catalog = read_catalog(SHEET.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);

        let hse = catalog.lookup("Высшая проба", "физика").unwrap();
        assert_eq!(hse.name, "Высшая проба");
        assert_eq!(hse.date_desc, "12.09/отбор; 01.02/финал");
        assert_eq!(hse.level, "1");
        assert_eq!(hse.link, "https://olymp.hse.ru");

        let phystech = catalog.lookup("Физтех", "физика").unwrap();
        assert_eq!(phystech.level, PLACEHOLDER);
        assert_eq!(phystech.description, PLACEHOLDER);
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let sheet = "Название,Уровень\nФизтех,1\n";
        let err = read_catalog(sheet.as_bytes()).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidData(_)));
    }

    #[test]
    fn book_keeps_one_row_per_key() {
        let book = SubscriptionBook::new();
        let sub = Subscription::new(7, "Физтех", "физика");
        assert!(book.add_subscription(&sub).unwrap());
        assert!(!book.add_subscription(&sub).unwrap());
        assert!(book.add_subscription(&Subscription::new(7, "Физтех", "информатика")).unwrap());
        assert!(book.add_subscription(&Subscription::new(7, "Росатом", "физика")).unwrap());
        assert_eq!(book.subscriptions_for_user(7).unwrap().len(), 3);
        assert_eq!(book.remove_profile(7, "физика").unwrap(), 2);
        let left = book.all_subscriptions().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].profile, "информатика");
    }

    #[test]
    fn empty_profile_is_invalid() {
        let book = SubscriptionBook::new();
        let err = book
            .add_subscription(&Subscription::new(1, "Физтех", " "))
            .unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidData(_)));
    }
}
