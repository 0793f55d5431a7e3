//! Daily reminder sweep.
//!
//! Every (subscription, user) pair is evaluated from the raw catalog cell;
//! users are independent and evaluated in parallel, while each user's chunks
//! are delivered strictly in order. Operator broadcasts reuse the same
//! delivery seam.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::ReminderConfig;
use crate::format::{NO_REMINDERS_INFO, REMINDER_HEADER, chunk_lines, reminder_line, split_text};
use crate::persistence::{PersistenceResult, Subscription, SubscriptionStore};
use crate::policy::{Policy, due_items};

#[derive(Debug, Error)]
#[error("delivery to user {user_id} failed: {reason}")]
pub struct DeliveryError {
    pub user_id: i64,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(user_id: i64, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            reason: reason.into(),
        }
    }
}

/// Message transport to end users.
pub trait Notifier: Sync {
    fn deliver(&self, user_id: i64, text: &str) -> Result<(), DeliveryError>;
}

/// Writes every message to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, user_id: i64, text: &str) -> Result<(), DeliveryError> {
        info!(user_id, chars = text.chars().count(), "reminder chunk:\n{text}");
        Ok(())
    }
}

/// Messages planned for one user, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserReminders {
    pub user_id: i64,
    pub chunks: Vec<String>,
    pub due_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub users: usize,
    pub delivered_chunks: usize,
    pub failed_users: usize,
}

/// Outcome of an operator broadcast. A recipient counts as sent only when
/// every chunk reached them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Reminder lines for one user, starting with the header line.
pub fn build_user_reminders(
    catalog: &Catalog,
    items: &[Subscription],
    today: NaiveDate,
    policy: &Policy,
) -> Vec<String> {
    let mut lines = vec![REMINDER_HEADER.to_string()];
    for item in items {
        let Some(olympiad) = catalog.lookup(&item.olympiad_id, &item.profile) else {
            debug!(
                olympiad = %item.olympiad_id,
                profile = %item.profile,
                "subscription not in catalog"
            );
            continue;
        };
        let events = olympiad.events(today);
        for due in due_items(&events, today, policy) {
            lines.push(reminder_line(olympiad, &item.profile, &due));
        }
    }
    lines
}

fn group_by_user(subscriptions: &[Subscription]) -> BTreeMap<i64, Vec<Subscription>> {
    let mut by_user: BTreeMap<i64, Vec<Subscription>> = BTreeMap::new();
    for subscription in subscriptions {
        by_user
            .entry(subscription.user_id)
            .or_default()
            .push(subscription.clone());
    }
    by_user
}

/// Plan today's messages for every subscribed user.
///
/// Users with nothing due are left out unless `send_empty_info` is set.
pub fn plan_sweep(
    catalog: &Catalog,
    subscriptions: &[Subscription],
    today: NaiveDate,
    config: &ReminderConfig,
) -> Vec<UserReminders> {
    let by_user = group_by_user(subscriptions);
    let plans: Vec<UserReminders> = by_user
        .par_iter()
        .filter_map(|(&user_id, items)| {
            let lines = build_user_reminders(catalog, items, today, &config.policy);
            let due_count = lines.len() - 1;
            let chunks = if due_count > 0 {
                chunk_lines(&lines, config.max_chunk_length)
            } else if config.send_empty_info {
                vec![NO_REMINDERS_INFO.to_string()]
            } else {
                return None;
            };
            Some(UserReminders {
                user_id,
                chunks,
                due_count,
            })
        })
        .collect();

    info!(
        %today,
        subscribed_users = by_user.len(),
        planned_users = plans.len(),
        "reminder sweep planned"
    );
    plans
}

/// Hand every plan to `notifier`.
///
/// A failed chunk stops that user's remaining chunks so no later part is
/// read without the earlier ones; other users are unaffected.
pub fn deliver(plans: &[UserReminders], notifier: &dyn Notifier) -> SweepReport {
    let mut report = SweepReport {
        users: plans.len(),
        ..SweepReport::default()
    };
    for plan in plans {
        for chunk in &plan.chunks {
            if let Err(err) = notifier.deliver(plan.user_id, chunk) {
                warn!(user_id = plan.user_id, error = %err, "reminder delivery failed");
                report.failed_users += 1;
                break;
            }
            report.delivered_chunks += 1;
        }
    }
    report
}

/// Plan and deliver using every subscription in `store`.
pub fn run_sweep(
    catalog: &Catalog,
    store: &dyn SubscriptionStore,
    today: NaiveDate,
    config: &ReminderConfig,
    notifier: &dyn Notifier,
) -> PersistenceResult<SweepReport> {
    let subscriptions = store.all_subscriptions()?;
    let plans = plan_sweep(catalog, &subscriptions, today, config);
    let report = deliver(&plans, notifier);
    info!(
        users = report.users,
        delivered = report.delivered_chunks,
        failed = report.failed_users,
        "reminder sweep finished"
    );
    Ok(report)
}

/// Send `text` to every user known to `store`, in user id order.
///
/// The text is split with [`split_text`]; a failed chunk stops the rest of
/// that user's chunks.
pub fn broadcast(
    store: &dyn SubscriptionStore,
    text: &str,
    max_len: usize,
    notifier: &dyn Notifier,
) -> PersistenceResult<BroadcastReport> {
    let recipients = store.all_user_ids()?;
    let chunks = split_text(text, max_len);
    let mut report = BroadcastReport {
        recipients: recipients.len(),
        ..BroadcastReport::default()
    };
    for user_id in recipients {
        let outcome = chunks
            .iter()
            .try_for_each(|chunk| notifier.deliver(user_id, chunk));
        match outcome {
            Ok(()) => report.sent += 1,
            Err(err) => {
                warn!(user_id, error = %err, "broadcast delivery failed");
                report.failed += 1;
            }
        }
    }
    info!(
        recipients = report.recipients,
        sent = report.sent,
        failed = report.failed,
        chunks = chunks.len(),
        "broadcast finished"
    );
    Ok(report)
}
