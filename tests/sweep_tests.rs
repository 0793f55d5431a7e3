use chrono::{NaiveDate, Utc};
use reminder_tool::format::{NO_REMINDERS_INFO, REMINDER_HEADER};
use reminder_tool::{
    BroadcastReport, Catalog, DeliveryError, Notifier, Olympiad, Policy, ReminderConfig,
    Subscription, SubscriptionBook, SubscriptionStore, UserRecord, broadcast, deliver, plan_sweep,
    run_sweep,
};
use std::sync::Mutex;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
    failing_user: Option<i64>,
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, user_id: i64, text: &str) -> Result<(), DeliveryError> {
        if self.failing_user == Some(user_id) {
            return Err(DeliveryError::new(user_id, "chat not found"));
        }
        self.sent.lock().unwrap().push((user_id, text.to_string()));
        Ok(())
    }
}

fn catalog() -> Catalog {
    let mut hse = Olympiad::new(
        "Высшая проба",
        vec!["математика".into(), "физика".into()],
        "12.09/отбор; 19.09/финал",
    );
    hse.level = "1".into();
    hse.link = "https://olymp.hse.ru".into();
    let phystech = Olympiad::new("Физтех", vec!["физика".into()], "пока не объявлено");
    Catalog::new(vec![hse, phystech])
}

fn store() -> SubscriptionBook {
    SubscriptionBook::from_subscriptions(vec![
        Subscription::new(1, "Высшая проба", "математика"),
        Subscription::new(1, "Физтех", "физика"),
        Subscription::new(2, "Высшая проба", "физика"),
        Subscription::new(3, "Физтех", "физика"),
    ])
    .unwrap()
}

fn config(policy: Policy) -> ReminderConfig {
    ReminderConfig {
        policy,
        ..ReminderConfig::default()
    }
}

#[test]
fn plan_collects_due_lines_per_user() {
    let today = d(2025, 9, 5);
    let subs = store().all_subscriptions().unwrap();
    let plans = plan_sweep(&catalog(), &subs, today, &config(Policy::milestones([7, 14])));

    // User 3 follows only an unscheduled olympiad.
    let users: Vec<i64> = plans.iter().map(|p| p.user_id).collect();
    assert_eq!(users, vec![1, 2]);

    let first = &plans[0];
    assert_eq!(first.due_count, 2);
    assert_eq!(first.chunks.len(), 1);
    assert!(first.chunks[0].starts_with(REMINDER_HEADER));
    assert!(first.chunks[0].contains(
        "🔔 Высшая проба (математика, ур. 1): осталось 7 дн. 2025-09-12. — отбор\nhttps://olymp.hse.ru"
    ));
    assert!(first.chunks[0].contains("осталось 14 дн. 2025-09-19. — финал"));
    assert!(plans[1].chunks[0].contains("(физика, ур. 1)"));
}

#[test]
fn small_chunk_limit_splits_messages_in_order() {
    let today = d(2025, 9, 12);
    let subs = store().all_subscriptions().unwrap();
    let mut cfg = config(Policy::window(30));
    cfg.max_chunk_length = 40;
    let plans = plan_sweep(&catalog(), &subs, today, &cfg);

    let first = &plans[0];
    assert_eq!(first.user_id, 1);
    assert_eq!(first.chunks.len(), 3);
    assert_eq!(first.chunks[0], REMINDER_HEADER);
    assert!(first.chunks[1].contains("сегодня — отбор"));
    assert!(first.chunks[2].contains("осталось 7 дн. 2025-09-19. — финал"));
}

#[test]
fn empty_info_goes_to_users_with_nothing_due() {
    let today = d(2025, 9, 5);
    let subs = store().all_subscriptions().unwrap();
    let mut cfg = config(Policy::milestones([0]));
    cfg.send_empty_info = true;
    let plans = plan_sweep(&catalog(), &subs, today, &cfg);
    assert_eq!(plans.len(), 3);
    assert!(plans.iter().all(|p| p.chunks == vec![NO_REMINDERS_INFO.to_string()]));
}

#[test]
fn failed_user_does_not_block_others() {
    let today = d(2025, 9, 12);
    let subs = store().all_subscriptions().unwrap();
    let mut cfg = config(Policy::window(30));
    cfg.max_chunk_length = 40;
    let plans = plan_sweep(&catalog(), &subs, today, &cfg);

    let notifier = RecordingNotifier {
        failing_user: Some(1),
        ..RecordingNotifier::default()
    };
    let report = deliver(&plans, &notifier);
    assert_eq!(report.users, 2);
    assert_eq!(report.failed_users, 1);

    let sent = notifier.sent.lock().unwrap();
    assert!(sent.iter().all(|(user, _)| *user == 2));
    assert_eq!(report.delivered_chunks, sent.len());
    // User 2's chunks arrive in planned order.
    let texts: Vec<&str> = sent.iter().map(|(_, text)| text.as_str()).collect();
    assert_eq!(texts, plans[1].chunks.iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn run_sweep_reads_the_store() {
    let notifier = RecordingNotifier::default();
    let report = run_sweep(
        &catalog(),
        &store(),
        d(2025, 9, 11),
        &config(Policy::default()),
        &notifier,
    )
    .unwrap();
    assert_eq!(report.users, 2);
    assert_eq!(report.failed_users, 0);
    let sent = notifier.sent.lock().unwrap();
    assert!(sent[0].1.contains("завтра — отбор"));
}

/// Accepts the first `accepted` chunks for `user_id`, then fails.
struct CutOffNotifier {
    user_id: i64,
    accepted: usize,
    sent: Mutex<Vec<(i64, String)>>,
}

impl Notifier for CutOffNotifier {
    fn deliver(&self, user_id: i64, text: &str) -> Result<(), DeliveryError> {
        let mut sent = self.sent.lock().unwrap();
        let so_far = sent.iter().filter(|(user, _)| *user == user_id).count();
        if user_id == self.user_id && so_far >= self.accepted {
            return Err(DeliveryError::new(user_id, "bot was blocked by the user"));
        }
        sent.push((user_id, text.to_string()));
        Ok(())
    }
}

fn user(user_id: i64) -> UserRecord {
    UserRecord {
        user_id,
        first_name: String::new(),
        username: String::new(),
        joined_at: Utc::now(),
    }
}

#[test]
fn broadcast_reaches_every_known_user_in_order() {
    let book = store();
    // Registered but not subscribed to anything.
    book.upsert_user(&user(10)).unwrap();
    let notifier = RecordingNotifier::default();

    let report = broadcast(&book, "Регистрация открыта", 4000, &notifier).unwrap();
    assert_eq!(
        report,
        BroadcastReport {
            recipients: 4,
            sent: 4,
            failed: 0
        }
    );
    let sent = notifier.sent.lock().unwrap();
    let users: Vec<i64> = sent.iter().map(|(user, _)| *user).collect();
    assert_eq!(users, vec![1, 2, 3, 10]);
    assert!(sent.iter().all(|(_, text)| text == "Регистрация открыта"));
}

#[test]
fn long_broadcast_is_split_on_line_breaks() {
    let book = SubscriptionBook::new();
    book.upsert_user(&user(4)).unwrap();
    let notifier = RecordingNotifier::default();
    let text = "первая строка\nвторая строка\nтретья";

    let report = broadcast(&book, text, 16, &notifier).unwrap();
    assert_eq!(report.sent, 1);
    let sent = notifier.sent.lock().unwrap();
    let texts: Vec<&str> = sent.iter().map(|(_, text)| text.as_str()).collect();
    assert_eq!(texts, vec!["первая строка\n", "вторая строка\n", "третья"]);
}

#[test]
fn broadcast_counts_partial_delivery_as_failed() {
    let book = store();
    let notifier = CutOffNotifier {
        user_id: 2,
        accepted: 1,
        sent: Mutex::new(Vec::new()),
    };
    let report = broadcast(&book, "раз\nдва\nтри", 5, &notifier).unwrap();
    assert_eq!(report.recipients, 3);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);

    let sent = notifier.sent.lock().unwrap();
    // User 2 got the first chunk only; nothing after the failure.
    assert_eq!(sent.iter().filter(|(user, _)| *user == 2).count(), 1);
    assert_eq!(sent.iter().filter(|(user, _)| *user == 3).count(), 3);
}

#[test]
fn broadcast_with_no_users_sends_nothing() {
    let notifier = RecordingNotifier {
        failing_user: Some(1),
        ..RecordingNotifier::default()
    };
    let report = broadcast(&SubscriptionBook::new(), "hi", 100, &notifier).unwrap();
    assert_eq!(report, BroadcastReport::default());
    assert!(notifier.sent.lock().unwrap().is_empty());
}
