pub mod calendar;
pub mod catalog;
pub mod config;
pub mod event;
pub mod format;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod parser;
pub mod persistence;
pub mod policy;
pub mod sweep;

pub use catalog::{Catalog, Olympiad};
pub use config::{ConfigError, ReminderConfig, load_config, save_config};
pub use event::{EventList, ParsedEvent, merge_events};
pub use format::{chunk_lines, reminder_line, split_text, subscription_block};
pub use parser::{next_upcoming, parse_cell};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteSubscriptionStore;
pub use persistence::{
    PersistenceError, PersistenceResult, Subscription, SubscriptionBook, SubscriptionStore,
    UserRecord,
};
pub use policy::{DueItem, Policy, due_items, is_due};
pub use sweep::{
    BroadcastReport, DeliveryError, LogNotifier, Notifier, SweepReport, UserReminders, broadcast,
    build_user_reminders, deliver, plan_sweep, run_sweep,
};
