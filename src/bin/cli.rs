use chrono::{NaiveDate, Utc};
use reminder_tool::persistence::{
    load_catalog_from_csv, load_subscriptions_from_csv, load_subscriptions_from_json,
    save_subscriptions_to_csv, save_subscriptions_to_json,
};
use reminder_tool::{
    Catalog, LogNotifier, Policy, ReminderConfig, Subscription, SubscriptionBook,
    SubscriptionStore, UserRecord, broadcast, chunk_lines, due_items, format::describe_delta,
    load_config, parse_cell, plan_sweep, save_config, subscription_block,
};
use std::io::{self, Write};

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  today                              Show the evaluation date\n  today <YYYY-MM-DD>                 Pin the evaluation date\n  today reset                        Follow the clock in the configured zone\n  policy show                        Show the reminder policy\n  policy window <days>               Remind every day up to <days> before\n  policy milestones <csv>            Remind on listed days (e.g. 30,7,1,0)\n  parse <text...>                    Parse a date cell (\\n for line breaks)\n  due <text...>                      Show which events of a cell are due today\n  catalog load <csv_path>            Load the olympiad catalog\n  catalog show                       List catalog entries\n  profiles                           List catalog profiles\n  subs add <user> <profile> <olympiad...>\n                                     Subscribe a user\n  subs remove <user> <profile> <olympiad...>\n                                     Unsubscribe a user\n  subs add-profile <user> <profile>  Subscribe a user to every olympiad of a profile\n  subs remove-profile <user> <profile>\n                                     Drop a user's subscriptions under a profile\n  subs list <user>                   Show a user's subscriptions\n  subs save <json|csv> <path>        Persist subscriptions to disk\n  subs load <json|csv> <path>        Load subscriptions from disk\n  sweep                              Build today's reminders for every user\n  broadcast <text...>                Send a message to every known user (\\n for line breaks)\n  config show                        Show configuration\n  config load <json_path>            Load configuration from JSON file\n  config save <json_path>            Save configuration to JSON file\n  config tz <zone>                   Set the time zone (e.g. Europe/Moscow)\n  quit|exit                          Exit"
    );
}

fn parse_milestones(s: &str) -> Option<Vec<i64>> {
    s.split(',')
        .map(|p| p.trim().parse::<i64>().ok())
        .collect()
}

fn unescape_cell(words: &[&str]) -> String {
    words.join(" ").replace("\\n", "\n")
}

/// Register a user the first time they show up; known users keep their record.
fn ensure_user(book: &SubscriptionBook, user_id: i64) {
    let known = match book.all_user_ids() {
        Ok(ids) => ids.contains(&user_id),
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    if known {
        return;
    }
    let user = UserRecord {
        user_id,
        first_name: String::new(),
        username: String::new(),
        joined_at: Utc::now(),
    };
    if let Err(e) = book.upsert_user(&user) {
        println!("Error: {}", e);
    }
}

fn print_config(config: &ReminderConfig) {
    println!("Policy             : {}", config.policy);
    println!("Max chunk length   : {}", config.max_chunk_length);
    println!("Time zone          : {}", config.timezone.name());
    println!("Daily notify time  : {}", config.notify_time().format("%H:%M"));
    println!("Send empty info    : {}", config.send_empty_info);
    if let Some(path) = &config.catalog_path {
        println!("Catalog path       : {}", path.display());
    }
    if let Some(path) = &config.database_path {
        println!("Database path      : {}", path.display());
    }
}

fn print_catalog(catalog: &Catalog) {
    if catalog.is_empty() {
        println!("Catalog is empty.");
        return;
    }
    for olympiad in catalog.olympiads() {
        println!(
            "{} [{}] ур. {}: {}",
            olympiad.name,
            olympiad.profiles.join(", "),
            olympiad.level,
            olympiad.date_desc
        );
    }
}

fn print_chunks(chunks: &[String]) {
    let total = chunks.len();
    for (i, chunk) in chunks.iter().enumerate() {
        if total > 1 {
            println!("[{}/{}]", i + 1, total);
        }
        println!("{chunk}");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = ReminderConfig::default();
    let mut pinned_today: Option<NaiveDate> = None;
    let mut catalog = Catalog::default();
    let mut book = SubscriptionBook::new();

    println!("Reminder Tool (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let today = pinned_today.unwrap_or_else(|| config.today(Utc::now()));
        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => {
                print_help();
            }
            "quit" | "exit" => break,
            "today" => match parts.next() {
                None => println!("Today is {today}."),
                Some("reset") => {
                    pinned_today = None;
                    println!("Today follows the clock ({}).", config.today(Utc::now()));
                }
                Some(date_s) => match NaiveDate::parse_from_str(date_s, "%Y-%m-%d") {
                    Ok(date) => {
                        pinned_today = Some(date);
                        println!("Today pinned to {date}.");
                    }
                    Err(_) => println!("Invalid date (YYYY-MM-DD)"),
                },
            },
            "policy" => match (parts.next(), parts.next()) {
                (Some("show") | None, _) => println!("Policy: {}", config.policy),
                (Some("window"), Some(days_s)) => match days_s.parse::<i64>() {
                    Ok(days) => {
                        config.policy = Policy::window(days);
                        println!("Policy: {}", config.policy);
                    }
                    Err(_) => println!("Invalid days"),
                },
                (Some("milestones"), Some(csv)) => match parse_milestones(csv) {
                    Some(days) => {
                        config.policy = Policy::milestones(days);
                        println!("Policy: {}", config.policy);
                    }
                    None => println!("Invalid milestone list"),
                },
                _ => println!("Usage: policy show | window <days> | milestones <csv>"),
            },
            "parse" | "due" => {
                let words: Vec<&str> = parts.collect();
                if words.is_empty() {
                    println!("Usage: {cmd} <text...>");
                    continue;
                }
                let cell = unescape_cell(&words);
                let events = parse_cell(&cell, today);
                if cmd == "parse" {
                    if events.is_empty() {
                        println!("No upcoming dates.");
                    }
                    for event in &events {
                        println!("{}  {}", event.date, event.label);
                    }
                } else {
                    let due = due_items(&events, today, &config.policy);
                    if due.is_empty() {
                        println!("Nothing due on {today} ({}).", config.policy);
                    }
                    for item in &due {
                        println!(
                            "{}  {}",
                            describe_delta(item.delta, item.event.date),
                            item.event.label
                        );
                    }
                }
            }
            "catalog" => match parts.next() {
                Some("load") => match parts.next() {
                    Some(path) => match load_catalog_from_csv(path) {
                        Ok(loaded) => {
                            catalog = loaded;
                            println!("Catalog loaded from {path} ({} rows).", catalog.len());
                        }
                        Err(e) => println!("Error loading catalog: {}", e),
                    },
                    None => println!("Usage: catalog load <csv_path>"),
                },
                Some("show") | None => print_catalog(&catalog),
                _ => println!("Usage: catalog load <csv_path> | catalog show"),
            },
            "profiles" => {
                let profiles = catalog.profiles();
                if profiles.is_empty() {
                    println!("No profiles; load a catalog first.");
                } else {
                    println!("{}", profiles.join("\n"));
                }
            }
            "subs" => match parts.next() {
                Some(action @ ("add" | "remove")) => {
                    let user_s = parts.next();
                    let profile = parts.next();
                    let name: Vec<&str> = parts.collect();
                    let (Some(user_s), Some(profile), false) = (user_s, profile, name.is_empty())
                    else {
                        println!("Usage: subs {action} <user> <profile> <olympiad...>");
                        continue;
                    };
                    let user_id: i64 = match user_s.parse() {
                        Ok(v) => v,
                        Err(_) => {
                            println!("Invalid user id");
                            continue;
                        }
                    };
                    let olympiad_id = name.join(" ");
                    if action == "remove" {
                        match book.remove_subscription(user_id, &olympiad_id, profile) {
                            Ok(true) => println!("Unsubscribed {user_id} from {olympiad_id} ({profile})."),
                            Ok(false) => println!("No such subscription."),
                            Err(e) => println!("Error: {}", e),
                        }
                        continue;
                    }
                    let Some(olympiad) = catalog.lookup(&olympiad_id, profile) else {
                        println!("Unknown olympiad/profile: {olympiad_id} ({profile})");
                        continue;
                    };
                    ensure_user(&book, user_id);
                    let mut subscription = Subscription::new(user_id, &olympiad.id, profile);
                    subscription.olympiad_name = olympiad.name.clone();
                    match book.add_subscription(&subscription) {
                        Ok(true) => println!("Subscribed {user_id} to {olympiad_id} ({profile})."),
                        Ok(false) => println!("Already subscribed."),
                        Err(e) => println!("Error: {}", e),
                    }
                }
                Some(action @ ("add-profile" | "remove-profile")) => {
                    let user_s = parts.next();
                    let words: Vec<&str> = parts.collect();
                    let (Some(user_s), false) = (user_s, words.is_empty()) else {
                        println!("Usage: subs {action} <user> <profile>");
                        continue;
                    };
                    let user_id: i64 = match user_s.parse() {
                        Ok(v) => v,
                        Err(_) => {
                            println!("Invalid user id");
                            continue;
                        }
                    };
                    let profile = words.join(" ");
                    if action == "remove-profile" {
                        match book.remove_profile(user_id, &profile) {
                            Ok(0) => println!("No subscriptions under {profile}."),
                            Ok(n) => println!("Removed {n} subscriptions of {profile} for {user_id}."),
                            Err(e) => println!("Error: {}", e),
                        }
                        continue;
                    }
                    let olympiads = catalog.by_profile(&profile);
                    if olympiads.is_empty() {
                        println!("No olympiads for profile {profile}.");
                        continue;
                    }
                    ensure_user(&book, user_id);
                    let mut added = 0usize;
                    for olympiad in olympiads {
                        let mut subscription = Subscription::new(user_id, &olympiad.id, &profile);
                        subscription.olympiad_name = olympiad.name.clone();
                        match book.add_subscription(&subscription) {
                            Ok(true) => added += 1,
                            Ok(false) => {}
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    println!("Subscribed {user_id} to {added} olympiads of {profile}.");
                }
                Some("list") => {
                    let user_id: i64 = match parts.next().map(str::parse::<i64>) {
                        Some(Ok(v)) => v,
                        _ => {
                            println!("Usage: subs list <user>");
                            continue;
                        }
                    };
                    let subscriptions = match book.subscriptions_for_user(user_id) {
                        Ok(s) => s,
                        Err(e) => {
                            println!("Error: {}", e);
                            continue;
                        }
                    };
                    let blocks: Vec<String> = subscriptions
                        .iter()
                        .filter_map(|s| {
                            let olympiad = catalog.lookup(&s.olympiad_id, &s.profile)?;
                            let events = olympiad.events(today);
                            Some(subscription_block(olympiad, &s.profile, events.first()))
                        })
                        .collect();
                    if blocks.is_empty() {
                        println!("No subscriptions.");
                    } else {
                        print_chunks(&chunk_lines(&blocks, config.max_chunk_length));
                    }
                }
                Some(action @ ("save" | "load")) => {
                    let (Some(fmt), Some(path)) = (parts.next(), parts.next()) else {
                        println!("Usage: subs {action} <json|csv> <path>");
                        continue;
                    };
                    if action == "save" {
                        let result = match fmt {
                            "json" => save_subscriptions_to_json(&book, path),
                            "csv" => save_subscriptions_to_csv(&book, path),
                            _ => {
                                println!("Unknown format: {fmt} (use json|csv)");
                                continue;
                            }
                        };
                        match result {
                            Ok(()) => println!("Subscriptions saved to {path}."),
                            Err(e) => println!("Error saving subscriptions: {}", e),
                        }
                    } else {
                        let result = match fmt {
                            "json" => load_subscriptions_from_json(path),
                            "csv" => load_subscriptions_from_csv(path),
                            _ => {
                                println!("Unknown format: {fmt} (use json|csv)");
                                continue;
                            }
                        };
                        match result {
                            Ok(loaded) => {
                                book = loaded;
                                println!("Subscriptions loaded from {path}.");
                            }
                            Err(e) => println!("Error loading subscriptions: {}", e),
                        }
                    }
                }
                _ => println!("Usage: subs add|remove|add-profile|remove-profile|list|save|load ..."),
            },
            "sweep" => {
                let subscriptions = match book.all_subscriptions() {
                    Ok(s) => s,
                    Err(e) => {
                        println!("Error: {}", e);
                        continue;
                    }
                };
                let plans = plan_sweep(&catalog, &subscriptions, today, &config);
                if plans.is_empty() {
                    println!("No reminders for {today}.");
                }
                for plan in &plans {
                    println!("--- user {} ({} due) ---", plan.user_id, plan.due_count);
                    print_chunks(&plan.chunks);
                }
            }
            "broadcast" => {
                let words: Vec<&str> = parts.collect();
                if words.is_empty() {
                    println!("Usage: broadcast <text...>");
                    continue;
                }
                let text = unescape_cell(&words);
                match broadcast(&book, &text, config.max_chunk_length, &LogNotifier) {
                    Ok(report) => println!(
                        "Broadcast finished. Recipients: {}, sent: {}, failed: {}",
                        report.recipients, report.sent, report.failed
                    ),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "config" => match parts.next() {
                Some("show") | None => print_config(&config),
                Some("load") => match parts.next() {
                    Some(path) => match load_config(path) {
                        Ok(loaded) => {
                            config = loaded;
                            println!("Config loaded from {path}.");
                            if let Some(catalog_path) = &config.catalog_path {
                                match load_catalog_from_csv(catalog_path) {
                                    Ok(loaded) => {
                                        catalog = loaded;
                                        println!("Catalog loaded ({} rows).", catalog.len());
                                    }
                                    Err(e) => println!("Error loading catalog: {}", e),
                                }
                            }
                        }
                        Err(e) => println!("Error loading config: {}", e),
                    },
                    None => println!("Usage: config load <json_path>"),
                },
                Some("save") => match parts.next() {
                    Some(path) => match save_config(&config, path) {
                        Ok(()) => println!("Config saved to {path}."),
                        Err(e) => println!("Error saving config: {}", e),
                    },
                    None => println!("Usage: config save <json_path>"),
                },
                Some("tz") => match parts.next() {
                    Some(zone) => match config.set_timezone(zone) {
                        Ok(()) => println!("Time zone set to {zone}."),
                        Err(e) => println!("Error: {}", e),
                    },
                    None => println!("Usage: config tz <zone>"),
                },
                _ => println!("Usage: config show|load|save|tz"),
            },
            _ => {
                println!("Unknown command. Type 'help'.");
            }
        }
    }
}
