#![cfg(feature = "cli_api")]

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use std::fs;
use tempfile::NamedTempFile;

#[allow(deprecated)]
fn run_cli(script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.write_stdin(script.to_string()).assert()
}

const SHEET: &str = "\
Название,Профиль,Даты,Уровень,Ссылка
Высшая проба,математика,12.09/отбор; 19.09/финал,1,https://olymp.hse.ru
Физтех,физика,пока не объявлено,1,https://olymp.mipt.ru
Росатом,физика,01.11/заключительный,2,https://olymp.mephi.ru
";

fn sheet_file() -> NamedTempFile {
    let file = NamedTempFile::new().expect("create temp file");
    fs::write(file.path(), SHEET).expect("write sheet");
    file
}

#[test]
fn cli_parses_a_cell_against_a_pinned_date() {
    run_cli("today 2025-06-01\nparse 12.09–14.09.2025\\n12.09/тур2\nquit\n")
        .success()
        .stdout(str_contains("Today pinned to 2025-06-01."))
        .stdout(str_contains("2025-09-12  начало; тур2"));
}

#[test]
fn cli_due_uses_the_active_policy() {
    run_cli("today 2025-09-05\npolicy milestones 7\ndue 12.09/отбор; 13.09/финал\nquit\n")
        .success()
        .stdout(str_contains("Policy: milestones 7"))
        .stdout(str_contains("осталось 7 дн. 2025-09-12.  отбор"));
}

#[test]
fn cli_rejects_bad_policy_input() {
    run_cli("policy window soon\npolicy milestones 7,x\nquit\n")
        .success()
        .stdout(str_contains("Invalid days"))
        .stdout(str_contains("Invalid milestone list"));
}

#[test]
fn cli_sweep_builds_reminders_from_catalog_and_subscriptions() {
    let sheet = sheet_file();
    let path = sheet.path().to_string_lossy().replace('\\', "\\\\");
    let script = format!(
        "today 2025-09-11\ncatalog load {path}\nsubs add 5 математика Высшая проба\nsubs add 5 физика Физтех\nsweep\nquit\n"
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Catalog loaded from"))
        .stdout(str_contains("Subscribed 5 to Высшая проба (математика)."))
        .stdout(str_contains("--- user 5 (1 due) ---"))
        .stdout(str_contains("🔔 Высшая проба (математика, ур. 1): завтра — отбор"));
}

#[test]
fn cli_lists_subscriptions_with_next_date() {
    let sheet = sheet_file();
    let path = sheet.path().to_string_lossy().replace('\\', "\\\\");
    let script = format!(
        "today 2025-09-01\ncatalog load {path}\nsubs add 9 математика Высшая проба\nsubs add 9 физика Физтех\nsubs list 9\nquit\n"
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Ближайшее: 12.09.2025 — отбор"))
        .stdout(str_contains("Ближайшее: пока не объявлено"));
}

#[test]
fn cli_unknown_subscription_target_is_reported() {
    run_cli("subs add 1 физика Нет такой\nquit\n")
        .success()
        .stdout(str_contains("Unknown olympiad/profile: Нет такой (физика)"));
}

#[test]
fn cli_save_and_load_subscriptions_json() {
    let sheet = sheet_file();
    let sheet_path = sheet.path().to_string_lossy().replace('\\', "\\\\");
    let store = NamedTempFile::new().expect("create temp file");
    let store_path = store.path().to_string_lossy().replace('\\', "\\\\");
    let script = format!(
        "catalog load {sheet_path}\nsubs add 3 физика Физтех\nsubs save json {store_path}\nsubs remove 3 физика Физтех\nsubs load json {store_path}\nsubs list 3\nquit\n"
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Unsubscribed 3 from Физтех (физика)."));
    let after_reload = output
        .split("Subscriptions loaded from")
        .last()
        .unwrap_or_default();
    assert!(
        after_reload.contains("• Физтех"),
        "subscription should be back after reload:\n{}",
        after_reload
    );
}

#[test]
fn cli_config_rejects_unknown_time_zone() {
    run_cli("config tz Mars/Olympus\nconfig tz Asia/Novosibirsk\nconfig show\nquit\n")
        .success()
        .stdout(str_contains("unknown time zone 'Mars/Olympus'"))
        .stdout(str_contains("Time zone          : Asia/Novosibirsk"));
}

#[test]
fn cli_subscribes_and_unsubscribes_a_whole_profile() {
    let sheet = sheet_file();
    let path = sheet.path().to_string_lossy().replace('\\', "\\\\");
    let script = format!(
        "today 2025-09-01\ncatalog load {path}\nsubs add-profile 8 физика\nsubs add-profile 8 физика\nsubs list 8\nsubs add-profile 8 химия\nsubs remove-profile 8 физика\nsubs list 8\nsubs remove-profile 8 физика\nquit\n"
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Subscribed 8 to 2 olympiads of физика."));
    assert!(output.contains("Subscribed 8 to 0 olympiads of физика."));
    assert!(output.contains("• Физтех"));
    assert!(output.contains("• Росатом"));
    assert!(!output.contains("• Высшая проба"));
    assert!(output.contains("No olympiads for profile химия."));
    assert!(output.contains("Removed 2 subscriptions of физика for 8."));
    assert!(output.contains("No subscriptions."));
    assert!(output.contains("No subscriptions under физика."));
}

#[test]
fn cli_broadcast_reports_every_known_user() {
    let sheet = sheet_file();
    let path = sheet.path().to_string_lossy().replace('\\', "\\\\");
    let script = format!(
        "broadcast Привет\ncatalog load {path}\nsubs add 2 физика Физтех\nsubs add-profile 6 математика\nbroadcast Регистрация открыта\\nдо 01.10\nquit\n"
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Recipients: 0, sent: 0, failed: 0"))
        .stdout(str_contains("Recipients: 2, sent: 2, failed: 0"));
}
