use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn daybook_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_daybook"));
    cmd.env_remove("DAYBOOK_DIR").env_remove("RUST_LOG");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    daybook_cmd()
        .current_dir(dir)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn run_ok(dir: &Path, args: &[&str]) -> String {
    let output = run(dir, args);
    assert!(
        output.status.success(),
        "daybook {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn run_json(dir: &Path, args: &[&str]) -> serde_json::Value {
    serde_json::from_str(&run_ok(dir, args)).unwrap()
}

fn initialized() -> TempDir {
    let tmp = TempDir::new().unwrap();
    run_ok(tmp.path(), &["init"]);
    tmp
}

#[test]
fn test_init_creates_daybook_directory() {
    let tmp = TempDir::new().unwrap();

    let stdout = run_ok(tmp.path(), &["init"]);

    assert!(stdout.contains("Initialized daybook"));
    assert!(tmp.path().join(".daybook").exists());
    assert!(tmp.path().join(".daybook/journal.db").exists());
}

#[test]
fn test_init_twice_fails() {
    let tmp = initialized();

    let output = run(tmp.path(), &["init"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Already initialized"));
}

#[test]
fn test_command_without_init_fails() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["diary", "show"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not in a daybook directory"));
}

#[test]
fn test_subdirectory_finds_root() {
    let tmp = initialized();
    let nested = tmp.path().join("a/b");
    std::fs::create_dir_all(&nested).unwrap();

    run_ok(&nested, &["common", "add", "Water plants"]);

    let tasks = run_json(tmp.path(), &["common", "list", "--json"]);
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[test]
fn test_dir_flag_overrides_current_directory() {
    let tmp = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let dir = tmp.path().to_str().unwrap();

    run_ok(elsewhere.path(), &["--dir", dir, "init"]);
    assert!(tmp.path().join(".daybook/journal.db").exists());

    run_ok(elsewhere.path(), &["--dir", dir, "diary", "add-todo", "Call mom", "--date", "2024-03-10"]);
    let diary = run_json(
        elsewhere.path(),
        &["--dir", dir, "diary", "show", "--date", "2024-03-10", "--json"],
    );
    assert_eq!(diary["todos"][0]["text"], "Call mom");
}

#[test]
fn test_diary_workflow() {
    let tmp = initialized();
    let dir = tmp.path();
    let day = "2024-03-10";

    // an unwritten date is empty
    let stdout = run_ok(dir, &["diary", "show", "--date", day]);
    assert!(stdout.contains("No entries for 2024-03-10"));

    run_ok(dir, &["diary", "add-event", "Shipped v1", "--date", day]);
    run_ok(dir, &["diary", "add-todo", "Write changelog", "--date", day]);
    run_ok(dir, &["diary", "reflect", "A long but good day", "--date", day]);

    let diary = run_json(dir, &["diary", "show", "--date", day, "--json"]);
    assert_eq!(diary["date"], day);
    assert_eq!(diary["majorEvents"][0]["text"], "Shipped v1");
    assert_eq!(diary["reflection"], "A long but good day");
    let todo_id = diary["todos"][0]["id"].as_str().unwrap().to_string();

    let stdout = run_ok(dir, &["diary", "done", &todo_id[..6], "--date", day]);
    assert!(stdout.contains("Write changelog"));

    let diary = run_json(dir, &["diary", "show", "--date", day, "--json"]);
    assert_eq!(diary["todos"][0]["completed"], true);
    assert_eq!(diary["completed"][0]["text"], "Write changelog");

    let results = run_json(dir, &["diary", "search", "CHANGELOG", "--json"]);
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["date"], day);

    let stats = run_json(dir, &["diary", "stats", "--json"]);
    assert_eq!(stats["total_days"], 1);
    assert_eq!(stats["total_todos"], 1);
    assert_eq!(stats["total_completed"], 1);
}

#[test]
fn test_diary_rejects_bad_date() {
    let tmp = initialized();

    let output = run(tmp.path(), &["diary", "show", "--date", "10/03/2024"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid date"));
}

#[test]
fn test_diary_inherit_and_delete() {
    let tmp = initialized();
    let dir = tmp.path();

    run_ok(dir, &["diary", "add-event", "Sprint 12", "--date", "2024-03-09"]);
    let stdout = run_ok(dir, &["diary", "inherit", "--date", "2024-03-10"]);
    assert!(stdout.contains("Inherited 1 event"));

    // second run finds nothing new
    let stdout = run_ok(dir, &["diary", "inherit", "--date", "2024-03-10"]);
    assert!(stdout.contains("Nothing to inherit"));

    let dates = run_json(dir, &["diary", "dates", "--json"]);
    assert_eq!(dates, serde_json::json!(["2024-03-10", "2024-03-09"]));

    run_ok(dir, &["diary", "delete", "2024-03-09"]);
    let dates = run_json(dir, &["diary", "dates", "--json"]);
    assert_eq!(dates, serde_json::json!(["2024-03-10"]));
}

#[test]
fn test_event_delete_is_refused_while_linked() {
    let tmp = initialized();
    let dir = tmp.path();

    run_ok(dir, &["event", "create", "Conference", "--link", "https://example.com"]);
    let events = run_json(dir, &["event", "list", "--json"]);
    let id = events[0]["id"].as_str().unwrap().to_string();

    run_ok(dir, &["event", "link", &id, "--date", "2024-05-01"]);
    // linking twice is a no-op
    let stdout = run_ok(dir, &["event", "link", &id, "--date", "2024-05-01"]);
    assert!(stdout.contains("already linked"));

    let dates = run_json(dir, &["event", "dates", &id, "--json"]);
    assert_eq!(dates, serde_json::json!(["2024-05-01"]));

    let output = run(dir, &["event", "delete", &id, "--force"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("still linked"));

    run_ok(dir, &["event", "unlink", &id, "--date", "2024-05-01"]);
    run_ok(dir, &["event", "delete", &id, "--force"]);

    let events = run_json(dir, &["event", "list", "--json"]);
    assert!(events.as_array().unwrap().is_empty());
}

#[test]
fn test_event_delete_without_force_in_non_interactive_mode() {
    let tmp = initialized();
    let dir = tmp.path();
    run_ok(dir, &["event", "create", "Offsite"]);
    let events = run_json(dir, &["event", "list", "--json"]);
    let id = events[0]["id"].as_str().unwrap().to_string();

    let output = run(dir, &["event", "delete", &id]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));
    let events = run_json(dir, &["event", "list", "--json"]);
    assert_eq!(events.as_array().unwrap().len(), 1);
}

#[test]
fn test_event_inheritable() {
    let tmp = initialized();
    let dir = tmp.path();
    run_ok(dir, &["event", "create", "Trip"]);
    let events = run_json(dir, &["event", "list", "--json"]);
    let id = events[0]["id"].as_str().unwrap().to_string();
    run_ok(dir, &["event", "link", &id, "--date", "2024-05-01"]);

    let inheritable = run_json(dir, &["event", "inheritable", "--date", "2024-05-02", "--json"]);
    assert_eq!(inheritable.as_array().unwrap().len(), 1);

    run_ok(dir, &["event", "inheritable", "--date", "2024-05-02", "--link"]);
    let linked = run_json(dir, &["event", "list", "--date", "2024-05-02", "--json"]);
    assert_eq!(linked[0]["id"], id.as_str());
    let inheritable = run_json(dir, &["event", "inheritable", "--date", "2024-05-02", "--json"]);
    assert!(inheritable.as_array().unwrap().is_empty());
}

#[test]
fn test_plan_create_requires_tasks() {
    let tmp = initialized();

    let output = run(tmp.path(), &["plan", "create", "Empty"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least one task"));
}

#[test]
fn test_plan_run_cascades_to_completion() {
    let tmp = initialized();
    let dir = tmp.path();

    let plan = run_json(
        dir,
        &["plan", "create", "Morning", "--required", "Stretch", "--task", "Journal", "--json"],
    );
    let id = plan["id"].as_str().unwrap().to_string();
    assert_eq!(plan["tasks"].as_array().unwrap().len(), 2);

    let stdout = run_ok(dir, &["plan", "start", &id[..6]]);
    assert!(stdout.contains("Started plan"));

    // optional first: run stays active
    let stdout = run_ok(dir, &["plan", "check", &id, "2"]);
    assert!(stdout.contains("Checked task - Journal"));
    assert!(stdout.contains("1/2 (50%)"));
    assert!(!stdout.contains("All tasks done"));

    let stdout = run_ok(dir, &["plan", "check", &id, "1"]);
    assert!(stdout.contains("All tasks done"));

    let shown = run_json(dir, &["plan", "show", &id, "--json"]);
    assert_eq!(shown["execution"]["status"], "completed");
    assert_eq!(shown["progress"]["percentage"], 100);

    // finished runs take no more actions
    let output = run(dir, &["plan", "check", &id, "1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already completed"));

    let stats = run_json(dir, &["plan", "stats", "--json"]);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["executions_completed"], 1);
}

#[test]
fn test_plan_stop_with_open_required_tasks() {
    let tmp = initialized();
    let dir = tmp.path();
    let plan = run_json(
        dir,
        &["plan", "create", "Evening", "--required", "Dishes", "--task", "Read", "--json"],
    );
    let id = plan["id"].as_str().unwrap().to_string();
    run_ok(dir, &["plan", "start", &id]);

    // needs confirmation
    let output = run(dir, &["plan", "stop", &id]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Dishes"));

    let stdout = run_ok(dir, &["plan", "stop", &id, "--force"]);
    assert!(stdout.contains("Stopped plan"));

    let history = run_json(dir, &["plan", "history", &id, "--json"]);
    let runs = history.as_object().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs.values().next().unwrap()["status"], "stopped");
}

#[test]
fn test_plan_actions_without_run() {
    let tmp = initialized();
    let dir = tmp.path();
    let plan = run_json(dir, &["plan", "create", "Gym", "--task", "Run", "--json"]);
    let id = plan["id"].as_str().unwrap().to_string();

    let output = run(dir, &["plan", "complete", &id, "--date", "2024-01-01"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No execution"));

    let progress = run_json(dir, &["plan", "progress", &id, "--date", "2024-01-01", "--json"]);
    assert_eq!(progress["total"], 1);
    assert_eq!(progress["completed"], 0);
    assert_eq!(progress["percentage"], 0);
}

#[test]
fn test_plan_archive_and_delete() {
    let tmp = initialized();
    let dir = tmp.path();
    let plan = run_json(dir, &["plan", "create", "Old", "--task", "x", "--json"]);
    let id = plan["id"].as_str().unwrap().to_string();

    run_ok(dir, &["plan", "add-task", &id, "y", "--required"]);
    let shown = run_json(dir, &["plan", "show", &id, "--json"]);
    assert_eq!(shown["plan"]["tasks"][1]["required"], true);

    run_ok(dir, &["plan", "archive", &id]);
    let listed = run_json(dir, &["plan", "list", "--json"]);
    assert!(listed.as_array().unwrap().is_empty());
    let listed = run_json(dir, &["plan", "list", "--all", "--json"]);
    assert_eq!(listed[0]["status"], "archived");

    let output = run(dir, &["plan", "delete", &id]);
    assert!(!output.status.success());
    run_ok(dir, &["plan", "delete", &id, "--force"]);
    let listed = run_json(dir, &["plan", "list", "--all", "--json"]);
    assert!(listed.as_array().unwrap().is_empty());
}

#[test]
fn test_common_tasks() {
    let tmp = initialized();
    let dir = tmp.path();

    run_ok(dir, &["common", "add", "Water plants"]);
    let tasks = run_json(dir, &["common", "list", "--json"]);
    let id = tasks[0]["id"].as_str().unwrap().to_string();

    run_ok(dir, &["common", "remove", &id]);
    let output = run(dir, &["common", "remove", &id]);
    assert!(!output.status.success());
}

#[test]
fn test_export_then_import_into_fresh_store() {
    let source = initialized();
    run_ok(source.path(), &["diary", "add-event", "Launch", "--date", "2024-02-02"]);
    run_ok(source.path(), &["plan", "create", "Daily", "--task", "Walk"]);
    run_ok(source.path(), &["settings", "set", "theme", "dark"]);

    let file = source.path().join("backup.json");
    run_ok(
        source.path(),
        &["data", "export", "--output", file.to_str().unwrap()],
    );
    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(exported["version"], "1.0");
    assert!(exported["exportDate"].is_string());

    let target = initialized();
    let stdout = run_ok(target.path(), &["data", "import", file.to_str().unwrap()]);
    assert!(stdout.contains("Imported"));

    let diary = run_json(target.path(), &["diary", "show", "--date", "2024-02-02", "--json"]);
    assert_eq!(diary["majorEvents"][0]["text"], "Launch");
    let plans = run_json(target.path(), &["plan", "list", "--json"]);
    assert_eq!(plans[0]["name"], "Daily");
    let settings = run_json(target.path(), &["settings", "show", "--json"]);
    assert_eq!(settings["theme"], "dark");
}

#[test]
fn test_import_rejects_invalid_document() {
    let tmp = initialized();
    let dir = tmp.path();
    run_ok(dir, &["common", "add", "Keep me"]);

    let file = dir.join("bad.json");
    std::fs::write(&file, r#"{"commonTasks": [], "plans": "nope"}"#).unwrap();
    let output = run(dir, &["data", "import", file.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid import file"));

    let tasks = run_json(dir, &["common", "list", "--json"]);
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[test]
fn test_partial_import_keeps_other_collections() {
    let tmp = initialized();
    let dir = tmp.path();
    run_ok(dir, &["common", "add", "Keep me"]);
    run_ok(dir, &["plan", "create", "Replace me", "--task", "x"]);

    let file = dir.join("plans.json");
    std::fs::write(&file, r#"{"plans": []}"#).unwrap();
    run_ok(dir, &["data", "import", file.to_str().unwrap()]);

    let plans = run_json(dir, &["plan", "list", "--all", "--json"]);
    assert!(plans.as_array().unwrap().is_empty());
    let tasks = run_json(dir, &["common", "list", "--json"]);
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[test]
fn test_clear_requires_force_and_resets_settings() {
    let tmp = initialized();
    let dir = tmp.path();
    run_ok(dir, &["settings", "set", "autoSave", "off"]);
    run_ok(dir, &["common", "add", "Gone soon"]);

    let output = run(dir, &["data", "clear"]);
    assert!(!output.status.success());

    run_ok(dir, &["data", "clear", "--force"]);
    let tasks = run_json(dir, &["common", "list", "--json"]);
    assert!(tasks.as_array().unwrap().is_empty());
    let settings = run_json(dir, &["settings", "show", "--json"]);
    assert_eq!(settings["autoSave"], true);
}

#[test]
fn test_settings_rejects_unknown_values() {
    let tmp = initialized();

    let output = run(tmp.path(), &["settings", "set", "theme", "sepia"]);
    assert!(!output.status.success());

    let output = run(tmp.path(), &["settings", "set", "fontSize", "12"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown setting"));
}

#[test]
fn test_info_reports_usage() {
    let tmp = initialized();
    run_ok(tmp.path(), &["common", "add", "Water plants"]);

    let info = run_json(tmp.path(), &["info", "--json"]);
    assert_eq!(info["quotaBytes"], 5 * 1024 * 1024);
    assert_eq!(info["commonTasks"], 1);
    assert!(info["usedBytes"].as_u64().unwrap() > 0);
    assert!(info["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn test_imported_multibyte_ids_list_cleanly() {
    let tmp = initialized();
    let dir = tmp.path();

    let file = dir.join("events.json");
    std::fs::write(
        &file,
        r#"{"globalEvents": {"事件事件事件事件": {
            "id": "事件事件事件事件",
            "text": "Lantern festival",
            "link": "",
            "createdAt": "2024-02-24T00:00:00Z",
            "updatedAt": "2024-02-24T00:00:00Z"
        }}}"#,
    )
    .unwrap();
    run_ok(dir, &["data", "import", file.to_str().unwrap()]);

    let stdout = run_ok(dir, &["event", "list"]);
    assert!(stdout.contains("事件事件事件事"));
    assert!(stdout.contains("Lantern festival"));
}

#[test]
fn test_plan_text_export() {
    let tmp = initialized();
    let dir = tmp.path();
    let plan = run_json(
        dir,
        &["plan", "create", "Morning", "-r", "Stretch", "-t", "Read", "--json"],
    );
    let id = plan["id"].as_str().unwrap().to_string();
    run_ok(dir, &["plan", "start", &id]);
    run_ok(dir, &["plan", "check", &id, "1"]);

    let stdout = run_ok(dir, &["plan", "export"]);
    assert!(stdout.starts_with("# Plans"));
    assert!(stdout.contains("## 1. Morning"));
    assert!(stdout.contains("1. ✓ Stretch (required)"));
    assert!(stdout.contains("2. ○ Read"));
    assert!(stdout.contains("Progress: 1/2 (50%)"));
    assert!(stdout.contains("Exported at:"));

    let file = dir.join("plans.txt");
    run_ok(dir, &["plan", "export", "-o", file.to_str().unwrap()]);
    let written = std::fs::read_to_string(&file).unwrap();
    assert!(written.contains("## 1. Morning"));
}

#[test]
fn test_data_export_follows_export_format() {
    let tmp = initialized();
    let dir = tmp.path();
    run_ok(dir, &["plan", "create", "Evening", "--task", "Tidy"]);

    let json = run_json(dir, &["data", "export"]);
    assert_eq!(json["plans"][0]["name"], "Evening");

    run_ok(dir, &["settings", "set", "exportFormat", "txt"]);
    let text = run_ok(dir, &["data", "export"]);
    assert!(text.starts_with("# Plans"));
    assert!(text.contains("## 1. Evening"));

    let json = run_json(dir, &["data", "export", "--format", "json"]);
    assert_eq!(json["version"], "1.0");

    let output = run(dir, &["data", "export", "--format", "pdf"]);
    assert!(!output.status.success());
}
