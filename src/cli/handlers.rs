use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use super::commands::{
    CommonAction, DataAction, DiaryAction, EventAction, PlanAction, SettingsAction,
};
use crate::clock::{format_duration, Clock, SYSTEM_CLOCK};
use crate::config::ExportFormat;
use crate::controller::PlanExecutionController;
use crate::entity::{
    Diary, DiaryItem, ExecutionRecord, GlobalEvent, Plan, PlanStatus, Task,
};
use crate::error::{DaybookError, Result};
use crate::repository::{DiaryRepository, PlanProgress, PlanRepository};
use crate::storage::{KeyValueStore, SqliteBackend};
use crate::warnings::{check_thresholds, format_warning};

fn open_store(root: &Path) -> Result<KeyValueStore> {
    KeyValueStore::new(SqliteBackend::open(root)?)
}

/// First seven characters of an id, for display
fn short(id: &str) -> &str {
    id.char_indices().nth(7).map_or(id, |(i, _)| &id[..i])
}

/// Write `text` to `output`, or to stdout when there is none.
fn write_output(output: Option<PathBuf>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(&path, text)?;
            println!("Exported to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

/// Parse `YYYY-MM-DD`, defaulting to today
fn parse_date(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| DaybookError::InvalidDate(s.to_string())),
        None => Ok(SYSTEM_CLOCK.today()),
    }
}

fn required_text(text: &str, what: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DaybookError::Validation(format!(
            "{} text must not be empty",
            what
        )));
    }
    Ok(text.to_string())
}

/// Ask before a destructive action unless `force` is set.
///
/// Returns false when the user declines.
fn confirm(prompt: &str, action: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }

    eprintln!("{} [y/N] ", prompt);

    // Check if stdin is a tty for interactive confirmation
    if atty::is(atty::Stream::Stdin) {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(false);
        }
        Ok(true)
    } else {
        Err(DaybookError::ForceRequired(action.to_string()))
    }
}

fn print_storage_warnings(store: &KeyValueStore) -> Result<()> {
    for warning in check_thresholds(&store.storage_info()?) {
        eprintln!("{}", format_warning(&warning));
    }
    Ok(())
}

// ========== Init / info ==========

pub fn handle_init(dir: Option<PathBuf>) -> Result<()> {
    let root = match dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    let backend = SqliteBackend::init(&root)?;
    let _store = KeyValueStore::new(backend)?;

    println!("Initialized daybook in {}", root.display());
    Ok(())
}

pub fn handle_info(root: &Path, json: bool) -> Result<()> {
    let backend = SqliteBackend::open(root)?;
    let database = backend.path().to_path_buf();
    let file_size = backend.file_size();
    let store = KeyValueStore::new(backend)?;

    let usage = store.storage_info()?;
    let diaries = DiaryRepository::new(&store);
    let plans = PlanRepository::new(&store);
    let warnings: Vec<String> = check_thresholds(&usage)
        .iter()
        .map(format_warning)
        .collect();

    if json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct InfoJson {
            database: PathBuf,
            file_size: u64,
            used_bytes: usize,
            quota_bytes: usize,
            per_key: BTreeMap<String, usize>,
            diaries: usize,
            plans: usize,
            global_events: usize,
            common_tasks: usize,
            warnings: Vec<String>,
        }

        let info = InfoJson {
            database,
            file_size,
            used_bytes: usage.used_bytes,
            quota_bytes: usage.quota_bytes,
            per_key: usage
                .per_key
                .iter()
                .map(|(key, size)| (key.to_string(), *size))
                .collect(),
            diaries: diaries.diary_dates().len(),
            plans: plans.plans().len(),
            global_events: diaries.global_events().len(),
            common_tasks: plans.common_tasks().len(),
            warnings,
        };
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Database: {} ({} KB on disk)", database.display(), file_size / 1024);
    println!(
        "Storage:  {:.2}MB of {:.0}MB ({:.1}%)",
        usage.used_mb(),
        usage.quota_bytes as f64 / (1024.0 * 1024.0),
        usage.usage_ratio() * 100.0
    );
    for (key, size) in &usage.per_key {
        println!("  {:<18} {} bytes", key.to_string(), size);
    }
    println!();
    println!("Diaries:       {}", diaries.diary_dates().len());
    println!("Plans:         {}", plans.plans().len());
    println!("Global events: {}", diaries.global_events().len());
    println!("Common tasks:  {}", plans.common_tasks().len());

    for warning in warnings {
        eprintln!("{}", warning);
    }
    Ok(())
}

// ========== Diaries ==========

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatedDiary<'a> {
    date: NaiveDate,
    #[serde(flatten)]
    diary: &'a Diary,
}

pub fn handle_diary(root: &Path, action: DiaryAction) -> Result<()> {
    let store = open_store(root)?;
    let repo = DiaryRepository::new(&store);

    match action {
        DiaryAction::Show { date, json } => {
            show_diary(&repo, parse_date(date.as_deref())?, json)?;
        }
        DiaryAction::AddEvent { text, date } => {
            let date = parse_date(date.as_deref())?;
            let item = DiaryItem::new(required_text(&text, "event")?, SYSTEM_CLOCK.now());
            let mut diary = repo.get_diary(date);
            diary.major_events.push(item.clone());
            repo.save_diary(date, &mut diary)?;
            println!("Added event ({}) to {} - {}", short(&item.id), date, item.text);
        }
        DiaryAction::AddTodo { text, date } => {
            let date = parse_date(date.as_deref())?;
            let item = DiaryItem::new(required_text(&text, "to-do")?, SYSTEM_CLOCK.now());
            let mut diary = repo.get_diary(date);
            diary.todos.push(item.clone());
            repo.save_diary(date, &mut diary)?;
            println!("Added to-do ({}) to {} - {}", short(&item.id), date, item.text);
        }
        DiaryAction::Done { id, date } => {
            let date = parse_date(date.as_deref())?;
            let mut diary = repo.get_diary(date);
            let text = diary
                .complete_todo(&id, SYSTEM_CLOCK.now())
                .map(|item| item.text.clone())
                .ok_or_else(|| DaybookError::TaskNotFound(id.clone()))?;
            repo.save_diary(date, &mut diary)?;
            println!("Completed to-do - {}", text);
        }
        DiaryAction::Reflect { text, date } => {
            let date = parse_date(date.as_deref())?;
            let mut diary = repo.get_diary(date);
            diary.reflection = text;
            repo.save_diary(date, &mut diary)?;
            println!("Saved reflection for {}", date);
        }
        DiaryAction::Search { keyword, json } => {
            let results = repo.search_diaries(&keyword);
            if json {
                let dated: Vec<DatedDiary<'_>> = results
                    .iter()
                    .map(|(date, diary)| DatedDiary { date: *date, diary })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&dated)?);
            } else if results.is_empty() {
                println!("No results found for '{}'.", keyword);
            } else {
                println!("Search results for '{}':\n", keyword);
                for (date, diary) in &results {
                    let text = diary.search_text();
                    let snippet: String = text.chars().take(60).collect();
                    println!("  {}  {}", date, snippet);
                }
            }
        }
        DiaryAction::Stats { json } => {
            let stats = repo.statistics();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Days written:       {}", stats.total_days);
                println!("To-dos:             {}", stats.total_todos);
                println!("Completed items:    {}", stats.total_completed);
                println!("Avg reflection:     {} chars", stats.average_reflection_length);
                if let (Some(first), Some(last)) = (stats.first_diary, stats.last_diary) {
                    println!("Range:              {} to {}", first, last);
                }
            }
        }
        DiaryAction::Inherit { date } => {
            let date = parse_date(date.as_deref())?;
            let mut diary = repo.get_diary(date);
            let inherited: Vec<DiaryItem> = repo
                .inherit_yesterday_events(date)
                .into_iter()
                .filter(|item| !diary.major_events.iter().any(|e| e.text == item.text))
                .collect();
            if inherited.is_empty() {
                println!("Nothing to inherit into {}.", date);
                return Ok(());
            }
            let count = inherited.len();
            diary.major_events.extend(inherited);
            repo.save_diary(date, &mut diary)?;
            println!("Inherited {} event(s) into {}", count, date);
        }
        DiaryAction::Delete { date } => {
            let date = parse_date(Some(date.as_str()))?;
            if repo.delete_diary(date)? {
                println!("Deleted diary for {}", date);
            } else {
                println!("No diary for {}.", date);
            }
        }
        DiaryAction::Dates { json } => {
            let dates = repo.diary_dates();
            if json {
                println!("{}", serde_json::to_string_pretty(&dates)?);
            } else if dates.is_empty() {
                println!("No diaries found.");
            } else {
                for date in dates {
                    println!("  {}", date);
                }
            }
        }
    }

    Ok(())
}

fn show_diary(repo: &DiaryRepository<'_>, date: NaiveDate, json: bool) -> Result<()> {
    let diary = repo.get_diary(date);
    let linked = repo.date_associated_events(date);

    if json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct DiaryJson<'a> {
            #[serde(flatten)]
            dated: DatedDiary<'a>,
            linked_events: &'a [GlobalEvent],
        }

        let out = DiaryJson {
            dated: DatedDiary {
                date,
                diary: &diary,
            },
            linked_events: &linked,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if diary.is_empty() && linked.is_empty() {
        println!("No entries for {}.", date);
        return Ok(());
    }

    println!("Diary for {}", date);
    if !diary.major_events.is_empty() {
        println!("\nMajor events:");
        for event in &diary.major_events {
            println!("  ({}) {}", short(&event.id), event.text);
        }
    }
    if !diary.todos.is_empty() {
        println!("\nTo-dos:");
        for todo in &diary.todos {
            let mark = if todo.completed { "x" } else { " " };
            println!("  [{}] ({}) {}", mark, short(&todo.id), todo.text);
        }
    }
    if !diary.completed.is_empty() {
        println!("\nCompleted:");
        for item in &diary.completed {
            println!(
                "  - {} ({})",
                item.text,
                item.completed_at.with_timezone(&Local).format("%H:%M")
            );
        }
    }
    if !diary.reflection.is_empty() {
        println!("\nReflection:\n  {}", diary.reflection);
    }
    if !linked.is_empty() {
        println!("\nLinked events:");
        for event in &linked {
            print_event(event);
        }
    }
    Ok(())
}

// ========== Global events ==========

fn print_event(event: &GlobalEvent) {
    if event.link.is_empty() {
        println!("  ({}) {}", short(&event.id), event.text);
    } else {
        println!("  ({}) {} <{}>", short(&event.id), event.text, event.link);
    }
}

fn print_events(events: &[GlobalEvent], json: bool, empty: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(events)?);
    } else if events.is_empty() {
        println!("{}", empty);
    } else {
        for event in events {
            print_event(event);
        }
    }
    Ok(())
}

pub fn handle_event(root: &Path, action: EventAction) -> Result<()> {
    let store = open_store(root)?;
    let repo = DiaryRepository::new(&store);

    match action {
        EventAction::Create { text, link } => {
            let event = repo.create_global_event(&text, &link)?;
            println!("Created event ({}) - {}", short(&event.id), event.text);
        }
        EventAction::Update { id, text, link } => {
            let id = repo.resolve_event_id(&id)?;
            let current = repo
                .global_event(&id)
                .ok_or_else(|| DaybookError::EventNotFound(id.clone()))?;
            let event = repo.update_global_event(
                &id,
                text.as_deref().unwrap_or(&current.text),
                link.as_deref().unwrap_or(&current.link),
            )?;
            println!("Updated event ({}) - {}", short(&event.id), event.text);
        }
        EventAction::Delete { id, force } => {
            let id = repo.resolve_event_id(&id)?;
            let event = repo
                .global_event(&id)
                .ok_or_else(|| DaybookError::EventNotFound(id.clone()))?;

            let dates = repo.event_associated_dates(&id);
            if !dates.is_empty() {
                let listed: Vec<String> = dates.iter().map(NaiveDate::to_string).collect();
                return Err(DaybookError::Validation(format!(
                    "event ({}) is still linked to {}; unlink it first",
                    short(&id),
                    listed.join(", ")
                )));
            }

            let prompt = format!("Delete event ({}) - {}?", short(&id), event.text);
            if !confirm(&prompt, "delete an event", force)? {
                return Ok(());
            }
            if !repo.delete_global_event(&id)? {
                return Err(DaybookError::Validation(format!(
                    "event ({}) is still linked to a date",
                    short(&id)
                )));
            }
            println!("Deleted event ({}) - {}", short(&id), event.text);
        }
        EventAction::List { date, json } => match date {
            Some(date) => {
                let date = parse_date(Some(date.as_str()))?;
                let events = repo.date_associated_events(date);
                print_events(&events, json, &format!("No events linked to {}.", date))?;
            }
            None => print_events(&repo.global_events(), json, "No events found.")?,
        },
        EventAction::Link { id, date } => {
            let id = repo.resolve_event_id(&id)?;
            let date = parse_date(date.as_deref())?;
            if repo.associate(&id, date)? {
                println!("Linked event ({}) to {}", short(&id), date);
            } else {
                println!("Event ({}) is already linked to {}.", short(&id), date);
            }
        }
        EventAction::Unlink { id, date } => {
            let id = repo.resolve_event_id(&id)?;
            let date = parse_date(date.as_deref())?;
            if repo.dissociate(&id, date)? {
                println!("Unlinked event ({}) from {}", short(&id), date);
            } else {
                println!("Event ({}) is not linked to {}.", short(&id), date);
            }
        }
        EventAction::Dates { id, json } => {
            let id = repo.resolve_event_id(&id)?;
            let dates = repo.event_associated_dates(&id);
            if json {
                println!("{}", serde_json::to_string_pretty(&dates)?);
            } else if dates.is_empty() {
                println!("Event ({}) is not linked to any date.", short(&id));
            } else {
                for date in dates {
                    println!("  {}", date);
                }
            }
        }
        EventAction::Inheritable { date, link, json } => {
            let date = parse_date(date.as_deref())?;
            let events = repo.inheritable_events(date);
            if link {
                for event in &events {
                    repo.associate(&event.id, date)?;
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("Nothing to inherit into {}.", date);
            } else {
                if link {
                    println!("Linked {} event(s) to {}:", events.len(), date);
                }
                for event in &events {
                    print_event(event);
                }
            }
        }
    }

    Ok(())
}

// ========== Plans ==========

fn load_plan(repo: &PlanRepository<'_>, id: &str) -> Result<Plan> {
    let id = repo.resolve_plan_id(id)?;
    repo.plan(&id).ok_or(DaybookError::PlanNotFound(id))
}

/// Find a task by 1-based number or id prefix
fn resolve_task(tasks: &[Task], key: &str) -> Result<String> {
    if let Ok(n) = key.parse::<usize>() {
        if (1..=tasks.len()).contains(&n) {
            return Ok(tasks[n - 1].id.clone());
        }
    }
    let mut matches = tasks.iter().filter(|t| t.id.starts_with(key));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Ok(only.id.clone()),
        _ => Err(DaybookError::TaskNotFound(key.to_string())),
    }
}

fn run_on(repo: &PlanRepository<'_>, plan: &Plan, date: NaiveDate) -> Result<ExecutionRecord> {
    repo.plan_execution(&plan.id, date)
        .ok_or_else(|| DaybookError::ExecutionNotFound {
            plan_id: short(&plan.id).to_string(),
            date: date.to_string(),
        })
}

fn print_tasks(tasks: &[Task]) {
    for (i, task) in tasks.iter().enumerate() {
        let mark = if task.completed { "x" } else { " " };
        let required = if task.required { " (required)" } else { "" };
        println!("  {}. [{}] {}{}", i + 1, mark, task.text, required);
    }
}

fn print_progress(progress: &PlanProgress) {
    println!(
        "Progress: {}/{} ({}%)",
        progress.completed, progress.total, progress.percentage
    );
}

pub fn handle_plan(root: &Path, action: PlanAction) -> Result<()> {
    let store = open_store(root)?;
    let repo = PlanRepository::new(&store);

    match action {
        PlanAction::Create {
            name,
            tasks,
            required,
            status,
            json,
        } => {
            let mut plan = Plan::new(name.trim().to_string());
            plan.status = status.parse().map_err(DaybookError::Validation)?;
            plan.tasks = required
                .into_iter()
                .map(|text| Task::new(text.trim().to_string(), true))
                .chain(
                    tasks
                        .into_iter()
                        .map(|text| Task::new(text.trim().to_string(), false)),
                )
                .collect();
            repo.save_plan(&mut plan)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!(
                    "Created plan ({}) - {} ({} tasks)",
                    short(&plan.id),
                    plan.name,
                    plan.tasks.len()
                );
            }
        }
        PlanAction::List { all, json } => {
            let plans: Vec<Plan> = repo
                .plans()
                .into_iter()
                .filter(|p| all || p.status != PlanStatus::Archived)
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            } else if plans.is_empty() {
                println!("No plans found.");
            } else {
                let today = SYSTEM_CLOCK.today();
                println!("Plans:\n");
                for plan in &plans {
                    let progress = repo.plan_progress(plan, today);
                    let run = plan
                        .daily_executions
                        .get(&today)
                        .map(|r| format!(", today {} {}%", r.status, progress.percentage))
                        .unwrap_or_default();
                    println!(
                        "  ({}) [{}] {} - {} tasks{}",
                        short(&plan.id),
                        plan.status,
                        plan.name,
                        plan.tasks.len(),
                        run
                    );
                }
            }
        }
        PlanAction::Show { id, date, json } => {
            let plan = load_plan(&repo, &id)?;
            let date = parse_date(date.as_deref())?;
            let run = plan.daily_executions.get(&date);
            let progress = repo.plan_progress(&plan, date);

            if json {
                #[derive(Serialize)]
                struct PlanJson<'a> {
                    plan: &'a Plan,
                    date: NaiveDate,
                    execution: Option<&'a ExecutionRecord>,
                    progress: PlanProgress,
                }

                let out = PlanJson {
                    plan: &plan,
                    date,
                    execution: run,
                    progress,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!("Plan ({}) - {} [{}]", short(&plan.id), plan.name, plan.status);
            if let Some(created) = plan.created_at {
                println!("Created: {}", created.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
            }
            println!();
            match run {
                Some(record) => {
                    println!(
                        "Run on {}: {} ({})",
                        date,
                        record.status,
                        format_duration(record.elapsed())
                    );
                    print_tasks(&record.tasks);
                    print_progress(&progress);
                }
                None => {
                    println!("No run on {}.", date);
                    print_tasks(&plan.tasks);
                }
            }
        }
        PlanAction::AddTask { id, text, required } => {
            let mut plan = load_plan(&repo, &id)?;
            let task = Task::new(required_text(&text, "task")?, required);
            plan.tasks.push(task);
            repo.save_plan(&mut plan)?;
            println!(
                "Added task {} to plan ({}) - {}",
                plan.tasks.len(),
                short(&plan.id),
                text.trim()
            );
        }
        PlanAction::Delete { id, force } => {
            let plan = load_plan(&repo, &id)?;
            let prompt = format!(
                "Delete plan ({}) - {} and {} run(s)?",
                short(&plan.id),
                plan.name,
                plan.daily_executions.len()
            );
            if !confirm(&prompt, "delete a plan", force)? {
                return Ok(());
            }
            repo.delete_plan(&plan.id)?;
            println!("Deleted plan ({}) - {}", short(&plan.id), plan.name);
        }
        PlanAction::Archive { id } => {
            let plan = load_plan(&repo, &id)?;
            let plan = repo.set_plan_status(&plan.id, PlanStatus::Archived)?;
            println!("Archived plan ({}) - {}", short(&plan.id), plan.name);
        }
        PlanAction::Start { id } => {
            let plan = load_plan(&repo, &id)?;
            let mut controller = PlanExecutionController::new(PlanRepository::new(&store));
            let record = controller.start(&plan.id)?;
            println!(
                "Started plan ({}) - {} for {} ({} tasks)",
                short(&plan.id),
                plan.name,
                SYSTEM_CLOCK.today(),
                record.tasks.len()
            );
        }
        PlanAction::Check { id, task, date } => {
            let plan = load_plan(&repo, &id)?;
            let date = parse_date(date.as_deref())?;
            let record = run_on(&repo, &plan, date)?;
            let task_id = resolve_task(&record.tasks, &task)?;
            let was_done = record
                .tasks
                .iter()
                .any(|t| t.id == task_id && t.completed);

            let transition = if was_done {
                repo.reopen_task(&plan.id, &task_id, date)?
            } else {
                repo.complete_task(&plan.id, &task_id, date)?
            };

            let text = transition
                .record
                .tasks
                .iter()
                .find(|t| t.id == task_id)
                .map(|t| t.text.as_str())
                .unwrap_or_default();
            let verb = if was_done { "Reopened" } else { "Checked" };
            println!("{} task - {}", verb, text);
            print_progress(&repo.plan_progress(&plan, date));

            if transition.completed_execution() {
                println!(
                    "All tasks done. Plan ({}) - {} completed in {}",
                    short(&plan.id),
                    plan.name,
                    format_duration(transition.record.elapsed())
                );
            }
        }
        PlanAction::Stop { id, date, force } => {
            let plan = load_plan(&repo, &id)?;
            let date = parse_date(date.as_deref())?;
            run_on(&repo, &plan, date)?;

            let open = repo.incomplete_required_tasks(&plan, date);
            if !open.is_empty() {
                eprintln!("Required tasks still open:");
                for task in &open {
                    eprintln!("  - {}", task.text);
                }
                if !confirm("Stop anyway?", "stop with required tasks open", force)? {
                    return Ok(());
                }
            }

            let transition = repo.stop_plan(&plan.id, date, None)?;
            println!(
                "Stopped plan ({}) - {} after {}",
                short(&plan.id),
                plan.name,
                format_duration(transition.record.elapsed())
            );
        }
        PlanAction::Complete { id, date } => {
            let plan = load_plan(&repo, &id)?;
            let date = parse_date(date.as_deref())?;
            let transition = repo.complete_plan(&plan.id, date, None)?;
            println!(
                "Completed plan ({}) - {} in {}",
                short(&plan.id),
                plan.name,
                format_duration(transition.record.elapsed())
            );
            print_progress(&repo.plan_progress(&plan, date));
        }
        PlanAction::History { id, json } => {
            let plan = load_plan(&repo, &id)?;
            let history = repo.plan_execution_history(&plan.id);
            if json {
                let runs: BTreeMap<NaiveDate, &ExecutionRecord> =
                    history.iter().map(|(date, record)| (*date, record)).collect();
                println!("{}", serde_json::to_string_pretty(&runs)?);
            } else if history.is_empty() {
                println!("Plan ({}) has never been run.", short(&plan.id));
            } else {
                println!("Runs of {}:\n", plan.name);
                for (date, record) in &history {
                    println!(
                        "  {}  [{}] {}/{}  {}",
                        date,
                        record.status,
                        record.completed_count(),
                        record.tasks.len(),
                        format_duration(record.elapsed())
                    );
                }
            }
        }
        PlanAction::Progress { id, date, json } => {
            let plan = load_plan(&repo, &id)?;
            let date = parse_date(date.as_deref())?;
            let progress = repo.plan_progress(&plan, date);
            if json {
                println!("{}", serde_json::to_string_pretty(&progress)?);
            } else {
                print_progress(&progress);
            }
        }
        PlanAction::Export { date, output } => {
            let date = parse_date(date.as_deref())?;
            write_output(output, &repo.text_report(date))?;
        }
        PlanAction::Stats { json } => {
            let stats = repo.statistics();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                let hms = |ms: i64| format_duration(Duration::from_millis(ms.max(0) as u64));
                println!(
                    "Plans:      {} ({} draft, {} active, {} archived)",
                    stats.total, stats.draft, stats.active, stats.archived
                );
                println!(
                    "Runs:       {} completed, {} stopped, {} in progress",
                    stats.executions_completed, stats.executions_stopped, stats.executions_active
                );
                println!("Total time: {}", hms(stats.total_time));
                println!("Average:    {}", hms(stats.average_time));
            }
        }
    }

    Ok(())
}

// ========== Common tasks ==========

pub fn handle_common(root: &Path, action: CommonAction) -> Result<()> {
    let store = open_store(root)?;
    let repo = PlanRepository::new(&store);

    match action {
        CommonAction::Add { text } => {
            let task = repo.add_common_task(&text)?;
            println!("Added common task ({}) - {}", short(&task.id), task.text);
        }
        CommonAction::List { json } => {
            let tasks = repo.common_tasks();
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No common tasks.");
            } else {
                for task in &tasks {
                    println!("  ({}) {}", short(&task.id), task.text);
                }
            }
        }
        CommonAction::Remove { id } => {
            if !repo.remove_common_task(&id)? {
                return Err(DaybookError::TaskNotFound(id));
            }
            println!("Removed common task {}", id);
        }
    }

    Ok(())
}

// ========== Data ==========

pub fn handle_data(root: &Path, action: DataAction) -> Result<()> {
    let store = open_store(root)?;

    match action {
        DataAction::Export { output, format } => {
            let format = match format {
                Some(f) => f.parse::<ExportFormat>().map_err(DaybookError::Validation)?,
                None => store.settings().export_format,
            };
            let text = match format {
                ExportFormat::Json => {
                    let mut text = serde_json::to_string_pretty(&store.export_all())?;
                    text.push('\n');
                    text
                }
                ExportFormat::Txt => PlanRepository::new(&store).text_report(SYSTEM_CLOCK.today()),
            };
            write_output(output, &text)?;
        }
        DataAction::Import { file } => {
            let text = if file.as_os_str() == "-" {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                fs::read_to_string(&file)?
            };

            let summary = store.import_json(&text)?;
            let names: Vec<String> = summary.imported.iter().map(|k| k.to_string()).collect();
            println!("Imported {}", names.join(", "));
            print_storage_warnings(&store)?;
        }
        DataAction::Clear { force } => {
            if !confirm(
                "Delete all diaries, plans, events and settings?",
                "clear all data",
                force,
            )? {
                return Ok(());
            }
            store.clear()?;
            println!("Cleared all data.");
        }
    }

    Ok(())
}

// ========== Settings ==========

pub fn handle_settings(root: &Path, action: SettingsAction) -> Result<()> {
    let store = open_store(root)?;

    match action {
        SettingsAction::Show { json } => {
            let settings = store.settings();
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                println!("deviceMode:   {}", settings.device_mode);
                println!("theme:        {}", settings.theme);
                println!("autoSave:     {}", settings.auto_save);
                println!("exportFormat: {}", settings.export_format);
            }
        }
        SettingsAction::Set { field, value } => {
            let mut settings = store.settings();
            settings
                .set_field(&field, &value)
                .map_err(DaybookError::Validation)?;
            store.save_settings(&settings)?;
            println!("Set {} = {}", field, value);
        }
    }

    Ok(())
}
