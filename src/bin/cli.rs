use chrono::NaiveDate;
use polars::prelude::*;
use practice_scheduler::{
    DemandForecaster, InMemoryTaskStore, PatternFields, PlannerConfig, RecurrencePattern,
    RecurringTask, StaticSkillSource, TaskInstance, TaskStore, copy_tasks,
    generate_task_instances, load_recurring_tasks_from_csv, load_store_from_json,
    next_occurrence_with, save_recurring_tasks_to_csv, save_store_to_json,
};
use std::io::{self, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_csv_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// `daily:1`, `weekly:1:1,3`, `monthly:1:15`, `quarterly:15`, `annually:4:15`, `custom:-5`.
fn parse_pattern_spec(spec: &str) -> Result<PatternFields, String> {
    let mut parts = spec.split(':');
    let kind = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let int = |idx: usize| -> Result<Option<i64>, String> {
        args.get(idx)
            .map(|v| v.parse::<i64>().map_err(|_| format!("invalid number '{v}'")))
            .transpose()
    };
    let mut fields = PatternFields::new(kind);
    match kind.to_ascii_lowercase().as_str() {
        "daily" => fields.interval = int(0)?,
        "weekly" => {
            fields.interval = int(0)?;
            fields.weekdays = args
                .get(1)
                .map(|days| {
                    days.split(',')
                        .map(|d| d.trim().parse::<i64>().map_err(|_| format!("invalid weekday '{d}'")))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?;
        }
        "monthly" => {
            fields.interval = int(0)?;
            fields.day_of_month = int(1)?;
        }
        "quarterly" => fields.day_of_month = int(0)?,
        "annually" | "annual" => {
            fields.month_of_year = int(0)?;
            fields.day_of_month = int(1)?;
        }
        "custom" => fields.custom_offset_days = int(0)?,
        _ => {}
    }
    Ok(fields)
}

fn cell_text(av: &AnyValue) -> String {
    match av {
        AnyValue::Null => String::new(),
        AnyValue::Float64(v) => format!("{v:.2}"),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();
    let cells: Vec<Vec<String>> = (0..df.height())
        .map(|row_idx| {
            columns
                .iter()
                .map(|col| col.get(row_idx).map(|av| cell_text(&av)).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.len()).collect();
    for row in &cells {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.len());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let render_row = |values: &[String]| {
        let mut line = String::from("|");
        for (ci, value) in values.iter().enumerate() {
            line.push(' ');
            line.push_str(value);
            line.push_str(&" ".repeat(widths[ci].saturating_sub(value.len())));
            line.push_str(" |");
        }
        line
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&col_names));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn recurring_frame(tasks: &[RecurringTask]) -> PolarsResult<DataFrame> {
    let idx: Vec<u32> = (1..=tasks.len() as u32).collect();
    let ids: Vec<String> = tasks.iter().map(|t| short_id(t.id)).collect();
    let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    let hours: Vec<f64> = tasks.iter().map(|t| t.estimated_hours).collect();
    let skills: Vec<String> = tasks.iter().map(|t| t.required_skills.join(",")).collect();
    let patterns: Vec<String> = tasks
        .iter()
        .map(|t| t.recurrence_pattern.to_string())
        .collect();
    let active: Vec<bool> = tasks.iter().map(|t| t.is_active).collect();
    let last: Vec<Option<String>> = tasks
        .iter()
        .map(|t| t.last_generated_date.map(|d| d.to_string()))
        .collect();
    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("#"), idx).into_column(),
        Series::new(PlSmallStr::from_static("id"), ids).into_column(),
        Series::new(PlSmallStr::from_static("name"), names).into_column(),
        Series::new(PlSmallStr::from_static("hours"), hours).into_column(),
        Series::new(PlSmallStr::from_static("skills"), skills).into_column(),
        Series::new(PlSmallStr::from_static("pattern"), patterns).into_column(),
        Series::new(PlSmallStr::from_static("active"), active).into_column(),
        Series::new(PlSmallStr::from_static("last_generated"), last).into_column(),
    ])
}

fn instance_frame(instances: &[TaskInstance]) -> PolarsResult<DataFrame> {
    let idx: Vec<u32> = (1..=instances.len() as u32).collect();
    let ids: Vec<String> = instances.iter().map(|i| short_id(i.id)).collect();
    let names: Vec<&str> = instances.iter().map(|i| i.name.as_str()).collect();
    let due: Vec<String> = instances.iter().map(|i| i.due_date.to_string()).collect();
    let hours: Vec<f64> = instances.iter().map(|i| i.estimated_hours).collect();
    let status: Vec<&str> = instances.iter().map(|i| i.status.as_str()).collect();
    let kind: Vec<&str> = instances
        .iter()
        .map(|i| if i.is_ad_hoc() { "ad-hoc" } else { "recurring" })
        .collect();
    let client: Vec<String> = instances.iter().map(|i| short_id(i.client_id)).collect();
    DataFrame::new(vec![
        Series::new(PlSmallStr::from_static("#"), idx).into_column(),
        Series::new(PlSmallStr::from_static("id"), ids).into_column(),
        Series::new(PlSmallStr::from_static("name"), names).into_column(),
        Series::new(PlSmallStr::from_static("due"), due).into_column(),
        Series::new(PlSmallStr::from_static("hours"), hours).into_column(),
        Series::new(PlSmallStr::from_static("status"), status).into_column(),
        Series::new(PlSmallStr::from_static("kind"), kind).into_column(),
        Series::new(PlSmallStr::from_static("client"), client).into_column(),
    ])
}

fn print_frame(frame: PolarsResult<DataFrame>) {
    match frame {
        Ok(df) => println!("{}", render_df_as_text_table(&df)),
        Err(e) => println!("Render error: {}", e),
    }
}

/// Accepts a 1-based list position or an id prefix.
fn resolve_ref<T>(items: &[T], token: &str, id_of: impl Fn(&T) -> Uuid) -> Option<Uuid> {
    if let Ok(pos) = token.parse::<usize>() {
        return pos.checked_sub(1).and_then(|i| items.get(i)).map(&id_of);
    }
    let token = token.to_ascii_lowercase();
    let mut matches = items
        .iter()
        .map(&id_of)
        .filter(|id| id.to_string().starts_with(&token));
    let first = matches.next()?;
    matches.next().is_none().then_some(first)
}

fn print_help() {
    println!(
        "Commands:\n  help                                   Show this help\n  client [uuid]                          Show or set the current client\n  add <name> <hours> <skills_csv> <pattern>\n                                         Add a recurring task (pattern like monthly:1:15)\n  list                                   List recurring tasks\n  show <task>                            Show a recurring task as JSON\n  deactivate <task>                      Deactivate a recurring task (# or id prefix)\n  validate <pattern>                     Validate a pattern spec\n  next <task|pattern> [YYYY-MM-DD]       Next occurrence (defaults to today)\n  adhoc <name> <hours> <YYYY-MM-DD> [skills_csv]\n                                         Add an ad-hoc task instance\n  instances                              List task instances\n  demand <start> <end>                   Hours per skill in range\n  matrix <start> <end>                   Skill x month hours in range\n  generate <from> <to> [lead_days]       Generate task instances\n  copy <client_uuid> <tasks_csv> [instances_csv]\n                                         Copy tasks to another client\n  save <json|csv> <path>                 Persist store (csv: recurring tasks only)\n  load <json|csv> <path>                 Load store from disk\n  quit|exit                              Exit\n\nPatterns: daily:<n> weekly:<n>:<days 0-6 csv> monthly:<n>:<day> quarterly:<day>\n          annually:<month>:<day> custom:<offset_days>"
    );
}

fn main() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "practice_scheduler=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();

    let config = match PlannerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            PlannerConfig::default()
        }
    };
    let store = InMemoryTaskStore::new();
    let mut forecaster = DemandForecaster::new(StaticSkillSource::default(), config.skill_cache_ttl())
        .with_policy(config.occurrence_policy);
    let mut client_id = Uuid::nil();

    println!("Practice Scheduler (CLI) - type 'help' for commands\n");

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

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "client" => match parts.next() {
                Some(raw) => match Uuid::parse_str(raw) {
                    Ok(id) => {
                        client_id = id;
                        println!("Current client set to {id}.");
                    }
                    Err(_) => println!("Invalid client id"),
                },
                None => println!("Current client: {client_id}"),
            },
            "add" => {
                let (Some(name), Some(hours_s), Some(skills_s), Some(spec)) =
                    (parts.next(), parts.next(), parts.next(), parts.next())
                else {
                    println!("Usage: add <name> <hours> <skills_csv> <pattern>");
                    continue;
                };
                let Ok(hours) = hours_s.parse::<f64>() else {
                    println!("Invalid hours");
                    continue;
                };
                let pattern = match parse_pattern_spec(spec)
                    .and_then(|f| RecurrencePattern::try_from(f).map_err(|e| e.to_string()))
                {
                    Ok(p) => p,
                    Err(e) => {
                        println!("Invalid pattern: {}", e);
                        continue;
                    }
                };
                let task = RecurringTask::new(client_id, name, hours, pattern)
                    .with_skills(parse_csv_list(skills_s));
                match store.insert_recurring_task(task) {
                    Ok(task) => println!("Recurring task {} added ({}).", task.name, short_id(task.id)),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "list" => match store.recurring_tasks() {
                Ok(tasks) => print_frame(recurring_frame(&tasks)),
                Err(e) => println!("Error: {}", e),
            },
            "show" => {
                let Some(token) = parts.next() else {
                    println!("Usage: show <task>");
                    continue;
                };
                let tasks = store.recurring_tasks().unwrap_or_default();
                let found = resolve_ref(&tasks, token, |t| t.id)
                    .and_then(|id| tasks.iter().find(|t| t.id == id));
                match found.map(serde_json::to_string_pretty) {
                    Some(Ok(json)) => println!("{}", json),
                    Some(Err(e)) => println!("Error: {}", e),
                    None => println!("Task {token} not found."),
                }
            }
            "deactivate" => {
                let Some(token) = parts.next() else {
                    println!("Usage: deactivate <task>");
                    continue;
                };
                let tasks = store.recurring_tasks().unwrap_or_default();
                match resolve_ref(&tasks, token, |t| t.id) {
                    Some(id) => match store.deactivate_recurring_task(id) {
                        Ok(true) => println!("Deactivated task {}.", short_id(id)),
                        Ok(false) => println!("Task {token} not found."),
                        Err(e) => println!("Error: {}", e),
                    },
                    None => println!("Task {token} not found."),
                }
            }
            "validate" => {
                let Some(spec) = parts.next() else {
                    println!("Usage: validate <pattern>");
                    continue;
                };
                match parse_pattern_spec(spec)
                    .and_then(|f| RecurrencePattern::try_from(f).map_err(|e| e.to_string()))
                {
                    Ok(p) => println!("Valid pattern: {}", p),
                    Err(e) => println!("Invalid pattern: {}", e),
                }
            }
            "next" => {
                let Some(token) = parts.next() else {
                    println!("Usage: next <task|pattern> [YYYY-MM-DD]");
                    continue;
                };
                let from = match parts.next() {
                    Some(s) => match parse_date(s) {
                        Some(d) => d,
                        None => {
                            println!("Invalid date (YYYY-MM-DD)");
                            continue;
                        }
                    },
                    None => chrono::Local::now().date_naive(),
                };
                let pattern = if token.contains(':') {
                    parse_pattern_spec(token)
                        .and_then(|f| RecurrencePattern::try_from(f).map_err(|e| e.to_string()))
                } else {
                    let tasks = store.recurring_tasks().unwrap_or_default();
                    resolve_ref(&tasks, token, |t| t.id)
                        .and_then(|id| tasks.iter().find(|t| t.id == id))
                        .map(|t| t.recurrence_pattern.clone())
                        .ok_or_else(|| format!("task {token} not found"))
                };
                match pattern {
                    Ok(p) => match next_occurrence_with(&p, from, config.occurrence_policy) {
                        Ok(Some(date)) => println!("Next occurrence after {from}: {date}"),
                        Ok(None) => println!("No further occurrences after {from}."),
                        Err(e) => println!("Calculation error: {}", e),
                    },
                    Err(e) => println!("Error: {}", e),
                }
            }
            "adhoc" => {
                let (Some(name), Some(hours_s), Some(due_s)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    println!("Usage: adhoc <name> <hours> <YYYY-MM-DD> [skills_csv]");
                    continue;
                };
                let (Ok(hours), Some(due)) = (hours_s.parse::<f64>(), parse_date(due_s)) else {
                    println!("Invalid hours or date");
                    continue;
                };
                let mut instance = TaskInstance::new(client_id, name, due);
                instance.estimated_hours = hours;
                instance.required_skills = parts.next().map(parse_csv_list).unwrap_or_default();
                match store.insert_task_instance(instance) {
                    Ok(i) => println!("Ad-hoc task {} added ({}).", i.name, short_id(i.id)),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "instances" => match store.task_instances() {
                Ok(instances) => print_frame(instance_frame(&instances)),
                Err(e) => println!("Error: {}", e),
            },
            "demand" | "matrix" => {
                let (Some(start), Some(end)) = (
                    parts.next().and_then(parse_date),
                    parts.next().and_then(parse_date),
                ) else {
                    println!("Usage: {} <YYYY-MM-DD> <YYYY-MM-DD>", cmd);
                    continue;
                };
                let tasks = store.recurring_tasks().unwrap_or_default();
                match forecaster.demand_matrix(&tasks, start, end) {
                    Ok(matrix) if cmd == "demand" => {
                        for demand in matrix.skill_totals() {
                            println!("{:<24} {:>10.2}", demand.skill, demand.hours);
                        }
                        println!("Total hours: {:.2}", matrix.total_hours());
                    }
                    Ok(matrix) => print_frame(matrix.to_dataframe()),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "generate" => {
                let (Some(from), Some(to)) = (
                    parts.next().and_then(parse_date),
                    parts.next().and_then(parse_date),
                ) else {
                    println!("Usage: generate <from> <to> [lead_days]");
                    continue;
                };
                let lead = match parts.next().map(str::parse::<i64>) {
                    Some(Ok(v)) => v,
                    Some(Err(_)) => {
                        println!("Invalid lead_days");
                        continue;
                    }
                    None => config.lead_time_days,
                };
                match generate_task_instances(&store, from, to, lead, config.occurrence_policy) {
                    Ok(report) => {
                        println!("Generated ({})", report.to_cli_summary());
                        for err in &report.errors {
                            println!("  failed {}: {}", short_id(err.item_id), err.message);
                        }
                    }
                    Err(e) => println!("Generation error: {}", e),
                }
            }
            "copy" => {
                let (Some(target_s), Some(task_refs)) = (parts.next(), parts.next()) else {
                    println!("Usage: copy <client_uuid> <tasks_csv> [instances_csv]");
                    continue;
                };
                let Ok(target) = Uuid::parse_str(target_s) else {
                    println!("Invalid client id");
                    continue;
                };
                let tasks = store.recurring_tasks().unwrap_or_default();
                let instances = store.task_instances().unwrap_or_default();
                // Unresolvable references are passed as nil ids so they surface as errors.
                let recurring_ids: Vec<Uuid> = parse_csv_list(task_refs)
                    .iter()
                    .map(|r| resolve_ref(&tasks, r, |t| t.id).unwrap_or(Uuid::nil()))
                    .collect();
                let instance_ids: Vec<Uuid> = parts
                    .next()
                    .map(parse_csv_list)
                    .unwrap_or_default()
                    .iter()
                    .map(|r| resolve_ref(&instances, r, |i| i.id).unwrap_or(Uuid::nil()))
                    .collect();
                let report = copy_tasks(&store, &recurring_ids, &instance_ids, target);
                println!("Copied ({})", report.to_cli_summary());
                for err in &report.errors {
                    println!("  failed {}: {}", short_id(err.item_id), err.message);
                }
            }
            "save" | "load" => {
                let (Some(format), Some(path)) = (parts.next(), parts.next()) else {
                    println!("Usage: {} <json|csv> <path>", cmd);
                    continue;
                };
                let result = match (cmd, format) {
                    ("save", "json") => save_store_to_json(&store, path),
                    ("save", "csv") => store
                        .recurring_tasks()
                        .and_then(|tasks| save_recurring_tasks_to_csv(&tasks, path)),
                    ("load", "json") => {
                        load_store_from_json(path).and_then(|loaded| store.replace_with(loaded))
                    }
                    ("load", "csv") => load_recurring_tasks_from_csv(path)
                        .and_then(|tasks| InMemoryTaskStore::from_parts(tasks, Vec::new()))
                        .and_then(|loaded| store.replace_with(loaded)),
                    _ => {
                        println!("Unknown format '{}' (expected json or csv)", format);
                        continue;
                    }
                };
                match result {
                    Ok(()) if cmd == "save" => println!("Store saved to {}", path),
                    Ok(()) => {
                        forecaster.invalidate_skills();
                        println!("Store loaded from {}", path);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}
