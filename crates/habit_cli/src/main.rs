use clap::{CommandFactory, Parser};
use habit_cli::cli::{
    CONFIG_OVERRIDE_FLAG, Cli, Command, ConfigOverrideTarget, parse_config_override,
};
use habit_core::config::{
    self, Config, ConfigOverrides, Palette, merge_overrides, palette_for_theme,
};
use habit_core::error::AppError;
use habit_core::habit_api::{self, HistoryEntry, StatsReport, TaskDetail, TaskFilter, TaskStatus};
use habit_core::model::{CompletionRecord, RecurrenceType, parse_timestamp};
use habit_core::notify::notifier_from_env;
use habit_core::period::{CompletionWindow, RecurrenceCounts, period_phrase};
use std::io::{self, BufRead};
use std::time::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "HABIT_LOG";

struct Context {
    json: bool,
    now: OffsetDateTime,
    palette: Palette,
}

#[derive(Tabled)]
struct StatusRow {
    id: String,
    title: String,
    #[tabled(rename = "type")]
    task_type: String,
    points: i64,
    status: String,
    #[tabled(rename = "fav")]
    favorite: String,
}

#[derive(Tabled)]
struct HistoryRow {
    completed_at: String,
    task: String,
    #[tabled(rename = "type")]
    task_type: String,
    category: String,
    points: i64,
}

fn status_label(status: &TaskStatus) -> String {
    match &status.error {
        Some(err) => format!("error: {}", err.code()),
        None if !status.task.is_active => "inactive".to_string(),
        None if status.completed => "done".to_string(),
        None => "open".to_string(),
    }
}

fn format_instant(instant: Option<OffsetDateTime>) -> Result<String, AppError> {
    match instant {
        Some(value) => value
            .format(&Rfc3339)
            .map_err(|err| AppError::invalid_data(err.to_string())),
        None => Ok("-".to_string()),
    }
}

fn window_json(window: &CompletionWindow) -> Result<serde_json::Value, AppError> {
    let start = window
        .start
        .map(|value| value.format(&Rfc3339))
        .transpose()
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    let end = window
        .end
        .map(|value| value.format(&Rfc3339))
        .transpose()
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    Ok(serde_json::json!({ "start": start, "end": end }))
}

fn print_statuses_plain(statuses: &[TaskStatus], palette: &Palette) {
    let done = statuses.iter().filter(|status| status.completed).count();
    let rows: Vec<StatusRow> = statuses
        .iter()
        .map(|status| StatusRow {
            id: status.task.id.clone(),
            title: status.task.title.clone(),
            task_type: status.task.task_type.clone(),
            points: status.task.points,
            status: status_label(status),
            favorite: if status.favorite { "*" } else { "" }.to_string(),
        })
        .collect();

    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        println!("{table}");
    }
    println!(
        "{}",
        palette.accentize(&format!("{} of {} tasks done", done, statuses.len()))
    );
}

fn print_statuses_json(statuses: &[TaskStatus]) {
    let payload: Vec<serde_json::Value> = statuses
        .iter()
        .map(|status| {
            serde_json::json!({
                "id": status.task.id,
                "title": status.task.title,
                "type": status.task.task_type,
                "points": status.task.points,
                "category": status.task.category,
                "is_active": status.task.is_active,
                "completed": status.completed,
                "favorite": status.favorite,
                "error": status.error.as_ref().map(AppError::code),
            })
        })
        .collect();
    println!("{}", serde_json::Value::Array(payload));
}

fn print_stats_plain(report: &StatsReport, palette: &Palette) {
    println!("today: {}", report.stats.today);
    println!("last 7 days: {}", report.stats.this_week);
    println!("this month: {}", report.stats.this_month);
    println!("total: {}", report.stats.total);
    println!("{}", palette.accentize(&format!("points: {}", report.total_points)));
}

fn print_counts_plain(counts: &RecurrenceCounts) {
    println!("daily: {}", counts.daily);
    println!("weekly: {}", counts.weekly);
    println!("monthly: {}", counts.monthly);
    println!("yearly: {}", counts.yearly);
    println!("one_time: {}", counts.one_time);
    if counts.unknown > 0 {
        println!("unknown: {}", counts.unknown);
    }
}

fn print_history_plain(history: &[HistoryEntry], palette: &Palette) {
    if history.is_empty() {
        println!("{}", palette.mutedize("no completions"));
        return;
    }

    let rows: Vec<HistoryRow> = history
        .iter()
        .map(|entry| {
            let task = entry.task.as_ref();
            HistoryRow {
                completed_at: entry.completion.completed_at.clone(),
                task: match task {
                    Some(task) if !task.title.trim().is_empty() => task.title.clone(),
                    _ => entry.completion.task_id.clone(),
                },
                task_type: task.map(|task| task.task_type.clone()).unwrap_or_default(),
                category: task
                    .and_then(|task| task.category.clone())
                    .unwrap_or_default(),
                points: entry.completion.points_earned,
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
}

fn print_history_json(history: &[HistoryEntry]) {
    let payload: Vec<serde_json::Value> = history
        .iter()
        .map(|entry| {
            serde_json::json!({
                "id": entry.completion.id,
                "task_id": entry.completion.task_id,
                "completed_at": entry.completion.completed_at,
                "points_earned": entry.completion.points_earned,
                "task": entry.task,
            })
        })
        .collect();
    println!("{}", serde_json::Value::Array(payload));
}

fn print_statuses(statuses: &[TaskStatus], context: &Context) {
    if context.json {
        print_statuses_json(statuses);
    } else {
        print_statuses_plain(statuses, &context.palette);
    }
}

fn print_completion_json(record: &CompletionRecord) {
    let json = serde_json::json!({
        "id": record.id,
        "task_id": record.task_id,
        "completed_at": record.completed_at,
        "points_earned": record.points_earned,
    });
    println!("{}", json);
}

fn print_detail_plain(detail: &TaskDetail, palette: &Palette) -> Result<(), AppError> {
    let phrase = period_phrase(detail.recurrence);
    let state = match (detail.completed, phrase.is_empty()) {
        (true, true) => "done".to_string(),
        (true, false) => format!("done {phrase}"),
        (false, true) => "open".to_string(),
        (false, false) => format!("open {phrase}"),
    };

    println!("{} ({})", detail.task.title, detail.task.id);
    println!("type: {}", detail.recurrence);
    println!("points: {}", detail.task.points);
    println!("status: {}", palette.accentize(&state));
    println!(
        "window: {} .. {}",
        format_instant(detail.window.start)?,
        format_instant(detail.window.end)?
    );

    if detail.completions.is_empty() {
        println!("{}", palette.mutedize("no completions"));
    } else {
        println!("completions:");
        for record in &detail.completions {
            println!(
                "  {} (+{})",
                palette.mutedize(&record.completed_at),
                record.points_earned
            );
        }
    }

    Ok(())
}

fn print_detail_json(detail: &TaskDetail) -> Result<(), AppError> {
    let json = serde_json::json!({
        "id": detail.task.id,
        "title": detail.task.title,
        "type": detail.recurrence,
        "points": detail.task.points,
        "completed": detail.completed,
        "window": window_json(&detail.window)?,
        "completions": detail.completions,
    });
    println!("{}", json);
    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(current.clone());
                current.clear();
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn load_effective_config(raw_overrides: &[String]) -> Result<Config, AppError> {
    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error {
        tracing::warn!(error = %err, "using default configuration");
    }

    let mut overrides = ConfigOverrides::default();
    for raw in raw_overrides {
        let parsed = parse_config_override(raw)
            .map_err(|err| AppError::invalid_input(format!("{CONFIG_OVERRIDE_FLAG}: {err}")))?;
        match parsed.target {
            ConfigOverrideTarget::Theme => overrides.theme = Some(parsed.value),
            ConfigOverrideTarget::UtcOffset => overrides.utc_offset = Some(parsed.value),
        }
    }

    Ok(merge_overrides(&loaded.config, &overrides))
}

fn build_context(cli: &Cli) -> Result<Context, AppError> {
    let config = load_effective_config(&cli.config_override)?;
    let offset = config.evaluation_offset()?;

    let now = match cli.now.as_deref() {
        Some(raw) => {
            let fallback = habit_api::evaluation_now(offset).offset();
            let parsed = parse_timestamp(raw, fallback)
                .map_err(|_| AppError::invalid_input("--now must be RFC3339"))?;
            match offset {
                Some(offset) => parsed.checked_to_offset(offset).ok_or_else(|| {
                    AppError::invalid_input("--now is out of range in the configured offset")
                })?,
                None => parsed,
            }
        }
        None => habit_api::evaluation_now(offset),
    };

    Ok(Context {
        json: cli.json,
        now,
        palette: palette_for_theme(config.theme.as_deref()),
    })
}

fn run_command(cli: Cli) -> Result<(), AppError> {
    let context = build_context(&cli)?;
    tracing::debug!(now = %context.now, "evaluating");

    match cli.command {
        Command::Status {
            task_type,
            category,
            search,
            favorites,
        } => {
            let filter = TaskFilter {
                recurrence: task_type
                    .as_deref()
                    .map(str::parse::<RecurrenceType>)
                    .transpose()?,
                category,
                search,
                favorites_only: favorites,
            };
            let statuses = habit_api::task_statuses(context.now, &filter)?;
            print_statuses(&statuses, &context);
        }
        Command::Favorites => {
            let statuses = habit_api::task_statuses(context.now, &TaskFilter::favorites())?;
            print_statuses(&statuses, &context);
        }
        Command::Favorite { id, remove } => {
            let changed = habit_api::set_favorite(&id, !remove)?;
            let id = id.trim();
            if context.json {
                println!(
                    "{}",
                    serde_json::json!({ "id": id, "favorite": !remove, "changed": changed })
                );
            } else {
                match (remove, changed) {
                    (false, true) => println!("Added to favorites: {id}"),
                    (false, false) => println!("Already a favorite: {id}"),
                    (true, true) => println!("Removed from favorites: {id}"),
                    (true, false) => println!("Not a favorite: {id}"),
                }
            }
        }
        Command::History { limit } => {
            let history = habit_api::completion_history(context.now, limit)?;
            if context.json {
                print_history_json(&history);
            } else {
                print_history_plain(&history, &context.palette);
            }
        }
        Command::Stats => {
            let report = habit_api::completion_stats(context.now)?;
            if context.json {
                let json = serde_json::to_string(&report)
                    .map_err(|err| AppError::invalid_data(err.to_string()))?;
                println!("{json}");
            } else {
                print_stats_plain(&report, &context.palette);
            }
        }
        Command::Types => {
            let counts = habit_api::recurrence_counts()?;
            if context.json {
                let json = serde_json::to_string(&counts)
                    .map_err(|err| AppError::invalid_data(err.to_string()))?;
                println!("{json}");
            } else {
                print_counts_plain(&counts);
            }
        }
        Command::Complete { id } => {
            let record = habit_api::complete_task(&id, context.now)?;
            if context.json {
                print_completion_json(&record);
            } else {
                println!(
                    "Completed task: {} (+{} points)",
                    record.task_id, record.points_earned
                );
            }
        }
        Command::Show { id } => {
            let detail = habit_api::show_task(&id, context.now)?;
            if context.json {
                print_detail_json(&detail)?;
            } else {
                print_detail_plain(&detail, &context.palette)?;
            }
        }
        Command::Remind { wait } => {
            let notifier = notifier_from_env()?;
            let outcome = habit_api::remind_pending(context.now, notifier.as_ref())?;
            for failure in &outcome.failures {
                eprintln!("ERROR: {} ({})", failure.error, failure.task_id);
            }
            if context.json {
                let ids: Vec<&str> = outcome.tasks.iter().map(|task| task.id.as_str()).collect();
                println!("{}", serde_json::json!({ "reminded": ids }));
            } else {
                for task in &outcome.tasks {
                    println!("Reminded: {} ({})", task.title, task.id);
                }
            }
            if !outcome.tasks.is_empty() {
                notifier.wait_for_actions(Duration::from_secs(wait));
            }
        }
    }

    Ok(())
}

fn run_interactive() -> Result<(), AppError> {
    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::io(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("habit".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if let Err(err) = run_command(cli) {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn main() {
    init_logging();

    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        if let Err(err) = run_interactive() {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) {
                err.exit();
            }
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
