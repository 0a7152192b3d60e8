use crate::error::AppError;
use crate::model::{CompletionRecord, RecurrenceType, Task, resolve_all};
use crate::notify::{Notifier, activation_argument};
use crate::period::{
    CompletionStats, CompletionWindow, RecurrenceCounts, aggregate_completion_stats,
    count_by_recurrence, current_window, is_task_currently_completed, period_phrase, total_points,
};
use crate::storage::json_store::{self, Snapshot};
use serde::Serialize;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

/// A task with its standing in the current completion window.
///
/// `error` is set when the task could not be evaluated; such a task is
/// reported as not completed.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub task: Task,
    pub completed: bool,
    pub favorite: bool,
    pub error: Option<AppError>,
}

/// Narrows a task listing. Every criterion that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub recurrence: Option<RecurrenceType>,
    /// Compared ignoring ASCII case.
    pub category: Option<String>,
    /// Case-insensitive substring of the title or the description.
    pub search: Option<String>,
    pub favorites_only: bool,
}

impl TaskFilter {
    pub fn favorites() -> Self {
        TaskFilter {
            favorites_only: true,
            ..TaskFilter::default()
        }
    }

    fn matches(&self, task: &Task, snapshot: &Snapshot) -> bool {
        if let Some(recurrence) = self.recurrence
            && task.recurrence().ok() != Some(recurrence)
        {
            return false;
        }

        if let Some(category) = self.category.as_deref()
            && !task
                .category
                .as_deref()
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(category.trim()))
        {
            return false;
        }

        if let Some(search) = self.search.as_deref() {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty()
                && !task.title.to_lowercase().contains(&needle)
                && !task.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        !self.favorites_only || snapshot.is_favorite(&task.id)
    }
}

/// A completion next to the task it belongs to, if that task still exists.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub completion: CompletionRecord,
    pub task: Option<Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub stats: CompletionStats,
    pub total_points: i64,
}

#[derive(Debug, Clone)]
pub struct TaskDetail {
    pub task: Task,
    pub recurrence: RecurrenceType,
    pub window: CompletionWindow,
    pub completed: bool,
    /// Newest first.
    pub completions: Vec<CompletionRecord>,
}

#[derive(Debug)]
pub struct ReminderOutcome {
    pub tasks: Vec<Task>,
    pub failures: Vec<ReminderFailure>,
}

#[derive(Debug)]
pub struct ReminderFailure {
    pub task_id: String,
    pub error: AppError,
}

/// The current instant in `offset`, or in the local offset when `None`.
pub fn evaluation_now(offset: Option<UtcOffset>) -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(offset.unwrap_or_else(local_offset))
}

fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

pub fn task_statuses(now: OffsetDateTime, filter: &TaskFilter) -> Result<Vec<TaskStatus>, AppError> {
    let path = json_store::store_path()?;
    task_statuses_with_path(&path, now, filter)
}

pub fn completion_stats(now: OffsetDateTime) -> Result<StatsReport, AppError> {
    let path = json_store::store_path()?;
    completion_stats_with_path(&path, now)
}

pub fn recurrence_counts() -> Result<RecurrenceCounts, AppError> {
    let path = json_store::store_path()?;
    recurrence_counts_with_path(&path)
}

pub fn complete_task(id: &str, now: OffsetDateTime) -> Result<CompletionRecord, AppError> {
    let path = json_store::store_path()?;
    complete_task_with_path(&path, id, now)
}

pub fn show_task(id: &str, now: OffsetDateTime) -> Result<TaskDetail, AppError> {
    let path = json_store::store_path()?;
    show_task_with_path(&path, id, now)
}

pub fn pending_tasks(now: OffsetDateTime) -> Result<Vec<Task>, AppError> {
    let path = json_store::store_path()?;
    pending_tasks_with_path(&path, now)
}

pub fn remind_pending(
    now: OffsetDateTime,
    notifier: &dyn Notifier,
) -> Result<ReminderOutcome, AppError> {
    let path = json_store::store_path()?;
    remind_pending_with_path(&path, now, notifier)
}

/// Stars or unstars a task. Returns whether the favorites changed.
pub fn set_favorite(id: &str, favorite: bool) -> Result<bool, AppError> {
    let path = json_store::store_path()?;
    set_favorite_with_path(&path, id, favorite)
}

pub fn completion_history(
    now: OffsetDateTime,
    limit: Option<usize>,
) -> Result<Vec<HistoryEntry>, AppError> {
    let path = json_store::store_path()?;
    completion_history_with_path(&path, now, limit)
}

fn task_statuses_with_path(
    path: &Path,
    now: OffsetDateTime,
    filter: &TaskFilter,
) -> Result<Vec<TaskStatus>, AppError> {
    let snapshot = json_store::load_snapshot(path)?;
    let completions = resolve_all(&snapshot.completions, now.offset())?;

    let statuses = snapshot
        .tasks
        .iter()
        .filter(|task| filter.matches(task, &snapshot))
        .map(|task| {
            let favorite = snapshot.is_favorite(&task.id);
            match is_task_currently_completed(task, &completions, now) {
                Ok(completed) => TaskStatus {
                    task: task.clone(),
                    completed,
                    favorite,
                    error: None,
                },
                Err(err) => {
                    tracing::warn!(task_id = %task.id, error = %err, "cannot evaluate task window");
                    TaskStatus {
                        task: task.clone(),
                        completed: false,
                        favorite,
                        error: Some(err),
                    }
                }
            }
        })
        .collect();

    Ok(statuses)
}

fn completion_stats_with_path(path: &Path, now: OffsetDateTime) -> Result<StatsReport, AppError> {
    let snapshot = json_store::load_snapshot(path)?;
    let completions = resolve_all(&snapshot.completions, now.offset())?;

    Ok(StatsReport {
        stats: aggregate_completion_stats(&completions, now),
        total_points: total_points(&completions),
    })
}

fn recurrence_counts_with_path(path: &Path) -> Result<RecurrenceCounts, AppError> {
    let snapshot = json_store::load_snapshot(path)?;
    Ok(count_by_recurrence(&snapshot.tasks))
}

fn complete_task_with_path(
    path: &Path,
    id: &str,
    now: OffsetDateTime,
) -> Result<CompletionRecord, AppError> {
    let trimmed_id = id.trim();
    if trimmed_id.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }

    let mut snapshot = json_store::load_snapshot(path)?;
    let task = snapshot
        .task(trimmed_id)
        .cloned()
        .ok_or_else(|| AppError::invalid_input("task not found"))?;

    if !task.is_active {
        return Err(AppError::invalid_input("task is not active"));
    }

    let recurrence = task.recurrence()?;
    let completions = resolve_all(&snapshot.completions, now.offset())?;
    if is_task_currently_completed(&task, &completions, now)? {
        return Err(AppError::invalid_input(already_completed_message(recurrence)));
    }

    let completed_at = now
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    let record = CompletionRecord {
        id: Some(format!("completion-{}", now.unix_timestamp_nanos())),
        task_id: task.id.clone(),
        completed_at,
        points_earned: task.points,
    };

    snapshot.completions.push(record.clone());
    json_store::save_snapshot(path, &snapshot)?;
    tracing::debug!(task_id = %task.id, points = task.points, "recorded completion");

    Ok(record)
}

fn already_completed_message(recurrence: RecurrenceType) -> String {
    match period_phrase(recurrence) {
        "" => "task already completed".to_string(),
        phrase => format!("task already completed {phrase}"),
    }
}

fn show_task_with_path(path: &Path, id: &str, now: OffsetDateTime) -> Result<TaskDetail, AppError> {
    let trimmed_id = id.trim();
    if trimmed_id.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }

    let snapshot = json_store::load_snapshot(path)?;
    let task = snapshot
        .task(trimmed_id)
        .cloned()
        .ok_or_else(|| AppError::invalid_input("task not found"))?;
    let recurrence = task.recurrence()?;

    let mut history = Vec::new();
    for record in &snapshot.completions {
        if record.task_id == task.id {
            let resolved = record.resolve(now.offset())?;
            history.push((resolved, record.clone()));
        }
    }
    history.sort_by(|(left, _), (right, _)| right.completed_at.cmp(&left.completed_at));

    let window = current_window(recurrence, now);
    let completed = history
        .iter()
        .any(|(resolved, _)| window.contains(resolved.completed_at));

    Ok(TaskDetail {
        task,
        recurrence,
        window,
        completed,
        completions: history.into_iter().map(|(_, record)| record).collect(),
    })
}

fn set_favorite_with_path(path: &Path, id: &str, favorite: bool) -> Result<bool, AppError> {
    let trimmed_id = id.trim();
    if trimmed_id.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }

    let mut snapshot = json_store::load_snapshot(path)?;
    let changed = if favorite {
        if snapshot.task(trimmed_id).is_none() {
            return Err(AppError::invalid_input("task not found"));
        }
        if snapshot.is_favorite(trimmed_id) {
            false
        } else {
            snapshot.favorite_tasks.push(trimmed_id.to_string());
            true
        }
    } else {
        let before = snapshot.favorite_tasks.len();
        snapshot.favorite_tasks.retain(|existing| existing != trimmed_id);
        snapshot.favorite_tasks.len() != before
    };

    if changed {
        json_store::save_snapshot(path, &snapshot)?;
        tracing::debug!(task_id = trimmed_id, favorite, "updated favorites");
    }

    Ok(changed)
}

fn completion_history_with_path(
    path: &Path,
    now: OffsetDateTime,
    limit: Option<usize>,
) -> Result<Vec<HistoryEntry>, AppError> {
    let snapshot = json_store::load_snapshot(path)?;

    let mut history = Vec::with_capacity(snapshot.completions.len());
    for record in &snapshot.completions {
        let resolved = record.resolve(now.offset())?;
        history.push((resolved.completed_at, record));
    }
    history.sort_by(|(left, _), (right, _)| right.cmp(left));

    Ok(history
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(_, record)| HistoryEntry {
            completion: record.clone(),
            task: snapshot.task(&record.task_id).cloned(),
        })
        .collect())
}

fn pending_tasks_with_path(path: &Path, now: OffsetDateTime) -> Result<Vec<Task>, AppError> {
    let pending = task_statuses_with_path(path, now, &TaskFilter::default())?
        .into_iter()
        .filter(|status| status.task.is_active && !status.completed && status.error.is_none())
        .map(|status| status.task)
        .collect();
    Ok(pending)
}

fn remind_pending_with_path(
    path: &Path,
    now: OffsetDateTime,
    notifier: &dyn Notifier,
) -> Result<ReminderOutcome, AppError> {
    let mut reminded = Vec::new();
    let mut failures = Vec::new();

    for task in pending_tasks_with_path(path, now)? {
        let action = activation_argument(&task.id);
        match notifier.notify_with_action(&task, &action) {
            Ok(_) => reminded.push(task),
            Err(err) => failures.push(ReminderFailure {
                task_id: task.id.clone(),
                error: err,
            }),
        }
    }

    Ok(ReminderOutcome {
        tasks: reminded,
        failures,
    })
}
