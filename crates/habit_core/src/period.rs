//! Completion windows for recurring tasks.
//!
//! Every function here is pure: the reference instant `now` is always
//! passed in and all calendar arithmetic happens in `now`'s UTC offset.

use crate::error::AppError;
use crate::model::{Completion, RecurrenceType, Task};
use serde::Serialize;
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};

/// Half-open interval `[start, end)`. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionWindow {
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}

impl CompletionWindow {
    /// The one-time window. It has no lower bound at all rather than
    /// starting at the Unix epoch, so completions dated before 1970 count.
    pub const UNBOUNDED: CompletionWindow = CompletionWindow {
        start: None,
        end: None,
    };

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.start.is_none_or(|start| instant >= start) && self.end.is_none_or(|end| instant < end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionStats {
    pub today: usize,
    pub this_week: usize,
    pub this_month: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecurrenceCounts {
    pub daily: usize,
    pub weekly: usize,
    pub monthly: usize,
    pub yearly: usize,
    pub one_time: usize,
    pub unknown: usize,
}

/// The window a task of `recurrence` must be completed in, as of `now`.
pub fn current_window(recurrence: RecurrenceType, now: OffsetDateTime) -> CompletionWindow {
    let offset = now.offset();
    let today = now.date();

    match recurrence {
        RecurrenceType::Daily => {
            let start = start_of_day(today, offset);
            CompletionWindow {
                start: Some(start),
                end: start.checked_add(Duration::DAY),
            }
        }
        RecurrenceType::Weekly => {
            // Sunday counts as day 6 of the week that began on Monday.
            let days_since_monday = i64::from(now.weekday().number_days_from_monday());
            let start = today
                .checked_sub(Duration::days(days_since_monday))
                .map(|monday| start_of_day(monday, offset));
            CompletionWindow {
                start,
                end: start.and_then(|monday| monday.checked_add(Duration::WEEK)),
            }
        }
        RecurrenceType::Monthly => {
            let (next_year, next_month) = match today.month() {
                Month::December => (today.year() + 1, Month::January),
                month => (today.year(), month.next()),
            };
            CompletionWindow {
                start: Some(start_of_day(first_of_month(today), offset)),
                end: Date::from_calendar_date(next_year, next_month, 1)
                    .ok()
                    .map(|date| start_of_day(date, offset)),
            }
        }
        RecurrenceType::Yearly => {
            let first_of_year = today - Duration::days(i64::from(today.ordinal()) - 1);
            CompletionWindow {
                start: Some(start_of_day(first_of_year, offset)),
                end: Date::from_calendar_date(today.year() + 1, Month::January, 1)
                    .ok()
                    .map(|date| start_of_day(date, offset)),
            }
        }
        RecurrenceType::OneTime => CompletionWindow::UNBOUNDED,
    }
}

/// How the active window reads in a sentence; empty for one-time tasks.
pub fn period_phrase(recurrence: RecurrenceType) -> &'static str {
    match recurrence {
        RecurrenceType::Daily => "today",
        RecurrenceType::Weekly => "this week",
        RecurrenceType::Monthly => "this month",
        RecurrenceType::Yearly => "this year",
        RecurrenceType::OneTime => "",
    }
}

/// Whether `completed_at` falls in the window active at `now`.
pub fn is_within_current_window(
    recurrence: RecurrenceType,
    completed_at: OffsetDateTime,
    now: OffsetDateTime,
) -> bool {
    current_window(recurrence, now).contains(completed_at)
}

/// Whether `task` has a completion inside its active window.
///
/// Fails only when the task's type is not a known recurrence.
pub fn is_task_currently_completed(
    task: &Task,
    completions: &[Completion],
    now: OffsetDateTime,
) -> Result<bool, AppError> {
    let window = current_window(task.recurrence()?, now);
    Ok(completions
        .iter()
        .filter(|completion| completion.task_id == task.id)
        .any(|completion| window.contains(completion.completed_at)))
}

/// Display counters over every completion, regardless of task type.
///
/// `today` compares calendar dates and `this_week` is a rolling seven
/// days, so neither agrees with the daily or the Monday-anchored weekly
/// task window.
pub fn aggregate_completion_stats(completions: &[Completion], now: OffsetDateTime) -> CompletionStats {
    let offset = now.offset();
    let today = now.date();
    let today_start = start_of_day(today, offset);
    let today_end = today_start.checked_add(Duration::DAY);
    let week_start = now.checked_sub(Duration::days(7));
    let month_start = start_of_day(first_of_month(today), offset);

    let mut stats = CompletionStats {
        total: completions.len(),
        ..CompletionStats::default()
    };

    for completion in completions {
        let completed_at = completion.completed_at;
        // Same calendar date in `now`'s offset.
        if completed_at >= today_start && today_end.is_none_or(|end| completed_at < end) {
            stats.today += 1;
        }
        if week_start.is_none_or(|start| completed_at >= start) {
            stats.this_week += 1;
        }
        if completed_at >= month_start {
            stats.this_month += 1;
        }
    }

    stats
}

/// Sum of `points_earned` over all completions.
pub fn total_points(completions: &[Completion]) -> i64 {
    completions.iter().map(|completion| completion.points_earned).sum()
}

/// Tasks per recurrence type; unreadable types land in `unknown`.
pub fn count_by_recurrence(tasks: &[Task]) -> RecurrenceCounts {
    let mut counts = RecurrenceCounts::default();
    for task in tasks {
        match task.recurrence() {
            Ok(RecurrenceType::Daily) => counts.daily += 1,
            Ok(RecurrenceType::Weekly) => counts.weekly += 1,
            Ok(RecurrenceType::Monthly) => counts.monthly += 1,
            Ok(RecurrenceType::Yearly) => counts.yearly += 1,
            Ok(RecurrenceType::OneTime) => counts.one_time += 1,
            Err(_) => counts.unknown += 1,
        }
    }
    counts
}

fn start_of_day(date: Date, offset: UtcOffset) -> OffsetDateTime {
    date.midnight().assume_offset(offset)
}

fn first_of_month(date: Date) -> Date {
    date - Duration::days(i64::from(date.day()) - 1)
}
