use crate::error::AppError;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// A completion record as stored and exchanged with the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub task_id: String,
    pub completed_at: String,
    #[serde(default)]
    pub points_earned: i64,
}

/// A completion record with its timestamp resolved to an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub task_id: String,
    pub completed_at: OffsetDateTime,
    pub points_earned: i64,
}

impl CompletionRecord {
    /// Resolves the timestamp. Timestamps without an offset are read in
    /// `local_offset`, the zone the completion is being evaluated in.
    pub fn resolve(&self, local_offset: UtcOffset) -> Result<Completion, AppError> {
        Ok(Completion {
            task_id: self.task_id.clone(),
            completed_at: parse_timestamp(&self.completed_at, local_offset)?,
            points_earned: self.points_earned,
        })
    }
}

pub fn resolve_all(
    records: &[CompletionRecord],
    local_offset: UtcOffset,
) -> Result<Vec<Completion>, AppError> {
    records
        .iter()
        .map(|record| record.resolve(local_offset))
        .collect()
}

pub fn parse_timestamp(raw: &str, local_offset: UtcOffset) -> Result<OffsetDateTime, AppError> {
    let trimmed = raw.trim();
    if let Ok(instant) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(instant);
    }

    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let naive_fraction =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

    PrimitiveDateTime::parse(trimmed, &naive)
        .or_else(|_| PrimitiveDateTime::parse(trimmed, &naive_fraction))
        .map(|value| value.assume_offset(local_offset))
        .map_err(|_| AppError::invalid_data(format!("completed_at must be RFC3339: {trimmed}")))
}

#[cfg(test)]
mod tests {
    use super::{CompletionRecord, parse_timestamp};
    use time::macros::{datetime, offset};

    #[test]
    fn parses_rfc3339_timestamp() {
        let parsed = parse_timestamp("2024-03-11T09:00:00Z", offset!(+3)).unwrap();
        assert_eq!(parsed, datetime!(2024-03-11 09:00:00 UTC));
    }

    #[test]
    fn naive_timestamp_uses_local_offset() {
        let parsed = parse_timestamp("2024-03-11T09:00:00", offset!(+3)).unwrap();
        assert_eq!(parsed, datetime!(2024-03-11 09:00:00 +3));

        let fractional = parse_timestamp("2024-03-11T09:00:00.250000", offset!(+3)).unwrap();
        assert_eq!(fractional, datetime!(2024-03-11 09:00:00.25 +3));
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let err = parse_timestamp("yesterday", offset!(UTC)).unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn record_reads_backend_field_names() {
        let record: CompletionRecord = serde_json::from_value(serde_json::json!({
            "_id": "c-1",
            "task_id": "t-1",
            "completed_at": "2024-03-11T09:00:00Z",
            "points_earned": 10
        }))
        .unwrap();

        let resolved = record.resolve(offset!(UTC)).unwrap();
        assert_eq!(record.id.as_deref(), Some("c-1"));
        assert_eq!(resolved.task_id, "t-1");
        assert_eq!(resolved.points_earned, 10);
    }
}
