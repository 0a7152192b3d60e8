use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("habit-{nanos}-{file_name}"))
}

fn write_store(path: &PathBuf) {
    let content = serde_json::json!({
        "schema_version": 1,
        "tasks": [
            { "id": "daily-1", "title": "Walk to work", "type": "daily", "points": 5 },
            { "id": "weekly-1", "title": "Sort recycling", "type": "weekly", "points": 20 },
            { "id": "yearly-1", "title": "Energy audit", "type": "yearly", "points": 200 }
        ],
        "completions": [
            { "task_id": "daily-1", "completed_at": "2024-03-15T08:00:00Z", "points_earned": 5 },
            { "task_id": "weekly-1", "completed_at": "2024-03-11T09:00:00Z", "points_earned": 20 },
            { "task_id": "weekly-1", "completed_at": "2024-03-02T09:00:00Z", "points_earned": 20 },
            { "task_id": "yearly-1", "completed_at": "2023-06-01T09:00:00Z", "points_earned": 200 }
        ]
    });
    std::fs::write(path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
}

fn habit(store_path: &PathBuf) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_habit"));
    command
        .env("HABIT_STORE_PATH", store_path)
        .env("HABIT_CONFIG_PATH", temp_path("missing-config.json"))
        .env_remove("HABIT_LOG");
    command
}

#[test]
fn stats_json_reports_counters_and_points() {
    let store_path = temp_path("cli-stats.json");
    write_store(&store_path);

    let output = habit(&store_path)
        .args(["stats", "--json", "--now", "2024-03-15T10:00:00Z"])
        .output()
        .expect("failed to run stats command");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stats: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(stats["today"], 1);
    assert_eq!(stats["this_week"], 2);
    assert_eq!(stats["this_month"], 3);
    assert_eq!(stats["total"], 4);
    assert_eq!(stats["total_points"], 245);
}

#[test]
fn stats_plain_lists_counters() {
    let store_path = temp_path("cli-stats-plain.json");
    write_store(&store_path);

    let output = habit(&store_path)
        .args(["stats", "--now", "2024-03-15T10:00:00Z"])
        .output()
        .expect("failed to run stats command");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("today: 1"));
    assert!(stdout.contains("last 7 days: 2"));
    assert!(stdout.contains("points: 245"));
}

#[test]
fn types_json_counts_recurrences() {
    let store_path = temp_path("cli-types.json");
    write_store(&store_path);

    let output = habit(&store_path)
        .args(["types", "--json"])
        .output()
        .expect("failed to run types command");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let counts: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(counts["daily"], 1);
    assert_eq!(counts["weekly"], 1);
    assert_eq!(counts["monthly"], 0);
    assert_eq!(counts["yearly"], 1);
    assert_eq!(counts["unknown"], 0);
}

#[test]
fn stats_survive_far_future_completions_in_a_positive_offset() {
    let store_path = temp_path("cli-stats-far-future.json");
    let content = serde_json::json!({
        "schema_version": 1,
        "tasks": [{ "id": "daily-1", "title": "Walk to work", "type": "daily", "points": 5 }],
        "completions": [
            { "task_id": "daily-1", "completed_at": "9999-12-31T23:30:00Z", "points_earned": 5 }
        ]
    });
    std::fs::write(&store_path, content.to_string()).unwrap();

    let output = habit(&store_path)
        .args([
            "stats",
            "--json",
            "--now",
            "2024-03-15T10:00:00Z",
            "--config-override",
            "utc_offset=+03:00",
        ])
        .output()
        .expect("failed to run stats command");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stats: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(stats["today"], 0);
    assert_eq!(stats["total"], 1);
}

#[test]
fn now_past_the_calendar_end_in_the_offset_is_rejected() {
    let store_path = temp_path("cli-stats-now-range.json");
    write_store(&store_path);

    let output = habit(&store_path)
        .args([
            "stats",
            "--now",
            "9999-12-31T23:30:00Z",
            "--config-override",
            "utc_offset=+03:00",
        ])
        .output()
        .expect("failed to run stats command");
    std::fs::remove_file(&store_path).ok();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid_input - --now is out of range"));
}

#[test]
fn stats_count_completions_of_deleted_tasks() {
    let store_path = temp_path("cli-stats-orphan.json");
    let content = serde_json::json!({
        "schema_version": 1,
        "tasks": [{ "id": "daily-1", "title": "Walk to work", "type": "daily", "points": 5 }],
        "completions": [
            { "task_id": "daily-1", "completed_at": "2024-03-15T08:00:00Z", "points_earned": 5 },
            { "task_id": "gone", "completed_at": "2024-03-15T09:00:00Z", "points_earned": 40 }
        ]
    });
    std::fs::write(&store_path, content.to_string()).unwrap();

    let output = habit(&store_path)
        .args(["stats", "--json", "--now", "2024-03-15T10:00:00Z"])
        .output()
        .expect("failed to run stats command");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stats: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(stats["today"], 2);
    assert_eq!(stats["total_points"], 45);
}
