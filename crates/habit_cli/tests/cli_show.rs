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
            { "id": "daily-1", "title": "Walk to work", "type": "daily", "points": 5 }
        ],
        "completions": [
            { "task_id": "daily-1", "completed_at": "2024-03-14T22:30:00Z", "points_earned": 5 },
            { "task_id": "daily-1", "completed_at": "2024-03-10T08:00:00Z", "points_earned": 5 }
        ]
    });
    std::fs::write(path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
}

fn habit(store_path: &PathBuf, config_path: &PathBuf) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_habit"));
    command
        .env("HABIT_STORE_PATH", store_path)
        .env("HABIT_CONFIG_PATH", config_path)
        .env_remove("HABIT_LOG");
    command
}

#[test]
fn show_json_includes_window_and_history() {
    let store_path = temp_path("cli-show.json");
    let config_path = temp_path("cli-show-config.json");
    write_store(&store_path);

    let output = habit(&store_path, &config_path)
        .args(["show", "daily-1", "--json", "--now", "2024-03-15T10:00:00Z"])
        .output()
        .expect("failed to run show command");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let detail: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(detail["type"], "daily");
    assert_eq!(detail["completed"], false);
    assert_eq!(detail["window"]["start"], "2024-03-15T00:00:00Z");
    assert_eq!(detail["window"]["end"], "2024-03-16T00:00:00Z");
    assert_eq!(detail["completions"][0]["completed_at"], "2024-03-14T22:30:00Z");
}

#[test]
fn show_uses_offset_override_for_the_window() {
    let store_path = temp_path("cli-show-offset.json");
    let config_path = temp_path("cli-show-offset-config.json");
    write_store(&store_path);

    let output = habit(&store_path, &config_path)
        .args([
            "show",
            "daily-1",
            "--json",
            "--now",
            "2024-03-15T10:00:00Z",
            "--config-override",
            "utc_offset=+03:00",
        ])
        .output()
        .expect("failed to run show command");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let detail: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(detail["completed"], true);
    assert_eq!(detail["window"]["start"], "2024-03-15T00:00:00+03:00");
}

#[test]
fn show_reads_offset_from_config_file() {
    let store_path = temp_path("cli-show-config-file.json");
    let config_path = temp_path("cli-show-config-file-config.json");
    write_store(&store_path);
    std::fs::write(&config_path, r#"{ "theme": "light", "utc_offset": "+03:00" }"#).unwrap();

    let output = habit(&store_path, &config_path)
        .args(["show", "daily-1", "--now", "2024-03-15T10:00:00Z"])
        .output()
        .expect("failed to run show command");
    std::fs::remove_file(&store_path).ok();
    std::fs::remove_file(&config_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Walk to work (daily-1)"));
    assert!(stdout.contains("status: done today"));
    assert!(stdout.contains("window: 2024-03-15T00:00:00+03:00 .. 2024-03-16T00:00:00+03:00"));
}

#[test]
fn show_rejects_unknown_override_key() {
    let store_path = temp_path("cli-show-bad-override.json");
    let config_path = temp_path("cli-show-bad-override-config.json");
    write_store(&store_path);

    let output = habit(&store_path, &config_path)
        .args(["show", "daily-1", "--config-override", "colour=red"])
        .output()
        .expect("failed to run show command");
    std::fs::remove_file(&store_path).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input - --config-override: unknown config field 'colour'"));
}
