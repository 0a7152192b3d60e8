use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Evaluate as of this instant (RFC3339) instead of the current time
    #[arg(long, value_name = "DATETIME", global = true)]
    pub now: Option<String>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show whether each task is done in its current period
    ///
    /// Example: habit status --type weekly --search bike
    Status {
        /// Only tasks of this recurrence type
        #[arg(long = "type", value_name = "TYPE")]
        task_type: Option<String>,
        /// Only tasks in this category
        #[arg(long)]
        category: Option<String>,
        /// Only tasks whose title or description contains this text
        #[arg(long)]
        search: Option<String>,
        /// Only favorite tasks
        #[arg(long)]
        favorites: bool,
    },
    /// Show completion counters and total points
    ///
    /// Example: habit stats
    Stats,
    /// Count tasks per recurrence type
    ///
    /// Example: habit types
    Types,
    /// Record a completion of a task
    ///
    /// Example: habit complete task-1
    Complete {
        id: String,
    },
    /// Show a task with its current window and completion history
    ///
    /// Example: habit show task-1
    Show {
        id: String,
    },
    /// Show the status of favorite tasks
    ///
    /// Example: habit favorites
    Favorites,
    /// Add a task to favorites, or remove it with --remove
    ///
    /// Example: habit favorite task-1 --remove
    Favorite {
        id: String,
        #[arg(long)]
        remove: bool,
    },
    /// List completions, newest first
    ///
    /// Example: habit history --limit 10
    History {
        /// Show at most this many completions
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Send a reminder for every task still open in its period
    ///
    /// Example: habit remind --wait 0
    Remind {
        /// Seconds to keep running for reminder actions (0 returns at once)
        #[arg(long, value_name = "SECONDS", default_value_t = 30)]
        wait: u64,
    },
}

/// Flag name used to identify config override arguments by the runtime.
pub const CONFIG_OVERRIDE_FLAG: &str = "--config-override";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    Theme,
    UtcOffset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let canonical_field = canonicalize_flag_name(key_raw)
        .ok_or_else(|| "override key cannot be empty".to_string())?;

    match canonical_field.as_str() {
        "theme" => Ok(ParsedConfigOverride {
            target: ConfigOverrideTarget::Theme,
            value,
        }),
        "utc_offset" | "offset" => {
            if value.is_empty() {
                Err("utc_offset override requires a value".to_string())
            } else {
                Ok(ParsedConfigOverride {
                    target: ConfigOverrideTarget::UtcOffset,
                    value,
                })
            }
        }
        other => Err(format!("unknown config field '{other}'")),
    }
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, ConfigOverrideTarget, parse_config_override};
    use clap::Parser;

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" THEME = Midnight ").unwrap();

        match parsed.target {
            ConfigOverrideTarget::Theme => {}
            other => panic!("unexpected target: {other:?}"),
        }

        assert_eq!(parsed.value, "Midnight");
    }

    #[test]
    fn parse_config_override_accepts_offset_spellings() {
        let dashed = parse_config_override("utc-offset=+03:00").unwrap();
        let short = parse_config_override("Offset = -05:00").unwrap();

        assert_eq!(dashed.target, ConfigOverrideTarget::UtcOffset);
        assert_eq!(dashed.value, "+03:00");
        assert_eq!(short.target, ConfigOverrideTarget::UtcOffset);
        assert_eq!(short.value, "-05:00");
    }

    #[test]
    fn parse_config_override_rejects_empty_offset() {
        let err = parse_config_override("utc_offset= ").unwrap_err();
        assert!(err.contains("requires a value"));
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("aliases.ls=value").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("theme").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "habit",
            "complete",
            "task-1",
            "--json",
            "--now",
            "2024-03-15T10:00:00Z",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.now.as_deref(), Some("2024-03-15T10:00:00Z"));
        match cli.command {
            Command::Complete { id } => assert_eq!(id, "task-1"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn status_accepts_filters() {
        let cli = Cli::try_parse_from([
            "habit",
            "status",
            "--type",
            "weekly",
            "--category",
            "environment",
            "--search",
            "bike ride",
            "--favorites",
        ])
        .unwrap();

        match cli.command {
            Command::Status {
                task_type,
                category,
                search,
                favorites,
            } => {
                assert_eq!(task_type.as_deref(), Some("weekly"));
                assert_eq!(category.as_deref(), Some("environment"));
                assert_eq!(search.as_deref(), Some("bike ride"));
                assert!(favorites);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn remind_waits_thirty_seconds_by_default() {
        let default = Cli::try_parse_from(["habit", "remind"]).unwrap();
        let immediate = Cli::try_parse_from(["habit", "remind", "--wait", "0"]).unwrap();

        assert!(matches!(default.command, Command::Remind { wait: 30 }));
        assert!(matches!(immediate.command, Command::Remind { wait: 0 }));
    }

    #[test]
    fn favorite_and_history_flags() {
        let remove = Cli::try_parse_from(["habit", "favorite", "task-1", "--remove"]).unwrap();
        let history = Cli::try_parse_from(["habit", "history", "--limit", "3"]).unwrap();

        match remove.command {
            Command::Favorite { id, remove } => {
                assert_eq!(id, "task-1");
                assert!(remove);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(matches!(history.command, Command::History { limit: Some(3) }));
    }
}
