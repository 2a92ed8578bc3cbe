use std::env;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use chrono::{Duration, Utc};
use construkt_cli::commands::{ask, cleanup, config, migrate, seed};
use construkt_core::domain::conversation::ConversationMemory;
use construkt_db::repositories::{ConversationRepository, FileConversationRepository};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("CONSTRUKT_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_env() {
    with_env(
        &[
            ("CONSTRUKT_DATABASE_URL", "sqlite::memory:"),
            ("CONSTRUKT_DATABASE_MAX_CONNECTIONS", "many"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn seed_reports_catalog_counts() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let url = database_url(workspace.path());
    with_env(&[("CONSTRUKT_DATABASE_URL", url.as_str())], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(
            payload["message"],
            "demo construction catalog loaded: 10 categories, 23 products"
        );
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let url = database_url(workspace.path());
    with_env(&[("CONSTRUKT_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);

        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn config_reports_effective_values_with_sources() {
    with_env(&[("CONSTRUKT_CATALOG_TTL_SECS", "60")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0, "expected config report");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        let values = payload["values"].as_array().cloned().unwrap_or_default();
        let entry = |key: &str| {
            values.iter().find(|entry| entry["key"] == key).cloned().unwrap_or(Value::Null)
        };

        assert_eq!(entry("catalog.ttl_secs")["value"], 60);
        assert_eq!(entry("catalog.ttl_secs")["source"], "env (CONSTRUKT_CATALOG_TTL_SECS)");
        assert_eq!(entry("conversation.context_timeout_secs")["value"], 3600);
        assert_eq!(entry("fallback.enabled")["value"], true);
        assert_eq!(entry("logging.format")["value"], "compact");
    });
}

#[test]
fn ask_prints_the_turn_as_json() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let url = database_url(workspace.path());
    let storage = workspace.path().join("conversations");
    let storage = storage.to_string_lossy().into_owned();
    with_env(
        &[
            ("CONSTRUKT_DATABASE_URL", url.as_str()),
            ("CONSTRUKT_CONVERSATION_STORAGE_DIR", storage.as_str()),
        ],
        || {
            assert_eq!(seed::run().exit_code, 0, "expected seed success");

            let result = ask::run("cli-test", "do you have portland cement");
            assert_eq!(result.exit_code, 0, "expected ask success");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "ask");
            assert_eq!(payload["turn"]["intent"], "product_search");
            assert_eq!(payload["turn"]["primary_product"]["name"], "Portland Cement");
            let reply = payload["reply"].as_str().unwrap_or_default();
            assert!(reply.contains("$12.50"), "unexpected reply: {reply}");
        },
    );
    let stored = workspace.path().join("conversations").read_dir().expect("conversation dir");
    assert_eq!(stored.count(), 1, "the turn should be persisted");
}

#[test]
fn ask_rejects_an_empty_message() {
    with_env(&[("CONSTRUKT_DATABASE_URL", "sqlite::memory:")], || {
        let result = ask::run("cli-test", "   ");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "bad_request");
    });
}

#[test]
fn cleanup_evicts_only_idle_conversations() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let repository = FileConversationRepository::new(workspace.path());
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    runtime.block_on(async {
        let mut idle = ConversationMemory::new("idle-user");
        idle.last_access = Utc::now() - Duration::hours(2);
        repository.save(&idle).await.expect("save idle");
        repository.save(&ConversationMemory::new("active-user")).await.expect("save active");
    });

    let storage = workspace.path().to_string_lossy().into_owned();
    with_env(&[("CONSTRUKT_CONVERSATION_STORAGE_DIR", storage.as_str())], || {
        let result = cleanup::run();
        assert_eq!(result.exit_code, 0, "expected cleanup success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "cleanup");
        assert_eq!(payload["message"], "evicted 1 expired conversations");
    });

    let remaining = runtime.block_on(repository.list_user_ids()).expect("list");
    assert_eq!(remaining, vec!["active-user".to_owned()]);
}

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("construkt.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "CONSTRUKT_DATABASE_URL",
        "CONSTRUKT_DATABASE_MAX_CONNECTIONS",
        "CONSTRUKT_DATABASE_TIMEOUT_SECS",
        "CONSTRUKT_CATALOG_TTL_SECS",
        "CONSTRUKT_CONVERSATION_STORAGE_DIR",
        "CONSTRUKT_CONVERSATION_CONTEXT_TIMEOUT_SECS",
        "CONSTRUKT_CONVERSATION_INTENT_HISTORY_LIMIT",
        "CONSTRUKT_CONVERSATION_CLEANUP_INTERVAL_SECS",
        "CONSTRUKT_CALCULATOR_DEFAULT_COVERAGE",
        "CONSTRUKT_CALCULATOR_AREA_WASTAGE_PCT",
        "CONSTRUKT_CALCULATOR_VOLUME_WASTAGE_PCT",
        "CONSTRUKT_CALCULATOR_LINEAR_WASTAGE_PCT",
        "CONSTRUKT_CALCULATOR_COVERAGE_OVERRIDES",
        "CONSTRUKT_FALLBACK_ENABLED",
        "CONSTRUKT_FALLBACK_CATEGORY_HINT_LIMIT",
        "CONSTRUKT_LOGGING_LEVEL",
        "CONSTRUKT_LOGGING_FORMAT",
        "CONSTRUKT_LOG_LEVEL",
        "CONSTRUKT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
