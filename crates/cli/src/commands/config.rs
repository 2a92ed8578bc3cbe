use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use construkt_core::config::AppConfig;
use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigReport {
    command: &'static str,
    status: &'static str,
    precedence: &'static str,
    values: Vec<ConfigEntry>,
}

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: serde_json::Value,
    source: String,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key: &str, env_keys: &[&str]| {
        field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let values = effective_values(&config)
        .into_iter()
        .map(|(key, env_keys, value)| ConfigEntry { key, value, source: source(key, env_keys) })
        .collect();

    CommandResult::report(&ConfigReport {
        command: "config",
        status: "ok",
        precedence: "override > env > file > default",
        values,
    })
}

type EffectiveValue = (&'static str, &'static [&'static str], serde_json::Value);

fn effective_values(config: &AppConfig) -> Vec<EffectiveValue> {
    use serde_json::json;

    let coverage_overrides: serde_json::Map<String, serde_json::Value> = config
        .calculator
        .coverage_overrides
        .iter()
        .map(|(product_id, coverage)| (product_id.to_string(), json!(coverage)))
        .collect();

    vec![
        entry("database.url", &["CONSTRUKT_DATABASE_URL"], json!(config.database.url)),
        entry(
            "database.max_connections",
            &["CONSTRUKT_DATABASE_MAX_CONNECTIONS"],
            json!(config.database.max_connections),
        ),
        entry(
            "database.timeout_secs",
            &["CONSTRUKT_DATABASE_TIMEOUT_SECS"],
            json!(config.database.timeout_secs),
        ),
        entry("catalog.ttl_secs", &["CONSTRUKT_CATALOG_TTL_SECS"], json!(config.catalog.ttl_secs)),
        entry(
            "conversation.storage_dir",
            &["CONSTRUKT_CONVERSATION_STORAGE_DIR"],
            json!(config.conversation.storage_dir.display().to_string()),
        ),
        entry(
            "conversation.context_timeout_secs",
            &["CONSTRUKT_CONVERSATION_CONTEXT_TIMEOUT_SECS"],
            json!(config.conversation.context_timeout_secs),
        ),
        entry(
            "conversation.intent_history_limit",
            &["CONSTRUKT_CONVERSATION_INTENT_HISTORY_LIMIT"],
            json!(config.conversation.intent_history_limit),
        ),
        entry(
            "conversation.cleanup_interval_secs",
            &["CONSTRUKT_CONVERSATION_CLEANUP_INTERVAL_SECS"],
            json!(config.conversation.cleanup_interval_secs),
        ),
        entry(
            "calculator.default_coverage",
            &["CONSTRUKT_CALCULATOR_DEFAULT_COVERAGE"],
            json!(config.calculator.default_coverage),
        ),
        entry(
            "calculator.area_wastage_pct",
            &["CONSTRUKT_CALCULATOR_AREA_WASTAGE_PCT"],
            json!(config.calculator.area_wastage_pct),
        ),
        entry(
            "calculator.volume_wastage_pct",
            &["CONSTRUKT_CALCULATOR_VOLUME_WASTAGE_PCT"],
            json!(config.calculator.volume_wastage_pct),
        ),
        entry(
            "calculator.linear_wastage_pct",
            &["CONSTRUKT_CALCULATOR_LINEAR_WASTAGE_PCT"],
            json!(config.calculator.linear_wastage_pct),
        ),
        entry(
            "calculator.coverage_overrides",
            &["CONSTRUKT_CALCULATOR_COVERAGE_OVERRIDES"],
            serde_json::Value::Object(coverage_overrides),
        ),
        entry("fallback.enabled", &["CONSTRUKT_FALLBACK_ENABLED"], json!(config.fallback.enabled)),
        entry(
            "fallback.category_hint_limit",
            &["CONSTRUKT_FALLBACK_CATEGORY_HINT_LIMIT"],
            json!(config.fallback.category_hint_limit),
        ),
        entry(
            "logging.level",
            &["CONSTRUKT_LOGGING_LEVEL", "CONSTRUKT_LOG_LEVEL"],
            json!(config.logging.level),
        ),
        entry(
            "logging.format",
            &["CONSTRUKT_LOGGING_FORMAT", "CONSTRUKT_LOG_FORMAT"],
            json!(config.logging.format),
        ),
    ]
}

fn entry(
    key: &'static str,
    env_keys: &'static [&'static str],
    value: serde_json::Value,
) -> EffectiveValue {
    (key, env_keys, value)
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("construkt.toml"), PathBuf::from("config/construkt.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|env_key| env::var_os(env_key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
