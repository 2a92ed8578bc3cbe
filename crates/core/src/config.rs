use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub conversation: ConversationConfig,
    pub calculator: CalculatorConfig,
    pub fallback: FallbackConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub storage_dir: PathBuf,
    pub context_timeout_secs: u64,
    pub intent_history_limit: usize,
    pub cleanup_interval_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalculatorConfig {
    pub default_coverage: f64,
    pub area_wastage_pct: f64,
    pub volume_wastage_pct: f64,
    pub linear_wastage_pct: f64,
    /// Coverage per unit for products whose catalog row carries none.
    pub coverage_overrides: BTreeMap<i64, f64>,
}

#[derive(Clone, Debug)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub category_hint_limit: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub context_timeout_secs: Option<u64>,
    pub catalog_ttl_secs: Option<u64>,
    pub fallback_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            default_coverage: 10.0,
            area_wastage_pct: 10.0,
            volume_wastage_pct: 15.0,
            linear_wastage_pct: 5.0,
            coverage_overrides: BTreeMap::from([(8, 0.02)]),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://construkt.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            catalog: CatalogConfig { ttl_secs: 300 },
            conversation: ConversationConfig {
                storage_dir: PathBuf::from("conversation_data"),
                context_timeout_secs: 3600,
                intent_history_limit: 20,
                cleanup_interval_secs: 300,
            },
            calculator: CalculatorConfig::default(),
            fallback: FallbackConfig { enabled: true, category_hint_limit: 5 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("construkt.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(ttl_secs) = catalog.ttl_secs {
                self.catalog.ttl_secs = ttl_secs;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(storage_dir) = conversation.storage_dir {
                self.conversation.storage_dir = storage_dir;
            }
            if let Some(context_timeout_secs) = conversation.context_timeout_secs {
                self.conversation.context_timeout_secs = context_timeout_secs;
            }
            if let Some(intent_history_limit) = conversation.intent_history_limit {
                self.conversation.intent_history_limit = intent_history_limit;
            }
            if let Some(cleanup_interval_secs) = conversation.cleanup_interval_secs {
                self.conversation.cleanup_interval_secs = cleanup_interval_secs;
            }
        }

        if let Some(calculator) = patch.calculator {
            if let Some(default_coverage) = calculator.default_coverage {
                self.calculator.default_coverage = default_coverage;
            }
            if let Some(area_wastage_pct) = calculator.area_wastage_pct {
                self.calculator.area_wastage_pct = area_wastage_pct;
            }
            if let Some(volume_wastage_pct) = calculator.volume_wastage_pct {
                self.calculator.volume_wastage_pct = volume_wastage_pct;
            }
            if let Some(linear_wastage_pct) = calculator.linear_wastage_pct {
                self.calculator.linear_wastage_pct = linear_wastage_pct;
            }
            if let Some(overrides) = calculator.coverage_overrides {
                let mut parsed = BTreeMap::new();
                for (product_id, coverage) in overrides {
                    let id = product_id.trim().parse::<i64>().map_err(|_| {
                        ConfigError::Validation(format!(
                            "calculator.coverage_overrides key `{product_id}` must be a product id"
                        ))
                    })?;
                    parsed.insert(id, coverage);
                }
                self.calculator.coverage_overrides = parsed;
            }
        }

        if let Some(fallback) = patch.fallback {
            if let Some(enabled) = fallback.enabled {
                self.fallback.enabled = enabled;
            }
            if let Some(category_hint_limit) = fallback.category_hint_limit {
                self.fallback.category_hint_limit = category_hint_limit;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CONSTRUKT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CONSTRUKT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CONSTRUKT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CONSTRUKT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CONSTRUKT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CONSTRUKT_CATALOG_TTL_SECS") {
            self.catalog.ttl_secs = parse_u64("CONSTRUKT_CATALOG_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("CONSTRUKT_CONVERSATION_STORAGE_DIR") {
            self.conversation.storage_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("CONSTRUKT_CONVERSATION_CONTEXT_TIMEOUT_SECS") {
            self.conversation.context_timeout_secs =
                parse_u64("CONSTRUKT_CONVERSATION_CONTEXT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CONSTRUKT_CONVERSATION_INTENT_HISTORY_LIMIT") {
            self.conversation.intent_history_limit =
                parse_u32("CONSTRUKT_CONVERSATION_INTENT_HISTORY_LIMIT", &value)? as usize;
        }
        if let Some(value) = read_env("CONSTRUKT_CONVERSATION_CLEANUP_INTERVAL_SECS") {
            self.conversation.cleanup_interval_secs =
                parse_u64("CONSTRUKT_CONVERSATION_CLEANUP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("CONSTRUKT_CALCULATOR_DEFAULT_COVERAGE") {
            self.calculator.default_coverage =
                parse_f64("CONSTRUKT_CALCULATOR_DEFAULT_COVERAGE", &value)?;
        }
        if let Some(value) = read_env("CONSTRUKT_CALCULATOR_AREA_WASTAGE_PCT") {
            self.calculator.area_wastage_pct =
                parse_f64("CONSTRUKT_CALCULATOR_AREA_WASTAGE_PCT", &value)?;
        }
        if let Some(value) = read_env("CONSTRUKT_CALCULATOR_VOLUME_WASTAGE_PCT") {
            self.calculator.volume_wastage_pct =
                parse_f64("CONSTRUKT_CALCULATOR_VOLUME_WASTAGE_PCT", &value)?;
        }
        if let Some(value) = read_env("CONSTRUKT_CALCULATOR_LINEAR_WASTAGE_PCT") {
            self.calculator.linear_wastage_pct =
                parse_f64("CONSTRUKT_CALCULATOR_LINEAR_WASTAGE_PCT", &value)?;
        }
        if let Some(value) = read_env("CONSTRUKT_CALCULATOR_COVERAGE_OVERRIDES") {
            self.calculator.coverage_overrides =
                parse_coverage_overrides("CONSTRUKT_CALCULATOR_COVERAGE_OVERRIDES", &value)?;
        }

        if let Some(value) = read_env("CONSTRUKT_FALLBACK_ENABLED") {
            self.fallback.enabled = parse_bool("CONSTRUKT_FALLBACK_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CONSTRUKT_FALLBACK_CATEGORY_HINT_LIMIT") {
            self.fallback.category_hint_limit =
                parse_u32("CONSTRUKT_FALLBACK_CATEGORY_HINT_LIMIT", &value)? as usize;
        }

        let log_level =
            read_env("CONSTRUKT_LOGGING_LEVEL").or_else(|| read_env("CONSTRUKT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONSTRUKT_LOGGING_FORMAT").or_else(|| read_env("CONSTRUKT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(storage_dir) = overrides.storage_dir {
            self.conversation.storage_dir = storage_dir;
        }
        if let Some(context_timeout_secs) = overrides.context_timeout_secs {
            self.conversation.context_timeout_secs = context_timeout_secs;
        }
        if let Some(catalog_ttl_secs) = overrides.catalog_ttl_secs {
            self.catalog.ttl_secs = catalog_ttl_secs;
        }
        if let Some(fallback_enabled) = overrides.fallback_enabled {
            self.fallback.enabled = fallback_enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_conversation(&self.conversation)?;
        validate_calculator(&self.calculator)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("construkt.toml"), PathBuf::from("config/construkt.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.storage_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "conversation.storage_dir must not be empty".to_string(),
        ));
    }

    if conversation.context_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "conversation.context_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if conversation.intent_history_limit == 0 {
        return Err(ConfigError::Validation(
            "conversation.intent_history_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_calculator(calculator: &CalculatorConfig) -> Result<(), ConfigError> {
    if !(calculator.default_coverage.is_finite() && calculator.default_coverage > 0.0) {
        return Err(ConfigError::Validation(
            "calculator.default_coverage must be a positive number".to_string(),
        ));
    }

    let wastages = [
        ("calculator.area_wastage_pct", calculator.area_wastage_pct),
        ("calculator.volume_wastage_pct", calculator.volume_wastage_pct),
        ("calculator.linear_wastage_pct", calculator.linear_wastage_pct),
    ];
    for (key, value) in wastages {
        if !(value.is_finite() && (0.0..=100.0).contains(&value)) {
            return Err(ConfigError::Validation(format!("{key} must be in range 0..=100")));
        }
    }

    let invalid_override = calculator
        .coverage_overrides
        .iter()
        .find(|(_, coverage)| !(coverage.is_finite() && **coverage > 0.0));
    if let Some((product_id, _)) = invalid_override {
        return Err(ConfigError::Validation(format!(
            "calculator.coverage_overrides for product {product_id} must be a positive number"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

/// Parses `id=coverage` pairs separated by commas, e.g. `8=0.02,14=0.5`.
fn parse_coverage_overrides(key: &str, value: &str) -> Result<BTreeMap<i64, f64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<(i64, f64), ConfigError> {
            let (id, coverage) = pair.split_once('=').ok_or_else(|| invalid_override(key, value))?;
            let id = id.trim().parse::<i64>().map_err(|_| invalid_override(key, value))?;
            let coverage = coverage.trim().parse::<f64>().map_err(|_| invalid_override(key, value))?;
            Ok((id, coverage))
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    catalog: Option<CatalogPatch>,
    conversation: Option<ConversationPatch>,
    calculator: Option<CalculatorPatch>,
    fallback: Option<FallbackPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    storage_dir: Option<PathBuf>,
    context_timeout_secs: Option<u64>,
    intent_history_limit: Option<usize>,
    cleanup_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CalculatorPatch {
    default_coverage: Option<f64>,
    area_wastage_pct: Option<f64>,
    volume_wastage_pct: Option<f64>,
    linear_wastage_pct: Option<f64>,
    coverage_overrides: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct FallbackPatch {
    enabled: Option<bool>,
    category_hint_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_storefront_behaviour() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.catalog.ttl_secs == 300, "catalog ttl should default to five minutes")?;
        ensure(
            config.conversation.context_timeout_secs == 3600,
            "conversation timeout should default to one hour",
        )?;
        ensure(config.calculator.default_coverage == 10.0, "default coverage should be 10")?;
        ensure(
            config.calculator.coverage_overrides.get(&8) == Some(&0.02),
            "product 8 should carry the per-piece coverage override",
        )?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CONSTRUKT_DB", "sqlite://interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("construkt.toml");
            fs::write(
                &path,
                r#"
[database]
url = "${TEST_CONSTRUKT_DB}"

[calculator.coverage_overrides]
"8" = 0.02
"21" = 0.5
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should be loaded from environment",
            )?;
            ensure(
                config.calculator.coverage_overrides.get(&21) == Some(&0.5),
                "coverage overrides should be parsed from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_CONSTRUKT_DB"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONSTRUKT_LOG_LEVEL", "warn");
        env::set_var("CONSTRUKT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CONSTRUKT_LOG_LEVEL", "CONSTRUKT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONSTRUKT_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("CONSTRUKT_CONVERSATION_STORAGE_DIR", "from-env-dir");
        env::set_var("CONSTRUKT_CALCULATOR_COVERAGE_OVERRIDES", "3=0.25, 8=0.04");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("construkt.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[conversation]
storage_dir = "from-file-dir"
context_timeout_secs = 600

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.conversation.storage_dir == PathBuf::from("from-env-dir"),
                "env storage dir should win over file and defaults",
            )?;
            ensure(
                config.conversation.context_timeout_secs == 600,
                "file timeout should win over defaults",
            )?;
            ensure(
                config.calculator.coverage_overrides.get(&8) == Some(&0.04)
                    && config.calculator.coverage_overrides.len() == 2,
                "env coverage overrides should replace the defaults",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "CONSTRUKT_DATABASE_URL",
            "CONSTRUKT_CONVERSATION_STORAGE_DIR",
            "CONSTRUKT_CALCULATOR_COVERAGE_OVERRIDES",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONSTRUKT_CALCULATOR_AREA_WASTAGE_PCT", "150");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("calculator.area_wastage_pct")
            );
            ensure(has_message, "validation failure should mention calculator.area_wastage_pct")
        })();

        clear_vars(&["CONSTRUKT_CALCULATOR_AREA_WASTAGE_PCT"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONSTRUKT_CATALOG_TTL_SECS", "five minutes");

        let result = (|| -> Result<(), String> {
            match AppConfig::load(LoadOptions::default()) {
                Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                    key == "CONSTRUKT_CATALOG_TTL_SECS",
                    "invalid override should name the offending variable",
                ),
                Err(other) => Err(format!("unexpected error: {other}")),
                Ok(_) => Err("expected invalid override failure".to_string()),
            }
        })();

        clear_vars(&["CONSTRUKT_CATALOG_TTL_SECS"]);
        result
    }
}
