use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub catalog: CatalogConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub deployment: String,
    pub timeout_secs: u64,
    pub max_output_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub base_url: String,
    pub api_version: String,
    pub page_timeout_secs: u64,
    pub max_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_rounds: u32,
    pub turn_timeout_secs: u64,
    /// Opaque instruction text handed to the LLM verbatim; `None` selects the
    /// built-in default pack.
    pub system_instructions: Option<String>,
    /// Opaque flattened reference tables (region codes, VM families).
    pub reference_tables: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
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
    pub llm_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_deployment: Option<String>,
    pub catalog_base_url: Option<String>,
    pub catalog_max_attempts: Option<u32>,
    pub agent_max_rounds: Option<u32>,
    pub log_level: Option<String>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                endpoint: None,
                api_key: None,
                deployment: "gpt-5-codex".to_string(),
                timeout_secs: 60,
                max_output_tokens: 4000,
            },
            catalog: CatalogConfig {
                base_url: "https://prices.azure.com/api/retail/prices".to_string(),
                api_version: "2023-01-01-preview".to_string(),
                page_timeout_secs: 30,
                max_attempts: 3,
            },
            agent: AgentConfig {
                max_rounds: 6,
                turn_timeout_secs: 120,
                system_instructions: None,
                reference_tables: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pricebot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(endpoint) = llm.endpoint {
                self.llm.endpoint = Some(endpoint);
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(deployment) = llm.deployment {
                self.llm.deployment = deployment;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(base_url) = catalog.base_url {
                self.catalog.base_url = base_url;
            }
            if let Some(api_version) = catalog.api_version {
                self.catalog.api_version = api_version;
            }
            if let Some(page_timeout_secs) = catalog.page_timeout_secs {
                self.catalog.page_timeout_secs = page_timeout_secs;
            }
            if let Some(max_attempts) = catalog.max_attempts {
                self.catalog.max_attempts = max_attempts;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_rounds) = agent.max_rounds {
                self.agent.max_rounds = max_rounds;
            }
            if let Some(turn_timeout_secs) = agent.turn_timeout_secs {
                self.agent.turn_timeout_secs = turn_timeout_secs;
            }
            if let Some(system_instructions) = agent.system_instructions {
                self.agent.system_instructions = Some(system_instructions);
            }
            if let Some(reference_tables) = agent.reference_tables {
                self.agent.reference_tables = Some(reference_tables);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PRICEBOT_LLM_ENDPOINT") {
            self.llm.endpoint = Some(value);
        }
        if let Some(value) = read_env("PRICEBOT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PRICEBOT_LLM_DEPLOYMENT") {
            self.llm.deployment = value;
        }
        if let Some(value) = read_env("PRICEBOT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PRICEBOT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PRICEBOT_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_u32("PRICEBOT_LLM_MAX_OUTPUT_TOKENS", &value)?;
        }

        if let Some(value) = read_env("PRICEBOT_CATALOG_BASE_URL") {
            self.catalog.base_url = value;
        }
        if let Some(value) = read_env("PRICEBOT_CATALOG_API_VERSION") {
            self.catalog.api_version = value;
        }
        if let Some(value) = read_env("PRICEBOT_CATALOG_PAGE_TIMEOUT_SECS") {
            self.catalog.page_timeout_secs =
                parse_u64("PRICEBOT_CATALOG_PAGE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PRICEBOT_CATALOG_MAX_ATTEMPTS") {
            self.catalog.max_attempts = parse_u32("PRICEBOT_CATALOG_MAX_ATTEMPTS", &value)?;
        }

        if let Some(value) = read_env("PRICEBOT_AGENT_MAX_ROUNDS") {
            self.agent.max_rounds = parse_u32("PRICEBOT_AGENT_MAX_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("PRICEBOT_AGENT_TURN_TIMEOUT_SECS") {
            self.agent.turn_timeout_secs = parse_u64("PRICEBOT_AGENT_TURN_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PRICEBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PRICEBOT_SERVER_PORT") {
            self.server.port = parse_u16("PRICEBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PRICEBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PRICEBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PRICEBOT_LOGGING_LEVEL").or_else(|| read_env("PRICEBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PRICEBOT_LOGGING_FORMAT").or_else(|| read_env("PRICEBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(llm_endpoint) = overrides.llm_endpoint {
            self.llm.endpoint = Some(llm_endpoint);
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_deployment) = overrides.llm_deployment {
            self.llm.deployment = llm_deployment;
        }
        if let Some(catalog_base_url) = overrides.catalog_base_url {
            self.catalog.base_url = catalog_base_url;
        }
        if let Some(catalog_max_attempts) = overrides.catalog_max_attempts {
            self.catalog.max_attempts = catalog_max_attempts;
        }
        if let Some(agent_max_rounds) = overrides.agent_max_rounds {
            self.agent.max_rounds = agent_max_rounds;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_catalog(&self.catalog)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pricebot.toml"), PathBuf::from("config/pricebot.toml")]
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    let endpoint_missing =
        llm.endpoint.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
    if endpoint_missing {
        return Err(ConfigError::Validation(
            "llm.endpoint is required (the completion runtime base URL)".to_string(),
        ));
    }

    let key_missing =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if key_missing {
        return Err(ConfigError::Validation("llm.api_key is required".to_string()));
    }

    if llm.deployment.trim().is_empty() {
        return Err(ConfigError::Validation("llm.deployment must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_output_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_output_tokens must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    let base_url = catalog.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "catalog.base_url must be an http(s) URL".to_string(),
        ));
    }

    if catalog.page_timeout_secs == 0 || catalog.page_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.page_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if catalog.max_attempts == 0 || catalog.max_attempts > 10 {
        return Err(ConfigError::Validation(
            "catalog.max_attempts must be in range 1..=10".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_rounds == 0 || agent.max_rounds > 20 {
        return Err(ConfigError::Validation(
            "agent.max_rounds must be in range 1..=20".to_string(),
        ));
    }

    if agent.turn_timeout_secs == 0 || agent.turn_timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "agent.turn_timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    catalog: Option<CatalogPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    endpoint: Option<String>,
    api_key: Option<String>,
    deployment: Option<String>,
    timeout_secs: Option<u64>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    base_url: Option<String>,
    api_version: Option<String>,
    page_timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_rounds: Option<u32>,
    turn_timeout_secs: Option<u64>,
    system_instructions: Option<String>,
    reference_tables: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
