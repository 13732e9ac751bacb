use pricebot_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

/// Render the effective configuration after defaults, file, env, and
/// overrides have been merged. Secrets are redacted, never printed.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure(format!("config validation failed: {error}")),
    };
    CommandResult::success(render(&config))
}

fn render(config: &AppConfig) -> String {
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(format!("  llm.endpoint = {}", config.llm.endpoint.as_deref().unwrap_or("(unset)")));
    lines.push(format!(
        "  llm.api_key = {}",
        if config.llm.api_key.is_some() { "[redacted]" } else { "(unset)" }
    ));
    lines.push(format!("  llm.deployment = {}", config.llm.deployment));
    lines.push(format!("  llm.timeout_secs = {}", config.llm.timeout_secs));
    lines.push(format!("  llm.max_output_tokens = {}", config.llm.max_output_tokens));

    lines.push(format!("  catalog.base_url = {}", config.catalog.base_url));
    lines.push(format!("  catalog.api_version = {}", config.catalog.api_version));
    lines.push(format!("  catalog.page_timeout_secs = {}", config.catalog.page_timeout_secs));
    lines.push(format!("  catalog.max_attempts = {}", config.catalog.max_attempts));

    lines.push(format!("  agent.max_rounds = {}", config.agent.max_rounds));
    lines.push(format!("  agent.turn_timeout_secs = {}", config.agent.turn_timeout_secs));
    lines.push(format!(
        "  agent.system_instructions = {}",
        if config.agent.system_instructions.is_some() { "(custom)" } else { "(built-in)" }
    ));
    lines.push(format!(
        "  agent.reference_tables = {}",
        if config.agent.reference_tables.is_some() { "(custom)" } else { "(built-in)" }
    ));

    lines.push(format!("  server.bind_address = {}", config.server.bind_address));
    lines.push(format!("  server.port = {}", config.server.port));
    lines.push(format!(
        "  server.graceful_shutdown_secs = {}",
        config.server.graceful_shutdown_secs
    ));

    lines.push(format!("  logging.level = {}", config.logging.level));
    lines.push(format!("  logging.format = {:?}", config.logging.format));

    lines.join("\n")
}
