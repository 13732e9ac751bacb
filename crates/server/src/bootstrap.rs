use std::sync::Arc;

use pricebot_agent::{ConversationDriver, LlmError, PromptPack, ResponsesClient};
use pricebot_catalog::{CatalogClient, CatalogError, HttpPageFetcher};
use pricebot_core::config::{AppConfig, ConfigError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub driver: Arc<ConversationDriver<ResponsesClient, HttpPageFetcher>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("completion client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("catalog client setup failed: {0}")]
    Catalog(#[from] CatalogError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let llm = ResponsesClient::new(&config.llm)?;
    let fetcher = HttpPageFetcher::new(config.catalog.page_timeout_secs)?;
    let catalog = CatalogClient::new(fetcher, &config.catalog);
    let prompts = PromptPack::from_config(&config.agent);

    let driver = Arc::new(ConversationDriver::new(
        Arc::new(llm),
        Arc::new(catalog),
        prompts,
        config.agent.max_rounds,
        config.catalog.max_attempts,
    ));

    info!(
        event_name = "system.bootstrap.ready",
        deployment = %config.llm.deployment,
        catalog = %config.catalog.base_url,
        max_rounds = config.agent.max_rounds,
        "conversation driver assembled"
    );

    Ok(Application { config, driver })
}
