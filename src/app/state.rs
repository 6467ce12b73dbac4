use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;

use crate::app::generate::Generator;
use crate::app::rate_limit::ClientRateLimiter;
use crate::config::AppConfig;
use crate::metadata::{MetadataSource, PageMetadataExtractor};
use crate::openai::{ChatCompletionsClient, CompletionBackend};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub generator: Generator,
    pub rate_limiter: Arc<ClientRateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires the production extractor and completion client from `config`.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let metadata: Arc<dyn MetadataSource> = Arc::new(
            PageMetadataExtractor::new(config.scrape_timeout).context("build page extractor")?,
        );
        let completion = ChatCompletionsClient::from_config(&config.openai)
            .context("build completion client")?
            .map(|client| Arc::new(client) as Arc<dyn CompletionBackend>);

        Ok(Self::new(config, Generator::new(metadata, completion)))
    }

    pub fn new(config: AppConfig, generator: Generator) -> Self {
        let rate_limiter = Arc::new(ClientRateLimiter::new(config.rate_limit));
        Self {
            config: Arc::new(config),
            generator,
            rate_limiter,
            started_at: Instant::now(),
        }
    }
}
