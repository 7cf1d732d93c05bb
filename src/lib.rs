use async_openai::config::OpenAIConfig;
use async_openai::Client;

use crate::config::AppConfig;
use crate::store::Store;

pub mod actions;
pub mod config;
pub mod google_auth;
pub mod google_calendar;
pub mod middleware;
pub mod models;
pub mod openai;
pub mod prompts;
pub mod routes;
pub mod store;
pub mod types;

pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub oai_client: Client<OpenAIConfig>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let mut oai_config = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());
        if let Some(base) = &config.openai_api_base {
            oai_config = oai_config.with_api_base(base.clone());
        }

        AppState {
            config,
            store: Store::new(),
            oai_client: Client::with_config(oai_config),
            http_client: reqwest::Client::new(),
        }
    }
}
