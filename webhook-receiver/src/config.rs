use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use webhook_hmac::SharedKey;

fn default_max_body_size() -> usize {
    // 2MiB, same as axum's default
    2 * 1024 * 1024
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfiguration {
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WebhookConfiguration {
    pub shared_key: SharedKey,
    #[serde(flatten)]
    pub verification: tower_webhook_signature::Configuration,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    pub server: ServerConfiguration,
    pub webhook: WebhookConfiguration,
}

impl Configuration {
    pub fn parse(content: &str) -> eyre::Result<Self> {
        toml::from_str(content).map_err(eyre::Report::from)
    }

    pub async fn load<P>(path: P) -> eyre::Result<Self>
    where
        P: AsRef<Path>,
    {
        let content = fs::read_to_string(path).await?;
        Self::parse(&content)
    }
}
