use crate::config::ProviderConfig;
use crate::errors::AnalyzerError;
use crate::model::{quality_for_score, ScoreThresholds, WalletProfile};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Scores a single wallet against the metered provider.
///
/// `Ok(None)` means the provider knows nothing interesting about the
/// address; only transport, status, and decode problems are errors. One
/// call is one unit of work — retries are a scheduler concern.
#[async_trait]
pub trait RecordAnalyzer: Send + Sync {
    async fn analyze(&self, address: &str) -> Result<Option<WalletProfile>, AnalyzerError>;
}

/// Best-effort source of candidate addresses; failures map to an empty
/// list so callers can fall back to the previously tracked set.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn discover(&self) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct WalletScoreResponse {
    address: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    addresses: Vec<String>,
}

pub struct HttpWalletProvider {
    client: reqwest::Client,
    base_url: String,
    thresholds: ScoreThresholds,
}

impl HttpWalletProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            thresholds: config.thresholds.clone(),
        }
    }
}

#[async_trait]
impl RecordAnalyzer for HttpWalletProvider {
    async fn analyze(&self, address: &str) -> Result<Option<WalletProfile>, AnalyzerError> {
        let url = format!("{}/v1/wallets/{address}/score", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| AnalyzerError::Transport(err.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AnalyzerError::Status(response.status().as_u16()));
        }
        let body: WalletScoreResponse = response
            .json()
            .await
            .map_err(|err| AnalyzerError::Decode(err.to_string()))?;
        let quality = quality_for_score(body.score, &self.thresholds);
        Ok(Some(WalletProfile::new(
            &body.address,
            body.score,
            quality,
            now_millis(),
        )))
    }
}

#[async_trait]
impl DiscoverySource for HttpWalletProvider {
    async fn discover(&self) -> Vec<String> {
        let url = format!("{}/v1/wallets/trending", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<DiscoveryResponse>().await {
                    Ok(body) => body.addresses,
                    Err(err) => {
                        tracing::warn!(error = %err, "discovery response decode failed");
                        Vec::new()
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "discovery request rejected");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "discovery request failed");
                Vec::new()
            }
        }
    }
}
