use crate::err_custom_create;
use crate::error::ApprovalError;
use serde::Deserialize;
use std::collections::btree_map::BTreeMap as Map;
use std::path::Path;
use tokio::fs;
use wallet_approval_lib_common::ChainFamily;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Engine {
    /// Seconds between readiness poll cycles while the connect dialog is open
    pub readiness_poll_interval: u64,
    /// Probes per poll cycle before the provider is declared not ready
    pub readiness_probe_attempts: u64,
    pub readiness_probe_delay_ms: u64,
    pub connect_max_attempts: u32,
    pub connect_retry_delay_ms: u64,
    /// Delay after account access before the provider state is trusted
    pub settle_delay_ms: u64,
    pub status_check_attempts: u32,
    pub status_check_delay_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Advisory {
    pub base_url: String,
    /// Request timeout in seconds
    pub request_timeout: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Relay {
    pub project_id: String,
    pub relay_url: String,
    pub app_name: String,
    pub app_description: String,
    pub app_url: String,
    #[serde(default)]
    pub app_icons: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Chain {
    pub chain_name: String,
    pub chain_id: i64,
    pub family: ChainFamily,
    pub spender_address: String,
    /// Decimal token amount granted to the spender
    pub approval_amount: String,
    pub allowed_tokens: Option<Vec<String>>,
    pub block_explorer_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub chain: Map<String, Chain>,
    pub engine: Engine,
    pub advisory: Advisory,
    pub relay: Relay,
}

impl Config {
    pub fn load_from_str(config: &str) -> Result<Self, ApprovalError> {
        toml::from_str(config)
            .map_err(|err| err_custom_create!("Failed to parse config: {err}"))
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ApprovalError> {
        let contents = fs::read_to_string(&path).await.map_err(|err| {
            err_custom_create!(
                "Failed to read config file {}: {err}",
                path.as_ref().display()
            )
        })?;
        Self::load_from_str(&contents)
    }
}
