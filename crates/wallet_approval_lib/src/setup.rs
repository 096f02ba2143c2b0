use crate::config::Config;
use crate::error::ApprovalError;
use crate::err_custom_create;
use crate::wallet::tron::looks_like_tron_address;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::time::Duration;
use wallet_approval_lib_common::ChainFamily;
use web3::types::{Address, U256};

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChainSetup {
    pub chain_name: String,
    pub chain_id: i64,
    pub family: ChainFamily,
    pub spender_address: String,
    #[serde(skip_serializing)]
    pub spender_evm: Option<Address>,
    #[serde(skip_serializing)]
    pub approval_amount: U256,
    pub allowed_tokens: Option<BTreeSet<String>>,
    pub block_explorer_url: Option<String>,
}

/// EVM addresses compare case-insensitively, Tron base58 addresses do not.
pub fn normalize_token_address(family: ChainFamily, token: &str) -> String {
    match family {
        ChainFamily::Evm => token.trim().to_lowercase(),
        ChainFamily::Tron => token.trim().to_string(),
    }
}

impl ChainSetup {
    /// No allow-list configured means every advisory answer is accepted.
    pub fn token_allowed(&self, token: &str) -> bool {
        match &self.allowed_tokens {
            Some(allowed) => allowed.contains(&normalize_token_address(self.family, token)),
            None => true,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RelaySetup {
    #[serde(skip_serializing)]
    pub project_id: String,
    pub relay_url: String,
    pub app_name: String,
    pub app_description: String,
    pub app_url: String,
    pub app_icons: Vec<String>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSetup {
    pub chain_setup: BTreeMap<i64, ChainSetup>,
    pub advisory_base_url: String,
    #[serde(skip_serializing)]
    pub advisory_timeout: Duration,
    pub relay: RelaySetup,
    pub readiness_poll_interval: u64,
    pub readiness_probe_attempts: u64,
    pub readiness_probe_delay_ms: u64,
    pub connect_max_attempts: u32,
    pub connect_retry_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub status_check_attempts: u32,
    pub status_check_delay_ms: u64,
}

impl ApprovalSetup {
    pub fn new(config: &Config) -> Result<Self, ApprovalError> {
        let mut chain_setup = BTreeMap::new();
        let mut families_seen = BTreeSet::new();
        for (name, chain) in &config.chain {
            if !families_seen.insert(chain.family) {
                return Err(err_custom_create!(
                    "Chain {name} duplicates family {}, one chain per family is supported",
                    chain.family
                ));
            }
            let spender_evm = match chain.family {
                ChainFamily::Evm => Some(Address::from_str(&chain.spender_address).map_err(
                    |err| {
                        err_custom_create!(
                            "Chain {name} has invalid spender address {}: {err}",
                            chain.spender_address
                        )
                    },
                )?),
                ChainFamily::Tron => {
                    if !looks_like_tron_address(&chain.spender_address) {
                        return Err(err_custom_create!(
                            "Chain {name} has invalid Tron spender address {}",
                            chain.spender_address
                        ));
                    }
                    None
                }
            };
            let approval_amount = U256::from_dec_str(&chain.approval_amount).map_err(|err| {
                err_custom_create!(
                    "Chain {name} has invalid approval amount {}: {err}",
                    chain.approval_amount
                )
            })?;
            let allowed_tokens = chain.allowed_tokens.as_ref().map(|tokens| {
                tokens
                    .iter()
                    .map(|token| normalize_token_address(chain.family, token))
                    .collect()
            });
            chain_setup.insert(
                chain.chain_id,
                ChainSetup {
                    chain_name: chain.chain_name.clone(),
                    chain_id: chain.chain_id,
                    family: chain.family,
                    spender_address: chain.spender_address.clone(),
                    spender_evm,
                    approval_amount,
                    allowed_tokens,
                    block_explorer_url: chain.block_explorer_url.clone(),
                },
            );
        }
        Ok(ApprovalSetup {
            chain_setup,
            advisory_base_url: config.advisory.base_url.clone(),
            advisory_timeout: Duration::from_secs(config.advisory.request_timeout),
            relay: RelaySetup {
                project_id: config.relay.project_id.clone(),
                relay_url: config.relay.relay_url.clone(),
                app_name: config.relay.app_name.clone(),
                app_description: config.relay.app_description.clone(),
                app_url: config.relay.app_url.clone(),
                app_icons: config.relay.app_icons.clone(),
            },
            readiness_poll_interval: config.engine.readiness_poll_interval,
            readiness_probe_attempts: config.engine.readiness_probe_attempts,
            readiness_probe_delay_ms: config.engine.readiness_probe_delay_ms,
            connect_max_attempts: config.engine.connect_max_attempts,
            connect_retry_delay_ms: config.engine.connect_retry_delay_ms,
            settle_delay_ms: config.engine.settle_delay_ms,
            status_check_attempts: config.engine.status_check_attempts,
            status_check_delay_ms: config.engine.status_check_delay_ms,
        })
    }

    pub fn get_chain_setup(&self, chain_id: i64) -> Result<&ChainSetup, ApprovalError> {
        self.chain_setup
            .get(&chain_id)
            .ok_or_else(|| err_custom_create!("No chain setup found for chain id {chain_id}"))
    }

    pub fn chain_for_family(&self, family: ChainFamily) -> Result<&ChainSetup, ApprovalError> {
        self.chain_setup
            .values()
            .find(|chain| chain.family == family)
            .ok_or_else(|| err_custom_create!("No chain configured for family {family}"))
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }

    pub fn readiness_probe_delay(&self) -> Duration {
        Duration::from_millis(self.readiness_probe_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn status_check_delay(&self) -> Duration {
        Duration::from_millis(self.status_check_delay_ms)
    }

    pub fn readiness_poll_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_poll_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn sample_config(tron_spender: &str) -> String {
        format!(
            r#"
[chain.mainnet]
chain-name = "Ethereum"
chain-id = 1
family = "evm"
spender-address = "0x2222222222222222222222222222222222222222"
approval-amount = "500"
allowed-tokens = ["0xDAC17F958D2EE523A2206206994597C13D831EC7"]

[chain.tron]
chain-name = "Tron"
chain-id = 728126428
family = "tron"
spender-address = "{tron_spender}"
approval-amount = "1000000"

[engine]
readiness-poll-interval = 5
readiness-probe-attempts = 3
readiness-probe-delay-ms = 500
connect-max-attempts = 3
connect-retry-delay-ms = 1000
settle-delay-ms = 500
status-check-attempts = 3
status-check-delay-ms = 1000

[advisory]
base-url = "http://127.0.0.1:8000"
request-timeout = 10

[relay]
project-id = "deadbeef"
relay-url = "wss://relay.example.com"
app-name = "Approval Processor"
app-description = "Token approval engine"
app-url = "https://example.com"
"#
        )
    }

    #[test]
    fn test_setup_validates_and_normalizes() {
        let config =
            Config::load_from_str(&sample_config("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t")).unwrap();
        let setup = ApprovalSetup::new(&config).unwrap();
        let evm = setup.get_chain_setup(1).unwrap();
        assert!(evm.spender_evm.is_some());
        assert_eq!(evm.approval_amount, U256::from(500));
        assert!(evm.token_allowed("0xdac17f958d2ee523a2206206994597c13d831ec7"));
        assert!(evm.token_allowed("0xDAC17F958D2EE523A2206206994597C13D831EC7"));
        assert!(!evm.token_allowed("0x1111111111111111111111111111111111111111"));
        let tron = setup.chain_for_family(ChainFamily::Tron).unwrap();
        assert_eq!(tron.chain_id, 728126428);
        assert!(tron.token_allowed("any token, no allow-list configured"));
    }

    #[test]
    fn test_setup_rejects_bad_tron_spender() {
        let config = Config::load_from_str(&sample_config("0xnot-a-tron-address-here-no")).unwrap();
        let setup = ApprovalSetup::new(&config);
        assert!(setup.is_err());
    }

    #[test]
    fn test_unknown_chain_id() {
        let config =
            Config::load_from_str(&sample_config("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t")).unwrap();
        let setup = ApprovalSetup::new(&config).unwrap();
        assert!(setup.get_chain_setup(987654).is_err());
    }
}
