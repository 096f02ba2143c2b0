use crate::error::{ApprovalError, ErrorBag};
use crate::setup::ApprovalSetup;
use crate::{err_custom_create, err_from};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const CHECK_ALLOWANCE_ENDPOINT: &str = "api/extension/check-allowance";
pub const UPDATE_ALLOWANCE_ENDPOINT: &str = "api/extension/update-allowance";
pub const UPDATE_ACCEPTED_MESSAGE: &str = "Allowances updated successfully";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckAllowanceRequest<'a> {
    wallet_address: &'a str,
    chain_id: i64,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct CheckAllowanceResponse {
    tokens_needing_allowance: Vec<TokenEntry>,
}

#[derive(Deserialize, Debug)]
struct TokenEntry {
    address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAllowanceRequest<'a> {
    wallet_address: &'a str,
    chain_id: i64,
    token_addresses: &'a [String],
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct UpdateAllowanceResponse {
    message: Option<String>,
}

/// Remote service deciding which token needs an allowance next and
/// recording granted ones.
#[async_trait]
pub trait AdvisoryApi: Send + Sync {
    /// First token of the advisory answer, None when nothing needs an
    /// allowance right now.
    async fn fetch_target(
        &self,
        wallet_address: &str,
        chain_id: i64,
    ) -> Result<Option<String>, ApprovalError>;

    async fn report_completion(
        &self,
        wallet_address: &str,
        chain_id: i64,
        token_addresses: &[String],
    ) -> Result<(), ApprovalError>;
}

pub struct HttpAdvisoryClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpAdvisoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApprovalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(err_from!())?;
        // a trailing slash keeps Url::join from eating the last path segment
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|err| err_custom_create!("Invalid advisory base url {base}: {err}"))?;
        Ok(HttpAdvisoryClient { client, base_url })
    }

    pub fn from_setup(setup: &ApprovalSetup) -> Result<Self, ApprovalError> {
        Self::new(&setup.advisory_base_url, setup.advisory_timeout)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApprovalError> {
        self.base_url
            .join(path)
            .map_err(|err| err_custom_create!("Invalid advisory endpoint {path}: {err}"))
    }
}

#[async_trait]
impl AdvisoryApi for HttpAdvisoryClient {
    async fn fetch_target(
        &self,
        wallet_address: &str,
        chain_id: i64,
    ) -> Result<Option<String>, ApprovalError> {
        let url = self.endpoint(CHECK_ALLOWANCE_ENDPOINT)?;
        let response = self
            .client
            .post(url)
            .json(&CheckAllowanceRequest {
                wallet_address,
                chain_id,
            })
            .send()
            .await
            .map_err(err_from!())?
            .error_for_status()
            .map_err(err_from!())?;
        let answer: CheckAllowanceResponse = response.json().await.map_err(err_from!())?;
        log::debug!(
            "advisory lists {} token(s) needing allowance on chain {chain_id}",
            answer.tokens_needing_allowance.len()
        );
        Ok(answer
            .tokens_needing_allowance
            .into_iter()
            .next()
            .map(|token| token.address))
    }

    async fn report_completion(
        &self,
        wallet_address: &str,
        chain_id: i64,
        token_addresses: &[String],
    ) -> Result<(), ApprovalError> {
        let url = self.endpoint(UPDATE_ALLOWANCE_ENDPOINT)?;
        let response = self
            .client
            .post(url)
            .json(&UpdateAllowanceRequest {
                wallet_address,
                chain_id,
                token_addresses,
            })
            .send()
            .await
            .map_err(err_from!())?
            .error_for_status()
            .map_err(err_from!())?;
        let answer: UpdateAllowanceResponse = response.json().await.map_err(err_from!())?;
        match answer.message.as_deref() {
            Some(UPDATE_ACCEPTED_MESSAGE) => {
                log::info!(
                    "advisory recorded {} allowance(s) for {wallet_address} on chain {chain_id}",
                    token_addresses.len()
                );
            }
            other => {
                log::warn!("advisory answered allowance update with {other:?}");
            }
        }
        Ok(())
    }
}
