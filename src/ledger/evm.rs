use super::{ActionReference, EntityId, EntityRecord, LedgerClient};
use crate::config::Config;
use crate::error::{ConfigError, LedgerError};
use alloy_primitives::{Address, U256, hex};
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use std::str::FromStr;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const RECEIPT_POLL_ATTEMPTS: u32 = 30;
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

sol! {
    struct EntityInfo {
        uint256 entityId;
        uint256 lastInteracted;
        uint256 status;
    }

    function entitiesOfOwner(address owner) external view returns (uint256[] entityIds);
    function entityInfo(uint256 entityId) external view returns (EntityInfo info);
    function interact(uint256[] entityIds) external;
}

/// JSON-RPC client for the entity contract.
///
/// Transactions are submitted with `eth_sendTransaction` and signed by the
/// node's unlocked account; key handling never enters this process.
pub struct EvmLedger {
    rpc_url: String,
    contract: Address,
    sender: Address,
    client: reqwest::Client,
}

impl EvmLedger {
    pub fn new(rpc_url: String, contract: Address, sender: Address) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(Self {
            rpc_url,
            contract,
            sender,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let contract = parse_address("contract_address", &config.contract_address)?;
        let sender = parse_address("owner_address", &config.owner_address)?;
        Self::new(config.rpc_url.clone(), contract, sender)
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    async fn rpc(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, LedgerError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "{method} returned http {}",
                resp.status()
            )));
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| LedgerError::Response(e.to_string()))?;

        if let Some(error) = value.get("error") {
            return Err(LedgerError::Rpc {
                code: error.get("code").and_then(serde_json::Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        value
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Response(format!("{method} response has no result")))
    }

    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        let params = serde_json::json!([
            { "to": self.contract.to_string(), "data": encode_data(&data) },
            "latest",
        ]);
        let result = self.rpc("eth_call", params).await?;
        decode_bytes(&result)
    }

    fn tx_object(&self, data: &[u8]) -> serde_json::Value {
        serde_json::json!({
            "from": self.sender.to_string(),
            "to": self.contract.to_string(),
            "data": encode_data(data),
        })
    }

    async fn wait_for_receipt(&self, hash: &str) -> Result<(), LedgerError> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let receipt = self
                .rpc("eth_getTransactionReceipt", serde_json::json!([hash]))
                .await?;

            if receipt.is_null() {
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
                continue;
            }

            let status = receipt.get("status").map(parse_quantity).transpose()?;
            return match status {
                Some(0) => Err(LedgerError::Submission(format!(
                    "transaction {hash} reverted"
                ))),
                _ => Ok(()),
            };
        }

        Err(LedgerError::Submission(format!(
            "transaction {hash} unconfirmed after {}s",
            u64::from(RECEIPT_POLL_ATTEMPTS) * RECEIPT_POLL_INTERVAL.as_secs()
        )))
    }

    fn interact_calldata(ids: &[EntityId]) -> Vec<u8> {
        interactCall {
            entityIds: ids.iter().map(|id| U256::from(id.0)).collect(),
        }
        .abi_encode()
    }
}

#[async_trait]
impl LedgerClient for EvmLedger {
    async fn enumerate_ids(&self, owner: Address) -> Result<Vec<EntityId>, LedgerError> {
        let raw = self
            .eth_call(entitiesOfOwnerCall { owner }.abi_encode())
            .await?;
        let ids = entitiesOfOwnerCall::abi_decode_returns(&raw)
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        ids.into_iter()
            .map(|id| {
                u64::try_from(id)
                    .map(EntityId)
                    .map_err(|_| LedgerError::Decode(format!("entity id {id} exceeds u64")))
            })
            .collect()
    }

    async fn fetch_detail(&self, id: EntityId) -> Result<EntityRecord, LedgerError> {
        let raw = self
            .eth_call(
                entityInfoCall {
                    entityId: U256::from(id.0),
                }
                .abi_encode(),
            )
            .await?;
        let info = entityInfoCall::abi_decode_returns(&raw)
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        Ok(EntityRecord {
            id,
            last_activity_time: u64::try_from(info.lastInteracted).map_err(|_| {
                LedgerError::Decode(format!("activity time of entity {id} exceeds u64"))
            })?,
            claimed: !info.status.is_zero(),
        })
    }

    async fn submit_action(&self, ids: &[EntityId]) -> Result<ActionReference, LedgerError> {
        let data = Self::interact_calldata(ids);
        let result = self
            .rpc("eth_sendTransaction", serde_json::json!([self.tx_object(&data)]))
            .await?;

        let hash = result
            .as_str()
            .ok_or_else(|| LedgerError::Response("transaction hash is not a string".into()))?
            .to_string();

        self.wait_for_receipt(&hash).await?;
        Ok(ActionReference(hash))
    }

    async fn estimate_action_cost(&self, ids: &[EntityId]) -> Result<u64, LedgerError> {
        let data = Self::interact_calldata(ids);
        let result = self
            .rpc("eth_estimateGas", serde_json::json!([self.tx_object(&data)]))
            .await?;
        parse_quantity(&result)
    }

    async fn chain_height(&self) -> Result<u64, LedgerError> {
        let result = self.rpc("eth_blockNumber", serde_json::json!([])).await?;
        parse_quantity(&result)
    }

    async fn check_connectivity(&self) -> bool {
        self.chain_height().await.is_ok()
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value)
        .map_err(|e| ConfigError::Validation(format!("{field} {value:?}: {e}")))
}

fn encode_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn decode_bytes(value: &serde_json::Value) -> Result<Vec<u8>, LedgerError> {
    let text = value
        .as_str()
        .ok_or_else(|| LedgerError::Response("call result is not a string".into()))?;
    hex::decode(text).map_err(|e| LedgerError::Response(format!("bad call result {text:?}: {e}")))
}

fn parse_quantity(value: &serde_json::Value) -> Result<u64, LedgerError> {
    let text = value
        .as_str()
        .ok_or_else(|| LedgerError::Response("quantity is not a string".into()))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Response(format!("bad quantity {text:?}: {e}")))
}
