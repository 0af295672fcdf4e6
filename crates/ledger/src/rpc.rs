//! Minimal Ethereum JSON-RPC client over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::address::LedgerAddress;
use crate::error::RpcError;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Long-lived handle to one ledger node; the HTTP connection pool is reused across transfers.
pub struct LedgerClient {
    endpoint: Url,
    http_client: Client,
    next_id: AtomicU64,
}

impl LedgerClient {
    pub fn new(endpoint: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|error| anyhow::anyhow!("invalid ledger endpoint {endpoint}: {error}"))?;
        let http_client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            endpoint,
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!(method, id = request.id, "ledger rpc call");

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let parsed: RpcResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Transport(format!("HTTP {status} from node")));
            }
            Err(error) => return Err(RpcError::InvalidResponse(error.to_string())),
        };

        if let Some(error) = parsed.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = parsed
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method} returned no result")))?;

        serde_json::from_value(result)
            .map_err(|error| RpcError::InvalidResponse(format!("{method}: {error}")))
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let value: String = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&value).and_then(to_u64)
    }

    /// Next nonce for `address`, counting transactions still in the pool.
    pub async fn pending_nonce(&self, address: &LedgerAddress) -> Result<u64, RpcError> {
        let value: String = self
            .call(
                "eth_getTransactionCount",
                json!([address.to_string(), "pending"]),
            )
            .await?;
        parse_quantity(&value).and_then(to_u64)
    }

    pub async fn gas_price(&self) -> Result<u128, RpcError> {
        let value: String = self.call("eth_gasPrice", json!([])).await?;
        parse_quantity(&value)
    }

    pub async fn estimate_gas(
        &self,
        from: &LedgerAddress,
        to: &LedgerAddress,
        data: &[u8],
    ) -> Result<u64, RpcError> {
        let value: String = self
            .call(
                "eth_estimateGas",
                json!([{
                    "from": from.to_string(),
                    "to": to.to_string(),
                    "data": format!("0x{}", hex::encode(data)),
                }]),
            )
            .await?;
        parse_quantity(&value).and_then(to_u64)
    }

    pub async fn code_at(&self, address: &LedgerAddress) -> Result<Vec<u8>, RpcError> {
        let value: String = self
            .call("eth_getCode", json!([address.to_string(), "latest"]))
            .await?;
        hex::decode(value.trim_start_matches("0x"))
            .map_err(|error| RpcError::InvalidResponse(format!("eth_getCode: {error}")))
    }

    /// Hand a signed transaction to the node's pool; returns the hash the node reports.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        self.call(
            "eth_sendRawTransaction",
            json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }
}

fn parse_quantity(value: &str) -> Result<u128, RpcError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::InvalidResponse(format!("quantity {value} lacks 0x prefix")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|error| RpcError::InvalidResponse(format!("quantity {value}: {error}")))
}

fn to_u64(value: u128) -> Result<u64, RpcError> {
    u64::try_from(value).map_err(|_| RpcError::InvalidResponse(format!("{value} exceeds u64")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x4a817c800").unwrap(), 20_000_000_000);
        assert!(parse_quantity("42").is_err());
        assert!(parse_quantity("0xnope").is_err());
    }

    #[test]
    fn rejects_invalid_endpoint() {
        assert!(LedgerClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn narrowing_overflow_is_reported() {
        assert!(to_u64(u128::from(u64::MAX) + 1).is_err());
        assert_eq!(to_u64(7).unwrap(), 7);
    }
}
