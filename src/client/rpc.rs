// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Context, Result};
use ethereum_types::{Address, H256, U64};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use crate::config::{ClientConfig, DEFAULT_REQ_TIMEOUT};
use crate::proofs::common::evm::left_pad_32;
use crate::types::{BlockHeader, BlockSelector, Bytes, EthProof};

/// A simple Ethereum JSON-RPC client
#[derive(Clone)]
pub struct EthRpcClient {
    http_client: reqwest::Client,
    url: Url,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl EthRpcClient {
    /// Creates a new client that sends requests to `url`
    pub fn new(url: Url, bearer_token: Option<&str>) -> Self {
        Self {
            http_client: reqwest::Client::default(),
            url,
            bearer_token: bearer_token.map(String::from),
            timeout: DEFAULT_REQ_TIMEOUT,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut client = Self::new(config.rpc_url.clone(), config.bearer_token.as_deref());
        client.timeout = config.request_timeout;
        client
    }

    /// Returns the number of the most recent block
    pub async fn block_number(&self) -> Result<u64> {
        let r = self.request::<U64>("eth_blockNumber", json!([])).await?;
        tracing::debug!("received eth_blockNumber response: {r:?}");
        Ok(r.as_u64())
    }

    /// Read one storage word of `address` at `block`
    pub async fn get_storage_at(
        &self,
        address: Address,
        key: H256,
        block: BlockSelector,
    ) -> Result<H256> {
        let r = self
            .request::<Bytes>(
                "eth_getStorageAt",
                json!([address, key, block.to_rpc_arg()]),
            )
            .await?;
        tracing::debug!("received eth_getStorageAt response: {r:?}");
        Ok(H256(left_pad_32(r.as_ref())))
    }

    /// Get the header fields of a block
    pub async fn get_block(&self, block: BlockSelector) -> Result<BlockHeader> {
        let r = self
            .request::<Option<BlockHeader>>(
                "eth_getBlockByNumber",
                json!([block.to_rpc_arg(), false]),
            )
            .await?;
        tracing::debug!("received eth_getBlockByNumber response: {r:?}");
        r.ok_or_else(|| anyhow!("block {block} not found"))
    }

    /// Calls the eth_getProof method (EIP-1186)
    pub async fn get_proof(
        &self,
        address: Address,
        keys: &[H256],
        block: BlockSelector,
    ) -> Result<EthProof> {
        let r = self
            .request::<EthProof>("eth_getProof", json!([address, keys, block.to_rpc_arg()]))
            .await?;
        tracing::debug!(
            "received eth_getProof response with {} storage proofs",
            r.storage_proof.len()
        );
        Ok(r)
    }

    /// Execute a read-only contract call
    pub async fn call(&self, to: Address, data: &[u8], block: BlockSelector) -> Result<Vec<u8>> {
        let tx = json!({
            "to": to,
            "data": format!("0x{}", hex::encode(data)),
        });
        let r = self
            .request::<Bytes>("eth_call", json!([tx, block.to_rpc_arg()]))
            .await?;
        tracing::debug!("received eth_call response: {r:?}");
        Ok(r.0)
    }

    /// Make a generic RPC request
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request_body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        tracing::debug!("{} request: {}", method, request_body);

        let mut builder = self.http_client.post(self.url.as_str()).json(&request_body);
        builder = builder.timeout(self.timeout);

        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?;
        let response_body = response.text().await?;
        tracing::debug!("{} raw response: {}", method, response_body);

        // Parse the JSON-RPC response
        let value: Value = serde_json::from_str(&response_body)
            .with_context(|| format!("{method} response is not JSON"))?;

        if let Some(error) = value.get("error") {
            let error_msg = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error");
            anyhow::bail!("{} RPC error: {}", method, error_msg);
        } else if let Some(result) = value.get("result") {
            let data: T = serde_json::from_value(result.clone())
                .with_context(|| format!("decode {method} result"))?;
            Ok(data)
        } else {
            anyhow::bail!("{} response has neither result nor error", method);
        }
    }
}
