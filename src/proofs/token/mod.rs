// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

//! ERC-20 token data and the typed `eth_getProof` wrapper.

use std::sync::Arc;

use ethereum_types::{Address, H256, U256};
use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::StorageBackend;
use crate::proofs::common::{
    abi::{self, AbiError},
    bundle::StorageProofBundle,
    cancel::cancellable,
    error::{ProofError, ProofResult},
};
use crate::types::BlockSelector;

/// Placeholder for tokens whose `name()` returns nothing
pub const UNKNOWN_NAME: &str = "unknown-name";
/// Placeholder for tokens whose `symbol()` returns nothing
pub const UNKNOWN_SYMBOL: &str = "unknown-symbol";

/// Descriptive data of an ERC-20 like token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

/// Convert a big-endian 256-bit integer to an arbitrary precision one
pub fn u256_to_biguint(v: U256) -> BigUint {
    let mut buf = [0u8; 32];
    v.to_big_endian(&mut buf);
    BigUint::from_bytes_be(&buf)
}

/// Scale a raw token amount by `10^decimals`
pub fn balance_to_rat(raw: U256, decimals: u8) -> BigRational {
    let denom = BigInt::from(10u32).pow(u32::from(decimals));
    BigRational::new(BigInt::from(u256_to_biguint(raw)), denom)
}

/// Binding of a token contract to a storage backend.
///
/// The binding is immutable and cheap to clone; every call takes the caller's
/// cancellation token.
pub struct TokenMetadata<B: ?Sized> {
    backend: Arc<B>,
    address: Address,
}

impl<B: ?Sized> Clone for TokenMetadata<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            address: self.address,
        }
    }
}

impl<B: StorageBackend + ?Sized> TokenMetadata<B> {
    pub fn new(backend: Arc<B>, address: Address) -> Self {
        Self { backend, address }
    }

    /// Token contract address
    pub fn address(&self) -> Address {
        self.address
    }

    async fn call(
        &self,
        what: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> ProofResult<Vec<u8>> {
        cancellable(cancel, async {
            self.backend
                .call(self.address, data, BlockSelector::Latest)
                .await
                .map_err(|e| ProofError::remote(format!("{what} on {:?}", self.address), e))
        })
        .await
    }

    /// Wraps the `name()` contract call
    pub async fn token_name(&self, cancel: &CancellationToken) -> ProofResult<String> {
        let raw = self.call("name()", abi::encode_call("name()"), cancel).await?;
        Ok(abi::decode_string(&raw)?)
    }

    /// Wraps the `symbol()` contract call
    pub async fn token_symbol(&self, cancel: &CancellationToken) -> ProofResult<String> {
        let raw = self.call("symbol()", abi::encode_call("symbol()"), cancel).await?;
        Ok(abi::decode_string(&raw)?)
    }

    /// Wraps the `decimals()` contract call
    pub async fn token_decimals(&self, cancel: &CancellationToken) -> ProofResult<u8> {
        let raw = self
            .call("decimals()", abi::encode_call("decimals()"), cancel)
            .await?;
        Ok(abi::decode_uint8(&raw)?)
    }

    /// Wraps the `totalSupply()` contract call
    pub async fn token_total_supply(&self, cancel: &CancellationToken) -> ProofResult<U256> {
        let raw = self
            .call("totalSupply()", abi::encode_call("totalSupply()"), cancel)
            .await?;
        Ok(abi::decode_uint256(&raw)?)
    }

    /// Wraps the `balanceOf(address)` contract call, unscaled
    pub async fn raw_balance(
        &self,
        holder: Address,
        cancel: &CancellationToken,
    ) -> ProofResult<U256> {
        let raw = self
            .call(
                "balanceOf(address)",
                abi::encode_address_call("balanceOf(address)", holder),
                cancel,
            )
            .await?;
        Ok(abi::decode_uint256(&raw)?)
    }

    /// Gets name, symbol, decimals and total supply.
    ///
    /// Tokens that return nothing for `name()`/`symbol()` get placeholders; decimals
    /// and total supply are required.
    pub async fn fetch_metadata(&self, cancel: &CancellationToken) -> ProofResult<TokenData> {
        let name = match self.token_name(cancel).await {
            Ok(name) => name,
            Err(ProofError::Abi(AbiError::Empty)) => UNKNOWN_NAME.to_string(),
            Err(e) => return Err(e),
        };

        let symbol = match self.token_symbol(cancel).await {
            Ok(symbol) => symbol,
            Err(ProofError::Abi(AbiError::Empty)) => UNKNOWN_SYMBOL.to_string(),
            Err(e) => return Err(e),
        };

        let decimals = self
            .token_decimals(cancel)
            .await
            .map_err(|e| ProofError::metadata("decimals", e))?;

        let total_supply = self
            .token_total_supply(cancel)
            .await
            .map_err(|e| ProofError::metadata("total supply", e))?;

        let data = TokenData {
            address: self.address,
            name,
            symbol,
            decimals,
            total_supply,
        };
        tracing::debug!("received token data: {data:?}");
        Ok(data)
    }

    /// Returns the current holder balance scaled by the token decimals
    pub async fn fetch_balance(
        &self,
        holder: Address,
        cancel: &CancellationToken,
    ) -> ProofResult<BigRational> {
        let raw = self.raw_balance(holder, cancel).await?;
        let decimals = self
            .token_decimals(cancel)
            .await
            .map_err(|e| ProofError::metadata("decimals", e))?;
        Ok(balance_to_rat(raw, decimals))
    }

    /// Read one storage word of the token contract
    pub async fn storage_at(
        &self,
        key: H256,
        block: BlockSelector,
        cancel: &CancellationToken,
    ) -> ProofResult<H256> {
        cancellable(cancel, async {
            self.backend
                .storage_at(self.address, key, block)
                .await
                .map_err(|e| ProofError::remote(format!("storage {key:?} at block {block}"), e))
        })
        .await
    }

    /// Fetch a storage proof for `keys` and anchor it to the block's state root.
    ///
    /// The header and the proof are fetched separately; either failing fails the call.
    pub async fn fetch_storage_proof(
        &self,
        keys: &[H256],
        block: BlockSelector,
        cancel: &CancellationToken,
    ) -> ProofResult<StorageProofBundle> {
        let header = cancellable(cancel, async {
            self.backend
                .block_header(block)
                .await
                .map_err(|e| ProofError::remote(format!("header of block {block}"), e))
        })
        .await?;

        let proof = cancellable(cancel, async {
            self.backend
                .storage_proof(self.address, keys, block)
                .await
                .map_err(|e| ProofError::remote(format!("eth_getProof at block {block}"), e))
        })
        .await?;

        tracing::debug!(
            "received storage proof for {} keys at block {} (state root {:?})",
            keys.len(),
            header.number,
            header.state_root
        );

        Ok(StorageProofBundle {
            state_root: header.state_root,
            height: header.number.as_u64(),
            keys: keys.to_vec(),
            proof,
        })
    }
}
