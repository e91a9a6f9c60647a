// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use anyhow::Result;
use async_trait::async_trait;
use ethereum_types::{Address, H256};

use super::EthRpcClient;
use crate::types::{BlockHeader, BlockSelector, EthProof};

/// Read-only view of a node's state used by proof generation
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read one 32-byte storage word of `contract` at `block`
    async fn storage_at(&self, contract: Address, key: H256, block: BlockSelector) -> Result<H256>;

    /// Resolve a block selector to its header
    async fn block_header(&self, block: BlockSelector) -> Result<BlockHeader>;

    /// Fetch account and storage Merkle proofs (EIP-1186)
    async fn storage_proof(
        &self,
        contract: Address,
        keys: &[H256],
        block: BlockSelector,
    ) -> Result<EthProof>;

    /// Execute a read-only call and return the raw ABI-encoded result
    async fn call(&self, contract: Address, data: Vec<u8>, block: BlockSelector) -> Result<Vec<u8>>;
}

#[async_trait]
impl StorageBackend for EthRpcClient {
    async fn storage_at(&self, contract: Address, key: H256, block: BlockSelector) -> Result<H256> {
        self.get_storage_at(contract, key, block).await
    }

    async fn block_header(&self, block: BlockSelector) -> Result<BlockHeader> {
        self.get_block(block).await
    }

    async fn storage_proof(
        &self,
        contract: Address,
        keys: &[H256],
        block: BlockSelector,
    ) -> Result<EthProof> {
        self.get_proof(contract, keys, block).await
    }

    async fn call(&self, contract: Address, data: Vec<u8>, block: BlockSelector) -> Result<Vec<u8>> {
        EthRpcClient::call(self, contract, &data, block).await
    }
}
