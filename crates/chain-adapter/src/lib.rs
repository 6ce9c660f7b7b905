// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(missing_docs)]
//! # Chain Adapters 🕸️
//!
//! ## Overview
//! A chain adapter is everything the gateway needs from one chain: read the
//! height, blocks and transactions, call contract methods, and stream the
//! logs of a contract.
//!
//! There are two adapters:
//! - [`EvmChainAdapter`]: talks to an EVM node over JSON-RPC.
//! - [`mocked::MockedChainAdapter`]: scripted, in-memory, used by tests.
//!
//! Adapters are collected once at startup into a read-only [`ChainRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tcc_gateway_utils::{Error, Result};
use tokio::sync::mpsc;

/// EVM adapter over ethers.
pub mod evm;

#[doc(hidden)]
pub mod mocked;

pub use evm::EvmChainAdapter;

/// A contract method call, as described by the cross-chain protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractCall {
    /// Address (or name, depending on the chain) of the contract.
    pub contract_name: String,
    /// Method to call.
    pub method: String,
    /// JSON ABI describing the contract.
    pub abi: String,
    /// JSON array of arguments, `"{}"` or empty for none.
    pub parameter: String,
}

/// A transaction as seen on chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionDetail {
    /// Transaction hash.
    pub tx_id: String,
    /// Canonical encoding of the signed transaction.
    pub tx_bytes: Vec<u8>,
    /// Height of the including block.
    pub block_height: u64,
    /// Hash of the including block.
    pub block_hash: String,
}

/// Result of [`ChainAdapter::invoke_contract`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeOutput {
    /// Decoded return values, rendered as strings.
    pub return_values: Vec<String>,
    /// The submitted transaction, when one was sent and requested.
    pub tx: Option<TransactionDetail>,
}

/// A block header, in the chain-agnostic form shipped to the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block height.
    pub number: u64,
    /// Block hash.
    pub hash: String,
    /// Hash of the parent block.
    pub parent_hash: String,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Hashes of the included transactions.
    pub transactions: Vec<String>,
}

/// Which logs to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Contract emitting the logs.
    pub contract: String,
    /// `0x` prefixed hash of the event signature.
    pub topic: String,
    /// First height to deliver, inclusive.
    pub from_height: u64,
}

/// One log delivered by [`ChainAdapter::subscribe_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractLog {
    /// Contract that emitted the log.
    pub contract: String,
    /// First topic of the log.
    pub topic: String,
    /// Hash of the emitting transaction.
    pub tx_id: String,
    /// Height of the including block.
    pub block_height: u64,
    /// ABI encoded, non indexed arguments.
    pub data: Vec<u8>,
}

/// Everything the gateway needs from one chain.
#[async_trait::async_trait]
pub trait ChainAdapter: Send + Sync {
    /// The resource id of the chain this adapter talks to.
    fn chain_rid(&self) -> &str;

    /// Calls `call.method` on `call.contract_name`.
    ///
    /// State changing methods are submitted as a transaction and awaited;
    /// when `need_tx` is set the included transaction is returned too.
    async fn invoke_contract(
        &self,
        call: &ContractCall,
        need_tx: bool,
    ) -> Result<InvokeOutput>;

    /// The current height of the chain.
    async fn get_height(&self) -> Result<u64>;

    /// The block at `height`.
    async fn get_block_by_height(&self, height: u64) -> Result<Block>;

    /// The transaction with the given hash.
    async fn get_tx_by_hash(&self, tx_id: &str) -> Result<TransactionDetail>;

    /// Streams the logs matching `filter` into `sink`, starting at
    /// `filter.from_height`.
    ///
    /// Returns once `sink` is closed by the consumer.
    async fn subscribe_events(
        &self,
        filter: LogFilter,
        sink: mpsc::Sender<ContractLog>,
    ) -> Result<()>;

    /// Whether the chain node answers a liveness probe.
    async fn health_check(&self) -> bool {
        self.get_height().await.is_ok()
    }
}

/// Holds one adapter per configured chain, keyed by chain resource id.
///
/// Built once at startup, read-only afterwards; clones share the adapters.
#[derive(Clone, Default)]
pub struct ChainRegistry {
    adapters: Arc<HashMap<String, Arc<dyn ChainAdapter>>>,
}

impl std::fmt::Debug for ChainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRegistry")
            .field("chains", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ChainRegistry {
    /// Creates a registry from the given adapters.
    pub fn new<I>(adapters: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ChainAdapter>>,
    {
        let adapters = adapters
            .into_iter()
            .map(|a| (a.chain_rid().to_owned(), a))
            .collect();
        Self {
            adapters: Arc::new(adapters),
        }
    }

    /// Returns the adapter of `chain_rid`.
    pub fn get(&self, chain_rid: &str) -> Result<Arc<dyn ChainAdapter>> {
        self.adapters
            .get(chain_rid)
            .cloned()
            .ok_or_else(|| Error::ChainNotFound {
                chain_rid: chain_rid.to_owned(),
            })
    }

    /// Iterates over all adapters.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ChainAdapter>> {
        self.adapters.values()
    }

    /// Number of configured chains.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// `true` if no chain is configured.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// `true` only if every chain answers its liveness probe.
    pub async fn health_check(&self) -> bool {
        let probes = self.adapters.values().map(|a| a.health_check());
        futures::future::join_all(probes).await.into_iter().all(|ok| ok)
    }

    /// Asks every chain for its height, failing on the first chain that
    /// does not answer.
    pub async fn ensure_reachable(&self) -> Result<()> {
        let probes = self.adapters.values().map(|adapter| async move {
            let height = adapter.get_height().await.map_err(|e| {
                Error::ChainUnreachable {
                    chain_rid: adapter.chain_rid().to_owned(),
                    reason: e.to_string(),
                }
            })?;
            tracing::debug!(
                chain_rid = %adapter.chain_rid(),
                height,
                "Chain is reachable",
            );
            Ok::<_, Error>(())
        });
        futures::future::try_join_all(probes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocked::MockedChainAdapter;

    #[tokio::test]
    async fn registry_health_requires_every_chain() {
        let a = Arc::new(MockedChainAdapter::new("a"));
        let b = Arc::new(MockedChainAdapter::new("b"));
        let registry = ChainRegistry::new([
            a.clone() as Arc<dyn ChainAdapter>,
            b.clone() as Arc<dyn ChainAdapter>,
        ]);
        assert!(registry.health_check().await);
        b.set_healthy(false);
        assert!(!registry.health_check().await);
    }

    #[tokio::test]
    async fn unreachable_chain_is_named() {
        let a = Arc::new(MockedChainAdapter::new("a"));
        let b = Arc::new(MockedChainAdapter::new("b"));
        let registry = ChainRegistry::new([
            a.clone() as Arc<dyn ChainAdapter>,
            b.clone() as Arc<dyn ChainAdapter>,
        ]);
        registry.ensure_reachable().await.unwrap();

        b.set_healthy(false);
        match registry.ensure_reachable().await {
            Err(Error::ChainUnreachable { chain_rid, .. }) => {
                assert_eq!(chain_rid, "b")
            }
            other => panic!("expected an unreachable chain, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_chain_is_an_error() {
        let registry = ChainRegistry::new([
            Arc::new(MockedChainAdapter::new("a")) as Arc<dyn ChainAdapter>
        ]);
        assert!(registry.get("a").is_ok());
        assert!(matches!(
            registry.get("z"),
            Err(Error::ChainNotFound { .. })
        ));
    }
}
