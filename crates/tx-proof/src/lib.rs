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
//! # Tx Proof Engine 🕸️
//!
//! Builds and verifies the opaque transaction proofs attached to every
//! [`TxContent`](tcc_gateway_types::TxContent) the gateway hands to the relay.
//!
//! ## Overview
//!
//! The proof mode is chosen once, in the configuration:
//! * `none`: the proof is the empty object `{}` and always verifies.
//! * `direct`: the verifier fetches the transaction again and compares bytes.
//! * `spv`: the verifier checks the proof against the header chain kept by
//!   the block header synchronizer.
//!
//! Building a proof in `direct` or `spv` mode first catches the header sync
//! up to the block of the transaction.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tcc_gateway_chain::{ChainRegistry, TransactionDetail};
use tcc_gateway_store::HeaderStore;
use tcc_gateway_types::{TxVerifyType, EMPTY_PARAMETER};
use tcc_gateway_utils::Result;

/// Something able to bring the header sync of a chain up to a height.
///
/// Implemented by the block header synchronizer; the proof engine only
/// needs this one capability from it.
#[async_trait::async_trait]
pub trait HeaderCatchUp: Send + Sync {
    /// Returns once headers up to `height` were acknowledged by the relay.
    async fn ensure_synced(&self, chain_rid: &str, height: u64) -> Result<()>;
}

/// The proof bundle, serialized as JSON into `txProve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxProof {
    /// Hash of the proven transaction.
    pub tx_id: String,
    /// Canonical bytes of the transaction.
    #[serde(with = "tcc_gateway_types::bytes_b64")]
    pub tx_byte: Vec<u8>,
    /// Chain the transaction lives on.
    pub chain_rid: String,
    /// Height of the including block.
    pub block_height: u64,
    /// Hash of the including block.
    pub block_hash: String,
}

impl From<(&str, &TransactionDetail)> for TxProof {
    fn from((chain_rid, tx): (&str, &TransactionDetail)) -> Self {
        Self {
            tx_id: tx.tx_id.clone(),
            tx_byte: tx.tx_bytes.clone(),
            chain_rid: chain_rid.to_owned(),
            block_height: tx.block_height,
            block_hash: tx.block_hash.clone(),
        }
    }
}

/// Builds and verifies transaction proofs in the configured mode.
#[derive(Clone)]
pub struct TxProofEngine {
    mode: TxVerifyType,
    chains: ChainRegistry,
    headers: Arc<dyn HeaderStore>,
    catch_up: Option<Arc<dyn HeaderCatchUp>>,
}

impl Debug for TxProofEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxProofEngine")
            .field("mode", &self.mode)
            .field("catch_up", &self.catch_up.is_some())
            .finish()
    }
}

impl TxProofEngine {
    /// Creates an engine without header catch-up.
    pub fn new(
        mode: TxVerifyType,
        chains: ChainRegistry,
        headers: Arc<dyn HeaderStore>,
    ) -> Self {
        Self {
            mode,
            chains,
            headers,
            catch_up: None,
        }
    }

    /// Makes proof building wait for the header sync first.
    pub fn with_catch_up(mut self, catch_up: Arc<dyn HeaderCatchUp>) -> Self {
        self.catch_up = Some(catch_up);
        self
    }

    /// The configured mode.
    pub fn mode(&self) -> TxVerifyType {
        self.mode
    }

    /// Builds the proof of `tx`, included in `chain_rid`.
    ///
    /// Never fails: when the proof cannot be built the empty proof `{}` is
    /// returned and the failure is logged, the relay then decides whether
    /// the request is acceptable.
    #[tracing::instrument(skip(self, tx), fields(tx_id = %tx.tx_id))]
    pub async fn build_proof(
        &self,
        chain_rid: &str,
        tx: &TransactionDetail,
    ) -> String {
        if self.mode == TxVerifyType::None {
            return EMPTY_PARAMETER.to_owned();
        }
        match self.try_build_proof(chain_rid, tx).await {
            Ok(proof) => proof,
            Err(e) => {
                tracing::warn!(
                    %chain_rid,
                    height = tx.block_height,
                    error = %e,
                    "Failed to build the tx proof, sending an empty one",
                );
                EMPTY_PARAMETER.to_owned()
            }
        }
    }

    async fn try_build_proof(
        &self,
        chain_rid: &str,
        tx: &TransactionDetail,
    ) -> Result<String> {
        if let Some(catch_up) = &self.catch_up {
            catch_up.ensure_synced(chain_rid, tx.block_height).await?;
        }
        let proof = TxProof::from((chain_rid, tx));
        Ok(serde_json::to_string(&proof)?)
    }

    /// Checks an opaque proof produced by [`Self::build_proof`] (here or on
    /// another gateway running the same mode).
    #[tracing::instrument(skip_all)]
    pub async fn verify(&self, proof: &str) -> Result<bool> {
        if self.mode == TxVerifyType::None {
            return Ok(true);
        }
        let proof: TxProof = serde_json::from_str(proof)?;
        match self.mode {
            TxVerifyType::None => Ok(true),
            TxVerifyType::Direct => self.verify_direct(&proof).await,
            TxVerifyType::Spv => self.verify_spv(&proof),
        }
    }

    async fn verify_direct(&self, proof: &TxProof) -> Result<bool> {
        let chain = self.chains.get(&proof.chain_rid)?;
        let tx = chain.get_tx_by_hash(&proof.tx_id).await?;
        let matches = tx.tx_bytes == proof.tx_byte;
        if !matches {
            tracing::debug!(
                tx_id = %proof.tx_id,
                "Proof bytes differ from the transaction on chain",
            );
        }
        Ok(matches)
    }

    fn verify_spv(&self, proof: &TxProof) -> Result<bool> {
        let header =
            match self.headers.get_header(&proof.chain_rid, proof.block_height)? {
                Some(header) => header,
                None => {
                    tracing::debug!(
                        chain_rid = %proof.chain_rid,
                        height = proof.block_height,
                        "No synchronized header at this height",
                    );
                    return Ok(false);
                }
            };
        Ok(header.hash == proof.block_hash
            && header.tx_ids.iter().any(|id| id == &proof.tx_id))
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tcc_gateway_chain::mocked::MockedChainAdapter;
    use tcc_gateway_chain::ChainAdapter;
    use tcc_gateway_store::{HeaderRecord, InMemoryStore};

    use super::*;

    #[derive(Default)]
    struct RecordingCatchUp {
        calls: Mutex<Vec<(String, u64)>>,
    }

    #[async_trait::async_trait]
    impl HeaderCatchUp for RecordingCatchUp {
        async fn ensure_synced(
            &self,
            chain_rid: &str,
            height: u64,
        ) -> Result<()> {
            self.calls.lock().push((chain_rid.to_owned(), height));
            Ok(())
        }
    }

    fn tx(bytes: &[u8]) -> TransactionDetail {
        TransactionDetail {
            tx_id: "0xabc".into(),
            tx_bytes: bytes.to_vec(),
            block_height: 7,
            block_hash: format!("0x{:064x}", 7),
        }
    }

    fn setup(
        mode: TxVerifyType,
    ) -> (TxProofEngine, Arc<MockedChainAdapter>, InMemoryStore) {
        let chain = Arc::new(MockedChainAdapter::new("chain1"));
        let store = InMemoryStore::default();
        let engine = TxProofEngine::new(
            mode,
            ChainRegistry::new([chain.clone() as Arc<dyn ChainAdapter>]),
            Arc::new(store.clone()),
        );
        (engine, chain, store)
    }

    #[tokio::test]
    async fn none_mode_proofs_are_empty_and_always_verify() {
        let (engine, _, _) = setup(TxVerifyType::None);
        let proof = engine.build_proof("chain1", &tx(b"raw")).await;
        assert_eq!(proof, "{}");
        assert!(engine.verify(&proof).await.unwrap());
        assert!(engine.verify("not even json").await.unwrap());
    }

    #[tokio::test]
    async fn direct_mode_compares_against_the_chain() {
        let (engine, chain, _) = setup(TxVerifyType::Direct);
        chain.insert_tx(tx(b"raw"));
        let proof = engine.build_proof("chain1", &tx(b"raw")).await;
        assert!(engine.verify(&proof).await.unwrap());

        chain.insert_tx(tx(b"tampered"));
        assert!(!engine.verify(&proof).await.unwrap());
    }

    #[tokio::test]
    async fn building_waits_for_the_header_sync() {
        let (engine, _, _) = setup(TxVerifyType::Direct);
        let catch_up = Arc::new(RecordingCatchUp::default());
        let engine = engine.with_catch_up(catch_up.clone());
        let proof = engine.build_proof("chain1", &tx(b"raw")).await;
        let parsed: TxProof = serde_json::from_str(&proof).unwrap();
        assert_eq!(parsed.block_height, 7);
        assert_eq!(parsed.chain_rid, "chain1");
        assert_eq!(*catch_up.calls.lock(), vec![("chain1".to_owned(), 7)]);
    }

    #[tokio::test]
    async fn spv_mode_checks_the_local_header_chain() {
        let (engine, _, store) = setup(TxVerifyType::Spv);
        let proof = engine.build_proof("chain1", &tx(b"raw")).await;
        assert!(!engine.verify(&proof).await.unwrap());

        store
            .insert_headers(
                "chain1",
                &[HeaderRecord {
                    height: 7,
                    hash: format!("0x{:064x}", 7),
                    tx_ids: vec!["0xabc".into()],
                }],
            )
            .unwrap();
        assert!(engine.verify(&proof).await.unwrap());

        store
            .insert_headers(
                "chain1",
                &[HeaderRecord {
                    height: 7,
                    hash: format!("0x{:064x}", 8),
                    tx_ids: vec!["0xabc".into()],
                }],
            )
            .unwrap();
        assert!(!engine.verify(&proof).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_chain_fails_verification() {
        let (engine, _, _) = setup(TxVerifyType::Direct);
        let proof = engine.build_proof("nowhere", &tx(b"raw")).await;
        assert!(engine.verify(&proof).await.is_err());
    }
}
