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

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tcc_gateway_chain::{Block, ChainRegistry};
use tcc_gateway_proof::HeaderCatchUp;
use tcc_gateway_relay::RelayDispatcher;
use tcc_gateway_store::{CursorKind, CursorStore, HeaderRecord, HeaderStore};
use tcc_gateway_types::{SyncBlockHeaderRequest, TxVerifyType, Version};
use tcc_gateway_utils::{probe, Error, Result};
use tokio::sync::Mutex;

/// Splits `start..=end` into contiguous batches of at most `batch_size`
/// heights, in order.
///
/// An empty range (`start > end`) yields no batch.
pub fn plan_batches(
    start: u64,
    end: u64,
    batch_size: u64,
) -> Vec<RangeInclusive<u64>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut from = start;
    while from <= end {
        let to = from.saturating_add(batch_size - 1).min(end);
        batches.push(from..=to);
        if to == u64::MAX {
            break;
        }
        from = to + 1;
    }
    batches
}

/// Ships block headers to the relay, chain by chain.
///
/// Each run picks up right after the header cursor of the chain, reads the
/// current height and sends the missing headers in contiguous batches. A
/// batch is only sent once all of its blocks were fetched, and the cursor
/// only moves once the relay acknowledged it, so a failure leaves the cursor
/// on the last acknowledged batch boundary.
///
/// Runs on the same chain never overlap, whether they come from the timer or
/// from a proof waiting for its block.
pub struct BlockHeaderSynchronizer {
    gateway_id: String,
    mode: TxVerifyType,
    batch_size: u64,
    interval: Duration,
    chains: ChainRegistry,
    cursors: Arc<dyn CursorStore>,
    headers: Arc<dyn HeaderStore>,
    dispatcher: RelayDispatcher,
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for BlockHeaderSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockHeaderSynchronizer")
            .field("gateway_id", &self.gateway_id)
            .field("mode", &self.mode)
            .field("batch_size", &self.batch_size)
            .field("interval", &self.interval)
            .finish()
    }
}

impl BlockHeaderSynchronizer {
    /// Creates a synchronizer for every chain of `chains`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway_id: impl Into<String>,
        mode: TxVerifyType,
        batch_size: u64,
        interval: Duration,
        chains: ChainRegistry,
        cursors: Arc<dyn CursorStore>,
        headers: Arc<dyn HeaderStore>,
        dispatcher: RelayDispatcher,
    ) -> Self {
        let locks = chains
            .iter()
            .map(|c| (c.chain_rid().to_owned(), Arc::new(Mutex::new(()))))
            .collect();
        Self {
            gateway_id: gateway_id.into(),
            mode,
            batch_size: batch_size.max(1),
            interval,
            chains,
            cursors,
            headers,
            dispatcher,
            locks,
        }
    }

    /// Brings the relay up to the current height of `chain_rid`.
    ///
    /// Returns the number of batches acknowledged.
    #[tracing::instrument(skip(self))]
    pub async fn sync_once(&self, chain_rid: &str) -> Result<usize> {
        let lock = self.locks.get(chain_rid).cloned().ok_or_else(|| {
            Error::ChainNotFound {
                chain_rid: chain_rid.to_owned(),
            }
        })?;
        let _guard = lock.lock().await;
        let chain = self.chains.get(chain_rid)?;

        let cursor = self.cursors.get_cursor(chain_rid, CursorKind::BlockHeader)?;
        let start = if cursor == 0 { 0 } else { cursor + 1 };
        let end = chain.get_height().await?;
        let batches = plan_batches(start, end, self.batch_size);
        tracing::debug!(start, end, batches = batches.len(), "Syncing block headers");

        for batch in &batches {
            let mut blocks =
                Vec::with_capacity((batch.end() - batch.start()) as usize + 1);
            for height in batch.clone() {
                let block = chain.get_block_by_height(height).await.map_err(|e| {
                    tracing::error!(
                        height,
                        start,
                        end,
                        error = %e,
                        "Failed to fetch block, discarding the batch",
                    );
                    e
                })?;
                blocks.push(block);
            }
            let request = self.batch_request(chain_rid, *batch.end(), &blocks)?;
            // headers are stored before the cursor can move past them.
            if self.mode == TxVerifyType::Spv {
                let records: Vec<_> = blocks.into_iter().map(header_record).collect();
                self.headers.insert_headers(chain_rid, &records)?;
            }
            self.dispatcher.sync_block_header(&request).await?;
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::TRACE,
                kind = %probe::Kind::Sync,
                %chain_rid,
                from = *batch.start(),
                to = *batch.end(),
                end,
            );
        }
        Ok(batches.len())
    }

    /// Brings the relay up to date on every chain, one chain after the
    /// other. Used at startup, where any failure is fatal.
    pub async fn sync_all(&self) -> Result<()> {
        for chain in self.chains.iter() {
            let chain_rid = chain.chain_rid();
            let batches = self.sync_once(chain_rid).await?;
            tracing::debug!(%chain_rid, batches, "Initial header sync done");
        }
        Ok(())
    }

    fn batch_request(
        &self,
        chain_rid: &str,
        trailing_height: u64,
        blocks: &[Block],
    ) -> Result<SyncBlockHeaderRequest> {
        let encoded = blocks
            .iter()
            .map(|block| -> Result<String> {
                Ok(STANDARD.encode(serde_json::to_vec(block)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SyncBlockHeaderRequest {
            version: Version::V100 as i32,
            gateway_id: self.gateway_id.clone(),
            chain_rid: chain_rid.to_owned(),
            block_height: trailing_height,
            block_header: Vec::new(),
            block_header_batch: serde_json::to_vec(&encoded)?,
        })
    }

    /// Syncs `chain_rid` on every tick of the configured interval, forever.
    ///
    /// Failed runs are logged and retried on the next tick, except when the
    /// relay disabled this gateway, which ends the loop with
    /// [`Error::GatewayDisabled`].
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, chain_rid: &str) -> Result<()> {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Sync,
            %chain_rid,
            starting = true,
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.sync_once(chain_rid).await {
                Ok(batches) => {
                    tracing::trace!(batches, "Header sync round done");
                }
                Err(Error::GatewayDisabled) => return Err(Error::GatewayDisabled),
                Err(e) => {
                    tracing::error!(error = %e, "Header sync round failed");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl HeaderCatchUp for BlockHeaderSynchronizer {
    async fn ensure_synced(&self, chain_rid: &str, height: u64) -> Result<()> {
        let cursor = self.cursors.get_cursor(chain_rid, CursorKind::BlockHeader)?;
        if cursor > 0 && cursor >= height {
            return Ok(());
        }
        self.sync_once(chain_rid).await.map(|_| ())
    }
}

fn header_record(block: Block) -> HeaderRecord {
    HeaderRecord {
        height: block.number,
        hash: block.hash,
        tx_ids: block.transactions,
    }
}
