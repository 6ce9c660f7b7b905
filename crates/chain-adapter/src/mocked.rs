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

//! An in-memory chain, scripted by tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use tcc_gateway_utils::{Error, Result};
use tokio::sync::mpsc;

use crate::{
    Block, ChainAdapter, ContractCall, ContractLog, InvokeOutput, LogFilter,
    TransactionDetail,
};

/// A [`ChainAdapter`] whose chain lives in memory.
///
/// Blocks up to the current height are synthesized on demand unless one
/// was inserted explicitly. Contract invocations are recorded and answered
/// from a queue of scripted results (an empty queue answers with success).
#[derive(Debug)]
pub struct MockedChainAdapter {
    chain_rid: String,
    height: AtomicU64,
    healthy: AtomicBool,
    blocks: RwLock<HashMap<u64, Block>>,
    failing_blocks: RwLock<HashSet<u64>>,
    block_fetches: AtomicUsize,
    txs: RwLock<HashMap<String, TransactionDetail>>,
    invoke_results: Mutex<VecDeque<std::result::Result<InvokeOutput, String>>>,
    invocations: Mutex<Vec<(ContractCall, bool)>>,
    logs: Mutex<Vec<ContractLog>>,
}

impl MockedChainAdapter {
    /// Creates an empty, healthy chain at height 0.
    pub fn new(chain_rid: impl Into<String>) -> Self {
        Self {
            chain_rid: chain_rid.into(),
            height: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            blocks: Default::default(),
            failing_blocks: Default::default(),
            block_fetches: AtomicUsize::new(0),
            txs: Default::default(),
            invoke_results: Default::default(),
            invocations: Default::default(),
            logs: Default::default(),
        }
    }

    /// Sets the chain height.
    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Makes the liveness probe (and `get_height`) fail or succeed.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Stores a block, replacing the synthesized one.
    pub fn insert_block(&self, block: Block) {
        self.blocks.write().insert(block.number, block);
    }

    /// Fetching the block at `height` fails from now on.
    pub fn fail_block(&self, height: u64) {
        self.failing_blocks.write().insert(height);
    }

    /// Fetching the block at `height` succeeds again.
    pub fn heal_block(&self, height: u64) {
        self.failing_blocks.write().remove(&height);
    }

    /// How many times a block was requested.
    pub fn block_fetches(&self) -> usize {
        self.block_fetches.load(Ordering::SeqCst)
    }

    /// Stores a transaction.
    pub fn insert_tx(&self, tx: TransactionDetail) {
        self.txs.write().insert(tx.tx_id.clone(), tx);
    }

    /// Queues the result of the next contract invocation.
    pub fn push_invoke_result(
        &self,
        result: std::result::Result<InvokeOutput, String>,
    ) {
        self.invoke_results.lock().push_back(result);
    }

    /// Every contract invocation so far, with its `need_tx` flag.
    pub fn invocations(&self) -> Vec<(ContractCall, bool)> {
        self.invocations.lock().clone()
    }

    /// Queues a log for subscribers.
    pub fn push_log(&self, log: ContractLog) {
        self.logs.lock().push(log);
    }

    /// The block synthesized for `height`.
    pub fn synthetic_block(height: u64) -> Block {
        Block {
            number: height,
            hash: format!("0x{height:064x}"),
            parent_hash: format!("0x{:064x}", height.saturating_sub(1)),
            timestamp: 1_600_000_000 + height,
            transactions: Vec::new(),
        }
    }

    fn synthetic_tx(&self, index: usize) -> TransactionDetail {
        let height = self.height.load(Ordering::SeqCst);
        let tx = TransactionDetail {
            tx_id: format!("0x{:064x}", 0xfeed_0000 + index),
            tx_bytes: format!("mock-tx-{index}").into_bytes(),
            block_height: height,
            block_hash: format!("0x{height:064x}"),
        };
        self.insert_tx(tx.clone());
        tx
    }
}

#[async_trait::async_trait]
impl ChainAdapter for MockedChainAdapter {
    fn chain_rid(&self) -> &str {
        &self.chain_rid
    }

    async fn invoke_contract(
        &self,
        call: &ContractCall,
        need_tx: bool,
    ) -> Result<InvokeOutput> {
        let index = {
            let mut invocations = self.invocations.lock();
            invocations.push((call.clone(), need_tx));
            invocations.len()
        };
        let scripted = self.invoke_results.lock().pop_front();
        match scripted {
            Some(Ok(mut output)) => {
                if need_tx && output.tx.is_none() {
                    output.tx = Some(self.synthetic_tx(index));
                }
                Ok(output)
            }
            Some(Err(e)) => Err(Error::ContractInvocation(e)),
            None => Ok(InvokeOutput {
                return_values: Vec::new(),
                tx: need_tx.then(|| self.synthetic_tx(index)),
            }),
        }
    }

    async fn get_height(&self) -> Result<u64> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(Error::Generic("mocked chain is unreachable"));
        }
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn get_block_by_height(&self, height: u64) -> Result<Block> {
        self.block_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_blocks.read().contains(&height) {
            return Err(Error::Generic("mocked block fetch failure"));
        }
        if let Some(block) = self.blocks.read().get(&height) {
            return Ok(block.clone());
        }
        if height <= self.height.load(Ordering::SeqCst) {
            Ok(Self::synthetic_block(height))
        } else {
            Err(Error::BlockNotFound(height))
        }
    }

    async fn get_tx_by_hash(&self, tx_id: &str) -> Result<TransactionDetail> {
        self.txs
            .read()
            .get(tx_id)
            .cloned()
            .ok_or_else(|| Error::TransactionNotFound(tx_id.to_owned()))
    }

    async fn subscribe_events(
        &self,
        filter: LogFilter,
        sink: mpsc::Sender<ContractLog>,
    ) -> Result<()> {
        let logs: Vec<_> = self
            .logs
            .lock()
            .iter()
            .filter(|l| {
                l.block_height >= filter.from_height
                    && l.contract == filter.contract
                    && l.topic == filter.topic
            })
            .cloned()
            .collect();
        for log in logs {
            if sink.send(log).await.is_err() {
                return Ok(());
            }
        }
        sink.closed().await;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
