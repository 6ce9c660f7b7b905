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

use std::sync::Arc;
use std::time::Duration;

use ethers::abi::ParamType;
use tcc_gateway_chain::{ChainAdapter, ContractLog, LogFilter, TransactionDetail};
use tcc_gateway_proof::TxProofEngine;
use tcc_gateway_relay::{CrossChainJob, DispatchQueue};
use tcc_gateway_store::{CursorKind, CursorStore};
use tcc_gateway_types::{
    Event, CROSS_CHAIN_TRIGGER_EVENT, CROSS_CHAIN_TRIGGER_SIGNATURE,
};
use tcc_gateway_utils::metric::Metrics;
use tcc_gateway_utils::retry::ConstantWithMaxRetryCount;
use tcc_gateway_utils::{probe, Error, Result};
use tokio::sync::mpsc;
use typed_builder::TypedBuilder;

use crate::CrossChainRequestBuilder;

/// How many times a transaction lookup is retried before the log is dropped.
const TX_FETCH_MAX_RETRY_COUNT: usize = 5;

/// `0x` prefixed keccak256 hash of the trigger event signature.
pub fn trigger_topic() -> String {
    format!(
        "0x{}",
        hex::encode(ethers::utils::keccak256(CROSS_CHAIN_TRIGGER_SIGNATURE))
    )
}

/// Decodes the `(string, string)` payload of a trigger log into the
/// space separated items it carries.
pub fn decode_trigger_payload(data: &[u8]) -> Result<Vec<String>> {
    let tokens =
        ethers::abi::decode(&[ParamType::String, ParamType::String], data)?;
    let payload = tokens
        .into_iter()
        .filter_map(|t| t.into_string())
        .collect::<Vec<_>>()
        .join(" ");
    if payload.trim().is_empty() {
        return Err(Error::NotCrossChainEvent("empty payload".into()));
    }
    Ok(payload.split(' ').map(str::to_owned).collect())
}

/// Watches the trigger logs of one contract on one chain.
///
/// The chain adapter produces logs into a bounded channel, this watcher
/// consumes them one at a time: decode, fetch the emitting transaction,
/// prove it, build the request and submit it to the dispatch queue. A log
/// that fails any step is logged and dropped; the relay is never waited on.
#[derive(TypedBuilder)]
pub struct ChainEventWatcher {
    chain: Arc<dyn ChainAdapter>,
    #[builder(setter(into))]
    contract: String,
    cursors: Arc<dyn CursorStore>,
    proofs: TxProofEngine,
    requests: CrossChainRequestBuilder,
    queue: DispatchQueue,
    metrics: Arc<Metrics>,
    /// Capacity of the channel between the adapter and the watcher.
    #[builder(default = 256)]
    channel_size: usize,
    /// Pause between two lookups of a transaction the node does not know yet.
    #[builder(default = Duration::from_millis(500))]
    tx_fetch_interval: Duration,
}

impl std::fmt::Debug for ChainEventWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEventWatcher")
            .field("chain_rid", &self.chain.chain_rid())
            .field("contract", &self.contract)
            .finish()
    }
}

impl ChainEventWatcher {
    /// Subscribes from the cross cursor of the chain (inclusive) and
    /// processes logs until the subscription ends or the dispatch queue is
    /// closed.
    #[tracing::instrument(
        skip_all,
        fields(chain_rid = %self.chain.chain_rid(), contract = %self.contract),
    )]
    pub async fn run(&self) -> Result<()> {
        let chain_rid = self.chain.chain_rid();
        let from_height = self.cursors.get_cursor(chain_rid, CursorKind::Cross)?;
        let filter = LogFilter {
            contract: self.contract.clone(),
            topic: trigger_topic(),
            from_height,
        };
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Watcher,
            %chain_rid,
            contract = %self.contract,
            from_height,
            starting = true,
        );
        let (tx, mut rx) = mpsc::channel(self.channel_size.max(1));
        let producer = self.chain.subscribe_events(filter, tx);
        let consumer = async {
            while let Some(log) = rx.recv().await {
                self.handle_log(log).await?;
            }
            Ok::<_, Error>(())
        };
        let (produced, consumed) = tokio::join!(producer, consumer);
        consumed?;
        produced
    }

    /// Processes one log. Only a closed dispatch queue is reported as an
    /// error, every other failure drops the log.
    pub async fn handle_log(&self, log: ContractLog) -> Result<()> {
        let tx_id = log.tx_id.clone();
        let block_height = log.block_height;
        match self.process(log).await {
            Ok(job) => self.queue.submit(job).await,
            Err(e) => {
                self.metrics.events_dropped.inc();
                match e {
                    Error::NotCrossChainEvent(_) | Error::ForeignGateway { .. } => {
                        tracing::warn!(%tx_id, block_height, error = %e, "Ignoring log");
                    }
                    _ => {
                        tracing::error!(%tx_id, block_height, error = %e, "Dropping log");
                    }
                }
                Ok(())
            }
        }
    }

    async fn process(&self, log: ContractLog) -> Result<CrossChainJob> {
        let chain_rid = self.chain.chain_rid();
        let data = decode_trigger_payload(&log.data)?;
        let tx = self.fetch_tx(&log.tx_id).await?;
        let tx_prove = self.proofs.build_proof(chain_rid, &tx).await;
        let event = Event {
            topic: CROSS_CHAIN_TRIGGER_EVENT.to_owned(),
            chain_rid: chain_rid.to_owned(),
            contract_name: log.contract,
            tx_prove,
            data,
            tx_bytes: tx.tx_bytes,
            tx_id: log.tx_id,
            block_height: log.block_height,
        };
        tracing::info!(
            %chain_rid,
            tx_id = %event.tx_id,
            block_height = event.block_height,
            "Received cross-chain trigger",
        );
        let request = self.requests.build(&event)?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Watcher,
            %chain_rid,
            tx_id = %event.tx_id,
            block_height = event.block_height,
            accepted = true,
        );
        Ok(CrossChainJob {
            chain_rid: chain_rid.to_owned(),
            block_height: event.block_height,
            request,
        })
    }

    async fn fetch_tx(&self, tx_id: &str) -> Result<TransactionDetail> {
        let backoff = ConstantWithMaxRetryCount::new(
            self.tx_fetch_interval,
            TX_FETCH_MAX_RETRY_COUNT,
        );
        let task = || async {
            self.chain
                .get_tx_by_hash(tx_id)
                .await
                .map_err(backoff::Error::transient)
        };
        backoff::future::retry(backoff, task).await
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use ethers::abi::Token;
    use prost::Message;
    use tcc_gateway_chain::mocked::MockedChainAdapter;
    use tcc_gateway_chain::ChainRegistry;
    use tcc_gateway_relay::mocked::MockedRelayClient;
    use tcc_gateway_relay::{dispatch_queue, RelayDispatcher};
    use tcc_gateway_store::InMemoryStore;
    use tcc_gateway_types::{
        CancelInfo, ConfirmInfo, CrossChainMsg, CrossChainRequest, TriggerInfo,
        TxVerifyType, Version,
    };

    use super::*;

    const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";

    struct Harness {
        chain: Arc<MockedChainAdapter>,
        relay: Arc<MockedRelayClient>,
        store: InMemoryStore,
        metrics: Arc<Metrics>,
        watcher: Arc<ChainEventWatcher>,
    }

    fn harness() -> Harness {
        let chain = Arc::new(MockedChainAdapter::new("chain1"));
        let relay = Arc::new(MockedRelayClient::default());
        let store = InMemoryStore::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let dispatcher = RelayDispatcher::new(
            relay.clone(),
            Arc::new(store.clone()),
            metrics.clone(),
            Duration::from_millis(10),
        );
        let (queue, worker) = dispatch_queue(dispatcher, Default::default());
        tokio::spawn(worker.run());
        let chains = ChainRegistry::new([chain.clone() as Arc<dyn ChainAdapter>]);
        let proofs = TxProofEngine::new(
            TxVerifyType::None,
            chains,
            Arc::new(store.clone()),
        );
        let watcher = ChainEventWatcher::builder()
            .chain(chain.clone())
            .contract(CONTRACT)
            .cursors(Arc::new(store.clone()))
            .proofs(proofs)
            .requests(CrossChainRequestBuilder::new(
                "gw1",
                Duration::from_secs(10),
            ))
            .queue(queue)
            .metrics(metrics.clone())
            .tx_fetch_interval(Duration::from_millis(1))
            .build();
        Harness {
            chain,
            relay,
            store,
            metrics,
            watcher: Arc::new(watcher),
        }
    }

    fn payload(from: &str) -> Vec<u8> {
        let request = CrossChainRequest {
            version: Version::V100 as i32,
            from: from.into(),
            cross_chain_msg: vec![CrossChainMsg {
                confirm_info: Some(ConfirmInfo::default()),
                cancel_info: Some(CancelInfo::default()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let trigger = TriggerInfo {
            dest_try_param: "[1]".into(),
            ..Default::default()
        };
        ethers::abi::encode(&[
            Token::String(STANDARD.encode(request.encode_to_vec())),
            Token::String(STANDARD.encode(trigger.encode_to_vec())),
        ])
    }

    fn trigger_log(tx_id: &str, height: u64, from: &str) -> ContractLog {
        ContractLog {
            contract: CONTRACT.into(),
            topic: trigger_topic(),
            tx_id: tx_id.into(),
            block_height: height,
            data: payload(from),
        }
    }

    fn tx(tx_id: &str, height: u64) -> TransactionDetail {
        TransactionDetail {
            tx_id: tx_id.into(),
            tx_bytes: tx_id.as_bytes().to_vec(),
            block_height: height,
            block_hash: format!("0x{height:064x}"),
        }
    }

    async fn wait_for_requests(relay: &MockedRelayClient, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while relay.begin_cross_chain_calls() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn topic_is_a_keccak_hash() {
        let topic = trigger_topic();
        assert!(topic.starts_with("0x"));
        assert_eq!(topic.len(), 66);
    }

    #[test]
    fn payload_items_are_split_on_spaces() {
        let data = ethers::abi::encode(&[
            Token::String("a b".into()),
            Token::String("c".into()),
        ]);
        assert_eq!(decode_trigger_payload(&data).unwrap(), vec!["a", "b", "c"]);

        let empty = ethers::abi::encode(&[
            Token::String(String::new()),
            Token::String(String::new()),
        ]);
        assert!(matches!(
            decode_trigger_payload(&empty),
            Err(Error::NotCrossChainEvent(_))
        ));
        assert!(decode_trigger_payload(b"garbage").is_err());
    }

    #[tokio::test]
    async fn trigger_logs_reach_the_relay() {
        let h = harness();
        h.chain.insert_tx(tx("0x01", 5));
        h.chain.push_log(trigger_log("0x01", 5, "gw1"));

        let watcher = h.watcher.clone();
        let task = tokio::spawn(async move { watcher.run().await });
        wait_for_requests(&h.relay, 1).await;
        task.abort();

        let request = &h.relay.begin_cross_chain_requests()[0];
        let content = request.tx_content.as_ref().unwrap();
        assert_eq!(content.tx_id, "0x01");
        assert_eq!(content.chain_rid, "chain1");
        assert_eq!(content.tx_prove, "{}");
        assert_eq!(request.cross_chain_msg[0].parameter, "[1]");
        assert_eq!(request.timeout, 10);
    }

    #[tokio::test]
    async fn subscription_resumes_from_the_cross_cursor() {
        let h = harness();
        h.store.advance_cursor("chain1", CursorKind::Cross, 7).unwrap();
        for (id, height) in [("0x01", 5), ("0x02", 7), ("0x03", 9)] {
            h.chain.insert_tx(tx(id, height));
            h.chain.push_log(trigger_log(id, height, "gw1"));
        }

        let watcher = h.watcher.clone();
        let task = tokio::spawn(async move { watcher.run().await });
        wait_for_requests(&h.relay, 2).await;
        task.abort();

        let mut delivered: Vec<_> = h
            .relay
            .begin_cross_chain_requests()
            .into_iter()
            .filter_map(|r| r.tx_content.map(|c| c.tx_id))
            .collect();
        delivered.sort();
        assert_eq!(delivered, vec!["0x02", "0x03"]);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn foreign_and_unknown_logs_are_dropped() {
        let h = harness();
        h.chain.insert_tx(tx("0x01", 5));

        h.watcher
            .handle_log(trigger_log("0x01", 5, "gw9"))
            .await
            .unwrap();
        // the node never learns about this one.
        h.watcher
            .handle_log(trigger_log("0x02", 6, "gw1"))
            .await
            .unwrap();

        assert_eq!(h.metrics.events_dropped.get() as u64, 2);
        assert_eq!(h.relay.begin_cross_chain_calls(), 0);
        assert!(logs_contain("Ignoring log"));
        assert!(logs_contain("Dropping log"));
    }
}
