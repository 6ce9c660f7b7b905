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

//! A trigger log travels from the chain to the relay with an SPV proof that
//! the relay side can check against the synchronized headers.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ethers::abi::Token;
use prost::Message;
use tcc_gateway_chain::mocked::MockedChainAdapter;
use tcc_gateway_chain::{ChainAdapter, ChainRegistry, ContractLog, TransactionDetail};
use tcc_gateway_proof::TxProofEngine;
use tcc_gateway_relay::mocked::MockedRelayClient;
use tcc_gateway_relay::{dispatch_queue, RelayDispatcher};
use tcc_gateway_store::{CursorKind, CursorStore, InMemoryStore};
use tcc_gateway_types::{
    CancelInfo, ConfirmInfo, CrossChainMsg, CrossChainRequest, TriggerInfo,
    TxVerifyType, Version,
};
use tcc_gateway_utils::metric::Metrics;
use tcc_gateway_watcher::{
    trigger_topic, BlockHeaderSynchronizer, ChainEventWatcher,
    CrossChainRequestBuilder,
};

const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";
const TX_ID: &str = "0x0000000000000000000000000000000000000000000000000000000000000abc";

fn trigger_payload() -> Vec<u8> {
    let request = CrossChainRequest {
        version: Version::V100 as i32,
        from: "gw1".into(),
        cross_chain_msg: vec![CrossChainMsg {
            gateway_id: "gw2".into(),
            chain_rid: "chain2".into(),
            method: "lock".into(),
            confirm_info: Some(ConfirmInfo::default()),
            cancel_info: Some(CancelInfo::default()),
            ..Default::default()
        }],
        ..Default::default()
    };
    let trigger = TriggerInfo {
        dest_try_param: r#"["alice", 10]"#.into(),
        ..Default::default()
    };
    ethers::abi::encode(&[
        Token::String(STANDARD.encode(request.encode_to_vec())),
        Token::String(STANDARD.encode(trigger.encode_to_vec())),
    ])
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn trigger_reaches_the_relay_with_a_verifiable_proof() {
    let store = InMemoryStore::default();
    let metrics = Arc::new(Metrics::new().unwrap());

    let chain = Arc::new(MockedChainAdapter::new("chain1"));
    chain.set_height(20);
    let mut block = MockedChainAdapter::synthetic_block(15);
    block.transactions = vec![TX_ID.into()];
    let block_hash = block.hash.clone();
    chain.insert_block(block);
    chain.insert_tx(TransactionDetail {
        tx_id: TX_ID.into(),
        tx_bytes: b"signed transaction".to_vec(),
        block_height: 15,
        block_hash,
    });
    chain.push_log(ContractLog {
        contract: CONTRACT.into(),
        topic: trigger_topic(),
        tx_id: TX_ID.into(),
        block_height: 15,
        data: trigger_payload(),
    });
    let chains = ChainRegistry::new([chain.clone() as Arc<dyn ChainAdapter>]);

    let relay = Arc::new(MockedRelayClient::default());
    let dispatcher = RelayDispatcher::new(
        relay.clone(),
        Arc::new(store.clone()),
        metrics.clone(),
        Duration::from_millis(10),
    );
    let synchronizer = Arc::new(BlockHeaderSynchronizer::new(
        "gw1",
        TxVerifyType::Spv,
        8,
        Duration::from_secs(3600),
        chains.clone(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        dispatcher.clone(),
    ));
    let proofs =
        TxProofEngine::new(TxVerifyType::Spv, chains, Arc::new(store.clone()))
            .with_catch_up(synchronizer);

    let (queue, worker) = dispatch_queue(dispatcher, Default::default());
    tokio::spawn(worker.run());
    let watcher = ChainEventWatcher::builder()
        .chain(chain.clone())
        .contract(CONTRACT)
        .cursors(Arc::new(store.clone()))
        .proofs(proofs.clone())
        .requests(CrossChainRequestBuilder::new("gw1", Duration::from_secs(30)))
        .queue(queue)
        .metrics(metrics.clone())
        .build();
    let task = tokio::spawn(async move { watcher.run().await });

    wait_until(|| {
        store.get_cursor("chain1", CursorKind::Cross).unwrap() == 15
    })
    .await;
    task.abort();

    // headers 0..=20 were shipped in three batches before the proof was built.
    let batches = relay.sync_block_header_requests();
    let heights: Vec<u64> = batches.iter().map(|r| r.block_height).collect();
    assert_eq!(heights, vec![7, 15, 20]);
    assert_eq!(
        store.get_cursor("chain1", CursorKind::BlockHeader).unwrap(),
        20
    );

    let requests = relay.begin_cross_chain_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.timeout, 30);
    assert_eq!(request.cross_chain_msg[0].parameter, r#"["alice", 10]"#);
    let content = request.tx_content.as_ref().unwrap();
    assert_eq!(content.tx, b"signed transaction".to_vec());
    assert_eq!(content.block_height, 15);
    assert!(proofs.verify(&content.tx_prove).await.unwrap());

    assert_eq!(metrics.cross_chain_dispatched.get() as u64, 1);
    assert_eq!(metrics.header_batches_synced.get() as u64, 3);
    assert_eq!(metrics.events_dropped.get() as u64, 0);
}
