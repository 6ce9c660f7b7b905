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

//! # Gateway Service Module
//!
//! Services are tasks which the gateway constantly runs throughout its
//! lifetime: one header synchronizer and one event watcher per chain, and the
//! dispatch worker feeding the relay network. Each of them stops on the
//! context's shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tcc_gateway_chain::ChainAdapter;
use tcc_gateway_context::GatewayContext;
use tcc_gateway_handlers::TccHandler;
use tcc_gateway_proof::TxProofEngine;
use tcc_gateway_relay::{
    dispatch_queue, DispatchQueue, DispatchWorker, RelayDispatcher,
};
use tcc_gateway_store::SledStore;
use tcc_gateway_utils::Error;
use tcc_gateway_watcher::{
    BlockHeaderSynchronizer, ChainEventWatcher, CrossChainRequestBuilder,
};

/// Type alias for [Sled](https://sled.rs)-based database store
pub type Store = SledStore;

/// Ends the process; retrying can never succeed once the relay network
/// disabled this gateway.
fn abort(e: &Error) -> ! {
    tracing::error!(error = %e, "Fatal error, the gateway needs an administrator");
    tracing::event!(
        target: tcc_gateway_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %tcc_gateway_utils::probe::Kind::Lifecycle,
        aborted = true,
    );
    std::process::exit(1)
}

/// Starts every background service and returns the handler the inbound
/// server should use.
///
/// Every chain must answer, and in `direct`/`spv` mode the headers are
/// synchronized once up to the current heights, before anything is spawned.
/// Either failure keeps the gateway from starting. After that this does not
/// block, the services run on background tasks.
pub async fn ignite(
    ctx: &GatewayContext,
    store: Arc<Store>,
) -> crate::Result<TccHandler> {
    tracing::trace!(
        "Gateway configuration: {}",
        serde_json::to_string_pretty(&ctx.config)?
    );
    let config = &ctx.config;
    let mode = config.base.tx_verify_type;
    let chains = ctx.chain_registry()?;
    chains.ensure_reachable().await?;
    let relay = Arc::new(ctx.relay_client()?);
    let dispatcher = RelayDispatcher::new(
        relay,
        store.clone(),
        ctx.metrics.clone(),
        config.relay.retry_interval(),
    );

    let synchronizer = Arc::new(BlockHeaderSynchronizer::new(
        config.base.gateway_id.clone(),
        mode,
        config.block_header_sync.batch_count,
        Duration::from_secs(config.block_header_sync.interval),
        chains.clone(),
        store.clone(),
        store.clone(),
        dispatcher.clone(),
    ));
    let mut proofs = TxProofEngine::new(mode, chains.clone(), store.clone());
    if mode.needs_header_sync() {
        // the relay must know our headers before any proof is sent.
        synchronizer.sync_all().await?;
        proofs = proofs.with_catch_up(synchronizer.clone());
    }

    let (queue, worker) = dispatch_queue(dispatcher, config.dispatch);
    start_dispatch_worker(ctx, worker);

    for chain in chains.iter() {
        if mode.needs_header_sync() {
            start_header_sync(ctx, synchronizer.clone(), chain.chain_rid());
        } else {
            tracing::debug!(
                chain_rid = %chain.chain_rid(),
                %mode,
                "Header sync is not needed",
            );
        }
        start_event_watcher(
            ctx,
            chain.clone(),
            store.clone(),
            proofs.clone(),
            queue.clone(),
        )?;
    }

    Ok(TccHandler::new(
        config.base.gateway_id.clone(),
        chains,
        proofs,
        ctx.metrics.clone(),
    ))
}

fn start_dispatch_worker(ctx: &GatewayContext, worker: DispatchWorker) {
    let mut shutdown_signal = ctx.shutdown_signal();
    let task = async move {
        tokio::select! {
            _ = worker.on_fatal(|e| { abort(e); }).run() => {
                tracing::warn!("Dispatch worker stopped");
            },
            _ = shutdown_signal.recv() => {
                tracing::trace!("Stopping dispatch worker");
            },
        }
    };
    // kick off the worker.
    tokio::task::spawn(task);
}

fn start_header_sync(
    ctx: &GatewayContext,
    synchronizer: Arc<BlockHeaderSynchronizer>,
    chain_rid: &str,
) {
    let mut shutdown_signal = ctx.shutdown_signal();
    let chain_rid = chain_rid.to_owned();
    let task = async move {
        tracing::debug!("Header sync for ({}) Started.", chain_rid);
        tokio::select! {
            result = synchronizer.run(&chain_rid) => {
                if let Err(e @ Error::GatewayDisabled) = result {
                    abort(&e);
                }
                tracing::warn!("Header sync task stopped for ({})", chain_rid);
            },
            _ = shutdown_signal.recv() => {
                tracing::trace!("Stopping header sync for ({})", chain_rid);
            },
        }
    };
    tokio::task::spawn(task);
}

fn start_event_watcher(
    ctx: &GatewayContext,
    chain: Arc<dyn ChainAdapter>,
    store: Arc<Store>,
    proofs: TxProofEngine,
    queue: DispatchQueue,
) -> crate::Result<()> {
    let chain_rid = chain.chain_rid().to_owned();
    let chain_config = ctx.config.chains.get(&chain_rid).ok_or_else(|| {
        Error::ChainNotFound {
            chain_rid: chain_rid.clone(),
        }
    })?;
    let contract = format!("{:?}", chain_config.cross_contract_name);
    let watcher = ChainEventWatcher::builder()
        .chain(chain)
        .contract(contract.clone())
        .cursors(store)
        .proofs(proofs)
        .requests(CrossChainRequestBuilder::new(
            ctx.config.base.gateway_id.clone(),
            ctx.default_timeout(),
        ))
        .queue(queue)
        .metrics(ctx.metrics.clone())
        .build();
    let mut shutdown_signal = ctx.shutdown_signal();
    let task = async move {
        tracing::debug!(
            "Events watcher for ({}) on ({}) Started.",
            contract,
            chain_rid,
        );
        tokio::select! {
            result = watcher.run() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Events watcher failed");
                }
                tracing::warn!(
                    "Events watcher task stopped for ({}) on ({})",
                    contract,
                    chain_rid,
                );
            },
            _ = shutdown_signal.recv() => {
                tracing::trace!(
                    "Stopping events watcher for ({}) on ({})",
                    contract,
                    chain_rid,
                );
            },
        }
    };
    tokio::task::spawn(task);
    Ok(())
}
