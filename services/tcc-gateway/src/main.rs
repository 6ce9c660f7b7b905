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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The TCC gateway binary.

use std::sync::Arc;

use tcc_gateway_config::cli::{create_store, load_config, setup_logger, Opts};
use tcc_gateway_context::GatewayContext;
use tcc_gateway_utils::probe;
use tokio::signal::unix;

#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    setup_logger(args.verbose, "tcc_gateway")?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // The configuration is validated and configured from the given directory
    let config = load_config(args.config_dir.clone())?;
    // persistent storage for the cursors and headers
    let store = create_store(&args, &config)?;
    let ctx = GatewayContext::new(config, store.clone())?;

    // check the chains, run the first header sync, then fire the
    // background services.
    let handler =
        tcc_gateway::service::ignite(&ctx, Arc::new(store.clone())).await?;
    let rpc = ctx.config.rpc.clone();
    let mut server_shutdown = ctx.shutdown_signal();
    let server_handle = tokio::spawn(async move {
        let shutdown = async move { server_shutdown.recv().await };
        if let Err(e) =
            tcc_gateway_handlers::routes::serve(handler, &rpc, shutdown).await
        {
            tracing::error!(error = %e, "Inbound server failed");
        }
    });
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true
    );
    // watch for signals
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    let shutdown = || {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Lifecycle,
            shutdown = true
        );
        tracing::warn!("Shutting down...");
        // send shutdown signal to all of the application.
        ctx.shutdown();
    };
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
            shutdown();
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
            shutdown();
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
            shutdown();
        },
    }
    // the server answers the requests in flight before it stops.
    if let Err(e) = server_handle.await {
        tracing::error!(error = %e, "Inbound server task failed");
    }
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush the store");
    }
    tracing::info!("Clean Exit ..");
    Ok(())
}
