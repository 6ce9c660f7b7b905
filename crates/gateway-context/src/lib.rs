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
//! Runtime context of the gateway: configuration, store, metrics and the
//! shutdown broadcast, constructed once at startup and handed to every
//! service that needs it.

use std::sync::Arc;
use std::time::Duration;

use tcc_gateway_chain::{ChainAdapter, ChainRegistry, EvmChainAdapter};
use tcc_gateway_config::GatewayConfig;
use tcc_gateway_relay::HttpRelayClient;
use tcc_gateway_store::SledStore;
use tcc_gateway_utils::metric::Metrics;
use tokio::sync::broadcast;

/// GatewayContext contains the gateway's configuration and shutdown signal.
#[derive(Clone)]
pub struct GatewayContext {
    /// The configuration of the gateway.
    pub config: GatewayConfig,
    /// Broadcasts a shutdown signal to the server and the background loops.
    ///
    /// Each long-running task holds a [`Shutdown`] subscribed to this
    /// sender; a single `()` ends them all.
    notify_shutdown: broadcast::Sender<()>,
    /// Represents the metrics for the gateway
    pub metrics: Arc<Metrics>,
    store: SledStore,
}

impl GatewayContext {
    /// Creates a new GatewayContext.
    pub fn new(
        config: GatewayConfig,
        store: SledStore,
    ) -> tcc_gateway_utils::Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let metrics = Arc::new(Metrics::new()?);
        Ok(Self {
            config,
            notify_shutdown,
            metrics,
            store,
        })
    }

    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends a shutdown signal to all subscribed tasks/connections.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }

    /// Returns [Sled](https://sled.rs)-based database store
    pub fn store(&self) -> &SledStore {
        &self.store
    }

    /// The timeout applied to relay calls and written into outbound requests.
    pub fn default_timeout(&self) -> Duration {
        self.config.base.default_timeout()
    }

    /// Builds one EVM adapter per configured chain.
    ///
    /// The registry is read-only afterwards; a chain that cannot be set up
    /// fails the whole call.
    pub fn chain_registry(&self) -> tcc_gateway_utils::Result<ChainRegistry> {
        let mut adapters: Vec<Arc<dyn ChainAdapter>> =
            Vec::with_capacity(self.config.chains.len());
        for chain in self.config.chains.values() {
            tracing::debug!(
                chain_rid = %chain.chain_rid,
                chain_id = chain.chain_id,
                "Setting up chain adapter",
            );
            adapters.push(Arc::new(EvmChainAdapter::new(chain)?));
        }
        Ok(ChainRegistry::new(adapters))
    }

    /// Returns the HTTP client of the relay network.
    pub fn relay_client(&self) -> tcc_gateway_utils::Result<HttpRelayClient> {
        HttpRelayClient::new(&self.config.relay, self.default_timeout())
    }
}

/// Listens for the gateway shutdown signal.
///
/// Only a single value is ever sent on the channel. `Shutdown` remembers
/// that it was received, so `recv` can be awaited again after it fired.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Returns `true` if the shutdown signal has been received.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        if self.shutdown {
            return;
        }
        // only one value is ever sent, lagging is impossible.
        let _ = self.notify.recv().await;
        self.shutdown = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chains: serde_json::Value) -> GatewayConfig {
        serde_json::from_value(serde_json::json!({
            "base": { "gateway-id": "gw1" },
            "relay": { "address": "http://127.0.0.1:8080/api" },
            "chains": chains,
        }))
        .unwrap()
    }

    fn context(chains: serde_json::Value) -> GatewayContext {
        let store = SledStore::temporary().unwrap();
        GatewayContext::new(config(chains), store).unwrap()
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_shutdown() {
        let ctx = context(serde_json::json!({}));
        let mut first = ctx.shutdown_signal();
        let mut second = ctx.shutdown_signal();
        assert!(!first.is_shutdown());

        ctx.shutdown();
        first.recv().await;
        second.recv().await;
        assert!(first.is_shutdown());
        // a second wait returns immediately.
        first.recv().await;
    }

    #[test]
    fn registry_holds_one_adapter_per_chain() {
        let ctx = context(serde_json::json!({
            "chain1": {
                "chain-rid": "chain1",
                "enabled": true,
                "chain-id": 5,
                "http-endpoint": "http://127.0.0.1:8545",
                "cross-contract-name": "0x00000000000000000000000000000000000000aa",
                "private-key": "0x000000000000000000000000000000000000000000000000000000000000000a",
            }
        }));
        let registry = ctx.chain_registry().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("chain1").unwrap().chain_rid(), "chain1");
        assert!(registry.get("chain2").is_err());
    }

    #[test]
    fn relay_client_is_built_from_config() {
        let ctx = context(serde_json::json!({}));
        assert!(ctx.relay_client().is_ok());
        assert_eq!(ctx.default_timeout(), Duration::from_secs(
            tcc_gateway_config::defaults::default_timeout()
        ));
    }
}
