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

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tcc_gateway_store::{CursorKind, CursorStore};
use tcc_gateway_types::{
    BeginCrossChainResponse, Code, CrossChainRequest, SyncBlockHeaderRequest,
    SyncBlockHeaderResponse,
};
use tcc_gateway_utils::metric::Metrics;
use tcc_gateway_utils::retry::FixedInterval;
use tcc_gateway_utils::{probe, Error, Result};

use crate::RelayClient;

/// The `{code, message}` pair every relay answer carries.
trait RelayResponse {
    fn code(&self) -> i32;
    fn message(&self) -> &str;
}

impl RelayResponse for BeginCrossChainResponse {
    fn code(&self) -> i32 {
        self.code
    }

    fn message(&self) -> &str {
        &self.message
    }
}

impl RelayResponse for SyncBlockHeaderResponse {
    fn code(&self) -> i32 {
        self.code
    }

    fn message(&self) -> &str {
        &self.message
    }
}

/// Delivers requests to the relay until they are acknowledged.
///
/// Transport errors and non-success codes are retried forever, waiting
/// `retry_interval` between attempts. The only way out besides success is
/// `GATEWAY_DISABLED`, returned as [`Error::GatewayDisabled`]: retrying a
/// disabled gateway can never succeed.
///
/// On success the progress cursor matching the request is advanced and
/// flushed before returning.
#[derive(Clone)]
pub struct RelayDispatcher {
    client: Arc<dyn RelayClient>,
    cursors: Arc<dyn CursorStore>,
    metrics: Arc<Metrics>,
    retry_interval: Duration,
}

impl std::fmt::Debug for RelayDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayDispatcher")
            .field("retry_interval", &self.retry_interval)
            .finish()
    }
}

impl RelayDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        client: Arc<dyn RelayClient>,
        cursors: Arc<dyn CursorStore>,
        metrics: Arc<Metrics>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            client,
            cursors,
            metrics,
            retry_interval,
        }
    }

    /// Submits `request`, triggered at `block_height` of `chain_rid`, and
    /// moves that chain's cross cursor to `block_height`.
    #[tracing::instrument(
        skip(self, request),
        fields(from = %request.from, name = %request.cross_chain_name),
    )]
    pub async fn begin_cross_chain(
        &self,
        chain_rid: &str,
        block_height: u64,
        request: &CrossChainRequest,
    ) -> Result<BeginCrossChainResponse> {
        let response = self
            .deliver("BeginCrossChain", || {
                self.client.begin_cross_chain(request)
            })
            .await?;
        self.cursors
            .advance_cursor(chain_rid, CursorKind::Cross, block_height)?;
        self.metrics.cross_chain_dispatched.inc();
        tracing::info!(
            %chain_rid,
            block_height,
            cross_chain_id = %response.cross_chain_id,
            "Cross-chain request accepted by the relay",
        );
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Dispatch,
            call = "BeginCrossChain",
            %chain_rid,
            block_height,
            cross_chain_id = %response.cross_chain_id,
        );
        Ok(response)
    }

    /// Ships a header batch and moves the header cursor of its chain to the
    /// trailing height of the batch.
    #[tracing::instrument(
        skip_all,
        fields(chain_rid = %request.chain_rid, height = request.block_height),
    )]
    pub async fn sync_block_header(
        &self,
        request: &SyncBlockHeaderRequest,
    ) -> Result<SyncBlockHeaderResponse> {
        let response = self
            .deliver("SyncBlockHeader", || {
                self.client.sync_block_header(request)
            })
            .await?;
        self.cursors.advance_cursor(
            &request.chain_rid,
            CursorKind::BlockHeader,
            request.block_height,
        )?;
        self.metrics.header_batches_synced.inc();
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Dispatch,
            call = "SyncBlockHeader",
            chain_rid = %request.chain_rid,
            block_height = request.block_height,
        );
        Ok(response)
    }

    async fn deliver<F, Fut, R>(&self, call: &'static str, send: F) -> Result<R>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R>>,
        R: RelayResponse,
    {
        let backoff = FixedInterval::new(self.retry_interval);
        let task = || {
            let attempt = send();
            async move {
                let response = match attempt.await {
                    Ok(response) => response,
                    Err(e) => return Err(backoff::Error::transient(e)),
                };
                match Code::try_from(response.code()) {
                    Ok(Code::GatewaySuccess) => Ok(response),
                    Ok(Code::GatewayDisabled) => {
                        Err(backoff::Error::permanent(Error::GatewayDisabled))
                    }
                    _ => Err(backoff::Error::transient(Error::RelayRejected {
                        code: response.code(),
                        message: response.message().to_owned(),
                    })),
                }
            }
        };
        let notify = |e: Error, after: Duration| {
            self.metrics.relay_retries.inc();
            tracing::error!(
                %call,
                error = %e,
                "Relay call failed, retrying in {}ms",
                after.as_millis(),
            );
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Retry,
                %call,
                after_ms = after.as_millis() as u64,
            );
        };
        let result = backoff::future::retry_notify(backoff, task, notify).await;
        if let Err(Error::GatewayDisabled) = &result {
            tracing::error!(%call, "The relay network disabled this gateway");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use tcc_gateway_store::InMemoryStore;
    use tcc_gateway_types::Version;

    use super::*;
    use crate::mocked::MockedRelayClient;

    fn dispatcher(
        relay: Arc<MockedRelayClient>,
    ) -> (RelayDispatcher, InMemoryStore, Arc<Metrics>) {
        let store = InMemoryStore::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let dispatcher = RelayDispatcher::new(
            relay,
            Arc::new(store.clone()),
            metrics.clone(),
            Duration::from_secs(5),
        );
        (dispatcher, store, metrics)
    }

    fn request() -> CrossChainRequest {
        CrossChainRequest {
            version: Version::V100 as i32,
            from: "gw1".into(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn retries_until_the_relay_accepts() {
        let relay = Arc::new(MockedRelayClient::default());
        relay.push_begin_cross_chain(Err("connection refused".into()));
        relay.push_begin_cross_chain(Ok(Code::InternalError));
        relay.push_begin_cross_chain(Ok(Code::RelayChainError));
        relay.push_begin_cross_chain(Ok(Code::GatewaySuccess));
        let (dispatcher, store, metrics) = dispatcher(relay.clone());

        let started = tokio::time::Instant::now();
        dispatcher
            .begin_cross_chain("chain1", 42, &request())
            .await
            .unwrap();

        assert_eq!(relay.begin_cross_chain_calls(), 4);
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert!(started.elapsed() < Duration::from_secs(16));
        assert_eq!(store.get_cursor("chain1", CursorKind::Cross).unwrap(), 42);
        assert_eq!(metrics.relay_retries.get() as u64, 3);
        assert_eq!(metrics.cross_chain_dispatched.get() as u64, 1);
        assert!(logs_contain("Relay call failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_gateway_aborts_without_moving_the_cursor() {
        let relay = Arc::new(MockedRelayClient::default());
        relay.push_begin_cross_chain(Ok(Code::InternalError));
        relay.push_begin_cross_chain(Ok(Code::GatewayDisabled));
        let (dispatcher, store, _) = dispatcher(relay.clone());
        store.advance_cursor("chain1", CursorKind::Cross, 10).unwrap();

        let result = dispatcher.begin_cross_chain("chain1", 42, &request()).await;

        assert!(matches!(result, Err(Error::GatewayDisabled)));
        assert_eq!(relay.begin_cross_chain_calls(), 2);
        assert_eq!(store.get_cursor("chain1", CursorKind::Cross).unwrap(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn header_sync_advances_the_header_cursor() {
        let relay = Arc::new(MockedRelayClient::default());
        relay.push_sync_block_header(Err("timeout".into()));
        let (dispatcher, store, metrics) = dispatcher(relay.clone());
        let request = SyncBlockHeaderRequest {
            version: Version::V100 as i32,
            gateway_id: "gw1".into(),
            chain_rid: "chain1".into(),
            block_height: 30,
            ..Default::default()
        };

        dispatcher.sync_block_header(&request).await.unwrap();

        assert_eq!(
            store.get_cursor("chain1", CursorKind::BlockHeader).unwrap(),
            30
        );
        assert_eq!(store.get_cursor("chain1", CursorKind::Cross).unwrap(), 0);
        assert_eq!(relay.sync_block_header_requests().len(), 2);
        assert_eq!(metrics.header_batches_synced.get() as u64, 1);
    }
}
