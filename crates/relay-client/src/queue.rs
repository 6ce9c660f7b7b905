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

use tcc_gateway_config::DispatchConfig;
use tcc_gateway_types::CrossChainRequest;
use tcc_gateway_utils::{probe, Error, Result};
use tokio::sync::{mpsc, Semaphore};

use crate::RelayDispatcher;

/// A cross-chain request waiting to be delivered.
#[derive(Debug, Clone)]
pub struct CrossChainJob {
    /// Chain whose log triggered the request.
    pub chain_rid: String,
    /// Height of the triggering log.
    pub block_height: u64,
    /// The request, ready for the relay.
    pub request: CrossChainRequest,
}

type FatalHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Producer side of the dispatch queue, cheap to clone.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<CrossChainJob>,
}

impl DispatchQueue {
    /// Enqueues a job, waiting while the queue is full.
    pub async fn submit(&self, job: CrossChainJob) -> Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|_| Error::DispatchQueueClosed)
    }
}

/// Consumer side of the dispatch queue.
///
/// Every job is delivered on its own task, at most `max-in-flight` at once.
/// A job that fails with [`Error::GatewayDisabled`] is handed to the fatal
/// handler; any other failure is logged and the job dropped.
pub struct DispatchWorker {
    rx: mpsc::Receiver<CrossChainJob>,
    dispatcher: RelayDispatcher,
    permits: Arc<Semaphore>,
    on_fatal: FatalHandler,
}

impl std::fmt::Debug for DispatchWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchWorker")
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

/// Creates a bounded dispatch queue feeding `dispatcher`.
pub fn dispatch_queue(
    dispatcher: RelayDispatcher,
    config: DispatchConfig,
) -> (DispatchQueue, DispatchWorker) {
    let (tx, rx) = mpsc::channel(config.queue_size.max(1));
    let worker = DispatchWorker {
        rx,
        dispatcher,
        permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
        on_fatal: Arc::new(|e| {
            tracing::error!(error = %e, "Fatal dispatch error");
        }),
    };
    (DispatchQueue { tx }, worker)
}

impl DispatchWorker {
    /// Replaces the handler called when the relay disables this gateway.
    pub fn on_fatal<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_fatal = Arc::new(handler);
        self
    }

    /// Drains the queue until every [`DispatchQueue`] handle is dropped.
    ///
    /// Jobs already handed to a task keep running after this returns.
    #[tracing::instrument(skip_all)]
    pub async fn run(mut self) -> Result<()> {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Lifecycle,
            dispatch_worker = "started",
        );
        while let Some(job) = self.rx.recv().await {
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::DispatchQueueClosed)?;
            let dispatcher = self.dispatcher.clone();
            let on_fatal = self.on_fatal.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let result = dispatcher
                    .begin_cross_chain(
                        &job.chain_rid,
                        job.block_height,
                        &job.request,
                    )
                    .await;
                match result {
                    Ok(_) => {}
                    Err(e @ Error::GatewayDisabled) => on_fatal(&e),
                    Err(e) => tracing::error!(
                        chain_rid = %job.chain_rid,
                        block_height = job.block_height,
                        error = %e,
                        "Dropping cross-chain request",
                    ),
                }
            });
        }
        tracing::debug!("Dispatch queue closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tcc_gateway_store::{CursorKind, CursorStore, InMemoryStore};
    use tcc_gateway_types::Code;
    use tcc_gateway_utils::metric::Metrics;

    use super::*;
    use crate::mocked::MockedRelayClient;

    fn setup() -> (Arc<MockedRelayClient>, InMemoryStore, RelayDispatcher) {
        let relay = Arc::new(MockedRelayClient::default());
        let store = InMemoryStore::default();
        let dispatcher = RelayDispatcher::new(
            relay.clone(),
            Arc::new(store.clone()),
            Arc::new(Metrics::new().unwrap()),
            Duration::from_secs(5),
        );
        (relay, store, dispatcher)
    }

    fn job(height: u64) -> CrossChainJob {
        CrossChainJob {
            chain_rid: "chain1".into(),
            block_height: height,
            request: CrossChainRequest::default(),
        }
    }

    #[tokio::test]
    async fn every_job_is_delivered() {
        let (relay, store, dispatcher) = setup();
        let (queue, worker) = dispatch_queue(
            dispatcher,
            DispatchConfig {
                queue_size: 2,
                max_in_flight: 1,
            },
        );
        let handle = tokio::spawn(worker.run());
        for height in [3, 9, 5] {
            queue.submit(job(height)).await.unwrap();
        }
        drop(queue);
        handle.await.unwrap().unwrap();

        // the last task may still be running once the worker returns.
        while relay.begin_cross_chain_calls() < 3 {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        assert_eq!(store.get_cursor("chain1", CursorKind::Cross).unwrap(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_gateway_reaches_the_fatal_handler() {
        let (relay, store, dispatcher) = setup();
        relay.push_begin_cross_chain(Ok(Code::InternalError));
        relay.push_begin_cross_chain(Ok(Code::GatewayDisabled));
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
        let (queue, worker) = dispatch_queue(dispatcher, Default::default());
        let worker = worker.on_fatal(move |e| {
            let _ = fatal_tx.send(e.to_string());
        });
        tokio::spawn(worker.run());

        queue.submit(job(7)).await.unwrap();

        let reason = fatal_rx.recv().await.unwrap();
        assert!(reason.contains("disabled"));
        assert_eq!(relay.begin_cross_chain_calls(), 2);
        assert_eq!(store.get_cursor("chain1", CursorKind::Cross).unwrap(), 0);
    }

    #[tokio::test]
    async fn submitting_to_a_closed_queue_fails() {
        let (_, _, dispatcher) = setup();
        let (queue, worker) = dispatch_queue(dispatcher, Default::default());
        drop(worker);
        assert!(matches!(
            queue.submit(job(1)).await,
            Err(Error::DispatchQueueClosed)
        ));
    }
}
