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

use prometheus::core::{AtomicF64, GenericCounter, GenericCounterVec};
use prometheus::{opts, Encoder, Registry, TextEncoder};

/// A struct definition for collecting metrics in the gateway.
///
/// Every instance owns its registry, so several gateways (or tests) can live
/// in one process without colliding on metric names.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    /// Cross-chain requests acknowledged by the relay.
    pub cross_chain_dispatched: GenericCounter<AtomicF64>,
    /// Block header batches acknowledged by the relay.
    pub header_batches_synced: GenericCounter<AtomicF64>,
    /// How many times a relay call was retried.
    pub relay_retries: GenericCounter<AtomicF64>,
    /// Contract logs that were dropped before reaching the relay.
    pub events_dropped: GenericCounter<AtomicF64>,
    /// Inbound calls served, labeled by method.
    pub inbound_calls: GenericCounterVec<AtomicF64>,
}

impl Metrics {
    /// Instantiates the counters and registers them in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tcc_gateway".into()), None)?;

        let cross_chain_dispatched = GenericCounter::with_opts(opts!(
            "cross_chain_dispatched",
            "The total number of cross-chain requests acknowledged by the relay"
        ))?;
        registry.register(Box::new(cross_chain_dispatched.clone()))?;

        let header_batches_synced = GenericCounter::with_opts(opts!(
            "header_batches_synced",
            "The total number of block header batches acknowledged by the relay"
        ))?;
        registry.register(Box::new(header_batches_synced.clone()))?;

        let relay_retries = GenericCounter::with_opts(opts!(
            "relay_retries",
            "How many times a call to the relay network was retried"
        ))?;
        registry.register(Box::new(relay_retries.clone()))?;

        let events_dropped = GenericCounter::with_opts(opts!(
            "events_dropped",
            "Contract logs dropped while being converted to cross-chain requests"
        ))?;
        registry.register(Box::new(events_dropped.clone()))?;

        let inbound_calls = GenericCounterVec::new(
            opts!("inbound_calls", "Inbound calls served for the relay"),
            &["method"],
        )?;
        registry.register(Box::new(inbound_calls.clone()))?;

        Ok(Self {
            registry,
            cross_chain_dispatched,
            header_batches_synced,
            relay_retries,
            events_dropped,
            inbound_calls,
        })
    }

    /// Gathers the whole gateway metrics in the prometheus text format.
    pub fn gather_metrics(&self) -> Result<String, GatherMetricsError> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Error while gathering the metrics.
#[derive(Debug, thiserror::Error)]
pub enum GatherMetricsError {
    /// Prometheus failed to encode the metric families.
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// The encoded metrics are not valid UTF-8.
    #[error(transparent)]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_instances_do_not_collide() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.cross_chain_dispatched.inc();
        assert_eq!(a.cross_chain_dispatched.get() as u64, 1);
        assert_eq!(b.cross_chain_dispatched.get() as u64, 0);
    }

    #[test]
    fn gathered_text_contains_prefixed_names() {
        let metrics = Metrics::new().unwrap();
        metrics.inbound_calls.with_label_values(&["try"]).inc();
        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("tcc_gateway_inbound_calls"));
        assert!(text.contains("method=\"try\""));
    }
}
