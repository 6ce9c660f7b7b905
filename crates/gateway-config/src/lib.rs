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

//! # Gateway Configuration Module 🕸️
//!
//! A module for configuring the gateway.
//!
//! ## Overview
//!
//! The configuration is read from every `toml` / `json` file of a directory,
//! merged with `TCC_GATEWAY_*` environment variables. Possible sections:
//! * `base`: identity of this gateway and the proof mode.
//! * `rpc`: the inbound server the relay calls into.
//! * `relay`: where and how to reach the relay network.
//! * `block-header-sync`: cadence and batch size of header synchronization.
//! * `dispatch`: bounds of the outbound dispatch queue.
//! * `chains`: the chains this gateway is attached to, by name.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Default values of optional settings.
pub mod defaults;
/// Utils for processing configuration
pub mod utils;

mod private_key;
mod rpc_url;

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use tcc_gateway_types::TxVerifyType;

pub use private_key::PrivateKey;
pub use rpc_url::RpcUrl;

/// GatewayConfig is the configuration for the TCC gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GatewayConfig {
    /// Where the store lives. Defaults next to the config directory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Identity of this gateway.
    pub base: BaseConfig,
    /// Inbound server configuration.
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Relay network endpoint configuration.
    pub relay: RelayConfig,
    /// Block header synchronization.
    #[serde(default)]
    pub block_header_sync: BlockHeaderSyncConfig,
    /// Outbound dispatch queue bounds.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Chains this gateway watches and drives.
    ///
    /// After loading, the map is keyed by `chain-rid` and only holds enabled chains.
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,
}

/// Identity of this gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BaseConfig {
    /// The id the relay network knows this gateway by.
    pub gateway_id: String,
    /// A human readable name, only used in logs.
    #[serde(default)]
    pub gateway_name: String,
    /// How transactions are proven to the relay.
    #[serde(default)]
    pub tx_verify_type: TxVerifyType,
    /// Timeout of relay calls and of the cross-chain requests, in seconds.
    #[serde(default = "defaults::default_timeout")]
    pub default_timeout: u64,
}

impl BaseConfig {
    /// The default timeout as a [`Duration`].
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout)
    }
}

/// Inbound server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RpcConfig {
    /// Port the inbound server listens on.
    #[serde(default = "defaults::rpc_port")]
    pub port: u16,
    /// Peers that are refused service.
    #[serde(default)]
    pub blacklist: Vec<IpAddr>,
    /// Largest accepted request body, in bytes.
    #[serde(default = "defaults::max_request_size")]
    pub max_request_size: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            port: defaults::rpc_port(),
            blacklist: Vec::new(),
            max_request_size: defaults::max_request_size(),
        }
    }
}

/// Relay network endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayConfig {
    /// Base url of the relay network gateway API.
    pub address: RpcUrl,
    /// Access code, sent on every call as the `x-token` header.
    #[serde(default, skip_serializing)]
    pub access_code: String,
    /// Delay between two attempts of a relay call, in milliseconds.
    #[serde(default = "defaults::retry_interval")]
    pub retry_interval: u64,
    /// CA bundle used to verify the relay certificate (PEM).
    #[serde(default)]
    pub tls_ca: Option<PathBuf>,
    /// Client certificate for mutual TLS (PEM).
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
    /// Client private key for mutual TLS (PEM).
    #[serde(default, skip_serializing)]
    pub client_key: Option<PathBuf>,
}

impl RelayConfig {
    /// The retry interval as a [`Duration`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval)
    }
}

/// Block header synchronization.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockHeaderSyncConfig {
    /// Seconds between two synchronization rounds.
    #[serde(default = "defaults::header_sync_interval")]
    pub interval: u64,
    /// Largest number of headers sent in a single relay call.
    #[serde(default = "defaults::header_batch_count")]
    pub batch_count: u64,
}

impl Default for BlockHeaderSyncConfig {
    fn default() -> Self {
        Self {
            interval: defaults::header_sync_interval(),
            batch_count: defaults::header_batch_count(),
        }
    }
}

/// Outbound dispatch queue bounds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DispatchConfig {
    /// Jobs that may wait for a worker before submitters are slowed down.
    #[serde(default = "defaults::dispatch_queue_size")]
    pub queue_size: usize,
    /// Relay calls (with their retry loops) running at the same time.
    #[serde(default = "defaults::dispatch_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_size: defaults::dispatch_queue_size(),
            max_in_flight: defaults::dispatch_max_in_flight(),
        }
    }
}

/// ChainConfig is the configuration of one attached chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    /// The resource id the relay network knows this chain by.
    pub chain_rid: String,
    /// Boolean indicating the chain is enabled or not.
    #[serde(default)]
    pub enabled: bool,
    /// chain specific id (output of chainId opcode on EVM networks)
    pub chain_id: u64,
    /// Http(s) Endpoint for quick Req/Res
    #[serde(skip_serializing)]
    pub http_endpoint: RpcUrl,
    /// Address of the contract emitting `CROSS_CHAIN_TRIGGER` events.
    pub cross_contract_name: Address,
    /// The Private Key of the account used to send transactions on this chain.
    ///
    /// Either a `0x` prefixed hex string, or `$NAME` to read it from the
    /// environment variable `NAME`.
    #[serde(skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// How often the chain is polled for new logs, in milliseconds.
    #[serde(default = "defaults::polling_interval")]
    pub polling_interval: u64,
    /// How many blocks are scanned for logs in one request.
    #[serde(default = "defaults::max_blocks_per_step")]
    pub max_blocks_per_step: u64,
}

impl ChainConfig {
    /// The polling interval as a [`Duration`].
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval)
    }
}
