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
//! # TCC Gateway Utils 🕸️
//!
//! Shared building blocks for every crate of the gateway: the error type,
//! retry policies, probe targets used for tracing the pipeline and the
//! prometheus metrics.

use ethers::providers::ProviderError;

/// Metrics functionality
pub mod metric;
/// A module used for debugging the gateway lifecycle, sync state, or other gateway state.
pub mod probe;
/// Retry functionality
pub mod retry;

/// An enum of all possible errors that could be encountered during the execution of the
/// gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// HTTP Error
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ProviderError),
    /// Contract ABI encoding or decoding error.
    #[error(transparent)]
    EthersAbi(#[from] ethers::abi::Error),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWalletError(#[from] ethers::signers::WalletError),
    /// Sled database error.
    #[error(transparent)]
    Sled(#[from] sled::Error),
    /// Reqwest error
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Base64 decoding error.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    /// Protobuf decoding error.
    #[error(transparent)]
    ProstDecode(#[from] prost::DecodeError),
    /// Prometheus registry error.
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// The configuration loaded but is not usable.
    #[error("Invalid configuration: {}", _0)]
    InvalidConfig(String),
    /// Chain not configured or not enabled.
    #[error("Chain Not Found: {}", chain_rid)]
    ChainNotFound {
        /// The resource id of the chain.
        chain_rid: String,
    },
    /// A configured chain did not answer at startup.
    #[error("Chain {} is unreachable: {}", chain_rid, reason)]
    ChainUnreachable {
        /// The resource id of the chain.
        chain_rid: String,
        /// What the chain node answered.
        reason: String,
    },
    /// Missing Secrets in the config, either Private key, TLS material, ...etc.
    #[error("Missing required secret in the config: {}", _0)]
    MissingSecrets(String),
    /// The chain node does not know the block at this height (yet).
    #[error("Block #{} not found", _0)]
    BlockNotFound(u64),
    /// The chain node does not know the transaction.
    #[error("Transaction {} not found", _0)]
    TransactionNotFound(String),
    /// A contract call was rejected, reverted, or could not be encoded.
    #[error("Contract invocation failed: {}", _0)]
    ContractInvocation(String),
    /// The log payload is not a cross-chain request of this gateway.
    ///
    /// The trigger topic may be shared by unrelated events, so this is never fatal.
    #[error("Not a cross-chain event: {}", _0)]
    NotCrossChainEvent(String),
    /// The decoded request was emitted for a different gateway.
    #[error("Cross-chain request belongs to gateway {found}, expected {expected}")]
    ForeignGateway {
        /// The id of this gateway.
        expected: String,
        /// The id found in the request.
        found: String,
    },
    /// The event carries no raw transaction bytes.
    #[error("Event {} carries no transaction bytes", _0)]
    MissingTxBytes(String),
    /// The number of `%CROSS_RESULT%` placeholders does not match the try results.
    #[error(
        "\"%CROSS_RESULT%\" count ({placeholders}) != len(TryResult) ({results}), please update event config"
    )]
    PlaceholderMismatch {
        /// Placeholders found in the template.
        placeholders: usize,
        /// Try results supplied by the relay.
        results: usize,
    },
    /// Inbound request with a protocol version this gateway does not speak.
    #[error("Unsupported version: {}", _0)]
    UnsupportedVersion(i32),
    /// An event configuration failed validation.
    #[error("{}", _0)]
    InvalidEventConfig(String),
    /// The relay answered with a non-success code.
    #[error("Relay rejected the call with code {code}: {message}")]
    RelayRejected {
        /// Raw response code.
        code: i32,
        /// Message attached by the relay.
        message: String,
    },
    /// The relay reports that this gateway is administratively disabled.
    #[error("Gateway is disabled by the relay network")]
    GatewayDisabled,
    /// The dispatch queue was closed before the job could be submitted.
    #[error("Dispatch queue is closed")]
    DispatchQueueClosed,
    /// a background task failed and force restarted.
    #[error("Task Force Restarted from an error")]
    ForceRestart,
}

/// A type alias for the result for gateway, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;
