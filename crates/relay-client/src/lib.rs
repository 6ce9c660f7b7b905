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
//! # Relay Client 🕸️
//!
//! Everything the gateway sends to the relay network.
//!
//! ## Overview
//!
//! * [`RelayClient`]: one call to the relay, no retries. [`HttpRelayClient`]
//!   speaks JSON over HTTP(S), [`mocked::MockedRelayClient`] is scripted by
//!   tests.
//! * [`RelayDispatcher`]: delivers a request until the relay acknowledges it,
//!   then advances the matching progress cursor.
//! * [`DispatchQueue`]: a bounded queue of cross-chain requests drained by a
//!   [`DispatchWorker`], so event ingestion never waits on the relay.

use tcc_gateway_types::{
    BeginCrossChainResponse, CrossChainRequest, SyncBlockHeaderRequest,
    SyncBlockHeaderResponse,
};
use tcc_gateway_utils::Result;

/// Delivery with retries and cursor bookkeeping.
pub mod dispatcher;
/// JSON over HTTP(S) transport.
pub mod http;
/// Bounded, fire-and-forget submission of cross-chain requests.
pub mod queue;

#[doc(hidden)]
pub mod mocked;

pub use dispatcher::RelayDispatcher;
pub use http::HttpRelayClient;
pub use queue::{dispatch_queue, CrossChainJob, DispatchQueue, DispatchWorker};

/// One round trip to the relay network.
///
/// Implementations report transport failures as `Err`; application level
/// failures come back as a response carrying a non-success code.
#[async_trait::async_trait]
pub trait RelayClient: Send + Sync {
    /// Submits a cross-chain request.
    async fn begin_cross_chain(
        &self,
        request: &CrossChainRequest,
    ) -> Result<BeginCrossChainResponse>;

    /// Ships a batch of block headers.
    async fn sync_block_header(
        &self,
        request: &SyncBlockHeaderRequest,
    ) -> Result<SyncBlockHeaderResponse>;
}
