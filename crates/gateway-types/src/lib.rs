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

//! # TCC Gateway Types 🕸️
//!
//! The data model exchanged between the gateway, the relay network and the
//! contracts the gateway drives.
//!
//! Messages derive both [`prost::Message`] and serde, since the same values
//! travel base64-wrapped inside contract logs and as JSON over the relay
//! transport.

use serde::{Deserialize, Serialize};

/// Shared messages: codes, tx content, confirm / cancel bindings.
pub mod common;
/// Requests served by the gateway on behalf of the relay.
pub mod cross_chain;
/// The normalized record produced from one trigger log.
pub mod event;
/// Requests the gateway sends to the relay.
pub mod relay;

/// `serde(with)` adapter for base64 byte fields.
pub mod bytes_b64;

pub use common::*;
pub use cross_chain::*;
pub use event::*;
pub use relay::*;

/// The destination gateway id that stands for the relay network itself.
pub const MAIN_GATEWAY_ID: &str = "MAIN_GATEWAY_ID";
/// Placeholder substituted with try results in confirm / cancel parameters.
pub const TRY_RESULT_PLACEHOLDER: &str = "%CROSS_RESULT%";
/// Parameter used when a contract method takes no arguments.
pub const EMPTY_PARAMETER: &str = "{}";

/// How transactions referenced by cross-chain requests are proven.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum TxVerifyType {
    /// No proof, verification always succeeds.
    #[default]
    #[serde(alias = "notneed")]
    #[display(fmt = "none")]
    None,
    /// The verifier re-fetches the transaction and compares the bytes.
    #[serde(alias = "rpc")]
    #[display(fmt = "direct")]
    Direct,
    /// The proof is checked against the locally synchronized header chain.
    #[display(fmt = "spv")]
    Spv,
}

impl TxVerifyType {
    /// Whether this mode depends on block headers being shipped to the relay.
    pub fn needs_header_sync(&self) -> bool {
        !matches!(self, TxVerifyType::None)
    }
}
