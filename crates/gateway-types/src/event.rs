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

use serde::{Deserialize, Serialize};

/// Name of the event emitted by cross-chain trigger contracts.
pub const CROSS_CHAIN_TRIGGER_EVENT: &str = "CROSS_CHAIN_TRIGGER";
/// Solidity signature of the event emitted by cross-chain trigger contracts.
pub const CROSS_CHAIN_TRIGGER_SIGNATURE: &str =
    "CROSS_CHAIN_TRIGGER(string,string)";

/// A contract log normalized by the event watcher.
///
/// `data` holds the space separated halves of the log payload: the
/// base64-encoded [`CrossChainRequest`](crate::CrossChainRequest) template
/// and the base64-encoded [`TriggerInfo`](crate::TriggerInfo) overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub topic: String,
    pub chain_rid: String,
    pub contract_name: String,
    pub tx_prove: String,
    pub data: Vec<String>,
    #[serde(with = "crate::bytes_b64")]
    pub tx_bytes: Vec<u8>,
    pub tx_id: String,
    pub block_height: u64,
}
