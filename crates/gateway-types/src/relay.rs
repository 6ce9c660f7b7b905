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

use crate::common::{
    CancelInfo, Code, ConfirmInfo, CrossChainMsg, CrossType, TxContent,
};

/// A cross-chain transaction as submitted to the relay network
/// (`BeginCrossChain`).
///
/// The same message, base64-wrapped, is the first half of a trigger log's
/// payload; the template stored by the event registry uses it too.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainRequest {
    #[prost(enumeration = "crate::common::Version", tag = "1")]
    pub version: i32,
    #[prost(string, tag = "2")]
    pub cross_chain_name: String,
    #[prost(string, tag = "3")]
    pub cross_chain_flag: String,
    /// The id of the gateway that emitted the request.
    #[prost(string, tag = "4")]
    pub from: String,
    #[prost(message, repeated, tag = "5")]
    pub cross_chain_msg: Vec<CrossChainMsg>,
    #[prost(message, optional, tag = "6")]
    pub tx_content: Option<TxContent>,
    /// Seconds the relay waits for the destination before cancelling.
    #[prost(int64, tag = "7")]
    pub timeout: i64,
    #[prost(message, optional, tag = "8")]
    pub confirm_info: Option<ConfirmInfo>,
    #[prost(message, optional, tag = "9")]
    pub cancel_info: Option<CancelInfo>,
    #[prost(enumeration = "CrossType", tag = "10")]
    pub cross_type: i32,
}

/// Relay answer to `BeginCrossChain`.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeginCrossChainResponse {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(string, tag = "3")]
    pub cross_chain_id: String,
}

/// A contiguous batch of block headers for the relay (`SyncBlockHeader`).
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncBlockHeaderRequest {
    #[prost(enumeration = "crate::common::Version", tag = "1")]
    pub version: i32,
    #[prost(string, tag = "2")]
    pub gateway_id: String,
    #[prost(string, tag = "3")]
    pub chain_rid: String,
    /// Trailing height of the batch.
    #[prost(uint64, tag = "4")]
    pub block_height: u64,
    #[prost(bytes = "vec", tag = "5")]
    #[serde(with = "crate::bytes_b64")]
    pub block_header: Vec<u8>,
    /// JSON list of base64-encoded headers, ordered by height.
    #[prost(bytes = "vec", tag = "6")]
    #[serde(with = "crate::bytes_b64")]
    pub block_header_batch: Vec<u8>,
}

/// Relay answer to `SyncBlockHeader`.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncBlockHeaderResponse {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}
