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
    CancelInfo, Code, ConfirmInfo, CrossChainMsg, CrossType, Operate,
    TxContent,
};

/// Dynamic parameters carried next to the request template in a trigger
/// log. They override the template's static parameters.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerInfo {
    #[prost(string, tag = "1")]
    pub src_confirm_param: String,
    #[prost(string, tag = "2")]
    pub src_cancel_param: String,
    #[prost(string, tag = "3")]
    pub dest_try_param: String,
    #[prost(string, tag = "4")]
    pub dest_confirm_param: String,
    #[prost(string, tag = "5")]
    pub dest_cancel_param: String,
}

/// The durable description of a cross-chain trigger, kept in the registry
/// contract on the source chain.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventConfig {
    #[prost(string, tag = "1")]
    pub cross_id: String,
    #[prost(string, tag = "2")]
    pub src_gateway_id: String,
    #[prost(string, tag = "3")]
    pub src_chain_rid: String,
    #[prost(string, tag = "4")]
    pub src_contract_name: String,
    #[prost(string, tag = "5")]
    pub src_confirm_method: String,
    #[prost(string, tag = "6")]
    pub src_cancel_method: String,
    #[prost(string, tag = "7")]
    pub src_abi: String,
    /// Address of the registry contract holding this configuration.
    #[prost(string, tag = "8")]
    pub config_contract_name: String,
    #[prost(string, tag = "9")]
    pub dest_gateway_id: String,
    #[prost(string, tag = "10")]
    pub dest_chain_rid: String,
    #[prost(string, tag = "11")]
    pub dest_contract_name: String,
    #[prost(string, tag = "12")]
    pub dest_try_method: String,
    #[prost(string, tag = "13")]
    pub dest_confirm_method: String,
    #[prost(string, tag = "14")]
    pub dest_cancel_method: String,
    #[prost(string, tag = "15")]
    pub dest_abi: String,
    #[prost(string, tag = "16")]
    pub desc: String,
    #[prost(enumeration = "CrossType", tag = "17")]
    pub trigger_cross_type: i32,
}

/// `CrossChainTry`: run the destination leg.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainTryRequest {
    #[prost(enumeration = "crate::common::Version", tag = "1")]
    pub version: i32,
    #[prost(string, tag = "2")]
    pub cross_chain_id: String,
    #[prost(string, tag = "3")]
    pub cross_chain_name: String,
    #[prost(string, tag = "4")]
    pub cross_chain_flag: String,
    #[prost(message, optional, tag = "5")]
    pub cross_chain_msg: Option<CrossChainMsg>,
    /// The source transaction that triggered this leg.
    #[prost(message, optional, tag = "6")]
    pub tx_content: Option<TxContent>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainTryResponse {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(string, tag = "3")]
    pub cross_chain_id: String,
    #[prost(string, tag = "4")]
    pub cross_chain_name: String,
    #[prost(string, tag = "5")]
    pub cross_chain_flag: String,
    #[prost(message, optional, tag = "6")]
    pub tx_content: Option<TxContent>,
    #[prost(string, repeated, tag = "7")]
    pub try_result: Vec<String>,
}

/// `CrossChainConfirm`: finalize a leg that was tried before.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainConfirmRequest {
    #[prost(enumeration = "crate::common::Version", tag = "1")]
    pub version: i32,
    #[prost(string, tag = "2")]
    pub cross_chain_id: String,
    #[prost(message, optional, tag = "3")]
    pub confirm_info: Option<ConfirmInfo>,
    #[prost(string, repeated, tag = "4")]
    pub try_result: Vec<String>,
    #[prost(enumeration = "CrossType", tag = "5")]
    pub cross_type: i32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainConfirmResponse {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, optional, tag = "3")]
    pub tx_content: Option<TxContent>,
}

/// `CrossChainCancel`: roll back a leg.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainCancelRequest {
    #[prost(enumeration = "crate::common::Version", tag = "1")]
    pub version: i32,
    #[prost(string, tag = "2")]
    pub cross_chain_id: String,
    #[prost(message, optional, tag = "3")]
    pub cancel_info: Option<CancelInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainCancelResponse {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, optional, tag = "3")]
    pub tx_content: Option<TxContent>,
}

/// `CrossChainEvent`: manage event configurations in the registry.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainEventRequest {
    #[prost(enumeration = "crate::common::Version", tag = "1")]
    pub version: i32,
    #[prost(enumeration = "Operate", tag = "2")]
    pub operate: i32,
    #[prost(message, optional, tag = "3")]
    pub cross_chain_event: Option<EventConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainEventResponse {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, optional, tag = "3")]
    pub cross_chain_event: Option<EventConfig>,
}

/// `TxVerify`: check an opaque proof bundle.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TxVerifyRequest {
    #[prost(enumeration = "crate::common::Version", tag = "1")]
    pub version: i32,
    #[prost(string, tag = "2")]
    pub tx_prove: String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TxVerifyResponse {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(bool, tag = "3")]
    pub tx_verify_result: bool,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IsCrossChainSuccessRequest {
    #[prost(enumeration = "crate::common::Version", tag = "1")]
    pub version: i32,
    #[prost(string, tag = "2")]
    pub cross_chain_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IsCrossChainSuccessResponse {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(bool, tag = "3")]
    pub cross_chain_result: bool,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PingPongRequest {
    #[prost(enumeration = "crate::common::Version", tag = "1")]
    pub version: i32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PingPongResponse {
    #[prost(bool, tag = "1")]
    pub chain_ok: bool,
}
