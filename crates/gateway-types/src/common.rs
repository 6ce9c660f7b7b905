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

/// Response codes shared by the relay and gateway protocols.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::prost::Enumeration,
    Serialize,
    Deserialize,
)]
#[repr(i32)]
pub enum Code {
    /// The call succeeded.
    GatewaySuccess = 0,
    /// The call timed out on the remote side.
    GatewayTimeout = 1,
    /// Malformed request or unsupported version.
    InvalidParameter = 2,
    /// A transaction proof could not be built or verified.
    TxProveError = 3,
    /// The contract call failed.
    ContractFail = 4,
    /// Anything else that went wrong, retryable.
    InternalError = 5,
    /// The relay chain failed to process the request.
    RelayChainError = 6,
    /// The gateway was disabled by an administrator of the relay network.
    GatewayDisabled = 7,
}

impl Code {
    /// The canonical upper snake case name of the code.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Code::GatewaySuccess => "GATEWAY_SUCCESS",
            Code::GatewayTimeout => "GATEWAY_TIMEOUT",
            Code::InvalidParameter => "INVALID_PARAMETER",
            Code::TxProveError => "TX_PROVE_ERROR",
            Code::ContractFail => "CONTRACT_FAIL",
            Code::InternalError => "INTERNAL_ERROR",
            Code::RelayChainError => "RELAY_CHAIN_ERROR",
            Code::GatewayDisabled => "GATEWAY_DISABLED",
        }
    }
}

/// Protocol versions.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::prost::Enumeration,
)]
#[repr(i32)]
pub enum Version {
    /// The field was left unset.
    Unspecified = 0,
    /// The only version this gateway speaks.
    V100 = 1,
}

impl Version {
    /// Returns `true` when `raw` is a version this gateway can serve.
    pub fn is_supported(raw: i32) -> bool {
        raw == Version::V100 as i32
    }
}

/// Whether the destination leg reads or writes.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::prost::Enumeration,
)]
#[repr(i32)]
pub enum CrossType {
    /// Query the destination and bind its results into the confirm leg.
    Query = 0,
    /// Invoke the destination, results are not bound.
    Invoke = 1,
}

/// Outcome of a transaction embedded in [`TxContent`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::prost::Enumeration,
)]
#[repr(i32)]
pub enum TxResultValue {
    /// The transaction was included and succeeded.
    TxSuccess = 0,
    /// The transaction failed.
    TxFail = 1,
}

/// Event registry operations.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::prost::Enumeration,
)]
#[repr(i32)]
pub enum Operate {
    /// Create or overwrite an event configuration.
    Save = 0,
    /// Remove an event configuration.
    Delete = 1,
    /// Read an event configuration.
    Get = 2,
}

/// A transaction as reported to the relay.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TxContent {
    #[prost(string, tag = "1")]
    pub tx_id: String,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(with = "crate::bytes_b64")]
    pub tx: Vec<u8>,
    #[prost(enumeration = "TxResultValue", tag = "3")]
    pub tx_result: i32,
    #[prost(string, tag = "4")]
    pub gateway_id: String,
    #[prost(string, tag = "5")]
    pub chain_rid: String,
    #[prost(string, tag = "6")]
    pub tx_prove: String,
    #[prost(uint64, tag = "7")]
    pub block_height: u64,
}

/// The contract call that finalizes a cross-chain transaction.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmInfo {
    #[prost(string, tag = "1")]
    pub chain_rid: String,
    #[prost(string, tag = "2")]
    pub contract_name: String,
    #[prost(string, tag = "3")]
    pub method: String,
    #[prost(string, tag = "4")]
    pub parameter: String,
    #[prost(string, tag = "5")]
    pub abi: String,
}

/// The contract call that rolls a cross-chain transaction back.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CancelInfo {
    #[prost(string, tag = "1")]
    pub chain_rid: String,
    #[prost(string, tag = "2")]
    pub contract_name: String,
    #[prost(string, tag = "3")]
    pub method: String,
    #[prost(string, tag = "4")]
    pub parameter: String,
    #[prost(string, tag = "5")]
    pub abi: String,
}

/// One destination leg of a cross-chain request.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChainMsg {
    #[prost(string, tag = "1")]
    pub gateway_id: String,
    #[prost(string, tag = "2")]
    pub chain_rid: String,
    #[prost(string, tag = "3")]
    pub contract_name: String,
    #[prost(string, tag = "4")]
    pub method: String,
    #[prost(string, tag = "5")]
    pub abi: String,
    #[prost(string, tag = "6")]
    pub parameter: String,
    #[prost(message, optional, tag = "7")]
    pub confirm_info: Option<ConfirmInfo>,
    #[prost(message, optional, tag = "8")]
    pub cancel_info: Option<CancelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_versions_are_rejected() {
        assert!(Version::is_supported(Version::V100 as i32));
        assert!(!Version::is_supported(0));
        assert!(!Version::is_supported(42));
    }

    #[test]
    fn tx_content_json_uses_base64_bytes() {
        let content = TxContent {
            tx_id: "0xabc".into(),
            tx: vec![1, 2, 3],
            ..Default::default()
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["tx"], "AQID");
        assert_eq!(json["txId"], "0xabc");
        let back: TxContent = serde_json::from_value(json).unwrap();
        assert_eq!(back, content);
    }
}
