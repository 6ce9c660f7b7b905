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

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use prost::Message;
use tcc_gateway_chain::{ChainRegistry, ContractCall};
use tcc_gateway_types::{
    CancelInfo, ConfirmInfo, CrossChainMsg, CrossChainRequest, EventConfig,
    Version, MAIN_GATEWAY_ID,
};
use tcc_gateway_utils::{Error, Result};

/// Registry contract method storing a new event configuration.
pub const NEW_CROSS_CHAIN_METHOD: &str = "newCrossChain";
/// Registry contract method removing an event configuration.
pub const DELETE_CROSS_CHAIN_METHOD: &str = "deleteCrossChain";
/// Registry contract method reading an event configuration.
pub const QUERY_CROSS_CHAIN_METHOD: &str = "queryCrossChain";

/// Event configurations live in a registry contract on the source chain
/// (`src-chain-rid`, `config-contract-name`), keyed by `cross-id`.
#[derive(Clone)]
pub struct EventRegistry {
    chains: ChainRegistry,
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry").finish()
    }
}

impl EventRegistry {
    pub fn new(chains: ChainRegistry) -> Self {
        Self { chains }
    }

    /// Checks the fields a configuration cannot be saved without.
    ///
    /// The destination chain may be left empty when the destination is the
    /// main gateway.
    pub fn validate(config: &EventConfig) -> Result<()> {
        let required = [
            (&config.cross_id, "CrossId"),
            (&config.dest_gateway_id, "DestGatewayId"),
            (&config.dest_contract_name, "DestContractName"),
            (&config.dest_try_method, "DestTryMethod"),
        ];
        if let Some((_, name)) = required.iter().find(|(v, _)| v.is_empty()) {
            return Err(Error::InvalidEventConfig(format!("{name} is required")));
        }
        if config.dest_gateway_id != MAIN_GATEWAY_ID
            && config.dest_chain_rid.is_empty()
        {
            return Err(Error::InvalidEventConfig(
                "DestChainRid is required".into(),
            ));
        }
        Ok(())
    }

    /// The request template the source contract emits when the event fires.
    pub fn request_template(config: &EventConfig) -> CrossChainRequest {
        let msg = CrossChainMsg {
            gateway_id: config.dest_gateway_id.clone(),
            chain_rid: config.dest_chain_rid.clone(),
            contract_name: config.dest_contract_name.clone(),
            method: config.dest_try_method.clone(),
            abi: config.dest_abi.clone(),
            parameter: String::new(),
            confirm_info: Some(ConfirmInfo {
                chain_rid: config.dest_chain_rid.clone(),
                contract_name: config.dest_contract_name.clone(),
                method: config.dest_confirm_method.clone(),
                abi: config.dest_abi.clone(),
                ..Default::default()
            }),
            cancel_info: Some(CancelInfo {
                chain_rid: config.dest_chain_rid.clone(),
                contract_name: config.dest_contract_name.clone(),
                method: config.dest_cancel_method.clone(),
                abi: config.dest_abi.clone(),
                ..Default::default()
            }),
        };
        CrossChainRequest {
            version: Version::V100 as i32,
            cross_chain_name: config.desc.clone(),
            cross_chain_flag: config.desc.clone(),
            from: config.src_gateway_id.clone(),
            cross_chain_msg: vec![msg],
            confirm_info: Some(ConfirmInfo {
                chain_rid: config.src_chain_rid.clone(),
                contract_name: config.src_contract_name.clone(),
                method: config.src_confirm_method.clone(),
                abi: config.src_abi.clone(),
                ..Default::default()
            }),
            cancel_info: Some(CancelInfo {
                chain_rid: config.src_chain_rid.clone(),
                contract_name: config.src_contract_name.clone(),
                method: config.src_cancel_method.clone(),
                abi: config.src_abi.clone(),
                ..Default::default()
            }),
            cross_type: config.trigger_cross_type,
            ..Default::default()
        }
    }

    /// Validates and stores `config` together with its request template.
    #[tracing::instrument(skip_all, fields(cross_id = %config.cross_id))]
    pub async fn save(&self, config: &EventConfig) -> Result<()> {
        Self::validate(config)?;
        let event = STANDARD.encode(config.encode_to_vec());
        let template =
            STANDARD.encode(Self::request_template(config).encode_to_vec());
        self.call(
            config,
            NEW_CROSS_CHAIN_METHOD,
            &[event, template, config.cross_id.clone()],
        )
        .await?;
        tracing::info!("Saved event configuration");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(cross_id = %config.cross_id))]
    pub async fn delete(&self, config: &EventConfig) -> Result<()> {
        self.call(config, DELETE_CROSS_CHAIN_METHOD, &[config.cross_id.clone()])
            .await?;
        tracing::info!("Deleted event configuration");
        Ok(())
    }

    /// Reads the configuration stored under `config.cross_id`.
    ///
    /// The stored value is base64 encoded protobuf; raw protobuf is accepted
    /// as well.
    #[tracing::instrument(skip_all, fields(cross_id = %config.cross_id))]
    pub async fn get(&self, config: &EventConfig) -> Result<EventConfig> {
        let values = self
            .call(config, QUERY_CROSS_CHAIN_METHOD, &[config.cross_id.clone()])
            .await?;
        let raw = values.first().ok_or_else(|| {
            Error::ContractInvocation(format!(
                "{QUERY_CROSS_CHAIN_METHOD} returned no value"
            ))
        })?;
        let bytes = STANDARD
            .decode(raw)
            .unwrap_or_else(|_| raw.as_bytes().to_vec());
        Ok(EventConfig::decode(bytes.as_slice())?)
    }

    async fn call(
        &self,
        config: &EventConfig,
        method: &str,
        args: &[String],
    ) -> Result<Vec<String>> {
        let chain = self.chains.get(&config.src_chain_rid)?;
        let call = ContractCall {
            contract_name: config.config_contract_name.clone(),
            method: method.to_owned(),
            abi: config.src_abi.clone(),
            parameter: serde_json::to_string(args)?,
        };
        let output = chain.invoke_contract(&call, false).await?;
        Ok(output.return_values)
    }
}
