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

use std::sync::Arc;

use futures::future::join_all;
use tcc_gateway_chain::{ChainRegistry, ContractCall, TransactionDetail};
use tcc_gateway_proof::TxProofEngine;
use tcc_gateway_types::{
    Code, CrossChainCancelRequest, CrossChainCancelResponse,
    CrossChainConfirmRequest, CrossChainConfirmResponse, CrossChainEventRequest,
    CrossChainEventResponse, CrossChainTryRequest, CrossChainTryResponse,
    IsCrossChainSuccessRequest, IsCrossChainSuccessResponse, Operate,
    PingPongResponse, TxContent, TxResultValue, TxVerifyRequest,
    TxVerifyResponse, Version, EMPTY_PARAMETER,
};
use tcc_gateway_utils::metric::Metrics;
use tcc_gateway_utils::{probe, Error, Result};

use crate::{fill_try_result, EventRegistry};

/// Responses that carry a `{code, message}` status.
pub trait TccResponse: Default {
    /// A response holding only a status.
    fn with_status(code: Code, message: impl Into<String>) -> Self {
        let mut res = Self::default();
        res.set_status(code, message.into());
        res
    }

    /// Overwrites the status of the response.
    fn set_status(&mut self, code: Code, message: String);

    /// A successful response with the canonical message.
    fn success() -> Self {
        Self::with_status(Code::GatewaySuccess, Code::GatewaySuccess.as_str_name())
    }
}

macro_rules! impl_tcc_response {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TccResponse for $ty {
                fn set_status(&mut self, code: Code, message: String) {
                    self.code = code as i32;
                    self.message = message;
                }
            }
        )*
    };
}

impl_tcc_response!(
    CrossChainTryResponse,
    CrossChainConfirmResponse,
    CrossChainCancelResponse,
    CrossChainEventResponse,
    TxVerifyResponse,
    IsCrossChainSuccessResponse,
);

fn check_version(version: i32) -> Result<()> {
    if Version::is_supported(version) {
        Ok(())
    } else {
        Err(Error::UnsupportedVersion(version))
    }
}

/// Serves the calls the relay network makes on this gateway.
///
/// The relay coordinates every cross-chain transaction; nothing about a
/// transaction is kept here between calls. Every method answers with an
/// application status, failures never escape as errors.
#[derive(Clone)]
pub struct TccHandler {
    gateway_id: String,
    chains: ChainRegistry,
    proofs: TxProofEngine,
    registry: EventRegistry,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for TccHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TccHandler")
            .field("gateway_id", &self.gateway_id)
            .field("chains", &self.chains.len())
            .finish()
    }
}

impl TccHandler {
    pub fn new(
        gateway_id: impl Into<String>,
        chains: ChainRegistry,
        proofs: TxProofEngine,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            registry: EventRegistry::new(chains.clone()),
            chains,
            proofs,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn observe(&self, method: &str) {
        self.metrics.inbound_calls.with_label_values(&[method]).inc();
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Tcc,
            %method,
        );
    }

    /// Runs the destination leg and returns its transaction with a proof.
    #[tracing::instrument(skip_all, fields(cross_chain_id = %req.cross_chain_id))]
    pub async fn cross_chain_try(
        &self,
        req: CrossChainTryRequest,
    ) -> CrossChainTryResponse {
        self.observe("CrossChainTry");
        let mut res = CrossChainTryResponse {
            cross_chain_id: req.cross_chain_id.clone(),
            cross_chain_name: req.cross_chain_name.clone(),
            cross_chain_flag: req.cross_chain_flag.clone(),
            ..Default::default()
        };
        if let Err(e) = check_version(req.version) {
            res.set_status(Code::InvalidParameter, e.to_string());
            return res;
        }
        let msg = req.cross_chain_msg.unwrap_or_default();
        let call = ContractCall {
            contract_name: msg.contract_name,
            method: msg.method,
            abi: msg.abi,
            parameter: msg.parameter,
        };
        match self.invoke(&msg.chain_rid, &call).await {
            Ok((try_result, tx)) => {
                let tx_prove = self.proofs.build_proof(&msg.chain_rid, &tx).await;
                res.tx_content = Some(self.tx_content(&msg.chain_rid, tx, tx_prove));
                res.try_result = try_result;
                res.set_status(
                    Code::GatewaySuccess,
                    Code::GatewaySuccess.as_str_name().to_owned(),
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to execute cross-chain transaction",
                );
                res.set_status(Code::InternalError, e.to_string());
            }
        }
        res
    }

    /// Finalizes a cross-chain transaction, binding the try results into
    /// the confirm parameters.
    #[tracing::instrument(skip_all, fields(cross_chain_id = %req.cross_chain_id))]
    pub async fn cross_chain_confirm(
        &self,
        req: CrossChainConfirmRequest,
    ) -> CrossChainConfirmResponse {
        self.observe("CrossChainConfirm");
        if let Err(e) = check_version(req.version) {
            return TccResponse::with_status(Code::InvalidParameter, e.to_string());
        }
        let cross_type = req.cross_type();
        let info = match req.confirm_info {
            Some(info) if !info.chain_rid.is_empty() => info,
            _ => return TccResponse::success(),
        };
        let parameter =
            match fill_try_result(&info.parameter, &req.try_result, cross_type) {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(error = %e, "Cannot bind try results");
                    return TccResponse::with_status(
                        Code::InternalError,
                        e.to_string(),
                    );
                }
            };
        let call = ContractCall {
            contract_name: info.contract_name,
            method: info.method,
            abi: info.abi,
            parameter,
        };
        match self.invoke(&info.chain_rid, &call).await {
            Ok((_, tx)) => CrossChainConfirmResponse {
                tx_content: Some(self.tx_content(&info.chain_rid, tx, String::new())),
                ..TccResponse::success()
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to confirm cross-chain transaction");
                TccResponse::with_status(Code::InternalError, e.to_string())
            }
        }
    }

    /// Rolls back a cross-chain transaction.
    #[tracing::instrument(skip_all, fields(cross_chain_id = %req.cross_chain_id))]
    pub async fn cross_chain_cancel(
        &self,
        req: CrossChainCancelRequest,
    ) -> CrossChainCancelResponse {
        self.observe("CrossChainCancel");
        if let Err(e) = check_version(req.version) {
            return TccResponse::with_status(Code::InvalidParameter, e.to_string());
        }
        let info = match req.cancel_info {
            Some(info) if !info.chain_rid.is_empty() => info,
            _ => return TccResponse::success(),
        };
        let parameter = if info.parameter.is_empty() {
            EMPTY_PARAMETER.to_owned()
        } else {
            info.parameter
        };
        let call = ContractCall {
            contract_name: info.contract_name,
            method: info.method,
            abi: info.abi,
            parameter,
        };
        match self.invoke(&info.chain_rid, &call).await {
            Ok((_, tx)) => CrossChainCancelResponse {
                tx_content: Some(self.tx_content(&info.chain_rid, tx, String::new())),
                ..TccResponse::success()
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to cancel cross-chain transaction");
                TccResponse::with_status(Code::InternalError, e.to_string())
            }
        }
    }

    /// Reads, stores or deletes an event configuration.
    #[tracing::instrument(skip_all, fields(operate = req.operate))]
    pub async fn cross_chain_event(
        &self,
        req: CrossChainEventRequest,
    ) -> CrossChainEventResponse {
        self.observe("CrossChainEvent");
        if let Err(e) = check_version(req.version) {
            return TccResponse::with_status(Code::InvalidParameter, e.to_string());
        }
        let Ok(operate) = Operate::try_from(req.operate) else {
            return TccResponse::with_status(
                Code::InvalidParameter,
                "unsupported operate",
            );
        };
        let config = req.cross_chain_event.unwrap_or_default();
        let outcome = match operate {
            Operate::Get => self.registry.get(&config).await.map(Some),
            Operate::Delete => self.registry.delete(&config).await.map(|_| None),
            Operate::Save => self.registry.save(&config).await.map(|_| None),
        };
        match outcome {
            Ok(cross_chain_event) => CrossChainEventResponse {
                cross_chain_event,
                ..TccResponse::success()
            },
            Err(e @ Error::InvalidEventConfig(_)) => {
                TccResponse::with_status(Code::InvalidParameter, e.to_string())
            }
            Err(e) => {
                tracing::error!(error = %e, ?operate, "Event registry call failed");
                TccResponse::with_status(Code::InternalError, e.to_string())
            }
        }
    }

    /// Checks a transaction proof produced by a gateway.
    pub async fn tx_verify(&self, req: TxVerifyRequest) -> TxVerifyResponse {
        self.observe("TxVerify");
        if let Err(e) = check_version(req.version) {
            return TccResponse::with_status(Code::InvalidParameter, e.to_string());
        }
        match self.proofs.verify(&req.tx_prove).await {
            Ok(tx_verify_result) => TxVerifyResponse {
                tx_verify_result,
                ..TccResponse::success()
            },
            Err(e) => {
                tracing::warn!(error = %e, "Cannot verify transaction proof");
                TccResponse::with_status(Code::TxProveError, e.to_string())
            }
        }
    }

    /// Not supported by this gateway: the answer is always `false` with an
    /// `INTERNAL_ERROR` status saying so.
    pub async fn is_cross_chain_success(
        &self,
        req: IsCrossChainSuccessRequest,
    ) -> IsCrossChainSuccessResponse {
        self.observe("IsCrossChainSuccess");
        if let Err(e) = check_version(req.version) {
            return TccResponse::with_status(Code::InvalidParameter, e.to_string());
        }
        TccResponse::with_status(
            Code::InternalError,
            "IsCrossChainSuccess is not implemented",
        )
    }

    /// `true` when every configured chain answers a liveness probe.
    pub async fn ping_pong(&self) -> PingPongResponse {
        self.observe("PingPong");
        let checks = self.chains.iter().map(|chain| chain.health_check());
        let chain_ok = join_all(checks).await.into_iter().all(|ok| ok);
        PingPongResponse { chain_ok }
    }

    async fn invoke(
        &self,
        chain_rid: &str,
        call: &ContractCall,
    ) -> Result<(Vec<String>, TransactionDetail)> {
        let chain = self.chains.get(chain_rid)?;
        let output = chain.invoke_contract(call, true).await?;
        let tx = output.tx.ok_or_else(|| {
            Error::ContractInvocation(format!(
                "{} returned no transaction",
                call.method
            ))
        })?;
        Ok((output.return_values, tx))
    }

    fn tx_content(
        &self,
        chain_rid: &str,
        tx: TransactionDetail,
        tx_prove: String,
    ) -> TxContent {
        TxContent {
            tx_id: tx.tx_id,
            tx: tx.tx_bytes,
            tx_result: TxResultValue::TxSuccess as i32,
            gateway_id: self.gateway_id.clone(),
            chain_rid: chain_rid.to_owned(),
            tx_prove,
            block_height: tx.block_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use tcc_gateway_chain::mocked::MockedChainAdapter;
    use tcc_gateway_chain::{ChainAdapter, InvokeOutput};
    use tcc_gateway_store::InMemoryStore;
    use tcc_gateway_types::{
        CancelInfo, ConfirmInfo, CrossChainMsg, CrossType, EventConfig,
        TxVerifyType,
    };

    use super::*;

    const V1: i32 = Version::V100 as i32;

    fn handler() -> (Arc<MockedChainAdapter>, TccHandler) {
        let chain = Arc::new(MockedChainAdapter::new("chain1"));
        chain.set_height(10);
        let chains = ChainRegistry::new([chain.clone() as Arc<dyn ChainAdapter>]);
        let proofs = TxProofEngine::new(
            TxVerifyType::None,
            chains.clone(),
            Arc::new(InMemoryStore::default()),
        );
        let metrics = Arc::new(Metrics::new().unwrap());
        (chain, TccHandler::new("gw1", chains, proofs, metrics))
    }

    fn try_request(version: i32) -> CrossChainTryRequest {
        CrossChainTryRequest {
            version,
            cross_chain_id: "cc-1".into(),
            cross_chain_msg: Some(CrossChainMsg {
                chain_rid: "chain1".into(),
                contract_name: "0xdest".into(),
                method: "lock".into(),
                parameter: "[1]".into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn confirm_info(parameter: &str) -> ConfirmInfo {
        ConfirmInfo {
            chain_rid: "chain1".into(),
            contract_name: "0xdest".into(),
            method: "confirm".into(),
            parameter: parameter.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn try_returns_the_transaction_and_results() {
        let (chain, handler) = handler();
        chain.push_invoke_result(Ok(InvokeOutput {
            return_values: vec!["42".into()],
            tx: None,
        }));
        let res = handler.cross_chain_try(try_request(V1)).await;
        assert_eq!(res.code, Code::GatewaySuccess as i32);
        assert_eq!(res.cross_chain_id, "cc-1");
        assert_eq!(res.try_result, vec!["42"]);
        let content = res.tx_content.unwrap();
        assert_eq!(content.gateway_id, "gw1");
        assert_eq!(content.chain_rid, "chain1");
        assert_eq!(content.tx_prove, "{}");
        assert!(!content.tx.is_empty());

        let (call, need_tx) = &chain.invocations()[0];
        assert!(need_tx);
        assert_eq!(call.method, "lock");
        assert_eq!(call.parameter, "[1]");
    }

    #[tokio::test]
    async fn try_failures_are_reported_in_band() {
        let (chain, handler) = handler();
        chain.push_invoke_result(Err("reverted".into()));
        let res = handler.cross_chain_try(try_request(V1)).await;
        assert_eq!(res.code, Code::InternalError as i32);
        assert!(res.message.contains("reverted"));
        assert!(res.tx_content.is_none());
    }

    #[tokio::test]
    async fn unsupported_versions_never_reach_the_chain() {
        let (chain, handler) = handler();
        let res = handler.cross_chain_try(try_request(2)).await;
        assert_eq!(res.code, Code::InvalidParameter as i32);
        assert_eq!(res.message, "Unsupported version: 2");

        let confirm = handler
            .cross_chain_confirm(CrossChainConfirmRequest {
                version: 0,
                confirm_info: Some(confirm_info("[]")),
                ..Default::default()
            })
            .await;
        assert_eq!(confirm.code, Code::InvalidParameter as i32);

        let cancel = handler
            .cross_chain_cancel(CrossChainCancelRequest {
                version: 9,
                ..Default::default()
            })
            .await;
        assert_eq!(cancel.code, Code::InvalidParameter as i32);

        let event = handler
            .cross_chain_event(CrossChainEventRequest {
                version: 9,
                ..Default::default()
            })
            .await;
        assert_eq!(event.code, Code::InvalidParameter as i32);

        let verify = handler
            .tx_verify(TxVerifyRequest {
                version: 9,
                tx_prove: "{}".into(),
            })
            .await;
        assert_eq!(verify.code, Code::InvalidParameter as i32);
        assert!(chain.invocations().is_empty());
    }

    #[tokio::test]
    async fn confirm_without_target_is_a_no_op() {
        let (chain, handler) = handler();
        let res = handler
            .cross_chain_confirm(CrossChainConfirmRequest {
                version: V1,
                confirm_info: Some(ConfirmInfo::default()),
                ..Default::default()
            })
            .await;
        assert_eq!(res.code, Code::GatewaySuccess as i32);
        assert_eq!(res.message, "GATEWAY_SUCCESS");
        assert!(res.tx_content.is_none());
        assert!(chain.invocations().is_empty());
    }

    #[tokio::test]
    async fn confirm_binds_try_results() {
        let (chain, handler) = handler();
        let res = handler
            .cross_chain_confirm(CrossChainConfirmRequest {
                version: V1,
                confirm_info: Some(confirm_info(r#"["%CROSS_RESULT%"]"#)),
                try_result: vec!["7".into()],
                cross_type: CrossType::Query as i32,
                ..Default::default()
            })
            .await;
        assert_eq!(res.code, Code::GatewaySuccess as i32);
        assert_eq!(res.tx_content.unwrap().tx_prove, "");
        assert_eq!(chain.invocations()[0].0.parameter, r#"["7"]"#);
    }

    #[tokio::test]
    async fn confirm_rejects_mismatched_templates() {
        let (chain, handler) = handler();
        let res = handler
            .cross_chain_confirm(CrossChainConfirmRequest {
                version: V1,
                confirm_info: Some(confirm_info("%CROSS_RESULT%,%CROSS_RESULT%")),
                try_result: vec!["a".into()],
                ..Default::default()
            })
            .await;
        assert_eq!(res.code, Code::InternalError as i32);
        assert!(chain.invocations().is_empty());
    }

    #[tokio::test]
    async fn cancel_defaults_to_empty_parameters() {
        let (chain, handler) = handler();
        let res = handler
            .cross_chain_cancel(CrossChainCancelRequest {
                version: V1,
                cancel_info: Some(CancelInfo {
                    chain_rid: "chain1".into(),
                    contract_name: "0xdest".into(),
                    method: "cancel".into(),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .await;
        assert_eq!(res.code, Code::GatewaySuccess as i32);
        assert_eq!(chain.invocations()[0].0.parameter, "{}");
    }

    #[tokio::test]
    async fn event_operations_are_routed() {
        let (chain, handler) = handler();
        let res = handler
            .cross_chain_event(CrossChainEventRequest {
                version: V1,
                operate: 42,
                ..Default::default()
            })
            .await;
        assert_eq!(res.code, Code::InvalidParameter as i32);
        assert_eq!(res.message, "unsupported operate");

        let res = handler
            .cross_chain_event(CrossChainEventRequest {
                version: V1,
                operate: Operate::Save as i32,
                cross_chain_event: Some(EventConfig::default()),
            })
            .await;
        assert_eq!(res.code, Code::InvalidParameter as i32);
        assert_eq!(res.message, "CrossId is required");

        let res = handler
            .cross_chain_event(CrossChainEventRequest {
                version: V1,
                operate: Operate::Delete as i32,
                cross_chain_event: Some(EventConfig {
                    cross_id: "cross-1".into(),
                    src_chain_rid: "chain1".into(),
                    ..Default::default()
                }),
            })
            .await;
        assert_eq!(res.code, Code::GatewaySuccess as i32);
        assert_eq!(chain.invocations().len(), 1);
    }

    #[tokio::test]
    async fn proofs_are_verified() {
        let (_, handler) = handler();
        let res = handler
            .tx_verify(TxVerifyRequest {
                version: V1,
                tx_prove: "{}".into(),
            })
            .await;
        assert_eq!(res.code, Code::GatewaySuccess as i32);
        assert!(res.tx_verify_result);
    }

    #[tokio::test]
    async fn is_cross_chain_success_is_not_implemented() {
        let (_, handler) = handler();
        let res = handler
            .is_cross_chain_success(IsCrossChainSuccessRequest {
                version: V1,
                cross_chain_id: "cc-1".into(),
            })
            .await;
        assert!(!res.cross_chain_result);
        assert_eq!(res.code, Code::InternalError as i32);
    }

    #[tokio::test]
    async fn ping_pong_follows_chain_health() {
        let (chain, handler) = handler();
        assert!(handler.ping_pong().await.chain_ok);
        chain.set_healthy(false);
        assert!(!handler.ping_pong().await.chain_ok);
        let calls = handler
            .metrics()
            .inbound_calls
            .with_label_values(&["PingPong"])
            .get();
        assert_eq!(calls as u64, 2);
    }
}
