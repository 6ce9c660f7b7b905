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

use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use tcc_gateway_types::{
    CrossChainCancelRequest, CrossChainCancelResponse, CrossChainConfirmRequest,
    CrossChainConfirmResponse, CrossChainEventRequest, CrossChainEventResponse,
    CrossChainTryRequest, CrossChainTryResponse, IsCrossChainSuccessRequest,
    IsCrossChainSuccessResponse, PingPongResponse, TxVerifyRequest,
    TxVerifyResponse,
};

use crate::TccHandler;

/// Longest request rendering written to the logs.
pub const MAX_LOGGED_PAYLOAD: usize = 1024;

type Peer = Option<ConnectInfo<SocketAddr>>;

fn log_request<T: Debug>(method: &str, peer: &Peer, request: &T) {
    let peer = peer
        .as_ref()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".into());
    let mut payload = format!("{request:?}");
    if let Some((cut, _)) = payload.char_indices().nth(MAX_LOGGED_PAYLOAD) {
        payload.truncate(cut);
        payload.push_str("...");
    }
    tracing::info!(%method, %peer, %payload, "Inbound request");
}

pub async fn handle_cross_chain_try(
    State(handler): State<Arc<TccHandler>>,
    peer: Peer,
    Json(req): Json<CrossChainTryRequest>,
) -> Json<CrossChainTryResponse> {
    log_request("CrossChainTry", &peer, &req);
    let res = handler.cross_chain_try(req).await;
    tracing::debug!(code = res.code, "CrossChainTry served");
    Json(res)
}

pub async fn handle_cross_chain_confirm(
    State(handler): State<Arc<TccHandler>>,
    peer: Peer,
    Json(req): Json<CrossChainConfirmRequest>,
) -> Json<CrossChainConfirmResponse> {
    log_request("CrossChainConfirm", &peer, &req);
    let res = handler.cross_chain_confirm(req).await;
    tracing::debug!(code = res.code, "CrossChainConfirm served");
    Json(res)
}

pub async fn handle_cross_chain_cancel(
    State(handler): State<Arc<TccHandler>>,
    peer: Peer,
    Json(req): Json<CrossChainCancelRequest>,
) -> Json<CrossChainCancelResponse> {
    log_request("CrossChainCancel", &peer, &req);
    let res = handler.cross_chain_cancel(req).await;
    tracing::debug!(code = res.code, "CrossChainCancel served");
    Json(res)
}

pub async fn handle_cross_chain_event(
    State(handler): State<Arc<TccHandler>>,
    peer: Peer,
    Json(req): Json<CrossChainEventRequest>,
) -> Json<CrossChainEventResponse> {
    log_request("CrossChainEvent", &peer, &req);
    let res = handler.cross_chain_event(req).await;
    tracing::debug!(code = res.code, "CrossChainEvent served");
    Json(res)
}

pub async fn handle_tx_verify(
    State(handler): State<Arc<TccHandler>>,
    peer: Peer,
    Json(req): Json<TxVerifyRequest>,
) -> Json<TxVerifyResponse> {
    log_request("TxVerify", &peer, &req);
    let res = handler.tx_verify(req).await;
    tracing::debug!(code = res.code, "TxVerify served");
    Json(res)
}

pub async fn handle_is_cross_chain_success(
    State(handler): State<Arc<TccHandler>>,
    peer: Peer,
    Json(req): Json<IsCrossChainSuccessRequest>,
) -> Json<IsCrossChainSuccessResponse> {
    log_request("IsCrossChainSuccess", &peer, &req);
    Json(handler.is_cross_chain_success(req).await)
}

/// Liveness of the attached chains. Accepts both `GET` and `POST`, any body
/// is ignored.
pub async fn handle_ping_pong(
    State(handler): State<Arc<TccHandler>>,
) -> Json<PingPongResponse> {
    Json(handler.ping_pong().await)
}
