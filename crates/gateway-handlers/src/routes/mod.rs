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

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tcc_gateway_config::RpcConfig;
use hyper::server::conn::AddrIncoming;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::TccHandler;

mod metric;
pub use metric::*;

mod middleware;
pub use middleware::*;

mod tcc;
pub use tcc::*;

/// The inbound surface of the gateway.
pub fn build_router(handler: TccHandler, rpc: &RpcConfig) -> Router {
    let blacklist: Blacklist = Arc::new(rpc.blacklist.iter().copied().collect());
    Router::new()
        .route("/v1/CrossChainTry", post(handle_cross_chain_try))
        .route("/v1/CrossChainConfirm", post(handle_cross_chain_confirm))
        .route("/v1/CrossChainCancel", post(handle_cross_chain_cancel))
        .route("/v1/CrossChainEvent", post(handle_cross_chain_event))
        .route("/v1/TxVerify", post(handle_tx_verify))
        .route(
            "/v1/IsCrossChainSuccess",
            post(handle_is_cross_chain_success),
        )
        .route("/v1/PingPong", get(handle_ping_pong).post(handle_ping_pong))
        .route("/metrics", get(handle_metric_info))
        .layer(DefaultBodyLimit::max(rpc.max_request_size))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(axum::middleware::from_fn_with_state(
            blacklist,
            reject_blacklisted,
        ))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(handler))
}

/// The bound, not yet running, inbound server.
pub type GatewayServer = axum::Server<
    AddrIncoming,
    IntoMakeServiceWithConnectInfo<Router, SocketAddr>,
>;

/// Binds the inbound server to `0.0.0.0:{rpc.port}`.
pub fn bind(
    handler: TccHandler,
    rpc: &RpcConfig,
) -> tcc_gateway_utils::Result<GatewayServer> {
    let socket_addr = SocketAddr::new([0, 0, 0, 0].into(), rpc.port);
    let app = build_router(handler, rpc)
        .into_make_service_with_connect_info::<SocketAddr>();
    Ok(axum::Server::try_bind(&socket_addr)?.serve(app))
}

/// Serves `handler` until `shutdown` resolves, then stops accepting
/// connections and returns once the requests in flight are answered.
pub async fn serve<F>(
    handler: TccHandler,
    rpc: &RpcConfig,
    shutdown: F,
) -> tcc_gateway_utils::Result<()>
where
    F: Future<Output = ()>,
{
    let server = bind(handler, rpc)?;
    tracing::info!("Starting the server on {}", server.local_addr());
    server.with_graceful_shutdown(shutdown).await?;
    tracing::info!("Server stopped");
    Ok(())
}
