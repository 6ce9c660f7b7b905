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

use std::any::Any;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use tcc_gateway_types::Code;

/// Peers refused service by the inbound server.
pub type Blacklist = Arc<HashSet<IpAddr>>;

/// Rejects requests coming from a blacklisted peer with `403`.
pub async fn reject_blacklisted<B>(
    State(blacklist): State<Blacklist>,
    req: Request<B>,
    next: Next<B>,
) -> axum::response::Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    match peer {
        Some(ip) if blacklist.contains(&ip) => {
            tracing::warn!(%ip, "Rejected blacklisted peer");
            (
                StatusCode::FORBIDDEN,
                format!("{ip} is not allowed to call this gateway"),
            )
                .into_response()
        }
        _ => next.run(req).await,
    }
}

/// Turns a panic inside a route into an `INTERNAL_ERROR` reply.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<String> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(%detail, "Inbound handler panicked");
    let body = serde_json::json!({
        "code": Code::InternalError as i32,
        "message": format!("internal error: {detail}"),
    });
    let mut res = Response::new(body.to_string());
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    res
}
