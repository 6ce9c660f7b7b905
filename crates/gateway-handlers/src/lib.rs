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

//! The gateway's server side: the Try/Confirm/Cancel calls made by the relay
//! network, the event registry they proxy to, and the HTTP routes serving
//! them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

mod handler;
mod registry;
mod template;

pub mod routes;

pub use handler::{TccHandler, TccResponse};
pub use registry::{
    EventRegistry, DELETE_CROSS_CHAIN_METHOD, NEW_CROSS_CHAIN_METHOD,
    QUERY_CROSS_CHAIN_METHOD,
};
pub use template::fill_try_result;

/// Error type for HTTP handlers
pub struct HandlerError(
    /// HTTP status code for response
    pub StatusCode,
    /// Response message
    pub String,
);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

impl From<tcc_gateway_utils::Error> for HandlerError {
    fn from(value: tcc_gateway_utils::Error) -> Self {
        HandlerError(StatusCode::INTERNAL_SERVER_ERROR, value.to_string())
    }
}
