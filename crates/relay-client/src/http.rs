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

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tcc_gateway_config::RelayConfig;
use tcc_gateway_types::{
    BeginCrossChainResponse, CrossChainRequest, SyncBlockHeaderRequest,
    SyncBlockHeaderResponse,
};
use tcc_gateway_utils::{Error, Result};

use crate::RelayClient;

/// Header carrying the access code of this gateway.
pub const ACCESS_TOKEN_HEADER: &str = "x-token";
/// Relay endpoint receiving cross-chain requests.
pub const BEGIN_CROSS_CHAIN_PATH: &str = "v1/BeginCrossChain";
/// Relay endpoint receiving block headers.
pub const SYNC_BLOCK_HEADER_PATH: &str = "v1/SyncBlockHeader";

/// A [`RelayClient`] posting JSON to the relay over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    client: reqwest::Client,
    begin_cross_chain_url: url::Url,
    sync_block_header_url: url::Url,
    access_code: String,
}

impl HttpRelayClient {
    /// Builds the client, reading the TLS material named in `config`.
    ///
    /// Every call is bounded by `timeout`.
    pub fn new(config: &RelayConfig, timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout);
        if let Some(ca) = &config.tls_ca {
            let pem = std::fs::read(ca)?;
            builder =
                builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }
        match (&config.client_cert, &config.client_key) {
            (Some(cert), Some(key)) => {
                // rustls wants the certificate chain and the key in one PEM.
                let mut pem = std::fs::read(cert)?;
                pem.push(b'\n');
                pem.extend(std::fs::read(key)?);
                builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
            }
            (None, None) => {}
            _ => {
                return Err(Error::MissingSecrets(
                    "relay client-cert and client-key must be set together"
                        .into(),
                ))
            }
        }
        Ok(Self {
            client: builder.build()?,
            begin_cross_chain_url: config
                .address
                .join_path(BEGIN_CROSS_CHAIN_PATH)?,
            sync_block_header_url: config
                .address
                .join_path(SYNC_BLOCK_HEADER_PATH)?,
            access_code: config.access_code.clone(),
        })
    }

    async fn post<Req, Res>(&self, url: &url::Url, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let response = self
            .client
            .post(url.clone())
            .header(ACCESS_TOKEN_HEADER, &self.access_code)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl RelayClient for HttpRelayClient {
    #[tracing::instrument(skip_all, fields(from = %request.from))]
    async fn begin_cross_chain(
        &self,
        request: &CrossChainRequest,
    ) -> Result<BeginCrossChainResponse> {
        self.post(&self.begin_cross_chain_url, request).await
    }

    #[tracing::instrument(
        skip_all,
        fields(chain_rid = %request.chain_rid, height = request.block_height),
    )]
    async fn sync_block_header(
        &self,
        request: &SyncBlockHeaderRequest,
    ) -> Result<SyncBlockHeaderResponse> {
        self.post(&self.sync_block_header_url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay_config(address: &str) -> RelayConfig {
        let value = serde_json::json!({ "address": address });
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn endpoints_keep_the_base_path() {
        let config = relay_config("https://relay.example.com/gateway/");
        let client =
            HttpRelayClient::new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.begin_cross_chain_url.as_str(),
            "https://relay.example.com/gateway/v1/BeginCrossChain"
        );
        assert_eq!(
            client.sync_block_header_url.as_str(),
            "https://relay.example.com/gateway/v1/SyncBlockHeader"
        );
    }

    #[test]
    fn half_configured_client_identity_is_rejected() {
        let mut config = relay_config("https://relay.example.com");
        config.client_cert = Some("cert.pem".into());
        assert!(matches!(
            HttpRelayClient::new(&config, Duration::from_secs(1)),
            Err(Error::MissingSecrets(_))
        ));
    }
}
