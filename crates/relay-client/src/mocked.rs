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

//! A relay network living in memory, scripted by tests.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tcc_gateway_types::{
    BeginCrossChainResponse, Code, CrossChainRequest, SyncBlockHeaderRequest,
    SyncBlockHeaderResponse,
};
use tcc_gateway_utils::{Error, Result};

use crate::RelayClient;

/// The scripted outcome of one call: a response code, or a transport error.
pub type Scripted = std::result::Result<Code, String>;

/// A [`RelayClient`] answering from scripts, success once a script runs dry.
///
/// Every call is recorded, failed attempts included.
#[derive(Debug, Default)]
pub struct MockedRelayClient {
    begin_cross_chain_script: Mutex<VecDeque<Scripted>>,
    sync_block_header_script: Mutex<VecDeque<Scripted>>,
    begin_cross_chain_requests: Mutex<Vec<CrossChainRequest>>,
    sync_block_header_requests: Mutex<Vec<SyncBlockHeaderRequest>>,
}

impl MockedRelayClient {
    /// Queues the outcome of the next `BeginCrossChain`.
    pub fn push_begin_cross_chain(&self, outcome: Scripted) {
        self.begin_cross_chain_script.lock().push_back(outcome);
    }

    /// Queues the outcome of the next `SyncBlockHeader`.
    pub fn push_sync_block_header(&self, outcome: Scripted) {
        self.sync_block_header_script.lock().push_back(outcome);
    }

    /// How many `BeginCrossChain` calls were made.
    pub fn begin_cross_chain_calls(&self) -> usize {
        self.begin_cross_chain_requests.lock().len()
    }

    /// Every `BeginCrossChain` request received.
    pub fn begin_cross_chain_requests(&self) -> Vec<CrossChainRequest> {
        self.begin_cross_chain_requests.lock().clone()
    }

    /// Every `SyncBlockHeader` request received.
    pub fn sync_block_header_requests(&self) -> Vec<SyncBlockHeaderRequest> {
        self.sync_block_header_requests.lock().clone()
    }
}

fn play(script: &Mutex<VecDeque<Scripted>>) -> Result<Code> {
    match script.lock().pop_front() {
        None => Ok(Code::GatewaySuccess),
        Some(Ok(code)) => Ok(code),
        Some(Err(reason)) => Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            reason,
        ))),
    }
}

#[async_trait::async_trait]
impl RelayClient for MockedRelayClient {
    async fn begin_cross_chain(
        &self,
        request: &CrossChainRequest,
    ) -> Result<BeginCrossChainResponse> {
        let index = {
            let mut requests = self.begin_cross_chain_requests.lock();
            requests.push(request.clone());
            requests.len()
        };
        let code = play(&self.begin_cross_chain_script)?;
        Ok(BeginCrossChainResponse {
            code: code as i32,
            message: code.as_str_name().to_owned(),
            cross_chain_id: format!("mock-{index}"),
        })
    }

    async fn sync_block_header(
        &self,
        request: &SyncBlockHeaderRequest,
    ) -> Result<SyncBlockHeaderResponse> {
        self.sync_block_header_requests.lock().push(request.clone());
        let code = play(&self.sync_block_header_script)?;
        Ok(SyncBlockHeaderResponse {
            code: code as i32,
            message: code.as_str_name().to_owned(),
        })
    }
}
