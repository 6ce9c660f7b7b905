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

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ethers::abi::token::{LenientTokenizer, Tokenizer};
use ethers::abi::{Abi, Function, StateMutability, Token};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Filter, TransactionRequest, H256};
use futures::TryFutureExt;
use tcc_gateway_config::ChainConfig;
use tcc_gateway_utils::{probe, Error, Result};
use tokio::sync::mpsc;

use crate::{
    Block, ChainAdapter, ContractCall, ContractLog, InvokeOutput, LogFilter,
    TransactionDetail,
};

/// Ethereum client using Ethers.
pub type EthersClient = Provider<Http>;
/// Ethereum client able to sign and send transactions.
pub type EthersSignerClient = SignerMiddleware<Arc<EthersClient>, LocalWallet>;

/// A [`ChainAdapter`] for EVM chains.
pub struct EvmChainAdapter {
    chain_rid: String,
    provider: Arc<EthersClient>,
    signer: EthersSignerClient,
    polling_interval: Duration,
    max_blocks_per_step: u64,
}

impl std::fmt::Debug for EvmChainAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmChainAdapter")
            .field("chain_rid", &self.chain_rid)
            .finish()
    }
}

impl EvmChainAdapter {
    /// Creates the adapter for one configured chain.
    pub fn new(config: &ChainConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.http_endpoint.as_str())?
            .interval(config.polling_interval());
        let key = config.private_key.as_ref().ok_or_else(|| {
            Error::MissingSecrets(format!("private-key of {}", config.chain_rid))
        })?;
        let wallet =
            LocalWallet::from_bytes(key.as_bytes())?.with_chain_id(config.chain_id);
        let provider = Arc::new(provider);
        let signer = SignerMiddleware::new(provider.clone(), wallet);
        Ok(Self {
            chain_rid: config.chain_rid.clone(),
            provider,
            signer,
            polling_interval: config.polling_interval(),
            max_blocks_per_step: config.max_blocks_per_step.max(1),
        })
    }
}

/// Turns the protocol's JSON argument list into ABI tokens for `function`.
///
/// `""` and `"{}"` mean "no arguments". Otherwise the parameter must be a
/// JSON array; strings are taken verbatim, other values by their JSON text.
pub fn tokenize_args(function: &Function, parameter: &str) -> Result<Vec<Token>> {
    let parameter = parameter.trim();
    let args: Vec<serde_json::Value> = match parameter {
        "" | "{}" => Vec::new(),
        _ => serde_json::from_str(parameter)?,
    };
    if args.len() != function.inputs.len() {
        return Err(Error::ContractInvocation(format!(
            "{} expects {} arguments, got {}",
            function.name,
            function.inputs.len(),
            args.len()
        )));
    }
    function
        .inputs
        .iter()
        .zip(args)
        .map(|(input, arg)| {
            let raw = match arg {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            LenientTokenizer::tokenize(&input.kind, &raw).map_err(Into::into)
        })
        .collect()
}

/// Renders a decoded return value the way the relay expects it.
pub fn token_to_string(token: Token) -> String {
    match token {
        Token::String(s) => s,
        Token::Bytes(b) | Token::FixedBytes(b) => {
            format!("0x{}", hex::encode(b))
        }
        Token::Uint(v) | Token::Int(v) => v.to_string(),
        Token::Address(a) => format!("{a:?}"),
        Token::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    Address::from_str(raw).map_err(|_| {
        Error::ContractInvocation(format!("invalid contract address {raw}"))
    })
}

fn parse_hash(raw: &str) -> Result<H256> {
    H256::from_str(raw)
        .map_err(|_| Error::TransactionNotFound(raw.to_owned()))
}

#[async_trait::async_trait]
impl ChainAdapter for EvmChainAdapter {
    fn chain_rid(&self) -> &str {
        &self.chain_rid
    }

    #[tracing::instrument(
        skip_all,
        fields(chain_rid = %self.chain_rid, contract = %call.contract_name, method = %call.method),
    )]
    async fn invoke_contract(
        &self,
        call: &ContractCall,
        need_tx: bool,
    ) -> Result<InvokeOutput> {
        let abi: Abi = serde_json::from_str(&call.abi)?;
        let function = abi.function(&call.method)?;
        let tokens = tokenize_args(function, &call.parameter)?;
        let data = function.encode_input(&tokens)?;
        let to = parse_address(&call.contract_name)?;
        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.signer.address())
            .to(to)
            .data(data)
            .into();
        // return values are only observable through eth_call, receipts do not carry them.
        let raw = self
            .signer
            .call(&tx, None)
            .await
            .map_err(|e| Error::ContractInvocation(e.to_string()))?;
        let return_values = function
            .decode_output(raw.as_ref())?
            .into_iter()
            .map(token_to_string)
            .collect::<Vec<_>>();
        let read_only = matches!(
            function.state_mutability,
            StateMutability::View | StateMutability::Pure
        );
        if read_only {
            tracing::trace!(?return_values, "contract queried");
            return Ok(InvokeOutput {
                return_values,
                tx: None,
            });
        }

        let pending = self
            .signer
            .send_transaction(tx, None)
            .await
            .map_err(|e| Error::ContractInvocation(e.to_string()))?;
        let receipt = pending.await?.ok_or_else(|| {
            Error::ContractInvocation("transaction dropped from mempool".into())
        })?;
        if receipt.status != Some(1u64.into()) {
            return Err(Error::ContractInvocation(format!(
                "transaction {:?} reverted",
                receipt.transaction_hash
            )));
        }
        tracing::debug!(
            tx = ?receipt.transaction_hash,
            block = ?receipt.block_number,
            "contract invoked",
        );
        let tx = if need_tx {
            let tx_id = format!("{:?}", receipt.transaction_hash);
            Some(self.get_tx_by_hash(&tx_id).await?)
        } else {
            None
        };
        Ok(InvokeOutput { return_values, tx })
    }

    async fn get_height(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    async fn get_block_by_height(&self, height: u64) -> Result<Block> {
        let block = self
            .provider
            .get_block(height)
            .await?
            .ok_or(Error::BlockNotFound(height))?;
        Ok(Block {
            number: block.number.map(|n| n.as_u64()).unwrap_or(height),
            hash: format!("{:?}", block.hash.unwrap_or_default()),
            parent_hash: format!("{:?}", block.parent_hash),
            timestamp: block.timestamp.as_u64(),
            transactions: block
                .transactions
                .iter()
                .map(|h| format!("{h:?}"))
                .collect(),
        })
    }

    async fn get_tx_by_hash(&self, tx_id: &str) -> Result<TransactionDetail> {
        let hash = parse_hash(tx_id)?;
        let tx = self
            .provider
            .get_transaction(hash)
            .await?
            .ok_or_else(|| Error::TransactionNotFound(tx_id.to_owned()))?;
        Ok(TransactionDetail {
            tx_id: format!("{:?}", tx.hash),
            tx_bytes: tx.rlp().to_vec(),
            block_height: tx.block_number.map(|n| n.as_u64()).unwrap_or_default(),
            block_hash: tx
                .block_hash
                .map(|h| format!("{h:?}"))
                .unwrap_or_default(),
        })
    }

    #[tracing::instrument(
        skip_all,
        fields(chain_rid = %self.chain_rid, contract = %filter.contract),
    )]
    async fn subscribe_events(
        &self,
        filter: LogFilter,
        sink: mpsc::Sender<ContractLog>,
    ) -> Result<()> {
        let address = parse_address(&filter.contract)?;
        let topic = H256::from_str(&filter.topic)
            .map_err(|_| Error::Generic("invalid event topic"))?;
        let step = self.max_blocks_per_step;
        // survives restarts of the polling task below.
        let next_block = AtomicU64::new(filter.from_height);
        let backoff = backoff::backoff::Constant::new(Duration::from_secs(1));
        let task = || async {
            loop {
                let target_block_number = self
                    .provider
                    .get_block_number()
                    .map_err(Into::into)
                    .map_err(backoff::Error::transient)
                    .await?
                    .as_u64();
                let from = next_block.load(Ordering::SeqCst);
                if from > target_block_number {
                    tokio::time::sleep(self.polling_interval).await;
                    continue;
                }
                let dest_block =
                    core::cmp::min(from + step - 1, target_block_number);
                let query = Filter::new()
                    .address(address)
                    .topic0(topic)
                    .from_block(from)
                    .to_block(dest_block);
                let logs = self
                    .provider
                    .get_logs(&query)
                    .map_err(Into::into)
                    .map_err(backoff::Error::transient)
                    .await?;
                tracing::trace!("Found #{} logs", logs.len());
                for log in logs {
                    let item = ContractLog {
                        contract: filter.contract.clone(),
                        topic: filter.topic.clone(),
                        tx_id: log
                            .transaction_hash
                            .map(|h| format!("{h:?}"))
                            .unwrap_or_default(),
                        block_height: log
                            .block_number
                            .map(|n| n.as_u64())
                            .unwrap_or(dest_block),
                        data: log.data.to_vec(),
                    };
                    if sink.send(item).await.is_err() {
                        tracing::debug!("log consumer is gone, unsubscribing");
                        return Ok::<(), backoff::Error<Error>>(());
                    }
                }
                next_block.store(dest_block + 1, Ordering::SeqCst);
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::TRACE,
                    kind = %probe::Kind::Watcher,
                    chain_rid = %self.chain_rid,
                    %from,
                    %dest_block,
                );
                if dest_block == target_block_number {
                    tokio::time::sleep(self.polling_interval).await;
                }
            }
        };
        backoff::future::retry(backoff, task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABI: &str = r#"[{
        "type": "function",
        "name": "confirm",
        "inputs": [
            { "name": "id", "type": "string" },
            { "name": "amount", "type": "uint256" }
        ],
        "outputs": [],
        "stateMutability": "nonpayable"
    }, {
        "type": "function",
        "name": "ping",
        "inputs": [],
        "outputs": [{ "name": "", "type": "bool" }],
        "stateMutability": "view"
    }]"#;

    fn function(name: &str) -> Function {
        let abi: Abi = serde_json::from_str(ABI).unwrap();
        abi.function(name).unwrap().clone()
    }

    #[test]
    fn empty_object_means_no_arguments() {
        assert!(tokenize_args(&function("ping"), "{}").unwrap().is_empty());
        assert!(tokenize_args(&function("ping"), "").unwrap().is_empty());
    }

    #[test]
    fn json_arguments_are_tokenized_leniently() {
        let tokens =
            tokenize_args(&function("confirm"), r#"["abc", 42]"#).unwrap();
        assert_eq!(
            tokens,
            vec![Token::String("abc".into()), Token::Uint(42u64.into())]
        );
    }

    #[test]
    fn argument_count_must_match() {
        let err = tokenize_args(&function("confirm"), r#"["abc"]"#);
        assert!(matches!(err, Err(Error::ContractInvocation(_))));
    }

    #[test]
    fn tokens_are_rendered_for_the_relay() {
        assert_eq!(token_to_string(Token::String("x".into())), "x");
        assert_eq!(token_to_string(Token::Uint(7u64.into())), "7");
        assert_eq!(token_to_string(Token::Bool(true)), "true");
        assert_eq!(token_to_string(Token::Bytes(vec![0xab])), "0xab");
    }
}
