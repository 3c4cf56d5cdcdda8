use crate::{RawLog, ReceiptLog, TransactionReceipt, TxRequest};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, Filter, H256, U256, U64};
use relayer_core::error::RpcError;
use std::str::FromStr;
use std::sync::Arc;

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// `ChainRpc` over a single EVM JSON-RPC endpoint, signing with a locally held private key.
pub struct EvmChainRpc {
    client: Arc<SignerClient>,
}

impl EvmChainRpc {
    pub async fn connect(rpc_endpoint: &str, signing_key: &str, chain_id: u64) -> Result<EvmChainRpc, RpcError> {
        let provider = Provider::<Http>::try_from(rpc_endpoint)
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let wallet: LocalWallet = signing_key
            .parse::<LocalWallet>()
            .map_err(|e| RpcError::Transport(format!("invalid signing key: {e}")))?;
        let wallet = wallet.with_chain_id(chain_id);
        let client = SignerMiddleware::new(provider, wallet);
        tracing::info!(rpc_endpoint, chain_id, "connected to chain RPC endpoint");
        Ok(EvmChainRpc {
            client: Arc::new(client),
        })
    }
}

fn parse_address(raw: &str) -> Result<Address, RpcError> {
    Address::from_str(raw).map_err(|e| RpcError::Call {
        method: "parse_address".to_string(),
        reason: e.to_string(),
    })
}

fn parse_h256(raw: &str) -> Result<H256, RpcError> {
    H256::from_str(raw).map_err(|e| RpcError::Call {
        method: "parse_h256".to_string(),
        reason: e.to_string(),
    })
}

fn ethers_receipt_to_domain(r: ethers::types::TransactionReceipt) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: format!("{:#x}", r.transaction_hash),
        status_success: r.status.map(|s| s == U64::from(1)).unwrap_or(false),
        logs: r
            .logs
            .iter()
            .map(|l| ReceiptLog {
                log_index: l.log_index.map(|i| i.as_u64()).unwrap_or(0),
                transaction_hash: l
                    .transaction_hash
                    .map(|h| format!("{:#x}", h))
                    .unwrap_or_default(),
                topics: l.topics.iter().map(|t| format!("{:#x}", t)).collect(),
            })
            .collect(),
    }
}

#[async_trait]
impl crate::ChainRpc for EvmChainRpc {
    async fn get_head_block(&self) -> Result<u64, RpcError> {
        self.client
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| RpcError::Call {
                method: "eth_blockNumber".to_string(),
                reason: e.to_string(),
            })
    }

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: &str,
        topic0: &str,
    ) -> Result<Vec<RawLog>, RpcError> {
        let filter = Filter::new()
            .address(parse_address(address)?)
            .topic0(parse_h256(topic0)?)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.client.get_logs(&filter).await.map_err(|e| RpcError::Call {
            method: "eth_getLogs".to_string(),
            reason: e.to_string(),
        })?;

        Ok(logs
            .into_iter()
            .enumerate()
            .map(|(i, l)| RawLog {
                address: format!("{:#x}", l.address),
                topics: l.topics.iter().map(|t| format!("{:#x}", t)).collect(),
                data: l.data.to_vec(),
                block_number: l.block_number.map(|b| b.as_u64()).unwrap_or(0),
                transaction_hash: l
                    .transaction_hash
                    .map(|h| format!("{:#x}", h))
                    .unwrap_or_default(),
                transaction_index: l.transaction_index.map(|i| i.as_u64()).unwrap_or(0),
                log_index_in_filter: i as u64,
            })
            .collect())
    }

    async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, RpcError> {
        let hash = parse_h256(tx_hash)?;
        let receipt = self
            .client
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| RpcError::Call {
                method: "eth_getTransactionReceipt".to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| RpcError::ReceiptNotFound(tx_hash.to_string()))?;
        Ok(ethers_receipt_to_domain(receipt))
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, RpcError> {
        let eth_tx = to_eip1559(tx)?;
        let typed = ethers::types::transaction::eip2718::TypedTransaction::Eip1559(eth_tx);
        self.client
            .estimate_gas(&typed, None)
            .await
            .map(|g| g.as_u64())
            .map_err(|e| RpcError::Call {
                method: "eth_estimateGas".to_string(),
                reason: e.to_string(),
            })
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<String, RpcError> {
        let eth_tx = to_eip1559(&tx)?;
        let pending = self
            .client
            .send_transaction(eth_tx, None)
            .await
            .map_err(|e| RpcError::Call {
                method: "eth_sendRawTransaction".to_string(),
                reason: e.to_string(),
            })?;
        let tx_hash = format!("{:#x}", pending.tx_hash());
        tracing::debug!(tx_hash, "submitted destination transaction");
        Ok(tx_hash)
    }

    async fn wait_for_confirmations(
        &self,
        tx_hash: &str,
        confirmations: u64,
    ) -> Result<TransactionReceipt, RpcError> {
        let hash = parse_h256(tx_hash)?;
        let receipt = self
            .client
            .provider()
            .pending_transaction(hash)
            .confirmations(confirmations.max(1) as usize)
            .await
            .map_err(|e| RpcError::Call {
                method: "wait_for_confirmations".to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| RpcError::ReceiptNotFound(tx_hash.to_string()))?;
        Ok(ethers_receipt_to_domain(receipt))
    }
}

fn to_eip1559(tx: &TxRequest) -> Result<Eip1559TransactionRequest, RpcError> {
    let mut req = Eip1559TransactionRequest::new()
        .to(parse_address(&tx.to)?)
        .data(Bytes::from(tx.data.clone()));
    if let Some(gas) = tx.gas_limit {
        req = req.gas(U256::from(gas));
    }
    if let Some(fee) = tx.max_fee_per_gas {
        req = req.max_fee_per_gas(U256::from(fee));
    }
    if let Some(tip) = tx.max_priority_fee_per_gas {
        req = req.max_priority_fee_per_gas(U256::from(tip));
    }
    Ok(req)
}
