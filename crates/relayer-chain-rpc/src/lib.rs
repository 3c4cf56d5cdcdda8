#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! The `ChainRpc` capability trait and its EVM implementation over `ethers`.
//!
//! The listener, executor, and queue all depend on this trait rather than on `ethers` types
//! directly, which is what lets the queue reach back into a chain's provider (to translate a
//! filter-local log index into a receipt's global log index) without creating a dependency
//! cycle with the listener that owns it.

pub mod abi;
mod evm;

use async_trait::async_trait;
use relayer_core::error::RpcError;

/// A single decoded-enough log entry returned by a range query. ABI decoding into a
/// `DecodedEvent` happens one layer up, in the listener, which knows the event schema.
#[derive(Debug, Clone)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub transaction_hash: String,
    pub transaction_index: u64,
    /// The log's position within the filter result set, not within the transaction receipt.
    pub log_index_in_filter: u64,
}

/// The subset of a transaction receipt the relayer needs: status and the absolute position of
/// each log within the receipt's full log list.
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub status_success: bool,
    pub logs: Vec<ReceiptLog>,
}

#[derive(Debug, Clone)]
pub struct ReceiptLog {
    pub log_index: u64,
    pub transaction_hash: String,
    pub topics: Vec<String>,
}

/// A destination-chain call ready to be gas-estimated and submitted.
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub to: String,
    pub data: Vec<u8>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Capability a chain must expose for the listener, executor, and queue to operate on it.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_head_block(&self) -> Result<u64, RpcError>;

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: &str,
        topic0: &str,
    ) -> Result<Vec<RawLog>, RpcError>;

    async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<TransactionReceipt, RpcError>;

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, RpcError>;

    /// Signs and submits `tx`, returning the resulting transaction hash.
    async fn send_transaction(&self, tx: TxRequest) -> Result<String, RpcError>;

    /// Polls until `confirmations` confirmations have accrued on `tx_hash`, then returns its
    /// final receipt.
    async fn wait_for_confirmations(
        &self,
        tx_hash: &str,
        confirmations: u64,
    ) -> Result<TransactionReceipt, RpcError>;
}

pub use evm::EvmChainRpc;
