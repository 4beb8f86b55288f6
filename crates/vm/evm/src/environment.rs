use crate::fork::Fork;
use ember_core::{Address, H256, U256};

/// Block and transaction context handed in by the host. Together with the
/// active fork (and any chain EIP overrides) this fully parameterizes one
/// transaction's execution.
#[derive(Debug, Default, Clone)]
pub struct Environment {
    /// The sender address of the transaction that originated
    /// this execution.
    pub origin: Address,
    /// Gas refunded so far by SSTORE (and pre-London SELFDESTRUCT).
    pub refunded_gas: u64,
    /// Transaction gas limit.
    pub gas_limit: u64,
    /// Active protocol version.
    pub fork: Fork,
    /// Chain-specific EIP forcing, applied after flag derivation.
    pub eip_overrides: Vec<(u64, bool)>,
    pub block_number: U256,
    pub coinbase: Address,
    pub timestamp: U256,
    pub prev_randao: Option<H256>,
    pub chain_id: U256,
    pub base_fee_per_gas: U256,
    /// Effective gas price of this transaction.
    pub gas_price: U256,
    pub block_gas_limit: u64,
    /// Parent beacon block root, present Cancun onwards.
    pub beacon_root: Option<H256>,
    pub block_excess_blob_gas: Option<U256>,
    pub block_blob_gas_used: Option<U256>,
    pub tx_blob_hashes: Vec<H256>,
    pub tx_max_priority_fee_per_gas: Option<U256>,
    pub tx_max_fee_per_gas: Option<U256>,
    pub tx_max_fee_per_blob_gas: Option<U256>,
}

impl Environment {
    pub fn default_from_address(origin: Address) -> Self {
        Self {
            origin,
            refunded_gas: 0,
            gas_limit: u64::MAX,
            fork: Fork::default(),
            eip_overrides: Vec::new(),
            block_number: Default::default(),
            coinbase: Default::default(),
            timestamp: Default::default(),
            prev_randao: Default::default(),
            chain_id: U256::one(),
            base_fee_per_gas: Default::default(),
            gas_price: Default::default(),
            block_gas_limit: u64::MAX,
            beacon_root: Default::default(),
            block_excess_blob_gas: Default::default(),
            block_blob_gas_used: Default::default(),
            tx_blob_hashes: Default::default(),
            tx_max_priority_fee_per_gas: Default::default(),
            tx_max_fee_per_gas: Default::default(),
            tx_max_fee_per_blob_gas: Default::default(),
        }
    }
}
