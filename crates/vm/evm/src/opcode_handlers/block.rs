use crate::{
    call_frame::CallFrame,
    constants::{BLOB_BASE_FEE_UPDATE_FRACTION, LAST_AVAILABLE_BLOCK_LIMIT, MIN_BASE_FEE_PER_BLOB_GAS},
    errors::{OpcodeSuccess, VMError},
    gas_cost,
    vm::{address_to_word, VM},
};
use ember_core::{H256, U256};

// Block Information (11)
// Opcodes: BLOCKHASH, COINBASE, TIMESTAMP, NUMBER, PREVRANDAO, GASLIMIT,
// CHAINID, SELFBALANCE, BASEFEE, BLOBHASH, BLOBBASEFEE

impl VM {
    // BLOCKHASH operation
    pub fn op_blockhash(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::BLOCKHASH)?;

        let block_number = current_call_frame.stack.pop()?;

        // Only the last 256 ancestors (not the current block) are visible.
        let lower_bound = self
            .env
            .block_number
            .saturating_sub(U256::from(LAST_AVAILABLE_BLOCK_LIMIT));
        if block_number >= self.env.block_number || block_number < lower_bound {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let block_number = block_number.low_u64();
        match self.db.get_block_hash(block_number) {
            Some(block_hash) => current_call_frame
                .stack
                .push(U256::from_big_endian(block_hash.as_bytes()))?,
            None => current_call_frame.stack.push(U256::zero())?,
        };

        Ok(OpcodeSuccess::Continue)
    }

    // COINBASE operation
    pub fn op_coinbase(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::COINBASE)?;
        current_call_frame
            .stack
            .push(address_to_word(self.env.coinbase))?;
        Ok(OpcodeSuccess::Continue)
    }

    // TIMESTAMP operation
    pub fn op_timestamp(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::TIMESTAMP)?;
        current_call_frame.stack.push(self.env.timestamp)?;
        Ok(OpcodeSuccess::Continue)
    }

    // NUMBER operation
    pub fn op_number(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::NUMBER)?;
        current_call_frame.stack.push(self.env.block_number)?;
        Ok(OpcodeSuccess::Continue)
    }

    // PREVRANDAO operation (DIFFICULTY before the merge)
    pub fn op_prevrandao(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::PREVRANDAO)?;
        let randao = self.env.prev_randao.unwrap_or(H256::zero());
        current_call_frame
            .stack
            .push(U256::from_big_endian(randao.as_bytes()))?;
        Ok(OpcodeSuccess::Continue)
    }

    // GASLIMIT operation
    pub fn op_gaslimit(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::GASLIMIT)?;
        current_call_frame
            .stack
            .push(U256::from(self.env.block_gas_limit))?;
        Ok(OpcodeSuccess::Continue)
    }

    // CHAINID operation (EIP-1344)
    pub fn op_chainid(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip1344 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::CHAINID)?;
        current_call_frame.stack.push(self.env.chain_id)?;
        Ok(OpcodeSuccess::Continue)
    }

    // SELFBALANCE operation (EIP-1884)
    pub fn op_selfbalance(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip1884 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::SELFBALANCE)?;
        let balance = self.get_account(current_call_frame.to).info.balance;
        current_call_frame.stack.push(balance)?;
        Ok(OpcodeSuccess::Continue)
    }

    // BASEFEE operation (EIP-3198)
    pub fn op_basefee(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip3198 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::BASEFEE)?;
        current_call_frame.stack.push(self.env.base_fee_per_gas)?;
        Ok(OpcodeSuccess::Continue)
    }

    // BLOBHASH operation (EIP-4844)
    pub fn op_blobhash(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip4844 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::BLOBHASH)?;

        let index = current_call_frame.stack.pop()?;
        let blob_hash = usize::try_from(index)
            .ok()
            .and_then(|index| self.env.tx_blob_hashes.get(index));
        match blob_hash {
            Some(blob_hash) => current_call_frame
                .stack
                .push(U256::from_big_endian(blob_hash.as_bytes()))?,
            None => current_call_frame.stack.push(U256::zero())?,
        }

        Ok(OpcodeSuccess::Continue)
    }

    // BLOBBASEFEE operation (EIP-7516)
    pub fn op_blobbasefee(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip7516 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::BLOBBASEFEE)?;
        let blob_base_fee = gas_cost::fake_exponential(
            MIN_BASE_FEE_PER_BLOB_GAS,
            self.env.block_excess_blob_gas.unwrap_or_default(),
            BLOB_BASE_FEE_UPDATE_FRACTION,
        )?;
        current_call_frame.stack.push(blob_base_fee)?;
        Ok(OpcodeSuccess::Continue)
    }
}
