use crate::{
    call_frame::CallFrame,
    errors::{OpcodeSuccess, VMError},
    gas_cost,
    vm::{address_to_word, word_to_address, VM},
};
use ember_core::U256;
use keccak_hash::keccak;

// Environmental Information (16)
// Opcodes: ADDRESS, BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD,
// CALLDATASIZE, CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE, EXTCODESIZE,
// EXTCODECOPY, RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH

impl VM {
    // ADDRESS operation
    pub fn op_address(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::ADDRESS)?;
        current_call_frame
            .stack
            .push(address_to_word(current_call_frame.to))?;
        Ok(OpcodeSuccess::Continue)
    }

    // BALANCE operation
    pub fn op_balance(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let address = word_to_address(current_call_frame.stack.pop()?);
        let (account_info, address_was_cold) = self.access_account(address);

        self.increase_consumed_gas(
            current_call_frame,
            gas_cost::address_access_cost(
                address_was_cold,
                gas_cost::EXTERNAL_ACCOUNT_ACCESS_PRE_BERLIN,
                &self.spec,
            ),
        )?;

        current_call_frame.stack.push(account_info.balance)?;
        Ok(OpcodeSuccess::Continue)
    }

    // ORIGIN operation
    pub fn op_origin(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::ORIGIN)?;
        current_call_frame
            .stack
            .push(address_to_word(self.env.origin))?;
        Ok(OpcodeSuccess::Continue)
    }

    // CALLER operation
    pub fn op_caller(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CALLER)?;
        current_call_frame
            .stack
            .push(address_to_word(current_call_frame.msg_sender))?;
        Ok(OpcodeSuccess::Continue)
    }

    // CALLVALUE operation
    pub fn op_callvalue(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CALLVALUE)?;
        current_call_frame.stack.push(current_call_frame.msg_value)?;
        Ok(OpcodeSuccess::Continue)
    }

    // CALLDATALOAD operation
    pub fn op_calldataload(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CALLDATALOAD)?;

        let offset = current_call_frame.stack.pop()?;

        // reads past the end of calldata are zero
        let mut word = [0u8; 32];
        if let Ok(offset) = usize::try_from(offset) {
            for (word_byte, i) in word.iter_mut().zip(offset..) {
                let Some(calldata_byte) = current_call_frame.calldata.get(i) else {
                    break;
                };
                *word_byte = *calldata_byte;
            }
        }
        current_call_frame
            .stack
            .push(U256::from_big_endian(&word))?;

        Ok(OpcodeSuccess::Continue)
    }

    // CALLDATASIZE operation
    pub fn op_calldatasize(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CALLDATASIZE)?;
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.calldata.len()))?;
        Ok(OpcodeSuccess::Continue)
    }

    // CALLDATACOPY operation
    pub fn op_calldatacopy(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let dest_offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let calldata_offset = current_call_frame.stack.pop()?;
        let size: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let memory_expansion_cost = current_call_frame
            .memory
            .expansion_cost(dest_offset, size)?;
        let gas_cost = gas_cost::calldatacopy(size, memory_expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        if size == 0 {
            return Ok(OpcodeSuccess::Continue);
        }

        let data = copy_with_zero_fill(
            &current_call_frame.calldata,
            calldata_offset,
            size,
        );
        current_call_frame.memory.store_bytes(dest_offset, &data)?;

        Ok(OpcodeSuccess::Continue)
    }

    // CODESIZE operation
    pub fn op_codesize(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::CODESIZE)?;
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.bytecode.len()))?;
        Ok(OpcodeSuccess::Continue)
    }

    // CODECOPY operation
    pub fn op_codecopy(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let dest_offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let code_offset = current_call_frame.stack.pop()?;
        let size: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let memory_expansion_cost = current_call_frame
            .memory
            .expansion_cost(dest_offset, size)?;
        let gas_cost = gas_cost::codecopy(size, memory_expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        if size == 0 {
            return Ok(OpcodeSuccess::Continue);
        }

        let data = copy_with_zero_fill(&current_call_frame.bytecode, code_offset, size);
        current_call_frame.memory.store_bytes(dest_offset, &data)?;

        Ok(OpcodeSuccess::Continue)
    }

    // GASPRICE operation
    pub fn op_gasprice(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::GASPRICE)?;
        current_call_frame.stack.push(self.env.gas_price)?;
        Ok(OpcodeSuccess::Continue)
    }

    // EXTCODESIZE operation
    pub fn op_extcodesize(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let address = word_to_address(current_call_frame.stack.pop()?);
        let (account_info, address_was_cold) = self.access_account(address);

        self.increase_consumed_gas(
            current_call_frame,
            gas_cost::address_access_cost(
                address_was_cold,
                gas_cost::EXTERNAL_ACCOUNT_ACCESS_PRE_BERLIN,
                &self.spec,
            ),
        )?;

        current_call_frame
            .stack
            .push(U256::from(account_info.bytecode.len()))?;
        Ok(OpcodeSuccess::Continue)
    }

    // EXTCODECOPY operation
    pub fn op_extcodecopy(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let address = word_to_address(current_call_frame.stack.pop()?);
        let dest_offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let code_offset = current_call_frame.stack.pop()?;
        let size: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let (account_info, address_was_cold) = self.access_account(address);

        let memory_expansion_cost = current_call_frame
            .memory
            .expansion_cost(dest_offset, size)?;
        let gas_cost =
            gas_cost::extcodecopy(size, memory_expansion_cost, address_was_cold, &self.spec)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        if size == 0 {
            return Ok(OpcodeSuccess::Continue);
        }

        let data = copy_with_zero_fill(&account_info.bytecode, code_offset, size);
        current_call_frame.memory.store_bytes(dest_offset, &data)?;

        Ok(OpcodeSuccess::Continue)
    }

    // RETURNDATASIZE operation (EIP-211)
    pub fn op_returndatasize(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip211 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::RETURNDATASIZE)?;
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.sub_return_data.len()))?;
        Ok(OpcodeSuccess::Continue)
    }

    // RETURNDATACOPY operation (EIP-211)
    pub fn op_returndatacopy(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip211 {
            return Err(VMError::InvalidOpcode);
        }
        let dest_offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let returndata_offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let size: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let memory_expansion_cost = current_call_frame
            .memory
            .expansion_cost(dest_offset, size)?;
        let gas_cost = gas_cost::returndatacopy(size, memory_expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        // unlike the other copies, reading past the end of return data is a
        // hard failure
        let copy_end = returndata_offset
            .checked_add(size)
            .ok_or(VMError::VeryLargeNumber)?;
        if copy_end > current_call_frame.sub_return_data.len() {
            return Err(VMError::OutOfGas(
                crate::errors::OutOfGasError::MaxGasLimitExceeded,
            ));
        }

        if size == 0 {
            return Ok(OpcodeSuccess::Continue);
        }

        let data = current_call_frame
            .sub_return_data
            .get(returndata_offset..copy_end)
            .unwrap_or_default()
            .to_vec();
        current_call_frame.memory.store_bytes(dest_offset, &data)?;

        Ok(OpcodeSuccess::Continue)
    }

    // EXTCODEHASH operation (EIP-1052)
    pub fn op_extcodehash(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip1052 {
            return Err(VMError::InvalidOpcode);
        }
        let address = word_to_address(current_call_frame.stack.pop()?);
        let (account_info, address_was_cold) = self.access_account(address);

        self.increase_consumed_gas(
            current_call_frame,
            gas_cost::address_access_cost(
                address_was_cold,
                gas_cost::EXTERNAL_ACCOUNT_ACCESS_PRE_BERLIN,
                &self.spec,
            ),
        )?;

        // 0 for accounts that do not exist; the hash of the empty string for
        // accounts that exist but carry no code
        if account_info.is_empty() {
            current_call_frame.stack.push(U256::zero())?;
        } else {
            let hash = keccak(account_info.bytecode.as_ref());
            current_call_frame
                .stack
                .push(U256::from_big_endian(hash.as_bytes()))?;
        }

        Ok(OpcodeSuccess::Continue)
    }
}

/// Copies `size` bytes starting at `offset` from `source`, reading zeros
/// wherever the source has ended.
fn copy_with_zero_fill(source: &[u8], offset: U256, size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    if let Ok(offset) = usize::try_from(offset) {
        if offset < source.len() {
            let available = source.len().saturating_sub(offset);
            let to_copy = size.min(available);
            if let (Some(dest), Some(src)) = (
                data.get_mut(..to_copy),
                source.get(offset..offset.saturating_add(to_copy)),
            ) {
                dest.copy_from_slice(src);
            }
        }
    }
    data
}
