use crate::{
    call_frame::CallFrame,
    constants::WORD_SIZE,
    errors::{OpcodeSuccess, OutOfGasError, VMError},
    gas_cost,
    vm::VM,
};
use ember_core::{H256, U256};

// Stack, Memory, Storage and Flow Operations (15)
// Opcodes: POP, MLOAD, MSTORE, MSTORE8, SLOAD, SSTORE, JUMP, JUMPI, PC,
// MSIZE, GAS, JUMPDEST, TLOAD, TSTORE, MCOPY

impl VM {
    // POP operation
    pub fn op_pop(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::POP)?;
        current_call_frame.stack.pop()?;
        Ok(OpcodeSuccess::Continue)
    }

    // MLOAD operation
    pub fn op_mload(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let memory_expansion_cost = current_call_frame
            .memory
            .expansion_cost(offset, WORD_SIZE)?;
        let gas_cost = gas_cost::MLOAD_STATIC
            .checked_add(memory_expansion_cost)
            .ok_or(OutOfGasError::GasCostOverflow)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let value = current_call_frame.memory.load(offset)?;
        current_call_frame.stack.push(value)?;

        Ok(OpcodeSuccess::Continue)
    }

    // MSTORE operation
    pub fn op_mstore(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let memory_expansion_cost = current_call_frame
            .memory
            .expansion_cost(offset, WORD_SIZE)?;
        let gas_cost = gas_cost::MSTORE_STATIC
            .checked_add(memory_expansion_cost)
            .ok_or(OutOfGasError::GasCostOverflow)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let value = current_call_frame.stack.pop()?;
        let mut value_bytes = [0u8; WORD_SIZE];
        value.to_big_endian(&mut value_bytes);

        current_call_frame.memory.store_bytes(offset, &value_bytes)?;

        Ok(OpcodeSuccess::Continue)
    }

    // MSTORE8 operation
    pub fn op_mstore8(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let memory_expansion_cost = current_call_frame.memory.expansion_cost(offset, 1)?;
        let gas_cost = gas_cost::MSTORE8_STATIC
            .checked_add(memory_expansion_cost)
            .ok_or(OutOfGasError::GasCostOverflow)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let value = current_call_frame.stack.pop()?;
        current_call_frame
            .memory
            .store_bytes(offset, &[value.byte(0)])?;

        Ok(OpcodeSuccess::Continue)
    }

    // SLOAD operation
    pub fn op_sload(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let key = current_call_frame.stack.pop()?;

        let mut key_bytes = [0u8; WORD_SIZE];
        key.to_big_endian(&mut key_bytes);
        let key = H256::from(key_bytes);

        let address = current_call_frame.to;
        let (storage_slot, slot_was_cold) = self.access_storage_slot(address, key)?;

        self.increase_consumed_gas(
            current_call_frame,
            gas_cost::sload(slot_was_cold, &self.spec),
        )?;

        current_call_frame.stack.push(storage_slot.current_value)?;
        Ok(OpcodeSuccess::Continue)
    }

    // SSTORE operation
    pub fn op_sstore(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }

        let key = current_call_frame.stack.pop()?;
        let new_value = current_call_frame.stack.pop()?;

        // EIP-2200 sentry: leave room for the stipend so reentrancy locks
        // cannot be starved into inconsistency.
        if self.spec.eip2200 && current_call_frame.gas_remaining() <= gas_cost::SSTORE_SENTRY {
            return Err(VMError::OutOfGas(OutOfGasError::MaxGasLimitExceeded));
        }

        let mut key_bytes = [0u8; WORD_SIZE];
        key.to_big_endian(&mut key_bytes);
        let key = H256::from(key_bytes);

        let address = current_call_frame.to;
        let (storage_slot, slot_was_cold) = self.access_storage_slot(address, key)?;

        let (gas_cost, refund) =
            gas_cost::sstore(&storage_slot, new_value, slot_was_cold, &self.spec)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        self.env.refunded_gas = self
            .env
            .refunded_gas
            .checked_add(refund.added)
            .ok_or(OutOfGasError::ConsumedGasOverflow)?
            .saturating_sub(refund.removed);

        self.update_account_storage(address, key, new_value)?;

        Ok(OpcodeSuccess::Continue)
    }

    // JUMP operation
    pub fn op_jump(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::JUMP)?;

        let jump_address = current_call_frame.stack.pop()?;
        if !current_call_frame.jump(jump_address) {
            return Err(VMError::InvalidJump);
        }

        Ok(OpcodeSuccess::Continue)
    }

    // JUMPI operation
    pub fn op_jumpi(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::JUMPI)?;

        let jump_address = current_call_frame.stack.pop()?;
        let condition = current_call_frame.stack.pop()?;

        if !condition.is_zero() {
            if !current_call_frame.jump(jump_address) {
                return Err(VMError::InvalidJump);
            }
        } else {
            current_call_frame.increment_pc()?;
        }

        Ok(OpcodeSuccess::Continue)
    }

    // JUMPDEST operation
    pub fn op_jumpdest(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::JUMPDEST)?;
        Ok(OpcodeSuccess::Continue)
    }

    // PC operation
    pub fn op_pc(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::PC)?;
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.pc))?;
        Ok(OpcodeSuccess::Continue)
    }

    // MSIZE operation
    pub fn op_msize(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::MSIZE)?;
        current_call_frame
            .stack
            .push(current_call_frame.memory.size())?;
        Ok(OpcodeSuccess::Continue)
    }

    // GAS operation
    pub fn op_gas(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::GAS)?;
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.gas_remaining()))?;
        Ok(OpcodeSuccess::Continue)
    }

    // TLOAD operation (EIP-1153)
    pub fn op_tload(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip1153 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::TLOAD)?;

        let key = current_call_frame.stack.pop()?;
        let value = self
            .transient_storage
            .get(&(current_call_frame.to, key))
            .copied()
            .unwrap_or_else(U256::zero);

        current_call_frame.stack.push(value)?;
        Ok(OpcodeSuccess::Continue)
    }

    // TSTORE operation (EIP-1153)
    pub fn op_tstore(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip1153 {
            return Err(VMError::InvalidOpcode);
        }
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::TSTORE)?;

        let key = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;
        self.transient_storage
            .insert((current_call_frame.to, key), value);

        Ok(OpcodeSuccess::Continue)
    }

    // MCOPY operation (EIP-5656)
    pub fn op_mcopy(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip5656 {
            return Err(VMError::InvalidOpcode);
        }
        let dest_offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let src_offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let size: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let src_expansion = current_call_frame.memory.expansion_cost(src_offset, size)?;
        let dest_expansion = current_call_frame
            .memory
            .expansion_cost(dest_offset, size)?;
        let memory_expansion_cost = src_expansion.max(dest_expansion);
        let gas_cost = gas_cost::mcopy(size, memory_expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        if size > 0 {
            current_call_frame.memory.copy(src_offset, dest_offset, size)?;
        }

        Ok(OpcodeSuccess::Continue)
    }
}
