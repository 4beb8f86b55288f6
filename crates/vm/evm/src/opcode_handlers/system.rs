use crate::{
    call_frame::CallFrame,
    errors::{OpcodeSuccess, ResultReason, VMError},
    gas_cost,
    vm::{word_to_address, VM},
};
use ember_core::U256;

// System Operations (10)
// Opcodes: CREATE, CALL, CALLCODE, RETURN, DELEGATECALL, CREATE2, STATICCALL,
// REVERT, INVALID, SELFDESTRUCT

impl VM {
    // CALL operation
    pub fn op_call(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let gas_for_call = current_call_frame.stack.pop()?;
        let callee = word_to_address(current_call_frame.stack.pop()?);
        let value_to_transfer = current_call_frame.stack.pop()?;

        if current_call_frame.is_static && !value_to_transfer.is_zero() {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }

        let (args_start_offset, args_size, return_data_start_offset, return_data_size) =
            pop_call_memory_operands(current_call_frame)?;

        let memory_expansion_cost = call_memory_expansion(
            current_call_frame,
            args_start_offset,
            args_size,
            return_data_start_offset,
            return_data_size,
        )?;

        let (account_info, address_was_cold) = self.access_account(callee);

        self.increase_consumed_gas(
            current_call_frame,
            gas_cost::call(
                memory_expansion_cost,
                address_was_cold,
                account_info.is_empty(),
                value_to_transfer,
                &self.spec,
            )?,
        )?;

        let msg_sender = current_call_frame.to; // the new sender is the current contract
        let to = callee; // unlike CALLCODE and DELEGATECALL, code and storage belong to the callee
        let is_static = current_call_frame.is_static;

        self.generic_call(
            current_call_frame,
            gas_for_call,
            value_to_transfer,
            msg_sender,
            to,
            callee,
            true,
            is_static,
            args_start_offset,
            args_size,
            return_data_start_offset,
            return_data_size,
        )
    }

    // CALLCODE operation
    pub fn op_callcode(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let gas_for_call = current_call_frame.stack.pop()?;
        let code_address = word_to_address(current_call_frame.stack.pop()?);
        let value_to_transfer = current_call_frame.stack.pop()?;

        let (args_start_offset, args_size, return_data_start_offset, return_data_size) =
            pop_call_memory_operands(current_call_frame)?;

        let memory_expansion_cost = call_memory_expansion(
            current_call_frame,
            args_start_offset,
            args_size,
            return_data_start_offset,
            return_data_size,
        )?;

        let (_account_info, address_was_cold) = self.access_account(code_address);

        self.increase_consumed_gas(
            current_call_frame,
            gas_cost::callcode(
                memory_expansion_cost,
                address_was_cold,
                value_to_transfer,
                &self.spec,
            )?,
        )?;

        // Sender and recipient are the same; only the executed code is foreign.
        let msg_sender = current_call_frame.to;
        let to = current_call_frame.to;
        let is_static = current_call_frame.is_static;

        self.generic_call(
            current_call_frame,
            gas_for_call,
            value_to_transfer,
            msg_sender,
            to,
            code_address,
            true,
            is_static,
            args_start_offset,
            args_size,
            return_data_start_offset,
            return_data_size,
        )
    }

    // DELEGATECALL operation (EIP-7)
    pub fn op_delegatecall(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip7 {
            return Err(VMError::InvalidOpcode);
        }
        let gas_for_call = current_call_frame.stack.pop()?;
        let code_address = word_to_address(current_call_frame.stack.pop()?);

        let (args_start_offset, args_size, return_data_start_offset, return_data_size) =
            pop_call_memory_operands(current_call_frame)?;

        let memory_expansion_cost = call_memory_expansion(
            current_call_frame,
            args_start_offset,
            args_size,
            return_data_start_offset,
            return_data_size,
        )?;

        let (_account_info, address_was_cold) = self.access_account(code_address);

        self.increase_consumed_gas(
            current_call_frame,
            gas_cost::delegatecall(memory_expansion_cost, address_was_cold, &self.spec)?,
        )?;

        // Caller and value are inherited from the parent frame.
        let msg_sender = current_call_frame.msg_sender;
        let value = current_call_frame.msg_value;
        let to = current_call_frame.to;
        let is_static = current_call_frame.is_static;

        self.generic_call(
            current_call_frame,
            gas_for_call,
            value,
            msg_sender,
            to,
            code_address,
            false,
            is_static,
            args_start_offset,
            args_size,
            return_data_start_offset,
            return_data_size,
        )
    }

    // STATICCALL operation (EIP-214)
    pub fn op_staticcall(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip214 {
            return Err(VMError::InvalidOpcode);
        }
        let gas_for_call = current_call_frame.stack.pop()?;
        let code_address = word_to_address(current_call_frame.stack.pop()?);

        let (args_start_offset, args_size, return_data_start_offset, return_data_size) =
            pop_call_memory_operands(current_call_frame)?;

        let memory_expansion_cost = call_memory_expansion(
            current_call_frame,
            args_start_offset,
            args_size,
            return_data_start_offset,
            return_data_size,
        )?;

        let (_account_info, address_was_cold) = self.access_account(code_address);

        self.increase_consumed_gas(
            current_call_frame,
            gas_cost::staticcall(memory_expansion_cost, address_was_cold, &self.spec)?,
        )?;

        let msg_sender = current_call_frame.to;
        let to = code_address;

        // everything below this frame is read-only
        self.generic_call(
            current_call_frame,
            gas_for_call,
            U256::zero(),
            msg_sender,
            to,
            code_address,
            false,
            true,
            args_start_offset,
            args_size,
            return_data_start_offset,
            return_data_size,
        )
    }

    // CREATE operation
    pub fn op_create(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }
        let value_in_wei_to_send = current_call_frame.stack.pop()?;
        let code_offset_in_memory: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let code_size_in_memory: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let memory_expansion_cost = current_call_frame
            .memory
            .expansion_cost(code_offset_in_memory, code_size_in_memory)?;
        let gas_cost = gas_cost::create(code_size_in_memory, memory_expansion_cost, &self.spec)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        self.create(
            value_in_wei_to_send,
            code_offset_in_memory,
            code_size_in_memory,
            None,
            current_call_frame,
        )
    }

    // CREATE2 operation (EIP-1014)
    pub fn op_create2(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip1014 {
            return Err(VMError::InvalidOpcode);
        }
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }
        let value_in_wei_to_send = current_call_frame.stack.pop()?;
        let code_offset_in_memory: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let code_size_in_memory: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let salt = current_call_frame.stack.pop()?;

        let memory_expansion_cost = current_call_frame
            .memory
            .expansion_cost(code_offset_in_memory, code_size_in_memory)?;
        // CREATE2 hashes the initcode, so it pays keccak word gas on top of
        // the EIP-3860 initcode word gas.
        let hash_cost = gas_cost::KECCAK256_DYNAMIC_BASE
            .checked_mul(gas_cost::minimum_word_size(code_size_in_memory)?)
            .ok_or(crate::errors::OutOfGasError::GasCostOverflow)?;
        let gas_cost = gas_cost::create(code_size_in_memory, memory_expansion_cost, &self.spec)?
            .checked_add(hash_cost)
            .ok_or(crate::errors::OutOfGasError::GasCostOverflow)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        self.create(
            value_in_wei_to_send,
            code_offset_in_memory,
            code_size_in_memory,
            Some(salt),
            current_call_frame,
        )
    }

    // RETURN operation
    pub fn op_return(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        let offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let size: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let gas_cost = current_call_frame.memory.expansion_cost(offset, size)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let return_data = current_call_frame.memory.load_range(offset, size)?;
        current_call_frame.output = return_data.into();

        Ok(OpcodeSuccess::Result(ResultReason::Return))
    }

    // REVERT operation (EIP-140)
    pub fn op_revert(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip140 {
            return Err(VMError::InvalidOpcode);
        }
        let offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let size: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let gas_cost = current_call_frame.memory.expansion_cost(offset, size)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        current_call_frame.output = current_call_frame.memory.load_range(offset, size)?.into();

        // the rollback itself happens in execute()
        Err(VMError::RevertOpcode)
    }

    /// ### INVALID operation
    /// Halts consuming all remaining gas, no return data.
    pub fn op_invalid(&mut self) -> Result<OpcodeSuccess, VMError> {
        Err(VMError::InvalidOpcode)
    }

    // SELFDESTRUCT operation (EIP-6780 semantics from Cancun onwards)
    pub fn op_selfdestruct(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }

        let target_address = word_to_address(current_call_frame.stack.pop()?);

        let (target_account_info, target_was_cold) = self.access_account(target_address);
        let (current_account_info, _) = self.access_account(current_call_frame.to);
        let balance_to_transfer = current_account_info.balance;

        self.increase_consumed_gas(
            current_call_frame,
            gas_cost::selfdestruct(
                target_was_cold,
                target_account_info.is_empty(),
                balance_to_transfer.is_zero(),
                &self.spec,
            )?,
        )?;

        self.decrease_account_balance(current_call_frame.to, balance_to_transfer)?;
        self.increase_account_balance(target_address, balance_to_transfer)?;

        let created_in_this_transaction = self
            .accrued_substate
            .created_accounts
            .contains(&current_call_frame.to);

        if !self.spec.eip6780 || created_in_this_transaction {
            if self
                .accrued_substate
                .selfdestruct_set
                .insert(current_call_frame.to)
                && !self.spec.eip3529
            {
                self.env.refunded_gas = self
                    .env
                    .refunded_gas
                    .saturating_add(gas_cost::SELFDESTRUCT_REFUND_PRE_LONDON);
            }
            // deleting also burns any balance the account sent to itself
            if target_address == current_call_frame.to {
                self.decrease_account_balance(current_call_frame.to, balance_to_transfer)?;
            }
        }

        Ok(OpcodeSuccess::Result(ResultReason::SelfDestruct))
    }
}

/// Pops the four memory operands shared by the CALL family.
fn pop_call_memory_operands(
    current_call_frame: &mut CallFrame,
) -> Result<(usize, usize, usize, usize), VMError> {
    let args_start_offset: usize = current_call_frame
        .stack
        .pop()?
        .try_into()
        .map_err(|_| VMError::VeryLargeNumber)?;
    let args_size: usize = current_call_frame
        .stack
        .pop()?
        .try_into()
        .map_err(|_| VMError::VeryLargeNumber)?;
    let return_data_start_offset: usize = current_call_frame
        .stack
        .pop()?
        .try_into()
        .map_err(|_| VMError::VeryLargeNumber)?;
    let return_data_size: usize = current_call_frame
        .stack
        .pop()?
        .try_into()
        .map_err(|_| VMError::VeryLargeNumber)?;
    Ok((
        args_start_offset,
        args_size,
        return_data_start_offset,
        return_data_size,
    ))
}

/// Expansion cost of the larger of the argument and return ranges.
fn call_memory_expansion(
    current_call_frame: &mut CallFrame,
    args_start_offset: usize,
    args_size: usize,
    return_data_start_offset: usize,
    return_data_size: usize,
) -> Result<u64, VMError> {
    let args_cost = current_call_frame
        .memory
        .expansion_cost(args_start_offset, args_size)?;
    let return_cost = current_call_frame
        .memory
        .expansion_cost(return_data_start_offset, return_data_size)?;
    Ok(args_cost.max(return_cost))
}
