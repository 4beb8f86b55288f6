use crate::{
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};
use ember_core::U256;

// Push Operations
// Opcodes: PUSH0, PUSH1 ... PUSH32

impl VM {
    // PUSHn operation, 1 <= n <= 32. Immediates past the end of code read
    // as zeros.
    pub fn op_push(
        &mut self,
        current_call_frame: &mut CallFrame,
        n_bytes: usize,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::PUSHN)?;

        let immediate_start = current_call_frame.pc.checked_add(1).ok_or(VMError::Internal(
            InternalError::PCOverflowed,
        ))?;
        let immediate_end = immediate_start
            .checked_add(n_bytes)
            .ok_or(VMError::Internal(InternalError::PCOverflowed))?;

        let code = &current_call_frame.bytecode;
        let available = code
            .get(immediate_start..immediate_end.min(code.len()))
            .unwrap_or_default();

        let mut padded = [0u8; 32];
        let write_start = 32usize.checked_sub(n_bytes).ok_or(VMError::Internal(
            InternalError::ArithmeticOperationUnderflow,
        ))?;
        let write_end = write_start
            .checked_add(available.len())
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        // an immediate truncated by code end reads as if right-padded with zeros
        padded
            .get_mut(write_start..write_end)
            .ok_or(VMError::Internal(InternalError::SlicingError))?
            .copy_from_slice(available);

        let value = U256::from_big_endian(&padded);
        current_call_frame.stack.push(value)?;

        // skip the immediate bytes; the main loop adds the +1 for the opcode
        current_call_frame.increment_pc_by(n_bytes)?;

        Ok(OpcodeSuccess::Continue)
    }

    // PUSH0 operation (EIP-3855)
    pub fn op_push0(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip3855 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::PUSH0)?;
        current_call_frame.stack.push(U256::zero())?;
        Ok(OpcodeSuccess::Continue)
    }
}
