use crate::{
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};

// Exchange Operations (16)
// Opcodes: SWAP1 ... SWAP16

impl VM {
    // SWAPn operation, 1 <= n <= 16
    pub fn op_swap(
        &mut self,
        current_call_frame: &mut CallFrame,
        depth: usize,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SWAPN)?;

        let stack_len = current_call_frame.stack.len();
        if stack_len <= depth {
            return Err(VMError::StackUnderflow);
        }

        let stack_top_index = stack_len.checked_sub(1).ok_or(VMError::Internal(
            InternalError::ArithmeticOperationUnderflow,
        ))?;
        let to_swap_index = stack_top_index.checked_sub(depth).ok_or(VMError::Internal(
            InternalError::ArithmeticOperationUnderflow,
        ))?;
        current_call_frame.stack.swap(stack_top_index, to_swap_index)?;

        Ok(OpcodeSuccess::Continue)
    }
}
