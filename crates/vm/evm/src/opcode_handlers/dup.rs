use crate::{
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};

// Duplication Operations (16)
// Opcodes: DUP1 ... DUP16

impl VM {
    // DUPn operation, 1 <= n <= 16
    pub fn op_dup(
        &mut self,
        current_call_frame: &mut CallFrame,
        depth: usize,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::DUPN)?;

        let stack_len = current_call_frame.stack.len();
        if stack_len < depth {
            return Err(VMError::StackUnderflow);
        }

        let index = stack_len.checked_sub(depth).ok_or(VMError::Internal(
            InternalError::ArithmeticOperationUnderflow,
        ))?;
        let value_to_duplicate = *current_call_frame.stack.get(index)?;
        current_call_frame.stack.push(value_to_duplicate)?;

        Ok(OpcodeSuccess::Continue)
    }
}
