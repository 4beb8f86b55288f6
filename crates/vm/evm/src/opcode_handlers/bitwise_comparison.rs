use crate::{
    call_frame::CallFrame,
    errors::{InternalError, OpcodeSuccess, VMError},
    gas_cost,
    opcode_handlers::arithmetic::is_negative,
    vm::VM,
};
use ember_core::U256;

// Comparison and Bitwise Logic Operations (14)
// Opcodes: LT, GT, SLT, SGT, EQ, ISZERO, AND, OR, XOR, NOT, BYTE, SHL, SHR, SAR

impl VM {
    // LT operation
    pub fn op_lt(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::LT)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        let result = u256_from_bool(lho < rho);
        current_call_frame.stack.push(result)?;
        Ok(OpcodeSuccess::Continue)
    }

    // GT operation
    pub fn op_gt(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::GT)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        let result = u256_from_bool(lho > rho);
        current_call_frame.stack.push(result)?;
        Ok(OpcodeSuccess::Continue)
    }

    // SLT operation (signed less than)
    pub fn op_slt(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SLT)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        let lho_is_negative = is_negative(lho);
        let rho_is_negative = is_negative(rho);
        let result = if lho_is_negative == rho_is_negative {
            // two's-complement ordering coincides with unsigned ordering
            // when the signs agree
            u256_from_bool(lho < rho)
        } else {
            u256_from_bool(lho_is_negative)
        };
        current_call_frame.stack.push(result)?;
        Ok(OpcodeSuccess::Continue)
    }

    // SGT operation (signed greater than)
    pub fn op_sgt(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::SGT)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        let lho_is_negative = is_negative(lho);
        let rho_is_negative = is_negative(rho);
        let result = if lho_is_negative == rho_is_negative {
            u256_from_bool(lho > rho)
        } else {
            u256_from_bool(rho_is_negative)
        };
        current_call_frame.stack.push(result)?;
        Ok(OpcodeSuccess::Continue)
    }

    // EQ operation
    pub fn op_eq(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::EQ)?;
        let lho = current_call_frame.stack.pop()?;
        let rho = current_call_frame.stack.pop()?;
        let result = u256_from_bool(lho == rho);
        current_call_frame.stack.push(result)?;
        Ok(OpcodeSuccess::Continue)
    }

    // ISZERO operation
    pub fn op_iszero(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::ISZERO)?;
        let operand = current_call_frame.stack.pop()?;
        current_call_frame
            .stack
            .push(u256_from_bool(operand.is_zero()))?;
        Ok(OpcodeSuccess::Continue)
    }

    // AND operation
    pub fn op_and(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::AND)?;
        let a = current_call_frame.stack.pop()?;
        let b = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(a & b)?;
        Ok(OpcodeSuccess::Continue)
    }

    // OR operation
    pub fn op_or(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::OR)?;
        let a = current_call_frame.stack.pop()?;
        let b = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(a | b)?;
        Ok(OpcodeSuccess::Continue)
    }

    // XOR operation
    pub fn op_xor(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::XOR)?;
        let a = current_call_frame.stack.pop()?;
        let b = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(a ^ b)?;
        Ok(OpcodeSuccess::Continue)
    }

    // NOT operation
    pub fn op_not(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::NOT)?;
        let a = current_call_frame.stack.pop()?;
        current_call_frame.stack.push(!a)?;
        Ok(OpcodeSuccess::Continue)
    }

    // BYTE operation
    pub fn op_byte(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        self.increase_consumed_gas(current_call_frame, gas_cost::BYTE)?;
        let op1 = current_call_frame.stack.pop()?;
        let op2 = current_call_frame.stack.pop()?;

        let byte_index = match usize::try_from(op1) {
            Ok(byte_index) => byte_index,
            Err(_) => {
                current_call_frame.stack.push(U256::zero())?;
                return Ok(OpcodeSuccess::Continue);
            }
        };

        if byte_index < 32 {
            let byte_to_push = 31usize.checked_sub(byte_index).ok_or(VMError::Internal(
                InternalError::ArithmeticOperationUnderflow,
            ))?;
            current_call_frame
                .stack
                .push(U256::from(op2.byte(byte_to_push)))?;
        } else {
            current_call_frame.stack.push(U256::zero())?;
        }

        Ok(OpcodeSuccess::Continue)
    }

    // SHL operation (shift left), EIP-145
    pub fn op_shl(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip145 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::SHL)?;
        let shift = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;

        if shift < U256::from(256) {
            current_call_frame
                .stack
                .push(checked_shift_left(value, shift)?)?;
        } else {
            current_call_frame.stack.push(U256::zero())?;
        }

        Ok(OpcodeSuccess::Continue)
    }

    // SHR operation (shift right), EIP-145
    pub fn op_shr(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip145 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::SHR)?;
        let shift = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;

        if shift < U256::from(256) {
            current_call_frame
                .stack
                .push(checked_shift_right(value, shift)?)?;
        } else {
            current_call_frame.stack.push(U256::zero())?;
        }

        Ok(OpcodeSuccess::Continue)
    }

    // SAR operation (arithmetic shift right), EIP-145
    pub fn op_sar(&mut self, current_call_frame: &mut CallFrame) -> Result<OpcodeSuccess, VMError> {
        if !self.spec.eip145 {
            return Err(VMError::InvalidOpcode);
        }
        self.increase_consumed_gas(current_call_frame, gas_cost::SAR)?;
        let shift = current_call_frame.stack.pop()?;
        let value = current_call_frame.stack.pop()?;

        let result = if shift < U256::from(256) {
            arithmetic_shift_right(value, shift)?
        } else if is_negative(value) {
            U256::MAX
        } else {
            U256::zero()
        };

        current_call_frame.stack.push(result)?;
        Ok(OpcodeSuccess::Continue)
    }
}

fn u256_from_bool(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Left shift that never wraps into a panic; shifts of 256 or more zero out.
#[allow(clippy::arithmetic_side_effects)]
pub fn checked_shift_left(value: U256, shift: U256) -> Result<U256, VMError> {
    if shift >= U256::from(256) {
        return Ok(U256::zero());
    }
    Ok(value << shift.as_usize())
}

#[allow(clippy::arithmetic_side_effects)]
fn checked_shift_right(value: U256, shift: U256) -> Result<U256, VMError> {
    if shift >= U256::from(256) {
        return Ok(U256::zero());
    }
    Ok(value >> shift.as_usize())
}

/// Shifts right while propagating the sign bit into the vacated positions.
#[allow(clippy::arithmetic_side_effects)]
fn arithmetic_shift_right(value: U256, shift: U256) -> Result<U256, VMError> {
    let shifted = checked_shift_right(value, shift)?;
    if !is_negative(value) {
        return Ok(shifted);
    }

    let shift_amount = shift.as_usize();
    if shift_amount == 0 {
        return Ok(shifted);
    }
    // fill the top `shift` bits with ones
    let fill_from = 256usize.checked_sub(shift_amount).ok_or(VMError::Internal(
        InternalError::ArithmeticOperationUnderflow,
    ))?;
    Ok(shifted | (U256::MAX << fill_from))
}
