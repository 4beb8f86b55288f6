use crate::{
    analysis::{analyze_code, CodeAnalysis},
    constants::STACK_LIMIT,
    errors::{InternalError, VMError},
    memory::Memory,
    opcodes::Opcode,
};
use bytes::Bytes;
use ember_core::{types::Log, Address, U256};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    pub stack: Vec<U256>,
}

impl Stack {
    pub fn pop(&mut self) -> Result<U256, VMError> {
        self.stack.pop().ok_or(VMError::StackUnderflow)
    }

    pub fn push(&mut self, value: U256) -> Result<(), VMError> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(VMError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&U256, VMError> {
        self.stack.get(index).ok_or(VMError::StackUnderflow)
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), VMError> {
        if a >= self.stack.len() || b >= self.stack.len() {
            return Err(VMError::StackUnderflow);
        }
        self.stack.swap(a, b);
        Ok(())
    }
}

/// A call frame, or execution environment, is the context in which
/// the EVM is currently executing: one activation of CALL/CREATE or the
/// outer transaction itself.
#[derive(Debug, Clone, Default)]
pub struct CallFrame {
    /// Max gas this frame can use.
    pub gas_limit: u64,
    /// Gas consumed so far in this frame.
    pub gas_used: u64,
    /// Program counter.
    pub pc: usize,
    /// Address of the account that sent the message.
    pub msg_sender: Address,
    /// Address of the recipient of the message.
    pub to: Address,
    /// Address of the code to execute. Usually the same as `to`, but can
    /// differ for CALLCODE and DELEGATECALL.
    pub code_address: Address,
    /// Bytecode to execute.
    pub bytecode: Bytes,
    /// Value sent along the message.
    pub msg_value: U256,
    pub stack: Stack,
    pub memory: Memory,
    /// Data sent along the message. Empty in CREATE frames.
    pub calldata: Bytes,
    /// Return data produced by this frame.
    pub output: Bytes,
    /// Return data of the last sub-context, read by RETURNDATASIZE/COPY.
    pub sub_return_data: Bytes,
    /// Whether the frame (or an ancestor) was entered via STATICCALL.
    pub is_static: bool,
    pub logs: Vec<Log>,
    /// Call stack depth of this frame.
    pub depth: usize,
    /// Jump bitmap and basic blocks of `bytecode`.
    pub analysis: CodeAnalysis,
    /// Whether this frame runs initcode for CREATE/CREATE2.
    pub create_op_called: bool,
}

impl CallFrame {
    pub fn new_from_bytecode(bytecode: Bytes) -> Self {
        let analysis = analyze_code(&bytecode).unwrap_or_default();
        Self {
            gas_limit: u64::MAX,
            bytecode,
            analysis,
            ..Default::default()
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Bytes,
        msg_value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        gas_used: u64,
        depth: usize,
        create_op_called: bool,
    ) -> Self {
        let analysis = analyze_code(&bytecode).unwrap_or_default();
        Self {
            gas_limit,
            msg_sender,
            to,
            code_address,
            bytecode,
            msg_value,
            calldata,
            is_static,
            depth,
            gas_used,
            analysis,
            create_op_called,
            ..Default::default()
        }
    }

    /// Swaps in new bytecode, re-running analysis. Used when a CREATE
    /// transaction promotes its calldata to initcode.
    pub fn assign_bytecode(&mut self, bytecode: Bytes) {
        self.analysis = analyze_code(&bytecode).unwrap_or_default();
        self.bytecode = bytecode;
    }

    /// Running past the end of code behaves as STOP.
    pub fn next_opcode(&self) -> Opcode {
        self.bytecode
            .get(self.pc)
            .copied()
            .map(Opcode::from)
            .unwrap_or(Opcode::STOP)
    }

    /// Whether the byte under the program counter names any opcode at all.
    pub fn next_opcode_is_defined(&self) -> bool {
        self.bytecode
            .get(self.pc)
            .copied()
            .map_or(true, Opcode::is_defined)
    }

    pub fn increment_pc_by(&mut self, count: usize) -> Result<(), VMError> {
        self.pc = self
            .pc
            .checked_add(count)
            .ok_or(VMError::Internal(InternalError::PCOverflowed))?;
        Ok(())
    }

    pub fn increment_pc(&mut self) -> Result<(), VMError> {
        self.increment_pc_by(1)
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Gas still available to this frame.
    pub fn gas_remaining(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_used)
    }

    /// Validated jump: moves the program counter iff the target is a
    /// JUMPDEST outside PUSH data.
    pub fn jump(&mut self, target: U256) -> bool {
        let Ok(target_pc) = usize::try_from(target) else {
            return false;
        };
        if self.analysis.is_valid_jump_destination(target_pc) {
            self.pc = target_pc;
            true
        } else {
            false
        }
    }
}
