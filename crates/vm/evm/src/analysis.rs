use crate::{
    errors::{InternalError, VMError},
    gas_cost,
    opcodes::Opcode,
};
use bytes::Bytes;

/// Result of the one-shot pre-pass over a contract's bytecode: which program
/// counters are legal jump targets, plus per-basic-block metadata.
///
/// The jump bitmap is consensus-relevant (JUMPDEST bytes inside PUSH
/// immediates are not targets); the block metadata is advisory and lets a
/// dispatcher front-load gas and stack checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeAnalysis {
    jumpdests: Vec<bool>,
    pub blocks: Vec<BasicBlock>,
}

/// A maximal straight-line run of instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicBlock {
    pub start_pc: usize,
    /// One past the last instruction byte of the block.
    pub end_pc: usize,
    /// Sum of the statically-known gas of the block's instructions.
    pub static_gas: u64,
    /// Stack items that must be present when entering the block.
    pub stack_required: usize,
    /// Peak stack growth relative to the entry height.
    pub stack_max_growth: usize,
}

impl CodeAnalysis {
    pub fn is_valid_jump_destination(&self, pc: usize) -> bool {
        self.jumpdests.get(pc).copied().unwrap_or(false)
    }
}

/// Single linear pass: marks JUMPDESTs (skipping PUSH immediates) and cuts
/// basic blocks at terminators and at every JUMPDEST.
pub fn analyze_code(code: &Bytes) -> Result<CodeAnalysis, VMError> {
    let mut jumpdests = vec![false; code.len()];
    let mut blocks = Vec::new();

    let mut block = BlockBuilder::new(0);
    let mut pc = 0;
    while let Some(&byte) = code.get(pc) {
        let opcode = Opcode::from(byte);

        if opcode == Opcode::JUMPDEST && pc > block.start_pc && !block.is_empty() {
            // a JUMPDEST opens a new block even without a preceding terminator
            blocks.push(block.finish(pc));
            block = BlockBuilder::new(pc);
        }

        if opcode == Opcode::JUMPDEST {
            if let Some(slot) = jumpdests.get_mut(pc) {
                *slot = true;
            }
        }

        let immediate = opcode.immediate_size();
        block.record(opcode)?;

        pc = pc
            .checked_add(immediate)
            .and_then(|at_immediate_end| at_immediate_end.checked_add(1))
            .ok_or(VMError::Internal(InternalError::PCOverflowed))?;

        if opcode.is_terminator() || !Opcode::is_defined(byte) {
            blocks.push(block.finish(pc.min(code.len())));
            block = BlockBuilder::new(pc);
        }
    }
    if !block.is_empty() {
        blocks.push(block.finish(code.len()));
    }

    Ok(CodeAnalysis { jumpdests, blocks })
}

struct BlockBuilder {
    start_pc: usize,
    static_gas: u64,
    stack_required: i64,
    stack_max_growth: i64,
    stack_height: i64,
    instructions: usize,
}

impl BlockBuilder {
    fn new(start_pc: usize) -> Self {
        Self {
            start_pc,
            static_gas: 0,
            stack_required: 0,
            stack_max_growth: 0,
            stack_height: 0,
            instructions: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.instructions == 0
    }

    fn record(&mut self, opcode: Opcode) -> Result<(), VMError> {
        let (gas, inputs, outputs) = static_traits(opcode);
        self.static_gas = self
            .static_gas
            .checked_add(gas)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;

        let missing = inputs
            .checked_sub(self.stack_height)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))?;
        self.stack_required = self.stack_required.max(missing);
        self.stack_height = self
            .stack_height
            .checked_add(outputs)
            .and_then(|height| height.checked_sub(inputs))
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        self.stack_max_growth = self.stack_max_growth.max(self.stack_height);
        self.instructions = self
            .instructions
            .checked_add(1)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        Ok(())
    }

    fn finish(self, end_pc: usize) -> BasicBlock {
        BasicBlock {
            start_pc: self.start_pc,
            end_pc,
            static_gas: self.static_gas,
            stack_required: usize::try_from(self.stack_required.max(0)).unwrap_or(0),
            stack_max_growth: usize::try_from(self.stack_max_growth.max(0)).unwrap_or(0),
        }
    }
}

/// (statically-known gas, stack inputs, stack outputs) per opcode. Opcodes
/// with fully dynamic pricing (storage, calls, account access) contribute 0
/// to the static gas; their handlers meter everything themselves.
fn static_traits(opcode: Opcode) -> (u64, i64, i64) {
    match opcode {
        Opcode::STOP | Opcode::INVALID => (0, 0, 0),
        Opcode::ADD | Opcode::SUB => (gas_cost::ADD, 2, 1),
        Opcode::MUL | Opcode::DIV | Opcode::SDIV | Opcode::MOD | Opcode::SMOD => {
            (gas_cost::MUL, 2, 1)
        }
        Opcode::ADDMOD | Opcode::MULMOD => (gas_cost::ADDMOD, 3, 1),
        Opcode::EXP => (gas_cost::EXP_STATIC, 2, 1),
        Opcode::SIGNEXTEND => (gas_cost::SIGNEXTEND, 2, 1),
        Opcode::LT | Opcode::GT | Opcode::SLT | Opcode::SGT | Opcode::EQ => (gas_cost::LT, 2, 1),
        Opcode::ISZERO | Opcode::NOT => (gas_cost::ISZERO, 1, 1),
        Opcode::AND | Opcode::OR | Opcode::XOR | Opcode::BYTE => (gas_cost::AND, 2, 1),
        Opcode::SHL | Opcode::SHR | Opcode::SAR => (gas_cost::SHL, 2, 1),
        Opcode::KECCAK256 => (gas_cost::KECCAK256_STATIC, 2, 1),
        Opcode::ADDRESS
        | Opcode::ORIGIN
        | Opcode::CALLER
        | Opcode::CALLVALUE
        | Opcode::CALLDATASIZE
        | Opcode::CODESIZE
        | Opcode::GASPRICE
        | Opcode::RETURNDATASIZE => (gas_cost::ADDRESS, 0, 1),
        Opcode::BALANCE | Opcode::EXTCODESIZE | Opcode::EXTCODEHASH => (0, 1, 1),
        Opcode::CALLDATALOAD => (gas_cost::CALLDATALOAD, 1, 1),
        Opcode::CALLDATACOPY | Opcode::CODECOPY | Opcode::RETURNDATACOPY => {
            (gas_cost::CALLDATACOPY_STATIC, 3, 0)
        }
        Opcode::EXTCODECOPY => (0, 4, 0),
        Opcode::BLOCKHASH => (gas_cost::BLOCKHASH, 1, 1),
        Opcode::COINBASE
        | Opcode::TIMESTAMP
        | Opcode::NUMBER
        | Opcode::PREVRANDAO
        | Opcode::GASLIMIT
        | Opcode::CHAINID
        | Opcode::BASEFEE
        | Opcode::BLOBBASEFEE => (gas_cost::COINBASE, 0, 1),
        Opcode::SELFBALANCE => (gas_cost::SELFBALANCE, 0, 1),
        Opcode::BLOBHASH => (gas_cost::BLOBHASH, 1, 1),
        Opcode::POP => (gas_cost::POP, 1, 0),
        Opcode::MLOAD => (gas_cost::MLOAD_STATIC, 1, 1),
        Opcode::MSTORE | Opcode::MSTORE8 => (gas_cost::MSTORE_STATIC, 2, 0),
        Opcode::SLOAD => (0, 1, 1),
        Opcode::SSTORE => (0, 2, 0),
        Opcode::JUMP => (gas_cost::JUMP, 1, 0),
        Opcode::JUMPI => (gas_cost::JUMPI, 2, 0),
        Opcode::PC | Opcode::MSIZE | Opcode::GAS => (gas_cost::PC, 0, 1),
        Opcode::JUMPDEST => (gas_cost::JUMPDEST, 0, 0),
        Opcode::TLOAD => (gas_cost::TLOAD, 1, 1),
        Opcode::TSTORE => (gas_cost::TSTORE, 2, 0),
        Opcode::MCOPY => (gas_cost::MCOPY_STATIC, 3, 0),
        Opcode::PUSH0 => (gas_cost::PUSH0, 0, 1),
        push if (Opcode::PUSH1..=Opcode::PUSH32).contains(&push) => (gas_cost::PUSHN, 0, 1),
        dup if (Opcode::DUP1..=Opcode::DUP16).contains(&dup) => {
            let depth = i64::from(u8::from(dup).saturating_sub(0x7F));
            (gas_cost::DUPN, depth, depth.saturating_add(1))
        }
        swap if (Opcode::SWAP1..=Opcode::SWAP16).contains(&swap) => {
            let depth = i64::from(u8::from(swap).saturating_sub(0x8F)).saturating_add(1);
            (gas_cost::SWAPN, depth, depth)
        }
        log if (Opcode::LOG0..=Opcode::LOG4).contains(&log) => {
            let topics = i64::from(u8::from(log).saturating_sub(0xA0));
            (gas_cost::LOGN_STATIC, topics.saturating_add(2), 0)
        }
        Opcode::CREATE => (gas_cost::CREATE_BASE_COST, 3, 1),
        Opcode::CREATE2 => (gas_cost::CREATE_BASE_COST, 4, 1),
        Opcode::CALL | Opcode::CALLCODE => (0, 7, 1),
        Opcode::DELEGATECALL | Opcode::STATICCALL => (0, 6, 1),
        Opcode::RETURN | Opcode::REVERT => (0, 2, 0),
        Opcode::SELFDESTRUCT => (gas_cost::SELFDESTRUCT_STATIC, 1, 0),
        // covered by the ranges above
        _ => (0, 0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::analyze_code;
    use bytes::Bytes;

    #[test]
    fn jumpdest_inside_push_data_is_not_a_target() {
        // PUSH2 0x5b5b; JUMPDEST
        let code = Bytes::from(vec![0x61, 0x5b, 0x5b, 0x5b]);
        let analysis = analyze_code(&code).unwrap();
        assert!(!analysis.is_valid_jump_destination(1));
        assert!(!analysis.is_valid_jump_destination(2));
        assert!(analysis.is_valid_jump_destination(3));
    }

    #[test]
    fn blocks_split_at_terminators_and_jumpdests() {
        // PUSH1 0; JUMP | JUMPDEST; STOP
        let code = Bytes::from(vec![0x60, 0x00, 0x56, 0x5b, 0x00]);
        let analysis = analyze_code(&code).unwrap();
        assert_eq!(analysis.blocks.len(), 2);
        assert_eq!(analysis.blocks[0].start_pc, 0);
        assert_eq!(analysis.blocks[0].end_pc, 3);
        // PUSH (3) + JUMP (8)
        assert_eq!(analysis.blocks[0].static_gas, 11);
        assert_eq!(analysis.blocks[0].stack_required, 0);
        assert_eq!(analysis.blocks[0].stack_max_growth, 1);
        assert_eq!(analysis.blocks[1].start_pc, 3);
    }

    #[test]
    fn stack_requirement_accounts_for_earlier_pushes() {
        // ADD needs two items; after one PUSH only one more must come from the caller
        let code = Bytes::from(vec![0x60, 0x01, 0x01, 0x00]);
        let analysis = analyze_code(&code).unwrap();
        assert_eq!(analysis.blocks[0].stack_required, 1);
    }
}
