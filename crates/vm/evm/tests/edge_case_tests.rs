#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use ember_core::U256;
use ember_evm::{
    errors::{OutOfGasError, TxResult, VMError},
    operations::Operation,
    utils::{new_vm_with_bytecode, new_vm_with_ops, ops_to_bytecode},
};

#[test]
fn stack_underflow_halts_the_frame() {
    let mut vm = new_vm_with_ops(&[Operation::Add, Operation::Stop]).unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(report.result, TxResult::Revert(VMError::StackUnderflow));
    assert_eq!(report.gas_used, current_call_frame.gas_limit);
}

#[test]
fn stack_overflow_halts_the_frame() {
    // 1025 pushes cannot fit in the 1024-slot stack
    let mut ops = vec![Operation::Push((1, U256::one())); 1025];
    ops.push(Operation::Stop);
    let mut vm = new_vm_with_ops(&ops).unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(report.result, TxResult::Revert(VMError::StackOverflow));
}

#[test]
fn stack_depth_stays_within_bounds_on_success() {
    let mut ops = vec![Operation::Push((1, U256::one())); 1024];
    ops.push(Operation::Stop);
    let mut vm = new_vm_with_ops(&ops).unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success());
    assert_eq!(current_call_frame.stack.len(), 1024);
}

#[test]
fn out_of_gas_consumes_the_whole_frame_budget() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::one())),
        Operation::Add,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    current_call_frame.gas_limit = 7; // two pushes fit, the ADD does not
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(
        report.result,
        TxResult::Revert(VMError::OutOfGas(OutOfGasError::MaxGasLimitExceeded))
    );
    assert_eq!(report.gas_used, 7);
}

#[test]
fn undefined_opcode_halts_consuming_all_gas() {
    // 0xf6 is unassigned
    let mut vm = new_vm_with_bytecode(Bytes::from(vec![0xf6])).unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(report.result, TxResult::Revert(VMError::OpcodeNotFound));
    assert_eq!(report.gas_used, current_call_frame.gas_limit);
}

#[test]
fn invalid_opcode_halts_consuming_all_gas() {
    let mut vm = new_vm_with_ops(&[Operation::Invalid]).unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(report.result, TxResult::Revert(VMError::InvalidOpcode));
    assert_eq!(report.gas_used, current_call_frame.gas_limit);
}

#[test]
fn jumpdest_inside_push_immediate_is_not_a_target() {
    // 0: PUSH1 3; 2: JUMP; 3 would be inside the immediate of a PUSH2 at 3
    // layout: PUSH1 4; JUMP; PUSH2 0x5b5b; STOP -- both 0x5b bytes are data
    let bytecode = Bytes::from(vec![0x60, 0x04, 0x56, 0x61, 0x5b, 0x5b, 0x00]);
    let mut vm = new_vm_with_bytecode(bytecode).unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(report.result, TxResult::Revert(VMError::InvalidJump));
}

#[test]
fn returndatacopy_beyond_the_buffer_fails() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(32))), // size
        Operation::Push((1, U256::zero())),   // returndata offset
        Operation::Push((1, U256::zero())),   // dest offset
        Operation::ReturnDataCopy,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    // no prior call: the buffer is empty, any non-zero-size copy fails
    assert!(matches!(report.result, TxResult::Revert(_)));
    assert_eq!(report.gas_used, current_call_frame.gas_limit);
}

#[test]
fn memory_expansion_is_charged_incrementally() {
    // touching the same word twice only charges the expansion once
    let ops = [
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Stop,
    ];
    let mut vm = new_vm_with_ops(&ops).unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    // 4 pushes (12) + 2 mstores (6) + one single word expansion (3)
    assert_eq!(report.gas_used, 21);
}

#[test]
fn revert_discards_logs_of_the_frame() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Log(0),
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Revert,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(report.result, TxResult::Revert(VMError::RevertOpcode));
    assert!(report.logs.is_empty());
}

#[test]
fn push_immediate_truncated_by_code_end_reads_as_zero_padded() {
    // PUSH2 with a single trailing byte: the value is 0xaa00
    let bytecode = Bytes::from(vec![0x61, 0xaa]);
    let mut vm = new_vm_with_bytecode(bytecode).unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success());
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(0xaa00));
}

#[test]
fn bytecode_assembly_roundtrip() {
    let ops = [
        Operation::Push((1, U256::from(5))),
        Operation::Push((1, U256::from(10))),
        Operation::Add,
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(32))),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ];
    let bytecode = ops_to_bytecode(&ops).unwrap();
    assert_eq!(
        bytecode,
        Bytes::from(vec![
            0x60, 0x05, 0x60, 0x0a, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3
        ])
    );
}
