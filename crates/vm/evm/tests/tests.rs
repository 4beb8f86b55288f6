#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use ember_core::{Address, H256, U256};
use ember_evm::{
    account::{Account, AccountInfo, StorageSlot},
    db::Db,
    errors::{TxResult, VMError},
    operations::Operation,
    utils::{new_vm_with_ops, new_vm_with_ops_db, ops_to_bytecode},
    vm::{word_to_address, VM},
};
use std::collections::HashMap;

fn callee_return_bytecode(return_value: U256) -> Bytes {
    let ops = vec![
        Operation::Push((32, return_value)), // value
        Operation::Push((1, U256::zero())),  // offset
        Operation::Mstore,
        Operation::Push((1, U256::from(32))), // size
        Operation::Push((1, U256::zero())),   // offset
        Operation::Return,
    ];
    ops_to_bytecode(&ops).unwrap()
}

#[test]
fn add_op() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::one())),
        Operation::Push((32, U256::zero())),
        Operation::Add,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    assert!(current_call_frame.stack.pop().unwrap() == U256::one());
    assert!(current_call_frame.pc() == 68);
}

#[test]
fn overflowing_add_wraps() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((1, U256::one())),
        Operation::Add,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn mul_op() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(2))),
        Operation::Push((1, U256::from(4))),
        Operation::Mul,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(8));
}

#[test]
fn div_op_rounds_toward_zero_and_zero_divisor_is_zero() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(2))),
        Operation::Push((1, U256::from(11))),
        Operation::Div,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(5));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::from(10))),
        Operation::Div,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn sdiv_op_negative_dividend() {
    // -2 / 2 == -1
    let minus_two = U256::MAX - U256::one();
    let minus_one = U256::MAX;
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(2))),
        Operation::Push((32, minus_two)),
        Operation::Sdiv,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), minus_one);
}

#[test]
fn smod_sign_follows_dividend() {
    // -8 % 3 == -2
    let minus_eight = U256::zero().overflowing_sub(U256::from(8)).0;
    let minus_two = U256::zero().overflowing_sub(U256::from(2)).0;
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(3))),
        Operation::Push((32, minus_eight)),
        Operation::SMod,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), minus_two);
}

#[test]
fn addmod_mulmod_use_wide_intermediates() {
    // (MAX + MAX) % 7: the sum must not wrap before the modulo
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(7))),
        Operation::Push((32, U256::MAX)),
        Operation::Push((32, U256::MAX)),
        Operation::Addmod,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    let expected = (U256::MAX % U256::from(7) + U256::MAX % U256::from(7)) % U256::from(7);
    assert_eq!(current_call_frame.stack.pop().unwrap(), expected);

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(12))),
        Operation::Push((1, U256::from(10))),
        Operation::Push((1, U256::from(10))),
        Operation::Mulmod,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(4));
}

#[test]
fn exp_op() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(10))),
        Operation::Push((1, U256::from(2))),
        Operation::Exp,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(1024));
    // EXP static 10 + 50 for the single exponent byte, plus two pushes
    assert_eq!(current_call_frame.gas_used, 66);
}

#[test]
fn signextend_op() {
    // extending 0xff from byte 0 gives -1
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(0xff))),
        Operation::Push((1, U256::zero())),
        Operation::SignExtend,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::MAX);

    // extending 0x7f keeps the value positive
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(0x7f))),
        Operation::Push((1, U256::zero())),
        Operation::SignExtend,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(0x7f));
}

#[test]
fn comparison_ops() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(2))),
        Operation::Push((1, U256::one())),
        Operation::Lt,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::one());

    // -1 < 1 in signed comparison
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((32, U256::MAX)),
        Operation::Slt,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::one());

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((32, U256::MAX)),
        Operation::Sgt,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn byte_op_indexes_from_the_left() {
    let value = U256::from_big_endian(&[
        0xAA, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0xBB,
    ]);
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, value)),
        Operation::Push((1, U256::zero())),
        Operation::Byte,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(0xAA));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, value)),
        Operation::Push((1, U256::from(31))),
        Operation::Byte,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(0xBB));

    // out-of-range index yields zero
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, value)),
        Operation::Push((1, U256::from(32))),
        Operation::Byte,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn shift_ops() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::from(4))),
        Operation::Shl,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(16));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(16))),
        Operation::Push((1, U256::from(4))),
        Operation::Shr,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::one());

    // arithmetic shift drags the sign bit along
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((1, U256::from(8))),
        Operation::Sar,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::MAX);

    // shifts of 256 or more clear the word (or saturate for negative SAR)
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((2, U256::from(256))),
        Operation::Shl,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn keccak256_of_empty_input_is_the_known_constant() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())), // size
        Operation::Push((1, U256::zero())), // offset
        Operation::Keccak256,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    let expected = U256::from_big_endian(
        &hex::decode("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470").unwrap(),
    );
    assert_eq!(current_call_frame.stack.pop().unwrap(), expected);
}

#[test]
fn dup_and_swap() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::from(2))),
        Operation::Dup(2),
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::one());
    assert_eq!(current_call_frame.stack.len(), 2);

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::from(2))),
        Operation::Push((1, U256::from(3))),
        Operation::Swap(2),
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::one());
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(2));
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(3));
}

#[test]
fn mstore_mload_roundtrip_and_msize() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((2, U256::from(0xabcd))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::zero())),
        Operation::Mload,
        Operation::Msize,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(32));
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(0xabcd));
}

#[test]
fn mstore8_writes_a_single_byte() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((2, U256::from(0xabcd))), // only the low byte lands
        Operation::Push((1, U256::zero())),
        Operation::Mstore8,
        Operation::Push((1, U256::zero())),
        Operation::Mload,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    let mut expected = [0u8; 32];
    expected[0] = 0xcd;
    assert_eq!(
        current_call_frame.stack.pop().unwrap(),
        U256::from_big_endian(&expected)
    );
}

#[test]
fn mcopy_moves_overlapping_ranges() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((2, U256::from(0x0102))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(32))), // size
        Operation::Push((1, U256::zero())),   // src
        Operation::Push((1, U256::from(16))), // dest
        Operation::Mcopy,
        Operation::Push((1, U256::from(16))),
        Operation::Mload,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(0x0102));
}

#[test]
fn calldata_ops() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),
        Operation::CallDataLoad,
        Operation::CallDataSize,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    current_call_frame.calldata = Bytes::from(vec![0x11; 8]);
    vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(8));
    // the 8 data bytes land at the top of the word, the rest reads as zero
    let mut expected = [0u8; 32];
    expected[..8].copy_from_slice(&[0x11; 8]);
    assert_eq!(
        current_call_frame.stack.pop().unwrap(),
        U256::from_big_endian(&expected)
    );
}

#[test]
fn pc_op_reports_the_instruction_offset() {
    let mut vm = new_vm_with_ops(&[
        Operation::PC,
        Operation::Push((1, U256::zero())),
        Operation::Pop,
        Operation::PC,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(4));
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn jump_to_jumpdest() {
    // 0: PUSH1 4; 2: JUMP; 3: INVALID; 4: JUMPDEST; 5: STOP
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(4))),
        Operation::Jump,
        Operation::Invalid,
        Operation::Jumpdest,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    assert!(report.is_success());
}

#[test]
fn jump_to_non_jumpdest_consumes_all_gas() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(3))),
        Operation::Jump,
        Operation::Invalid,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(report.result, TxResult::Revert(VMError::InvalidJump));
    assert_eq!(report.gas_used, current_call_frame.gas_limit);
}

#[test]
fn jumpi_falls_through_on_zero_condition() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),   // condition
        Operation::Push((1, U256::from(42))), // garbage target, never taken
        Operation::Jumpi,
        Operation::Push((1, U256::from(7))),
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    assert!(report.is_success());
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(7));
}

#[test]
fn log_ops_record_topics_and_data() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((2, U256::from(0xc0de))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((2, U256::from(0xf00d))), // topic
        Operation::Push((1, U256::from(32))),     // size
        Operation::Push((1, U256::zero())),       // offset
        Operation::Log(1),
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(report.logs.len(), 1);
    let log = &report.logs[0];
    assert_eq!(log.address, Address::from_low_u64_be(42));
    assert_eq!(log.topics, vec![H256::from_low_u64_be(0xf00d)]);
    assert_eq!(log.data.len(), 32);
}

#[test]
fn transient_storage_roundtrip() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(55))), // value
        Operation::Push((1, U256::one())),    // key
        Operation::Tstore,
        Operation::Push((1, U256::one())),
        Operation::Tload,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(55));
}

#[test]
fn arithmetic_program_returns_sum() {
    // PUSH1 5; PUSH1 10; ADD; PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; RETURN
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(5))),
        Operation::Push((1, U256::from(10))),
        Operation::Add,
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(32))),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success());
    let mut expected = [0u8; 32];
    expected[31] = 15;
    assert_eq!(report.output, Bytes::from(expected.to_vec()));
    assert_eq!(report.gas_used, 24);
}

#[test]
fn gas_is_monotonically_consumed() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::one())),
        Operation::Add,
        Operation::Pop,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    // 3 + 3 + 3 + 2
    assert_eq!(report.gas_used, 11);
}

#[test]
fn call_writes_callee_return_into_memory() {
    let callee_address = Address::from_low_u64_be(43);
    let mut db = Db::new();
    db.add_accounts(vec![(
        callee_address,
        Account {
            info: AccountInfo {
                nonce: 0,
                balance: U256::zero(),
                bytecode: callee_return_bytecode(U256::from(0xbeef)),
            },
            storage: HashMap::new(),
        },
    )]);

    let mut vm = new_vm_with_ops_db(
        &[
            Operation::Push((1, U256::from(32))),  // ret size
            Operation::Push((1, U256::zero())),    // ret offset
            Operation::Push((1, U256::zero())),    // args size
            Operation::Push((1, U256::zero())),    // args offset
            Operation::Push((1, U256::zero())),    // value
            Operation::Push((20, U256::from(43))), // callee
            Operation::Push((3, U256::from(100_000))),
            Operation::Call,
            Operation::Push((1, U256::zero())),
            Operation::Mload,
            Operation::Stop,
        ],
        db,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success());
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(0xbeef));
    // the CALL itself pushed the success flag
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::one());
    assert_eq!(
        current_call_frame.sub_return_data.len(),
        32,
        "RETURNDATA tracks the callee output"
    );
}

#[test]
fn nested_call_revert_rolls_back_callee_storage() {
    // callee: SSTORE slot 0 = 7, then REVERT with empty data
    let callee_address = Address::from_low_u64_be(43);
    let callee_ops = vec![
        Operation::Push((1, U256::from(7))),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Revert,
    ];
    let mut db = Db::new();
    db.add_accounts(vec![(
        callee_address,
        Account {
            info: AccountInfo {
                nonce: 0,
                balance: U256::zero(),
                bytecode: ops_to_bytecode(&callee_ops).unwrap(),
            },
            storage: HashMap::new(),
        },
    )]);

    let mut vm = new_vm_with_ops_db(
        &[
            Operation::Push((1, U256::zero())),
            Operation::Push((1, U256::zero())),
            Operation::Push((1, U256::zero())),
            Operation::Push((1, U256::zero())),
            Operation::Push((1, U256::zero())),
            Operation::Push((20, U256::from(43))),
            Operation::Push((3, U256::from(100_000))),
            Operation::Call,
            Operation::Stop,
        ],
        db,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success(), "the caller itself still succeeds");
    // CALL pushed 0 for the reverted callee
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
    // and the callee's storage write is gone
    let callee_account = vm.cache.get(&callee_address);
    let slot_value = callee_account
        .and_then(|account| account.storage.get(&H256::zero()))
        .map(|slot| slot.current_value)
        .unwrap_or_default();
    assert_eq!(slot_value, U256::zero());
}

#[test]
fn revert_exposes_return_data_and_spares_gas() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((2, U256::from(0xdead))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(32))),
        Operation::Push((1, U256::zero())),
        Operation::Revert,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(report.result, TxResult::Revert(VMError::RevertOpcode));
    assert_eq!(report.output.len(), 32);
    // gas consumed is only what was actually executed
    assert!(report.gas_used < 100);
}

#[test]
fn sstore_persists_in_cache_after_success() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(9))),
        Operation::Push((1, U256::from(3))),
        Operation::Sstore,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    let account = vm.cache.get(&Address::from_low_u64_be(42)).unwrap();
    let slot = account
        .storage
        .get(&H256::from_low_u64_be(3))
        .copied()
        .unwrap_or(StorageSlot::default());
    assert_eq!(slot.current_value, U256::from(9));
    assert_eq!(slot.original_value, U256::zero());
}

#[test]
fn create2_address_is_deterministic_and_collides_on_redeploy() {
    // init code 0x00 (STOP) deploys an empty contract
    let deploy = |salt: u64| {
        vec![
            Operation::Push((1, U256::from(salt))), // salt
            Operation::Push((1, U256::one())),      // size
            Operation::Push((1, U256::zero())),     // offset
            Operation::Push((1, U256::zero())),     // value
            Operation::Create2,
        ]
    };
    let mut ops = deploy(0);
    ops.extend(deploy(0));
    ops.push(Operation::Stop);

    let mut vm = new_vm_with_ops(&ops).unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    // second deployment with the same (sender, salt, init code) fails
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());

    let first = word_to_address(current_call_frame.stack.pop().unwrap());
    let expected = VM::calculate_create2_address(
        Address::from_low_u64_be(42),
        &Bytes::from(vec![0x00]),
        U256::zero(),
    )
    .unwrap();
    assert_eq!(first, expected);
}

#[test]
fn create_uses_sender_nonce_for_address() {
    let sender = Address::from_low_u64_be(42);
    let expected = VM::calculate_create_address(sender, 0).unwrap();

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),  // size
        Operation::Push((1, U256::zero())), // offset
        Operation::Push((1, U256::zero())), // value
        Operation::Create,
        Operation::Stop,
    ])
    .unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    let created = word_to_address(current_call_frame.stack.pop().unwrap());
    assert_eq!(created, expected);
    // the deployer's nonce moved
    assert_eq!(vm.cache.get(&sender).unwrap().info.nonce, 1);
}

#[test]
fn staticcall_blocks_storage_writes() {
    // callee tries SSTORE under a static frame
    let callee_address = Address::from_low_u64_be(43);
    let callee_ops = vec![
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Stop,
    ];
    let mut db = Db::new();
    db.add_accounts(vec![(
        callee_address,
        Account {
            info: AccountInfo {
                nonce: 0,
                balance: U256::zero(),
                bytecode: ops_to_bytecode(&callee_ops).unwrap(),
            },
            storage: HashMap::new(),
        },
    )]);

    let mut vm = new_vm_with_ops_db(
        &[
            Operation::Push((1, U256::zero())),    // ret size
            Operation::Push((1, U256::zero())),    // ret offset
            Operation::Push((1, U256::zero())),    // args size
            Operation::Push((1, U256::zero())),    // args offset
            Operation::Push((20, U256::from(43))), // callee
            Operation::Push((3, U256::from(100_000))),
            Operation::StaticCall,
            Operation::Stop,
        ],
        db,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success());
    // write protection reported as 0 on the caller's stack, no data back
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
    assert!(current_call_frame.sub_return_data.is_empty());
    // and the storage write never landed
    let callee_account = vm.cache.get(&callee_address);
    let touched = callee_account
        .map(|account| {
            account
                .storage
                .get(&H256::zero())
                .map(|slot| slot.current_value)
                .unwrap_or_default()
        })
        .unwrap_or_default();
    assert_eq!(touched, U256::zero());
}

#[test]
fn call_depth_limit_pushes_zero() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Push((20, U256::from(43))),
        Operation::Push((3, U256::from(100_000))),
        Operation::Call,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    current_call_frame.depth = 1024;
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success());
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn selfbalance_and_balance() {
    let mut vm = new_vm_with_ops(&[
        Operation::SelfBalance,
        Operation::Push((20, U256::from(42))),
        Operation::Balance,
        Operation::Stop,
    ])
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::MAX);
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::MAX);
}

#[test]
fn extcodesize_matches_code_length_and_extcodehash_semantics() {
    let callee_address = Address::from_low_u64_be(43);
    let code = Bytes::from(vec![0x60, 0x01, 0x00]);
    let mut db = Db::new();
    db.add_accounts(vec![(
        callee_address,
        Account {
            info: AccountInfo {
                nonce: 0,
                balance: U256::zero(),
                bytecode: code.clone(),
            },
            storage: HashMap::new(),
        },
    )]);

    let mut vm = new_vm_with_ops_db(
        &[
            Operation::Push((20, U256::from(43))),
            Operation::ExtcodeSize,
            Operation::Push((20, U256::from(999))), // non-existent account
            Operation::ExtcodeHash,
            Operation::Stop,
        ],
        db,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    // EIP-1052: non-existent account hashes to zero
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(3));
}
