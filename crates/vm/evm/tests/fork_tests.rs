#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use ember_core::{types::TxKind, Address, U256};
use ember_evm::{
    account::{Account, AccountInfo},
    db::{CacheDB, Db},
    environment::Environment,
    errors::{TxResult, VMError},
    fork::Fork,
    operations::Operation,
    utils::{new_vm_with_ops_fork, ops_to_bytecode},
    vm::VM,
};
use std::{collections::HashMap, sync::Arc};

#[test]
fn push0_is_invalid_before_shanghai() {
    let mut vm = new_vm_with_ops_fork(&[Operation::Push0, Operation::Stop], Fork::Berlin).unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert_eq!(report.result, TxResult::Revert(VMError::InvalidOpcode));
    assert_eq!(report.gas_used, current_call_frame.gas_limit);
}

#[test]
fn push0_pushes_zero_from_shanghai() {
    let mut vm = new_vm_with_ops_fork(&[Operation::Push0, Operation::Stop], Fork::Shanghai).unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success());
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(report.gas_used, 2);
}

#[test]
fn shifts_are_invalid_before_constantinople() {
    let mut vm = new_vm_with_ops_fork(
        &[
            Operation::Push((1, U256::one())),
            Operation::Push((1, U256::one())),
            Operation::Shl,
            Operation::Stop,
        ],
        Fork::Byzantium,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(report.result, TxResult::Revert(VMError::InvalidOpcode));
}

#[test]
fn transient_storage_is_invalid_before_cancun() {
    let mut vm = new_vm_with_ops_fork(
        &[
            Operation::Push((1, U256::one())),
            Operation::Tload,
            Operation::Stop,
        ],
        Fork::Shanghai,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(report.result, TxResult::Revert(VMError::InvalidOpcode));
}

#[test]
fn mcopy_is_invalid_before_cancun() {
    let mut vm = new_vm_with_ops_fork(
        &[
            Operation::Push((1, U256::zero())),
            Operation::Push((1, U256::zero())),
            Operation::Push((1, U256::zero())),
            Operation::Mcopy,
            Operation::Stop,
        ],
        Fork::Shanghai,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(report.result, TxResult::Revert(VMError::InvalidOpcode));
}

#[test]
fn basefee_needs_london() {
    let mut vm =
        new_vm_with_ops_fork(&[Operation::Basefee, Operation::Stop], Fork::Berlin).unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(report.result, TxResult::Revert(VMError::InvalidOpcode));

    let mut vm =
        new_vm_with_ops_fork(&[Operation::Basefee, Operation::Stop], Fork::London).unwrap();
    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    assert!(report.is_success());
}

#[test]
fn sstore_cold_set_then_warm_sload() {
    // London, slot originally 0: SSTORE of 1 costs 2100 (cold) + 20000 (set),
    // the following SLOAD of the same slot costs 100 (warm), no refunds.
    let mut vm = new_vm_with_ops_fork(
        &[
            Operation::Push((1, U256::one())),  // value
            Operation::Push((1, U256::zero())), // key
            Operation::Sstore,
            Operation::Push((1, U256::zero())),
            Operation::Sload,
            Operation::Stop,
        ],
        Fork::London,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success());
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::one());
    // 3 pushes (9) + 22100 + 100
    assert_eq!(report.gas_used, 9 + 22100 + 100);
    assert_eq!(report.gas_refunded, 0);
}

#[test]
fn sstore_restoring_zero_earns_a_refund() {
    // writing 1 then 0 to a slot whose original value is 0 restores the
    // original: 19900 lands in the refund counter
    let mut vm = new_vm_with_ops_fork(
        &[
            Operation::Push((1, U256::one())),
            Operation::Push((1, U256::zero())),
            Operation::Sstore,
            Operation::Push((1, U256::zero())),
            Operation::Push((1, U256::zero())),
            Operation::Sstore,
            Operation::Stop,
        ],
        Fork::London,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();

    assert!(report.is_success());
    assert_eq!(report.gas_refunded, 19900);
}

#[test]
fn sload_pricing_before_berlin_is_flat() {
    let mut vm = new_vm_with_ops_fork(
        &[
            Operation::Push((1, U256::zero())),
            Operation::Sload,
            Operation::Stop,
        ],
        Fork::Istanbul,
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    // push (3) + EIP-1884 SLOAD (800)
    assert_eq!(report.gas_used, 803);
}

#[test]
fn selfdestruct_only_schedules_deletion_before_cancun() {
    let contract = Address::from_low_u64_be(42);
    let beneficiary = Address::from_low_u64_be(77);

    let run = |fork: Fork| {
        let mut vm = new_vm_with_ops_fork(
            &[
                Operation::Push((20, U256::from(77))),
                Operation::SelfDestruct,
            ],
            fork,
        )
        .unwrap();
        let mut current_call_frame = vm.call_frames.pop().unwrap();
        let report = vm.execute(&mut current_call_frame).unwrap();
        assert!(report.is_success());
        vm
    };

    // London: pre-existing contracts still get destroyed
    let vm = run(Fork::London);
    assert!(vm.accrued_substate.selfdestruct_set.contains(&contract));

    // Cancun (EIP-6780): the account was not created in this transaction,
    // so it is merely drained
    let vm = run(Fork::Cancun);
    assert!(!vm.accrued_substate.selfdestruct_set.contains(&contract));
    let drained = vm.cache.get(&contract).unwrap();
    assert_eq!(drained.info.balance, U256::zero());
    let funded = vm.cache.get(&beneficiary).unwrap();
    assert_eq!(funded.info.balance, U256::MAX);
}

fn vm_for_transact(ops: &[Operation], fork: Fork, gas_limit: u64) -> VM {
    let sender_address = Address::from_low_u64_be(100);
    let contract_address = Address::from_low_u64_be(42);

    let mut db = Db::new();
    db.add_accounts(vec![
        (
            contract_address,
            Account {
                info: AccountInfo {
                    nonce: 1,
                    balance: U256::zero(),
                    bytecode: ops_to_bytecode(ops).unwrap(),
                },
                storage: HashMap::new(),
            },
        ),
        (
            sender_address,
            Account {
                info: AccountInfo {
                    nonce: 0,
                    balance: U256::MAX,
                    bytecode: Bytes::new(),
                },
                storage: HashMap::new(),
            },
        ),
    ]);

    let mut env = Environment::default_from_address(sender_address);
    env.fork = fork;
    env.gas_limit = gas_limit;
    env.block_gas_limit = 30_000_000;
    env.gas_price = U256::one();

    VM::new(
        TxKind::Call(contract_address),
        env,
        U256::zero(),
        Bytes::new(),
        Arc::new(db),
        CacheDB::default(),
        Vec::new(),
    )
    .unwrap()
}

#[test]
fn refunds_are_capped_to_a_fifth_of_gas_used_after_london() {
    let ops = [
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Stop,
    ];
    let mut vm = vm_for_transact(&ops, Fork::London, 100_000);
    let report = vm.transact().unwrap();

    assert!(report.is_success());
    // 19900 was accumulated but the cap is gas_used / 5
    assert_eq!(report.gas_refunded, report.gas_used / 5);
    assert!(report.gas_refunded < 19900);
}

#[test]
fn transact_charges_intrinsic_gas_and_bumps_nonce() {
    let ops = [Operation::Stop];
    let mut vm = vm_for_transact(&ops, Fork::Cancun, 100_000);
    let report = vm.transact().unwrap();

    assert!(report.is_success());
    assert_eq!(report.gas_used, 21000);
    let sender = vm.cache.get(&Address::from_low_u64_be(100)).unwrap();
    assert_eq!(sender.info.nonce, 1);
}

#[test]
fn intrinsic_gas_too_low_rejects_the_transaction() {
    let ops = [Operation::Stop];
    let mut vm = vm_for_transact(&ops, Fork::Cancun, 20_000);
    let result = vm.transact();
    assert!(matches!(
        result,
        Err(VMError::TxValidation(
            ember_evm::errors::TxValidationError::IntrinsicGasTooLow
        ))
    ));
}

#[test]
fn chain_overrides_can_disable_an_eip() {
    // a chain that switches PUSH0 off even on Cancun
    let sender_address = Address::from_low_u64_be(100);
    let mut db = Db::new();
    db.add_accounts(vec![(
        Address::from_low_u64_be(42),
        Account {
            info: AccountInfo {
                nonce: 1,
                balance: U256::zero(),
                bytecode: ops_to_bytecode(&[Operation::Push0, Operation::Stop]).unwrap(),
            },
            storage: HashMap::new(),
        },
    )]);

    let mut env = Environment::default_from_address(sender_address);
    env.fork = Fork::Cancun;
    env.eip_overrides = vec![(3855, false)];

    let mut vm = VM::new(
        TxKind::Call(Address::from_low_u64_be(42)),
        env,
        U256::zero(),
        Bytes::new(),
        Arc::new(db),
        CacheDB::default(),
        Vec::new(),
    )
    .unwrap();

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    let report = vm.execute(&mut current_call_frame).unwrap();
    assert_eq!(report.result, TxResult::Revert(VMError::InvalidOpcode));
}

#[test]
fn blockhash_respects_the_256_block_window() {
    let mut db = Db::new();
    db.add_block_hashes(vec![
        (9999, ember_core::H256::from_low_u64_be(0xaa)),
        (9000, ember_core::H256::from_low_u64_be(0xbb)),
    ]);
    let mut vm = ember_evm::utils::new_vm_with_ops_db(
        &[
            Operation::Push((2, U256::from(9999))),
            Operation::BlockHash,
            Operation::Push((2, U256::from(9000))),
            Operation::BlockHash,
            Operation::Stop,
        ],
        db,
    )
    .unwrap();
    vm.env.block_number = U256::from(10_000);

    let mut current_call_frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut current_call_frame).unwrap();

    // 9000 is out of the window, 9999 is in it
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(current_call_frame.stack.pop().unwrap(), U256::from(0xaa));
}
