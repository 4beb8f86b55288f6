use crate::{
    account::{Account, AccountInfo},
    db::{CacheDB, Db},
    environment::Environment,
    errors::VMError,
    fork::Fork,
    operations::Operation,
    vm::VM,
};
use bytes::Bytes;
use ember_core::{types::TxKind, Address, U256};
use std::{collections::HashMap, sync::Arc};

pub fn ops_to_bytecode(operations: &[Operation]) -> Result<Bytes, VMError> {
    let mut bytecode = Vec::new();
    for op in operations {
        bytecode.extend_from_slice(&op.to_bytecode()?);
    }
    Ok(bytecode.into())
}

pub fn new_vm_with_bytecode(bytecode: Bytes) -> Result<VM, VMError> {
    new_vm_with_ops_addr_bal_db(
        bytecode,
        Address::from_low_u64_be(100),
        U256::MAX,
        Db::new(),
        CacheDB::default(),
        Fork::default(),
    )
}

pub fn new_vm_with_ops(operations: &[Operation]) -> Result<VM, VMError> {
    let bytecode = ops_to_bytecode(operations)?;
    new_vm_with_ops_addr_bal_db(
        bytecode,
        Address::from_low_u64_be(100),
        U256::MAX,
        Db::new(),
        CacheDB::default(),
        Fork::default(),
    )
}

/// Like [`new_vm_with_ops`] but pinned to a specific hardfork.
pub fn new_vm_with_ops_fork(operations: &[Operation], fork: Fork) -> Result<VM, VMError> {
    let bytecode = ops_to_bytecode(operations)?;
    new_vm_with_ops_addr_bal_db(
        bytecode,
        Address::from_low_u64_be(100),
        U256::MAX,
        Db::new(),
        CacheDB::default(),
        fork,
    )
}

pub fn new_vm_with_ops_db(operations: &[Operation], db: Db) -> Result<VM, VMError> {
    let bytecode = ops_to_bytecode(operations)?;
    new_vm_with_ops_addr_bal_db(
        bytecode,
        Address::from_low_u64_be(100),
        U256::MAX,
        db,
        CacheDB::default(),
        Fork::default(),
    )
}

/// This function is for testing purposes only.
pub fn new_vm_with_ops_addr_bal_db(
    contract_bytecode: Bytes,
    sender_address: Address,
    sender_balance: U256,
    mut db: Db,
    mut cache: CacheDB,
    fork: Fork,
) -> Result<VM, VMError> {
    let accounts = [
        // the contract account under execution
        (
            Address::from_low_u64_be(42),
            Account {
                info: AccountInfo {
                    nonce: 0,
                    balance: U256::MAX,
                    bytecode: contract_bytecode,
                },
                storage: HashMap::new(),
            },
        ),
        // the sender account
        (
            sender_address,
            Account {
                info: AccountInfo {
                    nonce: 0,
                    balance: sender_balance,
                    bytecode: Bytes::default(),
                },
                storage: HashMap::new(),
            },
        ),
    ];

    db.add_accounts(accounts.to_vec());

    for (address, account) in &accounts {
        cache.insert(*address, account.clone());
    }

    let mut env = Environment::default_from_address(sender_address);
    env.fork = fork;

    VM::new(
        TxKind::Call(Address::from_low_u64_be(42)),
        env,
        Default::default(),
        Default::default(),
        Arc::new(db),
        cache,
        Vec::new(),
    )
}
