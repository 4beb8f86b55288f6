//! Block-boundary system contracts: beacon roots (EIP-4788), historical
//! block hashes (EIP-2935) and validator withdrawal requests (EIP-7002).
//!
//! All three share the same shape: a fixed address, a ring buffer (or queue)
//! laid out in ordinary account storage, and a privileged system caller that
//! feeds consensus-layer data in at block boundaries. Reads go through the
//! regular CALL path; the host drives the writes through the `apply_*` and
//! `dequeue_*` hooks.

use crate::{
    call_frame::CallFrame,
    constants::{
        BEACON_ROOTS_ADDRESS, BEACON_ROOTS_HISTORY_LENGTH, BLOCK_HASHES_ADDRESS,
        BLOCK_HASHES_HISTORY_LENGTH, MAX_WITHDRAWAL_REQUESTS_PER_BLOCK, SYSTEM_ADDRESS,
        SYSTEM_CALL_GAS_LIMIT, WITHDRAWAL_REQUESTS_ADDRESS,
    },
    errors::{InternalError, VMError},
    fork::ForkSpec,
    gas_cost,
    vm::{word_to_address, VM},
};
use bytes::Bytes;
use ember_core::{Address, BigEndianHash, H256, U256};
use tracing::debug;

// EIP-7002 storage layout
const EXCESS_REQUESTS_SLOT: u64 = 0;
const REQUEST_COUNT_SLOT: u64 = 1;
const QUEUE_HEAD_SLOT: u64 = 2;
const QUEUE_TAIL_SLOT: u64 = 3;
const QUEUE_STORAGE_OFFSET: u64 = 4;
/// Each queued request occupies three consecutive slots.
const SLOTS_PER_REQUEST: u64 = 3;
/// Queue drains faster than it fills when below this many per block.
const TARGET_REQUESTS_PER_BLOCK: u64 = 2;
const MIN_REQUEST_FEE: u64 = 1;
const REQUEST_FEE_UPDATE_FRACTION: u64 = 17;

/// A validator withdrawal request drained from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub source_address: Address,
    pub validator_pubkey: [u8; 48],
    pub amount: u64,
}

pub fn is_system_contract(address: &Address, spec: &ForkSpec) -> bool {
    (*address == BEACON_ROOTS_ADDRESS && spec.eip4788)
        || (*address == BLOCK_HASHES_ADDRESS && spec.eip2935)
        || (*address == WITHDRAWAL_REQUESTS_ADDRESS && spec.eip7002)
}

/// Entry point used by the interpreter when a CALL targets one of the
/// system contracts. A `RevertOpcode` error models the contract reverting.
pub fn execute_system_contract(
    vm: &mut VM,
    current_call_frame: &mut CallFrame,
) -> Result<Bytes, VMError> {
    match current_call_frame.code_address {
        address if address == BEACON_ROOTS_ADDRESS => beacon_roots_call(vm, current_call_frame),
        address if address == BLOCK_HASHES_ADDRESS => block_hashes_call(vm, current_call_frame),
        address if address == WITHDRAWAL_REQUESTS_ADDRESS => {
            withdrawal_requests_call(vm, current_call_frame)
        }
        _ => Err(VMError::Internal(
            InternalError::InvalidSystemContractAddress,
        )),
    }
}

fn slot_key(slot: U256) -> H256 {
    H256::from_uint(&slot)
}

fn read_slot(vm: &mut VM, contract: Address, slot: U256) -> Result<U256, VMError> {
    let (storage_slot, _slot_was_cold) = vm.access_storage_slot(contract, slot_key(slot))?;
    Ok(storage_slot.current_value)
}

fn write_slot(vm: &mut VM, contract: Address, slot: U256, value: U256) -> Result<(), VMError> {
    vm.access_storage_slot(contract, slot_key(slot))?;
    vm.update_account_storage(contract, slot_key(slot), value)
}

/// EIP-4788: `timestamp % 8191` holds the timestamp, `+ 8191` holds the
/// root, so a read can detect that its slot has been overwritten by a
/// wrap-around.
fn beacon_roots_call(vm: &mut VM, current_call_frame: &mut CallFrame) -> Result<Bytes, VMError> {
    let contract = BEACON_ROOTS_ADDRESS;
    let calldata = current_call_frame.calldata.clone();
    let history_length = U256::from(BEACON_ROOTS_HISTORY_LENGTH);

    self_charge(vm, current_call_frame)?;

    if current_call_frame.msg_sender == SYSTEM_ADDRESS {
        if calldata.len() != 64 {
            return Err(VMError::RevertOpcode);
        }
        let timestamp = U256::from_big_endian(
            calldata.get(0..32).ok_or(InternalError::SlicingError)?,
        );
        let root = U256::from_big_endian(
            calldata.get(32..64).ok_or(InternalError::SlicingError)?,
        );

        let timestamp_slot = timestamp
            .checked_rem(history_length)
            .ok_or(VMError::Internal(InternalError::UndefinedState(3)))?;
        let root_slot = timestamp_slot
            .checked_add(history_length)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;

        write_slot(vm, contract, timestamp_slot, timestamp)?;
        write_slot(vm, contract, root_slot, root)?;

        return Ok(Bytes::new());
    }

    if calldata.len() != 32 {
        return Err(VMError::RevertOpcode);
    }
    let timestamp = U256::from_big_endian(calldata.get(0..32).ok_or(InternalError::SlicingError)?);
    if timestamp.is_zero() {
        return Err(VMError::RevertOpcode);
    }

    let timestamp_slot = timestamp
        .checked_rem(history_length)
        .ok_or(VMError::Internal(InternalError::UndefinedState(3)))?;
    let stored_timestamp = read_slot(vm, contract, timestamp_slot)?;
    // a different timestamp in the slot proves the ring has wrapped past it
    if stored_timestamp != timestamp {
        return Err(VMError::RevertOpcode);
    }

    let root_slot = timestamp_slot
        .checked_add(history_length)
        .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
    let root = read_slot(vm, contract, root_slot)?;

    let mut output = [0u8; 32];
    root.to_big_endian(&mut output);
    Ok(Bytes::from(output.to_vec()))
}

/// EIP-2935: a plain `number % 8192` ring without reverse verification;
/// validity comes from the window check against the current block number.
fn block_hashes_call(vm: &mut VM, current_call_frame: &mut CallFrame) -> Result<Bytes, VMError> {
    let contract = BLOCK_HASHES_ADDRESS;
    let calldata = current_call_frame.calldata.clone();
    let history_length = U256::from(BLOCK_HASHES_HISTORY_LENGTH);

    self_charge(vm, current_call_frame)?;

    if current_call_frame.msg_sender == SYSTEM_ADDRESS {
        if calldata.len() != 32 {
            return Err(VMError::RevertOpcode);
        }
        // the system feeds in the parent hash; it lands at parent number mod N
        let parent_hash = U256::from_big_endian(
            calldata.get(0..32).ok_or(InternalError::SlicingError)?,
        );
        let parent_number = vm
            .env
            .block_number
            .checked_sub(U256::one())
            .ok_or(VMError::RevertOpcode)?;
        let slot = parent_number
            .checked_rem(history_length)
            .ok_or(VMError::Internal(InternalError::UndefinedState(3)))?;
        write_slot(vm, contract, slot, parent_hash)?;
        return Ok(Bytes::new());
    }

    if calldata.len() != 32 {
        return Err(VMError::RevertOpcode);
    }
    let requested = U256::from_big_endian(calldata.get(0..32).ok_or(InternalError::SlicingError)?);

    // only the last 8192 ancestors are servable
    let current = vm.env.block_number;
    if requested >= current {
        return Err(VMError::RevertOpcode);
    }
    let distance = current
        .checked_sub(requested)
        .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))?;
    if distance > history_length {
        return Err(VMError::RevertOpcode);
    }

    let slot = requested
        .checked_rem(history_length)
        .ok_or(VMError::Internal(InternalError::UndefinedState(3)))?;
    let hash = read_slot(vm, contract, slot)?;

    let mut output = [0u8; 32];
    hash.to_big_endian(&mut output);
    Ok(Bytes::from(output.to_vec()))
}

/// EIP-7002: a fee-metered queue of validator withdrawal requests, drained
/// by the system caller at most 16 per block.
fn withdrawal_requests_call(
    vm: &mut VM,
    current_call_frame: &mut CallFrame,
) -> Result<Bytes, VMError> {
    let contract = WITHDRAWAL_REQUESTS_ADDRESS;
    let calldata = current_call_frame.calldata.clone();

    self_charge(vm, current_call_frame)?;

    if current_call_frame.msg_sender == SYSTEM_ADDRESS {
        if !calldata.is_empty() {
            return Err(VMError::RevertOpcode);
        }
        return drain_withdrawal_queue(vm, contract);
    }

    // fee getter
    if calldata.is_empty() {
        let fee = current_request_fee(vm, contract)?;
        let mut output = [0u8; 32];
        fee.to_big_endian(&mut output);
        return Ok(Bytes::from(output.to_vec()));
    }

    // adding a request: 48-byte validator pubkey plus 8-byte amount
    if calldata.len() != 56 {
        return Err(VMError::RevertOpcode);
    }
    let fee = current_request_fee(vm, contract)?;
    if current_call_frame.msg_value < fee {
        return Err(VMError::RevertOpcode);
    }

    let tail = read_slot(vm, contract, U256::from(QUEUE_TAIL_SLOT))?;
    let base_slot = U256::from(QUEUE_STORAGE_OFFSET)
        .checked_add(
            tail.checked_mul(U256::from(SLOTS_PER_REQUEST))
                .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?,
        )
        .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;

    // slot 0: source address; slot 1: pubkey[0..32];
    // slot 2: pubkey[32..48] ++ amount, left-aligned
    let source = crate::vm::address_to_word(current_call_frame.msg_sender);
    write_slot(vm, contract, base_slot, source)?;

    let pubkey_head = U256::from_big_endian(
        calldata.get(0..32).ok_or(InternalError::SlicingError)?,
    );
    write_slot(
        vm,
        contract,
        base_slot
            .checked_add(U256::one())
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?,
        pubkey_head,
    )?;

    let mut tail_word = [0u8; 32];
    tail_word
        .get_mut(0..16)
        .ok_or(InternalError::SlicingError)?
        .copy_from_slice(calldata.get(32..48).ok_or(InternalError::SlicingError)?);
    tail_word
        .get_mut(16..24)
        .ok_or(InternalError::SlicingError)?
        .copy_from_slice(calldata.get(48..56).ok_or(InternalError::SlicingError)?);
    write_slot(
        vm,
        contract,
        base_slot
            .checked_add(U256::from(2))
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?,
        U256::from_big_endian(&tail_word),
    )?;

    write_slot(
        vm,
        contract,
        U256::from(QUEUE_TAIL_SLOT),
        tail.checked_add(U256::one())
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?,
    )?;
    let count = read_slot(vm, contract, U256::from(REQUEST_COUNT_SLOT))?;
    write_slot(
        vm,
        contract,
        U256::from(REQUEST_COUNT_SLOT),
        count
            .checked_add(U256::one())
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?,
    )?;

    Ok(Bytes::new())
}

/// fee = MIN_FEE * e**(excess / FRACTION), the same curve blob pricing uses.
fn current_request_fee(vm: &mut VM, contract: Address) -> Result<U256, VMError> {
    let excess = read_slot(vm, contract, U256::from(EXCESS_REQUESTS_SLOT))?;
    gas_cost::fake_exponential(
        U256::from(MIN_REQUEST_FEE),
        excess,
        U256::from(REQUEST_FEE_UPDATE_FRACTION),
    )
}

fn drain_withdrawal_queue(vm: &mut VM, contract: Address) -> Result<Bytes, VMError> {
    let head = read_slot(vm, contract, U256::from(QUEUE_HEAD_SLOT))?;
    let tail = read_slot(vm, contract, U256::from(QUEUE_TAIL_SLOT))?;

    let queued = tail
        .checked_sub(head)
        .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))?;
    let to_dequeue = queued.min(U256::from(MAX_WITHDRAWAL_REQUESTS_PER_BLOCK));

    let mut output = Vec::new();
    let mut index = U256::zero();
    while index < to_dequeue {
        let request_slot = U256::from(QUEUE_STORAGE_OFFSET)
            .checked_add(
                head.checked_add(index)
                    .and_then(|position| position.checked_mul(U256::from(SLOTS_PER_REQUEST)))
                    .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?,
            )
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;

        let source_word = read_slot(vm, contract, request_slot)?;
        let pubkey_head = read_slot(
            vm,
            contract,
            request_slot
                .checked_add(U256::one())
                .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?,
        )?;
        let pubkey_tail_and_amount = read_slot(
            vm,
            contract,
            request_slot
                .checked_add(U256::from(2))
                .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?,
        )?;

        // 76-byte record: source address ++ pubkey ++ amount
        let source = word_to_address(source_word);
        output.extend_from_slice(source.as_bytes());
        let mut word = [0u8; 32];
        pubkey_head.to_big_endian(&mut word);
        output.extend_from_slice(&word);
        pubkey_tail_and_amount.to_big_endian(&mut word);
        output.extend_from_slice(word.get(0..16).ok_or(InternalError::SlicingError)?);
        output.extend_from_slice(word.get(16..24).ok_or(InternalError::SlicingError)?);

        index = index
            .checked_add(U256::one())
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
    }

    let new_head = head
        .checked_add(to_dequeue)
        .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
    if new_head == tail {
        // empty queue resets to the start of the buffer
        write_slot(vm, contract, U256::from(QUEUE_HEAD_SLOT), U256::zero())?;
        write_slot(vm, contract, U256::from(QUEUE_TAIL_SLOT), U256::zero())?;
    } else {
        write_slot(vm, contract, U256::from(QUEUE_HEAD_SLOT), new_head)?;
    }

    // fee accounting: excess grows when the block saw more than the target
    let count = read_slot(vm, contract, U256::from(REQUEST_COUNT_SLOT))?;
    let excess = read_slot(vm, contract, U256::from(EXCESS_REQUESTS_SLOT))?;
    let new_excess = excess
        .checked_add(count)
        .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?
        .saturating_sub(U256::from(TARGET_REQUESTS_PER_BLOCK));
    write_slot(vm, contract, U256::from(EXCESS_REQUESTS_SLOT), new_excess)?;
    write_slot(vm, contract, U256::from(REQUEST_COUNT_SLOT), U256::zero())?;

    Ok(Bytes::from(output))
}

/// Flat metering for system-contract execution; the pseudo-code these
/// contracts replace costs a few storage accesses per call.
fn self_charge(vm: &mut VM, current_call_frame: &mut CallFrame) -> Result<(), VMError> {
    vm.increase_consumed_gas(
        current_call_frame,
        gas_cost::COLD_STORAGE_ACCESS_COST,
    )
}

// Host hooks, invoked at block boundaries outside any transaction.

/// EIP-4788 ingestion hook: records the parent beacon root for this block's
/// timestamp. No-op when the fork predates Cancun or no root was supplied.
pub fn apply_beacon_root(vm: &mut VM) -> Result<(), VMError> {
    if !vm.spec.eip4788 {
        return Ok(());
    }
    let Some(beacon_root) = vm.env.beacon_root else {
        return Ok(());
    };

    let mut calldata = Vec::with_capacity(64);
    let mut timestamp_bytes = [0u8; 32];
    vm.env.timestamp.to_big_endian(&mut timestamp_bytes);
    calldata.extend_from_slice(&timestamp_bytes);
    calldata.extend_from_slice(beacon_root.as_bytes());

    debug!(timestamp = ?vm.env.timestamp, "applying beacon root");
    run_system_call(vm, BEACON_ROOTS_ADDRESS, Bytes::from(calldata)).map(|_| ())
}

/// EIP-2935 ingestion hook: records the parent block hash. No-op before
/// Prague and at the genesis block.
pub fn apply_block_hash(vm: &mut VM, parent_hash: H256) -> Result<(), VMError> {
    if !vm.spec.eip2935 || vm.env.block_number.is_zero() {
        return Ok(());
    }
    debug!(block = ?vm.env.block_number, "applying parent block hash");
    run_system_call(vm, BLOCK_HASHES_ADDRESS, Bytes::from(parent_hash.as_bytes().to_vec()))
        .map(|_| ())
}

/// EIP-7002 drain hook: pops up to 16 queued withdrawal requests for
/// inclusion in the block.
pub fn dequeue_withdrawal_requests(vm: &mut VM) -> Result<Vec<WithdrawalRequest>, VMError> {
    if !vm.spec.eip7002 {
        return Ok(Vec::new());
    }
    let output = run_system_call(vm, WITHDRAWAL_REQUESTS_ADDRESS, Bytes::new())?;

    let mut requests = Vec::new();
    for record in output.chunks(76) {
        if record.len() != 76 {
            return Err(VMError::Internal(InternalError::SlicingError));
        }
        let source_address =
            Address::from_slice(record.get(0..20).ok_or(InternalError::SlicingError)?);
        let mut validator_pubkey = [0u8; 48];
        validator_pubkey
            .copy_from_slice(record.get(20..68).ok_or(InternalError::SlicingError)?);
        let mut amount_bytes = [0u8; 8];
        amount_bytes.copy_from_slice(record.get(68..76).ok_or(InternalError::SlicingError)?);
        requests.push(WithdrawalRequest {
            source_address,
            validator_pubkey,
            amount: u64::from_be_bytes(amount_bytes),
        });
    }
    Ok(requests)
}

fn run_system_call(vm: &mut VM, contract: Address, calldata: Bytes) -> Result<Bytes, VMError> {
    let mut frame = CallFrame::new(
        SYSTEM_ADDRESS,
        contract,
        contract,
        Bytes::new(),
        U256::zero(),
        calldata,
        false,
        SYSTEM_CALL_GAS_LIMIT,
        0,
        0,
        false,
    );
    execute_system_contract(vm, &mut frame)
}
