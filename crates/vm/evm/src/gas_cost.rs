/// Gas schedule: named constants for every opcode tier and EIP-priced
/// operation, plus the dynamic-cost formulas that combine them.
use crate::{
    account::StorageSlot,
    constants::WORD_SIZE,
    errors::{InternalError, OutOfGasError, VMError},
    fork::ForkSpec,
};
use bytes::Bytes;
use ember_core::U256;

// Arithmetic
pub const ADD: u64 = 3;
pub const MUL: u64 = 5;
pub const SUB: u64 = 3;
pub const DIV: u64 = 5;
pub const SDIV: u64 = 5;
pub const MOD: u64 = 5;
pub const SMOD: u64 = 5;
pub const ADDMOD: u64 = 8;
pub const MULMOD: u64 = 8;
pub const EXP_STATIC: u64 = 10;
pub const EXP_DYNAMIC_BASE: u64 = 50;
/// Per-byte EXP price before EIP-160.
pub const EXP_DYNAMIC_BASE_PRE_SPURIOUS: u64 = 10;
pub const SIGNEXTEND: u64 = 5;

// Comparison & bitwise
pub const LT: u64 = 3;
pub const GT: u64 = 3;
pub const SLT: u64 = 3;
pub const SGT: u64 = 3;
pub const EQ: u64 = 3;
pub const ISZERO: u64 = 3;
pub const AND: u64 = 3;
pub const OR: u64 = 3;
pub const XOR: u64 = 3;
pub const NOT: u64 = 3;
pub const BYTE: u64 = 3;
pub const SHL: u64 = 3;
pub const SHR: u64 = 3;
pub const SAR: u64 = 3;

pub const KECCAK256_STATIC: u64 = 30;
pub const KECCAK256_DYNAMIC_BASE: u64 = 6;

// Environment
pub const ADDRESS: u64 = 2;
pub const ORIGIN: u64 = 2;
pub const CALLER: u64 = 2;
pub const CALLVALUE: u64 = 2;
pub const CALLDATALOAD: u64 = 3;
pub const CALLDATASIZE: u64 = 2;
pub const CALLDATACOPY_STATIC: u64 = 3;
pub const CALLDATACOPY_DYNAMIC_BASE: u64 = 3;
pub const CODESIZE: u64 = 2;
pub const CODECOPY_STATIC: u64 = 3;
pub const CODECOPY_DYNAMIC_BASE: u64 = 3;
pub const GASPRICE: u64 = 2;
pub const EXTCODECOPY_DYNAMIC_BASE: u64 = 3;
pub const RETURNDATASIZE: u64 = 2;
pub const RETURNDATACOPY_STATIC: u64 = 3;
pub const RETURNDATACOPY_DYNAMIC_BASE: u64 = 3;

// Block information
pub const BLOCKHASH: u64 = 20;
pub const COINBASE: u64 = 2;
pub const TIMESTAMP: u64 = 2;
pub const NUMBER: u64 = 2;
pub const PREVRANDAO: u64 = 2;
pub const GASLIMIT: u64 = 2;
pub const CHAINID: u64 = 2;
pub const SELFBALANCE: u64 = 5;
pub const BASEFEE: u64 = 2;
pub const BLOBHASH: u64 = 3;
pub const BLOBBASEFEE: u64 = 2;

// Stack, memory, flow
pub const POP: u64 = 2;
pub const MLOAD_STATIC: u64 = 3;
pub const MSTORE_STATIC: u64 = 3;
pub const MSTORE8_STATIC: u64 = 3;
pub const JUMP: u64 = 8;
pub const JUMPI: u64 = 10;
pub const PC: u64 = 2;
pub const MSIZE: u64 = 2;
pub const GAS: u64 = 2;
pub const JUMPDEST: u64 = 1;
pub const TLOAD: u64 = 100;
pub const TSTORE: u64 = 100;
pub const MCOPY_STATIC: u64 = 3;
pub const MCOPY_DYNAMIC_BASE: u64 = 3;
pub const PUSH0: u64 = 2;
pub const PUSHN: u64 = 3;
pub const DUPN: u64 = 3;
pub const SWAPN: u64 = 3;

// Logging
pub const LOGN_STATIC: u64 = 375;
pub const LOGN_DYNAMIC_BASE: u64 = 375;
pub const LOGN_DYNAMIC_BYTE_BASE: u64 = 8;

// EIP-2929 access pricing
pub const WARM_ADDRESS_ACCESS_COST: u64 = 100;
pub const COLD_ADDRESS_ACCESS_COST: u64 = 2600;
pub const COLD_STORAGE_ACCESS_COST: u64 = 2100;
/// SLOAD between Istanbul (EIP-1884) and Berlin.
pub const SLOAD_STATIC_PRE_BERLIN: u64 = 800;
/// SLOAD between Tangerine Whistle and Istanbul.
pub const SLOAD_STATIC_PRE_ISTANBUL: u64 = 200;

// SSTORE (EIP-2200 / 2929 / 3529)
pub const SSTORE_SET: u64 = 20000;
pub const SSTORE_RESET: u64 = 5000;
/// RESET discounted by the cold surcharge, charged separately under EIP-2929.
pub const SSTORE_RESET_POST_BERLIN: u64 = 2900;
/// Writes abort when less than this much gas remains (EIP-2200 sentry).
pub const SSTORE_SENTRY: u64 = 2300;
/// Clearing refund after EIP-3529.
pub const SSTORE_CLEARS_REFUND: u64 = 4800;
/// Clearing refund before EIP-3529.
pub const SSTORE_CLEARS_REFUND_PRE_LONDON: u64 = 15000;

// Call family
pub const CALL_BASE_PRE_BERLIN: u64 = 700;
/// BALANCE/EXTCODE*-style account reads before EIP-2929.
pub const EXTERNAL_ACCOUNT_ACCESS_PRE_BERLIN: u64 = 700;
pub const NON_ZERO_VALUE_COST: u64 = 9000;
pub const NEW_ACCOUNT_COST: u64 = 25000;
/// Gas gifted to the callee of a value-bearing CALL, on top of the
/// forwarded gas; it cannot be withheld by the caller.
pub const CALL_STIPEND: u64 = 2300;

// CREATE
pub const CREATE_BASE_COST: u64 = 32000;
pub const CODE_DEPOSIT_COST: u64 = 200;
/// EIP-3860 initcode word gas.
pub const INIT_CODE_WORD_COST: u64 = 2;

// SELFDESTRUCT
pub const SELFDESTRUCT_STATIC: u64 = 5000;
pub const SELFDESTRUCT_DYNAMIC: u64 = 25000;
/// Refund before EIP-3529 removed it.
pub const SELFDESTRUCT_REFUND_PRE_LONDON: u64 = 24000;

// Transactions
pub const TX_BASE_COST: u64 = 21000;
pub const TX_DATA_COST_PER_ZERO_BYTE: u64 = 4;
pub const TX_DATA_COST_PER_NON_ZERO_BYTE: u64 = 16;
/// Per non-zero byte before EIP-2028.
pub const TX_DATA_COST_PER_NON_ZERO_BYTE_PRE_ISTANBUL: u64 = 68;
pub const ACCESS_LIST_ADDRESS_COST: u64 = 2400;
pub const ACCESS_LIST_STORAGE_KEY_COST: u64 = 1900;

// Blobs (EIP-4844)
pub const BLOB_GAS_PER_BLOB: u64 = 131072;

// Precompiles
pub const ECRECOVER_COST: u64 = 3000;
pub const SHA2_256_STATIC_COST: u64 = 60;
pub const SHA2_256_DYNAMIC_BASE: u64 = 12;
pub const RIPEMD_160_STATIC_COST: u64 = 600;
pub const RIPEMD_160_DYNAMIC_BASE: u64 = 120;
pub const IDENTITY_STATIC_COST: u64 = 15;
pub const IDENTITY_DYNAMIC_BASE: u64 = 3;
pub const MODEXP_STATIC_COST: u64 = 200;
pub const ECADD_COST: u64 = 150;
pub const ECADD_COST_PRE_ISTANBUL: u64 = 500;
pub const ECMUL_COST: u64 = 6000;
pub const ECMUL_COST_PRE_ISTANBUL: u64 = 40000;
pub const ECPAIRING_BASE_COST: u64 = 45000;
pub const ECPAIRING_PER_PAIRING_COST: u64 = 34000;
pub const ECPAIRING_BASE_COST_PRE_ISTANBUL: u64 = 100000;
pub const ECPAIRING_PER_PAIRING_COST_PRE_ISTANBUL: u64 = 80000;
pub const BLAKE2F_ROUND_COST: u64 = 1;
pub const POINT_EVALUATION_COST: u64 = 50000;

/// Refund change produced by one SSTORE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefundDelta {
    pub added: u64,
    pub removed: u64,
}

/// `ceil(size / 32)`
pub fn minimum_word_size(size: usize) -> Result<u64, OutOfGasError> {
    let words = size.div_ceil(WORD_SIZE);
    u64::try_from(words).map_err(|_| OutOfGasError::GasCostOverflow)
}

fn copy_cost(static_cost: u64, dynamic_base: u64, size: usize) -> Result<u64, OutOfGasError> {
    let word_cost = dynamic_base
        .checked_mul(minimum_word_size(size)?)
        .ok_or(OutOfGasError::GasCostOverflow)?;
    static_cost
        .checked_add(word_cost)
        .ok_or(OutOfGasError::GasCostOverflow)
}

fn add_memory_expansion(cost: u64, memory_expansion_cost: u64) -> Result<u64, OutOfGasError> {
    cost.checked_add(memory_expansion_cost)
        .ok_or(OutOfGasError::GasCostOverflow)
}

pub fn exp(exponent: U256, spec: &ForkSpec) -> Result<u64, OutOfGasError> {
    // bits() is at most 256, so the byte size always fits
    let exponent_byte_size =
        u64::try_from(exponent.bits().div_ceil(8)).map_err(|_| OutOfGasError::GasCostOverflow)?;
    let per_byte = if spec.eip160 {
        EXP_DYNAMIC_BASE
    } else {
        EXP_DYNAMIC_BASE_PRE_SPURIOUS
    };
    let dynamic_cost = per_byte
        .checked_mul(exponent_byte_size)
        .ok_or(OutOfGasError::GasCostOverflow)?;
    EXP_STATIC
        .checked_add(dynamic_cost)
        .ok_or(OutOfGasError::GasCostOverflow)
}

pub fn keccak256(size: usize, memory_expansion_cost: u64) -> Result<u64, OutOfGasError> {
    let cost = copy_cost(KECCAK256_STATIC, KECCAK256_DYNAMIC_BASE, size)?;
    add_memory_expansion(cost, memory_expansion_cost)
}

pub fn calldatacopy(size: usize, memory_expansion_cost: u64) -> Result<u64, OutOfGasError> {
    let cost = copy_cost(CALLDATACOPY_STATIC, CALLDATACOPY_DYNAMIC_BASE, size)?;
    add_memory_expansion(cost, memory_expansion_cost)
}

pub fn codecopy(size: usize, memory_expansion_cost: u64) -> Result<u64, OutOfGasError> {
    let cost = copy_cost(CODECOPY_STATIC, CODECOPY_DYNAMIC_BASE, size)?;
    add_memory_expansion(cost, memory_expansion_cost)
}

pub fn returndatacopy(size: usize, memory_expansion_cost: u64) -> Result<u64, OutOfGasError> {
    let cost = copy_cost(RETURNDATACOPY_STATIC, RETURNDATACOPY_DYNAMIC_BASE, size)?;
    add_memory_expansion(cost, memory_expansion_cost)
}

pub fn mcopy(size: usize, memory_expansion_cost: u64) -> Result<u64, OutOfGasError> {
    let cost = copy_cost(MCOPY_STATIC, MCOPY_DYNAMIC_BASE, size)?;
    add_memory_expansion(cost, memory_expansion_cost)
}

pub fn extcodecopy(
    size: usize,
    memory_expansion_cost: u64,
    address_was_cold: bool,
    spec: &ForkSpec,
) -> Result<u64, OutOfGasError> {
    let word_cost = EXTCODECOPY_DYNAMIC_BASE
        .checked_mul(minimum_word_size(size)?)
        .ok_or(OutOfGasError::GasCostOverflow)?;
    let access_cost = address_access_cost(address_was_cold, EXTERNAL_ACCOUNT_ACCESS_PRE_BERLIN, spec);
    word_cost
        .checked_add(access_cost)
        .ok_or(OutOfGasError::GasCostOverflow)?
        .checked_add(memory_expansion_cost)
        .ok_or(OutOfGasError::GasCostOverflow)
}

pub fn log(topic_count: u64, size: usize, memory_expansion_cost: u64) -> Result<u64, OutOfGasError> {
    let topics_cost = LOGN_DYNAMIC_BASE
        .checked_mul(topic_count)
        .ok_or(OutOfGasError::GasCostOverflow)?;
    let bytes_cost = LOGN_DYNAMIC_BYTE_BASE
        .checked_mul(u64::try_from(size).map_err(|_| OutOfGasError::GasCostOverflow)?)
        .ok_or(OutOfGasError::GasCostOverflow)?;
    LOGN_STATIC
        .checked_add(topics_cost)
        .and_then(|cost| cost.checked_add(bytes_cost))
        .and_then(|cost| cost.checked_add(memory_expansion_cost))
        .ok_or(OutOfGasError::GasCostOverflow)
}

/// Account-observing opcode pricing: cold/warm under EIP-2929, the given
/// flat price before it.
pub fn address_access_cost(address_was_cold: bool, pre_berlin_cost: u64, spec: &ForkSpec) -> u64 {
    if spec.eip2929 {
        if address_was_cold {
            COLD_ADDRESS_ACCESS_COST
        } else {
            WARM_ADDRESS_ACCESS_COST
        }
    } else {
        pre_berlin_cost
    }
}

pub fn sload(slot_was_cold: bool, spec: &ForkSpec) -> u64 {
    if spec.eip2929 {
        if slot_was_cold {
            COLD_STORAGE_ACCESS_COST
        } else {
            WARM_ADDRESS_ACCESS_COST
        }
    } else if spec.eip1884 {
        SLOAD_STATIC_PRE_BERLIN
    } else {
        SLOAD_STATIC_PRE_ISTANBUL
    }
}

/// SSTORE pricing with net gas metering (EIP-2200) under EIP-2929 access
/// pricing, with refund bookkeeping reduced per EIP-3529.
///
/// The caller is responsible for the 2300-gas sentry and for adding the
/// cold-slot surcharge exactly once.
pub fn sstore(
    slot: &StorageSlot,
    new_value: U256,
    slot_was_cold: bool,
    spec: &ForkSpec,
) -> Result<(u64, RefundDelta), OutOfGasError> {
    let original = slot.original_value;
    let current = slot.current_value;

    let (noop_cost, reset_cost) = if spec.eip2929 {
        // EIP-2929 folds the warm access cost into the dirty/no-op tier and
        // discounts RESET by the cold surcharge.
        (WARM_ADDRESS_ACCESS_COST, SSTORE_RESET_POST_BERLIN)
    } else if spec.eip2200 {
        (SLOAD_STATIC_PRE_BERLIN, SSTORE_RESET)
    } else if spec.eip1283 {
        (SLOAD_STATIC_PRE_ISTANBUL, SSTORE_RESET)
    } else {
        // Legacy metering: only zeroness of current/new matters.
        let cost = if current.is_zero() && !new_value.is_zero() {
            SSTORE_SET
        } else {
            SSTORE_RESET
        };
        let mut refund = RefundDelta::default();
        if !current.is_zero() && new_value.is_zero() {
            refund.added = SSTORE_CLEARS_REFUND_PRE_LONDON;
        }
        return Ok((cost, refund));
    };

    let clears_refund = if spec.eip3529 {
        SSTORE_CLEARS_REFUND
    } else {
        SSTORE_CLEARS_REFUND_PRE_LONDON
    };

    let mut cost = if current == new_value {
        noop_cost
    } else if current == original {
        if original.is_zero() {
            SSTORE_SET
        } else {
            reset_cost
        }
    } else {
        noop_cost
    };

    if spec.eip2929 && slot_was_cold {
        cost = cost
            .checked_add(COLD_STORAGE_ACCESS_COST)
            .ok_or(OutOfGasError::GasCostOverflow)?;
    }

    let mut refund = RefundDelta::default();
    if current != new_value {
        if current == original {
            if !original.is_zero() && new_value.is_zero() {
                refund.added = clears_refund;
            }
        } else {
            // dirty slot
            if !original.is_zero() {
                if current.is_zero() {
                    refund.removed = refund
                        .removed
                        .checked_add(clears_refund)
                        .ok_or(OutOfGasError::GasCostOverflow)?;
                } else if new_value.is_zero() {
                    refund.added = refund
                        .added
                        .checked_add(clears_refund)
                        .ok_or(OutOfGasError::GasCostOverflow)?;
                }
            }
            if new_value == original {
                let restore_refund = if original.is_zero() {
                    SSTORE_SET
                        .checked_sub(noop_cost)
                        .ok_or(OutOfGasError::GasCostOverflow)?
                } else {
                    reset_cost
                        .checked_sub(noop_cost)
                        .ok_or(OutOfGasError::GasCostOverflow)?
                };
                refund.added = refund
                    .added
                    .checked_add(restore_refund)
                    .ok_or(OutOfGasError::GasCostOverflow)?;
            }
        }
    }

    Ok((cost, refund))
}

/// CALL pricing: access cost plus the value-transfer and new-account
/// surcharges. The memory expansion of the argument and return ranges is
/// passed in already computed.
pub fn call(
    memory_expansion_cost: u64,
    address_was_cold: bool,
    account_is_empty: bool,
    value: U256,
    spec: &ForkSpec,
) -> Result<u64, OutOfGasError> {
    let mut cost = address_access_cost(address_was_cold, CALL_BASE_PRE_BERLIN, spec);
    if !value.is_zero() {
        cost = cost
            .checked_add(NON_ZERO_VALUE_COST)
            .ok_or(OutOfGasError::GasCostOverflow)?;
        if account_is_empty {
            cost = cost
                .checked_add(NEW_ACCOUNT_COST)
                .ok_or(OutOfGasError::GasCostOverflow)?;
        }
    }
    add_memory_expansion(cost, memory_expansion_cost)
}

pub fn callcode(
    memory_expansion_cost: u64,
    address_was_cold: bool,
    value: U256,
    spec: &ForkSpec,
) -> Result<u64, OutOfGasError> {
    let mut cost = address_access_cost(address_was_cold, CALL_BASE_PRE_BERLIN, spec);
    if !value.is_zero() {
        // CALLCODE never pays the new-account surcharge: the target of the
        // value transfer is the executing account itself.
        cost = cost
            .checked_add(NON_ZERO_VALUE_COST)
            .ok_or(OutOfGasError::GasCostOverflow)?;
    }
    add_memory_expansion(cost, memory_expansion_cost)
}

pub fn delegatecall(
    memory_expansion_cost: u64,
    address_was_cold: bool,
    spec: &ForkSpec,
) -> Result<u64, OutOfGasError> {
    let cost = address_access_cost(address_was_cold, CALL_BASE_PRE_BERLIN, spec);
    add_memory_expansion(cost, memory_expansion_cost)
}

pub fn staticcall(
    memory_expansion_cost: u64,
    address_was_cold: bool,
    spec: &ForkSpec,
) -> Result<u64, OutOfGasError> {
    let cost = address_access_cost(address_was_cold, CALL_BASE_PRE_BERLIN, spec);
    add_memory_expansion(cost, memory_expansion_cost)
}

/// EIP-150: the callee receives at most all-but-one-64th of the caller's
/// remaining gas.
pub fn max_message_call_gas(remaining_gas: u64) -> u64 {
    remaining_gas.saturating_sub(remaining_gas / 64)
}

pub fn create(
    init_code_size: usize,
    memory_expansion_cost: u64,
    spec: &ForkSpec,
) -> Result<u64, OutOfGasError> {
    let mut cost = CREATE_BASE_COST;
    if spec.eip3860 {
        let word_cost = INIT_CODE_WORD_COST
            .checked_mul(minimum_word_size(init_code_size)?)
            .ok_or(OutOfGasError::GasCostOverflow)?;
        cost = cost
            .checked_add(word_cost)
            .ok_or(OutOfGasError::GasCostOverflow)?;
    }
    add_memory_expansion(cost, memory_expansion_cost)
}

pub fn selfdestruct(
    address_was_cold: bool,
    beneficiary_is_empty: bool,
    balance_is_zero: bool,
    spec: &ForkSpec,
) -> Result<u64, OutOfGasError> {
    let mut cost = SELFDESTRUCT_STATIC;
    if spec.eip2929 && address_was_cold {
        cost = cost
            .checked_add(COLD_ADDRESS_ACCESS_COST)
            .ok_or(OutOfGasError::GasCostOverflow)?;
    }
    if beneficiary_is_empty && !balance_is_zero {
        cost = cost
            .checked_add(SELFDESTRUCT_DYNAMIC)
            .ok_or(OutOfGasError::GasCostOverflow)?;
    }
    Ok(cost)
}

/// Intrinsic calldata cost: 4 per zero byte, 16 (68 pre-Istanbul) per
/// non-zero byte.
pub fn tx_calldata(calldata: &Bytes, spec: &ForkSpec) -> Result<u64, OutOfGasError> {
    let non_zero_cost = if spec.eip2028 {
        TX_DATA_COST_PER_NON_ZERO_BYTE
    } else {
        TX_DATA_COST_PER_NON_ZERO_BYTE_PRE_ISTANBUL
    };
    let mut cost: u64 = 0;
    for byte in calldata {
        let byte_cost = if *byte == 0 {
            TX_DATA_COST_PER_ZERO_BYTE
        } else {
            non_zero_cost
        };
        cost = cost
            .checked_add(byte_cost)
            .ok_or(OutOfGasError::ConsumedGasOverflow)?;
    }
    Ok(cost)
}

// Precompile cost formulas

pub fn identity(data_size: usize) -> Result<u64, VMError> {
    copy_cost(IDENTITY_STATIC_COST, IDENTITY_DYNAMIC_BASE, data_size).map_err(VMError::OutOfGas)
}

pub fn sha2_256(data_size: usize) -> Result<u64, VMError> {
    copy_cost(SHA2_256_STATIC_COST, SHA2_256_DYNAMIC_BASE, data_size).map_err(VMError::OutOfGas)
}

pub fn ripemd_160(data_size: usize) -> Result<u64, VMError> {
    copy_cost(RIPEMD_160_STATIC_COST, RIPEMD_160_DYNAMIC_BASE, data_size).map_err(VMError::OutOfGas)
}

pub fn ecadd(spec: &ForkSpec) -> u64 {
    if spec.eip1108 {
        ECADD_COST
    } else {
        ECADD_COST_PRE_ISTANBUL
    }
}

pub fn ecmul(spec: &ForkSpec) -> u64 {
    if spec.eip1108 {
        ECMUL_COST
    } else {
        ECMUL_COST_PRE_ISTANBUL
    }
}

pub fn ecpairing(group_count: u64, spec: &ForkSpec) -> Result<u64, VMError> {
    let (base, per_group) = if spec.eip1108 {
        (ECPAIRING_BASE_COST, ECPAIRING_PER_PAIRING_COST)
    } else {
        (
            ECPAIRING_BASE_COST_PRE_ISTANBUL,
            ECPAIRING_PER_PAIRING_COST_PRE_ISTANBUL,
        )
    };
    per_group
        .checked_mul(group_count)
        .and_then(|groups| groups.checked_add(base))
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

/// EIP-2565 MODEXP pricing.
pub fn modexp(
    exponent_head: U256,
    base_size: usize,
    exponent_size: usize,
    modulus_size: usize,
) -> Result<u64, VMError> {
    let base_size = u64::try_from(base_size).map_err(|_| OutOfGasError::GasCostOverflow)?;
    let exponent_size = u64::try_from(exponent_size).map_err(|_| OutOfGasError::GasCostOverflow)?;
    let modulus_size = u64::try_from(modulus_size).map_err(|_| OutOfGasError::GasCostOverflow)?;

    let max_length = base_size.max(modulus_size);
    let words = max_length.div_ceil(8);
    let multiplication_complexity = words
        .checked_mul(words)
        .ok_or(OutOfGasError::GasCostOverflow)?;

    let head_bit_length = u64::try_from(exponent_head.bits().saturating_sub(1))
        .map_err(|_| OutOfGasError::GasCostOverflow)?;
    let iteration_count = if exponent_size <= 32 && exponent_head.is_zero() {
        0
    } else if exponent_size <= 32 {
        head_bit_length
    } else {
        let length_part = exponent_size
            .checked_sub(32)
            .and_then(|len| len.checked_mul(8))
            .ok_or(OutOfGasError::GasCostOverflow)?;
        length_part.saturating_add(head_bit_length)
    };
    let iteration_count = iteration_count.max(1);

    let cost = multiplication_complexity
        .checked_mul(iteration_count)
        .ok_or(OutOfGasError::GasCostOverflow)?
        .checked_div(3)
        .ok_or(OutOfGasError::GasCostOverflow)?;
    Ok(cost.max(MODEXP_STATIC_COST))
}

/// Approximates `factor * e**(numerator / denominator)` with integer math,
/// as EIP-4844 specifies for the blob base fee.
pub fn fake_exponential(factor: U256, numerator: U256, denominator: U256) -> Result<U256, VMError> {
    let mut i = U256::one();
    let mut output = U256::zero();
    let mut numerator_accum = factor
        .checked_mul(denominator)
        .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;

    while !numerator_accum.is_zero() {
        output = output
            .checked_add(numerator_accum)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        numerator_accum = numerator_accum
            .checked_mul(numerator)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?
            .checked_div(
                denominator
                    .checked_mul(i)
                    .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?,
            )
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        i = i
            .checked_add(U256::one())
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
    }

    output
        .checked_div(denominator)
        .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))
}
