use ember_core::{H160, U256};

pub const WORD_SIZE: usize = 32;

pub const STACK_LIMIT: usize = 1024;
/// Maximum call/create nesting depth.
pub const CALL_DEPTH_LIMIT: usize = 1024;

pub const MEMORY_EXPANSION_QUOTIENT: u64 = 512;

/// Refund cap divisor after EIP-3529.
pub const GAS_REFUND_DENOMINATOR: u64 = 5;
/// Refund cap divisor before London.
pub const GAS_REFUND_DENOMINATOR_PRE_LONDON: u64 = 2;

/// EIP-170 runtime code limit.
pub const MAX_CODE_SIZE: usize = 0x6000;
/// EIP-3860 initcode limit, twice the runtime limit.
pub const MAX_INITCODE_SIZE: usize = 2 * MAX_CODE_SIZE;

/// EIP-3541: deployed code may not start with this byte.
pub const INVALID_CONTRACT_PREFIX: u8 = 0xef;

// Blob constants (EIP-4844)
pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;
pub const VALID_BLOB_PREFIXES: [u8; 1] = [VERSIONED_HASH_VERSION_KZG];
pub const MAX_BLOB_COUNT: usize = 6;
pub const MIN_BASE_FEE_PER_BLOB_GAS: U256 = U256([1, 0, 0, 0]);
pub const BLOB_BASE_FEE_UPDATE_FRACTION: U256 = U256([3338477, 0, 0, 0]);

// Block constants
pub const LAST_AVAILABLE_BLOCK_LIMIT: u64 = 256;

/// Address allowed to drive the block-boundary system contracts.
pub const SYSTEM_ADDRESS: H160 = H160([
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xfe,
]);

/// EIP-4788 beacon roots contract.
pub const BEACON_ROOTS_ADDRESS: H160 = H160([
    0x00, 0x0f, 0x3d, 0xf6, 0xd7, 0x32, 0x80, 0x7e, 0xf1, 0x31, 0x9f, 0xb7, 0xb8, 0xbb, 0x85, 0x22,
    0xd0, 0xbe, 0xac, 0x02,
]);
/// EIP-4788 ring length.
pub const BEACON_ROOTS_HISTORY_LENGTH: u64 = 8191;

/// EIP-2935 historical block hashes contract.
pub const BLOCK_HASHES_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x0b,
]);
/// EIP-2935 ring length.
pub const BLOCK_HASHES_HISTORY_LENGTH: u64 = 8192;

/// EIP-7002 validator withdrawal requests contract.
pub const WITHDRAWAL_REQUESTS_ADDRESS: H160 = H160([
    0x00, 0xa3, 0xca, 0x26, 0x5e, 0xbc, 0xb8, 0x25, 0xb4, 0x5f, 0x98, 0x5a, 0x16, 0xce, 0xfb, 0x49,
    0x95, 0x8c, 0xe0, 0x17,
]);
/// EIP-7002 per-block dequeue cap.
pub const MAX_WITHDRAWAL_REQUESTS_PER_BLOCK: u64 = 16;
/// Gas handed to a system-contract invocation at a block boundary.
pub const SYSTEM_CALL_GAS_LIMIT: u64 = 30_000_000;
