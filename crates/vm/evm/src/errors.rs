use crate::db::CacheDB;
use bytes::Bytes;
use ember_core::{types::Log, Address};
use thiserror::Error;

/// Errors that halt the executing frame.
///
/// Except for `RevertOpcode` (which refunds the frame's remaining gas to the
/// caller) and the `Internal` variants (which abort the whole transaction),
/// every error consumes all gas left in the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Jump to invalid destination")]
    InvalidJump,
    #[error("Opcode not allowed in static context")]
    OpcodeNotAllowedInStaticContext,
    #[error("Opcode not found")]
    OpcodeNotFound,
    #[error("Invalid opcode")]
    InvalidOpcode,
    #[error("Invalid bytecode")]
    InvalidBytecode,
    #[error("Offset or size out of native range")]
    VeryLargeNumber,
    #[error("Balance overflow")]
    BalanceOverflow,
    #[error("Balance underflow")]
    BalanceUnderflow,
    #[error("Nonce overflow")]
    NonceOverflow,
    #[error("Nonce underflow")]
    NonceUnderflow,
    #[error("Deployed code exceeds the maximum contract size")]
    ContractOutputTooBig,
    #[error("Deployed code starts with the 0xef reserved byte")]
    InvalidContractPrefix,
    #[error("Revert opcode")]
    RevertOpcode,
    #[error("Create collision: address already occupied")]
    AddressAlreadyOccupied,
    #[error("Gas price is lower than base fee")]
    GasPriceIsLowerThanBaseFee,
    #[error("Out of gas: {0}")]
    OutOfGas(#[from] OutOfGasError),
    #[error("Transaction validation error: {0}")]
    TxValidation(#[from] TxValidationError),
    #[error("Precompile error: {0}")]
    PrecompileError(#[from] PrecompileError),
    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
}

impl VMError {
    /// Internal errors denote a bug or resource exhaustion in the engine
    /// itself. They abort the transaction instead of being reified as a
    /// revert in the report.
    pub fn is_internal(&self) -> bool {
        matches!(self, VMError::Internal(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutOfGasError {
    #[error("Gas limit exceeded")]
    MaxGasLimitExceeded,
    #[error("Consumed gas overflow")]
    ConsumedGasOverflow,
    #[error("Gas cost overflow")]
    GasCostOverflow,
    #[error("Arithmetic operation overflow while metering gas")]
    ArithmeticOperationOverflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxValidationError {
    #[error("Sender balance cannot cover the up-front transaction cost")]
    InsufficientAccountFunds,
    #[error("Intrinsic gas too low")]
    IntrinsicGasTooLow,
    #[error("Sender nonce is at its maximum value")]
    NonceIsMax,
    #[error("gas_limit * gas_price overflows")]
    GasLimitPriceProductOverflow,
    #[error("Max fee per gas is lower than the block base fee")]
    InsufficientMaxFeePerGas,
    #[error("Initcode exceeds the maximum initcode size")]
    InitcodeSizeExceeded,
    #[error("Priority fee is greater than the max fee per gas")]
    PriorityGreaterThanMaxFeePerGas,
    #[error("Sender account has code and is not an EOA")]
    SenderNotEOA,
    #[error("Transaction gas limit exceeds the block gas limit")]
    GasAllowanceExceeded,
    #[error("Max fee per blob gas is lower than the blob base fee")]
    InsufficientMaxFeePerBlobGas,
    #[error("Blob transaction carries no blob hashes")]
    Type3TxZeroBlobs,
    #[error("Blob versioned hash has an unknown version byte")]
    Type3TxInvalidBlobVersionedHash,
    #[error("Blob transaction exceeds the per-block blob count")]
    Type3TxBlobCountExceeded,
    #[error("Blob transactions cannot create contracts")]
    Type3TxContractCreation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrecompileError {
    #[error("Forwarded gas does not cover the precompile cost")]
    NotEnoughGas,
    #[error("Malformed precompile input")]
    ParsingInputError,
    #[error("Consumed gas overflow inside a precompile")]
    GasConsumedOverflow,
    #[error("Input coordinates are not a point on the curve")]
    InvalidEllipticCurvePoint,
    #[error("Point is not a member of the expected subgroup")]
    PointNotInSubgroup,
    #[error("Versioned hash does not match the commitment")]
    BlobVersionedHashMismatch,
    #[error("KZG proof verification failed")]
    EvaluationFailed,
}

/// Engine-internal failures. Reaching one of these means a bug (or host
/// resource exhaustion), never a property of the executed bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("Arithmetic operation overflowed")]
    ArithmeticOperationOverflow,
    #[error("Arithmetic operation underflowed")]
    ArithmeticOperationUnderflow,
    #[error("Conversion between numeric types failed")]
    ConversionError,
    #[error("Slice indexing out of bounds")]
    SlicingError,
    #[error("Program counter overflowed")]
    PCOverflowed,
    #[error("Could not compute CREATE address")]
    CouldNotComputeCreateAddress,
    #[error("Could not compute CREATE2 address")]
    CouldNotComputeCreate2Address,
    #[error("Could not access the current call frame")]
    CouldNotAccessLastCallframe,
    #[error("Could not pop the initial call frame")]
    CouldNotPopCallframe,
    #[error("Account expected to be cached was not")]
    AccountNotFound,
    #[error("Address dispatched as precompile is not one")]
    InvalidPrecompileAddress,
    #[error("Address dispatched as system contract is not one")]
    InvalidSystemContractAddress,
    #[error("Reached an undefined state ({0})")]
    UndefinedState(i32),
}

/// Outcome of a single opcode handler.
pub enum OpcodeSuccess {
    Continue,
    Result(ResultReason),
}

/// Why a frame stopped executing successfully.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultReason {
    Stop,
    Revert,
    Return,
    SelfDestruct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

/// Everything the host learns from one executed transaction or frame.
#[derive(Debug, Clone)]
pub struct TransactionReport {
    pub result: TxResult,
    pub new_state: CacheDB,
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
    pub created_address: Option<Address>,
}

impl TransactionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}
