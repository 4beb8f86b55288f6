use crate::{
    account::{Account, AccountInfo, StorageSlot},
    call_frame::CallFrame,
    constants::*,
    db::{
        cache::{self, remove_account},
        CacheDB, Database,
    },
    environment::Environment,
    errors::{
        InternalError, OpcodeSuccess, OutOfGasError, ResultReason, TransactionReport, TxResult,
        TxValidationError, VMError,
    },
    fork::ForkSpec,
    gas_cost::{self, fake_exponential},
    opcodes::Opcode,
    precompiles::{execute_precompile, is_precompile},
    system_contracts::{execute_system_contract, is_system_contract},
};
use bytes::Bytes;
use ember_core::{types::TxKind, Address, H256, U256};
use ember_rlp::encode::RLPEncode;
use keccak_hash::keccak;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::debug;

/// Per-transaction transient storage (EIP-1153), keyed by the executing
/// contract and the slot word. Dropped when the transaction ends.
pub type TransientStorage = HashMap<(Address, U256), U256>;

pub type AccessList = Vec<(Address, Vec<H256>)>;

/// Substate accrued over a transaction: warm addresses and slots
/// (EIP-2929), accounts created here (EIP-6780), accounts scheduled for
/// destruction.
#[derive(Debug, Clone, Default)]
pub struct Substate {
    pub selfdestruct_set: HashSet<Address>,
    pub touched_accounts: HashSet<Address>,
    pub touched_storage_slots: HashMap<Address, HashSet<H256>>,
    pub created_accounts: HashSet<Address>,
}

/// Everything a frame needs restored when it reverts.
struct StateBackup {
    cache: CacheDB,
    substate: Substate,
    refunded_gas: u64,
    transient_storage: TransientStorage,
}

pub struct VM {
    pub call_frames: Vec<CallFrame>,
    pub env: Environment,
    /// EIP rule record derived from `env.fork` plus chain overrides.
    pub spec: ForkSpec,
    /// Information that is acted upon immediately following the
    /// transaction.
    pub accrued_substate: Substate,
    /// Mapping between addresses (160-bit identifiers) and account
    /// states.
    pub db: Arc<dyn Database>,
    pub cache: CacheDB,
    pub transient_storage: TransientStorage,
    pub tx_kind: TxKind,
    pub access_list: AccessList,
}

pub fn address_to_word(address: Address) -> U256 {
    // an Address is 20 bytes long and a U256 word has room for 32
    let mut word = [0u8; 32];
    for (word_byte, address_byte) in word.iter_mut().skip(12).zip(address.as_bytes().iter()) {
        *word_byte = *address_byte;
    }
    U256::from_big_endian(&word)
}

pub fn word_to_address(word: U256) -> Address {
    let mut bytes = [0u8; WORD_SIZE];
    word.to_big_endian(&mut bytes);
    Address::from_slice(&bytes[12..])
}

impl VM {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        to: TxKind,
        env: Environment,
        value: U256,
        calldata: Bytes,
        db: Arc<dyn Database>,
        mut cache: CacheDB,
        access_list: AccessList,
    ) -> Result<Self, VMError> {
        let mut spec = ForkSpec::new(env.fork);
        for (eip, enabled) in &env.eip_overrides {
            if *enabled {
                spec.force_enable_eip(*eip);
            } else {
                spec.force_disable_eip(*eip);
            }
        }

        // Pre-warm sender, coinbase (EIP-3651), the precompiles and the
        // transaction access list (EIP-2930).
        let mut default_touched_accounts = HashSet::from_iter([env.origin]);
        if spec.eip3651 {
            default_touched_accounts.insert(env.coinbase);
        }
        for precompile_index in 1..=10u64 {
            default_touched_accounts.insert(Address::from_low_u64_be(precompile_index));
        }

        let mut default_touched_storage_slots: HashMap<Address, HashSet<H256>> = HashMap::new();
        for (address, keys) in &access_list {
            default_touched_accounts.insert(*address);
            default_touched_storage_slots
                .entry(*address)
                .or_default()
                .extend(keys.iter().copied());
        }

        match to {
            TxKind::Call(address_to) => {
                default_touched_accounts.insert(address_to);

                let recipient_account_info = db.get_account_info(address_to);
                cache::insert_account(
                    &mut cache,
                    address_to,
                    Account::from(recipient_account_info.clone()),
                );

                let initial_call_frame = CallFrame::new(
                    env.origin,
                    address_to,
                    address_to,
                    recipient_account_info.bytecode,
                    value,
                    calldata,
                    false,
                    env.gas_limit,
                    0,
                    0,
                    false,
                );

                let substate = Substate {
                    selfdestruct_set: HashSet::new(),
                    touched_accounts: default_touched_accounts,
                    touched_storage_slots: default_touched_storage_slots,
                    created_accounts: HashSet::new(),
                };

                Ok(Self {
                    call_frames: vec![initial_call_frame],
                    db,
                    env,
                    spec,
                    accrued_substate: substate,
                    cache,
                    transient_storage: TransientStorage::new(),
                    tx_kind: to,
                    access_list,
                })
            }
            TxKind::Create => {
                let new_contract_address =
                    VM::calculate_create_address(env.origin, db.get_account_info(env.origin).nonce)?;

                default_touched_accounts.insert(new_contract_address);

                let initial_nonce = if spec.eip161 { 1 } else { 0 };
                let created_contract =
                    Account::new(value, Bytes::new(), initial_nonce, HashMap::new());
                cache::insert_account(&mut cache, new_contract_address, created_contract);

                let initial_call_frame = CallFrame::new(
                    env.origin,
                    new_contract_address,
                    new_contract_address,
                    Bytes::new(), // bytecode is assigned after validation
                    value,
                    calldata, // promoted to initcode after validation
                    false,
                    env.gas_limit,
                    0,
                    0,
                    false,
                );

                let substate = Substate {
                    selfdestruct_set: HashSet::new(),
                    touched_accounts: default_touched_accounts,
                    touched_storage_slots: default_touched_storage_slots,
                    created_accounts: HashSet::from([new_contract_address]),
                };

                Ok(Self {
                    call_frames: vec![initial_call_frame],
                    db,
                    env,
                    spec,
                    accrued_substate: substate,
                    cache,
                    transient_storage: TransientStorage::new(),
                    tx_kind: TxKind::Create,
                    access_list,
                })
            }
        }
    }

    fn make_backup(&self) -> StateBackup {
        StateBackup {
            cache: self.cache.clone(),
            substate: self.accrued_substate.clone(),
            refunded_gas: self.env.refunded_gas,
            transient_storage: self.transient_storage.clone(),
        }
    }

    fn restore_state(&mut self, backup: StateBackup) {
        self.cache = backup.cache;
        self.accrued_substate = backup.substate;
        self.env.refunded_gas = backup.refunded_gas;
        self.transient_storage = backup.transient_storage;
    }

    /// Runs one frame to completion and reifies the outcome as a report.
    /// Only internal errors propagate as `Err`.
    pub fn execute(
        &mut self,
        current_call_frame: &mut CallFrame,
    ) -> Result<TransactionReport, VMError> {
        let backup = self.make_backup();

        if is_precompile(&current_call_frame.code_address, &self.spec) {
            return self.execute_native(current_call_frame, backup, execute_precompile);
        }
        if is_system_contract(&current_call_frame.code_address, &self.spec) {
            return self.execute_native(current_call_frame, backup, execute_system_contract);
        }

        loop {
            let opcode = current_call_frame.next_opcode();

            let op_result: Result<OpcodeSuccess, VMError> =
                if !current_call_frame.next_opcode_is_defined() {
                    Err(VMError::OpcodeNotFound)
                } else {
                    match opcode {
                        Opcode::STOP => Ok(OpcodeSuccess::Result(ResultReason::Stop)),
                        Opcode::ADD => self.op_add(current_call_frame),
                        Opcode::MUL => self.op_mul(current_call_frame),
                        Opcode::SUB => self.op_sub(current_call_frame),
                        Opcode::DIV => self.op_div(current_call_frame),
                        Opcode::SDIV => self.op_sdiv(current_call_frame),
                        Opcode::MOD => self.op_mod(current_call_frame),
                        Opcode::SMOD => self.op_smod(current_call_frame),
                        Opcode::ADDMOD => self.op_addmod(current_call_frame),
                        Opcode::MULMOD => self.op_mulmod(current_call_frame),
                        Opcode::EXP => self.op_exp(current_call_frame),
                        Opcode::SIGNEXTEND => self.op_signextend(current_call_frame),
                        Opcode::LT => self.op_lt(current_call_frame),
                        Opcode::GT => self.op_gt(current_call_frame),
                        Opcode::SLT => self.op_slt(current_call_frame),
                        Opcode::SGT => self.op_sgt(current_call_frame),
                        Opcode::EQ => self.op_eq(current_call_frame),
                        Opcode::ISZERO => self.op_iszero(current_call_frame),
                        Opcode::AND => self.op_and(current_call_frame),
                        Opcode::OR => self.op_or(current_call_frame),
                        Opcode::XOR => self.op_xor(current_call_frame),
                        Opcode::NOT => self.op_not(current_call_frame),
                        Opcode::BYTE => self.op_byte(current_call_frame),
                        Opcode::SHL => self.op_shl(current_call_frame),
                        Opcode::SHR => self.op_shr(current_call_frame),
                        Opcode::SAR => self.op_sar(current_call_frame),
                        Opcode::KECCAK256 => self.op_keccak256(current_call_frame),
                        Opcode::ADDRESS => self.op_address(current_call_frame),
                        Opcode::BALANCE => self.op_balance(current_call_frame),
                        Opcode::ORIGIN => self.op_origin(current_call_frame),
                        Opcode::CALLER => self.op_caller(current_call_frame),
                        Opcode::CALLVALUE => self.op_callvalue(current_call_frame),
                        Opcode::CALLDATALOAD => self.op_calldataload(current_call_frame),
                        Opcode::CALLDATASIZE => self.op_calldatasize(current_call_frame),
                        Opcode::CALLDATACOPY => self.op_calldatacopy(current_call_frame),
                        Opcode::CODESIZE => self.op_codesize(current_call_frame),
                        Opcode::CODECOPY => self.op_codecopy(current_call_frame),
                        Opcode::GASPRICE => self.op_gasprice(current_call_frame),
                        Opcode::EXTCODESIZE => self.op_extcodesize(current_call_frame),
                        Opcode::EXTCODECOPY => self.op_extcodecopy(current_call_frame),
                        Opcode::RETURNDATASIZE => self.op_returndatasize(current_call_frame),
                        Opcode::RETURNDATACOPY => self.op_returndatacopy(current_call_frame),
                        Opcode::EXTCODEHASH => self.op_extcodehash(current_call_frame),
                        Opcode::BLOCKHASH => self.op_blockhash(current_call_frame),
                        Opcode::COINBASE => self.op_coinbase(current_call_frame),
                        Opcode::TIMESTAMP => self.op_timestamp(current_call_frame),
                        Opcode::NUMBER => self.op_number(current_call_frame),
                        Opcode::PREVRANDAO => self.op_prevrandao(current_call_frame),
                        Opcode::GASLIMIT => self.op_gaslimit(current_call_frame),
                        Opcode::CHAINID => self.op_chainid(current_call_frame),
                        Opcode::SELFBALANCE => self.op_selfbalance(current_call_frame),
                        Opcode::BASEFEE => self.op_basefee(current_call_frame),
                        Opcode::BLOBHASH => self.op_blobhash(current_call_frame),
                        Opcode::BLOBBASEFEE => self.op_blobbasefee(current_call_frame),
                        Opcode::POP => self.op_pop(current_call_frame),
                        Opcode::MLOAD => self.op_mload(current_call_frame),
                        Opcode::MSTORE => self.op_mstore(current_call_frame),
                        Opcode::MSTORE8 => self.op_mstore8(current_call_frame),
                        Opcode::SLOAD => self.op_sload(current_call_frame),
                        Opcode::SSTORE => self.op_sstore(current_call_frame),
                        Opcode::JUMP => self.op_jump(current_call_frame),
                        Opcode::JUMPI => self.op_jumpi(current_call_frame),
                        Opcode::JUMPDEST => self.op_jumpdest(current_call_frame),
                        Opcode::PC => self.op_pc(current_call_frame),
                        Opcode::MSIZE => self.op_msize(current_call_frame),
                        Opcode::GAS => self.op_gas(current_call_frame),
                        Opcode::TLOAD => self.op_tload(current_call_frame),
                        Opcode::TSTORE => self.op_tstore(current_call_frame),
                        Opcode::MCOPY => self.op_mcopy(current_call_frame),
                        Opcode::PUSH0 => self.op_push0(current_call_frame),
                        op if (Opcode::PUSH1..=Opcode::PUSH32).contains(&op) => {
                            let n_bytes = get_n_value(op, Opcode::PUSH1)?;
                            self.op_push(current_call_frame, n_bytes)
                        }
                        op if (Opcode::DUP1..=Opcode::DUP16).contains(&op) => {
                            let depth = get_n_value(op, Opcode::DUP1)?;
                            self.op_dup(current_call_frame, depth)
                        }
                        op if (Opcode::SWAP1..=Opcode::SWAP16).contains(&op) => {
                            let depth = get_n_value(op, Opcode::SWAP1)?;
                            self.op_swap(current_call_frame, depth)
                        }
                        op if (Opcode::LOG0..=Opcode::LOG4).contains(&op) => {
                            let number_of_topics = get_number_of_topics(op)?;
                            self.op_log(current_call_frame, number_of_topics)
                        }
                        Opcode::CALL => self.op_call(current_call_frame),
                        Opcode::CALLCODE => self.op_callcode(current_call_frame),
                        Opcode::RETURN => self.op_return(current_call_frame),
                        Opcode::DELEGATECALL => self.op_delegatecall(current_call_frame),
                        Opcode::STATICCALL => self.op_staticcall(current_call_frame),
                        Opcode::CREATE => self.op_create(current_call_frame),
                        Opcode::CREATE2 => self.op_create2(current_call_frame),
                        Opcode::REVERT => self.op_revert(current_call_frame),
                        Opcode::INVALID => self.op_invalid(),
                        Opcode::SELFDESTRUCT => self.op_selfdestruct(current_call_frame),
                        _ => Err(VMError::OpcodeNotFound),
                    }
                };

            if opcode != Opcode::JUMP && opcode != Opcode::JUMPI {
                current_call_frame.increment_pc()?;
            }

            match op_result {
                Ok(OpcodeSuccess::Continue) => {}
                Ok(OpcodeSuccess::Result(_)) => {
                    // successful CREATE frames still have to deposit their code
                    if (self.is_create() && current_call_frame.depth == 0)
                        || current_call_frame.create_op_called
                    {
                        if let Err(error) = self.deposit_created_code(current_call_frame) {
                            current_call_frame.gas_used = current_call_frame.gas_limit;
                            self.restore_state(backup);

                            return Ok(TransactionReport {
                                result: TxResult::Revert(error),
                                new_state: self.cache.clone(),
                                gas_used: current_call_frame.gas_used,
                                gas_refunded: self.env.refunded_gas,
                                output: Bytes::new(),
                                logs: Vec::new(),
                                created_address: None,
                            });
                        }
                    }

                    return Ok(TransactionReport {
                        result: TxResult::Success,
                        new_state: self.cache.clone(),
                        gas_used: current_call_frame.gas_used,
                        gas_refunded: self.env.refunded_gas,
                        output: current_call_frame.output.clone(),
                        logs: current_call_frame.logs.clone(),
                        created_address: None,
                    });
                }
                Err(error) => {
                    if error.is_internal() {
                        return Err(error);
                    }

                    // Unless the error came from the REVERT opcode, the frame
                    // forfeits all remaining gas.
                    if error != VMError::RevertOpcode {
                        current_call_frame.gas_used = current_call_frame.gas_limit;
                        current_call_frame.output = Bytes::new();
                    }

                    self.restore_state(backup);

                    return Ok(TransactionReport {
                        result: TxResult::Revert(error),
                        new_state: self.cache.clone(),
                        gas_used: current_call_frame.gas_used,
                        gas_refunded: self.env.refunded_gas,
                        output: current_call_frame.output.clone(),
                        logs: Vec::new(),
                        created_address: None,
                    });
                }
            }
        }
    }

    /// Shared precompile / system-contract execution path: no bytecode runs,
    /// a native routine produces the output directly.
    fn execute_native(
        &mut self,
        current_call_frame: &mut CallFrame,
        backup: StateBackup,
        native: fn(&mut VM, &mut CallFrame) -> Result<Bytes, VMError>,
    ) -> Result<TransactionReport, VMError> {
        match native(self, current_call_frame) {
            Ok(output) => Ok(TransactionReport {
                result: TxResult::Success,
                new_state: self.cache.clone(),
                gas_used: current_call_frame.gas_used,
                gas_refunded: 0,
                output,
                logs: current_call_frame.logs.clone(),
                created_address: None,
            }),
            Err(error) => {
                if error.is_internal() {
                    return Err(error);
                }

                if error != VMError::RevertOpcode {
                    current_call_frame.gas_used = current_call_frame.gas_limit;
                }
                self.restore_state(backup);

                Ok(TransactionReport {
                    result: TxResult::Revert(error),
                    new_state: self.cache.clone(),
                    gas_used: current_call_frame.gas_used,
                    gas_refunded: 0,
                    output: Bytes::new(),
                    logs: Vec::new(),
                    created_address: None,
                })
            }
        }
    }

    /// Validates and stores the code a finished CREATE frame returned.
    fn deposit_created_code(&mut self, current_call_frame: &mut CallFrame) -> Result<(), VMError> {
        let contract_code = current_call_frame.output.clone();
        let code_length = contract_code.len();

        if self.spec.eip170 && code_length > MAX_CODE_SIZE {
            return Err(VMError::ContractOutputTooBig);
        }
        if self.spec.eip3541 && contract_code.first() == Some(&INVALID_CONTRACT_PREFIX) {
            return Err(VMError::InvalidContractPrefix);
        }

        let code_deposit_cost = gas_cost::CODE_DEPOSIT_COST
            .checked_mul(u64::try_from(code_length).map_err(|_| VMError::VeryLargeNumber)?)
            .ok_or(OutOfGasError::GasCostOverflow)?;
        if self
            .increase_consumed_gas(current_call_frame, code_deposit_cost)
            .is_err()
        {
            if self.spec.eip2 {
                return Err(VMError::OutOfGas(OutOfGasError::MaxGasLimitExceeded));
            }
            // Frontier: an unaffordable deposit leaves the account empty but
            // the creation succeeds
            current_call_frame.output = Bytes::new();
            return Ok(());
        }

        self.update_account_bytecode(current_call_frame.to, contract_code)
    }

    fn is_create(&self) -> bool {
        matches!(self.tx_kind, TxKind::Create)
    }

    /// Common logic of CALL, CALLCODE, DELEGATECALL and STATICCALL once the
    /// opcode-specific costs are charged.
    #[allow(clippy::too_many_arguments)]
    pub fn generic_call(
        &mut self,
        current_call_frame: &mut CallFrame,
        gas_requested: U256,
        value: U256,
        msg_sender: Address,
        to: Address,
        code_address: Address,
        should_transfer_value: bool,
        is_static: bool,
        args_start_offset: usize,
        args_size: usize,
        return_data_start_offset: usize,
        return_data_size: usize,
    ) -> Result<OpcodeSuccess, VMError> {
        current_call_frame.sub_return_data = Bytes::new();

        let new_depth = current_call_frame
            .depth
            .checked_add(1)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        if new_depth > CALL_DEPTH_LIMIT {
            // the instruction itself completes: push 0, forwarded gas stays
            // with the caller
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        if should_transfer_value
            && !value.is_zero()
            && self.get_account(msg_sender).info.balance < value
        {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        // EIP-150: forward at most all but one 64th of what remains.
        let remaining_gas = current_call_frame.gas_remaining();
        let max_forwardable = if self.spec.eip150 {
            gas_cost::max_message_call_gas(remaining_gas)
        } else {
            remaining_gas
        };
        let gas_for_call = u64::try_from(gas_requested)
            .unwrap_or(u64::MAX)
            .min(max_forwardable);
        self.increase_consumed_gas(current_call_frame, gas_for_call)?;

        let stipend = if !value.is_zero() && should_transfer_value {
            gas_cost::CALL_STIPEND
        } else {
            0
        };
        let child_gas_limit = gas_for_call
            .checked_add(stipend)
            .ok_or(OutOfGasError::ConsumedGasOverflow)?;

        let backup = self.make_backup();

        if should_transfer_value && !value.is_zero() {
            self.decrease_account_balance(msg_sender, value)?;
            self.increase_account_balance(to, value)?;
        }

        let callee_bytecode = self.get_account(code_address).info.bytecode;
        let calldata = current_call_frame
            .memory
            .load_range(args_start_offset, args_size)?;

        let mut child_frame = CallFrame::new(
            msg_sender,
            to,
            code_address,
            callee_bytecode,
            value,
            calldata.into(),
            is_static,
            child_gas_limit,
            0,
            new_depth,
            false,
        );

        let report = self.execute(&mut child_frame)?;

        // Unused child gas flows back, including any stipend left over.
        let unused_gas = child_gas_limit.saturating_sub(report.gas_used);
        current_call_frame.gas_used = current_call_frame.gas_used.saturating_sub(unused_gas);

        match report.result {
            TxResult::Success => {
                current_call_frame.logs.extend(report.logs);
                current_call_frame.sub_return_data = report.output.clone();

                // copy what fits of the return data into the caller's buffer
                let bytes_to_copy = report.output.len().min(return_data_size);
                if bytes_to_copy > 0 {
                    let slice = report
                        .output
                        .get(..bytes_to_copy)
                        .ok_or(VMError::Internal(InternalError::SlicingError))?
                        .to_vec();
                    current_call_frame
                        .memory
                        .store_bytes(return_data_start_offset, &slice)?;
                }

                current_call_frame.stack.push(U256::one())?;
            }
            TxResult::Revert(error) => {
                self.restore_state(backup);

                // a REVERT exposes its return data to the caller; abnormal
                // halts expose nothing
                if error == VMError::RevertOpcode {
                    current_call_frame.sub_return_data = report.output.clone();
                    let bytes_to_copy = report.output.len().min(return_data_size);
                    if bytes_to_copy > 0 {
                        let slice = report
                            .output
                            .get(..bytes_to_copy)
                            .ok_or(VMError::Internal(InternalError::SlicingError))?
                            .to_vec();
                        current_call_frame
                            .memory
                            .store_bytes(return_data_start_offset, &slice)?;
                    }
                }

                current_call_frame.stack.push(U256::zero())?;
            }
        }

        Ok(OpcodeSuccess::Continue)
    }

    /// Common logic of CREATE and CREATE2 once the opcode costs are charged.
    pub fn create(
        &mut self,
        value: U256,
        code_offset_in_memory: usize,
        code_size_in_memory: usize,
        salt: Option<U256>,
        current_call_frame: &mut CallFrame,
    ) -> Result<OpcodeSuccess, VMError> {
        current_call_frame.sub_return_data = Bytes::new();

        if self.spec.eip3860 && code_size_in_memory > MAX_INITCODE_SIZE {
            return Err(VMError::TxValidation(TxValidationError::InitcodeSizeExceeded));
        }

        let new_depth = current_call_frame
            .depth
            .checked_add(1)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationOverflow))?;
        if new_depth > CALL_DEPTH_LIMIT {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let deployer_address = current_call_frame.to;
        let deployer_account_info = self.get_account(deployer_address).info;
        if deployer_account_info.balance < value {
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let init_code: Bytes = current_call_frame
            .memory
            .load_range(code_offset_in_memory, code_size_in_memory)?
            .into();

        let new_address = match salt {
            Some(salt) => Self::calculate_create2_address(deployer_address, &init_code, salt)?,
            None => Self::calculate_create_address(deployer_address, deployer_account_info.nonce)?,
        };

        // the deployer's nonce rises even if the deployment ends up failing
        self.increment_account_nonce(deployer_address)?;

        // the new address is warm from here on, collision or not
        let (new_account_info, _) = self.access_account(new_address);

        // EIP-150: all but one 64th is handed to the initcode frame.
        let remaining_gas = current_call_frame.gas_remaining();
        let gas_for_create = if self.spec.eip150 {
            gas_cost::max_message_call_gas(remaining_gas)
        } else {
            remaining_gas
        };
        self.increase_consumed_gas(current_call_frame, gas_for_create)?;

        if new_account_info.nonce != 0 || !new_account_info.bytecode.is_empty() {
            // address collision burns the forwarded gas and reports failure
            current_call_frame.stack.push(U256::zero())?;
            return Ok(OpcodeSuccess::Continue);
        }

        let backup = self.make_backup();

        self.accrued_substate.created_accounts.insert(new_address);

        self.decrease_account_balance(deployer_address, value)?;
        let initial_nonce = if self.spec.eip161 { 1 } else { 0 };
        cache::insert_account(
            &mut self.cache,
            new_address,
            Account::new(value, Bytes::new(), initial_nonce, HashMap::new()),
        );

        let mut child_frame = CallFrame::new(
            deployer_address,
            new_address,
            new_address,
            init_code,
            value,
            Bytes::new(),
            current_call_frame.is_static,
            gas_for_create,
            0,
            new_depth,
            true,
        );

        let report = self.execute(&mut child_frame)?;

        let unused_gas = gas_for_create.saturating_sub(report.gas_used);
        current_call_frame.gas_used = current_call_frame.gas_used.saturating_sub(unused_gas);

        match report.result {
            TxResult::Success => {
                current_call_frame.logs.extend(report.logs);
                current_call_frame
                    .stack
                    .push(address_to_word(new_address))?;
            }
            TxResult::Revert(error) => {
                self.restore_state(backup);

                if error == VMError::RevertOpcode {
                    current_call_frame.sub_return_data = report.output;
                }
                current_call_frame.stack.push(U256::zero())?;
            }
        }

        Ok(OpcodeSuccess::Continue)
    }

    fn add_intrinsic_gas(&mut self, initial_call_frame: &mut CallFrame) -> Result<(), VMError> {
        // Intrinsic gas is consumed before any opcode runs: base cost plus
        // calldata, creation and access-list components (Yellow Paper §6.2).
        let mut intrinsic_gas: u64 = gas_cost::TX_BASE_COST;

        let calldata_cost = gas_cost::tx_calldata(&initial_call_frame.calldata, &self.spec)
            .map_err(VMError::OutOfGas)?;
        intrinsic_gas = intrinsic_gas
            .checked_add(calldata_cost)
            .ok_or(OutOfGasError::ConsumedGasOverflow)?;

        if self.is_create() {
            intrinsic_gas = intrinsic_gas
                .checked_add(gas_cost::CREATE_BASE_COST)
                .ok_or(OutOfGasError::ConsumedGasOverflow)?;

            if self.spec.eip3860 {
                let initcode_cost = gas_cost::INIT_CODE_WORD_COST
                    .checked_mul(gas_cost::minimum_word_size(initial_call_frame.calldata.len())?)
                    .ok_or(OutOfGasError::ConsumedGasOverflow)?;
                intrinsic_gas = intrinsic_gas
                    .checked_add(initcode_cost)
                    .ok_or(OutOfGasError::ConsumedGasOverflow)?;
            }
        }

        if self.spec.eip2930 {
            for (_, keys) in &self.access_list {
                intrinsic_gas = intrinsic_gas
                    .checked_add(gas_cost::ACCESS_LIST_ADDRESS_COST)
                    .ok_or(OutOfGasError::ConsumedGasOverflow)?;
                let keys_cost = gas_cost::ACCESS_LIST_STORAGE_KEY_COST
                    .checked_mul(u64::try_from(keys.len()).map_err(|_| {
                        VMError::Internal(InternalError::ConversionError)
                    })?)
                    .ok_or(OutOfGasError::ConsumedGasOverflow)?;
                intrinsic_gas = intrinsic_gas
                    .checked_add(keys_cost)
                    .ok_or(OutOfGasError::ConsumedGasOverflow)?;
            }
        }

        self.increase_consumed_gas(initial_call_frame, intrinsic_gas)
            .map_err(|_| TxValidationError::IntrinsicGasTooLow)?;

        Ok(())
    }

    /// Max blob fee the sender commits to paying (EIP-4844).
    fn get_max_blob_gas_cost(&self) -> Result<U256, VMError> {
        let blob_gas_used = U256::from(self.env.tx_blob_hashes.len())
            .checked_mul(U256::from(gas_cost::BLOB_GAS_PER_BLOB))
            .unwrap_or_default();

        let blob_gas_cost = self
            .env
            .tx_max_fee_per_blob_gas
            .unwrap_or_default()
            .checked_mul(blob_gas_used)
            .ok_or(VMError::Internal(InternalError::UndefinedState(1)))?;

        Ok(blob_gas_cost)
    }

    pub fn get_base_fee_per_blob_gas(&self) -> Result<U256, VMError> {
        fake_exponential(
            MIN_BASE_FEE_PER_BLOB_GAS,
            self.env.block_excess_blob_gas.unwrap_or_default(),
            BLOB_BASE_FEE_UPDATE_FRACTION,
        )
    }

    /// Validates the transaction and applies the pre-execution state
    /// changes: nonce bump, up-front cost, value transfer, intrinsic gas.
    fn prepare_execution(&mut self, initial_call_frame: &mut CallFrame) -> Result<(), VMError> {
        let sender_address = self.env.origin;
        let sender_account = self.get_account(sender_address);

        // (1) GASLIMIT_PRICE_PRODUCT_OVERFLOW
        let gaslimit_price_product = self
            .env
            .gas_price
            .checked_mul(U256::from(self.env.gas_limit))
            .ok_or(VMError::TxValidation(
                TxValidationError::GasLimitPriceProductOverflow,
            ))?;

        let value = initial_call_frame.msg_value;
        let blob_gas_cost = self.get_max_blob_gas_cost()?;

        // the up-front balance requirement uses the max fee the sender
        // signed, not the effective price
        let gas_fee_for_valid_tx = self
            .env
            .tx_max_fee_per_gas
            .unwrap_or(self.env.gas_price)
            .checked_mul(U256::from(self.env.gas_limit))
            .ok_or(VMError::TxValidation(
                TxValidationError::GasLimitPriceProductOverflow,
            ))?;
        let balance_for_valid_tx = gas_fee_for_valid_tx
            .checked_add(value)
            .ok_or(VMError::TxValidation(
                TxValidationError::InsufficientAccountFunds,
            ))?
            .checked_add(blob_gas_cost)
            .ok_or(VMError::TxValidation(
                TxValidationError::InsufficientAccountFunds,
            ))?;
        if sender_account.info.balance < balance_for_valid_tx {
            return Err(VMError::TxValidation(
                TxValidationError::InsufficientAccountFunds,
            ));
        }

        // (2) INSUFFICIENT_ACCOUNT_FUNDS
        let up_front_cost = gaslimit_price_product
            .checked_add(value)
            .ok_or(VMError::TxValidation(
                TxValidationError::InsufficientAccountFunds,
            ))?
            .checked_add(blob_gas_cost)
            .ok_or(VMError::TxValidation(
                TxValidationError::InsufficientAccountFunds,
            ))?;
        self.decrease_account_balance(sender_address, up_front_cost)
            .map_err(|_| TxValidationError::InsufficientAccountFunds)?;

        // transfer value to the receiver; a created contract was already
        // seeded with it
        if !self.is_create() {
            self.increase_account_balance(initial_call_frame.to, value)?;
        }

        // (3) INSUFFICIENT_MAX_FEE_PER_GAS
        if self.spec.eip1559
            && self.env.tx_max_fee_per_gas.unwrap_or(self.env.gas_price) < self.env.base_fee_per_gas
        {
            return Err(VMError::TxValidation(
                TxValidationError::InsufficientMaxFeePerGas,
            ));
        }

        // (4) INITCODE_SIZE_EXCEEDED
        if self.is_create()
            && self.spec.eip3860
            && initial_call_frame.calldata.len() > MAX_INITCODE_SIZE
        {
            return Err(VMError::TxValidation(
                TxValidationError::InitcodeSizeExceeded,
            ));
        }

        // (5) INTRINSIC_GAS_TOO_LOW
        self.add_intrinsic_gas(initial_call_frame)?;

        // (6) NONCE_IS_MAX
        self.increment_account_nonce(sender_address)
            .map_err(|_| VMError::TxValidation(TxValidationError::NonceIsMax))?;

        // (7) PRIORITY_GREATER_THAN_MAX_FEE_PER_GAS
        if let (Some(tx_max_priority_fee), Some(tx_max_fee_per_gas)) = (
            self.env.tx_max_priority_fee_per_gas,
            self.env.tx_max_fee_per_gas,
        ) {
            if tx_max_priority_fee > tx_max_fee_per_gas {
                return Err(VMError::TxValidation(
                    TxValidationError::PriorityGreaterThanMaxFeePerGas,
                ));
            }
        }

        // (8) SENDER_NOT_EOA
        if sender_account.has_code() {
            return Err(VMError::TxValidation(TxValidationError::SenderNotEOA));
        }

        // (9) GAS_ALLOWANCE_EXCEEDED
        if self.env.gas_limit > self.env.block_gas_limit {
            return Err(VMError::TxValidation(
                TxValidationError::GasAllowanceExceeded,
            ));
        }

        // blob-specific checks (type 3 carries a max blob fee)
        if let Some(tx_max_fee_per_blob_gas) = self.env.tx_max_fee_per_blob_gas {
            // (10) INSUFFICIENT_MAX_FEE_PER_BLOB_GAS
            if tx_max_fee_per_blob_gas < self.get_base_fee_per_blob_gas()? {
                return Err(VMError::TxValidation(
                    TxValidationError::InsufficientMaxFeePerBlobGas,
                ));
            }

            // (11) TYPE_3_TX_ZERO_BLOBS
            if self.env.tx_blob_hashes.is_empty() {
                return Err(VMError::TxValidation(TxValidationError::Type3TxZeroBlobs));
            }

            // (12) TYPE_3_TX_INVALID_BLOB_VERSIONED_HASH
            for blob_hash in &self.env.tx_blob_hashes {
                if let Some(first_byte) = blob_hash.as_bytes().first() {
                    if !VALID_BLOB_PREFIXES.contains(first_byte) {
                        return Err(VMError::TxValidation(
                            TxValidationError::Type3TxInvalidBlobVersionedHash,
                        ));
                    }
                }
            }

            // (13) TYPE_3_TX_BLOB_COUNT_EXCEEDED
            if self.env.tx_blob_hashes.len() > MAX_BLOB_COUNT {
                return Err(VMError::TxValidation(
                    TxValidationError::Type3TxBlobCountExceeded,
                ));
            }

            // (14) TYPE_3_TX_CONTRACT_CREATION
            if self.is_create() {
                return Err(VMError::TxValidation(
                    TxValidationError::Type3TxContractCreation,
                ));
            }
        }

        if self.is_create() {
            // promote calldata to initcode
            initial_call_frame.assign_bytecode(initial_call_frame.calldata.clone());
            initial_call_frame.calldata = Bytes::new();
        }

        Ok(())
    }

    /// ## Changes post execution
    /// 1. Undo the value transfer if the transaction reverted
    /// 2. Return unused gas + gas refunds to the sender
    /// 3. Pay the coinbase fee
    /// 4. Sweep the selfdestruct set
    fn post_execution_changes(
        &mut self,
        initial_call_frame: &CallFrame,
        report: &mut TransactionReport,
    ) -> Result<(), VMError> {
        let sender_address = initial_call_frame.msg_sender;
        let receiver_address = initial_call_frame.to;

        if let TxResult::Revert(_) = report.result {
            if !self.is_create() {
                self.decrease_account_balance(receiver_address, initial_call_frame.msg_value)?;
            }
            self.increase_account_balance(sender_address, initial_call_frame.msg_value)?;
        }

        // EIP-3529 reduced the refundable share from a half to a fifth.
        let consumed_gas = report.gas_used;
        let refund_cap = if self.spec.eip3529 {
            consumed_gas.checked_div(GAS_REFUND_DENOMINATOR)
        } else {
            consumed_gas.checked_div(GAS_REFUND_DENOMINATOR_PRE_LONDON)
        }
        .ok_or(VMError::Internal(InternalError::UndefinedState(-1)))?;
        let refunded_gas = report.gas_refunded.min(refund_cap);
        report.gas_refunded = refunded_gas;

        let max_gas = self.env.gas_limit;
        let gas_to_return = max_gas
            .checked_sub(consumed_gas)
            .and_then(|gas| gas.checked_add(refunded_gas))
            .ok_or(VMError::Internal(InternalError::UndefinedState(0)))?;

        let wei_return_amount = self
            .env
            .gas_price
            .checked_mul(U256::from(gas_to_return))
            .ok_or(VMError::Internal(InternalError::UndefinedState(1)))?;
        self.increase_account_balance(sender_address, wei_return_amount)?;

        let coinbase_address = self.env.coinbase;
        let gas_to_pay_coinbase = consumed_gas
            .checked_sub(refunded_gas)
            .ok_or(VMError::Internal(InternalError::UndefinedState(2)))?;

        let priority_fee_per_gas = if self.spec.eip1559 {
            self.env
                .gas_price
                .checked_sub(self.env.base_fee_per_gas)
                .ok_or(VMError::GasPriceIsLowerThanBaseFee)?
        } else {
            self.env.gas_price
        };
        let coinbase_fee = U256::from(gas_to_pay_coinbase)
            .checked_mul(priority_fee_per_gas)
            .ok_or(VMError::BalanceOverflow)?;

        if !coinbase_fee.is_zero() {
            self.increase_account_balance(coinbase_address, coinbase_fee)?;
        };

        // In Cancun the only addresses destroyed are contracts created in
        // this same transaction, so removing them from the cache is enough.
        for address in self.accrued_substate.selfdestruct_set.clone() {
            remove_account(&mut self.cache, &address);
        }

        // EIP-161: state-touched accounts that ended up empty disappear.
        if self.spec.eip161 {
            let empty_touched: Vec<Address> = self
                .accrued_substate
                .touched_accounts
                .iter()
                .filter(|address| {
                    cache::get_account(&self.cache, address)
                        .is_some_and(|account| account.is_empty())
                })
                .copied()
                .collect();
            for address in empty_touched {
                remove_account(&mut self.cache, &address);
            }
        }

        Ok(())
    }

    /// Runs the whole transaction: validation, execution, settlement.
    pub fn transact(&mut self) -> Result<TransactionReport, VMError> {
        let mut initial_call_frame = self
            .call_frames
            .pop()
            .ok_or(VMError::Internal(InternalError::CouldNotPopCallframe))?;

        debug!(
            origin = ?self.env.origin,
            to = ?initial_call_frame.to,
            gas_limit = self.env.gas_limit,
            fork = ?self.env.fork,
            "executing transaction"
        );

        self.prepare_execution(&mut initial_call_frame)?;

        // a CREATE transaction colliding with an existing account consumes
        // everything
        if self.is_create() {
            let new_address_info = self.db.get_account_info(initial_call_frame.to);
            if new_address_info.nonce != 0 || new_address_info.has_code() {
                return Err(VMError::AddressAlreadyOccupied);
            }
        }

        let mut report = self.execute(&mut initial_call_frame)?;
        if self.is_create() && !report.is_success() {
            remove_account(&mut self.cache, &initial_call_frame.to);
        }
        if self.is_create() && report.is_success() {
            report.created_address = Some(initial_call_frame.to);
        }

        self.post_execution_changes(&initial_call_frame, &mut report)?;

        // the transient store does not outlive the transaction
        self.transient_storage.clear();

        report.new_state.clone_from(&self.cache);

        Ok(report)
    }

    pub fn current_call_frame_mut(&mut self) -> Result<&mut CallFrame, VMError> {
        self.call_frames.last_mut().ok_or(VMError::Internal(
            InternalError::CouldNotAccessLastCallframe,
        ))
    }

    /// Calculates the address of a new contract created with CREATE:
    ///
    /// address = keccak256(rlp([sender_address, sender_nonce]))[12:]
    pub fn calculate_create_address(
        sender_address: Address,
        sender_nonce: u64,
    ) -> Result<Address, VMError> {
        let mut encoded = Vec::new();
        (sender_address, sender_nonce).encode(&mut encoded);
        let hash = keccak(encoded);
        Ok(Address::from_slice(hash.as_bytes().get(12..).ok_or(
            VMError::Internal(InternalError::CouldNotComputeCreateAddress),
        )?))
    }

    /// Calculates the address of a new contract created with CREATE2:
    ///
    /// address = keccak256(0xff ++ sender_address ++ salt ++ keccak256(initialization_code))[12:]
    pub fn calculate_create2_address(
        sender_address: Address,
        initialization_code: &Bytes,
        salt: U256,
    ) -> Result<Address, VMError> {
        let init_code_hash = keccak(initialization_code);
        let mut salt_bytes = [0; 32];
        salt.to_big_endian(&mut salt_bytes);

        let preimage = [
            &[0xff],
            sender_address.as_bytes(),
            &salt_bytes,
            init_code_hash.as_bytes(),
        ]
        .concat();
        let generated_address = Address::from_slice(
            keccak(preimage)
                .as_bytes()
                .get(12..)
                .ok_or(VMError::Internal(
                    InternalError::CouldNotComputeCreate2Address,
                ))?,
        );
        Ok(generated_address)
    }

    /// Increases gas consumption of the frame, erroring when the frame gas
    /// limit is reached.
    pub fn increase_consumed_gas(
        &mut self,
        current_call_frame: &mut CallFrame,
        gas: u64,
    ) -> Result<(), VMError> {
        let potential_consumed_gas = current_call_frame
            .gas_used
            .checked_add(gas)
            .ok_or(OutOfGasError::ConsumedGasOverflow)?;
        if potential_consumed_gas > current_call_frame.gas_limit {
            return Err(VMError::OutOfGas(OutOfGasError::MaxGasLimitExceeded));
        }

        current_call_frame.gas_used = potential_consumed_gas;

        Ok(())
    }

    /// Accesses an account's information, tracking warmth (EIP-2929).
    pub fn access_account(&mut self, address: Address) -> (AccountInfo, bool) {
        let address_was_cold = self.accrued_substate.touched_accounts.insert(address);
        let account = match cache::get_account(&self.cache, &address) {
            Some(account) => account.info.clone(),
            None => self.db.get_account_info(address),
        };
        (account, address_was_cold)
    }

    /// Accesses an account's storage slot, tracking warmth (EIP-2929).
    pub fn access_storage_slot(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<(StorageSlot, bool), VMError> {
        let storage_slot_was_cold = self
            .accrued_substate
            .touched_storage_slots
            .entry(address)
            .or_default()
            .insert(key);
        let storage_slot = match cache::get_account(&self.cache, &address) {
            Some(account) => match account.storage.get(&key) {
                Some(storage_slot) => *storage_slot,
                None => {
                    let value = self.db.get_storage_slot(address, key);
                    StorageSlot {
                        original_value: value,
                        current_value: value,
                    }
                }
            },
            None => {
                let value = self.db.get_storage_slot(address, key);
                StorageSlot {
                    original_value: value,
                    current_value: value,
                }
            }
        };

        // cache the slot (and the account holding it) so later SSTOREs see
        // the original value
        let account = self.get_account_mut(address)?;
        account.storage.insert(key, storage_slot);

        Ok((storage_slot, storage_slot_was_cold))
    }

    pub fn increase_account_balance(
        &mut self,
        address: Address,
        increase: U256,
    ) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.info.balance = account
            .info
            .balance
            .checked_add(increase)
            .ok_or(VMError::BalanceOverflow)?;
        Ok(())
    }

    pub fn decrease_account_balance(
        &mut self,
        address: Address,
        decrease: U256,
    ) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.info.balance = account
            .info
            .balance
            .checked_sub(decrease)
            .ok_or(VMError::BalanceUnderflow)?;
        Ok(())
    }

    pub fn increment_account_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        let account = self.get_account_mut(address)?;
        account.info.nonce = account
            .info
            .nonce
            .checked_add(1)
            .ok_or(VMError::NonceOverflow)?;
        Ok(account.info.nonce)
    }

    pub fn update_account_bytecode(
        &mut self,
        address: Address,
        new_bytecode: Bytes,
    ) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.info.bytecode = new_bytecode;
        Ok(())
    }

    pub fn update_account_storage(
        &mut self,
        address: Address,
        key: H256,
        new_value: U256,
    ) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        let original_value = account
            .storage
            .get(&key)
            .map_or_else(U256::zero, |slot| slot.original_value);
        account.storage.insert(
            key,
            StorageSlot {
                original_value,
                current_value: new_value,
            },
        );
        Ok(())
    }

    pub fn get_account_mut(&mut self, address: Address) -> Result<&mut Account, VMError> {
        if !cache::is_account_cached(&self.cache, &address) {
            let account_info = self.db.get_account_info(address);
            let account = Account {
                info: account_info,
                storage: HashMap::new(),
            };
            cache::insert_account(&mut self.cache, address, account);
        }
        cache::get_account_mut(&mut self.cache, &address)
            .ok_or(VMError::Internal(InternalError::AccountNotFound))
    }

    /// Gets an account, first checking the cache and falling back to the
    /// database (caching the result).
    pub fn get_account(&mut self, address: Address) -> Account {
        match cache::get_account(&self.cache, &address) {
            Some(acc) => acc.clone(),
            None => {
                let account_info = self.db.get_account_info(address);
                let account = Account {
                    info: account_info,
                    storage: HashMap::new(),
                };
                cache::insert_account(&mut self.cache, address, account.clone());
                account
            }
        }
    }
}

fn get_n_value(op: Opcode, base_opcode: Opcode) -> Result<usize, VMError> {
    let offset = usize::from(op)
        .checked_sub(usize::from(base_opcode))
        .ok_or(VMError::InvalidOpcode)?
        .checked_add(1)
        .ok_or(VMError::InvalidOpcode)?;

    Ok(offset)
}

fn get_number_of_topics(op: Opcode) -> Result<u8, VMError> {
    let number_of_topics = u8::from(op)
        .checked_sub(u8::from(Opcode::LOG0))
        .ok_or(VMError::InvalidOpcode)?;

    Ok(number_of_topics)
}
