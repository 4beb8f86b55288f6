pub mod arithmetic;
pub mod bitwise_comparison;
pub mod block;
pub mod dup;
pub mod environment;
pub mod exchange;
pub mod keccak;
pub mod logging;
pub mod push;
pub mod stack_memory_storage_flow;
pub mod system;

// Opcode handlers live as methods on `VM`, one file per instruction group:
//
//   arithmetic                ADD SUB MUL DIV SDIV MOD SMOD ADDMOD MULMOD EXP SIGNEXTEND
//   bitwise_comparison        LT GT SLT SGT EQ ISZERO AND OR XOR NOT BYTE SHL SHR SAR
//   block                     BLOCKHASH COINBASE TIMESTAMP NUMBER PREVRANDAO GASLIMIT
//                             CHAINID SELFBALANCE BASEFEE BLOBHASH BLOBBASEFEE
//   dup / exchange / push     DUP1..16 SWAP1..16 PUSH0..32
//   environment               ADDRESS BALANCE ORIGIN CALLER CALLVALUE CALLDATA*
//                             CODE* GASPRICE EXTCODE* RETURNDATA*
//   keccak                    KECCAK256
//   logging                   LOG0..4
//   stack_memory_storage_flow POP MLOAD MSTORE MSTORE8 SLOAD SSTORE JUMP JUMPI PC
//                             MSIZE GAS JUMPDEST TLOAD TSTORE MCOPY
//   system                    CREATE CALL CALLCODE RETURN DELEGATECALL CREATE2
//                             STATICCALL REVERT INVALID SELFDESTRUCT
