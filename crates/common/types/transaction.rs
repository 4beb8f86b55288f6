use ember_rlp::{constants::RLP_NULL, encode::RLPEncode};
use ethereum_types::Address;
use serde::{Deserialize, Serialize};

/// The target of a transaction: a message call to an existing account or the
/// creation of a new contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Call(Address),
    #[default]
    Create,
}

impl RLPEncode for TxKind {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            Self::Call(address) => address.encode(buf),
            Self::Create => buf.put_u8(RLP_NULL),
        }
    }
}

/// Transaction envelope types recognized at the host boundary.
/// The engine itself only consumes the fields already flattened into its
/// environment; decoding lives in the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxType {
    #[default]
    Legacy = 0x00,
    AccessList = 0x01,
    DynamicFee = 0x02,
    Blob = 0x03,
    SetCode = 0x04,
}
