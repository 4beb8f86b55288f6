use bytes::Bytes;
use ember_rlp::{
    encode::RLPEncode,
    structs::Encoder,
};
use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

/// Event emitted by a `LOG0..LOG4` instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

impl RLPEncode for Log {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.address)
            .encode_field(&self.topics)
            .encode_field(&self.data)
            .finish();
    }
}
