use bytes::{BufMut, Bytes};
use ethereum_types::{H160, H256, U256};
use tinyvec::ArrayVec;

use super::constants::{RLP_EMPTY_LIST, RLP_NULL};

/// Function for encoding a value to RLP.
/// For encoding the value into a buffer directly, use [`RLPEncode::encode`].
pub fn encode<T: RLPEncode>(value: T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut buf);
    buf
}

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn length(&self) -> usize {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf.len()
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

impl<T: RLPEncode + ?Sized> RLPEncode for &T {
    fn encode(&self, buf: &mut dyn BufMut) {
        (**self).encode(buf)
    }
}

impl RLPEncode for bool {
    #[inline(always)]
    fn encode(&self, buf: &mut dyn BufMut) {
        if *self {
            buf.put_u8(0x01);
        } else {
            buf.put_u8(RLP_NULL);
        }
    }

    #[inline(always)]
    fn length(&self) -> usize {
        1
    }
}

// integer types impls

impl RLPEncode for u8 {
    fn encode(&self, buf: &mut dyn BufMut) {
        match *self {
            // 0, also known as null or the empty string is 0x80
            0 => buf.put_u8(RLP_NULL),
            // for a single byte whose value is in the [0x00, 0x7f] range, that byte is its own RLP encoding.
            n @ 1..=0x7f => buf.put_u8(n),
            // Otherwise, if a string is 0-55 bytes long, the RLP encoding consists of a
            // single byte with value RLP_NULL (0x80) plus the length of the string followed by the string.
            n => {
                buf.put_u8(RLP_NULL + 1);
                buf.put_u8(n);
            }
        }
    }
}

impl RLPEncode for u16 {
    fn encode(&self, buf: &mut dyn BufMut) {
        match *self {
            0 => buf.put_u8(RLP_NULL),
            n @ 1..=0x7f => buf.put_u8(n as u8),
            n => {
                let mut bytes = ArrayVec::<[u8; 8]>::new();
                bytes.extend_from_slice(&n.to_be_bytes());
                let start = bytes.iter().position(|&x| x != 0).unwrap();
                let len = bytes.len() - start;
                buf.put_u8(RLP_NULL + len as u8);
                buf.put_slice(&bytes[start..]);
            }
        }
    }
}

impl RLPEncode for u32 {
    fn encode(&self, buf: &mut dyn BufMut) {
        match *self {
            0 => buf.put_u8(RLP_NULL),
            n @ 1..=0x7f => buf.put_u8(n as u8),
            n => {
                let mut bytes = ArrayVec::<[u8; 8]>::new();
                bytes.extend_from_slice(&n.to_be_bytes());
                let start = bytes.iter().position(|&x| x != 0).unwrap();
                let len = bytes.len() - start;
                buf.put_u8(RLP_NULL + len as u8);
                buf.put_slice(&bytes[start..]);
            }
        }
    }
}

impl RLPEncode for u64 {
    fn encode(&self, buf: &mut dyn BufMut) {
        match *self {
            0 => buf.put_u8(RLP_NULL),
            n @ 1..=0x7f => buf.put_u8(n as u8),
            n => {
                let mut bytes = ArrayVec::<[u8; 8]>::new();
                bytes.extend_from_slice(&n.to_be_bytes());
                let start = bytes.iter().position(|&x| x != 0).unwrap();
                let len = bytes.len() - start;
                buf.put_u8(RLP_NULL + len as u8);
                buf.put_slice(&bytes[start..]);
            }
        }
    }
}

impl RLPEncode for usize {
    fn encode(&self, buf: &mut dyn BufMut) {
        (*self as u64).encode(buf);
    }
}

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        let leading_zeros_in_bytes: usize = (self.leading_zeros() / 8) as usize;
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        bytes[leading_zeros_in_bytes..].encode(buf)
    }
}

impl RLPEncode for [u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        if self.len() == 1 && self[0] < RLP_NULL {
            buf.put_u8(self[0]);
        } else {
            let len = self.len();
            if len < 56 {
                buf.put_u8(RLP_NULL + len as u8);
            } else {
                let mut bytes = ArrayVec::<[u8; 8]>::new();
                bytes.extend_from_slice(&len.to_be_bytes());
                let start = bytes.iter().position(|&x| x != 0).unwrap();
                let len_of_len = bytes.len() - start;
                buf.put_u8(0xb7 + len_of_len as u8);
                buf.put_slice(&bytes[start..]);
            }
            buf.put_slice(self);
        }
    }
}

impl<const N: usize> RLPEncode for [u8; N] {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_slice().encode(buf)
    }
}

impl RLPEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf)
    }
}

impl RLPEncode for H160 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl RLPEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl<T: RLPEncode> RLPEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        for item in self {
            item.encode(&mut payload);
        }
        encode_list_prefix(payload.len(), buf);
        buf.put_slice(&payload);
    }
}

impl<S: RLPEncode, T: RLPEncode> RLPEncode for (S, T) {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut payload = Vec::new();
        self.0.encode(&mut payload);
        self.1.encode(&mut payload);
        encode_list_prefix(payload.len(), buf);
        buf.put_slice(&payload);
    }
}

/// Writes the RLP list header for a payload of the given length.
pub(crate) fn encode_list_prefix(payload_len: usize, buf: &mut dyn BufMut) {
    if payload_len < 56 {
        buf.put_u8(RLP_EMPTY_LIST + payload_len as u8);
    } else {
        let mut bytes = ArrayVec::<[u8; 8]>::new();
        bytes.extend_from_slice(&payload_len.to_be_bytes());
        let start = bytes.iter().position(|&x| x != 0).unwrap();
        let len_of_len = bytes.len() - start;
        buf.put_u8(0xf7 + len_of_len as u8);
        buf.put_slice(&bytes[start..]);
    }
}

#[cfg(test)]
mod tests {
    use super::{encode, RLPEncode};
    use ethereum_types::H160;

    #[test]
    fn encode_small_integers() {
        assert_eq!(encode(0u8), vec![0x80]);
        assert_eq!(encode(1u64), vec![0x01]);
        assert_eq!(encode(0x7fu64), vec![0x7f]);
        assert_eq!(encode(0x80u64), vec![0x81, 0x80]);
        assert_eq!(encode(1024u64), vec![0x82, 0x04, 0x00]);
    }

    #[test]
    fn encode_byte_strings() {
        assert_eq!(encode([0x7fu8].as_slice()), vec![0x7f]);
        assert_eq!(encode([0x83u8].as_slice()), vec![0x81, 0x83]);
        let long = vec![0xaau8; 60];
        let mut expected = vec![0xb8, 60];
        expected.extend_from_slice(&long);
        assert_eq!(encode(long.as_slice()), expected);
    }

    #[test]
    fn encode_address_nonce_pair() {
        // the canonical payload hashed by CREATE address derivation
        let sender = H160::zero();
        let encoded = encode((sender, 0u64));
        assert_eq!(encoded[0], 0xc0 + 22);
        assert_eq!(encoded[1], 0x80 + 20);
        assert_eq!(*encoded.last().unwrap(), 0x80);
    }
}
