use bytes::BufMut;

use super::encode::{encode_list_prefix, RLPEncode};

/// Helper for encoding a struct as an RLP list, field by field.
///
/// # Examples
///
/// ```
/// # use ember_rlp::structs::Encoder;
/// let mut buf = Vec::new();
/// Encoder::new(&mut buf)
///     .encode_field(&1u8)
///     .encode_field(&2u8)
///     .finish();
/// assert_eq!(buf, vec![0xc2, 0x01, 0x02]);
/// ```
#[must_use = "the encoder only writes the list on finish()"]
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    temp_buf: Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            temp_buf: Vec::new(),
        }
    }

    pub fn encode_field<T: RLPEncode>(mut self, value: &T) -> Self {
        value.encode(&mut self.temp_buf);
        self
    }

    /// Writes the list header and the accumulated payload.
    pub fn finish(self) {
        encode_list_prefix(self.temp_buf.len(), self.buf);
        self.buf.put_slice(&self.temp_buf);
    }
}
