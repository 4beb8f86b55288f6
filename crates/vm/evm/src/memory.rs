use crate::{
    constants::{MEMORY_EXPANSION_QUOTIENT, WORD_SIZE},
    errors::{InternalError, OutOfGasError, VMError},
};
use ember_core::U256;

/// Byte-addressable frame memory. The backing vector always holds a multiple
/// of 32 bytes; expansion happens on access and is paid for up front by the
/// handler through [`Memory::expansion_cost`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

impl From<Vec<u8>> for Memory {
    fn from(data: Vec<u8>) -> Self {
        Memory { data }
    }
}

impl Memory {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> U256 {
        U256::from(self.data.len())
    }

    fn resize(&mut self, memory_byte_size: usize) -> Result<(), VMError> {
        let rounded = memory_byte_size
            .checked_next_multiple_of(WORD_SIZE)
            .ok_or(VMError::VeryLargeNumber)?;
        if rounded > self.data.len() {
            self.data.resize(rounded, 0);
        }
        Ok(())
    }

    /// Reads a 32-byte word, expanding memory if the range was untouched.
    pub fn load(&mut self, offset: usize) -> Result<U256, VMError> {
        let end = offset
            .checked_add(WORD_SIZE)
            .ok_or(VMError::VeryLargeNumber)?;
        self.resize(end)?;
        let value_bytes = self
            .data
            .get(offset..end)
            .ok_or(VMError::Internal(InternalError::SlicingError))?;
        Ok(U256::from_big_endian(value_bytes))
    }

    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Vec<u8>, VMError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let end = offset.checked_add(size).ok_or(VMError::VeryLargeNumber)?;
        self.resize(end)?;
        self.data
            .get(offset..end)
            .map(<[u8]>::to_vec)
            .ok_or(VMError::Internal(InternalError::SlicingError))
    }

    pub fn store_bytes(&mut self, offset: usize, value: &[u8]) -> Result<(), VMError> {
        if value.is_empty() {
            return Ok(());
        }
        let end = offset
            .checked_add(value.len())
            .ok_or(VMError::VeryLargeNumber)?;
        self.resize(end)?;
        self.data
            .get_mut(offset..end)
            .ok_or(VMError::Internal(InternalError::SlicingError))?
            .copy_from_slice(value);
        Ok(())
    }

    /// Overlap-safe copy inside the same memory, as MCOPY requires.
    pub fn copy(&mut self, src_offset: usize, dest_offset: usize, size: usize) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        let src_end = src_offset
            .checked_add(size)
            .ok_or(VMError::VeryLargeNumber)?;
        let dest_end = dest_offset
            .checked_add(size)
            .ok_or(VMError::VeryLargeNumber)?;
        self.resize(src_end.max(dest_end))?;
        self.data.copy_within(src_offset..src_end, dest_offset);
        Ok(())
    }

    /// Incremental gas for growing memory to cover `[offset, offset + size)`.
    /// A zero-size range never expands, whatever the offset.
    pub fn expansion_cost(&self, offset: usize, size: usize) -> Result<u64, VMError> {
        if size == 0 {
            return Ok(0);
        }
        let end = offset.checked_add(size).ok_or(VMError::VeryLargeNumber)?;
        self.expansion_cost_for_byte_size(end)
    }

    /// Incremental gas for growing memory to `memory_byte_size` bytes.
    pub fn expansion_cost_for_byte_size(&self, memory_byte_size: usize) -> Result<u64, VMError> {
        if memory_byte_size <= self.data.len() {
            return Ok(0);
        }
        let new_cost = memory_cost_in_words(word_count(memory_byte_size)?)?;
        let current_cost = memory_cost_in_words(word_count(self.data.len())?)?;
        new_cost
            .checked_sub(current_cost)
            .ok_or(VMError::Internal(InternalError::ArithmeticOperationUnderflow))
    }
}

fn word_count(byte_size: usize) -> Result<u64, VMError> {
    let words = byte_size.div_ceil(WORD_SIZE);
    u64::try_from(words).map_err(|_| VMError::VeryLargeNumber)
}

/// `3w + w^2 / 512`, integer floor.
fn memory_cost_in_words(words: u64) -> Result<u64, VMError> {
    let linear = words
        .checked_mul(3)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
    let quadratic = words
        .checked_mul(words)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?
        .checked_div(MEMORY_EXPANSION_QUOTIENT)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))?;
    linear
        .checked_add(quadratic)
        .ok_or(VMError::OutOfGas(OutOfGasError::GasCostOverflow))
}

#[cfg(test)]
mod tests {
    use super::Memory;
    use ember_core::U256;

    #[test]
    fn expansion_cost_matches_quadratic_formula() {
        let memory = Memory::new();
        // one word
        assert_eq!(memory.expansion_cost(0, 32).unwrap(), 3);
        // 32 words: 3*32 + 32*32/512 = 98
        assert_eq!(memory.expansion_cost(0, 1024).unwrap(), 98);
        // growing memory pays only the delta
        let mut grown = Memory::new();
        grown.load_range(0, 32).unwrap();
        assert_eq!(grown.expansion_cost(0, 1024).unwrap(), 95);
    }

    #[test]
    fn reads_beyond_length_are_zero_after_expansion() {
        let mut memory = Memory::new();
        assert_eq!(memory.load(64).unwrap(), U256::zero());
        assert_eq!(memory.size(), U256::from(96));
    }

    #[test]
    fn copy_handles_overlap() {
        let mut memory = Memory::new();
        memory.store_bytes(0, &[1, 2, 3, 4]).unwrap();
        memory.copy(0, 2, 4).unwrap();
        assert_eq!(memory.load_range(0, 6).unwrap(), vec![1, 2, 1, 2, 3, 4]);
    }
}
