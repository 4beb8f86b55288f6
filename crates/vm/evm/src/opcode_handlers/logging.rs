use crate::{
    call_frame::CallFrame,
    errors::{OpcodeSuccess, VMError},
    gas_cost,
    vm::VM,
};
use bytes::Bytes;
use ember_core::{types::Log, H256};

// Logging Operations (5)
// Opcodes: LOG0 ... LOG4

impl VM {
    // LOGn operation, 0 <= n <= 4
    pub fn op_log(
        &mut self,
        current_call_frame: &mut CallFrame,
        number_of_topics: u8,
    ) -> Result<OpcodeSuccess, VMError> {
        if current_call_frame.is_static {
            return Err(VMError::OpcodeNotAllowedInStaticContext);
        }

        let offset: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;
        let size: usize = current_call_frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| VMError::VeryLargeNumber)?;

        let mut topics = Vec::with_capacity(usize::from(number_of_topics));
        for _ in 0..number_of_topics {
            let topic = current_call_frame.stack.pop()?;
            let mut topic_bytes = [0u8; 32];
            topic.to_big_endian(&mut topic_bytes);
            topics.push(H256::from(topic_bytes));
        }

        let memory_expansion_cost = current_call_frame.memory.expansion_cost(offset, size)?;
        let gas_cost = gas_cost::log(u64::from(number_of_topics), size, memory_expansion_cost)?;
        self.increase_consumed_gas(current_call_frame, gas_cost)?;

        let data = current_call_frame.memory.load_range(offset, size)?;
        let log = Log {
            address: current_call_frame.to,
            topics,
            data: Bytes::from(data),
        };
        current_call_frame.logs.push(log);

        Ok(OpcodeSuccess::Continue)
    }
}
