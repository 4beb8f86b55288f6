pub mod types;

pub use ethereum_types::{Address, BigEndianHash, H160, H256, H512, U256, U512};
