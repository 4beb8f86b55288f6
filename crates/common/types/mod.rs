mod receipt;
mod transaction;

pub use receipt::*;
pub use transaction::*;
