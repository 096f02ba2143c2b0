pub mod evm;
pub mod tron;
