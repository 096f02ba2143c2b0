pub mod advisory;
pub mod approval;
pub mod config;
pub mod contracts;
pub mod error;
pub mod evm;
pub mod orchestrator;
pub mod retry;
pub mod runtime;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod setup;
pub mod sim;
pub mod tron_session;
pub mod wallet;

pub use wallet_approval_lib_common::{err_create, err_custom_create, err_from, err_from_msg};
