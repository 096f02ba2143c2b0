pub use wallet_approval_lib_common::error::*;
