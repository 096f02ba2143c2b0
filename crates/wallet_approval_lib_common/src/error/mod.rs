mod bag;
mod custom;
mod transport;
mod wrapped;

pub use bag::ErrorBag;
pub use custom::CustomError;
pub use transport::{classify_wallet_failure, TransportError};
pub use wrapped::ApprovalError;

/// Export macros for creating errors
mod macros;
