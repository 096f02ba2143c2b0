pub mod error;
mod events;
mod metrics;
mod model;

pub use crate::metrics::*;
pub use events::*;
pub use model::*;
