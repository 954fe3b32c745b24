// ABOUTME: The runtime adapter contract and the neutral image model.
// ABOUTME: Defines ImageRuntime plus the shared value types it returns.

mod images;
pub(crate) mod sealed;
mod shared_types;

pub use images::{ImageError, ImageRuntime};
pub use shared_types::*;
