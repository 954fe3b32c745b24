// ABOUTME: Sealed trait pattern for the runtime adapter contract.
// ABOUTME: Keeps adapter implementations inside the crate.

/// Marker trait restricting who may implement the adapter contract.
///
/// Only crate-internal engine adapters implement this, which lets the
/// contract grow new methods without breaking downstream crates.
pub trait Sealed {}
