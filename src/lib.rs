// ABOUTME: Library root for gantry - engine-agnostic container image access.
// ABOUTME: Exposes the runtime adapter contract and the neutral image model.

pub mod runtime;
pub mod types;
