// ABOUTME: Strongly-typed value objects shared across the crate.
// ABOUTME: Image reference parsing and validation.

mod image_ref;

pub use image_ref::{ImageRef, ParseImageRefError};
