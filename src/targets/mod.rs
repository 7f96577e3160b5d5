//! Concrete targets shipped with the crate

pub mod memory;

pub use memory::{MemoryBuffer, MemoryTarget, RenderFormat};
