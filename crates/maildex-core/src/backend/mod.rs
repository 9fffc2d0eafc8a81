//! Reference implementations of the index capability.

pub mod memory;
