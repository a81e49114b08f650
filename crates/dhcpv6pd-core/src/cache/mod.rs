// # Config Cache Implementations
//
// This module provides implementations of the ConfigWriter trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileConfigCache;
pub use memory::MemoryConfigCache;
