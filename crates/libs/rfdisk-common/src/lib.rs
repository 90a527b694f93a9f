//! Common functionality shared by the rfdisk tool: the in-memory partition
//! table model and the backends that read and write real disks.

pub mod backend;
pub mod device;
pub mod disk;

/// Result type using Anyhow's error type.
pub type Anyhow<T> = anyhow::Result<T>;
