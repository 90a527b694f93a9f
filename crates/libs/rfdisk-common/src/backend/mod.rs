//! Disk backends: probing devices and reading/writing partition tables.

use std::path::Path;

use thiserror::Error;

use crate::device::Device;
use crate::disk::table::Disk;
use crate::Anyhow;

pub mod blkdev;
mod sfdisk;

pub use sfdisk::SfdiskBackend;

/// Error loading a partition table from a device.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The device carries no recognized partition table.
    #[error("device contains no recognized partition table")]
    NoTable,
    /// The device carries a partition table of a different type.
    #[error("Only MBR partitions are supported (found {label} label)")]
    ForeignTable { label: String },
    /// The backend failed to read or interpret the table.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Interface to the physical disk.
///
/// All durable side effects of a session go through [`DiskBackend::commit`];
/// everything else is read-only with respect to the device.
pub trait DiskBackend {
    /// Probe geometry and alignment properties of the device at `path`.
    fn probe(&self, path: &Path) -> Anyhow<Device>;

    /// Load the partition table from the device.
    ///
    /// Tables of any type other than msdos are rejected, not converted.
    fn load(&self, device: &Device) -> Result<Disk, LoadError>;

    /// Create a fresh, empty in-memory msdos table for the device.
    fn create_empty(&self, device: &Device) -> Disk {
        Disk::new(device.length)
    }

    /// Write the partition table to the device, making it durable.
    fn commit(&self, device: &Device, disk: &Disk) -> Anyhow<()>;
}
