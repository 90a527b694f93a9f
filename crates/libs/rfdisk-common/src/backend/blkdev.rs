//! Functionality for working with Linux block devices.

use std::fs;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use nix::libc::dev_t;

/// Block device.
#[derive(Debug, Clone)]
pub struct BlockDevice {
    /// Number of the device (uniquely identifies the device).
    dev: dev_t,
    /// UTF-8 path of the block device in `/dev`.
    path: String,
}

impl BlockDevice {
    /// Create a block device from the given device path in `/dev`.
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        fn inner(path: &Path) -> io::Result<BlockDevice> {
            // Resolve any symlinks to get a canonical path in `/dev`.
            let path = path.canonicalize()?;
            let path =
                String::from_utf8(path.into_os_string().into_encoded_bytes()).map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "device path must be valid UTF-8",
                    )
                })?;
            let stat = nix::sys::stat::stat(path.as_str())?;
            if stat.st_mode & nix::libc::S_IFMT != nix::libc::S_IFBLK {
                Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{path:?} is not a block device"),
                ))
            } else {
                Ok(BlockDevice {
                    path,
                    dev: stat.st_rdev,
                })
            }
        }
        inner(path.as_ref())
    }

    /// Path of the block device in `/dev`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query the size of the block device in bytes.
    pub fn size(&self) -> io::Result<u64> {
        use nix::{ioctl_read, libc::c_ulonglong};

        ioctl_read! {
            /// Get the size of the block device in bytes.
            ioctl_get_size, 0x12, 114, c_ulonglong
        }

        let file = fs::File::open(&self.path)?;
        let mut size = 0;
        unsafe {
            // SAFETY: The file points to a block device.
            ioctl_get_size(file.as_raw_fd(), &mut size)
        }?;
        Ok(size)
    }

    /// Read a numeric attribute from the device's `queue` directory in
    /// `/sys`, if present.
    ///
    /// Partitions do not carry a `queue` directory, in which case [`None`]
    /// is returned and the caller falls back to defaults.
    pub fn queue_attr(&self, name: &str) -> io::Result<Option<u64>> {
        let path = self.sysfs_path()?.join("queue").join(name);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)?;
        value.trim().parse().map(Some).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("attribute {name:?} of {:?} is not a number", self.path),
            )
        })
    }

    /// Canonical path of the block device in `/sys`.
    fn sysfs_path(&self) -> io::Result<PathBuf> {
        let major = nix::sys::stat::major(self.dev);
        let minor = nix::sys::stat::minor(self.dev);
        PathBuf::from(format!("/sys/dev/block/{major}:{minor}")).canonicalize()
    }
}

/// Check whether the device at the given path is a block device.
///
/// If the path does not exist, [`false`] is returned.
pub fn is_block_device<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    fn inner(path: &Path) -> io::Result<bool> {
        if path.exists() {
            Ok(path.metadata()?.file_type().is_block_device())
        } else {
            Ok(false)
        }
    }
    inner(path.as_ref())
}
