//! Description of the device whose partition table is being edited.

/// Geometry and alignment properties of a storage device.
///
/// Probed once by the backend at session start and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Device {
    /// Path of the device (or image file).
    pub path: String,
    /// Logical sector size in bytes.
    pub sector_size: u64,
    /// Physical sector size in bytes.
    pub physical_sector_size: u64,
    /// Total number of sectors.
    pub length: u64,
    /// Hardware geometry of the device.
    pub chs: ChsGeometry,
    /// Minimum alignment grain in sectors.
    pub min_grain: u64,
    /// Optimal alignment grain in sectors.
    pub opt_grain: u64,
}

impl Device {
    /// The size of the device in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.length * self.sector_size
    }

    /// The last addressable sector.
    pub fn last_sector(&self) -> u64 {
        self.length - 1
    }

    /// The device path of the given partition number.
    ///
    /// Devices whose name ends in a digit get a `p` infix (`nvme0n1p1`),
    /// everything else a bare number (`sda1`).
    pub fn partition_path(&self, number: u32) -> String {
        let mut path = self.path.clone();
        if path.ends_with(|c: char| c.is_ascii_digit()) {
            path.push('p');
        }
        path.push_str(&number.to_string());
        path
    }
}

/// Cylinder/head/sector geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChsGeometry {
    pub cylinders: u64,
    pub heads: u32,
    pub sectors: u32,
}

impl ChsGeometry {
    /// Derive a geometry from the total sector count.
    ///
    /// Modern kernels no longer expose a real geometry, so this uses the
    /// classical LBA-era fallback of 255 heads and 63 sectors per track.
    pub fn from_length(length: u64) -> Self {
        const HEADS: u32 = 255;
        const SECTORS: u32 = 63;
        Self {
            cylinders: length / u64::from(HEADS * SECTORS),
            heads: HEADS,
            sectors: SECTORS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_chs_fallback() {
        let chs = ChsGeometry::from_length(2_048_000);
        assert_eq!(chs.heads, 255);
        assert_eq!(chs.sectors, 63);
        assert_eq!(chs.cylinders, 127);
    }

    #[test]
    pub fn test_partition_path() {
        let mut device = Device {
            path: "/dev/sda".to_owned(),
            sector_size: 512,
            physical_sector_size: 512,
            length: 2_048_000,
            chs: ChsGeometry::from_length(2_048_000),
            min_grain: 1,
            opt_grain: 2048,
        };
        assert_eq!(device.partition_path(3), "/dev/sda3");
        device.path = "/dev/nvme0n1".to_owned();
        assert_eq!(device.partition_path(3), "/dev/nvme0n1p3");
    }
}
