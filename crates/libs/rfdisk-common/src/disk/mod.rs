//! Utilities for working with MBR-partitioned disks.
//!
//! All quantities in this module are sector numbers or sector counts. Byte
//! values only appear at the edges, when converting operator-supplied sizes
//! or when formatting output.

pub mod mbr;
pub mod table;

/// An inclusive range of sectors on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    /// First sector of the range.
    pub start: u64,
    /// Last sector of the range (inclusive).
    pub end: u64,
}

impl Geometry {
    /// Create a geometry from its first and last sector.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// The number of sectors covered by the geometry.
    pub const fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Check whether the geometry fully contains `other`.
    pub const fn contains(&self, other: &Geometry) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Check whether the geometry shares at least one sector with `other`.
    pub const fn overlaps(&self, other: &Geometry) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Intersect the geometry with `other`.
    pub fn intersect(&self, other: &Geometry) -> Option<Geometry> {
        if self.overlaps(other) {
            Some(Geometry::new(
                self.start.max(other.start),
                self.end.min(other.end),
            ))
        } else {
            None
        }
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("[{}, {}]", self.start, self.end))
    }
}

/// Align the sector number rounding upward.
pub const fn ceil_align_to(sector: u64, align: u64) -> u64 {
    sector.div_ceil(align) * align
}

/// Align the sector number rounding downward.
pub const fn floor_align_to(sector: u64, align: u64) -> u64 {
    (sector / align) * align
}

/// Binary size units accepted in partition size expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeUnit {
    KiB,
    MiB,
    GiB,
}

impl SizeUnit {
    /// The number of bytes of the unit.
    pub const fn num_bytes(self) -> u64 {
        match self {
            SizeUnit::KiB => 1 << 10,
            SizeUnit::MiB => 1 << 20,
            SizeUnit::GiB => 1 << 30,
        }
    }
}

/// Convert a size in the given unit to a number of sectors.
///
/// Saturates at [`u64::MAX`]; out-of-range values are rejected later by the
/// bounds checks of the partition table model.
pub fn size_to_sectors(count: u64, unit: SizeUnit, sector_size: u64) -> u64 {
    let bytes = (count as u128) * (unit.num_bytes() as u128);
    u64::try_from(bytes / (sector_size as u128)).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_sector_alignment() {
        assert_eq!(ceil_align_to(2048, 2048), 2048);
        assert_eq!(floor_align_to(2048, 2048), 2048);
        assert_eq!(ceil_align_to(2049, 2048), 4096);
        assert_eq!(floor_align_to(2049, 2048), 2048);
        assert_eq!(ceil_align_to(1, 2048), 2048);
        assert_eq!(floor_align_to(2047, 2048), 0);
    }

    #[test]
    pub fn test_size_to_sectors() {
        assert_eq!(size_to_sectors(100, SizeUnit::MiB, 512), 204_800);
        assert_eq!(size_to_sectors(1, SizeUnit::KiB, 512), 2);
        assert_eq!(size_to_sectors(2, SizeUnit::GiB, 4096), 524_288);
        assert_eq!(size_to_sectors(u64::MAX, SizeUnit::GiB, 512), u64::MAX);
    }

    #[test]
    pub fn test_geometry_relations() {
        let outer = Geometry::new(2048, 8191);
        let inner = Geometry::new(4096, 6143);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.overlaps(&inner));
        assert_eq!(outer.intersect(&inner), Some(inner));

        let disjoint = Geometry::new(8192, 9000);
        assert!(!outer.overlaps(&disjoint));
        assert_eq!(outer.intersect(&disjoint), None);

        // Sharing a single boundary sector counts as an overlap.
        let touching = Geometry::new(8191, 9000);
        assert!(outer.overlaps(&touching));
        assert_eq!(outer.intersect(&touching), Some(Geometry::new(8191, 8191)));
        assert_eq!(Geometry::new(42, 42).length(), 1);
    }
}
