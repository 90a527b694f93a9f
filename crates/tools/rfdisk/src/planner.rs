//! Placement logic for new partitions.
//!
//! Turns the current table state into the set of legal partition types, the
//! free region to carve from, and the concrete sector range, enforcing the
//! MBR placement rules along the way. Prompting lives in the session; this
//! module is pure.

use rfdisk_common::device::Device;
use rfdisk_common::disk::table::{Disk, PartitionType, MAX_PRIMARY};
use rfdisk_common::disk::{
    ceil_align_to, floor_align_to, size_to_sectors, Geometry, SizeUnit,
};
use thiserror::Error;

/// Find the largest free region worth offering to the operator.
///
/// Regions no longer than the optimal alignment grain are alignment slack
/// and are skipped.
pub fn largest_free_region(disk: &Disk, device: &Device) -> Option<Geometry> {
    let mut largest: Option<Geometry> = None;
    for region in disk.free_regions() {
        if region.length() <= device.opt_grain {
            continue;
        }
        if largest.map(|r| region.length() > r.length()).unwrap_or(true) {
            largest = Some(region);
        }
    }
    largest
}

/// The partition types currently legal on a table, with a suggested default.
#[derive(Debug, Clone, Copy)]
pub struct TypeMenu {
    /// Number of primary (non-extended) partitions.
    pub primary_count: usize,
    /// Whether an extended partition exists.
    pub has_extended: bool,
    /// Number of unused primary/extended slots.
    pub spare_slots: usize,
    /// Number the next logical partition would get at least.
    pub first_logical: u32,
    pub allow_primary: bool,
    pub allow_extended: bool,
    pub allow_logical: bool,
    /// Pre-filled suggestion; advisory, never enforced.
    pub default: Option<PartitionType>,
}

impl TypeMenu {
    pub fn survey(disk: &Disk) -> Self {
        let primary_count = disk.primary_count();
        let has_extended = disk.extended_partition().is_some();
        let spare_slots = MAX_PRIMARY - primary_count - usize::from(has_extended);
        let allow_primary = spare_slots > 0;
        let allow_extended = spare_slots > 0 && !has_extended;
        let allow_logical = has_extended;
        // Suggest logical inside an existing container; otherwise steer the
        // operator toward an extended partition when only one slot is left,
        // so more than four partitions stay possible.
        let default = if allow_logical {
            Some(PartitionType::Logical)
        } else if allow_extended && spare_slots == 1 {
            Some(PartitionType::Extended)
        } else if allow_primary {
            Some(PartitionType::Primary)
        } else {
            None
        };
        Self {
            primary_count,
            has_extended,
            spare_slots,
            first_logical: MAX_PRIMARY as u32 + 1,
            allow_primary,
            allow_extended,
            allow_logical,
            default,
        }
    }

    pub fn is_eligible(&self, ty: PartitionType) -> bool {
        match ty {
            PartitionType::Primary => self.allow_primary,
            PartitionType::Extended => self.allow_extended,
            PartitionType::Logical => self.allow_logical,
        }
    }

    /// Whether any type can be created at all.
    pub fn any_eligible(&self) -> bool {
        self.allow_primary || self.allow_extended || self.allow_logical
    }
}

/// Narrow the free region according to the chosen partition type.
///
/// Primaries may not be carved from space claimed by the extended
/// container; logicals only exist within it. Returns [`None`] when nothing
/// of the region is usable for the chosen type.
pub fn resolve_region(disk: &Disk, ty: PartitionType, region: Geometry) -> Option<Geometry> {
    match ty {
        PartitionType::Primary => match disk.extended_partition() {
            Some(extended) if extended.geometry().overlaps(&region) => None,
            _ => Some(region),
        },
        PartitionType::Extended => Some(region),
        PartitionType::Logical => disk
            .extended_partition()
            .and_then(|extended| extended.geometry().intersect(&region)),
    }
}

/// Compute the alignment-adjusted default sector range within a region.
///
/// The start is aligned upward, the end downward, both to the optimal
/// grain. Returns [`None`] when alignment leaves no sectors in between.
pub fn aligned_bounds(region: Geometry, device: &Device) -> Option<(u64, u64)> {
    let start = ceil_align_to(region.start, device.opt_grain);
    let end = floor_align_to(region.end + 1, device.opt_grain).checked_sub(1)?;
    if start < region.start || start > end || end > region.end {
        return None;
    }
    Some((start, end))
}

/// Error indicating a malformed last-sector expression.
#[derive(Debug, Clone, Error)]
#[error("invalid last sector expression")]
pub struct InvalidSizeExpr;

/// Parse an fdisk-style last-sector expression.
///
/// `+<N>` gives a size in sectors, `+<N>K`/`+<N>M`/`+<N>G` a size in binary
/// units, both relative to `start`; anything else must be an absolute
/// sector number. Size expressions resolve to the last sector covered by
/// the requested size, so `+100M` at start 2048 with 512-byte sectors ends
/// at sector 206847.
pub fn parse_last_sector_expr(
    start: u64,
    value: &str,
    sector_size: u64,
) -> Result<u64, InvalidSizeExpr> {
    if let Some(rest) = value.strip_prefix('+') {
        let unit = match rest.as_bytes().last() {
            Some(b'K') => Some(SizeUnit::KiB),
            Some(b'M') => Some(SizeUnit::MiB),
            Some(b'G') => Some(SizeUnit::GiB),
            _ => None,
        };
        let digits = match unit {
            Some(_) => &rest[..rest.len() - 1],
            None => rest,
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidSizeExpr);
        }
        let count: u64 = digits.parse().map_err(|_| InvalidSizeExpr)?;
        let sectors = match unit {
            Some(unit) => size_to_sectors(count, unit, sector_size),
            None => count,
        };
        start
            .checked_add(sectors)
            .and_then(|end| end.checked_sub(1))
            .ok_or(InvalidSizeExpr)
    } else {
        value.parse().map_err(|_| InvalidSizeExpr)
    }
}

#[cfg(test)]
mod tests {
    use rfdisk_common::device::ChsGeometry;

    use super::*;

    fn device() -> Device {
        Device {
            path: "/dev/sda".to_owned(),
            sector_size: 512,
            physical_sector_size: 512,
            length: 2_048_000,
            chs: ChsGeometry::from_length(2_048_000),
            min_grain: 1,
            opt_grain: 2048,
        }
    }

    #[test]
    pub fn test_largest_free_region_skips_slack() {
        let device = device();
        let mut disk = Disk::new(device.length);
        disk.add_partition(PartitionType::Primary, Geometry::new(2048, 206_847))
            .unwrap();
        // The gap of sectors 1-2047 is alignment slack and is not offered.
        let region = largest_free_region(&disk, &device).unwrap();
        assert_eq!(region, Geometry::new(206_848, 2_047_999));

        disk.add_partition(PartitionType::Primary, Geometry::new(206_848, 2_047_999))
            .unwrap();
        assert_eq!(largest_free_region(&disk, &device), None);
    }

    #[test]
    pub fn test_type_menu_defaults() {
        let mut disk = Disk::new(2_048_000);
        let menu = TypeMenu::survey(&disk);
        assert!(menu.allow_primary && menu.allow_extended && !menu.allow_logical);
        assert_eq!(menu.default, Some(PartitionType::Primary));

        for i in 0..3 {
            let start = 2048 + i * 4096;
            disk.add_partition(PartitionType::Primary, Geometry::new(start, start + 4095))
                .unwrap();
        }
        // One spare slot and no extended partition: suggest extended.
        let menu = TypeMenu::survey(&disk);
        assert_eq!(menu.spare_slots, 1);
        assert_eq!(menu.default, Some(PartitionType::Extended));

        disk.add_partition(PartitionType::Extended, Geometry::new(1_000_000, 2_000_000))
            .unwrap();
        // A container exists: suggest logical even though no slots remain.
        let menu = TypeMenu::survey(&disk);
        assert!(!menu.allow_primary && !menu.allow_extended && menu.allow_logical);
        assert_eq!(menu.default, Some(PartitionType::Logical));

        for _ in 0..4 {
            let last = disk.last_partition_number();
            disk.delete_partition(last).unwrap();
        }
        disk.add_partition(PartitionType::Extended, Geometry::new(2048, 1_000_000))
            .unwrap();
        // Extended plus spare slots: logical is still the suggestion.
        let menu = TypeMenu::survey(&disk);
        assert!(menu.allow_primary && menu.allow_logical && !menu.allow_extended);
        assert_eq!(menu.default, Some(PartitionType::Logical));
    }

    #[test]
    pub fn test_no_types_left() {
        let mut disk = Disk::new(2_048_000);
        for i in 0..4 {
            let start = 2048 + i * 4096;
            disk.add_partition(PartitionType::Primary, Geometry::new(start, start + 4095))
                .unwrap();
        }
        let menu = TypeMenu::survey(&disk);
        assert!(!menu.any_eligible());
        assert_eq!(menu.default, None);
    }

    #[test]
    pub fn test_resolve_region() {
        let mut disk = Disk::new(2_048_000);
        disk.add_partition(PartitionType::Extended, Geometry::new(206_848, 2_047_999))
            .unwrap();
        let inside = Geometry::new(206_849, 2_047_999);
        // Primaries may not intrude into the container.
        assert_eq!(resolve_region(&disk, PartitionType::Primary, inside), None);
        assert_eq!(
            resolve_region(&disk, PartitionType::Logical, inside),
            Some(inside)
        );

        let outside = Geometry::new(2048, 206_847);
        assert_eq!(
            resolve_region(&disk, PartitionType::Primary, outside),
            Some(outside)
        );
        assert_eq!(resolve_region(&disk, PartitionType::Logical, outside), None);
    }

    #[test]
    pub fn test_aligned_bounds() {
        let device = device();
        assert_eq!(
            aligned_bounds(Geometry::new(1, 2_047_999), &device),
            Some((2048, 2_047_999))
        );
        assert_eq!(
            aligned_bounds(Geometry::new(206_849, 1_000_000), &device),
            Some((208_896, 999_423))
        );
        // Too narrow to contain an aligned range.
        assert_eq!(aligned_bounds(Geometry::new(2049, 4095), &device), None);
        assert_eq!(aligned_bounds(Geometry::new(1, 2047), &device), None);
    }

    #[test]
    pub fn test_parse_last_sector_expr() {
        // Absolute sector number.
        assert_eq!(parse_last_sector_expr(2048, "409599", 512).unwrap(), 409_599);
        // Relative sectors.
        assert_eq!(parse_last_sector_expr(2048, "+2048", 512).unwrap(), 4095);
        // Binary units.
        assert_eq!(
            parse_last_sector_expr(2048, "+100M", 512).unwrap(),
            2048 + size_to_sectors(100, SizeUnit::MiB, 512) - 1
        );
        assert_eq!(parse_last_sector_expr(2048, "+1K", 512).unwrap(), 2049);
        assert_eq!(
            parse_last_sector_expr(2048, "+1G", 512).unwrap(),
            2048 + 2_097_152 - 1
        );

        assert!(parse_last_sector_expr(2048, "+", 512).is_err());
        assert!(parse_last_sector_expr(2048, "+12T", 512).is_err());
        assert!(parse_last_sector_expr(2048, "+M", 512).is_err());
        assert!(parse_last_sector_expr(2048, "12.5", 512).is_err());
        assert!(parse_last_sector_expr(2048, "sector", 512).is_err());
        assert!(parse_last_sector_expr(u64::MAX, "+2", 512).is_err());
    }
}
