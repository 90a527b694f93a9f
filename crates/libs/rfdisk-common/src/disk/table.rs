//! In-memory model of an MBR partition table.
//!
//! The model enforces the structural invariants of the msdos label on every
//! insertion: at most four primary/extended slots, at most one extended
//! partition, logical partitions strictly inside the extended one, and no
//! overlapping geometries. A [`Disk`] is purely in-memory; nothing touches
//! the device until a backend commits it.

use std::collections::BTreeSet;

use thiserror::Error;

use super::{mbr, Geometry};

/// Maximum number of primary/extended entries of an MBR table.
pub const MAX_PRIMARY: usize = 4;

/// Type of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionType {
    /// Top-level partition occupying one of the four MBR slots.
    Primary,
    /// Container partition for logical partitions.
    Extended,
    /// Partition inside the extended partition.
    Logical,
}

/// Flag of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionFlag {
    Boot,
    Swap,
    Raid,
    Lvm,
}

/// Partition of a disk.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Number of the partition (1-based, assigned by the model).
    number: u32,
    /// Type of the partition.
    ty: PartitionType,
    /// Sector range of the partition.
    geometry: Geometry,
    /// MBR partition type id.
    system_id: u8,
    /// Active flags of the partition.
    flags: BTreeSet<PartitionFlag>,
    /// Filesystem reported for the partition, if known.
    fs: Option<String>,
}

impl Partition {
    fn new(number: u32, ty: PartitionType, geometry: Geometry) -> Self {
        let system_id = match ty {
            PartitionType::Extended => mbr::EXTENDED,
            _ => mbr::LINUX,
        };
        Self {
            number,
            ty,
            geometry,
            system_id,
            flags: BTreeSet::new(),
            fs: None,
        }
    }

    /// Reconstruct a partition read from an existing on-disk table.
    pub fn from_loaded(
        number: u32,
        ty: PartitionType,
        geometry: Geometry,
        system_id: u8,
        bootable: bool,
        fs: Option<String>,
    ) -> Self {
        let mut flags = BTreeSet::new();
        if bootable {
            flags.insert(PartitionFlag::Boot);
        }
        if let Some(flag) = mbr::flag_for_id(system_id) {
            flags.insert(flag);
        }
        Self {
            number,
            ty,
            geometry,
            system_id,
            flags,
            fs,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn ty(&self) -> PartitionType {
        self.ty
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// The MBR type id written to the table on commit.
    pub fn system_id(&self) -> u8 {
        self.system_id
    }

    /// The filesystem reported for the partition, if known.
    pub fn fs(&self) -> Option<&str> {
        self.fs.as_deref()
    }

    pub fn is_flag_set(&self, flag: PartitionFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Set a flag.
    ///
    /// The Swap, Raid, and LVM flags are id-backed on msdos labels, so
    /// setting one of them rewrites the type id.
    pub fn set_flag(&mut self, flag: PartitionFlag) {
        self.flags.insert(flag);
        if let Some(id) = mbr::id_for_flag(flag) {
            self.system_id = id;
        }
    }

    /// Clear a flag, resetting an id-backed flag's type id to Linux.
    pub fn clear_flag(&mut self, flag: PartitionFlag) {
        self.flags.remove(&flag);
        if mbr::id_for_flag(flag) == Some(self.system_id) {
            self.system_id = mbr::LINUX;
        }
    }

    /// Toggle a flag, returning the new state.
    pub fn toggle_flag(&mut self, flag: PartitionFlag) -> bool {
        if self.is_flag_set(flag) {
            self.clear_flag(flag);
            false
        } else {
            self.set_flag(flag);
            true
        }
    }
}

/// Error violating the structure of an MBR partition table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("all four primary partition slots are already in use")]
    SlotsExhausted,
    #[error("an extended partition already exists")]
    DuplicateExtended,
    #[error("logical partitions require an extended partition")]
    NoExtended,
    #[error("partition does not fit inside the extended partition")]
    OutsideExtended,
    #[error("partition overlaps existing partition {number}")]
    Overlap { number: u32 },
    #[error("partition end lies before its start")]
    InvalidGeometry,
    #[error("partition lies outside of the usable device area")]
    OutOfBounds,
    #[error("cannot delete an extended partition containing logical partitions")]
    ExtendedInUse,
}

/// In-memory msdos partition table of one device.
#[derive(Debug, Clone)]
pub struct Disk {
    /// Total number of sectors of the device.
    length: u64,
    /// MBR disk id as reported by the backend, preserved across commits.
    label_id: Option<String>,
    /// Partitions in disk order.
    partitions: Vec<Partition>,
}

impl Disk {
    /// Create an empty msdos table for a device of the given length.
    pub fn new(length: u64) -> Self {
        Self {
            length,
            label_id: None,
            partitions: Vec::new(),
        }
    }

    /// Reconstruct a table read from disk.
    ///
    /// The on-disk table is trusted as-is; invariants are only enforced for
    /// partitions created through [`Disk::add_partition`].
    pub fn from_loaded(length: u64, label_id: Option<String>, mut partitions: Vec<Partition>) -> Self {
        partitions.sort_by_key(|partition| partition.geometry.start);
        Self {
            length,
            label_id,
            partitions,
        }
    }

    /// Total number of sectors of the device.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// The last usable sector. Sector zero holds the MBR itself.
    pub fn last_sector(&self) -> u64 {
        self.length - 1
    }

    pub fn label_id(&self) -> Option<&str> {
        self.label_id.as_deref()
    }

    /// Partitions in disk order (by start sector, not by number).
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn find_partition(&self, number: u32) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.number == number)
    }

    pub fn find_partition_mut(&mut self, number: u32) -> Option<&mut Partition> {
        self.partitions.iter_mut().find(|p| p.number == number)
    }

    /// Number of primary (non-extended) partitions.
    pub fn primary_count(&self) -> usize {
        self.partitions
            .iter()
            .filter(|p| p.ty == PartitionType::Primary)
            .count()
    }

    pub fn extended_partition(&self) -> Option<&Partition> {
        self.partitions
            .iter()
            .find(|p| p.ty == PartitionType::Extended)
    }

    pub fn logical_partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions
            .iter()
            .filter(|p| p.ty == PartitionType::Logical)
    }

    /// The highest partition number in use, or zero on an empty table.
    pub fn last_partition_number(&self) -> u32 {
        self.partitions.iter().map(|p| p.number).max().unwrap_or(0)
    }

    /// Validate the candidate against the table invariants, insert it, and
    /// return the assigned partition number.
    pub fn add_partition(
        &mut self,
        ty: PartitionType,
        geometry: Geometry,
    ) -> Result<u32, TableError> {
        if geometry.end < geometry.start {
            return Err(TableError::InvalidGeometry);
        }
        if geometry.start < 1 || geometry.end > self.last_sector() {
            return Err(TableError::OutOfBounds);
        }
        match ty {
            PartitionType::Primary | PartitionType::Extended => {
                let slots = self.primary_count()
                    + usize::from(self.extended_partition().is_some());
                if slots >= MAX_PRIMARY {
                    return Err(TableError::SlotsExhausted);
                }
                if ty == PartitionType::Extended && self.extended_partition().is_some() {
                    return Err(TableError::DuplicateExtended);
                }
                // A primary overlapping a logical necessarily overlaps the
                // extended container, so checking top-level entries suffices.
                for other in self.partitions.iter().filter(|p| p.ty != PartitionType::Logical) {
                    if other.geometry.overlaps(&geometry) {
                        return Err(TableError::Overlap {
                            number: other.number,
                        });
                    }
                }
            }
            PartitionType::Logical => {
                let Some(extended) = self.extended_partition() else {
                    return Err(TableError::NoExtended);
                };
                // The first sector of the extended partition holds the EBR.
                if !extended.geometry.contains(&geometry)
                    || geometry.start == extended.geometry.start
                {
                    return Err(TableError::OutsideExtended);
                }
                for other in self.logical_partitions() {
                    if other.geometry.overlaps(&geometry) {
                        return Err(TableError::Overlap {
                            number: other.number,
                        });
                    }
                }
            }
        }
        let number = self.next_number(ty);
        let partition = Partition::new(number, ty, geometry);
        let position = self
            .partitions
            .iter()
            .position(|p| p.geometry.start > geometry.start)
            .unwrap_or(self.partitions.len());
        self.partitions.insert(position, partition);
        Ok(number)
    }

    /// Remove the partition with the given number.
    ///
    /// Returns whether a partition was removed; removing an absent number is
    /// a no-op. An extended partition can only be removed once all of its
    /// logical partitions are gone.
    pub fn delete_partition(&mut self, number: u32) -> Result<bool, TableError> {
        let Some(position) = self.partitions.iter().position(|p| p.number == number) else {
            return Ok(false);
        };
        if self.partitions[position].ty == PartitionType::Extended
            && self.logical_partitions().next().is_some()
        {
            return Err(TableError::ExtendedInUse);
        }
        self.partitions.remove(position);
        Ok(true)
    }

    /// The free regions of the disk, in disk order.
    ///
    /// Top-level gaps are the sectors of `[1, last]` covered by no primary
    /// or extended partition. The area inside the extended partition counts
    /// as free where no logical partition covers it, except for the
    /// extended partition's first sector, which is reserved for the EBR.
    pub fn free_regions(&self) -> Vec<Geometry> {
        let mut regions = Vec::new();
        let mut cursor = 1;
        for partition in self
            .partitions
            .iter()
            .filter(|p| p.ty != PartitionType::Logical)
        {
            if partition.geometry.start > cursor {
                regions.push(Geometry::new(cursor, partition.geometry.start - 1));
            }
            cursor = cursor.max(partition.geometry.end + 1);
        }
        if cursor <= self.last_sector() {
            regions.push(Geometry::new(cursor, self.last_sector()));
        }
        if let Some(extended) = self.extended_partition() {
            let extended = extended.geometry;
            let mut cursor = extended.start + 1;
            for partition in self.logical_partitions() {
                if partition.geometry.start > cursor {
                    regions.push(Geometry::new(cursor, partition.geometry.start - 1));
                }
                cursor = cursor.max(partition.geometry.end + 1);
            }
            if cursor <= extended.end {
                regions.push(Geometry::new(cursor, extended.end));
            }
        }
        regions.sort_by_key(|region| region.start);
        regions
    }

    fn next_number(&self, ty: PartitionType) -> u32 {
        match ty {
            PartitionType::Primary | PartitionType::Extended => {
                let used = self
                    .partitions
                    .iter()
                    .filter(|p| p.ty != PartitionType::Logical)
                    .map(|p| p.number)
                    .collect::<BTreeSet<_>>();
                // The slot check guarantees a free number in 1..=4.
                (1..=MAX_PRIMARY as u32)
                    .find(|number| !used.contains(number))
                    .expect("a primary slot must be free")
            }
            PartitionType::Logical => {
                self.logical_partitions()
                    .map(|p| p.number)
                    .max()
                    .unwrap_or(MAX_PRIMARY as u32)
                    + 1
            }
        }
    }
}
