//! MBR partition type ids and their mapping to flags and system labels.

use crate::disk::table::PartitionFlag;

/// Extended partition with CHS addressing.
pub const EXTENDED_CHS: u8 = 0x05;
/// Extended partition with LBA addressing.
pub const EXTENDED_LBA: u8 = 0x0F;

pub const EXTENDED: u8 = EXTENDED_CHS;

/// Linux filesystem.
pub const LINUX: u8 = 0x83;
/// Linux swap.
pub const LINUX_SWAP: u8 = 0x82;
/// Linux RAID autodetect.
pub const LINUX_RAID: u8 = 0xfd;
/// Linux LVM physical volume.
pub const LINUX_LVM: u8 = 0x8e;

/// Check whether the type id denotes an extended partition.
pub const fn is_extended(id: u8) -> bool {
    matches!(id, EXTENDED_CHS | EXTENDED_LBA)
}

/// The fdisk-style "System" label for a partition type id.
pub fn system_name(id: u8) -> &'static str {
    match id {
        0x00 => "Empty",
        0x01 => "FAT12",
        0x04 => "FAT16 <32M",
        0x05 => "Extended",
        0x06 => "FAT16",
        0x07 => "HPFS/NTFS/exFAT",
        0x0B => "W95 FAT32",
        0x0C => "W95 FAT32 (LBA)",
        0x0E => "W95 FAT16 (LBA)",
        0x0F => "W95 Ext'd (LBA)",
        0x82 => "Linux swap / Solaris",
        0x83 => "Linux",
        0x85 => "Linux extended",
        0x8E => "Linux LVM",
        0xA5 => "FreeBSD",
        0xEE => "GPT",
        0xEF => "EFI (FAT-12/16/32)",
        0xFD => "Linux raid autodetect",
        _ => "unknown",
    }
}

/// The flag implied by a partition type id, if any.
///
/// On msdos labels, the Swap, Raid, and LVM flags are not stored separately;
/// they are just views of the type id.
pub const fn flag_for_id(id: u8) -> Option<PartitionFlag> {
    match id {
        LINUX_SWAP => Some(PartitionFlag::Swap),
        LINUX_RAID => Some(PartitionFlag::Raid),
        LINUX_LVM => Some(PartitionFlag::Lvm),
        _ => None,
    }
}

/// The partition type id a flag maps to, if the flag is id-backed.
pub const fn id_for_flag(flag: PartitionFlag) -> Option<u8> {
    match flag {
        PartitionFlag::Boot => None,
        PartitionFlag::Swap => Some(LINUX_SWAP),
        PartitionFlag::Raid => Some(LINUX_RAID),
        PartitionFlag::Lvm => Some(LINUX_LVM),
    }
}
