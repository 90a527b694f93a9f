//! Rendering of the device summary and the partition table.

use rfdisk_common::device::Device;
use rfdisk_common::disk::mbr;
use rfdisk_common::disk::table::{Disk, Partition, PartitionFlag};

/// Print the device summary followed by the partition table.
pub fn print_disk(device: &Device, disk: &Disk) {
    let size = device.size_bytes();
    println!();
    println!("Disk {}: {} MB, {} bytes", device.path, size / 1_000_000, size);
    println!(
        "{} heads, {} sectors/track, {} cylinders, total {} sectors",
        device.chs.heads, device.chs.sectors, device.chs.cylinders, device.length
    );
    println!(
        "Units = 1 * sectors of {} = {} bytes",
        device.sector_size, device.sector_size
    );
    println!(
        "Sector size (logical/physical): {} bytes / {} bytes",
        device.sector_size, device.physical_sector_size
    );
    println!(
        "I/O size (minimum/optimal): {} bytes / {} bytes",
        device.min_grain * device.sector_size,
        device.opt_grain * device.sector_size
    );
    println!();

    // Size the first column to the partition paths, or to the caption when
    // the table is empty.
    let width = if disk.is_empty() {
        "Device".len() + 1
    } else {
        device.partition_path(1).len()
    };
    println!(
        "{:>width$} Boot      Start         End      Blocks   Id  System",
        "Device"
    );
    for partition in disk.partitions() {
        let geometry = partition.geometry();
        let boot = if partition.is_flag_set(PartitionFlag::Boot) {
            "*"
        } else {
            ""
        };
        // Assume default 1K-blocks.
        let blocks = geometry.length() * device.sector_size / 1024;
        println!(
            "{}{:>4}{:>12}{:>12}{:>12}{:>5}  {}",
            device.partition_path(partition.number()),
            boot,
            geometry.start,
            geometry.end,
            blocks,
            partition.number(),
            guess_system(partition),
        );
    }
}

/// Best-effort OS/filesystem label for the "System" column.
///
/// A probed filesystem wins; otherwise id-backed flags and finally the raw
/// MBR type id decide.
fn guess_system(partition: &Partition) -> &'static str {
    match partition.fs() {
        Some("ext2" | "ext3" | "ext4" | "btrfs" | "reiserfs" | "xfs" | "jfs") => "Linux",
        Some(fs) if fs.starts_with("linux-swap") => "Linux swap / Solaris",
        Some("fat32") => "W95 FAT32",
        Some("fat16") => "W95 FAT16",
        Some("ntfs") => "HPFS/NTFS/exFAT",
        Some(_) => "unknown",
        None => {
            if partition.is_flag_set(PartitionFlag::Swap) {
                "Linux swap / Solaris"
            } else if partition.is_flag_set(PartitionFlag::Raid) {
                "Linux raid autodetect"
            } else if partition.is_flag_set(PartitionFlag::Lvm) {
                "Linux LVM"
            } else {
                mbr::system_name(partition.system_id())
            }
        }
    }
}
