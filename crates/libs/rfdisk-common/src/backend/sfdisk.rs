//! Disk backend driving `sfdisk` from util-linux.
//!
//! `sfdisk` works on block devices and on plain image files alike, so the
//! backend accepts both. Alignment properties come from the kernel's `queue`
//! attributes where available.

use std::fmt::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use serde::Deserialize;
use tracing::debug;
use xscript::{read_str, run, Run};

use super::blkdev::{is_block_device, BlockDevice};
use super::{DiskBackend, LoadError};
use crate::device::{ChsGeometry, Device};
use crate::disk::table::{Disk, Partition, PartitionFlag, PartitionType};
use crate::disk::{mbr, Geometry};
use crate::Anyhow;

/// Path to the `sfdisk` executable.
const SFDISK: &str = "/usr/sbin/sfdisk";
/// Path to the `partprobe` executable.
const PARTPROBE: &str = "/usr/sbin/partprobe";

/// Fallback optimal I/O size when the kernel reports none.
const DEFAULT_OPTIMAL_IO_SIZE: u64 = 1 << 20;

/// Backend reading and writing partition tables via `sfdisk`.
#[derive(Debug, Clone, Copy)]
pub struct SfdiskBackend;

impl DiskBackend for SfdiskBackend {
    fn probe(&self, path: &Path) -> Anyhow<Device> {
        if is_block_device(path)? {
            let blkdev = BlockDevice::new(path)?;
            let size = blkdev.size()?;
            let sector_size = blkdev.queue_attr("logical_block_size")?.unwrap_or(512);
            let physical_sector_size = blkdev
                .queue_attr("physical_block_size")?
                .unwrap_or(sector_size);
            let minimum_io_size = blkdev.queue_attr("minimum_io_size")?.unwrap_or(0);
            let optimal_io_size = blkdev.queue_attr("optimal_io_size")?.unwrap_or(0);
            Ok(build_device(
                blkdev.path().to_owned(),
                size,
                sector_size,
                physical_sector_size,
                minimum_io_size,
                optimal_io_size,
            ))
        } else {
            let metadata = path
                .metadata()
                .map_err(|error| anyhow!("unable to access {path:?}: {error}"))?;
            if !metadata.is_file() {
                bail!("{path:?} is neither a block device nor an image file");
            }
            let Some(path) = path.to_str() else {
                bail!("device path must be valid UTF-8");
            };
            Ok(build_device(path.to_owned(), metadata.len(), 512, 512, 0, 0))
        }
    }

    fn load(&self, device: &Device) -> Result<Disk, LoadError> {
        let output = match read_str!([SFDISK, "--dump", "--json", device.path.as_str()]) {
            Ok(output) => output,
            Err(error) => {
                // The device itself was readable during probing, so a failed
                // dump means there is no recognized label on it.
                debug!("sfdisk dump failed: {error}");
                return Err(LoadError::NoTable);
            }
        };
        let table = serde_json::from_str::<SfdiskJson>(&output)
            .map_err(|error| LoadError::Backend(error.into()))?
            .partition_table;
        if table.label != "dos" {
            return Err(LoadError::ForeignTable { label: table.label });
        }
        let partitions = table
            .partitions
            .into_iter()
            .filter(|partition| partition.size > 0)
            .map(load_partition)
            .collect::<Anyhow<Vec<_>>>()?;
        Ok(Disk::from_loaded(device.length, Some(table.id), partitions))
    }

    fn commit(&self, device: &Device, disk: &Disk) -> Anyhow<()> {
        let mut script = String::new();
        script.push_str("label: dos\n");
        if let Some(label_id) = disk.label_id() {
            writeln!(&mut script, "label-id: {label_id}").unwrap();
        }
        for partition in disk.partitions() {
            let geometry = partition.geometry();
            write!(
                &mut script,
                "{}: start={},size={},type={:02x}",
                partition.number(),
                geometry.start,
                geometry.length(),
                partition.system_id(),
            )
            .unwrap();
            if partition.is_flag_set(PartitionFlag::Boot) {
                script.push_str(",bootable");
            }
            script.push('\n');
        }
        debug!("writing sfdisk script:\n{script}");
        run!([SFDISK, "--no-reread", device.path.as_str()].with_stdin(script))?;
        if is_block_device(device.path.as_str())? {
            run!([PARTPROBE, device.path.as_str()])?;
        }
        Ok(())
    }
}

fn build_device(
    path: String,
    size: u64,
    sector_size: u64,
    physical_sector_size: u64,
    minimum_io_size: u64,
    optimal_io_size: u64,
) -> Device {
    let length = size / sector_size;
    let min_grain = (minimum_io_size.max(physical_sector_size) / sector_size).max(1);
    let optimal_io_size = if optimal_io_size > 0 {
        optimal_io_size
    } else {
        DEFAULT_OPTIMAL_IO_SIZE
    };
    Device {
        path,
        sector_size,
        physical_sector_size,
        length,
        chs: ChsGeometry::from_length(length),
        min_grain,
        opt_grain: optimal_io_size / sector_size,
    }
}

fn load_partition(partition: SfdiskJsonPartition) -> Anyhow<Partition> {
    let number = partition
        .node
        .rsplit_once(|c: char| !c.is_ascii_digit())
        .and_then(|(_, suffix)| u32::from_str(suffix).ok())
        .ok_or_else(|| {
            anyhow!(
                "invalid partition name {:?} returned from `sfdisk`",
                partition.node
            )
        })?;
    let id = partition.ty.strip_prefix("0x").unwrap_or(&partition.ty);
    let id = u8::from_str_radix(id, 16).map_err(|_| {
        anyhow!(
            "invalid partition type {:?} returned from `sfdisk`",
            partition.ty
        )
    })?;
    let ty = if mbr::is_extended(id) {
        PartitionType::Extended
    } else if number > 4 {
        PartitionType::Logical
    } else {
        PartitionType::Primary
    };
    Ok(Partition::from_loaded(
        number,
        ty,
        Geometry::new(partition.start, partition.start + partition.size - 1),
        id,
        partition.bootable,
        None,
    ))
}

#[derive(Debug, Clone, Deserialize)]
struct SfdiskJson {
    #[serde(rename = "partitiontable")]
    partition_table: SfdiskJsonTable,
}

#[derive(Debug, Clone, Deserialize)]
struct SfdiskJsonTable {
    label: String,
    id: String,
    #[serde(rename = "sectorsize")]
    #[allow(dead_code)]
    sector_size: u64,
    // This field is missing if there are no partitions.
    #[serde(default)]
    partitions: Vec<SfdiskJsonPartition>,
}

#[derive(Debug, Clone, Deserialize)]
struct SfdiskJsonPartition {
    node: String,
    start: u64,
    size: u64,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    bootable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_parse_sfdisk_dump() {
        let dump = r#"{
            "partitiontable": {
                "label": "dos",
                "id": "0xd2ac66b1",
                "device": "/dev/sda",
                "unit": "sectors",
                "sectorsize": 512,
                "partitions": [
                    {"node": "/dev/sda1", "start": 2048, "size": 204800, "type": "83", "bootable": true},
                    {"node": "/dev/sda2", "start": 206848, "size": 1841152, "type": "05"},
                    {"node": "/dev/sda5", "start": 208896, "size": 204800, "type": "82"}
                ]
            }
        }"#;
        let table = serde_json::from_str::<SfdiskJson>(dump)
            .unwrap()
            .partition_table;
        assert_eq!(table.label, "dos");
        assert_eq!(table.id, "0xd2ac66b1");
        assert_eq!(table.partitions.len(), 3);

        let partitions = table
            .partitions
            .into_iter()
            .map(load_partition)
            .collect::<Anyhow<Vec<_>>>()
            .unwrap();
        assert_eq!(partitions[0].number(), 1);
        assert_eq!(partitions[0].ty(), PartitionType::Primary);
        assert!(partitions[0].is_flag_set(PartitionFlag::Boot));
        assert_eq!(partitions[0].geometry(), Geometry::new(2048, 206_847));
        assert_eq!(partitions[1].ty(), PartitionType::Extended);
        assert_eq!(partitions[2].ty(), PartitionType::Logical);
        assert!(partitions[2].is_flag_set(PartitionFlag::Swap));
        assert_eq!(partitions[2].system_id(), mbr::LINUX_SWAP);
    }

    #[test]
    pub fn test_device_grain_defaults() {
        let device = build_device("/dev/sda".to_owned(), 1_048_576_000, 512, 512, 0, 0);
        assert_eq!(device.length, 2_048_000);
        assert_eq!(device.min_grain, 1);
        assert_eq!(device.opt_grain, 2048);

        let device = build_device("/dev/sdb".to_owned(), 1_048_576_000, 512, 4096, 4096, 4096);
        assert_eq!(device.min_grain, 8);
        assert_eq!(device.opt_grain, 8);
    }
}
