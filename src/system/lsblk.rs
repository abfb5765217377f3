// file: src/system/lsblk.rs
// version: 1.2.0
// guid: 6e93b0c7-48d1-4f2a-85e6-d10c4a79f3b8

//! Parsing of `lsblk` and `df` tabular output into transient records.
//!
//! Nothing here persists: the records reflect the OS state at query time
//! and are discarded after the prompt that consumes them.

use std::sync::OnceLock;

use regex::Regex;

use crate::exec::{capture, Cmd, CommandRunner};
use crate::{DvmError, Result};

/// A whole-disk block device eligible for formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInfo {
    pub name: String,
    pub size: String,
}

impl DiskInfo {
    pub fn path(&self) -> String {
        format!("/dev/{}", self.name)
    }

    pub fn label(&self) -> String {
        format!("/dev/{} ({})", self.name, self.size)
    }
}

/// One row of `lsblk -d -n -o NAME,SIZE,TYPE,MOUNTPOINT`.
#[derive(Debug, Clone)]
struct DiskRow {
    name: String,
    size: String,
    device_type: String,
    mounted: bool,
}

fn parse_disk_rows(output: &str) -> Vec<DiskRow> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return None;
            }
            Some(DiskRow {
                name: parts[0].to_string(),
                size: parts[1].to_string(),
                device_type: parts[2].to_string(),
                // A fourth column means lsblk printed a mountpoint.
                mounted: parts.len() > 3,
            })
        })
        .collect()
}

/// True when any line of a `lsblk <dev> -n -o MOUNTPOINT` listing is
/// non-empty, i.e. the device or one of its partitions is mounted.
fn any_mountpoint(output: &str) -> bool {
    output.lines().any(|line| !line.trim().is_empty())
}

/// List disks that are safe to format: type "disk" with no mountpoint on
/// the device itself or any of its children.
pub async fn unmounted_disks(runner: &dyn CommandRunner) -> Result<Vec<DiskInfo>> {
    let listing = capture(
        runner,
        Cmd::new("lsblk").args(["-d", "-n", "-o", "NAME,SIZE,TYPE,MOUNTPOINT"]),
    )
    .await?;

    let mut disks = Vec::new();
    for row in parse_disk_rows(&listing) {
        if row.device_type != "disk" || row.mounted {
            continue;
        }
        let children = capture(
            runner,
            Cmd::new("lsblk")
                .arg(format!("/dev/{}", row.name))
                .args(["-n", "-o", "MOUNTPOINT"]),
        )
        .await?;
        if any_mountpoint(&children) {
            continue;
        }
        disks.push(DiskInfo {
            name: row.name,
            size: row.size,
        });
    }
    Ok(disks)
}

/// A partition as reported by `lsblk -P`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub name: String,
    pub parent: String,
    pub fstype: Option<String>,
    pub mountpoint: Option<String>,
    pub size: String,
}

impl PartitionInfo {
    pub fn path(&self) -> String {
        format!("/dev/{}", self.name)
    }

    pub fn parent_path(&self) -> String {
        format!("/dev/{}", self.parent)
    }

    /// Partition number derived from the device name, e.g. sda3 -> 3,
    /// nvme0n1p2 -> 2.
    pub fn number(&self) -> Option<u32> {
        let suffix = self.name.strip_prefix(&self.parent)?;
        suffix.trim_start_matches('p').parse().ok()
    }
}

fn keyvalue_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("static regex"))
}

/// Parse one `lsblk -P` line of KEY="value" pairs.
fn parse_keyvalue_line(line: &str) -> Vec<(String, String)> {
    keyvalue_regex()
        .captures_iter(line)
        .map(|cap| (cap[1].to_string(), cap[2].to_string()))
        .collect()
}

/// Parse `lsblk -P -n -o NAME,PKNAME,TYPE,FSTYPE,MOUNTPOINT,SIZE` output
/// into partition records. Non-partition rows (disks, loops) are dropped.
pub fn parse_partitions(output: &str) -> Vec<PartitionInfo> {
    let mut partitions = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut name = None;
        let mut pkname = None;
        let mut device_type = None;
        let mut fstype = None;
        let mut mountpoint = None;
        let mut size = String::new();
        for (key, value) in parse_keyvalue_line(line) {
            match key.as_str() {
                "NAME" => name = Some(value),
                "PKNAME" => pkname = Some(value),
                "TYPE" => device_type = Some(value),
                "FSTYPE" => fstype = (!value.is_empty()).then_some(value),
                "MOUNTPOINT" => mountpoint = (!value.is_empty()).then_some(value),
                "SIZE" => size = value,
                _ => {}
            }
        }
        if device_type.as_deref() != Some("part") {
            continue;
        }
        let (Some(name), Some(parent)) = (name, pkname) else {
            continue;
        };
        if parent.is_empty() {
            continue;
        }
        partitions.push(PartitionInfo {
            name,
            parent,
            fstype,
            mountpoint,
            size,
        });
    }
    partitions
}

/// List all partitions on the host.
pub async fn partitions(runner: &dyn CommandRunner) -> Result<Vec<PartitionInfo>> {
    let output = capture(
        runner,
        Cmd::new("lsblk").args(["-P", "-n", "-o", "NAME,PKNAME,TYPE,FSTYPE,MOUNTPOINT,SIZE"]),
    )
    .await?;
    Ok(parse_partitions(&output))
}

/// One row of `df -h`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub filesystem: String,
    pub size: String,
    pub used: String,
    pub available: String,
    pub use_percent: String,
    pub mountpoint: String,
}

/// Parse `df -h` output, skipping the header and pseudo filesystems.
pub fn parse_usage(output: &str) -> Vec<UsageRecord> {
    const PSEUDO: [&str; 6] = ["tmpfs", "devtmpfs", "udev", "overlay", "squashfs", "efivarfs"];

    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }
            let filesystem = fields[0].to_string();
            if PSEUDO.contains(&filesystem.as_str()) {
                return None;
            }
            Some(UsageRecord {
                filesystem,
                size: fields[1].to_string(),
                used: fields[2].to_string(),
                available: fields[3].to_string(),
                use_percent: fields[4].to_string(),
                mountpoint: fields[5..].join(" "),
            })
        })
        .collect()
}

/// Query `df -h` for all mounted filesystems.
pub async fn usage(runner: &dyn CommandRunner) -> Result<Vec<UsageRecord>> {
    let output = capture(runner, Cmd::new("df").arg("-h")).await?;
    Ok(parse_usage(&output))
}

/// Look up the filesystem UUID of a device via blkid.
pub async fn filesystem_uuid(runner: &dyn CommandRunner, device: &str) -> Result<String> {
    let output = capture(
        runner,
        Cmd::new("blkid")
            .args(["-s", "UUID", "-o", "value"])
            .arg(device)
            .sudo(),
    )
    .await?;
    let uuid = output.trim().to_string();
    if uuid.is_empty() {
        return Err(DvmError::not_found(format!("no UUID for {}", device)));
    }
    Ok(uuid)
}
