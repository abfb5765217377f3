// file: src/commands/disk.rs
// version: 1.4.0
// guid: 84b1f7d9-2e60-4c35-a8d4-f62709e1c5a3

//! Disk subcommands: mount, docker-storage relocation, backup cleanup,
//! partition expansion and usage reporting.

use std::path::Path;

use tracing::{debug, info};

use crate::ask;
use crate::config::Settings;
use crate::exec::{step, try_step, Cmd, CommandRunner};
use crate::system::{docker, files, fstab, lsblk};
use crate::ui::{self, Prompter};
use crate::{DvmError, Result};

/// Filesystems the mount and expand workflows know how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Ext4,
    Xfs,
    Btrfs,
}

impl FsKind {
    pub const ALL: [FsKind; 3] = [FsKind::Ext4, FsKind::Xfs, FsKind::Btrfs];

    pub fn as_str(&self) -> &'static str {
        match self {
            FsKind::Ext4 => "ext4",
            FsKind::Xfs => "xfs",
            FsKind::Btrfs => "btrfs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ext4" => Some(FsKind::Ext4),
            "xfs" => Some(FsKind::Xfs),
            "btrfs" => Some(FsKind::Btrfs),
            _ => None,
        }
    }

    fn mkfs_cmd(&self, device: &str) -> Cmd {
        match self {
            FsKind::Ext4 => Cmd::new("mkfs.ext4").arg("-F").arg(device).sudo(),
            FsKind::Xfs => Cmd::new("mkfs.xfs").arg("-f").arg(device).sudo(),
            FsKind::Btrfs => Cmd::new("mkfs.btrfs").arg("-f").arg(device).sudo(),
        }
    }

    /// Filesystem grow command after the partition was extended. ext4 can
    /// be resized via the device, xfs and btrfs need the mountpoint.
    fn grow_cmd(&self, partition: &lsblk::PartitionInfo) -> Result<Cmd> {
        match self {
            FsKind::Ext4 => Ok(Cmd::new("resize2fs").arg(partition.path()).sudo()),
            FsKind::Xfs => {
                let mountpoint = partition.mountpoint.as_deref().ok_or_else(|| {
                    DvmError::validation(format!("{} must be mounted to grow xfs", partition.path()))
                })?;
                Ok(Cmd::new("xfs_growfs").arg(mountpoint).sudo())
            }
            FsKind::Btrfs => {
                let mountpoint = partition.mountpoint.as_deref().ok_or_else(|| {
                    DvmError::validation(format!(
                        "{} must be mounted to grow btrfs",
                        partition.path()
                    ))
                })?;
                Ok(Cmd::new("btrfs")
                    .args(["filesystem", "resize", "max"])
                    .arg(mountpoint)
                    .sudo())
            }
        }
    }
}

/// Format a fresh vdisk and mount it permanently via fstab.
pub async fn mount(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
) -> Result<()> {
    ui::header("Format and mount a disk");

    let disks = lsblk::unmounted_disks(runner).await?;
    if disks.is_empty() {
        ui::warn("No unformatted/unmounted disks found.");
        return Ok(());
    }

    let labels: Vec<String> = disks.iter().map(lsblk::DiskInfo::label).collect();
    let index = ask!(prompter.select("Which disk should be formatted and mounted?", &labels));
    let device = disks[index].path();

    ui::warn(&format!(
        "WARNING: all data on {} will be irreversibly erased!",
        device
    ));
    if !ask!(prompter.confirm("Are you sure you want to format this disk?", false)) {
        ui::aborted();
        return Ok(());
    }

    let default_mountpoint = settings.volumes_dir.display().to_string();
    let mountpoint = ask!(prompter.input(
        "Where should the disk be mounted (e.g. /mnt/data)?",
        Some(&default_mountpoint)
    ));
    let mountpoint = shellexpand::tilde(&mountpoint).to_string();
    if !mountpoint.starts_with('/') {
        return Err(DvmError::validation(format!(
            "mountpoint must be an absolute path, got '{}'",
            mountpoint
        )));
    }

    let fs_labels: Vec<String> = FsKind::ALL.iter().map(|f| f.as_str().to_string()).collect();
    let fs = FsKind::ALL[ask!(prompter.select("Filesystem?", &fs_labels))];

    step(
        runner,
        fs.mkfs_cmd(&device),
        &format!("Formatting {} with {}", device, fs.as_str()),
    )
    .await?;

    let uuid = lsblk::filesystem_uuid(runner, &device).await?;
    debug!("new filesystem UUID {}", uuid);

    step(
        runner,
        Cmd::new("mkdir").arg("-p").arg(&mountpoint).sudo(),
        &format!("Creating mountpoint {}", mountpoint),
    )
    .await?;

    if fstab::ensure_entry(runner, &settings.fstab_path, &uuid, &mountpoint, fs.as_str()).await? {
        ui::success("fstab entry added");
    } else {
        ui::warn("Disk or mountpoint already present in fstab, leaving it alone.");
    }

    step(runner, Cmd::new("mount").arg("-a").sudo(), "Reloading fstab and mounting").await?;

    let user = std::env::var("USER").unwrap_or_else(|_| "root".to_string());
    try_step(
        runner,
        Cmd::new("chown")
            .arg("-R")
            .arg(format!("{}:{}", user, user))
            .arg(&mountpoint)
            .sudo(),
        &format!("Adjusting ownership of {}", mountpoint),
    )
    .await?;

    ui::success(&format!("Disk formatted and mounted at {}", mountpoint));
    Ok(())
}

/// Relocate Docker's data-root to a new directory.
///
/// stop services -> rsync -> rewrite daemon.json -> restart. A copy or
/// config failure restarts the services on the old configuration before
/// the command fails.
pub async fn docker_storage(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
) -> Result<()> {
    ui::header("Relocate Docker storage");

    let daemon_json = match std::fs::read_to_string(&settings.daemon_json_path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let old_root = docker::data_root(daemon_json.as_deref())?;
    ui::status(&format!("Current data-root: {}", old_root));

    let default_target = settings.volumes_dir.join("docker").display().to_string();
    let new_root = ask!(prompter.input("New data-root directory", Some(&default_target)));
    if !new_root.starts_with('/') {
        return Err(DvmError::validation(format!(
            "data-root must be an absolute path, got '{}'",
            new_root
        )));
    }
    if new_root == old_root {
        ui::warn("New data-root equals the current one, nothing to do.");
        return Ok(());
    }

    if !ask!(prompter.confirm(
        &format!("Copy {} to {} and switch Docker over?", old_root, new_root),
        false
    )) {
        ui::aborted();
        return Ok(());
    }

    try_step(
        runner,
        Cmd::new("systemctl").args(["stop", "docker.socket"]).sudo(),
        "Stopping docker.socket",
    )
    .await?;
    step(
        runner,
        Cmd::new("systemctl").args(["stop", "docker"]).sudo(),
        "Stopping docker",
    )
    .await?;
    step(
        runner,
        Cmd::new("systemctl").args(["stop", "containerd"]).sudo(),
        "Stopping containerd",
    )
    .await?;

    let switched = copy_and_switch(runner, settings, daemon_json.as_deref(), &old_root, &new_root).await;
    if let Err(e) = switched {
        ui::failure("Relocation failed, restarting Docker on the old configuration");
        let _ = try_step(
            runner,
            Cmd::new("systemctl").args(["start", "containerd"]).sudo(),
            "Restarting containerd",
        )
        .await;
        let _ = try_step(
            runner,
            Cmd::new("systemctl").args(["start", "docker"]).sudo(),
            "Restarting docker",
        )
        .await;
        return Err(e);
    }

    step(
        runner,
        Cmd::new("systemctl").args(["start", "containerd"]).sudo(),
        "Starting containerd",
    )
    .await?;
    step(
        runner,
        Cmd::new("systemctl").args(["start", "docker"]).sudo(),
        "Starting docker",
    )
    .await?;

    // Best-effort verification, the daemon may need a moment either way.
    if let Ok(output) = runner
        .run(&Cmd::new("docker").args(["info", "--format", "{{.DockerRootDir}}"]).sudo())
        .await
    {
        if output.success() && output.stdout.trim() == new_root {
            ui::success(&format!("Docker now uses {}", new_root));
        } else if output.success() {
            ui::warn(&format!(
                "Docker reports data-root {} (expected {})",
                output.stdout.trim(),
                new_root
            ));
        }
    }

    let backup = format!("{}.bak", old_root);
    if try_step(
        runner,
        Cmd::new("mv").arg(&old_root).arg(&backup).sudo(),
        &format!("Moving old data aside to {}", backup),
    )
    .await?
    {
        ui::status(&format!(
            "Old data kept at {}. Remove it later with 'dockervm disk docker-clean-backup'.",
            backup
        ));
    }

    ui::success("Docker storage relocation finished");
    Ok(())
}

/// The failure-sensitive middle of the relocation: copy the data and point
/// daemon.json at the new directory. Services are stopped around this.
async fn copy_and_switch(
    runner: &dyn CommandRunner,
    settings: &Settings,
    daemon_json: Option<&str>,
    old_root: &str,
    new_root: &str,
) -> Result<()> {
    step(
        runner,
        Cmd::new("mkdir").arg("-p").arg(new_root).sudo(),
        &format!("Creating {}", new_root),
    )
    .await?;

    step(
        runner,
        Cmd::new("rsync")
            .arg("-aHX")
            .arg(format!("{}/", old_root))
            .arg(format!("{}/", new_root))
            .sudo(),
        "Copying Docker data (this can take a while)",
    )
    .await?;

    let updated = docker::with_data_root(daemon_json, new_root)?;
    files::install_file(runner, &settings.daemon_json_path, &updated, "644").await?;
    info!("daemon.json now points at {}", new_root);
    Ok(())
}

/// Paths that must never be deleted by the backup cleanup, no matter what
/// the operator types.
const PROTECTED_PATHS: [&str; 12] = [
    "/", "/bin", "/boot", "/etc", "/home", "/mnt", "/opt", "/root", "/srv", "/usr", "/var",
    "/var/lib",
];

/// Deny-list check for the backup deletion target.
pub fn is_protected_path(path: &str) -> bool {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    trimmed.is_empty()
        || !trimmed.starts_with('/')
        || PROTECTED_PATHS.contains(&trimmed)
        || trimmed == docker::DEFAULT_DATA_ROOT
}

/// Delete the backup left behind by a storage relocation.
pub async fn clean_backup(runner: &dyn CommandRunner, prompter: &dyn Prompter) -> Result<()> {
    ui::header("Remove old Docker storage backup");

    let default_backup = format!("{}.bak", docker::DEFAULT_DATA_ROOT);
    let target = ask!(prompter.input("Backup directory to delete", Some(&default_backup)));

    // The deny-list fires before any further prompt.
    if is_protected_path(&target) {
        ui::failure(&format!("'{}' is protected and will not be deleted.", target));
        return Err(DvmError::unsafe_op(format!("{} is a protected path", target)));
    }
    if !Path::new(&target).is_dir() {
        return Err(DvmError::not_found(format!("{} is not a directory", target)));
    }

    if !ask!(prompter.confirm(
        &format!("Permanently delete {} and everything below it?", target),
        false
    )) {
        ui::aborted();
        return Ok(());
    }

    step(
        runner,
        Cmd::new("rm").args(["-rf", "--one-file-system"]).arg(&target).sudo(),
        &format!("Deleting {}", target),
    )
    .await?;
    ui::success("Backup removed");
    Ok(())
}

/// Grow a partition and its filesystem to fill the backing disk.
pub async fn expand(runner: &dyn CommandRunner, prompter: &dyn Prompter) -> Result<()> {
    ui::header("Expand a partition");

    let partitions: Vec<lsblk::PartitionInfo> = lsblk::partitions(runner)
        .await?
        .into_iter()
        .filter(|p| p.fstype.as_deref().and_then(FsKind::from_name).is_some())
        .collect();
    if partitions.is_empty() {
        ui::warn("No growable partitions (ext4/xfs/btrfs) found.");
        return Ok(());
    }

    let labels: Vec<String> = partitions
        .iter()
        .map(|p| {
            format!(
                "{} ({}, {}, {})",
                p.path(),
                p.size,
                p.fstype.as_deref().unwrap_or("?"),
                p.mountpoint.as_deref().unwrap_or("not mounted"),
            )
        })
        .collect();
    let index = ask!(prompter.select("Which partition should be expanded?", &labels));
    let partition = &partitions[index];
    let fs = partition
        .fstype
        .as_deref()
        .and_then(FsKind::from_name)
        .ok_or_else(|| DvmError::validation("selected partition has no growable filesystem"))?;
    let number = partition.number().ok_or_else(|| {
        DvmError::parse(format!(
            "cannot derive partition number of {}",
            partition.path()
        ))
    })?;

    ui::status(&format!(
        "Growing partition {} of {}",
        number,
        partition.parent_path()
    ));
    let grown = runner
        .run(
            &Cmd::new("growpart")
                .arg(partition.parent_path())
                .arg(number.to_string())
                .sudo(),
        )
        .await?;
    if !grown.success() {
        // growpart exits non-zero with NOCHANGE when the partition already
        // fills the disk; the filesystem may still lag behind.
        let combined = format!("{}{}", grown.stdout, grown.stderr);
        if combined.contains("NOCHANGE") {
            ui::warn("Partition already fills the disk (NOCHANGE).");
        } else {
            return Err(DvmError::execution(format!(
                "growpart failed: {}",
                combined.trim()
            )));
        }
    } else {
        ui::success("Partition grown");
    }

    step(
        runner,
        fs.grow_cmd(partition)?,
        &format!("Growing {} filesystem", fs.as_str()),
    )
    .await?;

    ui::success(&format!("{} expanded", partition.path()));
    Ok(())
}

/// Print a `df -h` style usage table.
pub async fn usage_report(runner: &dyn CommandRunner) -> Result<()> {
    let records = lsblk::usage(runner).await?;
    if records.is_empty() {
        ui::warn("No filesystems reported.");
        return Ok(());
    }

    let fs_width = records
        .iter()
        .map(|r| r.filesystem.len())
        .chain(["Filesystem".len()])
        .max()
        .unwrap_or(10);

    println!(
        "{:<width$}  {:>6}  {:>6}  {:>6}  {:>5}  Mounted on",
        "Filesystem",
        "Size",
        "Used",
        "Avail",
        "Use%",
        width = fs_width
    );
    for record in &records {
        println!(
            "{:<width$}  {:>6}  {:>6}  {:>6}  {:>5}  {}",
            record.filesystem,
            record.size,
            record.used,
            record.available,
            record.use_percent,
            record.mountpoint,
            width = fs_width
        );
    }
    Ok(())
}
