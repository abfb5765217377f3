// file: src/system/fstab.rs
// version: 1.1.0
// guid: d82c46f1-3a09-4be7-95d2-c4f08a617e39

//! fstab entry handling for the disk mount workflow.

use std::path::Path;

use tracing::info;

use crate::exec::{Cmd, CommandRunner};
use crate::system::files;
use crate::Result;

/// Render the fstab line for a freshly formatted data disk.
pub fn format_entry(uuid: &str, mountpoint: &str, fstype: &str) -> String {
    format!("UUID={} {} {} defaults 0 2", uuid, mountpoint, fstype)
}

/// True when the UUID or the mountpoint already appears in an active
/// (non-comment) fstab line.
pub fn has_entry(content: &str, uuid: &str, mountpoint: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let source_matches = fields
                .first()
                .is_some_and(|f| *f == format!("UUID={}", uuid) || f.ends_with(uuid));
            let target_matches = fields.get(1).is_some_and(|f| *f == mountpoint);
            source_matches || target_matches
        })
}

/// Append the entry unless the UUID or mountpoint is already present.
/// Returns true when the file was changed. A `.backup` copy is taken
/// before the privileged move.
pub async fn ensure_entry(
    runner: &dyn CommandRunner,
    fstab_path: &Path,
    uuid: &str,
    mountpoint: &str,
    fstype: &str,
) -> Result<bool> {
    let content = match std::fs::read_to_string(fstab_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if has_entry(&content, uuid, mountpoint) {
        info!("fstab already contains {} or {}", uuid, mountpoint);
        return Ok(false);
    }

    let mut updated = content;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&format_entry(uuid, mountpoint, fstype));
    updated.push('\n');

    let backup = format!("{}.backup", fstab_path.display());
    let copied = runner
        .run(
            &Cmd::new("cp")
                .arg(fstab_path.display().to_string())
                .arg(&backup)
                .sudo(),
        )
        .await?;
    if !copied.success() {
        // A missing fstab has nothing to back up; anything else is fatal
        // enough to surface via the install step below.
        info!("fstab backup skipped: {}", copied.stderr.trim());
    }

    files::install_file(runner, fstab_path, &updated, "644").await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptRunner;

    const UUID: &str = "41c2a1b0-9f1e-4a40-9c6a-2f4f7e5d1c3a";

    #[test]
    fn test_format_entry() {
        assert_eq!(
            format_entry(UUID, "/mnt/volumes", "ext4"),
            format!("UUID={} /mnt/volumes ext4 defaults 0 2", UUID)
        );
    }

    #[test]
    fn test_has_entry_matches_uuid_and_mountpoint() {
        let content = format!(
            "# /etc/fstab\nUUID=root-uuid / ext4 errors=remount-ro 0 1\nUUID={} /mnt/volumes ext4 defaults 0 2\n",
            UUID
        );
        assert!(has_entry(&content, UUID, "/mnt/other"));
        assert!(has_entry(&content, "different-uuid", "/mnt/volumes"));
        assert!(!has_entry(&content, "different-uuid", "/mnt/other"));
        // Comments never match.
        assert!(!has_entry("# UUID=abc /mnt/x ext4 defaults 0 2\n", "abc", "/mnt/x"));
    }

    #[tokio::test]
    async fn test_ensure_entry_appends_once() {
        let dir = tempfile::tempdir().unwrap();
        let fstab = dir.path().join("fstab");
        std::fs::write(&fstab, "UUID=root-uuid / ext4 defaults 0 1\n").unwrap();

        let runner = ScriptRunner::new();
        let changed = ensure_entry(&runner, &fstab, UUID, "/mnt/volumes", "ext4")
            .await
            .unwrap();
        assert!(changed);
        assert!(runner.ran("cp "));
        assert!(runner.ran("mv "));

        // Simulate the privileged move having landed, then repeat: the
        // same UUID/mountpoint must not be appended twice.
        std::fs::write(
            &fstab,
            format!(
                "UUID=root-uuid / ext4 defaults 0 1\nUUID={} /mnt/volumes ext4 defaults 0 2\n",
                UUID
            ),
        )
        .unwrap();

        let runner = ScriptRunner::new();
        let changed = ensure_entry(&runner, &fstab, UUID, "/mnt/volumes", "ext4")
            .await
            .unwrap();
        assert!(!changed);
        assert!(runner.calls().is_empty());
    }
}
