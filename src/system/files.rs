// file: src/system/files.rs
// version: 1.1.0
// guid: b3571e0c-94d8-4f6a-a2c5-708f1d3e9b64

//! Privileged file installation.
//!
//! System files are never written in place: content goes to a scoped
//! temporary file first and is then moved into position with sudo. This
//! avoids partial writes and permission races, and the temporary file is
//! cleaned up on every exit path.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::exec::{Cmd, CommandRunner};
use crate::{DvmError, Result};

/// Write `content` to `dest` via temp-file-then-privileged-move, owned by
/// root with the given chmod mode (e.g. "644", "600").
pub async fn install_file(
    runner: &dyn CommandRunner,
    dest: &Path,
    content: &str,
    mode: &str,
) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new()?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    let tmp_path = tmp.into_temp_path();
    debug!("staged {} at {}", dest.display(), tmp_path.display());

    let moved = runner
        .run(
            &Cmd::new("mv")
                .arg(tmp_path.display().to_string())
                .arg(dest.display().to_string())
                .sudo(),
        )
        .await?;
    if !moved.success() {
        // TempPath removes the staged file on drop.
        return Err(DvmError::execution(format!(
            "failed to install {}: {}",
            dest.display(),
            moved.stderr.trim()
        )));
    }
    // The move consumed the file; disarm the delete-on-drop guard.
    tmp_path
        .keep()
        .map_err(|e| DvmError::system(format!("failed to release temp file: {}", e)))?;

    for cmd in [
        Cmd::new("chown").arg("root:root").arg(dest.display().to_string()).sudo(),
        Cmd::new("chmod").arg(mode).arg(dest.display().to_string()).sudo(),
    ] {
        let output = runner.run(&cmd).await?;
        if !output.success() {
            return Err(DvmError::execution(format!(
                "failed to set permissions on {}: {}",
                dest.display(),
                output.stderr.trim()
            )));
        }
    }
    Ok(())
}
