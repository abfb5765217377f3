// file: src/system/docker.rs
// version: 1.1.0
// guid: 52e7a9c3-0b64-4d18-9fe2-a873c1d40596

//! Docker daemon and compose helpers.

use std::path::Path;

use serde_json::{json, Value};

use crate::exec::{step, Cmd, CommandRunner};
use crate::{DvmError, Result};

/// Docker's built-in data directory when daemon.json does not override it.
pub const DEFAULT_DATA_ROOT: &str = "/var/lib/docker";

/// Read the configured data-root out of daemon.json content.
pub fn data_root(daemon_json: Option<&str>) -> Result<String> {
    let Some(content) = daemon_json else {
        return Ok(DEFAULT_DATA_ROOT.to_string());
    };
    if content.trim().is_empty() {
        return Ok(DEFAULT_DATA_ROOT.to_string());
    }
    let value: Value = serde_json::from_str(content)?;
    Ok(value
        .get("data-root")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_DATA_ROOT)
        .to_string())
}

/// Rewrite daemon.json content with a new data-root, preserving every
/// other key. Missing or empty input starts from an empty object.
pub fn with_data_root(daemon_json: Option<&str>, new_root: &str) -> Result<String> {
    let mut value: Value = match daemon_json {
        Some(content) if !content.trim().is_empty() => serde_json::from_str(content)?,
        _ => json!({}),
    };
    let object = value
        .as_object_mut()
        .ok_or_else(|| DvmError::parse("daemon.json is not a JSON object"))?;
    object.insert("data-root".to_string(), Value::String(new_root.to_string()));
    let mut rendered = serde_json::to_string_pretty(&value)?;
    rendered.push('\n');
    Ok(rendered)
}

/// `docker compose up -d` in the given stack directory.
pub async fn compose_up(runner: &dyn CommandRunner, dir: &Path) -> Result<()> {
    step(
        runner,
        Cmd::new("docker")
            .args(["compose", "up", "-d"])
            .current_dir(dir)
            .sudo(),
        &format!("Starting compose stack in {}", dir.display()),
    )
    .await
}

/// `docker compose pull` in the given stack directory.
pub async fn compose_pull(runner: &dyn CommandRunner, dir: &Path) -> Result<()> {
    step(
        runner,
        Cmd::new("docker")
            .args(["compose", "pull"])
            .current_dir(dir)
            .sudo(),
        &format!("Pulling images for {}", dir.display()),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_root_defaults() {
        assert_eq!(data_root(None).unwrap(), DEFAULT_DATA_ROOT);
        assert_eq!(data_root(Some("")).unwrap(), DEFAULT_DATA_ROOT);
        assert_eq!(data_root(Some("{}")).unwrap(), DEFAULT_DATA_ROOT);
    }

    #[test]
    fn test_data_root_configured() {
        let content = r#"{"data-root": "/mnt/volumes/docker", "log-driver": "json-file"}"#;
        assert_eq!(data_root(Some(content)).unwrap(), "/mnt/volumes/docker");
    }

    #[test]
    fn test_with_data_root_preserves_other_keys() {
        let content = r#"{"log-driver": "json-file"}"#;
        let rewritten = with_data_root(Some(content), "/mnt/volumes/docker").unwrap();
        let value: Value = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(value["data-root"], "/mnt/volumes/docker");
        assert_eq!(value["log-driver"], "json-file");
        assert!(rewritten.ends_with('\n'));
    }

    #[test]
    fn test_with_data_root_from_missing_file() {
        let rewritten = with_data_root(None, "/mnt/volumes/docker").unwrap();
        let value: Value = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(value["data-root"], "/mnt/volumes/docker");
    }

    #[test]
    fn test_with_data_root_rejects_non_object() {
        assert!(with_data_root(Some("[1, 2]"), "/mnt/docker").is_err());
    }
}
