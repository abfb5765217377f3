// file: src/system/apt.rs
// version: 1.2.0
// guid: f49d25b8-610e-4c3a-87f1-3e5a90d2c6b7

//! apt / dpkg helpers: package listing, hold management and the
//! unattended-upgrades package blacklist.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::exec::{capture, step, Cmd, CommandRunner};
use crate::Result;

/// List installed package names via dpkg-query.
pub async fn installed_packages(runner: &dyn CommandRunner) -> Result<Vec<String>> {
    let output = capture(
        runner,
        Cmd::new("dpkg-query").args(["-f", "${Package}\n", "-W"]),
    )
    .await?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// List packages currently marked hold.
pub async fn held_packages(runner: &dyn CommandRunner) -> Result<Vec<String>> {
    let output = capture(runner, Cmd::new("apt-mark").arg("showhold")).await?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub async fn hold(runner: &dyn CommandRunner, packages: &[String]) -> Result<()> {
    step(
        runner,
        Cmd::new("apt-mark").arg("hold").args(packages.to_vec()).sudo(),
        &format!("Holding {} package(s)", packages.len()),
    )
    .await
}

pub async fn unhold(runner: &dyn CommandRunner, packages: &[String]) -> Result<()> {
    step(
        runner,
        Cmd::new("apt-mark").arg("unhold").args(packages.to_vec()).sudo(),
        &format!("Releasing hold on {} package(s)", packages.len()),
    )
    .await
}

fn quoted_pattern_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)";"#).expect("static regex"))
}

/// Extract the quoted regex patterns from an
/// `Unattended-Upgrade::Package-Blacklist { ... };` block.
pub fn parse_blacklist(content: &str) -> Vec<String> {
    quoted_pattern_regex()
        .captures_iter(content)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Render the blacklist apt.conf fragment from a pattern list.
pub fn render_blacklist(patterns: &[String]) -> String {
    let mut out = String::from("Unattended-Upgrade::Package-Blacklist {\n");
    for pattern in patterns {
        out.push_str(&format!("    \"{}\";\n", pattern));
    }
    out.push_str("};\n");
    out
}

/// Match installed package names against blacklist patterns (anchored at
/// the start, like unattended-upgrades itself). The result is deduplicated
/// and keeps installation-list order.
pub fn match_packages(installed: &[String], patterns: &[String]) -> Vec<String> {
    let mut regexes = Vec::new();
    for pattern in patterns {
        match Regex::new(&format!("^(?:{})", pattern)) {
            Ok(re) => regexes.push(re),
            Err(e) => warn!("skipping invalid blacklist pattern '{}': {}", pattern, e),
        }
    }

    let mut matched = Vec::new();
    for package in installed {
        if regexes.iter().any(|re| re.is_match(package)) && !matched.contains(package) {
            matched.push(package.clone());
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render_roundtrip() {
        let patterns = vec!["nvidia-driver".to_string(), "libnvidia-.*".to_string()];
        let rendered = render_blacklist(&patterns);
        assert!(rendered.starts_with("Unattended-Upgrade::Package-Blacklist {"));
        assert_eq!(parse_blacklist(&rendered), patterns);
    }

    #[test]
    fn test_match_packages_deduplicates() {
        let installed = vec![
            "bash".to_string(),
            "nvidia-driver-535".to_string(),
            "libnvidia-compute-535".to_string(),
        ];
        // Duplicate pattern must not produce a duplicate hold entry.
        let patterns = vec![
            "nvidia-driver.*".to_string(),
            "nvidia-driver.*".to_string(),
        ];

        let matched = match_packages(&installed, &patterns);
        assert_eq!(matched, vec!["nvidia-driver-535".to_string()]);
    }

    #[test]
    fn test_match_packages_anchors_at_start() {
        let installed = vec!["xserver-xorg-video-nvidia-535".to_string()];
        let patterns = vec!["nvidia-driver.*".to_string()];
        assert!(match_packages(&installed, &patterns).is_empty());
    }

    #[test]
    fn test_match_packages_skips_invalid_pattern() {
        let installed = vec!["docker-ce".to_string()];
        let patterns = vec!["(unclosed".to_string(), "docker-ce".to_string()];
        assert_eq!(
            match_packages(&installed, &patterns),
            vec!["docker-ce".to_string()]
        );
    }

    #[tokio::test]
    async fn test_installed_packages() {
        use crate::exec::testing::ScriptRunner;
        use crate::exec::CmdOutput;

        let runner = ScriptRunner::new();
        runner.respond("dpkg-query", CmdOutput::ok("bash\ncurl\n\nnvidia-driver-535\n"));
        let packages = installed_packages(&runner).await.unwrap();
        assert_eq!(packages, vec!["bash", "curl", "nvidia-driver-535"]);
    }
}
