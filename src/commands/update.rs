// file: src/commands/update.rs
// version: 1.2.0
// guid: 9f3b6a2d-41c8-4e07-bd56-7c2e8a10d394

//! Update subcommands: system upgrades with blacklist holds, self-update,
//! unattended upgrades, Dockhand refresh and mail notifications.

use tracing::debug;

use crate::ask;
use crate::config::Settings;
use crate::exec::{step, try_step, Cmd, CommandRunner};
use crate::system::{apt, docker, files};
use crate::ui::{self, Prompter};
use crate::{DvmError, Result};

/// apt.conf fragment enabling periodic unattended upgrades.
const AUTO_UPGRADES_CONF: &str = "APT::Periodic::Update-Package-Lists \"1\";\nAPT::Periodic::Unattended-Upgrade \"1\";\n";

/// Common blacklist groups offered during auto-update setup
/// (label, patterns, preselected).
const BLACKLIST_GROUPS: [(&str, &[&str], bool); 4] = [
    ("NVIDIA driver", &["nvidia-driver.*", "libnvidia-.*"], true),
    ("CUDA", &["cuda.*", "libcuda.*"], true),
    (
        "Docker Engine",
        &["docker-ce.*", "docker-buildx-plugin", "docker-compose-plugin"],
        false,
    ),
    ("containerd", &["containerd.*"], false),
];

/// Upgrade the system via apt, respecting the unattended-upgrades blacklist.
pub async fn update_system(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
) -> Result<()> {
    ui::header("System update");

    let blacklist_path = settings.blacklist_path();
    if blacklist_path.is_file() {
        let patterns = apt::parse_blacklist(&std::fs::read_to_string(&blacklist_path)?);
        if !patterns.is_empty() {
            let installed = apt::installed_packages(runner).await?;
            let matched = apt::match_packages(&installed, &patterns);
            if !matched.is_empty() {
                ui::status(&format!(
                    "{} installed package(s) are on the update blacklist:",
                    matched.len()
                ));
                for package in &matched {
                    println!("  {}", package);
                }
                if ask!(prompter.confirm("Update the blacklisted packages too this time?", false)) {
                    apt::unhold(runner, &matched).await?;
                } else {
                    apt::hold(runner, &matched).await?;
                }
            }
        }
    }

    try_step(runner, Cmd::new("apt").arg("clean").sudo(), "apt clean").await?;
    try_step(
        runner,
        Cmd::new("apt").args(["autoremove", "-y"]).sudo(),
        "apt autoremove",
    )
    .await?;
    step(runner, Cmd::new("apt").arg("update").sudo(), "apt update").await?;
    step(runner, Cmd::new("apt").args(["upgrade", "-y"]).sudo(), "apt upgrade").await?;

    ui::success("System updated");
    Ok(())
}

/// Update this tool from its git checkout.
pub async fn update_self(runner: &dyn CommandRunner) -> Result<()> {
    ui::header("Self-update");

    step(runner, Cmd::new("git").arg("pull"), "Pulling the latest sources").await?;
    step(
        runner,
        Cmd::new("cargo").args(["install", "--path", "."]),
        "Building and installing",
    )
    .await?;
    ui::success("dockervm updated");
    Ok(())
}

/// Collect blacklist patterns interactively. Returns `None` when the user
/// backs out of a prompt.
async fn collect_blacklist_patterns(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
) -> Result<Option<Vec<String>>> {
    // Like ask!, but maps an abort to None so the caller prints the notice.
    macro_rules! answer {
        ($expr:expr) => {
            match $expr? {
                crate::ui::Answer::Value(value) => value,
                crate::ui::Answer::Aborted => return Ok(None),
            }
        };
    }

    let mut patterns: Vec<String> = Vec::new();

    let choices: Vec<(String, bool)> = BLACKLIST_GROUPS
        .iter()
        .map(|(label, group, preselected)| {
            (format!("{} ({})", label, group.join(", ")), *preselected)
        })
        .collect();
    let picked = answer!(prompter.multi_select("Exclude these package groups from updates:", &choices));
    for index in picked {
        for pattern in BLACKLIST_GROUPS[index].1 {
            patterns.push(pattern.to_string());
        }
    }

    let custom = answer!(prompter.input("Additional patterns, comma-separated (optional)", None));
    for pattern in custom.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        patterns.push(pattern.to_string());
    }

    if answer!(prompter.confirm("Search installed packages for more entries?", false)) {
        let installed = apt::installed_packages(runner).await?;
        loop {
            let term = answer!(prompter.input("Search term (empty to finish)", None));
            let term = term.trim().to_lowercase();
            if term.is_empty() {
                break;
            }
            let hits: Vec<String> = installed
                .iter()
                .filter(|package| package.to_lowercase().contains(&term))
                .cloned()
                .collect();
            if hits.is_empty() {
                ui::warn("No installed package matches.");
                continue;
            }
            let choices: Vec<(String, bool)> =
                hits.iter().map(|package| (package.clone(), false)).collect();
            for index in answer!(prompter.multi_select("Add to the blacklist:", &choices)) {
                patterns.push(regex::escape(&hits[index]));
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    patterns.retain(|pattern| seen.insert(pattern.clone()));
    Ok(Some(patterns))
}

/// Install and configure unattended-upgrades with a package blacklist.
pub async fn setup_auto_updates(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
) -> Result<()> {
    ui::header("Automatic updates (unattended-upgrades)");

    step(
        runner,
        Cmd::new("apt").args(["install", "-y", "unattended-upgrades"]).sudo(),
        "Installing unattended-upgrades",
    )
    .await?;
    files::install_file(
        runner,
        &settings.apt_conf_file("20auto-upgrades"),
        AUTO_UPGRADES_CONF,
        "644",
    )
    .await?;
    step(
        runner,
        Cmd::new("systemctl")
            .args(["enable", "--now", "unattended-upgrades"])
            .sudo(),
        "Enabling the unattended-upgrades service",
    )
    .await?;

    ui::status("Some packages (GPU drivers in particular) should not update unattended.");
    let Some(patterns) = collect_blacklist_patterns(runner, prompter).await? else {
        ui::aborted();
        return Ok(());
    };
    debug!("blacklist patterns: {:?}", patterns);

    files::install_file(
        runner,
        &settings.blacklist_path(),
        &apt::render_blacklist(&patterns),
        "644",
    )
    .await?;

    if patterns.is_empty() {
        ui::warn("Empty blacklist written: every package updates automatically.");
    }
    ui::success("Automatic updates configured");
    Ok(())
}

/// Pull the latest Dockhand images and restart the stack.
pub async fn update_dockhand(runner: &dyn CommandRunner, settings: &Settings) -> Result<()> {
    ui::header("Dockhand update");

    if !settings.dockhand_dir.is_dir() {
        return Err(DvmError::not_found(format!(
            "{} does not exist; install Dockhand first with 'dockervm install dockhand'",
            settings.dockhand_dir.display()
        )));
    }
    docker::compose_pull(runner, &settings.dockhand_dir).await?;
    docker::compose_up(runner, &settings.dockhand_dir).await?;
    ui::success("Dockhand updated");
    Ok(())
}

/// Render /etc/msmtprc for the given SMTP account.
pub fn render_msmtprc(host: &str, port: u16, user: &str, password: &str, from: &str) -> String {
    format!(
        "defaults\n\
         auth           on\n\
         tls            on\n\
         tls_trust_file /etc/ssl/certs/ca-certificates.crt\n\
         logfile        /var/log/msmtp.log\n\
         \n\
         account        default\n\
         host           {host}\n\
         port           {port}\n\
         from           {from}\n\
         user           {user}\n\
         password       {password}\n"
    )
}

/// Render the unattended-upgrades mail fragment.
pub fn render_mail_conf(recipient: &str, only_on_error: bool) -> String {
    let report = if only_on_error { "only-on-error" } else { "on-change" };
    format!(
        "Unattended-Upgrade::Mail \"{}\";\nUnattended-Upgrade::MailReport \"{}\";\n",
        recipient, report
    )
}

/// Configure mail notifications for unattended-upgrades via msmtp.
pub async fn setup_mail(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
) -> Result<()> {
    ui::header("Update mail notifications (msmtp)");

    step(
        runner,
        Cmd::new("apt")
            .args(["install", "-y", "msmtp", "msmtp-mta", "bsd-mailx"])
            .sudo(),
        "Installing msmtp",
    )
    .await?;

    let host = ask!(prompter.input("SMTP host (e.g. smtp.gmail.com)", None));
    if host.trim().is_empty() {
        return Err(DvmError::validation("the SMTP host must not be empty"));
    }
    let port: u16 = ask!(prompter.input("SMTP port", Some("587")))
        .trim()
        .parse()
        .map_err(|_| DvmError::validation("the SMTP port must be a number"))?;
    let user = ask!(prompter.input("SMTP user", None));
    if user.trim().is_empty() {
        return Err(DvmError::validation("the SMTP user must not be empty"));
    }
    let password = ask!(prompter.password("SMTP password"));
    if password.is_empty() {
        return Err(DvmError::validation("the SMTP password must not be empty"));
    }
    let from = ask!(prompter.input("Sender address", Some(user.trim())));

    // Mode 600: the file carries the SMTP password.
    files::install_file(
        runner,
        &settings.msmtprc_path,
        &render_msmtprc(host.trim(), port, user.trim(), &password, from.trim()),
        "600",
    )
    .await?;
    try_step(
        runner,
        Cmd::new("ln").args(["-sf", "/usr/bin/msmtp", "/usr/sbin/sendmail"]).sudo(),
        "Linking sendmail to msmtp",
    )
    .await?;

    let recipient = ask!(prompter.input("Notification recipient", None));
    if recipient.trim().is_empty() {
        return Err(DvmError::validation("the recipient must not be empty"));
    }
    let only_on_error = ask!(prompter.confirm("Mail only when an update fails?", true));
    files::install_file(
        runner,
        &settings.apt_conf_file("51unattended-upgrades-email"),
        &render_mail_conf(recipient.trim(), only_on_error),
        "644",
    )
    .await?;

    if ask!(prompter.confirm("Send a test mail now?", true)) {
        let sent = try_step(
            runner,
            Cmd::new("mail")
                .args(["-s", "dockervm test mail"])
                .arg(recipient.trim())
                .stdin("Mail notifications for unattended upgrades are working.\n"),
            "Sending test mail",
        )
        .await?;
        if !sent {
            ui::warn("Test mail failed. Check /var/log/msmtp.log.");
        }
    }
    ui::success("Mail notifications configured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptRunner;
    use crate::exec::CmdOutput;
    use crate::ui::testing::{Scripted, ScriptedPrompter};

    fn settings_with_apt_conf(dir: &std::path::Path) -> Settings {
        Settings {
            apt_conf_dir: dir.to_path_buf(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_update_system_holds_blacklisted_packages() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_apt_conf(dir.path());
        std::fs::write(
            settings.blacklist_path(),
            apt::render_blacklist(&["nvidia-driver.*".to_string()]),
        )
        .unwrap();

        let runner = ScriptRunner::new();
        runner.respond("dpkg-query", CmdOutput::ok("bash\nnvidia-driver-535\n"));
        let prompter = ScriptedPrompter::new(vec![Scripted::Confirm(false)]);

        update_system(&runner, &prompter, &settings).await.unwrap();

        assert!(runner.ran("apt-mark hold nvidia-driver-535"));
        assert!(runner.ran("apt upgrade -y"));
        // The hold happens before the upgrade.
        assert!(runner.position("apt-mark hold") < runner.position("apt upgrade"));
    }

    #[tokio::test]
    async fn test_update_system_unholds_on_explicit_confirm() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_apt_conf(dir.path());
        std::fs::write(
            settings.blacklist_path(),
            apt::render_blacklist(&["nvidia-driver.*".to_string()]),
        )
        .unwrap();

        let runner = ScriptRunner::new();
        runner.respond("dpkg-query", CmdOutput::ok("nvidia-driver-535\n"));
        let prompter = ScriptedPrompter::new(vec![Scripted::Confirm(true)]);

        update_system(&runner, &prompter, &settings).await.unwrap();
        assert!(runner.ran("apt-mark unhold nvidia-driver-535"));
        assert!(!runner.ran("apt-mark hold "));
    }

    #[tokio::test]
    async fn test_update_system_without_blacklist_never_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_apt_conf(dir.path());

        let runner = ScriptRunner::new();
        // Empty prompter: any prompt would error the test.
        let prompter = ScriptedPrompter::new(vec![]);

        update_system(&runner, &prompter, &settings).await.unwrap();
        assert!(runner.ran("apt update"));
        assert!(runner.ran("apt upgrade -y"));
    }

    #[tokio::test]
    async fn test_update_system_stops_on_failed_update() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_apt_conf(dir.path());

        let runner = ScriptRunner::new();
        runner.fail_on("apt update");
        let prompter = ScriptedPrompter::new(vec![]);

        assert!(update_system(&runner, &prompter, &settings).await.is_err());
        assert!(!runner.ran("apt upgrade"));
    }

    #[tokio::test]
    async fn test_update_dockhand_requires_install() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            dockhand_dir: dir.path().join("missing"),
            ..Settings::default()
        };

        let runner = ScriptRunner::new();
        let result = update_dockhand(&runner, &settings).await;
        assert!(matches!(result, Err(DvmError::NotFound(_))));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_dockhand_pulls_before_up() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            dockhand_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };

        let runner = ScriptRunner::new();
        update_dockhand(&runner, &settings).await.unwrap();
        assert!(runner.position("docker compose pull") < runner.position("docker compose up -d"));
    }

    #[tokio::test]
    async fn test_setup_auto_updates_writes_both_conf_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_apt_conf(dir.path());

        let runner = ScriptRunner::new();
        let prompter = ScriptedPrompter::new(vec![
            Scripted::MultiSelect(vec![0]),       // NVIDIA group
            Scripted::Input("linux-image.*".into()),
            Scripted::Confirm(false),             // no package search
        ]);

        setup_auto_updates(&runner, &prompter, &settings).await.unwrap();

        assert!(runner.ran("systemctl enable --now unattended-upgrades"));
        let moves: Vec<_> = runner
            .calls()
            .iter()
            .filter(|c| c.starts_with("mv "))
            .cloned()
            .collect();
        assert!(moves.iter().any(|c| c.contains("20auto-upgrades")));
        assert!(moves.iter().any(|c| c.contains("51unattended-upgrades-blacklist")));
    }

    #[test]
    fn test_render_msmtprc() {
        let conf = render_msmtprc("smtp.example.com", 587, "vm@example.com", "s3cret", "vm@example.com");
        assert!(conf.contains("host           smtp.example.com"));
        assert!(conf.contains("port           587"));
        assert!(conf.contains("password       s3cret"));
        assert!(conf.starts_with("defaults\n"));
    }

    #[test]
    fn test_render_mail_conf() {
        let conf = render_mail_conf("admin@example.com", true);
        assert!(conf.contains("Unattended-Upgrade::Mail \"admin@example.com\";"));
        assert!(conf.contains("\"only-on-error\""));
        assert!(render_mail_conf("a@b", false).contains("\"on-change\""));
    }

    #[tokio::test]
    async fn test_setup_mail_requires_password() {
        let runner = ScriptRunner::new();
        let prompter = ScriptedPrompter::new(vec![
            Scripted::Input("smtp.example.com".into()),
            Scripted::Input("587".into()),
            Scripted::Input("vm@example.com".into()),
            Scripted::Password(String::new()),
        ]);

        let result = setup_mail(&runner, &prompter, &Settings::default()).await;
        assert!(matches!(result, Err(DvmError::Validation(_))));
        // Only the package install ran; no config was written.
        assert!(!runner.ran("mv "));
    }
}
