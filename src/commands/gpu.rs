// file: src/commands/gpu.rs
// version: 1.2.0
// guid: 3a9c50e7-d1f8-4b26-8047-95c3e6a1d0b2

//! NVIDIA GPU subcommands: passthrough check, driver installation,
//! container toolkit setup, persistence mode and update holds.

use tracing::debug;

use crate::ask;
use crate::config::Settings;
use crate::exec::{capture, step, try_step, Cmd, CommandRunner};
use crate::system::apt;
use crate::ui::{self, Prompter};
use crate::{DvmError, Result};

/// Crontab line enabling persistence mode after boot.
const PERSISTENCE_CRON: &str =
    "@reboot sleep 30 && /usr/bin/nvidia-smi -pm 1 >> /var/log/nvidia-persistence.log 2>&1";

/// Package name patterns treated as NVIDIA/CUDA driver packages.
const DRIVER_PATTERNS: [&str; 4] = ["nvidia-driver.*", "libnvidia-.*", "cuda.*", "libcuda.*"];

/// Check whether the VM sees an NVIDIA GPU on the PCI bus.
pub async fn check(runner: &dyn CommandRunner) -> Result<()> {
    ui::status("Checking for an NVIDIA GPU...");
    let listing = capture(runner, Cmd::new("lspci")).await?;
    let gpus: Vec<&str> = listing
        .lines()
        .filter(|line| line.to_lowercase().contains("nvidia"))
        .collect();

    if gpus.is_empty() {
        ui::failure("No NVIDIA GPU detected. Check the hypervisor passthrough configuration.");
        return Err(DvmError::not_found("no NVIDIA device on the PCI bus"));
    }

    ui::success("NVIDIA GPU detected:");
    for line in gpus {
        println!("  {}", line);
    }
    Ok(())
}

/// Download and install the NVIDIA driver with DKMS support.
pub async fn install_driver(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
    url: Option<String>,
) -> Result<()> {
    ui::header("NVIDIA driver installation");

    let url = match url {
        Some(url) => url,
        None => ask!(prompter.input("NVIDIA driver download URL", Some(&settings.driver_url))),
    };
    if url.is_empty() {
        return Err(DvmError::validation("no driver URL given"));
    }

    step(
        runner,
        Cmd::new("apt")
            .args(["install", "-y", "make", "gcc", "build-essential", "dkms"])
            .sudo(),
        "Installing build dependencies",
    )
    .await?;

    let filename = url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("nvidia-driver.run")
        .to_string();
    debug!("driver installer file {}", filename);

    step(
        runner,
        Cmd::new("wget").arg("-O").arg(&filename).arg(&url),
        &format!("Downloading NVIDIA driver ({})", filename),
    )
    .await?;
    step(
        runner,
        Cmd::new("chmod").arg("+x").arg(&filename),
        "Marking installer executable",
    )
    .await?;

    // --dkms rebuilds the module on kernel updates.
    step(
        runner,
        Cmd::new(format!("./{}", filename)).arg("--dkms").sudo(),
        "Running the NVIDIA installer (this can take a while)",
    )
    .await?;

    try_step(
        runner,
        Cmd::new("apt").args(["install", "-y", "nvtop"]).sudo(),
        "Installing nvtop",
    )
    .await?;

    ui::success("Driver installation finished");
    ui::warn("IMPORTANT: a reboot is required before the GPU can be used.");
    if ask!(prompter.confirm("Reboot the system now?", false)) {
        ui::status("Rebooting...");
        step(runner, Cmd::new("reboot").sudo(), "Reboot").await?;
    } else {
        ui::status("Reboot manually before running 'dockervm gpu setup-docker'.");
    }
    Ok(())
}

/// Configure Docker to use the NVIDIA container toolkit runtime.
pub async fn setup_docker(runner: &dyn CommandRunner) -> Result<()> {
    ui::header("NVIDIA container toolkit setup");

    // Fixed vendor pipelines, no user input involved.
    step(
        runner,
        Cmd::shell(
            "curl -fsSL https://nvidia.github.io/libnvidia-container/gpgkey | \
             gpg --dearmor --yes -o /usr/share/keyrings/nvidia-container-toolkit.gpg",
        )
        .sudo(),
        "Importing the NVIDIA repository key",
    )
    .await?;
    step(
        runner,
        Cmd::shell(
            "curl -fsSL https://nvidia.github.io/libnvidia-container/stable/deb/nvidia-container-toolkit.list | \
             sed 's#deb https://#deb [signed-by=/usr/share/keyrings/nvidia-container-toolkit.gpg] https://#g' | \
             tee /etc/apt/sources.list.d/nvidia-container-toolkit.list > /dev/null",
        )
        .sudo(),
        "Adding the NVIDIA container toolkit repository",
    )
    .await?;

    step(runner, Cmd::new("apt").arg("update").sudo(), "Refreshing package lists").await?;
    step(
        runner,
        Cmd::new("apt")
            .args(["install", "-y", "nvidia-container-toolkit"])
            .sudo(),
        "Installing nvidia-container-toolkit",
    )
    .await?;

    step(
        runner,
        Cmd::new("nvidia-ctk")
            .args(["runtime", "configure", "--runtime=docker"])
            .sudo(),
        "Configuring the Docker runtime",
    )
    .await?;
    step(
        runner,
        Cmd::new("systemctl").args(["restart", "docker"]).sudo(),
        "Restarting Docker",
    )
    .await?;

    ui::status("Testing GPU passthrough with a CUDA container...");
    let passed = try_step(
        runner,
        Cmd::new("docker")
            .args([
                "run",
                "--rm",
                "--gpus",
                "all",
                "nvidia/cuda:12.3.0-base-ubuntu22.04",
                "nvidia-smi",
            ])
            .sudo(),
        "GPU smoke test",
    )
    .await?;
    if passed {
        ui::success("Docker GPU passthrough works!");
    } else {
        ui::warn("GPU smoke test failed. Check 'nvidia-smi' on the host and the Docker runtime.");
    }
    Ok(())
}

/// Enable NVIDIA persistence mode via an idempotent @reboot cron entry.
pub async fn setup_persistence(runner: &dyn CommandRunner) -> Result<()> {
    ui::header("NVIDIA persistence mode");

    // crontab -l exits non-zero when no crontab exists yet.
    let current = runner.run(&Cmd::new("crontab").arg("-l")).await?;
    let table = if current.success() {
        current.stdout
    } else {
        String::new()
    };

    if table.lines().any(|line| line.trim() == PERSISTENCE_CRON) {
        ui::status("Persistence cron job already present.");
        return Ok(());
    }

    let mut updated = table;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(PERSISTENCE_CRON);
    updated.push('\n');

    step(
        runner,
        Cmd::new("crontab").arg("-").stdin(updated),
        "Installing persistence cron job",
    )
    .await?;
    ui::success("Persistence cron job added");
    Ok(())
}

/// Compute which installed packages count as NVIDIA driver packages.
pub fn driver_packages(installed: &[String]) -> Vec<String> {
    let patterns: Vec<String> = DRIVER_PATTERNS.iter().map(|p| p.to_string()).collect();
    apt::match_packages(installed, &patterns)
}

/// Hold or release NVIDIA packages for apt updates.
pub async fn toggle_hold(runner: &dyn CommandRunner, prompter: &dyn Prompter) -> Result<()> {
    ui::header("NVIDIA update hold");

    let installed = apt::installed_packages(runner).await?;
    let nvidia = driver_packages(&installed);
    if nvidia.is_empty() {
        ui::failure("No installed NVIDIA or CUDA packages found.");
        return Err(DvmError::not_found("no NVIDIA packages installed"));
    }

    let held = apt::held_packages(runner).await?;
    let currently_held: Vec<String> = nvidia
        .iter()
        .filter(|pkg| held.contains(pkg))
        .cloned()
        .collect();

    if !currently_held.is_empty() {
        ui::status(&format!(
            "{} NVIDIA package(s) are currently held.",
            currently_held.len()
        ));
        let choices = vec![
            "Keep the hold".to_string(),
            "Release the hold (ready for updates)".to_string(),
        ];
        if ask!(prompter.select("What do you want to do?", &choices)) == 1 {
            apt::unhold(runner, &currently_held).await?;
            ui::success("Hold released. Drivers update with the next 'apt upgrade'.");
        }
    } else {
        ui::status(&format!(
            "{} NVIDIA package(s) found, none of them held.",
            nvidia.len()
        ));
        let choices = vec![
            "Hold them (exclude from all updates)".to_string(),
            "Leave them unheld".to_string(),
        ];
        if ask!(prompter.select("What do you want to do?", &choices)) == 0 {
            apt::hold(runner, &nvidia).await?;
            ui::success("Drivers held. apt will skip them until the hold is released.");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptRunner;
    use crate::exec::CmdOutput;
    use crate::ui::testing::{Scripted, ScriptedPrompter};

    #[tokio::test]
    async fn test_check_detects_gpu() {
        let runner = ScriptRunner::new();
        runner.respond(
            "lspci",
            CmdOutput::ok("00:02.0 VGA compatible controller: NVIDIA Corporation GA102\n"),
        );
        check(&runner).await.unwrap();
    }

    #[tokio::test]
    async fn test_check_fails_without_gpu() {
        let runner = ScriptRunner::new();
        runner.respond("lspci", CmdOutput::ok("00:02.0 VGA compatible controller: Red Hat QXL\n"));
        assert!(check(&runner).await.is_err());
    }

    #[test]
    fn test_driver_packages_matching() {
        let installed = vec![
            "nvidia-driver-535".to_string(),
            "libnvidia-compute-535".to_string(),
            "cuda-toolkit-12-3".to_string(),
            "bash".to_string(),
        ];
        let matched = driver_packages(&installed);
        assert_eq!(matched.len(), 3);
        assert!(!matched.contains(&"bash".to_string()));
    }

    #[tokio::test]
    async fn test_setup_persistence_is_idempotent() {
        let runner = ScriptRunner::new();
        runner.respond(
            "crontab -l",
            CmdOutput::ok(format!("{}\n", PERSISTENCE_CRON)),
        );

        setup_persistence(&runner).await.unwrap();
        // The entry is already there: only the listing ran.
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_setup_persistence_appends_to_empty_crontab() {
        let runner = ScriptRunner::new();
        runner.respond("crontab -l", CmdOutput::failed(1, "no crontab for user"));

        setup_persistence(&runner).await.unwrap();
        assert!(runner.ran("crontab -"));
    }

    #[tokio::test]
    async fn test_toggle_hold_holds_unheld_packages() {
        let runner = ScriptRunner::new();
        runner.respond("dpkg-query", CmdOutput::ok("nvidia-driver-535\nbash\n"));
        runner.respond("apt-mark showhold", CmdOutput::ok(""));

        let prompter = ScriptedPrompter::new(vec![Scripted::Select(0)]);
        toggle_hold(&runner, &prompter).await.unwrap();
        assert!(runner.ran("apt-mark hold nvidia-driver-535"));
    }

    #[tokio::test]
    async fn test_install_driver_uses_flag_url_without_prompting() {
        let runner = ScriptRunner::new();
        let settings = Settings::default();
        // One scripted answer only: the reboot confirmation.
        let prompter = ScriptedPrompter::new(vec![Scripted::Confirm(false)]);

        install_driver(
            &runner,
            &prompter,
            &settings,
            Some("https://example.com/NVIDIA-Linux-x86_64-580.119.02.run".to_string()),
        )
        .await
        .unwrap();

        assert!(runner.ran("wget -O NVIDIA-Linux-x86_64-580.119.02.run"));
        assert!(runner.ran("./NVIDIA-Linux-x86_64-580.119.02.run --dkms"));
        assert!(!runner.ran("reboot"));
    }
}
