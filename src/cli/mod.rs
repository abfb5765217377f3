// file: src/cli/mod.rs
// version: 1.0.0
// guid: 1e7c2b90-5fd4-4a38-86b1-d29e0c47a5f6

//! Command line interface for dockervm

pub mod args;

pub use args::Cli;

use colored::Colorize;

/// One-screen summary of every command, grouped like the CLI tree.
pub fn print_overview() {
    const GROUPS: [(&str, &[(&str, &str)]); 5] = [
        (
            "disk",
            &[
                ("mount", "Format an unmounted disk and mount it permanently"),
                ("docker-storage", "Move the Docker data directory to another disk"),
                ("docker-clean-backup", "Delete the backup left behind by docker-storage"),
                ("expand", "Grow a partition and its filesystem to the full disk"),
                ("usage", "Show filesystem usage"),
            ],
        ),
        (
            "gpu",
            &[
                ("check", "Check whether the VM sees an NVIDIA GPU"),
                ("install-driver", "Download and install the NVIDIA driver"),
                ("setup-docker", "Configure Docker for the NVIDIA container toolkit"),
                ("setup-persistence", "Enable persistence mode via cron"),
                ("toggle-hold", "Hold or release NVIDIA packages for apt updates"),
            ],
        ),
        (
            "install",
            &[
                ("docker", "Install Docker Engine from the official repository"),
                ("dockhand", "Install Dockhand with a Postgres database"),
                ("lazydocker", "Install Lazydocker"),
                ("zsh", "Install ZSH and Oh My Zsh"),
                ("container", "Deploy a container stack from a template"),
                ("dns-server", "Deploy an AdGuard Home DNS server"),
                ("gdu", "Install the gdu disk usage analyzer"),
            ],
        ),
        (
            "network",
            &[
                ("ip", "Configure a static IP via netplan"),
                ("ipvlan", "Create a Docker ipvlan network"),
                ("create", "Create a Docker network"),
                ("list", "List Docker networks"),
            ],
        ),
        (
            "update",
            &[
                ("system", "Upgrade the system via apt"),
                ("self", "Update this tool from its git checkout"),
                ("auto", "Configure unattended upgrades with a package blacklist"),
                ("dockhand", "Pull and restart the Dockhand stack"),
                ("mail", "Configure mail notifications for unattended upgrades"),
            ],
        ),
    ];

    println!("{}", "DockerVM CLI command overview".bold());
    for (group, commands) in GROUPS {
        println!("\n{}", group.yellow().bold());
        for (name, about) in commands {
            println!("  {} {}", format!("{:<20}", name).cyan(), about);
        }
    }
    println!();
}
