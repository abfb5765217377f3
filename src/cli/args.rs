// file: src/cli/args.rs
// version: 1.1.0
// guid: 6a2d9e48-0b57-4f13-a8c6-39e1d5b70c24

//! Command line argument definitions

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dockervm")]
#[command(about = "Administration helper for Docker-centric Linux VMs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Disk and storage management
    Disk {
        #[command(subcommand)]
        command: DiskCommands,
    },

    /// NVIDIA GPU passthrough setup
    Gpu {
        #[command(subcommand)]
        command: GpuCommands,
    },

    /// Install tools and container stacks
    Install {
        #[command(subcommand)]
        command: InstallCommands,
    },

    /// Host and Docker network configuration
    Network {
        #[command(subcommand)]
        command: NetworkCommands,
    },

    /// System and tool updates
    Update {
        #[command(subcommand)]
        command: UpdateCommands,
    },

    /// Show a one-screen overview of every command
    #[command(name = "commands")]
    Overview,
}

#[derive(Subcommand)]
pub enum DiskCommands {
    /// Format an unmounted disk and mount it permanently
    Mount,

    /// Move the Docker data directory to another disk
    DockerStorage,

    /// Delete the backup left behind by docker-storage
    DockerCleanBackup,

    /// Grow a partition and its filesystem to the full disk
    Expand,

    /// Show filesystem usage
    Usage,
}

#[derive(Subcommand)]
pub enum GpuCommands {
    /// Check whether the VM sees an NVIDIA GPU
    Check,

    /// Download and install the NVIDIA driver
    InstallDriver {
        /// Driver download URL (prompted when omitted)
        #[arg(long)]
        url: Option<String>,
    },

    /// Configure Docker for the NVIDIA container toolkit
    SetupDocker,

    /// Enable persistence mode via cron
    SetupPersistence,

    /// Hold or release NVIDIA packages for apt updates
    ToggleHold,
}

#[derive(Subcommand)]
pub enum InstallCommands {
    /// Install Docker Engine from the official repository
    Docker,

    /// Install Dockhand with a Postgres database
    Dockhand,

    /// Install Lazydocker
    Lazydocker,

    /// Install ZSH and Oh My Zsh
    Zsh,

    /// Deploy a container stack from a template
    Container,

    /// Deploy an AdGuard Home DNS server
    DnsServer,

    /// Install the gdu disk usage analyzer
    Gdu,
}

#[derive(Subcommand)]
pub enum NetworkCommands {
    /// Configure a static IP via netplan
    Ip,

    /// Create a Docker ipvlan network
    Ipvlan,

    /// Create a Docker network
    Create,

    /// List Docker networks
    List,
}

#[derive(Subcommand)]
pub enum UpdateCommands {
    /// Upgrade the system via apt
    System,

    /// Update this tool from its git checkout
    #[command(name = "self")]
    SelfUpdate,

    /// Configure unattended upgrades with a package blacklist
    Auto,

    /// Pull and restart the Dockhand stack
    Dockhand,

    /// Configure mail notifications for unattended upgrades
    Mail,
}
