// file: src/main.rs
// version: 1.1.0
// guid: 2f8b4d61-9c05-4a73-b2e8-50d1c7a93f46

//! dockervm - Main entry point

use clap::Parser;
use dockervm::{
    cli,
    cli::args::{
        Cli, Commands, DiskCommands, GpuCommands, InstallCommands, NetworkCommands, UpdateCommands,
    },
    commands::{disk, gpu, install, network, update},
    config::Settings,
    exec::SystemRunner,
    logging::logger,
    ui,
    ui::Console,
    Result,
};
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_logger(cli.verbose, cli.quiet) {
        eprintln!("failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // No signal juggling: prompts read stdin synchronously, so the default
    // SIGINT disposition is the only way Ctrl+C interrupts them promptly.
    if let Err(e) = run(cli).await {
        error!("{}", e);
        ui::failure(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load()?;
    let runner = SystemRunner;
    let prompter = Console;

    match cli.command {
        Commands::Disk { command } => match command {
            DiskCommands::Mount => disk::mount(&runner, &prompter, &settings).await,
            DiskCommands::DockerStorage => disk::docker_storage(&runner, &prompter, &settings).await,
            DiskCommands::DockerCleanBackup => disk::clean_backup(&runner, &prompter).await,
            DiskCommands::Expand => disk::expand(&runner, &prompter).await,
            DiskCommands::Usage => disk::usage_report(&runner).await,
        },
        Commands::Gpu { command } => match command {
            GpuCommands::Check => gpu::check(&runner).await,
            GpuCommands::InstallDriver { url } => {
                gpu::install_driver(&runner, &prompter, &settings, url).await
            }
            GpuCommands::SetupDocker => gpu::setup_docker(&runner).await,
            GpuCommands::SetupPersistence => gpu::setup_persistence(&runner).await,
            GpuCommands::ToggleHold => gpu::toggle_hold(&runner, &prompter).await,
        },
        Commands::Install { command } => match command {
            InstallCommands::Docker => install::install_docker(&runner).await,
            InstallCommands::Dockhand => {
                install::install_dockhand(&runner, &prompter, &settings).await
            }
            InstallCommands::Lazydocker => install::install_lazydocker(&runner).await,
            InstallCommands::Zsh => install::install_zsh(&runner, &prompter).await,
            InstallCommands::Container => {
                install::install_container(&runner, &prompter, &settings).await
            }
            InstallCommands::DnsServer => {
                install::install_dns_server(&runner, &prompter, &settings).await
            }
            InstallCommands::Gdu => install::install_gdu(&runner).await,
        },
        Commands::Network { command } => match command {
            NetworkCommands::Ip => network::set_static_ip(&runner, &prompter, &settings).await,
            NetworkCommands::Ipvlan => network::create_ipvlan(&runner, &prompter, &settings).await,
            NetworkCommands::Create => network::create_network(&runner, &prompter, &settings).await,
            NetworkCommands::List => network::list_networks(&runner).await,
        },
        Commands::Update { command } => match command {
            UpdateCommands::System => update::update_system(&runner, &prompter, &settings).await,
            UpdateCommands::SelfUpdate => update::update_self(&runner).await,
            UpdateCommands::Auto => update::setup_auto_updates(&runner, &prompter, &settings).await,
            UpdateCommands::Dockhand => update::update_dockhand(&runner, &settings).await,
            UpdateCommands::Mail => update::setup_mail(&runner, &prompter, &settings).await,
        },
        Commands::Overview => {
            cli::print_overview();
            Ok(())
        }
    }
}
