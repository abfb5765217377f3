// file: src/commands/network.rs
// version: 1.2.0
// guid: 7b1fd4e8-3a06-4c92-b5d1-08e7a2c64f39

//! Network subcommands: static IP via netplan and Docker networks.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use crate::ask;
use crate::config::Settings;
use crate::exec::{step, try_step, Cmd, CommandRunner};
use crate::system::files;
use crate::ui::{self, Prompter};
use crate::{DvmError, Result};

/// Name of the netplan config this tool owns.
const NETPLAN_FILE: &str = "01-dockervm.yaml";

#[derive(Serialize)]
struct NetplanDoc {
    network: NetplanNetwork,
}

#[derive(Serialize)]
struct NetplanNetwork {
    version: u8,
    ethernets: BTreeMap<String, NetplanInterface>,
}

#[derive(Serialize)]
struct NetplanInterface {
    dhcp4: bool,
    addresses: Vec<String>,
    routes: Vec<NetplanRoute>,
    nameservers: NetplanNameservers,
}

#[derive(Serialize)]
struct NetplanRoute {
    to: String,
    via: String,
}

#[derive(Serialize)]
struct NetplanNameservers {
    addresses: Vec<String>,
}

/// Render a netplan document for a single statically configured interface.
pub fn render_netplan(
    interface: &str,
    address: &str,
    gateway: &str,
    dns: &[String],
) -> Result<String> {
    let mut ethernets = BTreeMap::new();
    ethernets.insert(
        interface.to_string(),
        NetplanInterface {
            dhcp4: false,
            addresses: vec![address.to_string()],
            routes: vec![NetplanRoute {
                to: "default".to_string(),
                via: gateway.to_string(),
            }],
            nameservers: NetplanNameservers {
                addresses: dns.to_vec(),
            },
        },
    );
    let doc = NetplanDoc {
        network: NetplanNetwork {
            version: 2,
            ethernets,
        },
    };
    Ok(serde_yaml::to_string(&doc)?)
}

/// Split a comma-separated DNS answer into addresses.
pub fn parse_dns_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn require(value: String, what: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(DvmError::validation(format!("{} must not be empty", what)));
    }
    Ok(value.trim().to_string())
}

fn netplan_configs(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut configs = Vec::new();
    if !dir.is_dir() {
        return Ok(configs);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
            configs.push(path);
        }
    }
    configs.sort();
    Ok(configs)
}

/// Configure a static IP address via netplan, with rollback on apply failure.
pub async fn set_static_ip(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
) -> Result<()> {
    ui::header("Static IP configuration (netplan)");

    let interface = require(
        ask!(prompter.input("Interface", Some(&settings.default_interface))),
        "the interface",
    )?;
    let address = require(
        ask!(prompter.input("IP address with CIDR (e.g. 192.168.1.10/24)", None)),
        "the IP address",
    )?;
    if !address.contains('/') {
        return Err(DvmError::validation(
            "the address needs a CIDR suffix, e.g. 192.168.1.10/24",
        ));
    }
    let gateway = require(
        ask!(prompter.input("Gateway (e.g. 192.168.1.1)", None)),
        "the gateway",
    )?;
    let dns = parse_dns_list(&ask!(prompter.input(
        "DNS servers, comma-separated (e.g. 1.1.1.1,8.8.8.8)",
        None
    )));
    if dns.is_empty() {
        return Err(DvmError::validation("at least one DNS server is required"));
    }

    let yaml = render_netplan(&interface, &address, &gateway, &dns)?;
    ui::status(&format!("New {}:", NETPLAN_FILE));
    println!("{}", yaml);
    ui::warn("A wrong configuration can cut off network access to this VM.");
    if !ask!(prompter.confirm("Apply this configuration?", false)) {
        ui::aborted();
        return Ok(());
    }

    let existing = netplan_configs(&settings.netplan_dir)?;
    let backup_dir = settings.netplan_dir.join("backup");
    step(
        runner,
        Cmd::new("mkdir").arg("-p").arg(backup_dir.display().to_string()).sudo(),
        "Creating the netplan backup directory",
    )
    .await?;
    for config in &existing {
        step(
            runner,
            Cmd::new("cp")
                .arg(config.display().to_string())
                .arg(backup_dir.display().to_string())
                .sudo(),
            &format!("Backing up {}", config.display()),
        )
        .await?;
    }
    for config in &existing {
        step(
            runner,
            Cmd::new("rm").arg(config.display().to_string()).sudo(),
            &format!("Removing {}", config.display()),
        )
        .await?;
    }

    let target = settings.netplan_dir.join(NETPLAN_FILE);
    files::install_file(runner, &target, &yaml, "600").await?;

    let applied = try_step(runner, Cmd::new("netplan").arg("apply").sudo(), "netplan apply").await?;
    if !applied {
        warn!("netplan apply failed, restoring previous configuration");
        ui::warn("Apply failed. Restoring the previous configuration...");
        try_step(
            runner,
            Cmd::new("rm").arg(target.display().to_string()).sudo(),
            &format!("Removing {}", NETPLAN_FILE),
        )
        .await?;
        for config in &existing {
            let Some(name) = config.file_name() else { continue };
            let backed = backup_dir.join(name);
            try_step(
                runner,
                Cmd::new("cp")
                    .arg(backed.display().to_string())
                    .arg(config.display().to_string())
                    .sudo(),
                &format!("Restoring {}", config.display()),
            )
            .await?;
        }
        try_step(runner, Cmd::new("netplan").arg("apply").sudo(), "netplan apply (restore)")
            .await?;
        return Err(DvmError::execution(
            "netplan apply failed; the previous configuration was restored",
        ));
    }

    ui::success(&format!("Static IP {} configured on {}", address, interface));
    ui::status(&format!(
        "Previous configs saved under {}",
        backup_dir.display()
    ));
    Ok(())
}

/// Create a Docker ipvlan network attached to a host interface.
pub async fn create_ipvlan(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
) -> Result<()> {
    ui::header("Docker ipvlan network");
    ui::status("Containers on an ipvlan network get addresses in the host subnet.");

    let subnet = require(
        ask!(prompter.input("Subnet", Some("192.168.1.0/24"))),
        "the subnet",
    )?;
    let gateway = require(
        ask!(prompter.input("Gateway", Some("192.168.1.1"))),
        "the gateway",
    )?;
    let ip_range = require(
        ask!(prompter.input("IP range for containers", Some("192.168.1.192/27"))),
        "the IP range",
    )?;
    let parent = require(
        ask!(prompter.input("Parent interface", Some(&settings.default_interface))),
        "the parent interface",
    )?;
    let name = require(
        ask!(prompter.input("Network name", Some("ipvlan_net"))),
        "the network name",
    )?;

    let cmd = Cmd::new("docker")
        .args(["network", "create", "-d", "ipvlan"])
        .arg("--subnet")
        .arg(&subnet)
        .arg("--gateway")
        .arg(&gateway)
        .arg("--ip-range")
        .arg(&ip_range)
        .arg("-o")
        .arg(format!("parent={}", parent))
        .arg(&name)
        .sudo();

    ui::status(&format!("Command: {}", cmd));
    if !ask!(prompter.confirm("Create this network?", true)) {
        ui::aborted();
        return Ok(());
    }
    step(runner, cmd, "Creating the ipvlan network").await?;
    ui::success(&format!("Network {} created", name));
    Ok(())
}

/// Create a Docker network with a chosen driver.
pub async fn create_network(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    settings: &Settings,
) -> Result<()> {
    ui::header("Docker network");

    let name = require(ask!(prompter.input("Network name", None)), "the network name")?;
    let drivers = vec![
        "bridge".to_string(),
        "macvlan".to_string(),
        "ipvlan".to_string(),
    ];
    let driver = drivers[ask!(prompter.select("Driver", &drivers))].clone();

    let mut cmd = Cmd::new("docker")
        .args(["network", "create", "-d"])
        .arg(&driver);

    let subnet = ask!(prompter.input("Subnet (empty: Docker picks one)", None));
    if !subnet.trim().is_empty() {
        cmd = cmd.arg("--subnet").arg(subnet.trim());
        let gateway = ask!(prompter.input("Gateway (optional)", None));
        if !gateway.trim().is_empty() {
            cmd = cmd.arg("--gateway").arg(gateway.trim());
        }
    }

    // macvlan and ipvlan need a parent interface on the host.
    if driver != "bridge" {
        let parent = require(
            ask!(prompter.input("Parent interface", Some(&settings.default_interface))),
            "the parent interface",
        )?;
        cmd = cmd.arg("-o").arg(format!("parent={}", parent));
    }
    cmd = cmd.arg(&name).sudo();
    debug!("network create command: {}", cmd);

    ui::status(&format!("Command: {}", cmd));
    if !ask!(prompter.confirm("Create this network?", true)) {
        ui::aborted();
        return Ok(());
    }
    step(runner, cmd, "Creating the network").await?;
    ui::success(&format!("Network {} created", name));
    Ok(())
}

/// List the Docker networks on this host.
pub async fn list_networks(runner: &dyn CommandRunner) -> Result<()> {
    let status = runner
        .run_interactive(&Cmd::new("docker").args(["network", "ls"]).sudo())
        .await?;
    if status != 0 {
        return Err(DvmError::execution("docker network ls failed"));
    }
    Ok(())
}
