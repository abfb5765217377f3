// file: src/lib.rs
// version: 1.0.0
// guid: a94e27b0-63c1-48fd-8e52-04d7b9c1f6a8

//! # DockerVM CLI
//!
//! Interactive command-line tool for administering a Docker-centric Ubuntu
//! virtual machine: disk formatting and mounting, Docker storage relocation,
//! NVIDIA GPU setup, package and container installation, network
//! configuration (Netplan, Docker networks) and system update management.
//!
//! Every operation is a thin sequence of external command invocations
//! (`apt`, `lsblk`, `mkfs`, `docker`, `systemctl`, `netplan`, ...) wrapped
//! with interactive prompts and status messages.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod system;
pub mod ui;

pub use error::{DvmError, Result};

/// Version information for the tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
