// file: src/commands/mod.rs
// version: 1.1.0
// guid: 5d8a0f27-c3b9-4461-92e5-b70c6d13a8f4

//! Command handlers, one module per subcommand group.

pub mod disk;
pub mod gpu;
pub mod install;
pub mod network;
pub mod update;
