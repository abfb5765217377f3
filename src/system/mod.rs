// file: src/system/mod.rs
// version: 1.0.0
// guid: 1f8a4d62-c035-49e7-bb18-52d97ce0a4f3

//! Wrappers around the OS tools the CLI drives.

pub mod apt;
pub mod docker;
pub mod files;
pub mod fstab;
pub mod lsblk;
