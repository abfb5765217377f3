// file: src/logging/mod.rs
// version: 1.0.0
// guid: 5b80f3d2-1e96-4c7a-a043-7f6d82c95e10

//! Logging module

pub mod logger;
