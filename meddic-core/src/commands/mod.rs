// src/commands/mod.rs
pub mod init;

pub use init::{InitReport, default_root, ensure_initialized};
