//! Subcommand modules for the `rnaec` binary.

mod args;

pub mod batch;
pub mod filter;
pub mod mi;
pub mod top;
