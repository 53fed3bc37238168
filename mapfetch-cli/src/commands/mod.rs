//! CLI subcommands.

pub mod fetch;
pub mod init;
pub mod plan;
