use clap::{Parser, Subcommand};

/// SEMS MITM exporter - intercepts device telemetry on its way to the
/// SEMS portal and re-exposes it as local metrics
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Options {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the MITM server
    Serve {
        /// Enable Batsignal mode (draws the bat-insignia on the SEMS
        /// portal graph)
        #[arg(long, env = "BATSIGNAL")]
        batsignal: bool,

        /// Enable passthrough to the SEMS portal
        #[arg(
            long,
            env = "SEMS_PASSTHROUGH",
            default_value_t = true,
            action = clap::ArgAction::Set
        )]
        sems_passthrough: bool,
    },
    /// Print version information
    Version,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
