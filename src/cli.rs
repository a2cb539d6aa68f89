use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version)]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Commands {
    /// Start the web server and job workers (default)
    Serve {
        /// Listen on this port instead of `server.port`
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Run every health check once and print the report
    Health {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version and build information
    Version {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum MigrateAction {
    /// Apply pending migrations
    Up {
        /// Number of migrations to apply (default: all)
        #[arg(short, long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(short, long, default_value = "1")]
        steps: u32,
    },
    /// List applied and pending migrations
    Status,
    /// Roll back everything, then apply everything
    Reset,
}
