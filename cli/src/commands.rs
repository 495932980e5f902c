pub mod info;
pub mod inspect;
pub mod measure;
pub mod trace;

use clap::{ArgAction, Args, Parser, Subcommand};
use latr_common::network::target::Target;

#[derive(Parser)]
#[command(name = "latr")]
#[command(version, about = "Latency, jitter and path measurement for a handful of hosts.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Timeout per probe and per hop, in milliseconds
    #[arg(long, global = true, default_value_t = 2000)]
    pub timeout: u64,

    /// Skip reverse DNS lookups
    #[arg(short = 'n', long, global = true)]
    pub no_dns: bool,

    /// More diagnostics (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print results
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the detected privilege mode and defaults
    #[command(alias = "i")]
    Info,
    /// Measure latency, jitter and loss to one or more targets
    #[command(alias = "m")]
    Measure(MeasureArgs),
    /// Discover the path to a destination (needs raw sockets)
    #[command(alias = "t")]
    Trace(TraceArgs),
    /// Check open well-known ports and reachability of one host
    #[command(alias = "x")]
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct MeasureArgs {
    /// Targets, separated by spaces or commas
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,

    /// Probes per target
    #[arg(short, long)]
    pub count: Option<u32>,

    /// Rounds to run back to back
    #[arg(short, long, default_value_t = 1)]
    pub rounds: u32,

    /// Pause between rounds, in seconds
    #[arg(short, long, default_value_t = 1.0)]
    pub interval: f64,

    /// Targets probed at the same time
    #[arg(short, long, default_value_t = 1)]
    pub parallel: usize,

    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct TraceArgs {
    pub destination: Target,

    /// Highest TTL to try
    #[arg(short, long)]
    pub max_hops: Option<u8>,

    /// Print the hops as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    pub target: Target,

    /// Print the inspection as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// JSON output implies quiet console output.
    pub fn quiet(&self) -> bool {
        let json = match &self.command {
            Commands::Measure(args) => args.json,
            Commands::Trace(args) => args.json,
            Commands::Inspect(args) => args.json,
            Commands::Info => false,
        };
        self.quiet || json
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
