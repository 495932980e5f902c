mod commands;
mod terminal;

use std::time::Duration;

use commands::{CommandLine, Commands, info, inspect, measure, trace};
use latr_common::config::Config;
use latr_common::warn;
use latr_core::Engine;
use terminal::{logging, print};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();
    let quiet: bool = commands.quiet();

    logging::init_logging(commands.verbose, quiet);
    print::initialize(quiet);
    print::banner();

    let timeout = Duration::from_millis(commands.timeout);
    let mut cfg = Config {
        probe_timeout: timeout,
        hop_timeout: timeout,
        no_dns: commands.no_dns,
        ..Config::default()
    };
    if let Commands::Measure(args) = &commands.command {
        cfg.parallel_targets = args.parallel.max(1);
    }

    let engine = Engine::start(cfg);
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match commands.command {
        Commands::Info => {
            print::header("about the tool");
            info::info(&engine);
            Ok(())
        }
        Commands::Measure(args) => {
            print::header("getting ready for measurement");
            measure::measure(&engine, args, cancel).await
        }
        Commands::Trace(args) => trace::trace(&engine, args, cancel).await,
        Commands::Inspect(args) => inspect::inspect(&engine, args).await,
    }
}

/// First Ctrl-C stops issuing probes, the second one exits right away.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupted, finishing in-flight probes");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
