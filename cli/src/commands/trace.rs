use anyhow::Context;
use colored::*;
use latr_common::network::hop::HopResult;
use latr_common::network::target::Target;
use latr_common::{success, warn};
use latr_core::{Engine, LatrError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commands::TraceArgs;
use crate::terminal::{colors, format, print};

pub async fn trace(engine: &Engine, args: TraceArgs, cancel: CancellationToken) -> anyhow::Result<()> {
    if !engine.privilege_mode().allows_raw() {
        print::print_status("Traceroute needs raw sockets, try again with elevated privileges");
        return Err(LatrError::InsufficientPrivilege.into());
    }

    print::header(&format!("path to {}", args.destination));
    let (hops_tx, mut hops_rx) = mpsc::unbounded_channel::<HopResult>();
    let show_hops: bool = !args.json;

    let walk = engine.traceroute(&args.destination, args.max_hops, Some(hops_tx), cancel);
    let render = async {
        while let Some(hop) = hops_rx.recv().await {
            if show_hops {
                print_hop(&hop);
            }
        }
    };
    let (result, ()) = tokio::join!(walk, render);

    let hops: Vec<HopResult> = match result {
        Ok(hops) => hops,
        Err(LatrError::Cancelled) => {
            warn!("Traceroute cancelled");
            return Ok(());
        }
        Err(e) => return Err(e).context(format!("tracing {}", args.destination)),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hops)?);
    } else {
        summarize(&args.destination, &hops);
    }
    print::end_of_program();
    Ok(())
}

fn print_hop(hop: &HopResult) {
    let index: ColoredString = format!("{:>2}", hop.hop).color(colors::ACCENT);
    let line: String = match (&hop.address, &hop.hostname) {
        (Some(address), Some(hostname)) if hostname != &address.to_string() => format!(
            "{index}  {} ({})  {}",
            hostname.color(colors::PRIMARY),
            address.to_string().color(colors::TEXT_DEFAULT),
            format::optional_ms(hop.latency_ms).color(colors::TEXT_DEFAULT),
        ),
        (Some(address), _) => format!(
            "{index}  {}  {}",
            address.to_string().color(colors::PRIMARY),
            format::optional_ms(hop.latency_ms).color(colors::TEXT_DEFAULT),
        ),
        (None, _) => format!("{index}  {}", "* no response".color(colors::SEPARATOR)),
    };
    print::print(&line);
}

fn summarize(destination: &Target, hops: &[HopResult]) {
    let answered: usize = hops.iter().filter(|hop| !hop.is_silent()).count();
    let output: String = format!(
        "{} hops to {destination}, {} answered",
        hops.len().to_string().bold().green(),
        answered.to_string().bold().yellow(),
    );
    if print::is_quiet() {
        success!("{output}");
    } else {
        print::fat_separator();
        print::centerln(&output);
    }
}
