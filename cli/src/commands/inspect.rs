use std::net::IpAddr;

use anyhow::Context;
use colored::*;
use latr_common::network::host::Inspection;
use latr_core::Engine;
use tracing::Span;

use crate::commands::InspectArgs;
use crate::terminal::{colors, print, progress};

pub async fn inspect(engine: &Engine, args: InspectArgs) -> anyhow::Result<()> {
    let address: IpAddr = engine
        .resolve(&args.target)
        .await
        .with_context(|| format!("inspecting {}", args.target))?;

    let inspection: Inspection = {
        let span: Span = progress::spinner(&format!("Inspecting {address}..."), print::is_quiet());
        let _enter = span.enter();
        engine.inspect(address).await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        return Ok(());
    }

    print::header(&format!("inspection of {}", args.target));
    print::tree_head(0, &address.to_string());
    print::as_tree_one_level(details(&inspection));
    print::end_of_program();
    Ok(())
}

fn details(inspection: &Inspection) -> Vec<(String, ColoredString)> {
    let hostname: ColoredString = match &inspection.hostname {
        Some(name) => name.as_str().color(colors::PRIMARY),
        None => "unknown".color(colors::SEPARATOR),
    };
    let ports: ColoredString = if inspection.open_ports.is_empty() {
        "none".color(colors::SEPARATOR)
    } else {
        inspection
            .open_ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ")
            .color(colors::ACCENT)
    };
    let reachable: ColoredString = match inspection.reachable {
        Some(true) => "yes".color(colors::GRADE_LOW),
        Some(false) => "no".color(colors::GRADE_HIGH),
        None => "unknown (no raw sockets)".color(colors::SEPARATOR),
    };
    let ttl: ColoredString = match inspection.ttl_observed {
        Some(ttl) => ttl.to_string().color(colors::TEXT_DEFAULT),
        None => "-".color(colors::SEPARATOR),
    };

    vec![
        ("hostname".to_string(), hostname),
        ("ports".to_string(), ports),
        ("reachable".to_string(), reachable),
        ("ttl".to_string(), ttl),
    ]
}
