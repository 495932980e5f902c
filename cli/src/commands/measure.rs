use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use colored::*;
use latr_common::measurement::{MeasurementRound, TargetResult};
use latr_common::network::target::{self, Target};
use latr_common::{error, info, success, warn};
use latr_core::Engine;
use latr_core::LatrError;
use latr_core::orchestrator::{RoundEvent, RoundHandle};
use tokio_util::sync::CancellationToken;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::commands::MeasureArgs;
use crate::lprint;
use crate::terminal::{colors, format, print, progress};

pub async fn measure(engine: &Engine, args: MeasureArgs, cancel: CancellationToken) -> anyhow::Result<()> {
    let targets: Vec<Target> = target::parse_list(&args.targets.join(",")).context("parsing targets")?;
    if targets.is_empty() {
        bail!("no targets given");
    }
    if args.rounds == 0 {
        bail!("at least one round is required");
    }
    if !args.interval.is_finite() || args.interval < 0.0 {
        bail!("interval must be a non-negative number of seconds");
    }

    if !engine.privilege_mode().allows_raw() {
        warn!("No raw socket access, timing TCP handshakes instead of ICMP echo");
    }

    let pings: u32 = args.count.unwrap_or(engine.config().default_pings);
    let pause: Duration = Duration::from_secs_f64(args.interval);
    info!("Measuring {} targets with {pings} probes each", targets.len());

    for index in 1..=args.rounds {
        print::header(&format!("round {index} of {}", args.rounds));
        let started: Instant = Instant::now();

        let handle: RoundHandle = engine.start_round(targets.clone(), Some(pings), cancel.clone())?;
        let outcome = follow(handle, targets.len() as u64 * u64::from(pings)).await?;

        match outcome {
            Ok(round) => {
                if !args.json {
                    print_round(&round);
                    print_summary(&round, started.elapsed());
                }
            }
            Err(LatrError::Cancelled) => {
                warn!("Measurement cancelled, the unfinished round was discarded");
                break;
            }
            Err(LatrError::RoundFailed { reason, partial }) => {
                error!("{reason}");
                if !args.json {
                    print_round(&partial);
                }
                break;
            }
            Err(e) => return Err(e.into()),
        }

        if index < args.rounds {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    let history: Vec<MeasurementRound> = engine.history();
    if args.json {
        let json: String = if args.rounds == 1 {
            match history.last() {
                Some(round) => serde_json::to_string_pretty(round)?,
                None => serde_json::to_string_pretty(&engine.current_round())?,
            }
        } else {
            serde_json::to_string_pretty(&history)?
        };
        println!("{json}");
    } else if history.len() > 1 {
        print_history(&history);
    }

    print::end_of_program();
    Ok(())
}

/// Drives the progress bar from the round's events and returns its outcome.
async fn follow(mut handle: RoundHandle, total_probes: u64) -> anyhow::Result<Result<MeasurementRound, LatrError>> {
    let span: Span = progress::round_bar(total_probes, print::is_quiet());
    let _enter = span.enter();

    while let Some(event) = handle.events.recv().await {
        match event {
            RoundEvent::Progress(progress) => {
                span.pb_set_position(progress.completed);
                span.pb_set_message(&format!("{} #{}", progress.target, progress.probe_index));
            }
            RoundEvent::Complete(round) => {
                success!("Round finished, {} targets measured", round.results.len());
            }
            RoundEvent::Failed { partial, .. } => {
                warn!("Round failed after {} targets", partial.results.len());
            }
            // Reported from the task result below.
            RoundEvent::Cancelled => {}
        }
    }

    handle.task.await.context("measurement task panicked")
}

fn print_round(round: &MeasurementRound) {
    for (idx, result) in round.results.iter().enumerate() {
        print::tree_head(idx, &result_title(result));
        print::as_tree_one_level(result_details(result));
        if idx + 1 != round.results.len() {
            lprint!();
        }
    }
}

fn result_title(result: &TargetResult) -> String {
    match result.address {
        Some(address) if Some(address) != result.target.as_addr() => {
            format!("{} ({address})", result.target)
        }
        _ => result.target.to_string(),
    }
}

fn result_details(result: &TargetResult) -> Vec<(String, ColoredString)> {
    if let Some(reason) = &result.error {
        return vec![
            ("error".to_string(), reason.as_str().red()),
            ("loss".to_string(), format::loss(result.summary.packet_loss)),
        ];
    }

    let summary = &result.summary;
    vec![
        ("avg".to_string(), format::graded_avg(result)),
        (
            "min/max".to_string(),
            format!("{} / {}", format::ms(summary.min), format::ms(summary.max)).color(colors::TEXT_DEFAULT),
        ),
        ("stdev".to_string(), format::ms(summary.stdev).color(colors::TEXT_DEFAULT)),
        ("jitter".to_string(), format::ms(summary.jitter).color(colors::TEXT_DEFAULT)),
        ("loss".to_string(), format::loss(summary.packet_loss)),
        (
            "bandwidth".to_string(),
            format!("~{}", format::mbps(summary.throughput_estimate)).color(colors::SEPARATOR),
        ),
        ("protocol".to_string(), result.protocol.to_string().color(colors::ACCENT)),
    ]
}

fn print_summary(round: &MeasurementRound, elapsed: Duration) {
    let avg: ColoredString = format::ms(round.overall_avg()).bold().green();
    let loss: ColoredString = format::percent(round.overall_loss()).bold().yellow();
    let time: ColoredString = format!("{:.2}s", elapsed.as_secs_f64()).bold().yellow();
    let output: String = format!("Average {avg} with {loss} loss in {time}");

    if print::is_quiet() {
        success!("{output}");
    } else {
        print::fat_separator();
        print::centerln(&output);
    }
}

fn print_history(history: &[MeasurementRound]) {
    print::header("history");
    let width: usize = history
        .iter()
        .flat_map(|round| round.targets())
        .map(|target| target.to_string().len())
        .max()
        .unwrap_or(0);

    for (idx, round) in history.iter().enumerate() {
        let when: String = round.started_at.format("%H:%M:%S").to_string();
        print::tree_head(idx, &when);
        for result in &round.results {
            let line: String = format!(
                "  {} {} {}",
                format::pad(&result.target.to_string(), width).color(colors::PRIMARY),
                format::pad(&format::graded_avg(result).to_string(), 14),
                format::loss(result.summary.packet_loss),
            );
            print::print(&line);
        }
    }
}
