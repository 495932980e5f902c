#![cfg(test)]
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use latr_common::config::Config;
use latr_common::measurement::{LatencyGrade, MeasurementRound, Protocol};
use latr_common::network::privilege::PrivilegeMode;
use latr_common::network::target::{self, Target};
use latr_core::orchestrator::RoundEvent;
use latr_core::resolver::SystemResolver;
use latr_core::{Engine, LatrError};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// An engine restricted to the TCP fallback, probing `port` only.
fn loopback_engine(port: u16) -> Engine {
    let config: Config = Config {
        probe_timeout: Duration::from_millis(500),
        probe_interval: Duration::from_millis(5),
        tcp_ports: vec![port],
        no_dns: true,
        ..Config::default()
    };
    let resolver = Arc::new(SystemResolver::new(Duration::from_secs(2), true));
    Engine::with_parts(config, PrivilegeMode::Unprivileged, None, resolver)
}

async fn listener() -> (TcpListener, u16) {
    let listener: TcpListener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port: u16 = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Measures a listening loopback port through the TCP handshake fallback.
#[tokio::test]
async fn loopback_round_over_tcp_fallback() -> anyhow::Result<()> {
    let (_listener, port) = listener().await;
    let engine: Engine = loopback_engine(port);

    let round: MeasurementRound = engine
        .run_round(vec![Target::Addr(LOCALHOST)], Some(4), None, CancellationToken::new())
        .await?;

    let result = round.get(&Target::Addr(LOCALHOST)).context("no result for localhost")?;
    assert_eq!(result.protocol, Protocol::Tcp);
    assert_eq!(result.samples.len(), 4);
    assert_eq!(result.summary.packet_loss, 0.0);
    assert!(result.summary.min <= result.summary.avg && result.summary.avg <= result.summary.max);
    assert!(result.summary.throughput_estimate > 0.0);
    assert_eq!(result.grade(), LatencyGrade::Low);
    assert_eq!(engine.history().len(), 1);
    Ok(())
}

/// Mixes a reachable target, a closed one and an unresolvable name in one round.
#[tokio::test]
async fn partial_results_are_kept_for_unreachable_targets() -> anyhow::Result<()> {
    let (_listener, port) = listener().await;
    let engine: Engine = loopback_engine(port);
    let targets: Vec<Target> = target::parse_list("127.0.0.1, localhost, no-such-host.invalid")?;

    let round: MeasurementRound = engine
        .run_round(targets, Some(2), None, CancellationToken::new())
        .await
        .context("round should complete despite bad targets")?;

    assert_eq!(round.results.len(), 3);
    assert_eq!(round.results[0].summary.packet_loss, 0.0);

    let missing = &round.results[2];
    assert_eq!(missing.address, None);
    assert_eq!(missing.summary.packet_loss, 1.0);
    assert_eq!(missing.summary.avg, 0.0);
    assert_eq!(missing.grade(), LatencyGrade::Unreachable);
    assert!(round.overall_loss() > 0.0);
    Ok(())
}

/// Closed port on the loopback: every probe is lost, nothing is raised.
#[tokio::test]
async fn refused_connections_count_as_loss() {
    let (listener, port) = listener().await;
    drop(listener);
    let engine: Engine = loopback_engine(port);

    let round: MeasurementRound = engine
        .run_round(vec![Target::Addr(LOCALHOST)], Some(3), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(round.results[0].summary.packet_loss, 1.0);
    assert_eq!(round.results[0].summary.jitter, 0.0);
}

/// The event stream ends with the same round that lands in history.
#[tokio::test]
async fn started_round_streams_progress_then_completes() {
    let (_listener, port) = listener().await;
    let engine: Engine = loopback_engine(port);

    let mut handle = engine
        .start_round(vec![Target::Addr(LOCALHOST)], Some(3), CancellationToken::new())
        .unwrap();

    let second = engine.start_round(vec![Target::Addr(LOCALHOST)], Some(1), CancellationToken::new());
    assert!(matches!(second, Err(LatrError::RoundInProgress)));

    let mut progress: Vec<f64> = Vec::new();
    let mut completed: Option<MeasurementRound> = None;
    while let Some(event) = handle.events.recv().await {
        match event {
            RoundEvent::Progress(event) => progress.push(event.fraction_complete),
            RoundEvent::Complete(round) => completed = Some(round),
            RoundEvent::Failed { reason, .. } => panic!("round failed: {reason}"),
            RoundEvent::Cancelled => panic!("round cancelled"),
        }
    }
    let returned = handle.task.await.unwrap().unwrap();

    assert_eq!(progress.len(), 3);
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(progress.last().copied(), Some(1.0));
    assert_eq!(completed.as_ref(), Some(&returned));
    assert_eq!(engine.history(), vec![returned.clone()]);
    assert_eq!(engine.current_round(), Some(returned));
}

/// History survives rounds until it is cleared.
#[tokio::test]
async fn history_grows_and_clears() {
    let (_listener, port) = listener().await;
    let engine: Engine = loopback_engine(port);

    for _ in 0..2 {
        engine
            .run_round(vec![Target::Addr(LOCALHOST)], Some(1), None, CancellationToken::new())
            .await
            .unwrap();
    }
    assert_eq!(engine.history().len(), 2);

    engine.clear_history();
    assert!(engine.history().is_empty());

    engine
        .run_round(vec![Target::Addr(LOCALHOST)], Some(1), None, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(engine.history().len(), 1);
}

/// Inspection finds the listening port without raw sockets.
#[tokio::test]
async fn inspection_of_loopback() {
    let engine: Engine = loopback_engine(1);
    let inspection = engine.inspect(LOCALHOST).await;

    assert_eq!(inspection.address, LOCALHOST);
    assert_eq!(inspection.reachable, None);
    assert!(inspection.open_ports.windows(2).all(|pair| pair[0] < pair[1]));
}

/// Needs CAP_NET_RAW; run with `cargo test -- --ignored` as root.
#[tokio::test]
#[ignore]
async fn privileged_engine_traces_loopback_in_one_hop() {
    let engine: Engine = Engine::start(Config::default());
    assert_eq!(engine.privilege_mode(), PrivilegeMode::Raw);

    let hops = engine
        .traceroute(&Target::Addr(LOCALHOST), Some(5), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(hops.len(), 1);
    assert_eq!(hops[0].address, Some(LOCALHOST));
}

#[tokio::test]
#[ignore]
async fn public_resolver_is_measurable() {
    let engine: Engine = Engine::start(Config::default());
    let round = engine
        .run_round(vec![Target::Addr(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)))], Some(3), None, CancellationToken::new())
        .await
        .unwrap();
    assert!(round.results[0].summary.packet_loss < 1.0);
}
