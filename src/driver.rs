//! Top-level probe driver: Launch → Exchange → Teardown.
//!
//! One invocation walks the phases
//! `Idle → Launched → (AwaitingReadiness) → RequestSent → AwaitingResponse
//! → Reported → Terminated`; `AwaitingReadiness` is skipped when no marker
//! is configured. Whatever the exchange produces — success, a recoverable
//! failure, an interrupt — the child is terminated and reaped exactly once
//! before the report is returned. A failed launch is the single exception:
//! there is nothing to tear down.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::exchange::{self, CollectPolicy};
use crate::readiness::{self, Readiness};
use crate::report::ProbeReport;
use crate::request::Request;
use crate::server::port::ServerPort;
use crate::server::spawner::{ServerProcess, SpawnConfig};
use crate::AppError;

/// Driver phases in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    /// Nothing launched yet.
    Idle,
    /// Server process spawned.
    Launched,
    /// Scanning output for the readiness marker.
    AwaitingReadiness,
    /// Request written and flushed.
    RequestSent,
    /// Collecting the response.
    AwaitingResponse,
    /// Outcome determined, teardown pending.
    Reported,
    /// Child terminated and reaped.
    Terminated,
}

impl ProbePhase {
    /// Phase label for log fields.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Launched => "launched",
            Self::AwaitingReadiness => "awaiting_readiness",
            Self::RequestSent => "request_sent",
            Self::AwaitingResponse => "awaiting_response",
            Self::Reported => "reported",
            Self::Terminated => "terminated",
        }
    }
}

/// Advance the phase, logging the transition.
fn enter(phase: &mut ProbePhase, next: ProbePhase) {
    debug!(from = phase.name(), to = next.name(), "phase transition");
    *phase = next;
}

/// Run one complete probe: spawn the server, exchange, tear down.
///
/// Launch failure returns immediately — the child never existed. Every
/// other path, including interruption, reaches teardown.
pub async fn run(
    config: &ProbeConfig,
    request: &Request,
    policy: CollectPolicy,
    cancel: &CancellationToken,
) -> ProbeReport {
    let mut phase = ProbePhase::Idle;

    let spawn_config = SpawnConfig::from(config);
    let mut port = match ServerProcess::spawn(&spawn_config) {
        Ok(port) => port,
        Err(error) => {
            warn!(%error, "server launch failed");
            return ProbeReport::Failed { error };
        }
    };
    enter(&mut phase, ProbePhase::Launched);

    run_with_port(&mut port, config, request, policy, cancel).await
}

/// Drive the exchange over an already-launched port, then tear it down.
///
/// Split from [`run`] so the whole post-launch lifecycle — readiness
/// gating, the exchange, and the unconditional teardown — can be exercised
/// against a scripted port.
pub async fn run_with_port(
    port: &mut dyn ServerPort,
    config: &ProbeConfig,
    request: &Request,
    policy: CollectPolicy,
    cancel: &CancellationToken,
) -> ProbeReport {
    let mut phase = ProbePhase::Launched;

    let report = drive(port, &mut phase, config, request, policy, cancel).await;
    enter(&mut phase, ProbePhase::Reported);

    teardown(port).await;
    enter(&mut phase, ProbePhase::Terminated);

    report
}

/// Readiness gate, optional pre-send delay, send, collect.
async fn drive(
    port: &mut dyn ServerPort,
    phase: &mut ProbePhase,
    config: &ProbeConfig,
    request: &Request,
    policy: CollectPolicy,
    cancel: &CancellationToken,
) -> ProbeReport {
    if let Some(marker) = &config.ready_marker {
        enter(phase, ProbePhase::AwaitingReadiness);
        let readiness = readiness::wait_for_ready(
            port,
            marker,
            config.ready_timeout(),
            config.poll_interval(),
            cancel,
        )
        .await;
        match readiness {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::NeverReady) => return ProbeReport::NotReady,
            Err(AppError::Interrupted) => return ProbeReport::Interrupted,
            Err(error) => return ProbeReport::Failed { error },
        }
    }

    let delay = config.send_delay();
    if !delay.is_zero() {
        debug!(delay_ms = config.send_delay_ms, "pre-send delay");
        tokio::select! {
            biased;
            () = cancel.cancelled() => return ProbeReport::Interrupted,
            () = tokio::time::sleep(delay) => {}
        }
    }

    if cancel.is_cancelled() {
        return ProbeReport::Interrupted;
    }

    if let Err(error) = exchange::send_request(port, request).await {
        warn!(%error, "request write failed");
        return ProbeReport::Failed { error };
    }
    enter(phase, ProbePhase::RequestSent);

    enter(phase, ProbePhase::AwaitingResponse);
    match exchange::collect(port, policy, config.poll_interval(), cancel).await {
        Ok(report) => report,
        Err(AppError::Interrupted) => ProbeReport::Interrupted,
        Err(error) => ProbeReport::Failed { error },
    }
}

/// Terminate and reap the child. Failures are logged, never propagated —
/// the report for the run is already decided.
async fn teardown(port: &mut dyn ServerPort) {
    if let Err(error) = port.terminate().await {
        warn!(%error, "terminate failed");
    }
    match port.wait_exit().await {
        Ok(code) => info!(exit_code = ?code, "server reaped"),
        Err(error) => warn!(%error, "wait failed"),
    }
}
