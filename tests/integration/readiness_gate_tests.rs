//! Readiness gating behavior over a scripted port.
//!
//! With a marker configured the request must not be written until a line
//! containing the marker has been observed — and must never be written at
//! all when the marker does not appear within the bounded wait.

use tokio_util::sync::CancellationToken;

use stdio_probe::driver;
use stdio_probe::exchange::CollectPolicy;
use stdio_probe::request::Request;
use stdio_probe::server::port::{LineEvent, StreamLine};
use stdio_probe::ProbeReport;

use super::test_helpers::{fast_config, FakePort, PortOp};

fn single_line_policy() -> CollectPolicy {
    CollectPolicy::SingleLine {
        overall: fast_config().response_timeout(),
    }
}

/// The request is sent only after the marker line is observed, and the
/// exchange then completes normally.
#[tokio::test]
async fn request_waits_for_the_marker() {
    let mut port = FakePort::new(vec![
        LineEvent::Line(StreamLine::diag("INFO booting")),
        LineEvent::Line(StreamLine::diag(
            "INFO Starting RPC Server on Stdin/Stdout",
        )),
        LineEvent::Line(StreamLine::output(r#"{"result":{"Content":"gated"}}"#)),
    ]);
    let mut config = fast_config();
    config.ready_marker = Some("Starting RPC".to_owned());
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    match report {
        ProbeReport::Success { content } => assert_eq!(content, "gated"),
        other => panic!("expected Success, got: {other:?}"),
    }

    let sent = port.sent_lines();
    assert_eq!(sent.len(), 1, "exactly one request must be sent");

    let send_index = port
        .first_index_of(&PortOp::Send(sent[0].clone()))
        .expect("send op must be recorded");
    let reads_before_send = port.ops[..send_index]
        .iter()
        .filter(|op| **op == PortOp::Next)
        .count();
    assert!(
        reads_before_send >= 2,
        "both boot lines must be observed before the request is sent"
    );
}

/// A readiness marker on stdout gates the request just like one on stderr.
#[tokio::test]
async fn marker_on_stdout_is_observed() {
    let mut port = FakePort::new(vec![
        LineEvent::Line(StreamLine::output("Starting RPC")),
        LineEvent::Line(StreamLine::output(r#"{"result":{"Content":"ok"}}"#)),
    ]);
    let mut config = fast_config();
    config.ready_marker = Some("Starting RPC".to_owned());
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    assert!(report.is_success(), "expected Success, got: {report:?}");
}

/// A server that exits before logging the marker yields the not-ready
/// outcome and the request is never sent.
#[tokio::test]
async fn early_exit_reports_not_ready() {
    let mut port = FakePort::new(vec![
        LineEvent::Line(StreamLine::diag("INFO booting")),
        LineEvent::Eof,
    ]);
    let mut config = fast_config();
    config.ready_marker = Some("Starting RPC".to_owned());
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    assert!(
        matches!(report, ProbeReport::NotReady),
        "early exit must report NotReady, got: {report:?}"
    );
    assert!(
        port.sent_lines().is_empty(),
        "the request must never be sent to a server that was never ready"
    );
}

/// A marker that never appears within the deadline yields the not-ready
/// outcome instead of hanging forever.
#[tokio::test]
async fn marker_deadline_reports_not_ready() {
    let mut port = FakePort::new(vec![LineEvent::Idle; 50]);
    let mut config = fast_config();
    config.ready_marker = Some("Starting RPC".to_owned());
    config.ready_timeout_ms = 60;
    config.poll_interval_ms = 20;
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    assert!(
        matches!(report, ProbeReport::NotReady),
        "a silent server must report NotReady, got: {report:?}"
    );
    assert!(port.sent_lines().is_empty(), "no request may be sent");

    let polls = port.ops.iter().filter(|op| **op == PortOp::Next).count();
    assert!(
        polls < 50,
        "the deadline must stop the wait, not script exhaustion (polls: {polls})"
    );
}
