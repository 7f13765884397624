//! Single-line exchange behavior over a scripted port.
//!
//! Covers the four reply shapes the single-line policy must distinguish
//! (result, error, empty, undecodable), diagnostic-line skipping, write
//! failures, and the write-before-read ordering invariant.

use tokio_util::sync::CancellationToken;

use stdio_probe::driver;
use stdio_probe::exchange::CollectPolicy;
use stdio_probe::request::Request;
use stdio_probe::server::port::{LineEvent, StreamLine};
use stdio_probe::{AppError, ProbeReport};

use super::test_helpers::{fast_config, FakePort, PortOp};

fn single_line_policy() -> CollectPolicy {
    CollectPolicy::SingleLine {
        overall: fast_config().response_timeout(),
    }
}

/// A result reply produces `SUCCESS` with the extracted content.
#[tokio::test]
async fn result_reply_reports_success() {
    let mut port = FakePort::new(vec![LineEvent::Line(StreamLine::output(
        r#"{"result":{"Content":"hello world"}}"#,
    ))]);
    let config = fast_config();
    let request = Request::rpc("RPCHandler.GetAllReviews", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    match report {
        ProbeReport::Success { content } => assert_eq!(content, "hello world"),
        other => panic!("expected Success, got: {other:?}"),
    }
}

/// An error reply produces the RPC error report without touching
/// `Content`.
#[tokio::test]
async fn error_reply_reports_rpc_error() {
    let mut port = FakePort::new(vec![LineEvent::Line(StreamLine::output(
        r#"{"error":"bad method"}"#,
    ))]);
    let config = fast_config();
    let request = Request::rpc("RPCHandler.Nope", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    match report {
        ProbeReport::RpcError { message } => assert_eq!(message, "bad method"),
        other => panic!("expected RpcError, got: {other:?}"),
    }
}

/// End-of-stream with zero reply lines is the empty-response outcome.
#[tokio::test]
async fn eof_before_reply_reports_no_response() {
    let mut port = FakePort::new(vec![LineEvent::Eof]);
    let config = fast_config();
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    assert!(
        matches!(report, ProbeReport::NoResponse),
        "EOF with no data must report NoResponse, got: {report:?}"
    );
}

/// An undecodable reply line is reported, not fatal — the run still
/// reaches teardown.
#[tokio::test]
async fn undecodable_reply_reports_decode_failure() {
    let mut port = FakePort::new(vec![LineEvent::Line(StreamLine::output("not json at all"))]);
    let config = fast_config();
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    match report {
        ProbeReport::DecodeFailed { reason } => assert!(
            reason.contains("malformed json"),
            "reason must describe the decode failure, got: {reason}"
        ),
        other => panic!("expected DecodeFailed, got: {other:?}"),
    }

    assert_eq!(port.terminate_count(), 1, "teardown must still terminate");
    assert_eq!(port.wait_count(), 1, "teardown must still wait");
}

/// Diagnostic lines are logged and skipped; the first stdout line decides
/// the outcome.
#[tokio::test]
async fn diagnostic_lines_are_skipped() {
    let mut port = FakePort::new(vec![
        LineEvent::Line(StreamLine::diag("INFO request received")),
        LineEvent::Line(StreamLine::output(r#"{"result":{"Content":"payload"}}"#)),
    ]);
    let config = fast_config();
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    match report {
        ProbeReport::Success { content } => assert_eq!(content, "payload"),
        other => panic!("expected Success, got: {other:?}"),
    }
}

/// Idle polls before the reply are tolerated within the deadline.
#[tokio::test]
async fn idle_polls_before_reply_are_tolerated() {
    let mut port = FakePort::new(vec![
        LineEvent::Idle,
        LineEvent::Idle,
        LineEvent::Line(StreamLine::output(r#"{"result":{"Content":"late"}}"#)),
    ]);
    let config = fast_config();
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    match report {
        ProbeReport::Success { content } => assert_eq!(content, "late"),
        other => panic!("expected Success, got: {other:?}"),
    }
}

/// A broken stdin fails the exchange with a write error — and no response
/// collection is attempted afterwards.
#[tokio::test]
async fn write_failure_fails_the_exchange() {
    let mut port = FakePort::new(vec![LineEvent::Line(StreamLine::output(
        r#"{"result":{"Content":"never read"}}"#,
    ))]);
    port.fail_send = true;
    let config = fast_config();
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    assert!(
        matches!(report, ProbeReport::Failed { error: AppError::Write(_) }),
        "broken stdin must report a write failure, got: {report:?}"
    );
    assert!(
        !port.ops.contains(&PortOp::Next),
        "no read may happen after a failed write, ops: {:?}",
        port.ops
    );
}

/// The request write strictly precedes any response read.
#[tokio::test]
async fn request_write_precedes_all_reads() {
    let mut port = FakePort::new(vec![LineEvent::Line(StreamLine::output(
        r#"{"result":{"Content":"ordered"}}"#,
    ))]);
    let config = fast_config();
    let request = Request::rpc("RPCHandler.Hello", vec![], 1);
    let cancel = CancellationToken::new();

    let _report =
        driver::run_with_port(&mut port, &config, &request, single_line_policy(), &cancel).await;

    let first_read = port.first_index_of(&PortOp::Next);
    let sent = port.sent_lines();
    assert_eq!(sent.len(), 1, "exactly one request must be sent");

    let send_index = port
        .first_index_of(&PortOp::Send(sent[0].clone()))
        .expect("send op must be recorded");
    let read_index = first_read.expect("at least one read must be recorded");

    assert!(
        send_index < read_index,
        "request write (op {send_index}) must precede the first read (op {read_index})"
    );
}
