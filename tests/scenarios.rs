// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! End-to-end scenarios driving the FSM directly against [`MockPal`],
//! the same fixture-replay style the teacher uses for PDU round-trips,
//! swapped here for HTTP byte streams.

use transact_engine_rs::{
    context::{Context, ProxyKind, TransactionKind},
    error::TransactResult,
    fsm::{self, states::State},
    notifier::ImmediateNotifier,
    pal::mock::MockPal,
    timer_list::TimerList,
};

/// S1 — simple GET, content-length.
#[test]
fn simple_get_with_content_length() {
    let mut ctx = Context::new("h");
    let mut pal = MockPal::new();
    pal.queue_reply(&mut ctx, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");

    let mut outcome = None;
    let mut notifier = ImmediateNotifier::new(|_c: &Context, r, s| outcome = Some((r, s)));

    assert!(fsm::start_transaction(&mut ctx, TransactionKind::Get, "/p"));
    fsm::step(&mut ctx, &mut pal, &mut notifier);

    let (result, state) = outcome.expect("outcome delivered");
    assert_eq!(result, TransactResult::Ok);
    assert_eq!(ctx.http_code, 200);
    assert_eq!(ctx.http_reply.as_ref(), b"hello");
    assert_eq!(state, State::KeepAliveIdle);

    let sent = String::from_utf8_lossy(pal.sent(&ctx)).into_owned();
    assert!(sent.starts_with("GET /p HTTP/1.1\r\nHost: h\r\n"));
}

/// S2 — chunked transfer-encoding.
#[test]
fn chunked_body_is_decoded() {
    let mut ctx = Context::new("h");
    let mut pal = MockPal::new();
    pal.queue_reply(
        &mut ctx,
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
    );

    let mut outcome = None;
    let mut notifier = ImmediateNotifier::new(|_c: &Context, r, s| outcome = Some((r, s)));

    assert!(fsm::start_transaction(&mut ctx, TransactionKind::Get, "/p"));
    fsm::step(&mut ctx, &mut pal, &mut notifier);

    let (result, _state) = outcome.expect("outcome delivered");
    assert_eq!(result, TransactResult::Ok);
    assert_eq!(ctx.http_reply.as_ref(), b"hello");
}

/// S3 — non-2xx status yields `HttpError` without discarding the body.
#[test]
fn non_2xx_status_is_http_error() {
    let mut ctx = Context::new("h");
    let mut pal = MockPal::new();
    pal.queue_reply(&mut ctx, b"HTTP/1.1 500 X\r\nContent-Length: 2\r\n\r\nNO");

    let mut outcome = None;
    let mut notifier = ImmediateNotifier::new(|_c: &Context, r, s| outcome = Some((r, s)));

    assert!(fsm::start_transaction(&mut ctx, TransactionKind::Get, "/p"));
    fsm::step(&mut ctx, &mut pal, &mut notifier);

    let (result, _state) = outcome.expect("outcome delivered");
    assert_eq!(result, TransactResult::HttpError);
    assert_eq!(ctx.http_code, 500);
    assert_eq!(ctx.http_reply.as_ref(), b"NO");
}

/// S4 — connect failure.
#[test]
fn connect_failure_is_addr_resolution_failed() {
    let mut ctx = Context::new("h");
    let mut pal = MockPal::new();
    pal.fail_next_connect(&mut ctx);

    let mut outcome = None;
    let mut notifier = ImmediateNotifier::new(|_c: &Context, r, s| outcome = Some((r, s)));

    assert!(fsm::start_transaction(&mut ctx, TransactionKind::Get, "/p"));
    fsm::step(&mut ctx, &mut pal, &mut notifier);

    let (result, state) = outcome.expect("outcome delivered");
    assert_eq!(result, TransactResult::AddrResolutionFailed);
    assert_eq!(state, State::Idle);
}

/// S5 — timer expiry drives `stop(TIMEOUT)` and a terminal outcome.
#[test]
fn timer_expiry_cancels_and_delivers_timeout() {
    let mut ctx = Context::new("h");
    ctx.state = State::RxHeaders;

    let mut list = TimerList::new();
    list.insert(ctx, 1000);
    let mut expired = list.age(1500);
    assert_eq!(expired.len(), 1);
    let mut ctx = expired.pop().expect("one expired context");

    let mut pal = MockPal::new();
    let mut outcome = None;
    let mut notifier = ImmediateNotifier::new(|_c: &Context, r, s| outcome = Some((r, s)));

    fsm::cancel::stop(&mut ctx, &mut notifier, TransactResult::Timeout);
    fsm::step(&mut ctx, &mut pal, &mut notifier);

    let (result, state) = outcome.expect("terminal outcome delivered");
    assert_eq!(result, TransactResult::Timeout);
    assert_eq!(state, State::Idle);
}

/// S6 — HTTP CONNECT tunnel: the CONNECT preamble, then the real request
/// replayed through the now-established tunnel on the same connection.
#[test]
fn http_connect_tunnel_then_real_request() {
    let mut ctx = Context::new("host");
    ctx.proxy.kind = ProxyKind::HttpConnect;

    let mut pal = MockPal::new();
    pal.queue_reply(&mut ctx, b"HTTP/1.1 200 Connection established\r\n\r\n");
    pal.queue_reply(&mut ctx, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");

    let mut outcome = None;
    let mut notifier = ImmediateNotifier::new(|_c: &Context, r, s| outcome = Some((r, s)));

    assert!(fsm::start_transaction(&mut ctx, TransactionKind::Get, "/real"));
    fsm::step(&mut ctx, &mut pal, &mut notifier);

    let sent = String::from_utf8_lossy(pal.sent(&ctx)).into_owned();
    assert!(sent.starts_with("CONNECT host:80 HTTP/1.1\r\nHost: host:80\r\n"));
    assert!(sent.contains("GET /real HTTP/1.1\r\nHost: host\r\n"));

    assert!(ctx.proxy.tunnel_established);
    assert_eq!(ctx.path, "/real");

    let (result, _state) = outcome.expect("outcome delivered after the tunneled exchange");
    assert_eq!(result, TransactResult::Ok);
    assert_eq!(ctx.http_reply.as_ref(), b"ok");
}
