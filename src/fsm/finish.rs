// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Finalization, outcome delivery, and connection close (§4.4
//! "Finalization (`finish`)" and "Outcome and close").

use tracing::{debug, trace};

use crate::{
    context::Context,
    error::TransactResult,
    fsm::states::{State, Transition},
    notifier::Notifier,
    pal::Pal,
    parser, proxy,
};

#[cfg(feature = "gzip")]
use crate::{context::ContentEncoding, gzip};

/// §4.4 `should_keep_alive`: the connection is retained only if every
/// condition holds.
pub fn should_keep_alive(ctx: &Context, result: TransactResult) -> bool {
    if !ctx.keep_alive.enabled || ctx.keep_alive.should_close {
        return false;
    }
    if result.forces_close() {
        return false;
    }
    #[cfg(feature = "advanced-keep-alive")]
    {
        if ctx.keep_alive.count >= ctx.keep_alive.max {
            return false;
        }
        if let Some(t_connect) = ctx.keep_alive.t_connect
            && t_connect.elapsed() >= ctx.keep_alive.timeout
        {
            return false;
        }
    }
    true
}

/// §4.4 Finalization: the `Ready` state, reached once a body (or a
/// CONNECT preamble with no body) is fully received.
pub fn dispatch<P: Pal, N: Notifier>(state: State, ctx: &mut Context, pal: &mut P, notifier: &mut N) -> Transition<()> {
    match state {
        State::Ready => finish(ctx, pal, notifier),

        State::Retry => {
            ctx.proxy.retry_after_close = false;
            Transition::Next(State::Connected)
        },

        State::WaitClose => poll_close(ctx, pal, notifier, State::Idle),
        State::KeepAliveWaitClose => poll_close(ctx, pal, notifier, State::Ready),

        State::KeepAliveReady => Transition::Next(State::Connected),

        other => {
            trace!(state = %other, "finish::dispatch called for an unhandled state");
            Transition::Stay
        },
    }
}

fn finish<P: Pal, N: Notifier>(ctx: &mut Context, pal: &mut P, notifier: &mut N) -> Transition<()> {
    match proxy::handle_finish(ctx) {
        proxy::ProxyFinishAction::Error(result) => {
            ctx.last_result = Some(result);
            return outcome_detected(ctx, pal, notifier, result);
        },
        proxy::ProxyFinishAction::TunnelEstablished => {
            return Transition::Next(State::Connected);
        },
        proxy::ProxyFinishAction::RetryAfterClose => {
            ctx.proxy.retry_after_close = true;
            return close_connection(ctx, pal, notifier);
        },
        proxy::ProxyFinishAction::PassThrough => {},
    }

    #[cfg(feature = "gzip")]
    if ctx.data_compressed == ContentEncoding::Gzip {
        match gzip::decompress(&ctx.http_reply) {
            Ok(decompressed) => {
                ctx.http_reply.clear();
                ctx.http_reply.extend_from_slice(&decompressed);
            },
            Err(result) => {
                return outcome_detected(ctx, pal, notifier, result);
            },
        }
    }

    let mut result = parser::parse_pubnub_result(ctx);
    if result == TransactResult::Ok && ctx.http_code / 100 != 2 {
        result = TransactResult::HttpError;
    }
    outcome_detected(ctx, pal, notifier, result)
}

/// §4.4 `outcome_detected`.
pub fn outcome_detected<P: Pal, N: Notifier>(
    ctx: &mut Context,
    pal: &mut P,
    notifier: &mut N,
    result: TransactResult,
) -> Transition<()> {
    ctx.last_result = Some(result);
    ctx.keep_alive.count += 1;

    if should_keep_alive(ctx, result) {
        pal.forget(ctx);
        ctx.proxy.retry_after_close = false;
        notifier.trans_outcome(ctx, State::KeepAliveIdle);
        Transition::Done(())
    } else {
        close_connection(ctx, pal, notifier)
    }
}

/// §4.4 `close_connection`.
fn close_connection<P: Pal, N: Notifier>(ctx: &mut Context, pal: &mut P, notifier: &mut N) -> Transition<()> {
    let pending = pal.close(ctx);
    if pending > 0 {
        Transition::Next(State::WaitClose)
    } else if ctx.proxy.retry_after_close {
        Transition::Next(State::Retry)
    } else {
        notifier.trans_outcome(ctx, State::Idle);
        Transition::Done(())
    }
}

/// §10.6 `close_kept_alive_connection`: used only from `KEEP_ALIVE_READY`
/// on a failed re-send attempt, returning to `Ready` or `Retry` rather than
/// `Idle`.
pub fn close_kept_alive_connection<P: Pal>(ctx: &mut Context, pal: &mut P) -> Transition<()> {
    let pending = pal.close(ctx);
    debug!(pending, "closing kept-alive connection for retry");
    if pending > 0 {
        Transition::Next(State::KeepAliveWaitClose)
    } else if ctx.proxy.retry_after_close {
        Transition::Next(State::Retry)
    } else {
        Transition::Next(State::Ready)
    }
}

fn poll_close<P: Pal, N: Notifier>(
    ctx: &mut Context,
    pal: &mut P,
    notifier: &mut N,
    terminal_state: State,
) -> Transition<()> {
    if !pal.closed(ctx) {
        return Transition::Stay;
    }
    if ctx.proxy.retry_after_close {
        Transition::Next(State::Retry)
    } else {
        notifier.trans_outcome(ctx, terminal_state);
        Transition::Done(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::KeepAlive;

    #[test]
    fn forces_close_results_never_keep_alive() {
        let mut ctx = Context::new("h");
        ctx.keep_alive = KeepAlive {
            enabled: true,
            ..KeepAlive::default()
        };
        assert!(!should_keep_alive(&ctx, TransactResult::IoError));
        assert!(!should_keep_alive(&ctx, TransactResult::Timeout));
    }

    #[test]
    fn ok_keeps_alive_when_enabled_and_not_over_budget() {
        let ctx = Context::new("h");
        assert!(should_keep_alive(&ctx, TransactResult::Ok));
    }

    #[test]
    fn disabled_keep_alive_always_closes() {
        let mut ctx = Context::new("h");
        ctx.keep_alive.enabled = false;
        assert!(!should_keep_alive(&ctx, TransactResult::Ok));
    }

    #[test]
    fn should_close_flag_overrides_ok_result() {
        let mut ctx = Context::new("h");
        ctx.keep_alive.should_close = true;
        assert!(!should_keep_alive(&ctx, TransactResult::Ok));
    }
}
