// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Transaction FSM (§4.4): the state dispatcher, resolve/connect states,
//! and the `step` entry point that the surrounding platform adapter calls
//! from readiness callbacks and timer ticks.

pub mod cancel;
pub mod finish;
pub mod request;
pub mod response;
pub mod states;

use tracing::trace;

use crate::{
    context::{Context, TransactionKind},
    error::TransactResult,
    notifier::Notifier,
    pal::{ConnectStatus, Pal},
};
pub use states::{State, Transition};

/// §4.4 `can_start_transaction` gate, plus the bookkeeping a caller needs
/// to kick a context from `Idle`/`KeepAliveIdle` into `WaitDnsSend`.
pub fn start_transaction(ctx: &mut Context, trans: TransactionKind, path: impl Into<String>) -> bool {
    if !ctx.can_start_transaction() {
        return false;
    }
    ctx.reset_for_transaction(trans, path);
    ctx.state = if matches!(ctx.state, State::KeepAliveIdle) {
        State::KeepAliveReady
    } else {
        State::WaitDnsSend
    };
    true
}

fn dispatch_connect<P: Pal>(state: State, ctx: &mut Context, pal: &mut P) -> Transition<()> {
    match state {
        State::WaitDnsSend => match pal.resolv_and_connect(ctx) {
            ConnectStatus::ConnectSuccess => Transition::Next(State::Connected),
            ConnectStatus::SendWouldBlock | ConnectStatus::Sent => Transition::Next(State::WaitDnsRcv),
            ConnectStatus::ConnectWouldBlock => Transition::Next(State::WaitConnect),
            ConnectStatus::RcvWouldBlock => Transition::Next(State::WaitDnsRcv),
            ConnectStatus::Failed => fail_connect(ctx),
        },
        State::WaitDnsRcv => match pal.check_resolv_and_connect(ctx) {
            ConnectStatus::ConnectSuccess => Transition::Next(State::Connected),
            ConnectStatus::ConnectWouldBlock => Transition::Next(State::WaitConnect),
            ConnectStatus::Failed => fail_connect(ctx),
            _ => Transition::Stay,
        },
        State::WaitConnect => match pal.check_connect(ctx) {
            ConnectStatus::ConnectSuccess => Transition::Next(State::Connected),
            ConnectStatus::Failed => fail_connect(ctx),
            _ => Transition::Stay,
        },
        other => {
            trace!(state = %other, "dispatch_connect called for a non-connect state");
            Transition::Stay
        },
    }
}

fn fail_connect(ctx: &mut Context) -> Transition<()> {
    ctx.last_result = Some(TransactResult::AddrResolutionFailed);
    Transition::Next(State::WaitCancel)
}

/// Re-entrant `step`: runs synchronously, chaining states via the internal
/// loop (§4.4 "Driver contract" — the original's goto-label re-dispatch),
/// until the transaction either needs to wait for an I/O event or reaches
/// a terminal outcome.
pub fn step<P: Pal, N: Notifier>(ctx: &mut Context, pal: &mut P, notifier: &mut N) {
    loop {
        let transition = match ctx.state {
            State::WaitDnsSend | State::WaitDnsRcv | State::WaitConnect => dispatch_connect(ctx.state, ctx, pal),

            State::Connected
            | State::TxGet
            | State::TxScheme
            | State::TxHost
            | State::TxPortNum
            | State::TxPath
            | State::TxVer
            | State::TxProxyAuthorization
            | State::TxOrigin
            | State::TxFinHead => request::dispatch(ctx.state, ctx, pal),

            State::RxHttpVer
            | State::RxHeaders
            | State::RxHeaderLine
            | State::RxBody
            | State::RxBodyWait
            | State::RxChunkLen
            | State::RxChunkLenLine
            | State::RxBodyChunk
            | State::RxBodyChunkWait => response::dispatch(ctx.state, ctx, pal),

            State::Ready | State::Retry | State::WaitClose | State::KeepAliveWaitClose | State::KeepAliveReady => {
                finish::dispatch(ctx.state, ctx, pal, notifier)
            },

            State::WaitCancel | State::WaitCancelClose => cancel::dispatch(ctx.state, ctx, pal, notifier),

            State::Null | State::Idle | State::KeepAliveIdle => Transition::Stay,
        };

        match transition {
            Transition::Next(next) => ctx.state = next,
            Transition::Stay => return,
            Transition::Done(()) => return,
        }
    }
}
